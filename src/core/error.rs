//! Error types for storage operations.

use std::fmt;
use thiserror::Error;

/// Which fixed capacity a write ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityLimit {
    /// Serialized record is larger than the cell.
    ValueSize {
        /// Serialized length
        size: usize,
        /// Cell length
        max: usize,
    },
    /// Every slot of the table is occupied.
    SlotCount {
        /// Slots per table
        slots: usize,
    },
    /// An earlier write already outgrew the cell.
    Saturated {
        /// Cell length
        max: usize,
    },
}

impl fmt::Display for CapacityLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValueSize { size, max } => {
                write!(f, "record is {size} bytes, cell holds {max}")
            },
            Self::SlotCount { slots } => write!(f, "all {slots} slots occupied"),
            Self::Saturated { max } => write!(f, "record already outgrew its {max}-byte cell"),
        }
    }
}

/// Errors raised by the storage adapter and its tables.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Label values could not be encoded.
    #[error("Label encoding error: {0}")]
    Encoding(String),

    /// Stored label text is not encoder output.
    #[error("Label decoding error: {0}")]
    Decoding(String),

    /// A write hit a fixed table capacity.
    #[error("Capacity exceeded for {key}: {limit}")]
    CapacityExceeded {
        /// Readable key of the record
        key: String,
        /// Which capacity was hit
        limit: CapacityLimit,
    },

    /// Stored bytes are not a readable record.
    #[error("Record deserialization error: {0}")]
    Deserialization(String),

    /// Malformed request, or one that cannot be applied.
    #[error("Invalid update request: {0}")]
    InvalidRequest(String),

    /// Rejected configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file access failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, MetricsError>;

impl MetricsError {
    /// Creates a new encoding error
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Self::Encoding(msg.into())
    }

    /// Creates a new decoding error
    pub fn decoding<S: Into<String>>(msg: S) -> Self {
        Self::Decoding(msg.into())
    }

    /// Creates a new deserialization error
    pub fn deserialization<S: Into<String>>(msg: S) -> Self {
        Self::Deserialization(msg.into())
    }

    /// Creates a new invalid request error
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if a fixed table capacity was hit
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Encoding(_) | Self::Decoding(_) => "codec",
            Self::CapacityExceeded { .. } => "capacity",
            Self::Deserialization(_) => "serialization",
            Self::InvalidRequest(_) => "validation",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}
