//! Ambient plumbing shared by the storage engine: configuration,
//! errors and time.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigBuilder, LogLevel, LoggingConfig, StorageConfig};
pub use error::{CapacityLimit, MetricsError, Result};
