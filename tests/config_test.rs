//! Configuration system tests.

use promtable::core::{Config, ConfigBuilder, LogLevel};
use promtable::StorageAdapter;
use std::io::Write;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.storage.table_size, 1024);
    assert_eq!(config.storage.value_size, 1024);
    assert_eq!(config.storage.original_key_length, 256);
    assert_eq!(config.logging.level, LogLevel::Info);
}

#[test]
fn test_yaml_file_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
storage:
  table_size: 128
  value_size: 16384
  original_key_length: 64
logging:
  level: debug
  structured: true
"#
    )
    .unwrap();

    let config = ConfigBuilder::new().from_file(file.path()).unwrap().build().unwrap();

    assert_eq!(config.storage.table_size, 128);
    assert_eq!(config.storage.value_size, 16384);
    assert_eq!(config.storage.original_key_length, 64);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert!(config.logging.structured);
}

#[test]
fn test_invalid_yaml_sizes_rejected() {
    let yaml = r#"
storage:
  table_size: 0
"#;
    let result = ConfigBuilder::new().from_yaml(yaml).unwrap().build();
    assert!(result.is_err());
}

#[test]
fn test_adapter_rejects_invalid_storage_config() {
    let mut config = Config::default();
    config.storage.value_size = 0;
    assert!(StorageAdapter::new(config.storage).is_err());
}
