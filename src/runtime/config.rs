use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Local device configuration.
///
/// ```json
/// { "address": 5, "serial_number": 42, "device_class": 4660, "log_filter": "jdbus=debug" }
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    /// Bus address, 0 while the device is not enumerated
    #[serde(default)]
    pub address: u8,
    pub serial_number: u32,
    pub device_class: u32,
    /// Device flags; only the low byte is ever advertised
    #[serde(default)]
    pub flags: u16,
    #[serde(default = "default_communication_rate")]
    pub communication_rate: u8,
    /// `RUST_LOG` style filter passed to the logger
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_communication_rate() -> u8 { 1 }

impl BusConfig {
    pub fn new(address: u8, serial_number: u32, device_class: u32) -> Self {
        BusConfig {
            address,
            serial_number,
            device_class,
            flags: 0,
            communication_rate: default_communication_rate(),
            log_filter: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        let config: BusConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BusConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial_number == 0 {
            return Err(ConfigError::Invalid("serial_number must be non-zero".to_string()));
        }
        if self.communication_rate == 0 {
            return Err(ConfigError::Invalid("communication_rate must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BusConfig::from_json(r#"{ "serial_number": 42, "device_class": 4660 }"#).unwrap();
        assert_eq!(config.address, 0);
        assert_eq!(config.flags, 0);
        assert_eq!(config.communication_rate, 1);
        assert!(config.log_filter.is_none());
    }

    #[test]
    fn test_full() {
        let json = r#"{
            "address": 5,
            "serial_number": 42,
            "device_class": 4660,
            "flags": 255,
            "communication_rate": 2,
            "log_filter": "jdbus=debug"
        }"#;
        let config = BusConfig::from_json(json).unwrap();
        assert_eq!(config.address, 5);
        assert_eq!(config.flags, 0x00FF);
        assert_eq!(config.log_filter.as_deref(), Some("jdbus=debug"));
    }

    #[test]
    fn test_rejects_zero_serial() {
        let result = BusConfig::from_json(r#"{ "serial_number": 0, "device_class": 1 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(BusConfig::from_json("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = BusConfig::load("/nonexistent/jdbus.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
