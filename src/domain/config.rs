use crate::core::frame::ConfigurationFrame;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// PAICORE tool configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaiCoreConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Serial link settings
    #[serde(default)]
    pub serial: SerialConfig,
    /// Configuration frame sent to the chip
    #[serde(default)]
    pub frame: ConfigurationFrame,
}

/// Global configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Number of send/verify repetitions per session
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    /// Echo read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    /// Delay between rounds in milliseconds
    #[serde(default = "default_pacing")]
    pub pacing_ms: u64,
}

/// Serial connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: ParityConfig,
    #[serde(default)]
    pub flow_control: FlowControlConfig,
}

/// Parity configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    #[default]
    None,
    Odd,
    Even,
}

/// Flow control configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControlConfig {
    #[default]
    None,
    Hardware,
    Software,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_repeat_count() -> u32 {
    3
}

fn default_read_timeout() -> u64 {
    2000
}

fn default_pacing() -> u64 {
    1000
}

/// Platform-typical serial device
pub fn default_port() -> String {
    if cfg!(windows) {
        "COM1".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

pub fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            repeat_count: default_repeat_count(),
            read_timeout_ms: default_read_timeout(),
            pacing_ms: default_pacing(),
        }
    }
}

impl GlobalConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: ParityConfig::default(),
            flow_control: FlowControlConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = PaiCoreConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: PaiCoreConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config() {
        let config: PaiCoreConfig = toml::from_str(
            r#"
            [serial]
            port = "/dev/ttyACM1"
            parity = "even"

            [frame]
            chip_x = 3
            debug_mode_enable = true
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.port, "/dev/ttyACM1");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.parity, ParityConfig::Even);
        assert_eq!(config.global.repeat_count, 3);
        assert_eq!(config.frame.chip_x, 3);
        assert!(config.frame.debug_mode_enable);
        assert_eq!(config.frame.pll_clkf, 25);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: PaiCoreConfig = toml::from_str("").unwrap();
        assert_eq!(config, PaiCoreConfig::default());
        assert_eq!(config.global.pacing(), Duration::from_secs(1));
    }
}
