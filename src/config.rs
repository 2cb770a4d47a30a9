//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//! Every field has a default, so any section (or the whole file) may be omitted.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::battery::warning::WarningSettings;
use crate::color::Rgb;
use crate::error::{Ds4Error, Result};
use crate::led::effects::LedEffectType;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub battery: BatteryConfig,
    pub warning: WarningConfig,
    pub led: LedConfig,
    pub logging: LoggingConfig,
}

/// Device scan configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScanConfig {
    /// Period of the scan / cleanup / battery poll cycle
    #[serde(default = "default_scan_interval_ms")]
    pub interval_ms: u64,
}

/// Battery polling configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BatteryConfig {
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Low battery warning configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WarningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_threshold")]
    pub threshold: u8,

    #[serde(default = "default_warning_color")]
    pub color: Rgb,

    #[serde(default = "default_true")]
    pub flash: bool,

    #[serde(default = "default_true")]
    pub auto_color_change: bool,

    #[serde(default = "default_true")]
    pub vibration_alert: bool,

    #[serde(default = "default_true")]
    pub notification: bool,

    #[serde(default = "default_realert_interval_s")]
    pub realert_interval_s: u64,
}

/// Light bar applied when a controller connects
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LedConfig {
    #[serde(default = "default_led_color")]
    pub color: Rgb,

    #[serde(default)]
    pub effect: LedEffectType,

    #[serde(default = "default_effect_speed")]
    pub effect_speed: u8,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily rolling log files are written here when non-empty
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_scan_interval_ms() -> u64 { 3000 }
fn default_read_timeout_ms() -> u64 { 250 }

fn default_true() -> bool { true }
fn default_threshold() -> u8 { 20 }
fn default_warning_color() -> Rgb { Rgb::RED }
fn default_realert_interval_s() -> u64 { 120 }

fn default_led_color() -> Rgb { Rgb::BLUE }
fn default_effect_speed() -> u8 { 50 }

fn default_log_level() -> String { "info".to_string() }

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_scan_interval_ms(),
        }
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            color: default_warning_color(),
            flash: true,
            auto_color_change: true,
            vibration_alert: true,
            notification: true,
            realert_interval_s: default_realert_interval_s(),
        }
    }
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            color: default_led_color(),
            effect: LedEffectType::None,
            effect_speed: default_effect_speed(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> Ds4Error {
    Ds4Error::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ds4_lightbar::config::Config;
    ///
    /// let config = Config::load("config.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan.interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.battery.read_timeout_ms)
    }

    /// Warning monitor settings derived from the `[warning]` section
    pub fn warning_settings(&self) -> WarningSettings {
        let warning = &self.warning;
        WarningSettings {
            enabled: warning.enabled,
            threshold: warning.threshold,
            color: warning.color,
            flash: warning.flash,
            auto_color_change: warning.auto_color_change,
            vibration_alert: warning.vibration_alert,
            notification: warning.notification,
            realert_interval: Duration::from_secs(warning.realert_interval_s),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if !(100..=60000).contains(&self.scan.interval_ms) {
            return Err(invalid("scan interval_ms must be between 100 and 60000"));
        }

        if !(1..=5000).contains(&self.battery.read_timeout_ms) {
            return Err(invalid("battery read_timeout_ms must be between 1 and 5000"));
        }

        if self.warning.threshold > 100 {
            return Err(invalid("warning threshold must be between 0 and 100"));
        }

        if self.warning.realert_interval_s == 0 {
            return Err(invalid("warning realert_interval_s must be at least 1"));
        }

        if !(10..=100).contains(&self.led.effect_speed) {
            return Err(invalid("led effect_speed must be between 10 and 100"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "logging level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}
