//! Logging configuration
//!
//! Per-component log levels and output destinations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Named starting points for [`LoggingConfig`], selectable from `fpreg init-config`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LoggingPreset {
    #[default]
    Default,
    Development,
    Production,
}

impl LoggingPreset {
    pub fn config(self) -> LoggingConfig {
        match self {
            Self::Default => LoggingConfig::default(),
            Self::Development => LoggingConfig::development(),
            Self::Production => LoggingConfig::production(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for JSON log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs
    pub include_file_location: bool,

    /// Level for the registration pipeline and overlap engine
    pub registration_level: String,

    /// Level for the raster backends
    pub raster_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            registration_level: "info".to_string(),
            raster_level: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Verbose logging with source locations and a local log directory
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            registration_level: "trace".to_string(),
            raster_level: "debug".to_string(),
        }
    }

    /// Warnings only, written to files
    pub fn production() -> Self {
        Self {
            global_level: "warn".to_string(),
            console_output: false,
            log_directory: Some(PathBuf::from("/var/log/fingerprint-registration")),
            include_file_location: false,
            registration_level: "info".to_string(),
            raster_level: "warn".to_string(),
        }
    }

    /// Map a `-v` count onto a preset-independent global level
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        let level = match verbose {
            0 => return self,
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        self.global_level = level.to_string();
        self.registration_level = level.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, level) in [
            ("global_level", &self.global_level),
            ("registration_level", &self.registration_level),
            ("raster_level", &self.raster_level),
        ] {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    name, level, VALID_LEVELS
                ));
            }
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    /// Effective level for a component
    pub fn get_component_level(&self, component: &str) -> &str {
        match component {
            "registration" | "overlap" => &self.registration_level,
            "raster" => &self.raster_level,
            _ => &self.global_level,
        }
    }

    /// `EnvFilter` directive string covering the crate and its components
    pub fn filter_directives(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        format!(
            "{krate}={},{krate}::registration={},{krate}::overlap={},{krate}::raster={}",
            self.global_level,
            self.get_component_level("registration"),
            self.get_component_level("overlap"),
            self.get_component_level("raster"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.global_level, "info");
        assert!(config.console_output);
        assert!(config.log_directory.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = LoggingConfig::development();
        assert_eq!(dev.registration_level, "trace");
        assert!(dev.include_file_location);

        let prod = LoggingConfig::production();
        assert_eq!(prod.global_level, "warn");
        assert!(!prod.console_output);
    }

    #[test]
    fn test_preset_selection() {
        assert_eq!(LoggingPreset::default(), LoggingPreset::Default);
        assert_eq!(LoggingPreset::Default.config().global_level, "info");
        let dev = LoggingPreset::Development.config();
        assert_eq!(dev.log_directory, Some(PathBuf::from("logs")));
        assert!(dev.validate().is_ok());
        assert!(dev.filter_directives().contains("::registration=trace"));
        assert!(!LoggingPreset::Production.config().console_output);
    }

    #[test]
    fn test_invalid_level_rejected() {
        let mut config = LoggingConfig::default();
        config.raster_level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("raster_level"));
    }

    #[test]
    fn test_verbosity_overrides_levels() {
        let config = LoggingConfig::default().with_verbosity(2);
        assert_eq!(config.global_level, "debug");
        assert_eq!(config.get_component_level("overlap"), "debug");
        assert_eq!(LoggingConfig::default().with_verbosity(0).global_level, "info");
    }

    #[test]
    fn test_filter_directives() {
        let directives = LoggingConfig::default().filter_directives();
        assert!(directives.starts_with("fingerprint_registration=info"));
        assert!(directives.contains("fingerprint_registration::raster=warn"));
    }
}
