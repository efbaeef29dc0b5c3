use crate::error::RegistrationError;
use crate::logging::LoggingConfig;
use crate::raster::{Interpolation, PngCompression, StructuringElement};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Largest dilation radius accepted; beyond this the ROI stops tracking content
pub const MAX_KERNEL_SIZE: u8 = 32;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub registration: RegistrationConfig,
    pub overlap: OverlapConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Fill for pixels introduced by warping and padding (255 = white)
    pub background: u8,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OverlapConfig {
    pub kernel: StructuringElement,
}

impl OverlapConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.kernel.size > MAX_KERNEL_SIZE {
            return Err(RegistrationError::input(format!(
                "overlap kernel size must be at most {}, got {}",
                MAX_KERNEL_SIZE, self.kernel.size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub png_compression: PngCompression,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            background: 255,
            interpolation: Interpolation::Bilinear,
        }
    }
}

impl Config {
    /// Load a TOML or JSON file; JSON is recognized by a leading `{`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(
        &self,
        path: P,
        format: ConfigFormat,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.overlap.validate() {
            errors.push(e.to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConfigFormat {
    Json,
    Toml,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::KernelShape;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.registration.background, 255);
        assert_eq!(config.registration.interpolation, Interpolation::Bilinear);
        assert_eq!(config.overlap.kernel.shape, KernelShape::Rect);
        assert_eq!(config.overlap.kernel.size, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registration.toml");

        let mut config = Config::default();
        config.overlap.kernel = StructuringElement::new(KernelShape::Cross, 2);
        config.registration.background = 0;
        config.save_to_file(&path, ConfigFormat::Toml).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.overlap.kernel, config.overlap.kernel);
        assert_eq!(loaded.registration.background, 0);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "[overlap.kernel]\nshape = \"cross\"\nsize = 3\n").unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.overlap.kernel, StructuringElement::new(KernelShape::Cross, 3));
        assert_eq!(loaded.registration.background, 255);
    }

    #[test]
    fn test_json_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        Config::default()
            .save_to_file(&path, ConfigFormat::Json)
            .unwrap();
        assert!(Config::load_from_file(&path).is_ok());
    }

    #[test]
    fn test_oversized_kernel_rejected() {
        let mut config = Config::default();
        config.overlap.kernel.size = MAX_KERNEL_SIZE + 1;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
