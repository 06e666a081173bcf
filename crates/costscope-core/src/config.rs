//! Analysis configuration
//!
//! Thresholds and window sizes for the analytics components, loaded from a
//! TOML file. Missing keys fall back to their defaults.
//!
//! ```toml
//! sensitivity_threshold = 30.0
//! current_period_months = 6
//! previous_period_months = 6
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::anomaly::{
    DEFAULT_GROWTH_MONTHS, DEFAULT_GROWTH_THRESHOLD, DEFAULT_OUTLIER_FACTOR,
    DEFAULT_SENSITIVITY_THRESHOLD,
};
use crate::period::{DEFAULT_CURRENT_PERIOD_MONTHS, DEFAULT_PREVIOUS_PERIOD_MONTHS};
use crate::projection::DEFAULT_PROJECTION_MONTHS;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum absolute deviation, in percent, reported as an anomaly
    pub sensitivity_threshold: f64,

    /// Months inspected by rapid growth detection
    pub growth_months: usize,

    /// Average monthly growth, in percent, that counts as rapid
    pub growth_threshold: f64,

    pub current_period_months: usize,
    pub previous_period_months: usize,

    /// Months projected ahead
    pub projection_months: usize,

    /// IQR multiplier for outlier months
    pub outlier_factor: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sensitivity_threshold: DEFAULT_SENSITIVITY_THRESHOLD,
            growth_months: DEFAULT_GROWTH_MONTHS,
            growth_threshold: DEFAULT_GROWTH_THRESHOLD,
            current_period_months: DEFAULT_CURRENT_PERIOD_MONTHS,
            previous_period_months: DEFAULT_PREVIOUS_PERIOD_MONTHS,
            projection_months: DEFAULT_PROJECTION_MONTHS,
            outlier_factor: DEFAULT_OUTLIER_FACTOR,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file, using defaults if it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded analysis config");
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("growth_months", self.growth_months),
            ("current_period_months", self.current_period_months),
            ("previous_period_months", self.previous_period_months),
            ("projection_months", self.projection_months),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(Error::Config(format!("{} must be at least 1", name)));
            }
        }

        let thresholds = [
            ("sensitivity_threshold", self.sensitivity_threshold),
            ("growth_threshold", self.growth_threshold),
            ("outlier_factor", self.outlier_factor),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.sensitivity_threshold, 25.0);
        assert_eq!(config.growth_months, 3);
        assert_eq!(config.growth_threshold, 15.0);
        assert_eq!(config.current_period_months, 3);
        assert_eq!(config.previous_period_months, 3);
        assert_eq!(config.projection_months, 3);
        assert_eq!(config.outlier_factor, 1.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnalysisConfig::from_toml_str("sensitivity_threshold = 40.0\nprojection_months = 6\n").unwrap();
        assert_eq!(config.sensitivity_threshold, 40.0);
        assert_eq!(config.projection_months, 6);
        assert_eq!(config.growth_months, 3);
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = AnalysisConfig::from_toml_str("current_period_months = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("current_period_months"));
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let err = AnalysisConfig::from_toml_str("growth_threshold = -1.0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let err = AnalysisConfig::from_toml_str("sensitivity_threshold = \"high\"").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "outlier_factor = 3.0").unwrap();

        let config = AnalysisConfig::load(file.path()).unwrap();
        assert_eq!(config.outlier_factor, 3.0);
    }
}
