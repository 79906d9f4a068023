//! Pipeline configuration.
//!
//! All knobs live in one serde-round-trippable struct with defaults matching
//! the survey requirements: 1 arcsecond match radius, safe-SNR 50, and a
//! 20-bin logarithmic correlation grid from 0.25 to 20 arcminutes. A
//! configuration is validated before any data is loaded, so malformed
//! settings fail fast rather than after minutes of catalog I/O.

use serde::{Deserialize, Serialize};
use sky_math::units::arcsec_to_rad;
use thiserror::Error;

/// Configuration validation or loading failure. Fatal at construction time.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A parameter that must be positive was not.
    #[error("invalid configuration: {name} must be positive, got {value}")]
    NotPositive {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// The separation range is empty or inverted.
    #[error("invalid configuration: min_sep ({min_sep}) must be less than max_sep ({max_sep})")]
    EmptySeparationRange {
        /// Lower edge of the separation range, in `sep_units`.
        min_sep: f64,
        /// Upper edge of the separation range, in `sep_units`.
        max_sep: f64,
    },

    /// The binning grid has no bins.
    #[error("invalid configuration: nbins must be at least 1")]
    NoBins,

    /// The safe-SNR threshold is below the good-SNR floor.
    #[error("invalid configuration: safe_snr ({safe_snr}) must be at least {good_snr}")]
    SafeSnrBelowGood {
        /// Configured safe threshold.
        safe_snr: f64,
        /// The good-sample floor it must not undercut.
        good_snr: f64,
    },

    /// A configuration file could not be read.
    #[error("could not read configuration file {}: {source}", path.display())]
    Unreadable {
        /// Path that was requested.
        path: std::path::PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file was not valid JSON for [`PipelineConfig`].
    #[error("malformed configuration file {}: {source}", path.display())]
    Malformed {
        /// Path that was parsed.
        path: std::path::PathBuf,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Angular units for the correlation separation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeparationUnits {
    /// Arcminutes (the scale TEx metrics are defined on).
    #[default]
    Arcmin,
    /// Arcseconds.
    Arcsec,
}

impl SeparationUnits {
    /// Radians per one unit.
    pub fn to_rad(self) -> f64 {
        match self {
            SeparationUnits::Arcmin => sky_math::units::RAD_PER_ARCMIN,
            SeparationUnits::Arcsec => sky_math::units::RAD_PER_ARCSEC,
        }
    }
}

/// Binning of the two-point correlation function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Number of logarithmically spaced separation bins.
    pub nbins: usize,
    /// Minimum pair separation, in `sep_units`.
    pub min_sep: f64,
    /// Maximum pair separation, in `sep_units`.
    pub max_sep: f64,
    /// Units of `min_sep` and `max_sep`.
    pub sep_units: SeparationUnits,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        // Covers both TE1 (<= 1 arcmin) and TE2 (>= 5 arcmin) ranges.
        Self {
            nbins: 20,
            min_sep: 0.25,
            max_sep: 20.0,
            sep_units: SeparationUnits::Arcmin,
        }
    }
}

impl CorrelationConfig {
    /// Validate the binning grid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nbins == 0 {
            return Err(ConfigError::NoBins);
        }
        if !(self.min_sep > 0.0) {
            return Err(ConfigError::NotPositive {
                name: "min_sep",
                value: self.min_sep,
            });
        }
        if self.min_sep >= self.max_sep {
            return Err(ConfigError::EmptySeparationRange {
                min_sep: self.min_sep,
                max_sep: self.max_sep,
            });
        }
        Ok(())
    }

    /// Separation range in radians.
    pub fn sep_range_rad(&self) -> (f64, f64) {
        let unit = self.sep_units.to_rad();
        (self.min_sep * unit, self.max_sep * unit)
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cross-visit match radius in arcseconds.
    pub match_radius_arcsec: f64,
    /// Minimum median SNR for a match group to be *good*.
    pub good_snr: f64,
    /// Minimum median SNR for a match group to be *safe*.
    pub safe_snr: f64,
    /// Correlation binning.
    pub correlation: CorrelationConfig,
    /// Emit per-stage info logging during reduction.
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            match_radius_arcsec: 1.0,
            good_snr: crate::reduce::GOOD_SNR,
            safe_snr: 50.0,
            correlation: CorrelationConfig::default(),
            verbose: false,
        }
    }
}

impl PipelineConfig {
    /// Validate all parameters. Called by the dataset constructor before
    /// any visit is loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.match_radius_arcsec > 0.0) {
            return Err(ConfigError::NotPositive {
                name: "match_radius_arcsec",
                value: self.match_radius_arcsec,
            });
        }
        if !(self.good_snr > 0.0) {
            return Err(ConfigError::NotPositive {
                name: "good_snr",
                value: self.good_snr,
            });
        }
        if self.safe_snr < self.good_snr {
            return Err(ConfigError::SafeSnrBelowGood {
                safe_snr: self.safe_snr,
                good_snr: self.good_snr,
            });
        }
        self.correlation.validate()
    }

    /// Match radius in radians.
    pub fn match_radius_rad(&self) -> f64 {
        arcsec_to_rad(self.match_radius_arcsec)
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }
}
