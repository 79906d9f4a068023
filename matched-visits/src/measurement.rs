//! TEx measurements: PSF-residual ellipticity correlation over angular
//! ranges.
//!
//! TE1 bounds the residual correlation on scales <= 1 arcmin; TE2 on scales
//! >= 5 arcmin. Each measurement runs the correlation function over the
//! *safe* sample's per-star median residual ellipticities, averages the
//! selected bins, and reports the absolute value, keeping the full binned
//! profile alongside for diagnostics.

use thiserror::Error;

use crate::config::CorrelationConfig;
use crate::correlation::{
    correlation_function_ellipticity, select_bin_from_corr, BinOperator, CorrelationError,
    CorrelationProfile,
};
use crate::reduce::MatchedMultiVisitDataset;

/// Errors from a TEx measurement.
#[derive(Error, Debug)]
pub enum MeasurementError {
    /// The correlation could not be computed or selected.
    #[error("{name} measurement failed: {source}")]
    Correlation {
        /// Measurement name (TE1 or TE2).
        name: &'static str,
        /// Underlying failure.
        #[source]
        source: CorrelationError,
    },
}

/// Definition of one TEx metric.
#[derive(Debug, Clone)]
pub struct TExConfig {
    /// Metric name, "TE1" or "TE2".
    pub name: &'static str,
    /// Angular scale D in arcminutes.
    pub d_arcmin: f64,
    /// Which side of D the averaged bins lie on.
    pub operator: BinOperator,
}

impl TExConfig {
    /// TE1: residual correlations averaged over scales <= 1 arcmin.
    pub fn te1() -> Self {
        Self {
            name: "TE1",
            d_arcmin: 1.0,
            operator: BinOperator::Le,
        }
    }

    /// TE2: residual correlations averaged over scales >= 5 arcmin.
    pub fn te2() -> Self {
        Self {
            name: "TE2",
            d_arcmin: 5.0,
            operator: BinOperator::Ge,
        }
    }
}

/// One computed TEx measurement.
#[derive(Debug, Clone)]
pub struct TExMeasurement {
    /// Metric name, "TE1" or "TE2".
    pub name: &'static str,
    /// Filter band the dataset was observed in.
    pub filter_name: char,
    /// Absolute value of the averaged residual correlation
    /// (dimensionless).
    pub quantity: f64,
    /// Standard error of the averaged correlation.
    pub quantity_err: f64,
    /// Full correlation profile, for plotting and re-analysis.
    pub profile: CorrelationProfile,
}

impl TExMeasurement {
    /// Compute a TEx measurement from a matched dataset.
    ///
    /// Uses the *safe* sample: per group, the mean sky direction and the
    /// median residual ellipticity components of its members.
    pub fn compute(
        dataset: &MatchedMultiVisitDataset,
        tex: &TExConfig,
        corr_config: &CorrelationConfig,
    ) -> Result<Self, MeasurementError> {
        let positions = dataset.safe.group_mean_positions();
        let (e1_res, e2_res) = dataset.safe.group_median_residual_ellipticities();

        let profile = correlation_function_ellipticity(&positions, &e1_res, &e2_res, corr_config)
            .map_err(|source| MeasurementError::Correlation {
                name: tex.name,
                source,
            })?;

        let (corr, corr_err) = select_bin_from_corr(&profile, tex.d_arcmin, tex.operator)
            .map_err(|source| MeasurementError::Correlation {
                name: tex.name,
                source,
            })?;

        Ok(Self {
            name: tex.name,
            filter_name: dataset.filter_name,
            quantity: corr.abs(),
            quantity_err: corr_err,
            profile,
        })
    }
}
