//! Angular two-point shear correlation of ellipticity residuals.
//!
//! Computes the shear-shear correlation function `xip` of PSF-residual
//! ellipticities over logarithmically spaced angular separation bins. For
//! every star pair, both residual shears are rotated into the frame of the
//! great circle connecting the pair; the correlation in a bin is the mean of
//! g1'i*g1'j + g2'i*g2'j over the pairs falling in that bin.
//!
//! Accumulation is a per-bin sum of (pair term, log separation, count),
//! which is associative and commutative, so the pair loop is sharded across
//! threads with rayon and the shard accumulators merged order-independently.

use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sky_math::Equatorial;
use std::fmt;
use thiserror::Error;

use crate::config::CorrelationConfig;

/// Comparison operator for the bin selection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinOperator {
    /// Select bins with center <= radius.
    Le,
    /// Select bins with center < radius.
    Lt,
    /// Select bins with center >= radius.
    Ge,
    /// Select bins with center > radius.
    Gt,
}

impl BinOperator {
    /// Evaluate `operator(center, radius)`.
    pub fn matches(self, center: f64, radius: f64) -> bool {
        match self {
            BinOperator::Le => center <= radius,
            BinOperator::Lt => center < radius,
            BinOperator::Ge => center >= radius,
            BinOperator::Gt => center > radius,
        }
    }
}

impl fmt::Display for BinOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            BinOperator::Le => "<=",
            BinOperator::Lt => "<",
            BinOperator::Ge => ">=",
            BinOperator::Gt => ">",
        };
        f.write_str(s)
    }
}

/// Errors from correlation computation and bin selection.
#[derive(Error, Debug)]
pub enum CorrelationError {
    /// The binning configuration failed validation.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Fewer than two stars: no pairs exist.
    #[error("cannot correlate {count} stars, need at least 2")]
    InsufficientStars {
        /// Number of stars supplied.
        count: usize,
    },

    /// Input arrays disagree in length.
    #[error("mismatched input lengths: {positions} positions, {e1} e1 values, {e2} e2 values")]
    MismatchedInputs {
        /// Number of positions.
        positions: usize,
        /// Number of e1 values.
        e1: usize,
        /// Number of e2 values.
        e2: usize,
    },

    /// The bin selection matched no bins; the average is undefined.
    #[error("no correlation bins satisfy center {operator} {radius}")]
    EmptyBinSelection {
        /// Target radius in separation units.
        radius: f64,
        /// Comparison operator.
        operator: BinOperator,
    },
}

/// Binned two-point correlation function.
///
/// Bin centers increase monotonically; units of `radius` follow the
/// configured separation units (arcminutes by default). Bins with zero
/// pairs report zero correlation and uncertainty at the nominal geometric
/// bin center; their `npairs` entry distinguishes them from a measured
/// zero.
#[derive(Debug, Clone)]
pub struct CorrelationProfile {
    /// Bin centers (geometric mean of member-pair separations).
    pub radius: Array1<f64>,
    /// Mean shear correlation per bin.
    pub xip: Array1<f64>,
    /// Standard error of `xip` per bin (shot-noise estimate).
    pub xip_err: Array1<f64>,
    /// Number of pairs per bin.
    pub npairs: Array1<u64>,
}

impl CorrelationProfile {
    /// Number of bins.
    pub fn nbins(&self) -> usize {
        self.radius.len()
    }
}

/// Per-bin pair sums. Associative merge makes shard-parallel accumulation
/// order-independent.
#[derive(Debug, Clone)]
struct BinAccumulator {
    sum_xip: Vec<f64>,
    sum_log_sep: Vec<f64>,
    npairs: Vec<u64>,
}

impl BinAccumulator {
    fn new(nbins: usize) -> Self {
        Self {
            sum_xip: vec![0.0; nbins],
            sum_log_sep: vec![0.0; nbins],
            npairs: vec![0; nbins],
        }
    }

    fn add(&mut self, bin: usize, xip_term: f64, log_sep: f64) {
        self.sum_xip[bin] += xip_term;
        self.sum_log_sep[bin] += log_sep;
        self.npairs[bin] += 1;
    }

    fn merge(mut self, other: Self) -> Self {
        for b in 0..self.sum_xip.len() {
            self.sum_xip[b] += other.sum_xip[b];
            self.sum_log_sep[b] += other.sum_log_sep[b];
            self.npairs[b] += other.npairs[b];
        }
        self
    }
}

/// Shear components of one star, pre-rotated per pair.
#[derive(Debug, Clone, Copy)]
struct Shear {
    g1: f64,
    g2: f64,
}

impl Shear {
    /// Components in a frame whose x-axis points along direction `phi`
    /// (measured counterclockwise from east). Spin-2 rotation by 2*phi.
    fn rotated(self, phi: f64) -> Shear {
        let (sin2, cos2) = (2.0 * phi).sin_cos();
        Shear {
            g1: self.g1 * cos2 + self.g2 * sin2,
            g2: -self.g1 * sin2 + self.g2 * cos2,
        }
    }
}

/// Compute the shear-shear correlation function of residual ellipticities.
///
/// `positions`, `e1_res`, `e2_res` are parallel arrays, one entry per star
/// (typically the per-group mean position and median residual). Stars with
/// non-finite residual components are dropped before pairing.
///
/// # Errors
///
/// [`CorrelationError::Config`] when the binning grid is invalid;
/// [`CorrelationError::MismatchedInputs`] when the arrays disagree in
/// length; [`CorrelationError::InsufficientStars`] when fewer than two
/// usable stars remain.
pub fn correlation_function_ellipticity(
    positions: &[Equatorial],
    e1_res: &[f64],
    e2_res: &[f64],
    config: &CorrelationConfig,
) -> Result<CorrelationProfile, CorrelationError> {
    config.validate()?;
    if positions.len() != e1_res.len() || positions.len() != e2_res.len() {
        return Err(CorrelationError::MismatchedInputs {
            positions: positions.len(),
            e1: e1_res.len(),
            e2: e2_res.len(),
        });
    }

    let stars: Vec<(Equatorial, Shear)> = positions
        .iter()
        .zip(e1_res.iter().zip(e2_res.iter()))
        .filter(|(_, (e1, e2))| e1.is_finite() && e2.is_finite())
        .map(|(p, (&g1, &g2))| (*p, Shear { g1, g2 }))
        .collect();

    if stars.len() < 2 {
        return Err(CorrelationError::InsufficientStars { count: stars.len() });
    }

    let nbins = config.nbins;
    let (min_sep_rad, max_sep_rad) = config.sep_range_rad();
    let log_min = min_sep_rad.ln();
    let log_bin_width = (max_sep_rad.ln() - log_min) / nbins as f64;

    let acc = (0..stars.len())
        .into_par_iter()
        .fold(
            || BinAccumulator::new(nbins),
            |mut acc, i| {
                let (pos_i, shear_i) = stars[i];
                for &(pos_j, shear_j) in &stars[i + 1..] {
                    let sep = pos_i.separation(&pos_j);
                    if sep < min_sep_rad || sep >= max_sep_rad {
                        continue;
                    }
                    let log_sep = sep.ln();
                    let bin = (((log_sep - log_min) / log_bin_width) as usize).min(nbins - 1);

                    // Rotate both shears into the frame of the connecting
                    // geodesic. The direction at j points back toward i,
                    // but the spin-2 rotation is invariant under a half
                    // turn, so the backward bearing serves directly.
                    let phi_i = std::f64::consts::FRAC_PI_2 - pos_i.bearing(&pos_j);
                    let phi_j = std::f64::consts::FRAC_PI_2 - pos_j.bearing(&pos_i);
                    let gi = shear_i.rotated(phi_i);
                    let gj = shear_j.rotated(phi_j);

                    acc.add(bin, gi.g1 * gj.g1 + gi.g2 * gj.g2, log_sep);
                }
                acc
            },
        )
        .reduce(|| BinAccumulator::new(nbins), BinAccumulator::merge);

    // Per-component shear variance of the sample, for the shot-noise error
    // estimate.
    let var_g = stars
        .iter()
        .map(|(_, s)| s.g1 * s.g1 + s.g2 * s.g2)
        .sum::<f64>()
        / (2.0 * stars.len() as f64);

    let unit = config.sep_units.to_rad();
    let mut radius = Array1::zeros(nbins);
    let mut xip = Array1::zeros(nbins);
    let mut xip_err = Array1::zeros(nbins);
    let mut npairs = Array1::zeros(nbins);

    for b in 0..nbins {
        let n = acc.npairs[b];
        npairs[b] = n;
        if n > 0 {
            radius[b] = (acc.sum_log_sep[b] / n as f64).exp() / unit;
            xip[b] = acc.sum_xip[b] / n as f64;
            xip_err[b] = (2.0 * var_g * var_g / n as f64).sqrt();
        } else {
            // Nominal geometric center keeps the grid monotonic for the
            // selection step even when a bin saw no pairs.
            radius[b] = (log_min + (b as f64 + 0.5) * log_bin_width).exp() / unit;
        }
    }

    log::debug!(
        "correlated {} stars: {} pairs in [{:.3}, {:.3}] {:?}",
        stars.len(),
        acc.npairs.iter().sum::<u64>(),
        config.min_sep,
        config.max_sep,
        config.sep_units
    );

    Ok(CorrelationProfile {
        radius,
        xip,
        xip_err,
        npairs,
    })
}

/// Average `xip` and `xip_err` over bins whose center satisfies
/// `operator(center, radius)`.
///
/// # Errors
///
/// [`CorrelationError::EmptyBinSelection`] when no bin satisfies the
/// condition; callers must treat this as a failed measurement, never as a
/// zero.
pub fn select_bin_from_corr(
    profile: &CorrelationProfile,
    radius: f64,
    operator: BinOperator,
) -> Result<(f64, f64), CorrelationError> {
    let selected: Vec<usize> = (0..profile.nbins())
        .filter(|&b| operator.matches(profile.radius[b], radius))
        .collect();

    if selected.is_empty() {
        return Err(CorrelationError::EmptyBinSelection { radius, operator });
    }

    let n = selected.len() as f64;
    let avg_xip = selected.iter().map(|&b| profile.xip[b]).sum::<f64>() / n;
    let avg_err = selected.iter().map(|&b| profile.xip_err[b]).sum::<f64>() / n;
    Ok((avg_xip, avg_err))
}
