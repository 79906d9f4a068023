//! Per-visit data access abstraction.
//!
//! The pipeline never touches image repositories directly; it asks a
//! [`VisitRepository`] for three things per visit: photometric calibration
//! metadata, a PSF model, and the raw source table. Backends decide where
//! those come from — an in-memory mock for tests and synthetic runs, or
//! JSON catalog files on disk for the CLI.

pub mod json;
pub mod mock;

use sky_math::{Equatorial, SecondMoments};
use thiserror::Error;

use crate::record::{SourceFlags, VisitId};

/// Errors from per-visit data retrieval.
///
/// Both variants are recoverable at the loader level: a failed visit is
/// logged and skipped, never aborting the run.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The requested dataset does not exist for this visit.
    #[error("no {what} available for visit {visit} ccd {detector}")]
    MissingData {
        /// Visit number.
        visit: u32,
        /// Detector number.
        detector: u32,
        /// Which dataset was requested (e.g. "calexp metadata").
        what: &'static str,
    },

    /// The visit's metadata exists but cannot be interpreted.
    #[error("malformed metadata for visit {visit} ccd {detector}: {reason}")]
    MalformedMetadata {
        /// Visit number.
        visit: u32,
        /// Detector number.
        detector: u32,
        /// What was wrong with the metadata.
        reason: String,
    },

    /// Underlying I/O failure while reading repository files.
    #[error("repository I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// An un-extended detection as stored in a visit's source table.
#[derive(Debug, Clone)]
pub struct RawSource {
    /// Sky position of the measured centroid.
    pub position: Equatorial,
    /// PSF flux in instrumental units.
    pub psf_flux: f64,
    /// 1-sigma uncertainty of the PSF flux.
    pub psf_flux_err: f64,
    /// Measured second moments of the source.
    pub shape: SecondMoments,
    /// Star/galaxy classifier score.
    pub extendedness: f64,
    /// Quality flags.
    pub flags: SourceFlags,
}

/// Photometric calibration of one visit.
///
/// Converts instrumental fluxes to calibrated magnitudes through the
/// zeropoint flux `flux_mag_0` (the flux of a magnitude-zero source).
#[derive(Debug, Clone, Copy)]
pub struct PhotoCalib {
    /// Instrumental flux corresponding to magnitude zero.
    pub flux_mag_0: f64,
    /// 1-sigma uncertainty of `flux_mag_0`.
    pub flux_mag_0_err: f64,
    /// Filter band of the observation.
    pub filter: char,
}

impl PhotoCalib {
    /// Calibrated magnitude and its uncertainty for one flux measurement.
    ///
    /// Returns `None` when no magnitude is computable for this record
    /// (non-positive flux or zeropoint, non-finite inputs). Failures are
    /// per-record: one bad flux never poisons the rest of the catalog.
    pub fn magnitude(&self, flux: f64, flux_err: f64) -> Option<(f64, f64)> {
        if !(flux > 0.0) || !(self.flux_mag_0 > 0.0) || !flux.is_finite() {
            return None;
        }
        let mag = -2.5 * (flux / self.flux_mag_0).log10();
        // Quadrature sum of the flux and zeropoint error terms, both
        // propagated through d(mag)/d(ln flux) = -2.5 / ln 10.
        let scale = 2.5 / std::f64::consts::LN_10;
        let flux_term = flux_err / flux;
        let zp_term = self.flux_mag_0_err / self.flux_mag_0;
        let mag_err = scale * (flux_term * flux_term + zp_term * zp_term).sqrt();
        if !mag.is_finite() || !mag_err.is_finite() {
            return None;
        }
        Some((mag, mag_err))
    }
}

/// PSF model of one visit, queryable at arbitrary sky positions.
pub trait PsfModel {
    /// Second moments of the model PSF at the given position.
    fn shape_at(&self, position: &Equatorial) -> SecondMoments;
}

/// Per-visit lookup interface for calibration, PSF, and source data.
pub trait VisitRepository {
    /// Photometric calibration metadata for a visit.
    fn photo_calib(&self, id: VisitId) -> RepositoryResult<PhotoCalib>;

    /// PSF model for a visit.
    fn psf_model(&self, id: VisitId) -> RepositoryResult<Box<dyn PsfModel>>;

    /// Raw source table for a visit.
    fn source_table(&self, id: VisitId) -> RepositoryResult<Vec<RawSource>>;
}

/// A PSF model with position-independent second moments.
///
/// Sufficient for repeatability analysis over single-detector fields where
/// PSF variation across the field is below the ellipticity residual noise;
/// also the natural model for synthetic test catalogs.
#[derive(Debug, Clone, Copy)]
pub struct ConstantPsf {
    /// The spatially constant PSF shape.
    pub shape: SecondMoments,
}

impl PsfModel for ConstantPsf {
    fn shape_at(&self, _position: &Equatorial) -> SecondMoments {
        self.shape
    }
}
