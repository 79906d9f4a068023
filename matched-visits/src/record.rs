//! Source records and per-visit catalogs.
//!
//! A [`SourceRecord`] is one detection in one visit, already extended with
//! every derived quantity downstream stages need (SNR, calibrated magnitude,
//! source and PSF ellipticities). Records are built once by the loader and
//! never mutated afterwards; there is no runtime schema to extend.

use sky_math::{Equatorial, EllipticityComponents, SecondMoments};
use std::fmt;

/// Identity of one exposure/detector combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisitId {
    /// Visit (exposure) number.
    pub visit: u32,
    /// Detector (CCD) number within the focal plane.
    pub detector: u32,
}

impl VisitId {
    /// Create a visit identity.
    pub fn new(visit: u32, detector: u32) -> Self {
        Self { visit, detector }
    }
}

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "visit {} ccd {}", self.visit, self.detector)
    }
}

/// Disqualifying quality flags for a detection.
///
/// Any set flag excludes the detection's match group from the *good* sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceFlags {
    /// One or more pixels in the source footprint were saturated.
    pub saturated: bool,
    /// Footprint overlaps a cosmic-ray hit.
    pub cosmic_ray: bool,
    /// Footprint overlaps a known bad pixel.
    pub bad: bool,
    /// Source lies on the detector edge.
    pub edge: bool,
}

impl SourceFlags {
    /// True if any disqualifying flag is set.
    pub fn any(&self) -> bool {
        self.saturated || self.cosmic_ray || self.bad || self.edge
    }
}

/// One detection in one visit, extended with derived quantities.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// Sky position of the measured centroid.
    pub position: Equatorial,
    /// PSF flux in instrumental units.
    pub psf_flux: f64,
    /// 1-sigma uncertainty of the PSF flux.
    pub psf_flux_err: f64,
    /// Signal-to-noise ratio, flux / flux_err.
    pub snr: f64,
    /// Calibrated PSF magnitude; NaN when the calibration transform could
    /// not produce one for this record.
    pub mag: f64,
    /// 1-sigma magnitude uncertainty; NaN alongside `mag`.
    pub mag_err: f64,
    /// Measured second moments of the source.
    pub shape: SecondMoments,
    /// Source ellipticity derived from `shape`.
    pub ellipticity: EllipticityComponents,
    /// PSF model ellipticity evaluated at the source centroid.
    pub psf_ellipticity: EllipticityComponents,
    /// Star/galaxy classifier score; 0 is point-like, 1 is extended.
    pub extendedness: f64,
    /// Quality flags.
    pub flags: SourceFlags,
}

impl SourceRecord {
    /// Residual ellipticity first component (source minus PSF model).
    pub fn e1_residual(&self) -> f64 {
        self.ellipticity.e1 - self.psf_ellipticity.e1
    }

    /// Residual ellipticity second component (source minus PSF model).
    pub fn e2_residual(&self) -> f64 {
        self.ellipticity.e2 - self.psf_ellipticity.e2
    }
}

/// Ordered collection of extended records from one visit.
#[derive(Debug, Clone)]
pub struct VisitCatalog {
    /// Identity of the visit that produced these records.
    pub id: VisitId,
    /// Extended source records, in source-table order.
    pub records: Vec<SourceRecord>,
}

impl VisitCatalog {
    /// Number of records in the catalog.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the catalog holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
