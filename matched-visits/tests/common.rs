//! Common utilities for matched-visits integration tests
#![allow(dead_code)]

use matched_visits::record::{SourceFlags, VisitId};
use matched_visits::repository::mock::MockRepository;
use matched_visits::repository::{PhotoCalib, RawSource};
use sky_math::{Equatorial, SecondMoments};

/// Zeropoint flux used by all synthetic visits: flux 1e9 maps to mag 7.5.
pub const FLUX_MAG_0: f64 = 1e12;

/// Standard r-band calibration for synthetic visits.
pub fn r_band_calib() -> PhotoCalib {
    PhotoCalib {
        flux_mag_0: FLUX_MAG_0,
        flux_mag_0_err: 0.0,
        filter: 'r',
    }
}

/// A circular PSF shape.
pub fn circular_psf() -> SecondMoments {
    SecondMoments::new(2.0, 2.0, 0.0)
}

/// Parameters for one synthetic star detection.
#[derive(Debug, Clone)]
pub struct StarParams {
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub snr: f64,
    pub shape: SecondMoments,
    pub extendedness: f64,
    pub flags: SourceFlags,
}

impl StarParams {
    /// A clean point source at the given position with the given SNR.
    pub fn new(ra_deg: f64, dec_deg: f64, snr: f64) -> Self {
        Self {
            ra_deg,
            dec_deg,
            snr,
            shape: circular_psf(),
            extendedness: 0.0,
            flags: SourceFlags::default(),
        }
    }

    /// Same star with an explicit measured shape.
    pub fn with_shape(mut self, shape: SecondMoments) -> Self {
        self.shape = shape;
        self
    }
}

/// Convert star parameters to a raw source row. Flux error is fixed at
/// 1e7 instrumental units so `snr` sets the flux directly.
pub fn raw_source(star: &StarParams) -> RawSource {
    RawSource {
        position: Equatorial::from_degrees(star.ra_deg, star.dec_deg),
        psf_flux: star.snr * 1e7,
        psf_flux_err: 1e7,
        shape: star.shape,
        extendedness: star.extendedness,
        flags: star.flags,
    }
}

/// Build a mock repository from per-visit star lists, all sharing the
/// r-band calibration and a circular PSF.
pub fn repository_with_visits(visits: &[(VisitId, Vec<StarParams>)]) -> MockRepository {
    let mut repo = MockRepository::new();
    for (id, stars) in visits {
        repo.add_visit(
            *id,
            r_band_calib(),
            circular_psf(),
            stars.iter().map(raw_source).collect(),
        );
    }
    repo
}

/// Initialize test logging (idempotent).
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
