//! TEx measurement over synthetic multi-visit fields.
//!
//! These scenarios use a line of stars with a known uniform residual shear:
//! measured source shapes are slightly elliptical while the PSF model is
//! circular, so every safe group carries the same residual (e1, e2). For a
//! uniform shear field the pair-frame rotation cancels between the two ends
//! of each pair and the correlation in every populated bin is exactly
//! e1^2 + e2^2.

mod common;

use common::{repository_with_visits, StarParams};
use matched_visits::config::{CorrelationConfig, PipelineConfig, SeparationUnits};
use matched_visits::correlation::CorrelationError;
use matched_visits::measurement::{MeasurementError, TExConfig, TExMeasurement};
use matched_visits::record::VisitId;
use matched_visits::reduce::MatchedMultiVisitDataset;
use sky_math::SecondMoments;

use approx::assert_relative_eq;

/// Shape with distortion ellipticity (e1, e2) and unit-ish size.
fn sheared_shape(e1: f64, e2: f64) -> SecondMoments {
    // Invert e1 = (ixx - iyy)/t, e2 = 2 ixy/t at fixed trace t = 4.
    let trace = 4.0;
    SecondMoments::new(
        trace * (1.0 + e1) / 2.0,
        trace * (1.0 - e1) / 2.0,
        trace * e2 / 2.0,
    )
}

/// Two identical visits of a line of stars along declination with a
/// uniform residual shear.
fn sheared_line_dataset(n_stars: usize, pitch_arcmin: f64, e1: f64, e2: f64) -> MatchedMultiVisitDataset {
    let stars: Vec<StarParams> = (0..n_stars)
        .map(|i| {
            StarParams::new(150.0, 2.0 + i as f64 * pitch_arcmin / 60.0, 100.0)
                .with_shape(sheared_shape(e1, e2))
        })
        .collect();
    let repo = repository_with_visits(&[
        (VisitId::new(1, 0), stars.clone()),
        (VisitId::new(2, 0), stars),
    ]);
    let visits = [VisitId::new(1, 0), VisitId::new(2, 0)];
    MatchedMultiVisitDataset::new(&repo, &visits, &PipelineConfig::default()).unwrap()
}

/// Four bins from 0.5 to 8 arcmin (edges 0.5, 1, 2, 4, 8); with a
/// 0.75 arcmin star pitch every bin is populated.
fn coarse_grid() -> CorrelationConfig {
    CorrelationConfig {
        nbins: 4,
        min_sep: 0.5,
        max_sep: 8.0,
        sep_units: SeparationUnits::Arcmin,
    }
}

#[test]
fn test_uniform_residual_shear_te1() {
    common::init_logging();

    let (e1, e2) = (0.01, -0.005);
    let dataset = sheared_line_dataset(12, 0.75, e1, e2);
    assert_eq!(dataset.safe.len(), 12);

    let tex = TExConfig::te1();
    let m = TExMeasurement::compute(&dataset, &tex, &coarse_grid()).unwrap();

    // Only the first bin (pairs at 0.75 arcmin) has a center <= 1 arcmin,
    // and its correlation is the uniform |g|^2.
    assert_eq!(m.name, "TE1");
    assert_eq!(m.filter_name, 'r');
    assert_relative_eq!(m.quantity, e1 * e1 + e2 * e2, max_relative = 1e-5);
    assert!(m.quantity_err > 0.0);
}

#[test]
fn test_uniform_residual_shear_te2() {
    common::init_logging();

    let (e1, e2) = (0.02, 0.01);
    let dataset = sheared_line_dataset(12, 0.75, e1, e2);

    let tex = TExConfig::te2();
    let m = TExMeasurement::compute(&dataset, &tex, &coarse_grid()).unwrap();

    // The last bin (pairs at 4.5 to 7.5 arcmin) is the only one with center
    // >= 5 arcmin; uniform field again gives |g|^2.
    assert_relative_eq!(m.quantity, e1 * e1 + e2 * e2, max_relative = 1e-5);
}

#[test]
fn test_zero_residual_measures_zero() {
    common::init_logging();

    // Source shapes identical to the PSF: residuals vanish and so does the
    // correlation, as a measured zero rather than a failure.
    let dataset = sheared_line_dataset(10, 0.75, 0.0, 0.0);
    let m = TExMeasurement::compute(&dataset, &TExConfig::te1(), &coarse_grid()).unwrap();
    assert_eq!(m.quantity, 0.0);
}

#[test]
fn test_empty_bin_selection_is_measurement_failure() {
    common::init_logging();

    let dataset = sheared_line_dataset(10, 0.75, 0.01, 0.0);
    // No bin of the coarse grid has a center at or below 0.1 arcmin.
    let tex = TExConfig {
        name: "TE1",
        d_arcmin: 0.1,
        operator: matched_visits::correlation::BinOperator::Le,
    };
    let err = TExMeasurement::compute(&dataset, &tex, &coarse_grid()).unwrap_err();
    assert!(matches!(
        err,
        MeasurementError::Correlation {
            source: CorrelationError::EmptyBinSelection { .. },
            ..
        }
    ));
}

#[test]
fn test_single_safe_star_cannot_be_correlated() {
    common::init_logging();

    let dataset = sheared_line_dataset(1, 0.75, 0.01, 0.0);
    // One star matches across the two visits into one safe group; no pairs.
    assert!(dataset.safe.len() <= 1);
    let err =
        TExMeasurement::compute(&dataset, &TExConfig::te1(), &coarse_grid()).unwrap_err();
    assert!(matches!(
        err,
        MeasurementError::Correlation {
            source: CorrelationError::InsufficientStars { .. },
            ..
        }
    ));
}

#[test]
fn test_profile_carried_for_diagnostics() {
    common::init_logging();

    let dataset = sheared_line_dataset(12, 0.75, 0.01, 0.0);
    let m = TExMeasurement::compute(&dataset, &TExConfig::te1(), &coarse_grid()).unwrap();

    assert_eq!(m.profile.nbins(), 4);
    // Pairs exist in every bin of the coarse grid for this pitch.
    assert!(m.profile.npairs.iter().all(|&n| n > 0));
    for b in 1..m.profile.nbins() {
        assert!(m.profile.radius[b] > m.profile.radius[b - 1]);
    }
}
