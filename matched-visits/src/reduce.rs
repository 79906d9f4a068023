//! Star-group quality filtering and summary statistics.
//!
//! Match groups pass through two nested quality filters:
//!
//! - *good*: at least 2 members, no disqualifying flags, all magnitudes
//!   finite, median SNR >= 3;
//! - *safe*: good, and additionally median SNR >= the configured threshold
//!   and maximum extendedness < 1.0 (bright, compact, point-like).
//!
//! `safe` is always a subset of `good`. Both predicates are pure functions
//! of a group's members and short-circuit cheapest-first: the size check
//! runs before the flag scan, which runs before any statistics.

use log::info;
use sky_math::units::rad_to_mas;
use sky_math::{mean, median, position_rms, std_dev, Equatorial};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::loader::load_visits;
use crate::matcher::{match_visits, MatchGroup, MatchedCatalog};
use crate::record::VisitId;
use crate::repository::VisitRepository;

/// Default median SNR required for a group to be *good*.
pub const GOOD_SNR: f64 = 3.0;

/// Maximum extendedness for a group to be *safe*.
pub const SAFE_MAX_EXTENDED: f64 = 1.0;

const MIN_MATCHES_REQUIRED: usize = 2;

/// Errors from dataset construction.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// The configuration failed validation before any loading began.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// No visit produced any usable records.
    #[error("no records loaded from any of the {requested} requested visits")]
    NoData {
        /// Number of visits requested.
        requested: usize,
    },

    /// Matching succeeded but no group survived the *good* filter.
    #[error("no good matches among {groups} match groups")]
    NoGoodMatches {
        /// Total number of match groups before filtering.
        groups: usize,
    },

    /// The loaded visits span more than one filter band.
    #[error("visits span multiple filter bands: {filters:?}")]
    MixedFilters {
        /// The bands that were observed.
        filters: Vec<char>,
    },
}

/// True if a group passes the *good* quality filter at the given median
/// SNR floor (default [`GOOD_SNR`]).
pub fn is_good(group: &MatchGroup, good_snr: f64) -> bool {
    if group.len() < MIN_MATCHES_REQUIRED {
        return false;
    }
    if group.members.iter().any(|m| m.record.flags.any()) {
        return false;
    }
    if !group.members.iter().all(|m| m.record.mag.is_finite()) {
        return false;
    }
    // A NaN median SNR fails the comparison, so an unphysical SNR also
    // rejects the group here.
    match median(&snrs(group)) {
        Ok(snr) => snr >= good_snr,
        Err(_) => false,
    }
}

/// True if a *good* group additionally passes the *safe* filter.
///
/// Callers are expected to have applied [`is_good`] first; this predicate
/// only evaluates the brightness and compactness criteria.
pub fn is_safe(group: &MatchGroup, safe_snr: f64) -> bool {
    let Ok(snr) = median(&snrs(group)) else {
        return false;
    };
    // f64::max ignores NaN, so an undefined extendedness must reject the
    // group before the maximum is taken.
    if group
        .members
        .iter()
        .any(|m| m.record.extendedness.is_nan())
    {
        return false;
    }
    let extended = group
        .members
        .iter()
        .map(|m| m.record.extendedness)
        .fold(f64::MIN, f64::max);
    snr >= safe_snr && extended < SAFE_MAX_EXTENDED
}

fn mags(group: &MatchGroup) -> Vec<f64> {
    group.members.iter().map(|m| m.record.mag).collect()
}

fn mag_errs(group: &MatchGroup) -> Vec<f64> {
    group.members.iter().map(|m| m.record.mag_err).collect()
}

fn snrs(group: &MatchGroup) -> Vec<f64> {
    group.members.iter().map(|m| m.record.snr).collect()
}

fn positions(group: &MatchGroup) -> Vec<Equatorial> {
    group.members.iter().map(|m| m.record.position).collect()
}

/// Match groups surviving a quality filter, with per-group statistics.
///
/// Groups are stored by reference-free clone so the sample owns its data
/// and can outlive the matched catalog it was drawn from.
#[derive(Debug, Clone, Default)]
pub struct ReducedStarSample {
    /// The surviving groups.
    pub groups: Vec<MatchGroup>,
}

impl ReducedStarSample {
    /// Filter a matched catalog by a predicate.
    pub fn filter<F>(catalog: &MatchedCatalog, predicate: F) -> Self
    where
        F: Fn(&MatchGroup) -> bool,
    {
        Self {
            groups: catalog.groups().filter(|g| predicate(*g)).cloned().collect(),
        }
    }

    /// Filter this sample further by a predicate.
    pub fn refine<F>(&self, predicate: F) -> Self
    where
        F: Fn(&MatchGroup) -> bool,
    {
        Self {
            groups: self.groups.iter().filter(|g| predicate(*g)).cloned().collect(),
        }
    }

    /// Number of groups in the sample.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True if no group survived the filter.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Per-group mean magnitude.
    pub fn group_mean_mags(&self) -> Vec<f64> {
        self.aggregate(|g| mean(&mags(g)).unwrap_or(f64::NAN))
    }

    /// Per-group magnitude RMS (repeatability scatter).
    pub fn group_mag_rms(&self) -> Vec<f64> {
        self.aggregate(|g| std_dev(&mags(g)).unwrap_or(f64::NAN))
    }

    /// Per-group median magnitude uncertainty.
    pub fn group_median_mag_err(&self) -> Vec<f64> {
        self.aggregate(|g| median(&mag_errs(g)).unwrap_or(f64::NAN))
    }

    /// Per-group median SNR.
    pub fn group_median_snr(&self) -> Vec<f64> {
        self.aggregate(|g| median(&snrs(g)).unwrap_or(f64::NAN))
    }

    /// Per-group positional RMS in milliarcseconds.
    pub fn group_position_rms_mas(&self) -> Vec<f64> {
        self.aggregate(|g| rad_to_mas(position_rms(&positions(g))))
    }

    /// Per-group mean sky direction.
    pub fn group_mean_positions(&self) -> Vec<Equatorial> {
        self.groups
            .iter()
            .filter_map(|g| sky_math::mean_position(&positions(g)))
            .collect()
    }

    /// Per-group median residual ellipticity components (source minus PSF).
    pub fn group_median_residual_ellipticities(&self) -> (Vec<f64>, Vec<f64>) {
        let e1: Vec<f64> = self.aggregate(|g| {
            let res: Vec<f64> = g.members.iter().map(|m| m.record.e1_residual()).collect();
            median(&res).unwrap_or(f64::NAN)
        });
        let e2: Vec<f64> = self.aggregate(|g| {
            let res: Vec<f64> = g.members.iter().map(|m| m.record.e2_residual()).collect();
            median(&res).unwrap_or(f64::NAN)
        });
        (e1, e2)
    }

    fn aggregate<F>(&self, f: F) -> Vec<f64>
    where
        F: Fn(&MatchGroup) -> f64,
    {
        self.groups.iter().map(f).collect()
    }
}

/// Scalar summary statistics over the *good* sample.
#[derive(Debug, Clone, Copy)]
pub struct SummaryStatistics {
    /// Mean of the per-group mean PSF magnitudes (mag).
    pub mag: f64,
    /// Mean of the per-group magnitude RMS values (mag).
    pub mag_rms: f64,
    /// Median of the per-group median magnitude uncertainties (mag).
    pub mag_err: f64,
    /// Median of the per-group median SNRs (dimensionless).
    pub snr: f64,
    /// Mean of the per-group positional RMS values (milliarcseconds).
    pub dist_mas: f64,
}

/// Matched star catalogs from multiple visits, filtered and summarized.
///
/// Built once per (repository, visit list, configuration); immutable
/// afterwards. Construction runs the full load -> match -> reduce pipeline
/// and fails explicitly when the result would be undefined.
#[derive(Debug, Clone)]
pub struct MatchedMultiVisitDataset {
    /// Filter band shared by all loaded visits.
    pub filter_name: char,
    /// Scalar summaries over the *good* sample.
    pub summary: SummaryStatistics,
    /// Groups passing the *good* filter.
    pub good: ReducedStarSample,
    /// Groups passing the *safe* filter (subset of `good`).
    pub safe: ReducedStarSample,
    /// Number of match groups before any filtering.
    pub total_groups: usize,
}

impl MatchedMultiVisitDataset {
    /// Build the dataset from a repository and a visit list.
    ///
    /// The configuration is validated first, so a malformed configuration
    /// fails before any visit is loaded.
    pub fn new(
        repo: &dyn VisitRepository,
        visit_ids: &[VisitId],
        config: &PipelineConfig,
    ) -> Result<Self, DatasetError> {
        config.validate()?;
        Self::from_loaded(repo, visit_ids, config)
    }

    fn from_loaded(
        repo: &dyn VisitRepository,
        visit_ids: &[VisitId],
        config: &PipelineConfig,
    ) -> Result<Self, DatasetError> {
        let loaded = load_visits(repo, visit_ids);
        if loaded.total_records() == 0 {
            return Err(DatasetError::NoData {
                requested: visit_ids.len(),
            });
        }
        if loaded.filters.len() != 1 {
            return Err(DatasetError::MixedFilters {
                filters: loaded.filters.clone(),
            });
        }
        let filter_name = loaded.filters[0];

        let matched = match_visits(&loaded, config.match_radius_rad());
        Self::reduce(filter_name, &matched, config)
    }

    /// Reduce an already-matched catalog. Exposed for tests that build
    /// matched catalogs directly.
    pub fn reduce(
        filter_name: char,
        matched: &MatchedCatalog,
        config: &PipelineConfig,
    ) -> Result<Self, DatasetError> {
        let good = ReducedStarSample::filter(matched, |g| is_good(g, config.good_snr));
        if good.is_empty() {
            return Err(DatasetError::NoGoodMatches {
                groups: matched.num_groups(),
            });
        }
        let safe = good.refine(|g| is_safe(g, config.safe_snr));

        // The good sample is non-empty and all its magnitudes are finite,
        // so these aggregations cannot fail.
        let summary = SummaryStatistics {
            mag: mean(&good.group_mean_mags()).unwrap_or(f64::NAN),
            mag_rms: mean(&good.group_mag_rms()).unwrap_or(f64::NAN),
            mag_err: median(&good.group_median_mag_err()).unwrap_or(f64::NAN),
            snr: median(&good.group_median_snr()).unwrap_or(f64::NAN),
            dist_mas: mean(&good.group_position_rms_mas()).unwrap_or(f64::NAN),
        };

        if config.verbose {
            info!(
                "reduced {} groups: {} good, {} safe (band {}, median SNR {:.1})",
                matched.num_groups(),
                good.len(),
                safe.len(),
                filter_name,
                summary.snr
            );
        }

        Ok(Self {
            filter_name,
            summary,
            good,
            safe,
            total_groups: matched.num_groups(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadedVisits;
    use crate::record::{SourceFlags, SourceRecord, VisitCatalog};
    use approx::assert_relative_eq;
    use sky_math::units::arcsec_to_rad;
    use sky_math::SecondMoments;

    fn star(ra_deg: f64, dec_deg: f64, snr: f64, mag: f64) -> SourceRecord {
        let shape = SecondMoments::new(2.0, 2.0, 0.0);
        SourceRecord {
            position: Equatorial::from_degrees(ra_deg, dec_deg),
            psf_flux: snr * 1e7,
            psf_flux_err: 1e7,
            snr,
            mag,
            mag_err: 1.0857 / snr,
            shape,
            ellipticity: shape.ellipticity(),
            psf_ellipticity: shape.ellipticity(),
            extendedness: 0.0,
            flags: SourceFlags::default(),
        }
    }

    fn catalog_of(visits: Vec<Vec<SourceRecord>>) -> MatchedCatalog {
        let loaded = LoadedVisits {
            catalogs: visits
                .into_iter()
                .enumerate()
                .map(|(i, records)| VisitCatalog {
                    id: crate::record::VisitId::new(i as u32 + 1, 0),
                    records,
                })
                .collect(),
            filters: vec!['r'],
        };
        match_visits(&loaded, arcsec_to_rad(1.0))
    }

    #[test]
    fn test_good_requires_two_members() {
        let matched = catalog_of(vec![vec![star(150.0, 2.0, 100.0, 20.0)]]);
        let group = matched.groups().next().unwrap();
        assert!(!is_good(group, GOOD_SNR));
    }

    #[test]
    fn test_good_rejects_flagged_member() {
        let mut flagged = star(150.0, 2.0, 100.0, 20.0);
        flagged.flags.saturated = true;
        let matched = catalog_of(vec![vec![star(150.0, 2.0, 100.0, 20.0)], vec![flagged]]);
        let group = matched.groups().next().unwrap();
        assert_eq!(group.len(), 2);
        assert!(!is_good(group, GOOD_SNR));
    }

    #[test]
    fn test_good_rejects_nonfinite_magnitude() {
        let matched = catalog_of(vec![
            vec![star(150.0, 2.0, 100.0, 20.0)],
            vec![star(150.0, 2.0, 100.0, f64::NAN)],
        ]);
        assert!(!is_good(matched.groups().next().unwrap(), GOOD_SNR));
    }

    #[test]
    fn test_good_rejects_low_snr() {
        let matched = catalog_of(vec![
            vec![star(150.0, 2.0, 2.0, 20.0)],
            vec![star(150.0, 2.0, 2.0, 20.0)],
        ]);
        assert!(!is_good(matched.groups().next().unwrap(), GOOD_SNR));
    }

    #[test]
    fn test_safe_is_subset_of_good() {
        let matched = catalog_of(vec![
            vec![star(150.0, 2.0, 100.0, 20.0), star(150.1, 2.1, 10.0, 22.0)],
            vec![star(150.0, 2.0, 100.0, 20.0), star(150.1, 2.1, 10.0, 22.0)],
        ]);
        let good = ReducedStarSample::filter(&matched, |g| is_good(g, GOOD_SNR));
        let safe = good.refine(|g| is_safe(g, 50.0));
        assert_eq!(good.len(), 2);
        assert_eq!(safe.len(), 1);
        for g in &safe.groups {
            assert!(good.groups.iter().any(|h| h.object_id == g.object_id));
        }
    }

    #[test]
    fn test_safe_rejects_extended_sources() {
        let mut extended = star(150.0, 2.0, 100.0, 20.0);
        extended.extendedness = 1.0;
        let matched = catalog_of(vec![vec![star(150.0, 2.0, 100.0, 20.0)], vec![extended]]);
        let group = matched.groups().next().unwrap();
        assert!(is_good(group, GOOD_SNR));
        assert!(!is_safe(group, 50.0));
    }

    #[test]
    fn test_safe_rejects_nan_extendedness() {
        let mut undefined = star(150.0, 2.0, 100.0, 20.0);
        undefined.extendedness = f64::NAN;
        let matched = catalog_of(vec![vec![star(150.0, 2.0, 100.0, 20.0)], vec![undefined]]);
        let group = matched.groups().next().unwrap();
        assert!(is_good(group, GOOD_SNR));
        assert!(!is_safe(group, 50.0));
    }

    #[test]
    fn test_good_floor_follows_configured_threshold() {
        // Median SNR 10 passes the default floor but not a raised one.
        let matched = catalog_of(vec![
            vec![star(150.0, 2.0, 10.0, 20.0)],
            vec![star(150.0, 2.0, 10.0, 20.0)],
        ]);
        let group = matched.groups().next().unwrap();
        assert!(is_good(group, GOOD_SNR));
        assert!(!is_good(group, 25.0));
    }

    #[test]
    fn test_dataset_summary_two_visit_star() {
        let pair = catalog_of(vec![
            vec![star(150.0, 2.0, 100.0, 20.0)],
            vec![star(150.0, 2.0, 100.0, 20.0)],
        ]);
        let config = PipelineConfig::default();
        let ds = MatchedMultiVisitDataset::reduce('r', &pair, &config).unwrap();
        assert_eq!(ds.good.len(), 1);
        assert_eq!(ds.safe.len(), 1);
        assert_relative_eq!(ds.summary.snr, 100.0);
        assert_relative_eq!(ds.summary.mag, 20.0);
        assert_relative_eq!(ds.summary.mag_rms, 0.0);
        // Identical positions: zero positional scatter.
        assert_relative_eq!(ds.summary.dist_mas, 0.0);
    }

    #[test]
    fn test_dataset_rejects_all_singletons() {
        let singles = catalog_of(vec![vec![star(150.0, 2.0, 100.0, 20.0)]]);
        let config = PipelineConfig::default();
        let err = MatchedMultiVisitDataset::reduce('r', &singles, &config).unwrap_err();
        assert!(matches!(err, DatasetError::NoGoodMatches { groups: 1 }));
    }

    #[test]
    fn test_position_scatter_reported_in_mas() {
        // Two detections 1 arcsec apart along declination: RMS about the
        // mean is 0.5 arcsec = 500 mas.
        let matched = catalog_of(vec![
            vec![star(150.0, 2.0, 100.0, 20.0)],
            vec![star(150.0, 2.0 + 1.0 / 3600.0, 100.0, 20.0)],
        ]);
        let good = ReducedStarSample::filter(&matched, |g| is_good(g, GOOD_SNR));
        let dist = good.group_position_rms_mas();
        assert_eq!(dist.len(), 1);
        assert_relative_eq!(dist[0], 500.0, max_relative = 1e-6);
    }
}
