//! matched-visits - Multi-visit star matching and repeatability statistics.
//!
//! This crate reduces repeated observations of the same field into
//! calibration-quality statistics:
//!
//! 1. **Loader** - per-visit source tables extended with SNR, calibrated
//!    magnitude, and source/PSF ellipticities ([`loader`])
//! 2. **Matcher** - friends-of-friends grouping of detections into
//!    physical stars across visits ([`matcher`])
//! 3. **Reducer** - good/safe quality filtering and per-band summary
//!    statistics ([`reduce`])
//! 4. **Correlation** - binned two-point shear correlation of PSF-residual
//!    ellipticities and the TE1/TE2 measurements ([`correlation`],
//!    [`measurement`])
//!
//! Data access goes through the [`repository::VisitRepository`] trait;
//! backends exist for in-memory mocks and on-disk JSON catalogs.
//!
//! # Example
//!
//! ```no_run
//! use matched_visits::config::PipelineConfig;
//! use matched_visits::record::VisitId;
//! use matched_visits::reduce::MatchedMultiVisitDataset;
//! use matched_visits::repository::json::JsonRepository;
//!
//! let repo = JsonRepository::new("/data/run42");
//! let visits = [VisitId::new(100, 0), VisitId::new(101, 0)];
//! let dataset =
//!     MatchedMultiVisitDataset::new(&repo, &visits, &PipelineConfig::default())?;
//! println!("median SNR over good matches: {:.1}", dataset.summary.snr);
//! # Ok::<(), matched_visits::reduce::DatasetError>(())
//! ```

pub mod config;
pub mod correlation;
pub mod loader;
pub mod matcher;
pub mod measurement;
pub mod record;
pub mod reduce;
pub mod repository;

pub use config::{ConfigError, CorrelationConfig, PipelineConfig};
pub use correlation::{
    correlation_function_ellipticity, select_bin_from_corr, BinOperator, CorrelationError,
    CorrelationProfile,
};
pub use loader::{load_visits, LoadedVisits};
pub use matcher::{match_visits, MatchGroup, MatchedCatalog, MatchedRecord};
pub use measurement::{MeasurementError, TExConfig, TExMeasurement};
pub use record::{SourceFlags, SourceRecord, VisitCatalog, VisitId};
pub use reduce::{is_good, is_safe, DatasetError, MatchedMultiVisitDataset, ReducedStarSample};
pub use repository::{PhotoCalib, PsfModel, RawSource, RepositoryError, VisitRepository};
