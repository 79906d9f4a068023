//! JSON-file repository backend.
//!
//! Each visit lives in one file named `visit_<visit>_<detector>.json` under
//! the repository directory, holding the photometric calibration, the PSF
//! model shape, and the raw source table. This is the on-disk format the
//! CLI consumes; the schema is versioned only by field presence, with
//! missing or unparseable fields surfacing as malformed-metadata errors for
//! that visit alone.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sky_math::{Equatorial, SecondMoments};

use super::{
    ConstantPsf, PhotoCalib, PsfModel, RawSource, RepositoryError, RepositoryResult,
    VisitRepository,
};
use crate::record::{SourceFlags, VisitId};

/// On-disk form of a visit catalog file.
#[derive(Debug, Serialize, Deserialize)]
pub struct VisitFile {
    /// Photometric calibration of the visit.
    pub calib: CalibRecord,
    /// Spatially constant PSF second moments.
    pub psf_shape: MomentsRecord,
    /// Raw source table.
    pub sources: Vec<SourceRow>,
}

/// On-disk photometric calibration.
#[derive(Debug, Serialize, Deserialize)]
pub struct CalibRecord {
    /// Instrumental flux of a magnitude-zero source.
    pub flux_mag_0: f64,
    /// 1-sigma uncertainty of `flux_mag_0`.
    pub flux_mag_0_err: f64,
    /// Filter band, a single character (e.g. "r").
    pub filter: String,
}

/// On-disk second-moment triple.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MomentsRecord {
    /// Second central moment along x.
    pub ixx: f64,
    /// Second central moment along y.
    pub iyy: f64,
    /// Cross moment.
    pub ixy: f64,
}

impl From<MomentsRecord> for SecondMoments {
    fn from(m: MomentsRecord) -> Self {
        SecondMoments::new(m.ixx, m.iyy, m.ixy)
    }
}

/// On-disk source-table row.
#[derive(Debug, Serialize, Deserialize)]
pub struct SourceRow {
    /// Right ascension in degrees.
    pub ra_deg: f64,
    /// Declination in degrees.
    pub dec_deg: f64,
    /// PSF flux in instrumental units.
    pub psf_flux: f64,
    /// 1-sigma uncertainty of the PSF flux.
    pub psf_flux_err: f64,
    /// Measured second moments.
    pub shape: MomentsRecord,
    /// Star/galaxy classifier score.
    #[serde(default)]
    pub extendedness: f64,
    /// Saturated-pixel flag.
    #[serde(default)]
    pub flag_saturated: bool,
    /// Cosmic-ray flag.
    #[serde(default)]
    pub flag_cr: bool,
    /// Bad-pixel flag.
    #[serde(default)]
    pub flag_bad: bool,
    /// Detector-edge flag.
    #[serde(default)]
    pub flag_edge: bool,
}

impl From<&SourceRow> for RawSource {
    fn from(row: &SourceRow) -> Self {
        RawSource {
            position: Equatorial::from_degrees(row.ra_deg, row.dec_deg),
            psf_flux: row.psf_flux,
            psf_flux_err: row.psf_flux_err,
            shape: row.shape.into(),
            extendedness: row.extendedness,
            flags: SourceFlags {
                saturated: row.flag_saturated,
                cosmic_ray: row.flag_cr,
                bad: row.flag_bad,
                edge: row.flag_edge,
            },
        }
    }
}

/// Repository backend reading per-visit JSON catalog files from a directory.
#[derive(Debug, Clone)]
pub struct JsonRepository {
    root: PathBuf,
}

impl JsonRepository {
    /// Open a repository rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the catalog file for a visit.
    pub fn visit_path(&self, id: VisitId) -> PathBuf {
        self.root
            .join(format!("visit_{}_{}.json", id.visit, id.detector))
    }

    /// Write a visit catalog file. Used to build repositories for tests
    /// and synthetic datasets.
    pub fn write_visit(&self, id: VisitId, file: &VisitFile) -> RepositoryResult<()> {
        let json = serde_json::to_string_pretty(file).map_err(|e| {
            RepositoryError::MalformedMetadata {
                visit: id.visit,
                detector: id.detector,
                reason: e.to_string(),
            }
        })?;
        std::fs::write(self.visit_path(id), json)?;
        Ok(())
    }

    fn load(&self, id: VisitId, what: &'static str) -> RepositoryResult<VisitFile> {
        let path = self.visit_path(id);
        if !path.exists() {
            return Err(RepositoryError::MissingData {
                visit: id.visit,
                detector: id.detector,
                what,
            });
        }
        let text = std::fs::read_to_string(&path)?;
        serde_json::from_str(&text).map_err(|e| RepositoryError::MalformedMetadata {
            visit: id.visit,
            detector: id.detector,
            reason: e.to_string(),
        })
    }

    /// Repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl VisitRepository for JsonRepository {
    fn photo_calib(&self, id: VisitId) -> RepositoryResult<PhotoCalib> {
        let file = self.load(id, "calexp metadata")?;
        let filter = file.calib.filter.chars().next().ok_or_else(|| {
            RepositoryError::MalformedMetadata {
                visit: id.visit,
                detector: id.detector,
                reason: "empty filter name".to_string(),
            }
        })?;
        Ok(PhotoCalib {
            flux_mag_0: file.calib.flux_mag_0,
            flux_mag_0_err: file.calib.flux_mag_0_err,
            filter,
        })
    }

    fn psf_model(&self, id: VisitId) -> RepositoryResult<Box<dyn PsfModel>> {
        let file = self.load(id, "psf model")?;
        Ok(Box::new(ConstantPsf {
            shape: file.psf_shape.into(),
        }))
    }

    fn source_table(&self, id: VisitId) -> RepositoryResult<Vec<RawSource>> {
        let file = self.load(id, "source table")?;
        Ok(file.sources.iter().map(RawSource::from).collect())
    }
}
