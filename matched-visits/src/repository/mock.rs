//! In-memory repository backend for tests and synthetic runs.

use std::collections::HashMap;

use sky_math::SecondMoments;

use super::{
    ConstantPsf, PhotoCalib, PsfModel, RawSource, RepositoryError, RepositoryResult,
    VisitRepository,
};
use crate::record::VisitId;

/// One registered visit in a [`MockRepository`].
#[derive(Debug, Clone)]
struct MockVisit {
    calib: PhotoCalib,
    psf_shape: SecondMoments,
    sources: Vec<RawSource>,
    poisoned: Option<String>,
}

/// Repository backend holding visits registered programmatically.
///
/// Visits can be poisoned to simulate corrupt calibration metadata, which
/// exercises the loader's skip-and-continue path.
#[derive(Debug, Default)]
pub struct MockRepository {
    visits: HashMap<VisitId, MockVisit>,
}

impl MockRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a visit with its calibration, PSF shape, and source table.
    pub fn add_visit(
        &mut self,
        id: VisitId,
        calib: PhotoCalib,
        psf_shape: SecondMoments,
        sources: Vec<RawSource>,
    ) {
        self.visits.insert(
            id,
            MockVisit {
                calib,
                psf_shape,
                sources,
                poisoned: None,
            },
        );
    }

    /// Mark a registered visit's metadata as malformed.
    ///
    /// Subsequent `photo_calib` calls for that visit fail with
    /// [`RepositoryError::MalformedMetadata`].
    pub fn poison_visit(&mut self, id: VisitId, reason: &str) {
        if let Some(visit) = self.visits.get_mut(&id) {
            visit.poisoned = Some(reason.to_string());
        }
    }

    fn visit(&self, id: VisitId, what: &'static str) -> RepositoryResult<&MockVisit> {
        self.visits.get(&id).ok_or(RepositoryError::MissingData {
            visit: id.visit,
            detector: id.detector,
            what,
        })
    }
}

impl VisitRepository for MockRepository {
    fn photo_calib(&self, id: VisitId) -> RepositoryResult<PhotoCalib> {
        let visit = self.visit(id, "calexp metadata")?;
        if let Some(reason) = &visit.poisoned {
            return Err(RepositoryError::MalformedMetadata {
                visit: id.visit,
                detector: id.detector,
                reason: reason.clone(),
            });
        }
        Ok(visit.calib)
    }

    fn psf_model(&self, id: VisitId) -> RepositoryResult<Box<dyn PsfModel>> {
        let visit = self.visit(id, "psf model")?;
        Ok(Box::new(ConstantPsf {
            shape: visit.psf_shape,
        }))
    }

    fn source_table(&self, id: VisitId) -> RepositoryResult<Vec<RawSource>> {
        Ok(self.visit(id, "source table")?.sources.clone())
    }
}
