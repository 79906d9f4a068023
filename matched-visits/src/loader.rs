//! Per-visit source loading and record extension.
//!
//! For each requested visit this stage fetches the photometric calibration,
//! the PSF model, and the raw source table, then extends every source with
//! the derived quantities downstream stages consume: SNR, calibrated
//! magnitude, source ellipticity, and the PSF model ellipticity evaluated at
//! the source centroid.
//!
//! A visit whose calibration or tables cannot be retrieved is logged and
//! skipped; one bad visit never aborts the run.

use log::{debug, info, warn};

use crate::record::{SourceRecord, VisitCatalog, VisitId};
use crate::repository::{PhotoCalib, PsfModel, RawSource, VisitRepository};

/// Everything the loader produced for one run.
#[derive(Debug, Clone, Default)]
pub struct LoadedVisits {
    /// One catalog per successfully loaded visit.
    pub catalogs: Vec<VisitCatalog>,
    /// Filter bands seen across the loaded visits, deduplicated in load
    /// order. A well-formed run observes a single band.
    pub filters: Vec<char>,
}

impl LoadedVisits {
    /// Total number of extended records across all loaded visits.
    pub fn total_records(&self) -> usize {
        self.catalogs.iter().map(VisitCatalog::len).sum()
    }

    /// Flattened view over all records with their visit identity.
    pub fn combined(&self) -> impl Iterator<Item = (VisitId, &SourceRecord)> {
        self.catalogs
            .iter()
            .flat_map(|cat| cat.records.iter().map(move |r| (cat.id, r)))
    }
}

/// Extend one raw source into a full [`SourceRecord`].
///
/// The magnitude transform is fallible per record: a `None` from the
/// calibration becomes NaN magnitude fields, which the quality filters later
/// treat as a predicate failure for the record's group.
fn extend_source(raw: &RawSource, calib: &PhotoCalib, psf: &dyn PsfModel) -> SourceRecord {
    let snr = raw.psf_flux / raw.psf_flux_err;
    let (mag, mag_err) = calib
        .magnitude(raw.psf_flux, raw.psf_flux_err)
        .unwrap_or((f64::NAN, f64::NAN));

    SourceRecord {
        position: raw.position,
        psf_flux: raw.psf_flux,
        psf_flux_err: raw.psf_flux_err,
        snr,
        mag,
        mag_err,
        shape: raw.shape,
        ellipticity: raw.shape.ellipticity(),
        psf_ellipticity: psf.shape_at(&raw.position).ellipticity(),
        extendedness: raw.extendedness,
        flags: raw.flags,
    }
}

/// Load and extend the source catalogs of the given visits.
///
/// Visits failing retrieval (missing data, malformed metadata, I/O errors)
/// are warned about and skipped. The result may therefore hold fewer
/// catalogs than `visit_ids`; it is empty when every visit failed.
pub fn load_visits(repo: &dyn VisitRepository, visit_ids: &[VisitId]) -> LoadedVisits {
    let mut loaded = LoadedVisits::default();

    for &id in visit_ids {
        let visit_data = (|| {
            let calib = repo.photo_calib(id)?;
            let psf = repo.psf_model(id)?;
            let sources = repo.source_table(id)?;
            Ok::<_, crate::repository::RepositoryError>((calib, psf, sources))
        })();

        let (calib, psf, sources) = match visit_data {
            Ok(data) => data,
            Err(e) => {
                warn!("could not load {id}: {e}; skipping visit");
                continue;
            }
        };

        info!("{} sources in {id}", sources.len());

        let records: Vec<SourceRecord> = sources
            .iter()
            .map(|raw| extend_source(raw, &calib, psf.as_ref()))
            .collect();

        let not_computable = records.iter().filter(|r| r.mag.is_nan()).count();
        if not_computable > 0 {
            debug!("{not_computable} records in {id} have no computable magnitude");
        }

        if !loaded.filters.contains(&calib.filter) {
            loaded.filters.push(calib.filter);
        }
        loaded.catalogs.push(VisitCatalog { id, records });
    }

    loaded
}
