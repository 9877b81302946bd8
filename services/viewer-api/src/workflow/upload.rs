//! Store one accepted upload, record it and convert it.

use std::fmt;
use std::path::PathBuf;

use tracing::{error, warn};
use viewer_common::{RecordKind, ViewerError};

use crate::metrics::{record_outcome, Workflow};
use crate::state::AppState;
use crate::validation::UploadedFile;
use crate::workflow::convert_upload;

/// Why a single file of an upload did not make it into the gallery.
#[derive(Debug)]
pub enum UploadFailure {
    /// The file could not be stored or recorded.
    Saving { name: String, error: ViewerError },
    /// Conversion failed; the record and stored file were rolled back.
    Processing { name: String, error: ViewerError },
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadFailure::Saving { name, error } => write!(f, "Error saving {name}: {error}"),
            UploadFailure::Processing { name, error } => {
                write!(f, "Error processing {name}: {error}")
            }
        }
    }
}

/// Save `file` under `images/`, create its record and convert it.
///
/// A failed conversion deletes the record and the stored file so the gallery
/// never lists a raster without a preview.
pub async fn process_upload(state: &AppState, file: &UploadedFile) -> Result<PathBuf, UploadFailure> {
    let result = process_inner(state, file).await;
    record_outcome(Workflow::Upload, result.is_ok());
    result
}

async fn process_inner(state: &AppState, file: &UploadedFile) -> Result<PathBuf, UploadFailure> {
    let saving = |error: ViewerError| UploadFailure::Saving {
        name: file.name.clone(),
        error,
    };

    let source_path = state
        .media
        .save_upload(&file.name, &file.data)
        .await
        .map_err(saving)?;

    let record = match state.catalog.create(&source_path, RecordKind::Upload).await {
        Ok(record) => record,
        Err(e) => {
            remove_quietly(state, &source_path).await;
            return Err(saving(e));
        }
    };

    match convert_upload(state, &record).await {
        Ok(png) => Ok(png),
        Err(e) => {
            error!(name = %file.name, error = %e, "Conversion failed, rolling back upload");
            if let Err(db) = state.catalog.delete(record.id).await {
                warn!(id = record.id, error = %db, "Could not delete record");
            }
            remove_quietly(state, &source_path).await;
            Err(UploadFailure::Processing {
                name: file.name.clone(),
                error: e,
            })
        }
    }
}

async fn remove_quietly(state: &AppState, relative: &str) {
    if let Err(e) = state.media.remove(relative).await {
        warn!(path = %relative, error = %e, "Could not remove stored upload");
    }
}
