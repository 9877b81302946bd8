//! Upload form, gallery and composite endpoints.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, rejection::FormRejection, Extension, Form, Multipart},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use viewer_common::ViewerError;

use crate::handlers::common::{gallery, ApiError, GalleryImage};
use crate::state::AppState;
use crate::validation::{validate_upload, UploadedFile};
use crate::workflow::{merge_selected, parse_ids, process_upload};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    pub images: Vec<GalleryImage>,
    pub map_key: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub successes: Vec<String>,
    pub errors: Vec<String>,
    pub images: Vec<GalleryImage>,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub png_url: String,
    pub extent: [f64; 4],
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertForm {
    #[serde(default)]
    pub pics: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /viewer/upload - the gallery and the map key
pub async fn gallery_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<GalleryResponse>, ApiError> {
    Ok(Json(GalleryResponse {
        images: gallery(&state).await?,
        map_key: state.config.map_key.clone(),
    }))
}

/// POST /viewer/upload - store, record and convert every `file` part
#[instrument(skip_all)]
pub async fn upload_handler(
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let files = read_files(&mut multipart, state.config.max_upload_bytes)
        .await
        .map_err(|e| ViewerError::InvalidUpload(format!("Malformed upload: {e}")))?;

    let limit = state.config.upload_limit_label();
    if let Err(message) = validate_upload(&files, state.config.max_upload_bytes, &limit) {
        warn!(error = %message, "Upload rejected");
        let body = UploadResponse {
            successes: Vec::new(),
            errors: vec![format!("file: {message}")],
            images: gallery(&state).await?,
        };
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    let mut successes = Vec::new();
    let mut errors = Vec::new();
    for file in &files {
        match process_upload(&state, file).await {
            Ok(png) => {
                info!(name = %file.name, png = %png.display(), "Upload processed");
                successes.push(format!(
                    "{} processed to PNG and saved successfully.",
                    file.name
                ));
            }
            Err(failure) => errors.push(failure.to_string()),
        }
    }

    let body = UploadResponse {
        successes,
        errors,
        images: gallery(&state).await?,
    };
    Ok(Json(body).into_response())
}

/// /viewer/convert - merge the images listed in `pics` into the composite
#[instrument(skip_all)]
pub async fn convert_handler(
    method: Method,
    Extension(state): Extension<Arc<AppState>>,
    form: Result<Form<ConvertForm>, FormRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    if method != Method::POST {
        return Err(ViewerError::InvalidInput("POST required".to_string()).into());
    }
    // An unreadable body selects nothing
    let form = match form {
        Ok(Form(form)) => form,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable convert form");
            ConvertForm::default()
        }
    };

    let ids = parse_ids(&form.pics);
    let outcome = merge_selected(&state, &ids).await?;
    Ok(Json(ConvertResponse {
        success: true,
        png_url: outcome.png_url,
        extent: outcome.extent,
    }))
}

/// Collect the `file` parts of a multipart body.
///
/// Parts larger than `max_bytes` keep their size but drop their contents;
/// empty parts are skipped.
async fn read_files(
    multipart: &mut Multipart,
    max_bytes: u64,
) -> Result<Vec<UploadedFile>, MultipartError> {
    let mut files = Vec::new();
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("file").to_string();
        let mut file = UploadedFile::new(name, Vec::new());

        while let Some(chunk) = field.chunk().await? {
            file.size += chunk.len() as u64;
            if file.is_oversized(max_bytes) {
                if !file.data.is_empty() {
                    file.data = Vec::new();
                }
            } else {
                file.data.extend_from_slice(&chunk);
            }
        }

        if file.size > 0 {
            files.push(file);
        }
    }
    Ok(files)
}
