//! Shared response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use viewer_common::{ImageRecord, ViewerError};

use crate::state::AppState;

/// `{"error": "..."}` with the status of the underlying error.
#[derive(Debug)]
pub struct ApiError(pub ViewerError);

impl From<ViewerError> for ApiError {
    fn from(err: ViewerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// One gallery entry.
#[derive(Debug, Serialize)]
pub struct GalleryImage {
    pub id: i64,
    pub name: String,
    pub source_url: String,
    pub png_url: Option<String>,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub extent: Option<[f64; 4]>,
    pub created_at: String,
}

impl GalleryImage {
    pub fn from_record(state: &AppState, record: &ImageRecord) -> Self {
        Self {
            id: record.id,
            name: record.label().to_string(),
            source_url: state.media.url(&record.source_path),
            png_url: record.preview_path.as_deref().map(|p| state.media.url(p)),
            extent: record.bounding_box.map(|b| b.as_array()),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// The current gallery, newest first.
pub async fn gallery(state: &AppState) -> Result<Vec<GalleryImage>, ViewerError> {
    let records = state.catalog.list_gallery().await?;
    Ok(records
        .iter()
        .map(|r| GalleryImage::from_record(state, r))
        .collect())
}
