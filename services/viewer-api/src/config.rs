//! Service configuration.
//!
//! Resolved once at startup (CLI flags, environment, `.env`) and carried in
//! [`AppState`](crate::state::AppState) to every handler and workflow.

use std::path::PathBuf;

use viewer_common::{ViewerError, ViewerResult};

/// Per-file upload ceiling accepted by the upload form.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Files accepted in one upload request before the body limit applies.
const MAX_FILES_PER_REQUEST: u64 = 16;

/// Decoded bytes allowed per accepted upload byte. Compressed GeoTIFFs and
/// the Float32 composite decode to several times their file size.
const DECODE_LIMIT_FACTOR: u64 = 8;

/// Smallest decode limit, so small upload ceilings can still merge.
const MIN_DECODE_LIMIT: u64 = 256 * MIB;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Directory holding `images/`, `images/png/` and `composites/`.
    pub media_root: PathBuf,
    /// URL path the media root is served under, e.g. `/media`.
    pub media_url: String,
    /// SQLite URL of the image catalog.
    pub database_url: String,
    pub listen: String,
    pub max_upload_bytes: u64,
    /// Map tile key handed to the gallery client.
    pub map_key: String,
}

impl ViewerConfig {
    /// Defaults for a media root, with the catalog stored inside it.
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        let media_root = media_root.into();
        let database_url = format!("sqlite://{}", media_root.join("viewer.db").display());
        Self {
            media_root,
            media_url: "/media".to_string(),
            database_url,
            listen: "0.0.0.0:8000".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            map_key: String::new(),
        }
    }

    /// Reject settings the router cannot be built from.
    pub fn validate(&self) -> ViewerResult<()> {
        let url = self.media_url.trim_end_matches('/');
        if !url.starts_with('/') || url.is_empty() {
            return Err(ViewerError::InvalidInput(format!(
                "media URL must be an absolute path below '/', got '{}'",
                self.media_url
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(ViewerError::InvalidInput(
                "max upload size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Media URL prefix without a trailing slash.
    pub fn media_mount(&self) -> &str {
        self.media_url.trim_end_matches('/')
    }

    /// Largest request body the upload route reads.
    pub fn request_body_limit(&self) -> usize {
        let limit = self
            .max_upload_bytes
            .saturating_add(MIB)
            .saturating_mul(MAX_FILES_PER_REQUEST);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }

    /// Largest decoded raster, in bytes, the engine will allocate.
    pub fn decode_limit(&self) -> usize {
        let limit = self
            .max_upload_bytes
            .saturating_mul(DECODE_LIMIT_FACTOR)
            .max(MIN_DECODE_LIMIT);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }

    /// The upload ceiling as shown to users: `100MB`, `512KB`, `1000 bytes`.
    pub fn upload_limit_label(&self) -> String {
        let bytes = self.max_upload_bytes;
        if bytes % MIB == 0 {
            format!("{}MB", bytes / MIB)
        } else if bytes % 1024 == 0 {
            format!("{}KB", bytes / 1024)
        } else {
            format!("{bytes} bytes")
        }
    }
}
