//! Application state and shared resources.

use std::sync::Arc;

use anyhow::{Context, Result};
use raster::{GeoTiffEngine, RasterEngine};
use storage::{ImageCatalog, MediaStore};
use tracing::info;

use crate::config::ViewerConfig;

/// Shared application state.
pub struct AppState {
    pub config: ViewerConfig,
    pub catalog: ImageCatalog,
    pub media: MediaStore,
    pub engine: Arc<dyn RasterEngine>,
}

impl AppState {
    /// Open the catalog, prepare the media layout and use the GeoTIFF engine
    /// bounded by the configured decode limit.
    pub async fn new(config: ViewerConfig) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let media = MediaStore::new(&config.media_root, &config.media_url);
        media
            .ensure_layout()
            .await
            .with_context(|| format!("Failed to prepare {}", config.media_root.display()))?;

        let catalog = ImageCatalog::connect(&config.database_url)
            .await
            .context("Failed to open image catalog")?;

        let decode_limit = config.decode_limit();
        info!(
            media_root = %config.media_root.display(),
            media_url = %config.media_url,
            decode_limit,
            "Application state ready"
        );

        Ok(Self::from_parts(
            config,
            catalog,
            media,
            Arc::new(GeoTiffEngine::with_decode_limit(decode_limit)),
        ))
    }

    /// Assemble state from already-open parts.
    pub fn from_parts(
        config: ViewerConfig,
        catalog: ImageCatalog,
        media: MediaStore,
        engine: Arc<dyn RasterEngine>,
    ) -> Self {
        Self {
            config,
            catalog,
            media,
            engine,
        }
    }
}
