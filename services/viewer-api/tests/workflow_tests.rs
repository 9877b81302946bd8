//! Workflow behaviour against a scripted raster engine.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use raster::{
    BandStatistics, GeoTransform, RasterDataset, RasterEngine, RasterError, RasterResult, Scaling,
    TranslateOptions,
};
use storage::{ImageCatalog, MediaStore, COMPOSITE_PNG, COMPOSITE_TIF};
use tempfile::TempDir;
use test_utils::temp_media_root;
use viewer_api::validation::UploadedFile;
use viewer_api::workflow::{convert_upload, merge_selected, process_upload, UploadFailure};
use viewer_api::{AppState, ViewerConfig};
use viewer_common::{Crs, RecordKind, ViewerError};

// ============================================================================
// Fake engine
// ============================================================================

#[derive(Clone)]
struct FakeDataset {
    geo_transform: Option<GeoTransform>,
    band_count: usize,
    declared: Option<(f64, f64)>,
    crs: Option<Crs>,
}

impl RasterDataset for FakeDataset {
    fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    fn size(&self) -> (usize, usize) {
        (4, 4)
    }

    fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    fn band_count(&self) -> usize {
        self.band_count
    }

    fn band_minimum(&self, _band: usize) -> Option<f64> {
        self.declared.map(|d| d.0)
    }

    fn band_maximum(&self, _band: usize) -> Option<f64> {
        self.declared.map(|d| d.1)
    }

    fn compute_statistics(&mut self, _band: usize) -> RasterResult<BandStatistics> {
        Ok(BandStatistics {
            min: 5.0,
            max: 25.0,
            mean: 15.0,
            std_dev: 1.0,
            valid_count: 16,
        })
    }
}

struct FakeEngine {
    dataset: FakeDataset,
    /// Opening any path containing this fragment fails.
    unreadable: Option<&'static str>,
    fail_merge: bool,
    write_png: bool,
    translations: Mutex<Vec<TranslateOptions>>,
    merges: Mutex<Vec<Vec<PathBuf>>>,
}

impl FakeEngine {
    fn new() -> Self {
        Self {
            dataset: FakeDataset {
                geo_transform: Some(GeoTransform::north_up(10.0, 50.0, 0.5, -0.5)),
                band_count: 1,
                declared: None,
                crs: None,
            },
            unreadable: None,
            fail_merge: false,
            write_png: true,
            translations: Mutex::new(Vec::new()),
            merges: Mutex::new(Vec::new()),
        }
    }

    fn last_translation(&self) -> TranslateOptions {
        self.translations.lock().unwrap().last().cloned().unwrap()
    }
}

impl RasterEngine for FakeEngine {
    fn open(&self, path: &Path) -> RasterResult<Box<dyn RasterDataset>> {
        if let Some(fragment) = self.unreadable {
            if path.to_string_lossy().contains(fragment) {
                return Err(RasterError::Unsupported("unreadable".to_string()));
            }
        }
        Ok(Box::new(self.dataset.clone()))
    }

    fn translate_to_png(
        &self,
        _src: &Path,
        dst: &Path,
        options: &TranslateOptions,
    ) -> RasterResult<()> {
        self.translations.lock().unwrap().push(options.clone());
        if self.write_png {
            std::fs::write(dst, b"png")?;
        }
        Ok(())
    }

    fn merge_separate(&self, inputs: &[PathBuf], dst: &Path) -> RasterResult<()> {
        self.merges.lock().unwrap().push(inputs.to_vec());
        if self.fail_merge {
            return Err(RasterError::Merge("inputs disagree".to_string()));
        }
        std::fs::write(dst, b"tif")?;
        Ok(())
    }
}

async fn state_with(engine: Arc<FakeEngine>) -> (TempDir, AppState) {
    let dir = temp_media_root();
    let config = ViewerConfig::new(dir.path());
    let media = MediaStore::new(dir.path(), "/media");
    media.ensure_layout().await.unwrap();
    let catalog = ImageCatalog::open_memory().await.unwrap();
    (dir, AppState::from_parts(config, catalog, media, engine))
}

/// Store a dummy upload and create its record.
async fn seed_upload(state: &AppState, name: &str) -> i64 {
    let source = state.media.save_upload(name, b"raster").await.unwrap();
    state
        .catalog
        .create(&source, RecordKind::Upload)
        .await
        .unwrap()
        .id
}

// ============================================================================
// Conversion
// ============================================================================

#[tokio::test]
async fn test_conversion_persists_bounds_and_preview() {
    let engine = Arc::new(FakeEngine::new());
    let (dir, state) = state_with(engine.clone()).await;
    let id = seed_upload(&state, "dem.tif").await;
    let record = state.catalog.get(id).await.unwrap().unwrap();

    let png = convert_upload(&state, &record).await.unwrap();
    assert!(png.starts_with(dir.path().join("images/png")));
    assert!(png.exists());

    let updated = state.catalog.get(id).await.unwrap().unwrap();
    let preview = updated.preview_path.unwrap();
    assert!(preview.starts_with("images/png/dem_"));
    assert_eq!(updated.display_name.as_deref(), preview.rsplit('/').next());
    assert_eq!(
        updated.bounding_box.unwrap().as_array(),
        [10.0, 48.0, 12.0, 50.0]
    );

    // Single images are stretched from their own statistics
    assert_eq!(engine.last_translation().scaling, Scaling::Auto);
}

#[tokio::test]
async fn test_conversion_rejects_non_tiff_path() {
    let engine = Arc::new(FakeEngine::new());
    let (_dir, state) = state_with(engine.clone()).await;
    let record = state
        .catalog
        .create("images/photo.jpg", RecordKind::Upload)
        .await
        .unwrap();

    let err = convert_upload(&state, &record).await.unwrap_err();
    assert_eq!(err.to_string(), "File is not a TIFF file");
    assert!(engine.translations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_conversion_rejects_non_finite_bounds() {
    let mut engine = FakeEngine::new();
    engine.dataset.geo_transform = Some(GeoTransform::north_up(f64::NAN, 50.0, 0.5, -0.5));
    let engine = Arc::new(engine);
    let (_dir, state) = state_with(engine.clone()).await;
    let id = seed_upload(&state, "dem.tif").await;
    let record = state.catalog.get(id).await.unwrap().unwrap();

    let err = convert_upload(&state, &record).await.unwrap_err();
    assert!(matches!(err, ViewerError::InvalidExtent(_)));

    // Nothing is half-written
    let unchanged = state.catalog.get(id).await.unwrap().unwrap();
    assert!(unchanged.bounding_box.is_none());
    assert!(unchanged.preview_path.is_none());
}

#[tokio::test]
async fn test_conversion_detects_missing_png() {
    let mut engine = FakeEngine::new();
    engine.write_png = false;
    let (_dir, state) = state_with(Arc::new(engine)).await;
    let id = seed_upload(&state, "dem.tif").await;
    let record = state.catalog.get(id).await.unwrap().unwrap();

    let err = convert_upload(&state, &record).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to create PNG at "), "{err}");
    assert!(state.catalog.get(id).await.unwrap().unwrap().preview_path.is_none());
}

#[tokio::test]
async fn test_failed_upload_is_rolled_back() {
    let mut engine = FakeEngine::new();
    engine.dataset.geo_transform = None;
    let (dir, state) = state_with(Arc::new(engine)).await;

    let failure = process_upload(&state, &UploadedFile::new("flat.tif", b"raster".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(failure, UploadFailure::Processing { .. }));
    assert_eq!(
        failure.to_string(),
        "Error processing flat.tif: Could not get geotransform from the image. Is it georeferenced?"
    );

    assert_eq!(state.catalog.count(RecordKind::Upload).await.unwrap(), 0);
    assert!(!dir.path().join("images/flat.tif").exists());
    let previews = std::fs::read_dir(dir.path().join("images/png")).unwrap().count();
    assert_eq!(previews, 0);
}

// ============================================================================
// Composite
// ============================================================================

#[tokio::test]
async fn test_composite_inputs_follow_id_order() {
    let engine = Arc::new(FakeEngine::new());
    let (dir, state) = state_with(engine.clone()).await;
    let a = seed_upload(&state, "a.tif").await;
    let b = seed_upload(&state, "b.tif").await;

    merge_selected(&state, &[b, a]).await.unwrap();

    let merges = engine.merges.lock().unwrap();
    assert_eq!(
        merges[0],
        vec![dir.path().join("images/a.tif"), dir.path().join("images/b.tif")]
    );
}

#[tokio::test]
async fn test_composite_uses_declared_range_for_three_bands() {
    let mut engine = FakeEngine::new();
    engine.dataset.band_count = 3;
    engine.dataset.declared = Some((100.0, 4000.0));
    let engine = Arc::new(engine);
    let (_dir, state) = state_with(engine.clone()).await;
    let ids = [
        seed_upload(&state, "r.tif").await,
        seed_upload(&state, "g.tif").await,
        seed_upload(&state, "b.tif").await,
    ];

    let outcome = merge_selected(&state, &ids).await.unwrap();
    assert_eq!(outcome.png_url, "/media/composites/Composite.png");
    assert_eq!(outcome.extent, [10.0, 48.0, 12.0, 50.0]);

    let options = engine.last_translation();
    assert_eq!(options.bands, Some(vec![1, 2, 3]));
    assert_eq!(
        options.scaling,
        Scaling::Range {
            src_min: 100.0,
            src_max: 4000.0
        }
    );
}

#[tokio::test]
async fn test_composite_falls_back_to_statistics_and_band_one() {
    let mut engine = FakeEngine::new();
    engine.dataset.band_count = 2;
    let engine = Arc::new(engine);
    let (_dir, state) = state_with(engine.clone()).await;
    let ids = [
        seed_upload(&state, "a.tif").await,
        seed_upload(&state, "b.tif").await,
    ];

    merge_selected(&state, &ids).await.unwrap();

    let options = engine.last_translation();
    assert_eq!(options.bands, Some(vec![1]));
    assert_eq!(
        options.scaling,
        Scaling::Range {
            src_min: 5.0,
            src_max: 25.0
        }
    );
}

#[tokio::test]
async fn test_unreadable_composite_is_a_server_error() {
    let mut engine = FakeEngine::new();
    engine.unreadable = Some("Composite.tif");
    let (_dir, state) = state_with(Arc::new(engine)).await;
    let id = seed_upload(&state, "a.tif").await;

    let err = merge_selected(&state, &[id]).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to open composite GeoTIFF");
    assert_eq!(err.http_status_code(), 500);
    assert_eq!(state.catalog.count(RecordKind::Composite).await.unwrap(), 0);
}

#[tokio::test]
async fn test_composite_without_geotransform() {
    let mut engine = FakeEngine::new();
    engine.dataset.geo_transform = None;
    let (_dir, state) = state_with(Arc::new(engine)).await;
    let id = seed_upload(&state, "a.tif").await;

    let err = merge_selected(&state, &[id]).await.unwrap_err();
    assert_eq!(err.to_string(), "Composite has no geotransform");
    assert_eq!(err.http_status_code(), 500);
}

#[tokio::test]
async fn test_composite_with_non_finite_extent() {
    let mut engine = FakeEngine::new();
    engine.dataset.geo_transform = Some(GeoTransform::north_up(0.0, f64::INFINITY, 1.0, -1.0));
    let (_dir, state) = state_with(Arc::new(engine)).await;
    let id = seed_upload(&state, "a.tif").await;

    let err = merge_selected(&state, &[id]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Composite extent is invalid (non-finite). Check input rasters CRS/georeferencing."
    );
}

#[tokio::test]
async fn test_failed_merge_leaves_no_composite() {
    let mut engine = FakeEngine::new();
    engine.fail_merge = true;
    let (dir, state) = state_with(Arc::new(engine)).await;
    std::fs::write(dir.path().join(COMPOSITE_TIF), b"stale").unwrap();
    std::fs::write(dir.path().join(COMPOSITE_PNG), b"stale").unwrap();
    let id = seed_upload(&state, "a.tif").await;

    let err = merge_selected(&state, &[id]).await.unwrap_err();
    assert_eq!(err.http_status_code(), 500);
    assert_eq!(state.catalog.count(RecordKind::Composite).await.unwrap(), 0);
    // Previous outputs are cleared before merging
    assert!(!dir.path().join(COMPOSITE_TIF).exists());
    assert!(!dir.path().join(COMPOSITE_PNG).exists());
}

#[tokio::test]
async fn test_composite_records_are_not_merge_inputs() {
    let engine = Arc::new(FakeEngine::new());
    let (_dir, state) = state_with(engine.clone()).await;
    let id = seed_upload(&state, "a.tif").await;
    let first = merge_selected(&state, &[id]).await.unwrap();

    let err = merge_selected(&state, &[first.record.id]).await.unwrap_err();
    assert_eq!(err.to_string(), "No images selected");
    assert_eq!(err.http_status_code(), 400);
    assert_eq!(engine.merges.lock().unwrap().len(), 1);
}
