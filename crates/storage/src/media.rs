//! Filesystem layout of the media root.
//!
//! ```text
//! <media_root>/
//!   images/                 uploaded rasters
//!   images/png/             single-image previews, <stem>_<8 hex>.png
//!   composites/Composite.tif
//!   composites/Composite.png
//! ```
//!
//! Records store paths relative to the media root with `/` separators.

use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};
use uuid::Uuid;
use viewer_common::record::has_tiff_extension;
use viewer_common::ViewerResult;

pub const IMAGES_DIR: &str = "images";
pub const PREVIEWS_DIR: &str = "images/png";
pub const COMPOSITES_DIR: &str = "composites";
pub const COMPOSITE_TIF: &str = "composites/Composite.tif";
pub const COMPOSITE_PNG: &str = "composites/Composite.png";

/// Media root on disk plus the URL prefix it is served under.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url_prefix: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    /// Create the `images/`, `images/png/` and `composites/` directories.
    pub async fn ensure_layout(&self) -> ViewerResult<()> {
        for dir in [IMAGES_DIR, PREVIEWS_DIR, COMPOSITES_DIR] {
            tokio::fs::create_dir_all(self.root.join(dir)).await?;
        }
        Ok(())
    }

    /// Absolute path of a media-relative path.
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Public URL of a media-relative path.
    pub fn url(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.url_prefix.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }

    /// Store an uploaded file under `images/` and return its relative path.
    ///
    /// The client-supplied name is reduced to a safe base name; when that
    /// name is taken a random suffix is appended to the stem.
    pub async fn save_upload(&self, original_name: &str, bytes: &[u8]) -> ViewerResult<String> {
        let dir = self.root.join(IMAGES_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let name = sanitize_file_name(original_name);
        let mut candidate = name.clone();
        while tokio::fs::try_exists(dir.join(&candidate)).await? {
            let (stem, ext) = split_extension(&name);
            candidate = format!("{stem}_{}{ext}", short_token(7));
        }

        let relative = format!("{IMAGES_DIR}/{candidate}");
        tokio::fs::write(self.absolute(&relative), bytes).await?;
        debug!(path = %relative, bytes = bytes.len(), "Stored upload");
        Ok(relative)
    }

    /// Relative path for a new preview of `source`:
    /// `images/png/<stem>_<8 hex>.png`.
    pub fn preview_path_for(&self, source: &str) -> String {
        let file = viewer_common::record::base_name(source);
        let (stem, _) = split_extension(file);
        format!("{PREVIEWS_DIR}/{stem}_{}.png", short_token(8))
    }

    /// Delete a media file. A file that is already gone is not an error.
    pub async fn remove(&self, relative: &str) -> ViewerResult<()> {
        match tokio::fs::remove_file(self.absolute(relative)).await {
            Ok(()) => {
                debug!(path = %relative, "Removed media file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = %relative, error = %e, "Failed to remove media file");
                Err(e.into())
            }
        }
    }
}

/// First `len` hex characters of a random UUID.
fn short_token(len: usize) -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(len);
    token
}

/// `("scene", ".tif")` for `"scene.tif"`; no extension gives `""`.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(i) => name.split_at(i),
    }
}

/// Reduce a client-supplied name to a safe base name.
///
/// Stem and extension are cleaned separately: the stem keeps alphanumerics
/// in any script plus `-`, `_` and inner dots, with spaces turned into
/// underscores. A `.tif`/`.tiff` extension is always kept as given; an empty
/// stem becomes `upload`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let (stem, ext) = match split_extension(base) {
        (stem, ext) if has_tiff_extension(ext) => (stem, ext),
        _ => (base, ""),
    };

    let cleaned: String = stem
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let cleaned = cleaned.trim_matches('.');

    match (cleaned.is_empty(), ext.is_empty()) {
        (true, true) => "upload.tif".to_string(),
        (true, false) => format!("upload{ext}"),
        (false, _) => format!("{cleaned}{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my scene.tif"), "my_scene.tif");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\data\\dem (1).TIF"), "dem_1.TIF");
        assert_eq!(sanitize_file_name("..."), "upload.tif");
    }

    #[test]
    fn test_sanitize_keeps_non_ascii_names() {
        assert_eq!(sanitize_file_name("снимок.tif"), "снимок.tif");
        assert_eq!(sanitize_file_name("卫星 影像.TIFF"), "卫星_影像.TIFF");
        assert_eq!(sanitize_file_name("scene.v2.tif"), "scene.v2.tif");
        assert_eq!(sanitize_file_name("%%%.tif"), "upload.tif");
        assert_eq!(sanitize_file_name("(*).TIFF"), "upload.TIFF");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.b.tif"), ("a.b", ".tif"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }

    #[test]
    fn test_preview_path_shape() {
        let store = MediaStore::new("/media", "/media");
        let path = store.preview_path_for("images/scene.v2.tif");
        let name = path.strip_prefix("images/png/scene.v2_").unwrap();
        let (token, ext) = name.split_at(8);
        assert_eq!(ext, ".png");
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(path, store.preview_path_for("images/scene.v2.tif"));
    }

    #[test]
    fn test_absolute_and_url() {
        let store = MediaStore::new("/srv/media", "/media/");
        assert_eq!(store.absolute("images/png/a.png"), PathBuf::from("/srv/media/images/png/a.png"));
        assert_eq!(store.url("images/png/a.png"), "/media/images/png/a.png");
    }

    #[tokio::test]
    async fn test_save_upload_avoids_collisions() {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(dir.path(), "/media");

        let first = store.save_upload("scene.tif", b"one").await.unwrap();
        let second = store.save_upload("scene.tif", b"two").await.unwrap();

        assert_eq!(first, "images/scene.tif");
        assert_ne!(first, second);
        assert!(second.starts_with("images/scene_") && second.ends_with(".tif"));
        assert_eq!(std::fs::read(store.absolute(&first)).unwrap(), b"one");
        assert_eq!(std::fs::read(store.absolute(&second)).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(dir.path(), "/media");
        store.ensure_layout().await.unwrap();
        store.remove("images/nothing.tif").await.unwrap();
        assert!(dir.path().join(PREVIEWS_DIR).is_dir());
    }
}
