//! The image record: one uploaded or derived raster and its preview.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// How a record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A file accepted through the upload form.
    Upload,
    /// The single-slot output of a merge.
    Composite,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Composite => "composite",
        }
    }
}

impl FromStr for RecordKind {
    type Err = UnknownRecordKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Self::Upload),
            "composite" => Ok(Self::Composite),
            other => Err(UnknownRecordKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown record kind: {0}")]
pub struct UnknownRecordKind(pub String);

/// A tracked raster on disk.
///
/// Paths are relative to the media root. The bounding box is either fully
/// present or absent; it is never stored partially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: i64,
    pub source_path: String,
    pub preview_path: Option<String>,
    pub display_name: Option<String>,
    pub bounding_box: Option<BoundingBox>,
    pub kind: RecordKind,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Base name of the source file.
    pub fn source_file_name(&self) -> &str {
        base_name(&self.source_path)
    }

    /// The stored display name, or the source file's base name when unset.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.source_file_name())
    }
}

/// Last component of a `/`-separated path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// True when the name ends in `.tif` or `.tiff`, ignoring case.
pub fn has_tiff_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".tif") || lower.ends_with(".tiff")
}
