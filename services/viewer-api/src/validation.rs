//! Upload form validation.
//!
//! The whole submission is rejected on the first failing file; nothing is
//! stored until every file passes.

use viewer_common::record::has_tiff_extension;

/// One `file` part of an upload request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name.
    pub name: String,
    /// Bytes received for the part.
    pub size: u64,
    /// Contents; left empty once the part exceeds the upload limit.
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            data,
        }
    }

    pub fn is_oversized(&self, max_bytes: u64) -> bool {
        self.size > max_bytes
    }
}

/// Check every file against the size limit and the TIFF extension.
///
/// `limit_label` is the human form of `max_bytes` used in the message.
pub fn validate_upload(
    files: &[UploadedFile],
    max_bytes: u64,
    limit_label: &str,
) -> Result<(), String> {
    if files.is_empty() {
        return Err("Please select at least one file.".to_string());
    }
    for file in files {
        if file.is_oversized(max_bytes) {
            return Err(format!(
                "File '{}' is too large (max {limit_label})",
                file.name
            ));
        }
        if !has_tiff_extension(&file.name) {
            return Err(format!("File '{}' is not a TIFF file", file.name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures::OVERSIZED_UPLOAD_BYTES;

    const MAX: u64 = 100 * 1024 * 1024;

    fn sized(name: &str, size: u64) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            size,
            data: Vec::new(),
        }
    }

    #[test]
    fn test_no_files() {
        assert_eq!(
            validate_upload(&[], MAX, "100MB").unwrap_err(),
            "Please select at least one file."
        );
    }

    #[test]
    fn test_rejects_non_tiff() {
        let err = validate_upload(&[UploadedFile::new("x.jpg", vec![1])], MAX, "100MB").unwrap_err();
        assert_eq!(err, "File 'x.jpg' is not a TIFF file");
    }

    #[test]
    fn test_rejects_oversized() {
        let err = validate_upload(&[sized("x.tif", OVERSIZED_UPLOAD_BYTES as u64)], MAX, "100MB").unwrap_err();
        assert_eq!(err, "File 'x.tif' is too large (max 100MB)");
    }

    #[test]
    fn test_exact_limit_is_accepted() {
        assert!(validate_upload(&[sized("x.TIFF", MAX)], MAX, "100MB").is_ok());
    }

    #[test]
    fn test_first_failure_wins() {
        let files = [
            UploadedFile::new("a.tif", vec![1]),
            UploadedFile::new("b.png", vec![1]),
            sized("c.tif", MAX + 1),
        ];
        let err = validate_upload(&files, MAX, "100MB").unwrap_err();
        assert!(err.contains("'b.png'"));
    }
}
