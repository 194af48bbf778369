//! Video selected for submission

use dfd_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extensions the analysis service accepts; anything else is answered with
/// HTTP 400 "File type not allowed".
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// A video file chosen by the user
///
/// Only metadata is held here; bytes are read when the upload starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFile {
    /// Location on disk
    pub path: PathBuf,
    /// File name sent in the multipart `video` part
    pub file_name: String,
    /// Size in bytes at selection time
    pub size_bytes: u64,
}

impl VideoFile {
    /// Build from a path and a known size
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        Self {
            path,
            file_name,
            size_bytes,
        }
    }

    /// Stat a file on disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(Error::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        Ok(Self::new(path, metadata.len()))
    }

    /// Lowercased extension, if any
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    /// Whether the analysis service will accept this container format
    pub fn has_supported_extension(&self) -> bool {
        self.extension()
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// MIME type for the multipart part
    pub fn content_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("mp4") | Some("m4v") => "video/mp4",
            Some("mov") => "video/quicktime",
            Some("avi") => "video/x-msvideo",
            Some("mkv") => "video/x-matroska",
            Some("webm") => "video/webm",
            _ => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_path() {
        let file = VideoFile::new("/videos/Interview.MOV", 42);
        assert_eq!(file.file_name, "Interview.MOV");
        assert_eq!(file.extension().as_deref(), Some("mov"));
        assert_eq!(file.content_type(), "video/quicktime");
        assert!(file.has_supported_extension());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = VideoFile::new("clip.webm", 1);
        assert!(!file.has_supported_extension());
        assert_eq!(file.content_type(), "video/webm");

        let file = VideoFile::new("noext", 1);
        assert!(!file.has_supported_extension());
        assert_eq!(file.content_type(), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_from_path_reads_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.mp4");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let file = VideoFile::from_path(&path).await.unwrap();
        assert_eq!(file.size_bytes, 2048);
        assert_eq!(file.file_name, "sample.mp4");
    }

    #[tokio::test]
    async fn test_from_path_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = VideoFile::from_path(dir.path()).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
