//! Partial/completed file storage layout
//!
//! Maps a URL to deterministic paths under two disjoint directories. A file
//! under `completed/` is the authoritative signal that its task's content is
//! fully retrieved; a file under `partial/` holds the resume offset for the
//! next ranged request.
//!
//! Filenames are the basename of the URL's path component. Two URLs sharing a
//! basename map to the same paths and end up with whichever content completed
//! first; batches are expected to keep basenames unique.

use crate::error::{Result, StorageError};
use std::path::{Path, PathBuf};
use url::Url;

/// Storage for in-progress and completed downloads
#[derive(Debug, Clone)]
pub struct Storage {
    partial_dir: PathBuf,
    completed_dir: PathBuf,
}

impl Storage {
    /// Create a storage rooted at the two configured directories
    ///
    /// Both directories are created idempotently.
    pub fn new(config: &crate::config::StorageConfig) -> Result<Self> {
        for dir in [&config.partial_dir, &config.completed_dir] {
            std::fs::create_dir_all(dir).map_err(|e| StorageError::CreateDir {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(Self {
            partial_dir: config.partial_dir.clone(),
            completed_dir: config.completed_dir.clone(),
        })
    }

    /// Basename a URL maps to: the final segment of its path component
    ///
    /// Pure function of the URL. Query strings and fragments are ignored.
    /// Returns an empty string when the path ends in `/`; unparseable input
    /// falls back to splitting the raw string.
    pub fn file_name(url: &str) -> String {
        match Url::parse(url) {
            Ok(parsed) => parsed
                .path_segments()
                .and_then(|segments| segments.last())
                .unwrap_or("")
                .to_string(),
            Err(_) => url.rsplit('/').next().unwrap_or("").to_string(),
        }
    }

    /// Path of the in-progress file for a URL
    pub fn partial_path(&self, url: &str) -> PathBuf {
        self.partial_dir.join(Self::file_name(url))
    }

    /// Path of the completed file for a URL
    pub fn completed_path(&self, url: &str) -> PathBuf {
        self.completed_dir.join(Self::file_name(url))
    }

    /// Size of the partial file in bytes, or 0 when absent
    ///
    /// Absence is not an error: a missing partial file simply means the
    /// download starts from offset 0.
    pub async fn partial_size(&self, url: &str) -> u64 {
        file_size(&self.partial_path(url)).await
    }

    /// Whether the completed file for a URL exists
    pub async fn is_completed(&self, url: &str) -> bool {
        tokio::fs::try_exists(self.completed_path(url))
            .await
            .unwrap_or(false)
    }

    /// Atomically rename the partial file into the completed directory
    ///
    /// After success the partial file no longer exists under its former path.
    pub async fn promote(&self, url: &str) -> Result<()> {
        let from = self.partial_path(url);
        let to = self.completed_path(url);

        if !tokio::fs::try_exists(&from).await.unwrap_or(false) {
            return Err(StorageError::MissingPartial { path: from }.into());
        }

        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| StorageError::Promote {
                from: from.clone(),
                to: to.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(file = %Self::file_name(url), "Moved completed file");
        Ok(())
    }
}

/// Size of a file in bytes, or 0 when it does not exist
async fn file_size(path: &Path) -> u64 {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::error::Error;
    use tempfile::tempdir;

    fn test_storage() -> (Storage, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let config = StorageConfig {
            partial_dir: temp_dir.path().join("partial"),
            completed_dir: temp_dir.path().join("completed"),
        };
        (Storage::new(&config).unwrap(), temp_dir)
    }

    #[test]
    fn new_creates_both_directories() {
        let (_storage, temp_dir) = test_storage();
        assert!(temp_dir.path().join("partial").is_dir());
        assert!(temp_dir.path().join("completed").is_dir());
    }

    #[test]
    fn new_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let config = StorageConfig {
            partial_dir: temp_dir.path().join("partial"),
            completed_dir: temp_dir.path().join("completed"),
        };
        Storage::new(&config).unwrap();
        Storage::new(&config).unwrap();
    }

    #[test]
    fn file_name_is_the_final_path_segment() {
        assert_eq!(
            Storage::file_name("http://example.com/files/archive.tar.gz"),
            "archive.tar.gz"
        );
        assert_eq!(Storage::file_name("http://example.com/a.bin?sig=abc"), "a.bin");
        assert_eq!(Storage::file_name("http://example.com/dir/"), "");
        assert_eq!(Storage::file_name("http://example.com"), "");
    }

    #[test]
    fn urls_with_the_same_basename_collide() {
        // Documented collision behavior: distinct hosts, one shared path
        let a = "http://mirror-a.example.com/pkg/tool.zip";
        let b = "http://mirror-b.example.com/other/tool.zip";
        let (storage, _temp_dir) = test_storage();
        assert_eq!(storage.partial_path(a), storage.partial_path(b));
        assert_eq!(storage.completed_path(a), storage.completed_path(b));
    }

    #[tokio::test]
    async fn partial_size_is_zero_when_absent() {
        let (storage, _temp_dir) = test_storage();
        assert_eq!(storage.partial_size("http://example.com/missing.bin").await, 0);
    }

    #[tokio::test]
    async fn partial_size_reports_bytes_on_disk() {
        let (storage, _temp_dir) = test_storage();
        let url = "http://example.com/data.bin";
        tokio::fs::write(storage.partial_path(url), b"hello")
            .await
            .unwrap();
        assert_eq!(storage.partial_size(url).await, 5);
    }

    #[tokio::test]
    async fn promote_moves_partial_to_completed() {
        let (storage, _temp_dir) = test_storage();
        let url = "http://example.com/data.bin";
        tokio::fs::write(storage.partial_path(url), b"payload")
            .await
            .unwrap();

        storage.promote(url).await.unwrap();

        assert!(!storage.partial_path(url).exists());
        assert!(storage.is_completed(url).await);
        assert_eq!(
            tokio::fs::read(storage.completed_path(url)).await.unwrap(),
            b"payload"
        );
    }

    #[tokio::test]
    async fn promote_without_partial_fails() {
        let (storage, _temp_dir) = test_storage();
        let err = storage
            .promote("http://example.com/never-downloaded.bin")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::MissingPartial { .. })
        ));
    }

    #[tokio::test]
    async fn is_completed_false_before_promote() {
        let (storage, _temp_dir) = test_storage();
        let url = "http://example.com/data.bin";
        assert!(!storage.is_completed(url).await);
        tokio::fs::write(storage.partial_path(url), b"x").await.unwrap();
        assert!(!storage.is_completed(url).await);
    }
}
