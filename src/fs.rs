//! File system abstraction for testability.
//!
//! The orchestrator's staged-file cleanup runs on every exit path; this seam
//! lets the tests assert that with a mock instead of a real disk.

use async_trait::async_trait;
use std::path::Path;

/// Abstraction over the file operations a relay performs.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Checks if a file exists at the given path.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Returns the size of a file if it exists.
    async fn file_size(&self, path: &Path) -> Option<u64>;

    /// Creates all directories in the given path.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Creates (truncating) a staged file the downloader will append chunks to.
    async fn create_file(&self, path: &Path) -> std::io::Result<tokio::fs::File>;

    /// Opens an existing staged file for reading.
    async fn open_file(&self, path: &Path) -> std::io::Result<tokio::fs::File>;

    /// Removes a file; the caller decides whether a missing file matters.
    async fn remove_file(&self, path: &Path) -> std::io::Result<()>;
}

/// Default file system implementation using `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    /// Creates a new `TokioFileSystem` instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn file_size(&self, path: &Path) -> Option<u64> {
        tokio::fs::metadata(path).await.ok().map(|m| m.len())
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn create_file(&self, path: &Path) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::create(path).await
    }

    async fn open_file(&self, path: &Path) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(path).await
    }

    async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[tokio::test]
    async fn tokio_fs_file_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("staged.mp4");
        std::fs::File::create(&path).unwrap();

        let fs = TokioFileSystem::new();
        assert!(fs.file_exists(&path).await);
        assert!(!fs.file_exists(&dir.path().join("missing.mp4")).await);
    }

    #[tokio::test]
    async fn tokio_fs_file_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("staged.mp4");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"hello").unwrap();

        let fs = TokioFileSystem::new();
        assert_eq!(fs.file_size(&path).await, Some(5));
        assert_eq!(fs.file_size(&dir.path().join("missing.mp4")).await, None);
    }

    #[tokio::test]
    async fn tokio_fs_remove_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("staged.mp4");
        std::fs::File::create(&path).unwrap();

        let fs = TokioFileSystem::new();
        fs.remove_file(&path).await.unwrap();
        assert!(!path.exists());
        assert!(fs.remove_file(&path).await.is_err());
    }

    #[tokio::test]
    async fn tokio_fs_create_then_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("staged.mp4");

        let fs = TokioFileSystem::new();
        drop(fs.create_file(&path).await.unwrap());
        assert!(fs.open_file(&path).await.is_ok());
    }
}
