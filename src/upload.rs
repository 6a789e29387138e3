//! Second relay hop: streaming the staged file to the destination transport.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::download::TransferProgress;
use crate::error::TransferError;
use crate::fs::FileSystem;
use crate::progress::{DEFAULT_REPORT_INTERVAL, ProgressThrottle};

/// Chunk size used when feeding the destination sink.
pub const UPLOAD_CHUNK_SIZE: usize = 512 * 1024;

/// Handle to a file that arrived at the destination.
#[derive(Debug, Clone)]
pub struct UploadedReference {
    /// Destination-side identifier of the delivered file.
    pub id: String,
}

/// One in-flight push to the destination.
#[async_trait]
pub trait UploadSink: Send {
    /// Accepts the next chunk of the staged file.
    ///
    /// # Errors
    ///
    /// Implementations report rejection or transport failure as
    /// [`TransferError::UploadFailed`].
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), TransferError>;

    /// Completes the push and returns the delivered-file reference.
    ///
    /// # Errors
    ///
    /// Same policy as [`write_chunk`](Self::write_chunk).
    async fn finish(self: Box<Self>) -> Result<UploadedReference, TransferError>;
}

/// The destination transport's file-ingest surface.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Fastest status-update cadence the destination tolerates. Messaging
    /// platforms throttle message edits, so progress is gated on this.
    fn update_interval(&self) -> Duration {
        DEFAULT_REPORT_INTERVAL
    }

    /// Opens a sink for a labelled file of known size.
    ///
    /// # Errors
    ///
    /// [`TransferError::UploadFailed`] when the destination refuses the file.
    async fn begin_upload(
        &self,
        label: &str,
        byte_total: u64,
    ) -> Result<Box<dyn UploadSink>, TransferError>;
}

/// Streams the staged file at `local_path` to `destination`.
///
/// The byte total is always known here (it is the local file size), so every
/// progress event carries it; events fire no faster than the destination's
/// [`update_interval`](Destination::update_interval), with one final event at
/// completion. Progress-side failures are the observer's problem to swallow;
/// this function never sees them.
///
/// # Errors
///
/// [`TransferError::Io`] when the staged file cannot be read, and whatever
/// the destination sink reports (by contract,
/// [`TransferError::UploadFailed`]).
pub async fn upload(
    fs: &dyn FileSystem,
    local_path: &Path,
    label: &str,
    destination: &dyn Destination,
    progress: &dyn TransferProgress,
) -> Result<UploadedReference, TransferError> {
    let byte_total = fs.file_size(local_path).await.ok_or_else(|| {
        TransferError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("staged file missing: {}", local_path.display()),
        ))
    })?;

    let mut sink = destination.begin_upload(label, byte_total).await?;
    let mut file = fs.open_file(local_path).await?;
    let mut throttle = ProgressThrottle::new(destination.update_interval());
    let mut bytes_sent: u64 = 0;
    let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        sink.write_chunk(Bytes::copy_from_slice(&buf[..n])).await?;
        bytes_sent += n as u64;
        if bytes_sent < byte_total && throttle.ready(Instant::now()) {
            progress.on_progress(bytes_sent, Some(byte_total)).await;
        }
    }

    progress.on_progress(byte_total, Some(byte_total)).await;
    let reference = sink.finish().await?;
    log::info!("delivered {byte_total} bytes to destination as {}", reference.id);
    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::TokioFileSystem;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct MemoryDestination {
        received: Arc<Mutex<Vec<u8>>>,
        reject: bool,
    }

    struct MemorySink {
        received: Arc<Mutex<Vec<u8>>>,
    }

    #[async_trait]
    impl UploadSink for MemorySink {
        async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), TransferError> {
            self.received.lock().unwrap().extend_from_slice(&chunk);
            Ok(())
        }

        async fn finish(self: Box<Self>) -> Result<UploadedReference, TransferError> {
            Ok(UploadedReference {
                id: "msg-1".to_string(),
            })
        }
    }

    #[async_trait]
    impl Destination for MemoryDestination {
        fn update_interval(&self) -> Duration {
            Duration::ZERO
        }

        async fn begin_upload(
            &self,
            _label: &str,
            _byte_total: u64,
        ) -> Result<Box<dyn UploadSink>, TransferError> {
            if self.reject {
                return Err(TransferError::UploadFailed("file too large".to_string()));
            }
            Ok(Box::new(MemorySink {
                received: Arc::clone(&self.received),
            }))
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(u64, Option<u64>)>>,
    }

    #[async_trait::async_trait]
    impl TransferProgress for Recorder {
        async fn on_progress(&self, bytes_done: u64, byte_total: Option<u64>) {
            self.events.lock().unwrap().push((bytes_done, byte_total));
        }
    }

    fn staged_file(dir: &TempDir, len: usize) -> std::path::PathBuf {
        let path = dir.path().join("staged.mp4");
        std::fs::write(&path, vec![42u8; len]).unwrap();
        path
    }

    #[tokio::test]
    async fn streams_whole_file_with_known_total() {
        let dir = TempDir::new().unwrap();
        let path = staged_file(&dir, UPLOAD_CHUNK_SIZE * 2 + 100);
        let dest = MemoryDestination::default();
        let recorder = Recorder::default();

        let reference = upload(&TokioFileSystem::new(), &path, "Video [480p]", &dest, &recorder)
            .await
            .unwrap();

        assert_eq!(reference.id, "msg-1");
        let expected = (UPLOAD_CHUNK_SIZE * 2 + 100) as u64;
        assert_eq!(dest.received.lock().unwrap().len() as u64, expected);

        let events = recorder.events.lock().unwrap();
        assert!(events.iter().all(|(_, total)| *total == Some(expected)));
        assert!(events.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(*events.last().unwrap(), (expected, Some(expected)));
    }

    #[tokio::test]
    async fn missing_staged_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let err = upload(
            &TokioFileSystem::new(),
            &dir.path().join("gone.mp4"),
            "x",
            &MemoryDestination::default(),
            &crate::download::NoProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
    }

    #[tokio::test]
    async fn destination_rejection_surfaces_as_upload_failed() {
        let dir = TempDir::new().unwrap();
        let path = staged_file(&dir, 10);
        let dest = MemoryDestination {
            reject: true,
            ..MemoryDestination::default()
        };
        let err = upload(
            &TokioFileSystem::new(),
            &path,
            "x",
            &dest,
            &crate::download::NoProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransferError::UploadFailed(_)));
    }

    #[tokio::test]
    async fn empty_file_still_completes() {
        let dir = TempDir::new().unwrap();
        let path = staged_file(&dir, 0);
        let dest = MemoryDestination::default();
        let recorder = Recorder::default();

        upload(&TokioFileSystem::new(), &path, "x", &dest, &recorder)
            .await
            .unwrap();
        let events = recorder.events.lock().unwrap();
        assert_eq!(*events.last().unwrap(), (0, Some(0)));
    }
}
