//! Relay orchestration: selection, download, upload, cleanup.
//!
//! One relay operation owns its staged file and status message exclusively.
//! The dominant correctness property here is that the staged file is removed
//! and the session closed on every exit path, success or failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::download::{DownloadOptions, TransferProgress, download};
use crate::error::TransferError;
use crate::fs::FileSystem;
use crate::progress;
use crate::rendition::{Rendition, Tier};
use crate::session::{SessionKey, SessionStore};
use crate::transport::{StatusHandle, UserId, best_effort};
use crate::upload::{Destination, UploadedReference, upload};

/// Stage label shown while bytes flow from the origin.
pub const DOWNLOAD_STAGE: &str = "to my server";

/// Stage label shown while bytes flow to the destination.
pub const UPLOAD_STAGE: &str = "to the destination";

/// Characters stripped from titles when building the staged file name.
const ILLEGAL_PATH_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// States of one relay operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// No operation in flight.
    Idle,
    /// Resolving the user's tier choice.
    Selecting,
    /// First hop: origin to staged file.
    Downloading,
    /// Second hop: staged file to destination.
    Uploading,
    /// Delivered; staged file removed, session closed.
    Done,
    /// Failed or cancelled; staged file removed, session closed.
    Aborted,
}

/// Strips characters illegal in file names from a media title.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let safe: String = title
        .chars()
        .filter(|c| !ILLEGAL_PATH_CHARS.contains(c))
        .collect();
    let safe = safe.trim().to_string();
    if safe.is_empty() { "media".to_string() } else { safe }
}

/// Builds the staged file name for a title, tier, and container extension.
#[must_use]
pub fn staged_file_name(title: &str, tier: Tier, extension: &str) -> String {
    format!("{}_{}p.{extension}", sanitize_title(title), tier.nominal())
}

/// Progress observer for one transfer stage: renders the status text and
/// pushes it through the best-effort status handle.
struct StageProgress<'a> {
    label: String,
    stage: &'static str,
    started: Instant,
    status: &'a dyn StatusHandle,
}

impl<'a> StageProgress<'a> {
    fn new(label: &str, stage: &'static str, status: &'a dyn StatusHandle) -> Self {
        Self {
            label: label.to_string(),
            stage,
            started: Instant::now(),
            status,
        }
    }
}

#[async_trait::async_trait]
impl TransferProgress for StageProgress<'_> {
    async fn on_progress(&self, bytes_done: u64, byte_total: Option<u64>) {
        let text = progress::render(
            &self.label,
            self.stage,
            bytes_done,
            byte_total,
            self.started.elapsed(),
        );
        best_effort("progress update", self.status.edit(&text).await);
    }
}

/// Runs relay operations against one working directory.
pub struct Relayer {
    client: reqwest::Client,
    fs: Arc<dyn FileSystem>,
    store: Arc<SessionStore>,
    options: DownloadOptions,
    download_dir: PathBuf,
}

impl Relayer {
    /// Creates a relayer staging files under `download_dir`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        fs: Arc<dyn FileSystem>,
        store: Arc<SessionStore>,
        options: DownloadOptions,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            client,
            fs,
            store,
            options,
            download_dir,
        }
    }

    /// Where the staged file for a relay would live.
    #[must_use]
    pub fn staged_path(&self, title: &str, tier: Tier, extension: &str) -> PathBuf {
        self.download_dir.join(staged_file_name(title, tier, extension))
    }

    /// Runs one relay operation end to end and returns its terminal state.
    ///
    /// Every failure is rendered through `status` rather than returned; the
    /// serving process never sees these as errors. The session key is
    /// consumed as soon as its selection resolves, so cancels and repeat
    /// selections arriving while the transfer runs answer "session expired";
    /// the staged file is removed no matter how the operation ends.
    pub async fn run(
        &self,
        user: UserId,
        key: &SessionKey,
        tier: Tier,
        destination: &dyn Destination,
        status: &dyn StatusHandle,
        cancel: &CancellationToken,
    ) -> RelayState {
        // Selecting: re-resolve the session; the entry may have expired or
        // been cancelled since the keyboard was shown.
        let resolved = match self.store.resolve(key, user) {
            Ok(resolved) => resolved,
            Err(e) => {
                best_effort("selection error display", status.edit(&format!("\u{274c} {e}")).await);
                return RelayState::Aborted;
            }
        };
        let Some(rendition) = resolved.renditions.get(&tier).cloned() else {
            best_effort(
                "selection error display",
                status
                    .edit(&format!("\u{274c} {tier} is no longer available for this item"))
                    .await,
            );
            self.store.close(key);
            return RelayState::Aborted;
        };

        // The key is consumed here, before any byte moves: a cancel or a
        // second selection arriving mid-transfer resolves to NotFound.
        self.store.close(key);

        let label = format!("{} [{tier}]", resolved.media.title);
        let path = self.staged_path(&resolved.media.title, tier, &rendition.extension);
        if let Err(e) = self.fs.create_dir_all(&self.download_dir).await {
            best_effort(
                "setup error display",
                status.edit(&format!("\u{274c} Error: {e}")).await,
            );
            return RelayState::Aborted;
        }

        let outcome = self
            .transfer(&rendition, &path, &label, destination, status, cancel)
            .await;

        // Staged-file cleanup runs on every exit path from here on.
        self.remove_staged(&path).await;

        match outcome {
            Ok(delivered) => {
                log::info!("relay of {label:?} delivered as {}", delivered.id);
                best_effort("status retire", status.delete().await);
                RelayState::Done
            }
            Err(e) => {
                best_effort("error display", status.edit(&format!("\u{274c} Error: {e}")).await);
                RelayState::Aborted
            }
        }
    }

    /// Both transfer hops; any error aborts the relay.
    async fn transfer(
        &self,
        rendition: &Rendition,
        path: &Path,
        label: &str,
        destination: &dyn Destination,
        status: &dyn StatusHandle,
        cancel: &CancellationToken,
    ) -> Result<UploadedReference, TransferError> {
        let dl_progress = StageProgress::new(label, DOWNLOAD_STAGE, status);
        download(
            &self.client,
            self.fs.as_ref(),
            &rendition.byte_source_url,
            &rendition.request_headers,
            path,
            &dl_progress,
            &self.options,
            cancel,
        )
        .await?;

        best_effort(
            "stage announcement",
            status.edit("\u{1f4e4} Uploading to the destination\u{2026}").await,
        );
        let up_progress = StageProgress::new(label, UPLOAD_STAGE, status);
        upload(self.fs.as_ref(), path, label, destination, &up_progress).await
    }

    async fn remove_staged(&self, path: &Path) {
        if self.fs.file_exists(path).await {
            if let Err(e) = self.fs.remove_file(path).await {
                log::warn!("could not remove staged file {}: {e}", path.display());
            }
        }
    }
}
