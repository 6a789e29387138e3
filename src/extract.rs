//! Metadata extraction interface and the bounded worker pool it runs on.
//!
//! Extraction is an external collaborator: an opaque service that turns a
//! URL into a media identity plus a raw format list. The default
//! implementation shells out to a `yt-dlp`-compatible binary; the blocking
//! subprocess work runs on the blocking thread pool behind a semaphore so a
//! burst of link submissions cannot stall the cooperative scheduler.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::error::ExtractionError;
use crate::rendition::RawFormat;

/// Fallback title when the origin reports none.
const UNTITLED: &str = "Untitled media";

/// Identity of a successfully extracted media item.
///
/// Immutable once created; discarded with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    /// Origin-side identifier of the item.
    pub id: String,
    /// Display title, also the base of the staged file name.
    pub title: String,
    /// Thumbnail shown with the tier keyboard, when the origin has one.
    pub thumbnail_url: Option<String>,
}

/// Raw extraction output: identity plus every rendition the origin offers.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaInfo {
    /// Origin-side identifier.
    pub id: String,
    /// Title as reported, possibly absent.
    #[serde(default)]
    pub title: Option<String>,
    /// Thumbnail URL as reported.
    #[serde(default, rename = "thumbnail")]
    pub thumbnail_url: Option<String>,
    /// Raw rendition records for the selector.
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

impl MediaInfo {
    /// Builds the immutable reference a session stores.
    #[must_use]
    pub fn reference(&self) -> MediaReference {
        MediaReference {
            id: self.id.clone(),
            title: self
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            thumbnail_url: self.thumbnail_url.clone(),
        }
    }
}

/// The extraction service, seen from the relay's side of the boundary.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extracts media info for a URL.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ExtractionError`] for known auth/credential
    /// failures, or [`ExtractionError::Other`] with the service's message
    /// passed through.
    async fn extract(&self, url: &str) -> Result<MediaInfo, ExtractionError>;
}

/// Classifies an extractor failure message.
///
/// Two failure families get user-facing guidance; everything else is opaque
/// and passed through verbatim.
#[must_use]
pub fn classify_failure(message: &str) -> ExtractionError {
    if message.contains("Sign in to confirm you're not a bot")
        || message.contains("Sign in to confirm you\u{2019}re not a bot")
    {
        return ExtractionError::AuthRequired;
    }
    if message.contains("Netscape format") || message.contains("cookies file is malformed") {
        return ExtractionError::MalformedCredentials;
    }
    ExtractionError::Other(message.trim().to_string())
}

/// Bounds concurrent extractions so blocking work cannot pile up.
///
/// Each `extract` call holds one permit for its whole duration; the
/// cooperative scheduler stays responsive to other users while a caller
/// waits for a permit.
pub struct ExtractorPool {
    inner: Arc<dyn Extractor>,
    permits: Arc<Semaphore>,
}

impl ExtractorPool {
    /// Wraps an extractor with a pool of `max_concurrent` workers.
    #[must_use]
    pub fn new(inner: Arc<dyn Extractor>, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Runs one extraction under a pool permit.
    ///
    /// # Errors
    ///
    /// Propagates the wrapped extractor's error.
    pub async fn extract(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ExtractionError::Other("extraction pool shut down".to_string()))?;
        self.inner.extract(url).await
    }
}

/// Extractor shelling out to a `yt-dlp`-compatible binary (`<bin> -J <url>`).
pub struct YtDlpExtractor {
    binary: PathBuf,
    user_agent: String,
    cookie_header: Option<String>,
}

impl YtDlpExtractor {
    /// Creates an extractor for the given binary and request identity.
    #[must_use]
    pub fn new(binary: PathBuf, user_agent: String, cookie_header: Option<String>) -> Self {
        Self {
            binary,
            user_agent,
            cookie_header,
        }
    }

    fn build_command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-J")
            .arg("--no-playlist")
            .arg("--geo-bypass")
            .arg("--add-header")
            .arg(format!("User-Agent:{}", self.user_agent));
        if let Some(cookie) = &self.cookie_header {
            cmd.arg("--add-header").arg(format!("Cookie:{cookie}"));
        }
        cmd.arg(url);
        cmd
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        let mut cmd = self.build_command(url);
        let output = tokio::task::spawn_blocking(move || cmd.output())
            .await
            .map_err(|e| ExtractionError::Other(format!("extraction worker failed: {e}")))?
            .map_err(|e| ExtractionError::Other(format!("could not run extractor: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractionError::Other(format!("unreadable extractor output: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn classify_sign_in_challenge() {
        let e = classify_failure("ERROR: Sign in to confirm you're not a bot. Use cookies.");
        assert!(matches!(e, ExtractionError::AuthRequired));
        // Curly-apostrophe variant of the same message.
        let e = classify_failure("Sign in to confirm you\u{2019}re not a bot");
        assert!(matches!(e, ExtractionError::AuthRequired));
    }

    #[test]
    fn classify_malformed_cookies() {
        let e = classify_failure("ERROR: does not look like a Netscape format cookies file");
        assert!(matches!(e, ExtractionError::MalformedCredentials));
    }

    #[test]
    fn classify_passes_other_messages_through() {
        let e = classify_failure("  ERROR: Video unavailable  ");
        match e {
            ExtractionError::Other(msg) => assert_eq!(msg, "ERROR: Video unavailable"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn media_info_deserializes_and_builds_reference() {
        let json = r#"{
            "id": "abc123",
            "title": "A video",
            "thumbnail": "https://i.example/t.jpg",
            "formats": [{"vcodec": "avc1", "height": 480, "ext": "mp4", "url": "https://cdn/v"}]
        }"#;
        let info: MediaInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.formats.len(), 1);
        let m = info.reference();
        assert_eq!(m.id, "abc123");
        assert_eq!(m.title, "A video");
        assert_eq!(m.thumbnail_url.as_deref(), Some("https://i.example/t.jpg"));
    }

    #[test]
    fn missing_title_falls_back() {
        let info: MediaInfo = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert_eq!(info.reference().title, UNTITLED);
        assert!(info.formats.is_empty());
    }

    struct SlowExtractor {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Extractor for SlowExtractor {
        async fn extract(&self, _url: &str) -> Result<MediaInfo, ExtractionError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(MediaInfo {
                id: "x".to_string(),
                title: None,
                thumbnail_url: None,
                formats: vec![],
            })
        }
    }

    #[tokio::test]
    async fn pool_bounds_concurrency() {
        let slow = Arc::new(SlowExtractor {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pool = Arc::new(ExtractorPool::new(slow.clone(), 2));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move {
                pool.extract("https://youtu.be/x").await.unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert!(slow.peak.load(Ordering::SeqCst) <= 2);
    }
}
