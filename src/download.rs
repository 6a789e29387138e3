//! First relay hop: streaming bytes from the origin into the staged file.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::TransferError;
use crate::fs::FileSystem;
use crate::progress::{DEFAULT_REPORT_INTERVAL, ProgressThrottle};

/// Browser user-agent sent when the caller supplies none.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Default idle window before a stalled transfer is aborted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Observer for byte progress on either hop of the relay.
///
/// `byte_total` is `None` when the origin did not announce a length. Within
/// one transfer, `bytes_done` is monotonically non-decreasing. Observers that
/// edit a status display must swallow their own transport failures.
#[async_trait::async_trait]
pub trait TransferProgress: Send + Sync {
    /// Called with cumulative progress; rate-limited by the transfer stage.
    async fn on_progress(&self, _bytes_done: u64, _byte_total: Option<u64>) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

#[async_trait::async_trait]
impl TransferProgress for NoProgress {}

/// Tunables for the download hop.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// User-agent injected when the rendition's headers carry none.
    pub user_agent: String,
    /// `Cookie` header injected when the rendition's headers carry none.
    pub cookie_header: Option<String>,
    /// Minimum interval between progress callbacks.
    pub report_interval: Duration,
    /// Abort when no bytes arrive for this long.
    pub idle_timeout: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookie_header: None,
            report_interval: DEFAULT_REPORT_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

fn build_headers(headers: &HashMap<String, String>, options: &DownloadOptions) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            name.parse::<HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            map.insert(name, value);
        } else {
            log::warn!("skipping unusable request header {name:?}");
        }
    }
    if !map.contains_key(USER_AGENT) {
        if let Ok(ua) = HeaderValue::from_str(&options.user_agent) {
            map.insert(USER_AGENT, ua);
        }
    }
    // The rendition's own cookie wins; the configured one fills the gap.
    if !map.contains_key(COOKIE) {
        if let Some(cookie) = &options.cookie_header {
            if let Ok(value) = HeaderValue::from_str(cookie) {
                map.insert(COOKIE, value);
            }
        }
    }
    map
}

/// Streams `source_url` into `dest`, reporting throttled progress.
///
/// Issues a streaming GET with the rendition's request headers and appends
/// body chunks (as the transport delivers them, bounded well under 1 MiB) to
/// the staged file. Progress fires at most once per
/// [`report_interval`](DownloadOptions::report_interval), plus exactly once
/// at completion with `bytes_done == byte_total` when the origin announced a
/// length. Returns the number of bytes written.
///
/// On mid-stream failure or cancellation the partially written file is left
/// in place; deleting it is the orchestrator's job, which must run cleanup on
/// every exit path anyway.
///
/// # Errors
///
/// [`TransferError::Forbidden`] on HTTP 403,
/// [`TransferError::UnexpectedStatus`] on any other non-200 status,
/// [`TransferError::Timeout`] when no bytes arrive for the idle window,
/// [`TransferError::Cancelled`] when the token trips at a chunk boundary, and
/// I/O or HTTP variants for everything the transport reports.
pub async fn download(
    client: &reqwest::Client,
    fs: &dyn FileSystem,
    source_url: &str,
    headers: &HashMap<String, String>,
    dest: &Path,
    progress: &dyn TransferProgress,
    options: &DownloadOptions,
    cancel: &CancellationToken,
) -> Result<u64, TransferError> {
    let request = client
        .get(source_url)
        .headers(build_headers(headers, options));

    // The idle window also covers waiting for response headers; an origin
    // that never answers is as stalled as one that stops mid-body.
    let response = timeout(options.idle_timeout, request.send())
        .await
        .map_err(|_| TransferError::Timeout {
            idle_secs: options.idle_timeout.as_secs(),
        })??;

    match response.status().as_u16() {
        200 => {}
        403 => return Err(TransferError::Forbidden),
        code => return Err(TransferError::UnexpectedStatus { code }),
    }

    let byte_total = response.content_length().filter(|&t| t > 0);
    let mut file = fs.create_file(dest).await?;
    let mut stream = response.bytes_stream();
    let mut throttle = ProgressThrottle::new(options.report_interval);
    let mut bytes_done: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let chunk = match timeout(options.idle_timeout, stream.next()).await {
            Err(_) => {
                return Err(TransferError::Timeout {
                    idle_secs: options.idle_timeout.as_secs(),
                });
            }
            Ok(None) => break,
            Ok(Some(chunk)) => chunk?,
        };
        file.write_all(&chunk).await?;
        bytes_done += chunk.len() as u64;
        // The completion event after the loop is the only one allowed to
        // report bytes_done == byte_total.
        if byte_total != Some(bytes_done) && throttle.ready(Instant::now()) {
            progress.on_progress(bytes_done, byte_total).await;
        }
    }

    file.flush().await?;
    drop(file);

    // One final event so the display lands on 100% when the total is known.
    if let Some(total) = byte_total {
        progress.on_progress(total, Some(total)).await;
    }

    log::info!("staged {bytes_done} bytes from origin into {}", dest.display());
    Ok(bytes_done)
}
