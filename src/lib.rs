//! media-relay - a quality-selecting, two-hop streaming relay.
//!
//! A user submits a media link, picks a quality tier, and receives the
//! matching rendition relayed through this service: origin → staged local
//! file → destination transport, with live progress on both hops. The
//! messaging transport, extraction service, and access gate are external
//! collaborators modelled as traits.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_relay::{ExtractorPool, YtDlpExtractor, select};
//!
//! # async fn example() -> media_relay::Result<()> {
//! let pool = ExtractorPool::new(
//!     Arc::new(YtDlpExtractor::new("yt-dlp".into(), "media-relay/0.1".into(), None)),
//!     2,
//! );
//!
//! let info = pool.extract("https://youtu.be/abc123").await?;
//! let tiers = select(&info.formats);
//! for (tier, rendition) in &tiers {
//!     println!("{tier}: {}", rendition.byte_source_url);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod api;
pub mod bot;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod format;
pub mod fs;
pub mod progress;
pub mod relay;
pub mod rendition;
pub mod session;
pub mod transport;
pub mod upload;
pub mod url;

// Re-export main types for convenience
pub use bot::Bot;
pub use config::AppConfig;
pub use download::{DownloadOptions, NoProgress, TransferProgress, download};
pub use error::{Error, ExtractionError, Result, SessionError, TransferError};
pub use extract::{Extractor, ExtractorPool, MediaInfo, MediaReference, YtDlpExtractor};
pub use fs::{FileSystem, TokioFileSystem};
pub use relay::{RelayState, Relayer};
pub use rendition::{RawFormat, Rendition, RenditionMap, Tier, select};
pub use session::{ResolvedSession, SessionStore};
pub use transport::{AccessGate, CallbackAction, ChatEvent, Messenger, StatusHandle};
pub use upload::{Destination, UploadSink, UploadedReference, upload};
