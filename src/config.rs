//! Configuration for the relay service.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::download::{DEFAULT_IDLE_TIMEOUT, DEFAULT_USER_AGENT, DownloadOptions};
use crate::error::{Error, Result};
use crate::progress::DEFAULT_REPORT_INTERVAL;
use crate::session;

/// Builds a `Cookie` request header from Netscape-format cookie lines.
///
/// Each usable line has at least seven whitespace-separated fields; the
/// sixth is the cookie name and the rest its value. Blank lines and `#`
/// comments are skipped. Returns `None` when no usable line remains.
#[must_use]
pub fn build_cookie_header(raw: &str) -> Option<String> {
    let mut pairs = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 7 {
            continue;
        }
        pairs.push(format!("{}={}", fields[5], fields[6..].join(" ")));
    }
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Relay behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Working directory holding staged files.
    pub download_dir: PathBuf,
    /// User-agent for origin requests without one of their own.
    pub user_agent: String,
    /// Optional `Cookie` header sent with extraction and download requests.
    pub cookie_header: Option<String>,
    /// Minimum seconds between status-display updates.
    pub report_interval_secs: u64,
    /// Seconds without byte progress before a transfer aborts.
    pub idle_timeout_secs: u64,
    /// Seconds an unconsumed tier selection stays resolvable.
    pub session_ttl_secs: u64,
    /// Concurrent extraction workers.
    pub max_concurrent_extractions: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            download_dir: dirs::cache_dir()
                .map_or_else(|| PathBuf::from("downloads"), |d| d.join("media-relay")),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookie_header: None,
            report_interval_secs: DEFAULT_REPORT_INTERVAL.as_secs(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
            session_ttl_secs: session::DEFAULT_TTL.as_secs(),
            max_concurrent_extractions: 2,
        }
    }
}

impl RelayConfig {
    /// Session time-to-live as a duration.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Download tunables derived from this config.
    #[must_use]
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            user_agent: self.user_agent.clone(),
            cookie_header: self.cookie_header.clone(),
            report_interval: Duration::from_secs(self.report_interval_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}

/// Membership-gate settings; the gate is off when no channel is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Channel users must have joined.
    pub channel: Option<String>,
    /// Invite link shown in the join prompt.
    pub invite_link: Option<String>,
}

impl GateConfig {
    /// The link presented with the join prompt, derived from the channel
    /// name when no explicit invite link is configured.
    #[must_use]
    pub fn join_url(&self) -> Option<String> {
        self.invite_link
            .clone()
            .or_else(|| self.channel.as_ref().map(|ch| format!("https://t.me/{ch}")))
    }
}

/// Liveness endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Relay behavior.
    pub relay: RelayConfig,
    /// Membership gate.
    pub gate: GateConfig,
    /// Liveness endpoint.
    pub api: ApiConfig,
    /// Extractor binary to shell out to.
    pub extractor_bin: Option<PathBuf>,
}

impl AppConfig {
    /// Loads configuration from the environment, defaulting everything that
    /// is unset.
    ///
    /// Recognized variables: `RELAY_DOWNLOAD_DIR`, `RELAY_COOKIES` (raw
    /// Netscape cookie lines), `RELAY_USER_AGENT`, `RELAY_EXTRACTOR`,
    /// `FORCE_CH`, `FORCE_LINK`, `PORT`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `PORT` is present but not a number.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("RELAY_DOWNLOAD_DIR") {
            config.relay.download_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var("RELAY_COOKIES") {
            config.relay.cookie_header = build_cookie_header(&raw);
        }
        if let Ok(ua) = std::env::var("RELAY_USER_AGENT") {
            config.relay.user_agent = ua;
        }
        if let Ok(bin) = std::env::var("RELAY_EXTRACTOR") {
            config.extractor_bin = Some(PathBuf::from(bin));
        }
        config.gate.channel = std::env::var("FORCE_CH").ok();
        config.gate.invite_link = std::env::var("FORCE_LINK").ok();
        if let Ok(port) = std::env::var("PORT") {
            config.api.port = port
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a number: {port:?}")))?;
        }

        Ok(config)
    }

    /// The extractor binary, defaulting to `yt-dlp` on the search path.
    #[must_use]
    pub fn extractor_bin(&self) -> PathBuf {
        self.extractor_bin
            .clone()
            .unwrap_or_else(|| PathBuf::from("yt-dlp"))
    }
}
