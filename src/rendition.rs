//! Rendition selection: mapping raw extractor formats to the best candidate
//! per quality tier.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Container extension that earns the score bonus.
pub const PREFERRED_CONTAINER: &str = "mp4";

/// A coarse quality bucket offered to the user.
///
/// Heights map into tiers via half-open buckets; anything outside all
/// buckets is not offered at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Heights in `[240, 420)`.
    Q360,
    /// Heights in `[420, 560)`.
    Q480,
    /// Heights in `[560, 800)`.
    Q720,
}

impl Tier {
    /// All tiers, lowest first — the order buttons are laid out in.
    pub const ALL: [Self; 3] = [Self::Q360, Self::Q480, Self::Q720];

    /// Classifies a pixel height into its tier bucket.
    #[must_use]
    pub const fn from_height(height: u32) -> Option<Self> {
        match height {
            240..420 => Some(Self::Q360),
            420..560 => Some(Self::Q480),
            560..800 => Some(Self::Q720),
            _ => None,
        }
    }

    /// The nominal height used in labels and file names.
    #[must_use]
    pub const fn nominal(self) -> u32 {
        match self {
            Self::Q360 => 360,
            Self::Q480 => 480,
            Self::Q720 => 720,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.nominal())
    }
}

impl FromStr for Tier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_end_matches('p') {
            "360" => Ok(Self::Q360),
            "480" => Ok(Self::Q480),
            "720" => Ok(Self::Q720),
            _ => Err(()),
        }
    }
}

/// One raw rendition record as the extraction service reports it.
///
/// Fields mirror the extractor's JSON format entries; anything this module
/// does not score on is dropped during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    /// Video codec indicator; `"none"` marks an audio-only record.
    pub vcodec: Option<String>,
    /// Audio codec indicator; `"none"` marks a silent video record.
    pub acodec: Option<String>,
    /// Frame height in pixels.
    pub height: Option<u32>,
    /// Container extension.
    pub ext: Option<String>,
    /// Direct byte-source URL.
    pub url: Option<String>,
    /// Request headers the byte source requires.
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
}

/// The retained rendition for one tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    /// Tier this rendition was bucketed into.
    pub tier: Tier,
    /// Container extension, used in the staged file name.
    pub extension: String,
    /// Whether an audio stream is muxed in.
    pub has_audio: bool,
    /// Actual source height, always inside the tier's bucket.
    pub source_height: u32,
    /// Direct byte-source URL.
    pub byte_source_url: String,
    /// Headers to send when fetching the byte source.
    pub request_headers: HashMap<String, String>,
    /// Tie-break score; the highest-scoring record per tier wins.
    pub score: f64,
}

/// Best rendition per tier; at most one entry per tier, lowest tier first.
pub type RenditionMap = BTreeMap<Tier, Rendition>;

fn score_format(ext: &str, has_audio: bool, height: u32) -> f64 {
    let mut score = 0.0;
    if ext == PREFERRED_CONTAINER {
        score += 10.0;
    }
    if has_audio {
        score += 20.0;
    }
    score + f64::from(height) / 1000.0
}

/// Selects the best rendition per tier from raw extractor records.
///
/// One pass over the input: records without a video stream, a usable height,
/// or a byte source are silently skipped; the rest are bucketed by height and
/// the strictly highest-scoring record per bucket is kept, with the
/// earliest-seen record winning exact score ties. An empty map is a valid
/// result and means "no usable quality".
///
/// Pure and deterministic for a given input ordering.
#[must_use]
pub fn select(raw_formats: &[RawFormat]) -> RenditionMap {
    let mut best: RenditionMap = BTreeMap::new();

    for f in raw_formats {
        if f.vcodec.as_deref() == Some("none") {
            continue; // audio-only
        }
        let Some(url) = f.url.as_deref().filter(|u| !u.is_empty()) else {
            continue;
        };
        let Some(height) = f.height.filter(|&h| h > 0) else {
            continue;
        };
        let Some(tier) = Tier::from_height(height) else {
            continue;
        };

        let ext = f.ext.clone().unwrap_or_else(|| PREFERRED_CONTAINER.to_string());
        let has_audio = f.acodec.as_deref() != Some("none");
        let score = score_format(&ext, has_audio, height);

        let better = best.get(&tier).is_none_or(|cur| score > cur.score);
        if better {
            best.insert(
                tier,
                Rendition {
                    tier,
                    extension: ext,
                    has_audio,
                    source_height: height,
                    byte_source_url: url.to_string(),
                    request_headers: f.http_headers.clone(),
                    score,
                },
            );
        }
    }

    best
}
