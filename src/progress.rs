//! Progress text rendering and report throttling.
//!
//! `render` is pure formatting; it can be called at any rate and does no
//! I/O. Throttling lives in [`ProgressThrottle`], owned by exactly one
//! transfer task.

use std::time::{Duration, Instant};

use crate::format::{format_eta, format_mb};

/// Width of the proportional bar, in segments.
pub const BAR_SEGMENTS: u64 = 20;

/// Minimum interval between status-message edits for a transfer.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(2);

const FILLED: char = '\u{25cf}'; // ●
const EMPTY: char = '\u{25cb}'; // ○

fn bar(filled: u64) -> String {
    let filled = filled.min(BAR_SEGMENTS) as usize;
    let mut s = String::with_capacity(BAR_SEGMENTS as usize * 3);
    for _ in 0..filled {
        s.push(FILLED);
    }
    for _ in filled..BAR_SEGMENTS as usize {
        s.push(EMPTY);
    }
    s
}

/// Neutral placeholder bar shown when the total is unknown.
fn indeterminate_bar() -> String {
    let mut s = String::new();
    for _ in 0..BAR_SEGMENTS / 2 {
        s.push(FILLED);
        s.push(EMPTY);
    }
    s
}

/// Number of filled bar segments for a known total.
///
/// Monotonically non-decreasing in `bytes_done` and clamped to the bar width.
#[must_use]
pub fn filled_segments(bytes_done: u64, byte_total: u64) -> u64 {
    if byte_total == 0 {
        return 0;
    }
    (BAR_SEGMENTS * bytes_done.min(byte_total)) / byte_total
}

/// Renders the human-readable status text for one transfer stage.
///
/// `elapsed` is the wall time since the stage started (callers pass
/// `now - start_time`). With a known, non-zero total the text carries a
/// percentage in `[0, 100]`, a proportional bar, and an ETA; otherwise the
/// percentage is reported as zero, the bar is a placeholder pattern, and the
/// ETA reads "calculating…".
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn render(
    label: &str,
    stage: &str,
    bytes_done: u64,
    byte_total: Option<u64>,
    elapsed: Duration,
) -> String {
    let secs = elapsed.as_secs_f64().max(1e-3);
    let speed_mb = bytes_done as f64 / (1024.0 * 1024.0 * secs);

    let (pct, bar_str, done_str, eta_str) = match byte_total {
        Some(total) if total > 0 => {
            let done = bytes_done.min(total);
            let pct = done as f64 * 100.0 / total as f64;
            let remain = total - done;
            let eta = Duration::try_from_secs_f64(remain as f64 / done.max(1) as f64 * secs)
                .unwrap_or(Duration::MAX);
            (
                pct,
                bar(filled_segments(done, total)),
                format!("{} of {}", format_mb(done), format_mb(total)),
                format_eta(eta),
            )
        }
        _ => (
            0.0,
            indeterminate_bar(),
            format!("{} of ?", format_mb(bytes_done)),
            "calculating\u{2026}".to_string(),
        ),
    };

    format!(
        "{label}\n{stage}\n [{bar_str}]\n\
         Progress: {pct:.2}%\n\
         Done: {done_str}\n\
         Speed: {speed_mb:.2} MB/s\n\
         Time left: {eta_str}"
    )
}

/// Rate gate for progress reports, private to one transfer task.
#[derive(Debug)]
pub struct ProgressThrottle {
    min_interval: Duration,
    last_report: Option<Instant>,
}

impl ProgressThrottle {
    /// Creates a throttle with the given minimum interval between reports.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_report: None,
        }
    }

    /// Returns true (and records the report) if enough time has passed since
    /// the previous report. The first call always passes.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = self
            .last_report
            .is_none_or(|last| now.duration_since(last) >= self.min_interval);
        if due {
            self.last_report = Some(now);
        }
        due
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_INTERVAL)
    }
}
