//! Formatting helpers for the progress text.

use std::time::Duration;

/// Formats a byte count in megabytes, the unit the status text always uses.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_mb(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes == 0 {
        return "0 MB".to_string();
    }
    format!("{:.2} MB", bytes as f64 / MB)
}

/// Formats a remaining-time estimate the way the status text shows it
/// (e.g. "2h, 5m", "3m, 12s", "45s").
#[must_use]
pub fn format_eta(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h, {m}m")
    } else if m > 0 {
        format!("{m}m, {s}s")
    } else {
        format!("{s}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_mb_zero() {
        assert_eq!(format_mb(0), "0 MB");
    }

    #[test]
    fn format_mb_values() {
        assert_eq!(format_mb(1_048_576), "1.00 MB");
        assert_eq!(format_mb(10_485_760), "10.00 MB");
        assert_eq!(format_mb(1_572_864), "1.50 MB");
    }

    #[test]
    fn format_eta_units() {
        assert_eq!(format_eta(Duration::from_secs(45)), "45s");
        assert_eq!(format_eta(Duration::from_secs(192)), "3m, 12s");
        assert_eq!(format_eta(Duration::from_secs(7500)), "2h, 5m");
    }

    #[test]
    fn format_eta_zero() {
        assert_eq!(format_eta(Duration::ZERO), "0s");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn format_mb_never_panics(bytes in 0u64..u64::MAX) {
                let _ = format_mb(bytes);
            }

            #[test]
            fn format_eta_never_panics(secs in 0u64..1_000_000_000) {
                let _ = format_eta(Duration::from_secs(secs));
            }
        }
    }
}
