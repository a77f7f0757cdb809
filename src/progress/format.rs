//! Human-readable rendering of transfer statistics.

use std::fmt::Write as _;

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Formats a byte count in powers of 1024 with two decimals, e.g. `1.50 MB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn human_size(bytes: f64) -> String {
    let mut size = bytes.max(0.0);
    let mut unit = SIZE_UNITS[0];
    for (index, candidate) in SIZE_UNITS.iter().enumerate() {
        unit = candidate;
        if size < 1024.0 || index == SIZE_UNITS.len() - 1 {
            break;
        }
        size /= 1024.0;
    }
    format!("{size:.2} {unit}")
}

/// Formats a duration given in milliseconds, e.g. `1h, 0m, 5s`.
///
/// Zero-valued leading and trailing components are omitted, zeros between
/// non-zero components are kept. A zero duration renders as `0s`.
#[must_use]
pub fn human_duration(millis: u64) -> String {
    let (seconds, ms) = (millis / 1000, millis % 1000);
    let (minutes, seconds) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let (days, hours) = (hours / 24, hours % 24);

    let components = [(days, "d"), (hours, "h"), (minutes, "m"), (seconds, "s"), (ms, "ms")];
    let first = components.iter().position(|(value, _)| *value > 0);
    let last = components.iter().rposition(|(value, _)| *value > 0);
    let (Some(first), Some(last)) = (first, last) else {
        return "0s".to_string();
    };

    components[first..=last]
        .iter()
        .map(|(value, suffix)| format!("{value}{suffix}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders a segmented bar with `floor(percentage / (100 / segments))` filled cells.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn render_bar(percentage: f64, segments: u32) -> String {
    let segments = segments.max(1);
    let per_segment = 100.0 / f64::from(segments);
    let filled = ((percentage.clamp(0.0, 100.0) / per_segment).floor() as u32).min(segments);

    let mut bar = String::with_capacity(segments as usize * 3 + 2);
    bar.push('[');
    for _ in 0..filled {
        bar.push('●');
    }
    for _ in filled..segments {
        bar.push('○');
    }
    bar.push(']');
    bar
}

/// Snapshot of one transfer's statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Percentage complete, capped at 100.
    pub percentage: f64,
    /// Bytes per second since the transfer started.
    pub speed: f64,
    /// Estimated remaining time, if the speed is known.
    pub eta_millis: Option<u64>,
    /// Bytes done.
    pub current: u64,
    /// Bytes expected.
    pub total: u64,
}

impl ProgressSnapshot {
    /// Computes statistics from byte counts and elapsed seconds.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn compute(current: u64, total: u64, elapsed_secs: f64) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            (current as f64 * 100.0 / total as f64).min(100.0)
        };
        let speed = if elapsed_secs > 0.0 {
            current as f64 / elapsed_secs
        } else {
            0.0
        };
        let eta_millis = (speed > 0.0)
            .then(|| (total.saturating_sub(current) as f64 / speed * 1000.0).round() as u64);

        Self {
            percentage,
            speed,
            eta_millis,
            current,
            total,
        }
    }

    /// Renders the multi-line status text.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn render(&self, segments: u32) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "{}", render_bar(self.percentage, segments));
        let _ = writeln!(text, "Progress: {:.2}%", self.percentage);
        let _ = writeln!(
            text,
            "Done: {} of {}",
            human_size(self.current as f64),
            human_size(self.total as f64)
        );
        let _ = writeln!(text, "Speed: {}/s", human_size(self.speed));
        let eta = self
            .eta_millis
            .map_or_else(|| "N/A".to_string(), human_duration);
        let _ = write!(text, "ETA: {eta}");
        text
    }
}
