//! Progress reporting: a write-only sink for a fractional ratio, with a
//! throttled terminal renderer matching the reference bar's cadence.

use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Minimum refresh interval between two renders of a non-complete ratio.
const REFRESH_PERIOD: Duration = Duration::from_millis(100);

/// Receives `numerator / denominator` progress updates in `[0, 1]`.
/// Drivers call this after every page/block of a read, write, or erase;
/// a sink is free to ignore every call.
pub trait ProgressSink {
    fn update(&mut self, numerator: f64, denominator: f64);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&mut self, _numerator: f64, _denominator: f64) {}
}

/// Renders a `[+++   ]`-style bar with an estimated-time-remaining figure,
/// throttled to `REFRESH_PERIOD`. Goes silent after the first ratio of 1.0.
pub struct TerminalProgress<W: Write> {
    muted: bool,
    writer: W,
    start: Instant,
    next_show: Instant,
}

impl<W: Write> TerminalProgress<W> {
    pub fn new(writer: W) -> Self {
        let now = Instant::now();
        TerminalProgress {
            muted: false,
            writer,
            start: now,
            next_show: now,
        }
    }
}

impl TerminalProgress<io::Stderr> {
    /// A progress bar writing to standard error, the CLI's default.
    pub fn stderr() -> Self {
        TerminalProgress::new(io::stderr())
    }
}

impl<W: Write> ProgressSink for TerminalProgress<W> {
    fn update(&mut self, numerator: f64, denominator: f64) {
        let ratio = numerator / denominator;
        assert!((0.0..=1.0).contains(&ratio), "ratio must be in [0, 1]");
        if self.muted {
            return;
        }

        let now = Instant::now();
        if ratio < 1.0 && now < self.next_show {
            return;
        }
        self.next_show = now + REFRESH_PERIOD;

        let elapsed = now.duration_since(self.start).as_secs_f64();
        let seconds = if ratio >= 1.0 {
            self.muted = true;
            elapsed
        } else {
            (1.0 - ratio) * elapsed / ratio.max(1e-3)
        };

        let _ = write!(self.writer, "{}", format_output(seconds, ratio));
        let _ = self.writer.flush();
    }
}

/// Renders one progress line: a percentage, a 20-column bar, and an
/// estimated-seconds-remaining figure. `seconds` must be non-negative and
/// `ratio` must be in `[0, 1]`.
pub fn format_output(seconds: f64, ratio: f64) -> String {
    assert!(seconds >= 0.0);
    assert!((0.0..=1.0).contains(&ratio));

    let plusses = "+".repeat((ratio * 100.0 / 5.0) as usize);
    let mut output = format!("\r{:5.1}% [{:<20}] {:7.3}s", ratio * 100.0, plusses, seconds);
    if ratio >= 1.0 {
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_output_mid_progress() {
        assert_eq!(
            format_output(1.234, 0.5),
            "\r 50.0% [++++++++++          ]   1.234s"
        );
    }

    #[test]
    fn test_format_output_complete_appends_newline() {
        let out = format_output(12.0, 1.0);
        assert!(out.ends_with('\n'));
        assert!(out.contains("100.0%"));
    }

    #[test]
    fn test_format_output_zero_ratio_has_no_plusses() {
        assert_eq!(
            format_output(0.0, 0.0),
            "\r  0.0% [                    ]   0.000s"
        );
    }

    #[test]
    fn test_terminal_progress_mutes_after_complete() {
        let mut sink = TerminalProgress::new(Vec::new());
        sink.update(1.0, 1.0);
        sink.update(0.1, 1.0);
        assert!(sink.muted);
    }
}
