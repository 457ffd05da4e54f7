//! Progress bars with a log-only mode.
//!
//! In log-only mode bars are hidden and progress is reported through
//! `tracing` at fixed intervals, which keeps output tail-friendly.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tracing::info;

const BAR_TEMPLATE: &str = "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})";

#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    log_only: bool,
}

impl Progress {
    pub fn new(log_only: bool) -> Self {
        Self { log_only }
    }

    pub fn bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if self.log_only {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        } else if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Report every `interval` items (and the last one) in log-only mode.
    pub fn log(&self, phase: &str, current: u64, total: u64, interval: u64) {
        if self.log_only && total > 0 && (current % interval.max(1) == 0 || current == total) {
            let pct = 100.0 * current as f64 / total as f64;
            info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
        }
    }
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_log_only_bar_is_hidden() {
        let pb = Progress::new(true).bar(10, "sync");
        assert!(pb.is_hidden());
    }
}
