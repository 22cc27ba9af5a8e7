//! 📊 progress.rs: "Are we there yet?", every drain, every time, forever.
//!
//! 🚀 Write tasks call [`ProgressReporter::on_write`] every time an object lands. What
//! happens next depends on who is listening: nothing ([`NoProgress`]), a log line every N
//! writes ([`LogProgress`]), or a spinner with a table so comfy it has lumbar support
//! ([`TerminalProgress`]).
//!
//! ⚠️ Reporters run inside write tasks. They must not block. Watching the spinner will not
//! make it go faster either. We've tried. Science says no.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{info, warn};

use crate::drain::{DrainError, DrainSummary};

/// 📡 Hears about every settled write, and about how the run ended.
pub trait ProgressReporter: Send + Sync + fmt::Debug {
    /// ✅ A write settled, landed or not. `count` is the running total of successful writes,
    /// `rate` is records/s since start.
    fn on_write(&self, count: u64, rate: f64);

    /// 🏁 Called once, only when the drain completed without error.
    fn on_finish(&self, _summary: &DrainSummary) {}

    /// 💀 Called once, instead of `on_finish`, when the drain ends in an error.
    fn on_fail(&self, _summary: &DrainSummary, _error: &DrainError) {}
}

/// 🤫 Says nothing. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn on_write(&self, _count: u64, _rate: f64) {}
}

/// 📜 A `tracing::info!` line every `every` writes. For logs that get shipped somewhere.
#[derive(Debug, Clone, Copy)]
pub struct LogProgress {
    every: u64,
}

impl LogProgress {
    pub fn new(every: u64) -> Self {
        // -- 🐛 every 0 writes is a division by zero wearing a trench coat
        Self {
            every: every.max(1),
        }
    }
}

impl ProgressReporter for LogProgress {
    fn on_write(&self, count: u64, rate: f64) {
        if count % self.every == 0 {
            info!(
                "📊 {} records written ({:.1} records/s)",
                format_number(count),
                rate
            );
        }
    }

    fn on_finish(&self, summary: &DrainSummary) {
        info!(
            "🏁 {} records written in {} ({:.1} records/s)",
            format_number(summary.count),
            format_duration(summary.elapsed),
            summary.rate
        );
    }

    fn on_fail(&self, summary: &DrainSummary, error: &DrainError) {
        warn!(
            "💀 drain gave up after {} records in {}: {error}",
            format_number(summary.count),
            format_duration(summary.elapsed)
        );
    }
}

// ============================================================
//  🎨 TerminalProgress: the spinner and its comfy table
// ============================================================

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
/// "1000000" → "1,000,000". You're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Formats a Duration into MM:SS or HH:MM:SS.
/// If it shows HH:MM:SS, you should probably call your mom. It's been a while.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 🔄 Sliding window of (timestamp, records written) for the "right now" rate.
#[derive(Debug)]
struct RateWindow {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
}

impl RateWindow {
    fn new(start: Instant) -> Self {
        // -- 🔄 seed with t=0 so we don't divide by zero like animals
        let mut samples = VecDeque::new();
        samples.push_back((start, 0));
        Self {
            samples,
            window: Duration::from_secs(5),
        }
    }

    fn push(&mut self, now: Instant, count: u64) -> f64 {
        // 🔄 evict samples older than the window, like a bouncer but for data points
        while let Some(&(timestamp, _)) = self.samples.front() {
            if now.duration_since(timestamp) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        self.samples.push_back((now, count));

        match self.samples.front() {
            Some(&(oldest_time, oldest_count)) => {
                let elapsed = now.duration_since(oldest_time).as_secs_f64();
                if elapsed > 0.0 {
                    count.saturating_sub(oldest_count) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }
}

/// 🎨 A spinner whose message is a two-column comfy-table:
///
/// ```text
/// source: <name>
///   <recent records/s>    <total records>
///   <overall records/s>   <elapsed>
/// ```
///
/// The table is redrawn at most every `redraw_every` writes; a thousand concurrent writers
/// all re-rendering a table is how you turn a progress bar into the bottleneck.
pub struct TerminalProgress {
    source_name: String,
    progress_bar: ProgressBar,
    window: Mutex<RateWindow>,
    start_time: Instant,
    redraw_every: u64,
}

impl fmt::Debug for TerminalProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("TerminalProgress")
            .field("source_name", &self.source_name)
            .field("redraw_every", &self.redraw_every)
            .finish()
    }
}

impl TerminalProgress {
    pub fn new(source_name: impl Into<String>) -> Self {
        let progress_bar = ProgressBar::new_spinner();
        match ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            Ok(style) => progress_bar.set_style(style),
            Err(err) => warn!("⚠️ progress template rejected, keeping the default: {err}"),
        }
        progress_bar.enable_steady_tick(Duration::from_millis(120));

        let start_time = Instant::now();
        Self {
            source_name: source_name.into(),
            progress_bar,
            window: Mutex::new(RateWindow::new(start_time)),
            start_time,
            redraw_every: 100,
        }
    }

    fn render(&self, count: u64, recent_rate: f64, overall_rate: f64) {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            Cell::new(format!("{} Records/s", format_number(recent_rate as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} Records", format_number(count)))
                .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{:.1} avg/s", overall_rate)).set_alignment(CellAlignment::Right),
            Cell::new(format!(
                "{} elapsed",
                format_duration(self.start_time.elapsed())
            ))
            .set_alignment(CellAlignment::Right),
        ]);
        self.progress_bar
            .set_message(format!("source: {}\n{}", self.source_name, table));
    }
}

impl ProgressReporter for TerminalProgress {
    fn on_write(&self, count: u64, rate: f64) {
        if count % self.redraw_every != 0 {
            return;
        }
        let recent = self
            .window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Instant::now(), count);
        self.render(count, recent, rate);
    }

    fn on_finish(&self, summary: &DrainSummary) {
        self.render(summary.count, summary.rate, summary.rate);
        self.progress_bar.finish();
    }

    fn on_fail(&self, summary: &DrainSummary, error: &DrainError) {
        self.progress_bar.abandon_with_message(format!(
            "💀 source: {} gave up after {} records: {error}",
            self.source_name,
            format_number(summary.count)
        ));
    }
}

// ============================================================
//  🔧 ProgressConfig
// ============================================================

/// 🔧 Which reporter to build. `none` unless you ask.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProgressConfig {
    #[default]
    None,
    Log {
        #[serde(default = "default_log_every")]
        every: u64,
    },
    Terminal,
}

fn default_log_every() -> u64 {
    10_000
}

impl ProgressConfig {
    pub fn reporter_for(&self, source_name: &str) -> Arc<dyn ProgressReporter> {
        match self {
            ProgressConfig::None => Arc::new(NoProgress),
            ProgressConfig::Log { every } => Arc::new(LogProgress::new(*every)),
            ProgressConfig::Terminal => Arc::new(TerminalProgress::new(source_name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_numbers_get_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn the_one_where_durations_grow_an_hours_column() {
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "01:02:05");
    }

    #[test]
    fn the_one_where_the_window_forgets_old_samples() {
        let start = Instant::now();
        let mut window = RateWindow::new(start);
        let recent = window.push(start + Duration::from_secs(2), 200);
        assert!((recent - 100.0).abs() < 1e-9);

        // 🧪 ten seconds later the t=0 and t=2 samples are gone; only the new one remains
        let later = window.push(start + Duration::from_secs(12), 1_200);
        assert_eq!(later, 0.0);
        assert_eq!(window.samples.len(), 1);
    }

    #[test]
    fn the_one_where_log_progress_survives_every_zero() {
        let reporter = LogProgress::new(0);
        reporter.on_write(1, 1.0);
        reporter.on_write(2, 1.0);
    }

    #[test]
    fn the_one_where_config_picks_the_reporter() {
        let config: ProgressConfig =
            serde_json::from_str(r#"{"mode":"log","every":5}"#).unwrap();
        assert_eq!(config, ProgressConfig::Log { every: 5 });
        let reporter = config.reporter_for("users");
        assert!(format!("{reporter:?}").contains("LogProgress"));
        assert_eq!(ProgressConfig::default(), ProgressConfig::None);
    }
}
