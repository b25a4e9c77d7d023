//! Progress tracking and run summaries

use crate::config::ProgressStyle;
use crate::state::UrlResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Point-in-time progress figures
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub detected: u64,
    /// Successes that needed a URL variation
    pub via_variation: u64,
    pub elapsed_secs: f64,
    pub rate_per_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<u64>,
    /// Failure counts by last status class
    pub failures_by_class: BTreeMap<String, u64>,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }

    pub fn compact_line(&self) -> String {
        let eta = self
            .eta_secs
            .map(|s| format_duration(Duration::from_secs(s)))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "Progress: {}/{} ({:.1}%) | ok {} | failed {} | detected {} | {:.2} URL/s | ETA {}",
            self.completed,
            self.total,
            self.percent(),
            self.succeeded,
            self.failed,
            self.detected,
            self.rate_per_sec,
            eta
        )
    }

    /// Multi-line status: progress, detections, then failures by class
    pub fn detailed_status(&self) -> String {
        let eta = self
            .eta_secs
            .map(|s| format_duration(Duration::from_secs(s)))
            .unwrap_or_else(|| "-".to_string());
        let mut lines = vec![format!(
            "Progress: {}/{} ({:.1}%) | Success: {} | Failed: {} | Rate: {:.1} URL/s | Elapsed: {} | ETA: {}",
            self.completed,
            self.total,
            self.percent(),
            self.succeeded,
            self.failed,
            self.rate_per_sec,
            format_duration(Duration::from_secs_f64(self.elapsed_secs.max(0.0))),
            eta
        )];

        if self.succeeded > 0 {
            let share = self.detected as f64 / self.succeeded as f64 * 100.0;
            lines.push(format!(
                "Detected: {}/{} ({:.1}%) | Via variation: {}",
                self.detected, self.succeeded, share, self.via_variation
            ));
        }
        if !self.failures_by_class.is_empty() {
            let classes: Vec<String> = self
                .failures_by_class
                .iter()
                .map(|(class, count)| format!("{}: {}", class, count))
                .collect();
            lines.push(format!("Failures: {}", classes.join(" | ")));
        }

        lines.join("\n")
    }
}

/// Counts results as the sink persists them
#[derive(Debug)]
pub struct ProgressTracker {
    total: u64,
    interval: u64,
    style: ProgressStyle,
    started: Instant,
    snapshot: ProgressSnapshot,
}

impl ProgressTracker {
    pub fn new(total: u64, interval: u64, style: ProgressStyle) -> Self {
        Self {
            total,
            interval: interval.max(1),
            style,
            started: Instant::now(),
            snapshot: ProgressSnapshot {
                total,
                ..ProgressSnapshot::default()
            },
        }
    }

    pub fn record(&mut self, result: &UrlResult) {
        let s = &mut self.snapshot;
        s.completed += 1;
        if result.success {
            s.succeeded += 1;
            if result.variation_used.is_some() {
                s.via_variation += 1;
            }
            if result.detection.as_ref().is_some_and(|d| d.found) {
                s.detected += 1;
            }
        } else {
            s.failed += 1;
            let class = result
                .status_class
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            *s.failures_by_class.entry(class).or_default() += 1;
        }

        if s.completed % self.interval == 0 {
            self.log();
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let mut snapshot = self.snapshot.clone();
        let elapsed = self.started.elapsed().as_secs_f64();
        snapshot.elapsed_secs = elapsed;
        if elapsed > 0.0 {
            snapshot.rate_per_sec = snapshot.completed as f64 / elapsed;
        }
        if snapshot.rate_per_sec > 0.0 && self.total >= snapshot.completed {
            let left = (self.total - snapshot.completed) as f64;
            snapshot.eta_secs = Some((left / snapshot.rate_per_sec).round() as u64);
        }
        snapshot
    }

    pub fn log(&self) {
        let snapshot = self.snapshot();
        match self.style {
            ProgressStyle::Compact => tracing::info!("{}", snapshot.compact_line()),
            ProgressStyle::Detailed => {
                for line in snapshot.detailed_status().lines() {
                    tracing::info!("{}", line);
                }
            }
            ProgressStyle::Json => match serde_json::to_string(&snapshot) {
                Ok(json) => tracing::info!(target: "tagsweep::progress", "{}", json),
                Err(e) => tracing::warn!("Failed to encode progress: {}", e),
            },
        }
    }
}

/// Formats a duration as `1h02m`, `3m05s` or `42s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m", h, m)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}
