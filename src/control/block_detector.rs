//! Sliding-window block detection
//!
//! Owned by the coordinator; workers never touch it. The trigger condition
//! is evaluated over the aggregate window of the last `window-size`
//! outcomes across all domains:
//!
//! - blocking signals / outcomes in window >= `threshold-ratio`
//! - blocking signals >= `min-signals`
//! - blocking signals come from at least two distinct domains
//!
//! The block report breaks the same window down per signalling domain.

use crate::config::BlockDetectionConfig;
use crate::state::AttemptOutcome;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Most recent blocked URLs kept as retry candidates
pub(crate) const RETRY_CANDIDATES: usize = 50;

/// Domains listed in a report
const REPORTED_DOMAINS: usize = 5;

#[derive(Debug, Clone)]
struct WindowEntry {
    domain: String,
    blocking: bool,
}

/// Per-domain share of the current window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainSignals {
    pub domain: String,
    pub blocking: usize,
    pub total: usize,
}

/// Snapshot of the window at the moment blocking was detected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockReport {
    pub blocking_signals: usize,
    pub window_len: usize,
    pub ratio: f64,
    pub unique_domains: usize,
    pub affected_domains: Vec<DomainSignals>,
    pub retry_candidates: usize,
}

impl BlockReport {
    pub fn summary(&self) -> String {
        let domains: Vec<&str> = self
            .affected_domains
            .iter()
            .map(|d| d.domain.as_str())
            .collect();
        format!(
            "{}/{} recent attempts were blocked ({:.0}%) across {} domain(s): {}",
            self.blocking_signals,
            self.window_len,
            self.ratio * 100.0,
            self.unique_domains,
            domains.join(", ")
        )
    }
}

#[derive(Debug)]
pub struct BlockDetector {
    threshold_ratio: f64,
    window_size: usize,
    min_signals: usize,
    window: VecDeque<WindowEntry>,
    signals: usize,
    recent_blocked: VecDeque<String>,
}

impl BlockDetector {
    pub fn new(config: &BlockDetectionConfig) -> Self {
        Self {
            threshold_ratio: config.threshold_ratio,
            window_size: config.window_size.max(1),
            min_signals: config.min_signals,
            window: VecDeque::with_capacity(config.window_size),
            signals: 0,
            recent_blocked: VecDeque::with_capacity(RETRY_CANDIDATES),
        }
    }

    /// Ingests one outcome
    pub fn record(&mut self, outcome: &AttemptOutcome) {
        let blocking = outcome.status_class.is_blocking_signal();

        let evicted = if self.window.len() == self.window_size {
            self.window.pop_front()
        } else {
            None
        };
        self.window.push_back(WindowEntry {
            domain: outcome.domain.clone(),
            blocking,
        });
        if blocking {
            self.signals += 1;
        }
        if let Some(evicted) = evicted {
            self.evict(evicted);
        }

        if blocking {
            self.recent_blocked.retain(|u| u != &outcome.original_url);
            if self.recent_blocked.len() == RETRY_CANDIDATES {
                self.recent_blocked.pop_front();
            }
            self.recent_blocked.push_back(outcome.original_url.clone());
        }
    }

    fn evict(&mut self, entry: WindowEntry) {
        if entry.blocking {
            self.signals -= 1;
        }
    }

    pub fn ratio(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.signals as f64 / self.window.len() as f64
        }
    }

    fn signal_domains(&self) -> HashSet<&str> {
        self.window
            .iter()
            .filter(|e| e.blocking)
            .map(|e| e.domain.as_str())
            .collect()
    }

    /// True when the window looks like the crawl is being blocked
    pub fn should_pause(&self) -> bool {
        self.signals > 0
            && self.signals >= self.min_signals
            && self.ratio() >= self.threshold_ratio
            && self.signal_domains().len() >= 2
    }

    pub fn report(&self) -> BlockReport {
        let signal_domains = self.signal_domains();
        let mut affected: Vec<DomainSignals> = signal_domains
            .iter()
            .map(|domain| {
                let entries = self.window.iter().filter(|e| e.domain == *domain);
                let (blocking, total) = entries.fold((0, 0), |(b, t), e| {
                    (b + usize::from(e.blocking), t + 1)
                });
                DomainSignals {
                    domain: domain.to_string(),
                    blocking,
                    total,
                }
            })
            .collect();
        affected.sort_by(|a, b| b.blocking.cmp(&a.blocking).then(a.domain.cmp(&b.domain)));
        affected.truncate(REPORTED_DOMAINS);

        BlockReport {
            blocking_signals: self.signals,
            window_len: self.window.len(),
            ratio: self.ratio(),
            unique_domains: signal_domains.len(),
            affected_domains: affected,
            retry_candidates: self.recent_blocked.len(),
        }
    }

    /// Recently blocked original URLs, oldest first
    pub fn retry_candidates(&self) -> Vec<String> {
        self.recent_blocked.iter().cloned().collect()
    }

    /// Starts a fresh window after a pause or warning resolves
    ///
    /// Retry candidates survive so a later pause can still offer them.
    pub fn reset(&mut self) {
        self.window.clear();
        self.signals = 0;
    }

    pub fn clear_retry_candidates(&mut self) {
        self.recent_blocked.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StatusClass;

    fn config(window_size: usize, min_signals: usize) -> BlockDetectionConfig {
        BlockDetectionConfig {
            enabled: true,
            threshold_ratio: 0.6,
            window_size,
            min_signals,
            ..BlockDetectionConfig::default()
        }
    }

    fn outcome(domain: &str, class: StatusClass) -> AttemptOutcome {
        let url = format!("https://{}/", domain);
        AttemptOutcome::new(&url, &url, domain, class, None, None)
    }

    #[test]
    fn test_single_domain_never_pauses() {
        let mut detector = BlockDetector::new(&config(20, 5));
        for _ in 0..100 {
            detector.record(&outcome("broken.com", StatusClass::Forbidden));
            assert!(!detector.should_pause());
        }
        assert_eq!(detector.ratio(), 1.0);
    }

    #[test]
    fn test_two_domains_at_threshold_pause() {
        let mut detector = BlockDetector::new(&config(20, 5));
        for domain in ["a.com", "b.com"] {
            for i in 0..10 {
                let class = if i < 6 {
                    StatusClass::RateLimited
                } else {
                    StatusClass::Success
                };
                detector.record(&outcome(domain, class));
            }
        }

        assert_eq!(detector.report().blocking_signals, 12);
        assert!(detector.should_pause());
    }

    #[test]
    fn test_below_ratio_does_not_pause() {
        let mut detector = BlockDetector::new(&config(20, 5));
        for domain in ["a.com", "b.com"] {
            for i in 0..10 {
                let class = if i < 5 {
                    StatusClass::Forbidden
                } else {
                    StatusClass::Success
                };
                detector.record(&outcome(domain, class));
            }
        }
        assert!(!detector.should_pause());
    }

    #[test]
    fn test_min_signals_guard() {
        let mut detector = BlockDetector::new(&config(20, 5));
        detector.record(&outcome("a.com", StatusClass::Forbidden));
        detector.record(&outcome("b.com", StatusClass::Forbidden));

        // 100% ratio over two domains, but only two signals
        assert!(!detector.should_pause());
    }

    #[test]
    fn test_window_slides() {
        let mut detector = BlockDetector::new(&config(4, 1));
        detector.record(&outcome("a.com", StatusClass::BlockedSignal));
        detector.record(&outcome("b.com", StatusClass::BlockedSignal));
        assert!(detector.should_pause());

        for _ in 0..4 {
            detector.record(&outcome("c.com", StatusClass::Success));
        }
        assert!(!detector.should_pause());
        let report = detector.report();
        assert_eq!(report.window_len, 4);
        assert_eq!(report.blocking_signals, 0);
        // Domains that left the window drop out of the report
        assert!(report.affected_domains.is_empty());
    }

    #[test]
    fn test_transient_and_permanent_are_not_signals() {
        let mut detector = BlockDetector::new(&config(10, 1));
        for domain in ["a.com", "b.com", "c.com"] {
            detector.record(&outcome(domain, StatusClass::TransientError));
            detector.record(&outcome(domain, StatusClass::PermanentError));
        }
        assert_eq!(detector.ratio(), 0.0);
        assert!(!detector.should_pause());
    }

    #[test]
    fn test_report_lists_affected_domains() {
        let mut detector = BlockDetector::new(&config(20, 1));
        for i in 0..7 {
            let domain = format!("d{}.com", i);
            detector.record(&outcome(&domain, StatusClass::Forbidden));
        }
        detector.record(&outcome("d0.com", StatusClass::Forbidden));

        let report = detector.report();
        assert_eq!(report.unique_domains, 7);
        assert_eq!(report.affected_domains.len(), 5);
        assert_eq!(report.affected_domains[0].domain, "d0.com");
        assert_eq!(report.affected_domains[0].blocking, 2);
        assert!(report.summary().contains("8/8"));
    }

    #[test]
    fn test_reset_keeps_retry_candidates() {
        let mut detector = BlockDetector::new(&config(20, 1));
        detector.record(&outcome("a.com", StatusClass::Forbidden));
        detector.record(&outcome("b.com", StatusClass::RateLimited));
        detector.record(&outcome("a.com", StatusClass::Forbidden));

        detector.reset();
        assert_eq!(detector.ratio(), 0.0);
        assert!(!detector.should_pause());
        assert_eq!(
            detector.retry_candidates(),
            vec!["https://b.com/", "https://a.com/"]
        );
    }

    #[test]
    fn test_retry_candidates_are_bounded() {
        let mut detector = BlockDetector::new(&config(20, 1));
        for i in 0..80 {
            detector.record(&outcome(&format!("d{}.com", i), StatusClass::Forbidden));
        }
        let candidates = detector.retry_candidates();
        assert_eq!(candidates.len(), RETRY_CANDIDATES);
        assert_eq!(candidates[0], "https://d30.com/");
    }
}
