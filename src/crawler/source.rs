//! Input task source
//!
//! Built once at startup from the input list minus the checkpoint. Workers
//! pull from it concurrently; closing it stops admission of new tasks while
//! tasks already handed out run to completion.

use crate::state::UrlTask;
use crate::{CrawlError, Result};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Ordered, de-duplicated queue of remaining input URLs
#[derive(Debug)]
pub struct TaskSource {
    pending: Mutex<VecDeque<String>>,
    closed: AtomicBool,
    total_input: usize,
    duplicates: usize,
    skipped: usize,
}

impl TaskSource {
    /// Builds the source from `urls`, dropping exact duplicates and anything
    /// already present in `completed`
    pub fn new<I, S>(urls: I, completed: &HashSet<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut pending = VecDeque::new();
        let mut total_input = 0;
        let mut duplicates = 0;
        let mut skipped = 0;

        for url in urls {
            let url = url.into();
            total_input += 1;

            if !seen.insert(url.clone()) {
                duplicates += 1;
                continue;
            }
            if completed.contains(&url) {
                skipped += 1;
                continue;
            }
            pending.push_back(url);
        }

        Self {
            pending: Mutex::new(pending),
            closed: AtomicBool::new(false),
            total_input,
            duplicates,
            skipped,
        }
    }

    /// Hands out the next task, or `None` once drained or closed
    pub fn next(&self) -> Option<UrlTask> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.pop_front().map(UrlTask::new)
    }

    /// Stops handing out tasks
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!("Task admission stopped; {} URL(s) left unstarted", self.remaining());
        }
    }

    /// URLs not yet handed out
    pub fn remaining(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn total_input(&self) -> usize {
        self.total_input
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// URLs dropped because the checkpoint already has them
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Reads an input list: one URL per line, blank lines and `#` comments skipped
pub fn parse_urls_from_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|source| CrawlError::Input {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_url_list(&content))
}

/// Parses input list content
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
