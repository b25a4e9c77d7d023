//! Per-domain concurrency limiting
//!
//! Each domain gets its own semaphore, created on first use and dropped once
//! no attempt holds or awaits it. Permits are scoped to a single network
//! attempt; backoff sleeps happen without one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds in-flight attempts per domain
#[derive(Debug)]
pub struct DomainLimiter {
    max_per_domain: usize,
    permit_timeout: Duration,
    domains: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

/// Held for the duration of one network attempt
#[derive(Debug)]
pub struct DomainPermit {
    domain: String,
    semaphore: Arc<Semaphore>,
    domains: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl DomainLimiter {
    pub fn new(max_per_domain: usize, permit_timeout: Duration) -> Self {
        Self {
            max_per_domain: max_per_domain.max(1),
            permit_timeout,
            domains: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Waits for a permit on `domain`
    ///
    /// Each individual wait is bounded by the permit timeout; a timeout is
    /// logged and the wait resumes, so a slow domain never wedges a worker
    /// silently.
    ///
    /// # Arguments
    ///
    /// * `domain` - Lowercased host the attempt targets
    ///
    /// # Returns
    ///
    /// * `DomainPermit` - Released, and the domain's state dropped when idle,
    ///   as soon as the permit goes out of scope
    pub async fn acquire(&self, domain: &str) -> DomainPermit {
        let semaphore = self.semaphore_for(domain);

        loop {
            // Semaphores are never closed, so only the timeout ends a wait early
            let acquired =
                tokio::time::timeout(self.permit_timeout, semaphore.clone().acquire_owned()).await;
            if let Ok(Ok(permit)) = acquired {
                return DomainPermit {
                    domain: domain.to_string(),
                    semaphore,
                    domains: self.domains.clone(),
                    permit: Some(permit),
                };
            }
            tracing::warn!(
                "Waited {:?} for a permit on {}; still waiting",
                self.permit_timeout,
                domain
            );
        }
    }

    fn semaphore_for(&self, domain: &str) -> Arc<Semaphore> {
        let mut domains = match self.domains.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_domain)))
            .clone()
    }
}

impl Drop for DomainPermit {
    fn drop(&mut self) {
        // Release first so the idle check sees the returned permit
        drop(self.permit.take());

        let mut domains = match self.domains.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Map entry plus our own handle means nobody else holds or awaits it
        if let Some(existing) = domains.get(&self.domain) {
            if Arc::ptr_eq(existing, &self.semaphore) && Arc::strong_count(&self.semaphore) == 2 {
                domains.remove(&self.domain);
            }
        }
    }
}
