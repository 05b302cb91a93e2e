//! Simulated feed endpoint with fault injection.

use async_trait::async_trait;
use livetrack_env::{EnvError, FeedBody, FeedController, FeedSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Body served while the malformed fault is active.
const MALFORMED_BODY: &str = "<html><body>502 Bad Gateway</body></html>";

/// Injected faults, applied in order: outage, status, malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Faults {
    outage: bool,
    status: Option<u16>,
    malformed: bool,
}

/// Simulated feed. The scenario publishes a body; the poller fetches it.
pub struct SimFeed {
    /// Most recently published snapshot body
    body: Mutex<String>,

    faults: Mutex<Faults>,

    fetches: AtomicU64,
    failures: AtomicU64,
}

impl SimFeed {
    /// Creates a feed serving an empty snapshot.
    pub fn new() -> Self {
        Self {
            body: Mutex::new("[]".to_string()),
            faults: Mutex::new(Faults::default()),
            fetches: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Replaces the body served by subsequent fetches.
    pub fn publish(&self, body: String) {
        *self.body.lock().unwrap() = body;
    }

    /// Total fetch attempts, failed ones included.
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Fetches answered with an injected transport or status error.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// True while any fault is injected.
    pub fn is_degraded(&self) -> bool {
        *self.faults.lock().unwrap() != Faults::default()
    }
}

impl Default for SimFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedSource for SimFeed {
    async fn fetch(&self) -> Result<FeedBody, EnvError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let faults = self.faults.lock().unwrap().clone();
        if faults.outage {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(EnvError::transport("connection refused"));
        }
        if let Some(status) = faults.status {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(EnvError::HttpStatus(status));
        }
        if faults.malformed {
            return Ok(FeedBody::from(MALFORMED_BODY));
        }

        let body = self.body.lock().unwrap();
        Ok(FeedBody::from(body.as_str()))
    }

    fn describe(&self) -> String {
        "simulated feed".to_string()
    }
}

impl FeedController for SimFeed {
    fn set_outage(&self, down: bool) {
        self.faults.lock().unwrap().outage = down;
    }

    fn set_status_override(&self, status: Option<u16>) {
        self.faults.lock().unwrap().status = status;
    }

    fn set_malformed(&self, malformed: bool) {
        self.faults.lock().unwrap().malformed = malformed;
    }

    fn heal_all(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_published_body() {
        let feed = SimFeed::new();
        assert_eq!(feed.fetch().await.unwrap().payload, b"[]");

        feed.publish(r#"[{"id":"a"}]"#.to_string());
        assert_eq!(feed.fetch().await.unwrap().payload, br#"[{"id":"a"}]"#);
        assert_eq!(feed.fetches(), 2);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let feed = SimFeed::new();

        feed.set_outage(true);
        assert!(matches!(feed.fetch().await, Err(EnvError::TransportError(_))));

        feed.set_outage(false);
        feed.set_status_override(Some(503));
        assert!(matches!(feed.fetch().await, Err(EnvError::HttpStatus(503))));

        feed.set_status_override(None);
        feed.set_malformed(true);
        assert_eq!(feed.fetch().await.unwrap().payload, MALFORMED_BODY.as_bytes());
        assert!(feed.is_degraded());

        feed.heal_all();
        assert!(!feed.is_degraded());
        assert_eq!(feed.fetch().await.unwrap().payload, b"[]");
        assert_eq!(feed.failures(), 2);
    }
}
