//! Common types for the LiveTrack environment abstraction.

use serde::{Deserialize, Serialize};

/// Raw body of one feed response.
///
/// This is a transport-layer wrapper - the bytes are expected to hold a JSON
/// array of agent states, but nothing here interprets them. Parsing belongs
/// to the poller in `livetrack_core`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedBody {
    /// The raw response bytes
    pub payload: Vec<u8>,

    /// Wall-clock time the response was received (Unix milliseconds)
    pub fetched_at_ms: u64,
}

impl FeedBody {
    /// Creates a new body from payload bytes.
    pub fn new(payload: Vec<u8>, fetched_at_ms: u64) -> Self {
        Self {
            payload,
            fetched_at_ms,
        }
    }

    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

impl From<&str> for FeedBody {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec(), 0)
    }
}
