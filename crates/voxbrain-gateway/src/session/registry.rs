//! Live call registry: call_id -> session cancellation handle.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct CallRegistry {
    calls: DashMap<String, CancellationToken>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, call_id: &str, token: CancellationToken) {
        self.calls.insert(call_id.to_owned(), token);
    }

    pub fn remove(&self, call_id: &str) {
        self.calls.remove(call_id);
    }

    pub fn active_calls(&self) -> usize {
        self.calls.len()
    }

    /// Cancel every live session (process shutdown).
    pub fn shutdown_all(&self) {
        for entry in self.calls.iter() {
            entry.value().cancel();
        }
    }
}
