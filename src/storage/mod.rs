// Persisted key-value surface
//
// Four categories of durable state, each independently clearable:
// the active analysis id, the cached terminal analysis result, the active
// interview session id, and the per-session draft answer. Everything else is
// re-derivable from the server.

mod file_store;

pub use file_store::FileStore;

use parking_lot::Mutex;
use std::collections::HashMap;

pub const ANALYSIS_ID_KEY: &str = "fab_analysis_id";
pub const ANALYSIS_RESULT_KEY: &str = "fab_analysis_result";
pub const SESSION_ID_KEY: &str = "fab_session_id";

pub fn draft_key(session_id: &str) -> String {
    format!("fab_draft_{}", session_id)
}

/// Synchronous keyed string store with a lifetime longer than any in-memory
/// session. Write failures are logged by implementations rather than
/// surfaced; a best-effort store must never block a state transition.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory store for tests and ephemeral contexts.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
