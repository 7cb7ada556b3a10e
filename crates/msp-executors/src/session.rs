//! Per-host session cache (spec §4.1, §5): "A session cache keyed by
//! hostname holds one connection; age cap 300 s, invalidated on
//! connection error. Re-use across checks within a cycle is mandatory to
//! avoid NTLM auth storms." Single-writer per host via the map lock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const SESSION_MAX_AGE: Duration = Duration::from_secs(300);

struct Entry<S> {
    created_at: Instant,
    session: S,
}

pub struct SessionCache<S> {
    entries: Mutex<HashMap<String, Entry<S>>>,
    max_age: Duration,
}

impl<S: Clone> SessionCache<S> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_age: SESSION_MAX_AGE,
        }
    }

    /// Returns a cached session for `host` if present and not yet aged
    /// out, otherwise `None` (caller must connect and `insert`).
    pub fn get(&self, host: &str) -> Option<S> {
        let mut entries = self.entries.lock().expect("session cache poisoned");
        match entries.get(host) {
            Some(entry) if entry.created_at.elapsed() < self.max_age => Some(entry.session.clone()),
            Some(_) => {
                entries.remove(host);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, host: &str, session: S) {
        let mut entries = self.entries.lock().expect("session cache poisoned");
        entries.insert(
            host.to_string(),
            Entry {
                created_at: Instant::now(),
                session,
            },
        );
    }

    /// Drops the cached session for `host`; called on any connection
    /// error so the next attempt reconnects from scratch.
    pub fn invalidate(&self, host: &str) {
        let mut entries = self.entries.lock().expect("session cache poisoned");
        entries.remove(host);
    }
}

impl<S: Clone> Default for SessionCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_and_invalidates() {
        let cache: SessionCache<u32> = SessionCache::new();
        assert!(cache.get("h1").is_none());
        cache.insert("h1", 42);
        assert_eq!(cache.get("h1"), Some(42));
        cache.invalidate("h1");
        assert!(cache.get("h1").is_none());
    }
}
