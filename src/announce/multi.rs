//! Bounded buffer for multi-line announces.
//!
//! Some trackers spread one announce over several lines. Partial
//! bindings accumulate here, keyed by the definition's join key, until
//! the terminal line arrives. The buffer is an LRU with a TTL so
//! announces whose terminal line never arrives cannot leak.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Default entry capacity.
pub const DEFAULT_CAPACITY: usize = 128;

/// Default time a partial announce may wait for its remaining lines.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// A partially accumulated announce.
struct Pending {
    vars: HashMap<String, String>,
    created: Instant,
}

/// LRU + TTL buffer of partial announces.
pub struct MultiLineBuffer {
    entries: LruCache<String, Pending>,
    ttl: Duration,
}

impl MultiLineBuffer {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Start accumulating a new announce, replacing any stale entry.
    pub fn start(&mut self, key: String, vars: HashMap<String, String>) {
        self.purge_expired();
        self.entries.put(
            key,
            Pending {
                vars,
                created: Instant::now(),
            },
        );
    }

    /// Merge additional bindings into an in-flight announce.
    ///
    /// Returns false when no entry exists for the key (an orphan line).
    pub fn merge(&mut self, key: &str, vars: HashMap<String, String>) -> bool {
        self.purge_expired();
        match self.entries.get_mut(key) {
            Some(pending) => {
                pending.vars.extend(vars);
                true
            }
            None => false,
        }
    }

    /// Remove and return a completed announce's bindings.
    pub fn take(&mut self, key: &str) -> Option<HashMap<String, String>> {
        self.entries.pop(key).map(|p| p.vars)
    }

    /// Number of in-flight announces.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries older than the TTL.
    fn purge_expired(&mut self) {
        while let Some((_, pending)) = self.entries.peek_lru() {
            if pending.created.elapsed() < self.ttl {
                break;
            }
            self.entries.pop_lru();
        }
    }
}

impl Default for MultiLineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}
