use crate::config::CacheConfig;
use scout_protocol::ContextResponse;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Identity of a cached context response.
///
/// The indexed commit is part of the key, so a new index revision never
/// reuses an older pack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub repo_id: String,
    pub commit: String,
    pub embeddings: bool,
    pub goal: String,
}

struct Entry {
    inserted: Instant,
    response: ContextResponse,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, Entry>,
    /// Keys, oldest insertion first
    order: VecDeque<CacheKey>,
}

impl Inner {
    fn forget(&mut self, key: &CacheKey) {
        self.entries.remove(key);
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }
}

/// In-memory TTL cache of context responses with oldest-inserted eviction
pub struct ResponseCache {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<Inner>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            ttl: config.ttl(),
            capacity: config.capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<ContextResponse> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: CacheKey, response: ContextResponse) {
        self.insert_at(key, response, Instant::now());
    }

    fn get_at(&self, key: &CacheKey, now: Instant) -> Option<ContextResponse> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(key) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.inserted) > self.ttl,
        };
        if expired {
            inner.forget(key);
            return None;
        }
        inner.entries.get(key).map(|entry| entry.response.clone())
    }

    fn insert_at(&self, key: CacheKey, response: ContextResponse, now: Instant) {
        let mut inner = self.lock();
        // Re-inserting refreshes the entry and its eviction position
        inner.forget(&key);
        while inner.order.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(
            key,
            Entry {
                inserted: now,
                response,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}
