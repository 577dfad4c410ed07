use crate::watcher::WatchHandle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Mutex as TokioMutex;

/// Owns the per-repository index locks and the live file watchers.
///
/// Index runs for one repository serialize on its lock; different
/// repositories never contend.
#[derive(Default)]
pub struct Coordinator {
    locks: Mutex<HashMap<String, Arc<TokioMutex<()>>>>,
    watchers: Mutex<HashMap<String, WatchHandle>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock guarding index runs of `repo_id`
    pub fn repo_lock(&self, repo_id: &str) -> Arc<TokioMutex<()>> {
        guard(&self.locks)
            .entry(repo_id.to_string())
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone()
    }

    /// Whether an index run currently holds the repository lock
    pub fn is_indexing(&self, repo_id: &str) -> bool {
        guard(&self.locks)
            .get(repo_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    pub fn is_watching(&self, repo_id: &str) -> bool {
        guard(&self.watchers).contains_key(repo_id)
    }

    /// Register a watcher built by `start` unless one already exists.
    ///
    /// `start` runs under the registry lock, so two concurrent callers can
    /// never both start a watcher for the same repository. Returns `false`
    /// when a watcher was already registered.
    pub fn insert_watcher_with<F, E>(&self, repo_id: &str, start: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<WatchHandle, E>,
    {
        let mut watchers = guard(&self.watchers);
        if watchers.contains_key(repo_id) {
            return Ok(false);
        }
        let handle = start()?;
        watchers.insert(repo_id.to_string(), handle);
        Ok(true)
    }

    /// Stop and forget the watcher of `repo_id`
    pub fn stop_watcher(&self, repo_id: &str) -> bool {
        let handle = guard(&self.watchers).remove(repo_id);
        match handle {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    /// Forget the watcher of `repo_id` only if it is still generation `id`
    pub(crate) fn release_watcher(&self, repo_id: &str, id: u64) {
        let mut watchers = guard(&self.watchers);
        if watchers.get(repo_id).is_some_and(|h| h.id() == id) {
            watchers.remove(repo_id);
        }
    }

    pub fn subscribe_watcher(
        &self,
        repo_id: &str,
    ) -> Option<tokio::sync::broadcast::Receiver<crate::watcher::WatchUpdate>> {
        guard(&self.watchers).get(repo_id).map(WatchHandle::subscribe)
    }

    pub fn watched_repos(&self) -> Vec<String> {
        let mut ids: Vec<String> = guard(&self.watchers).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop every watcher
    pub fn shutdown(&self) {
        let drained: Vec<WatchHandle> = guard(&self.watchers).drain().map(|(_, h)| h).collect();
        for handle in drained {
            handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_repo_shares_a_lock_other_repos_do_not() {
        let coordinator = Coordinator::new();
        let a1 = coordinator.repo_lock("a");
        let a2 = coordinator.repo_lock("a");
        let b = coordinator.repo_lock("b");
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));

        let held = a1.lock().await;
        assert!(coordinator.is_indexing("a"));
        assert!(a2.try_lock().is_err());
        assert!(b.try_lock().is_ok());
        drop(held);
        assert!(!coordinator.is_indexing("a"));
    }
}
