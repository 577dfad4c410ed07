use crate::config::WatcherConfig;
use crate::coordinator::Coordinator;
use crate::error::{IndexerError, Result};
use crate::scanner::{has_ignored_component, is_binary_path, is_lockfile, relative_path};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use scout_code_chunker::{Chunker, Language};
use scout_store::{ChunkDiff, Store};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};

static NEXT_WATCHER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    Started,
    AlreadyWatching,
}

/// What the watcher did for one settled path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Rechunked(ChunkDiff),
    Removed { chunks: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchUpdate {
    pub path: String,
    pub change: FileChange,
}

/// A running watcher task
pub struct WatchHandle {
    id: u64,
    task: JoinHandle<()>,
    updates: broadcast::Sender<WatchUpdate>,
}

impl WatchHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchUpdate> {
        self.updates.subscribe()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

/// Everything the watch loop needs besides its channels
pub(crate) struct WatchContext {
    pub repo_id: String,
    pub root: PathBuf,
    pub store: Arc<Store>,
    pub chunker: Chunker,
    pub max_file_bytes: u64,
    pub config: WatcherConfig,
    pub coordinator: Arc<Coordinator>,
}

/// Start watching `ctx.root`; the returned handle must be registered with the coordinator
pub(crate) fn start_watcher(ctx: WatchContext) -> Result<WatchHandle> {
    let (event_tx, event_rx) = mpsc::channel(1024);
    let (updates, _) = broadcast::channel(256);
    let watcher = create_fs_watcher(&ctx.root, event_tx)?;
    let id = NEXT_WATCHER_ID.fetch_add(1, Ordering::Relaxed);

    log::info!("Watching {} for repo {}", ctx.root.display(), ctx.repo_id);
    let task = tokio::spawn(run_watch_loop(ctx, id, watcher, event_rx, updates.clone()));
    Ok(WatchHandle { id, task, updates })
}

fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default(),
    )
    .map_err(|e| IndexerError::Watcher(format!("watcher init failed: {e}")))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| IndexerError::Watcher(format!("failed to watch {}: {e}", root.display())))?;
    Ok(watcher)
}

async fn run_watch_loop<W: Send + 'static>(
    ctx: WatchContext,
    id: u64,
    // Dropping the watcher ends event delivery, so the loop owns it
    _watcher: W,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    updates: broadcast::Sender<WatchUpdate>,
) {
    let ctx = Arc::new(ctx);
    let debounce = ctx.config.debounce();
    let mut pending: HashMap<String, Instant> = HashMap::new();
    // Paths being re-chunked; a path never has two handlers at once
    let mut in_flight: HashSet<String> = HashSet::new();
    let mut handlers: JoinSet<(String, Result<Option<FileChange>>)> = JoinSet::new();

    loop {
        let next_deadline = pending
            .iter()
            .filter(|(path, _)| !in_flight.contains(*path))
            .map(|(_, deadline)| *deadline)
            .min();

        tokio::select! {
            event = event_rx.recv() => match event {
                Some(Ok(event)) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        continue;
                    }
                    for path in &event.paths {
                        if let Some(rel) = watched_relative_path(&ctx.root, path) {
                            pending.insert(rel, Instant::now() + debounce);
                        }
                    }
                }
                Some(Err(err)) => {
                    log::error!("Watcher for repo {} failed: {err}; stopping", ctx.repo_id);
                    break;
                }
                None => {
                    log::warn!("Watcher channel for repo {} closed; stopping", ctx.repo_id);
                    break;
                }
            },
            () = async {
                if let Some(deadline) = next_deadline {
                    time::sleep_until(deadline).await;
                }
            }, if next_deadline.is_some() => {
                let now = Instant::now();
                let due: Vec<String> = pending
                    .iter()
                    .filter(|(path, deadline)| **deadline <= now && !in_flight.contains(*path))
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in due {
                    pending.remove(&path);
                    in_flight.insert(path.clone());
                    let ctx = Arc::clone(&ctx);
                    handlers.spawn(async move {
                        let change = process_path(&ctx, &path).await;
                        (path, change)
                    });
                }
            },
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => match joined {
                Ok((path, change)) => {
                    in_flight.remove(&path);
                    match change {
                        Ok(Some(change)) => {
                            let _ = updates.send(WatchUpdate { path, change });
                        }
                        Ok(None) => {}
                        Err(err) => log::warn!("Watcher could not update {path}: {err}"),
                    }
                }
                Err(err) => {
                    log::error!("Watcher handler for repo {} panicked: {err}", ctx.repo_id);
                    in_flight.clear();
                }
            },
        }
    }

    handlers.abort_all();
    ctx.coordinator.release_watcher(&ctx.repo_id, id);
}

/// Root-relative path for events worth handling
fn watched_relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    if has_ignored_component(rel) || is_lockfile(path) || is_binary_path(path) {
        return None;
    }
    relative_path(root, path)
}

/// Re-chunk a settled path, or drop its chunks when it no longer exists
pub(crate) async fn process_path(ctx: &WatchContext, rel: &str) -> Result<Option<FileChange>> {
    let abs = ctx.root.join(rel);
    let meta = match tokio::fs::metadata(&abs).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let chunks = ctx.store.delete_file_chunks(&ctx.repo_id, rel)?;
            log::debug!("Watcher removed {chunks} chunks for deleted {rel}");
            return Ok(Some(FileChange::Removed { chunks }));
        }
        Err(e) => return Err(e.into()),
    };
    if !meta.is_file() {
        return Ok(None);
    }
    if meta.len() > ctx.max_file_bytes {
        log::debug!("Watcher skipping oversized {rel}");
        return Ok(None);
    }

    let content = match tokio::fs::read_to_string(&abs).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let language = Language::from_path(rel);
    let chunks = ctx.chunker.chunk(&content);
    let diff = ctx
        .store
        .apply_file_chunks(&ctx.repo_id, rel, language.as_str(), &chunks)?;
    log::debug!(
        "Watcher re-chunked {rel}: +{} ={} -{}",
        diff.inserted,
        diff.unchanged,
        diff.deleted
    );
    Ok(Some(FileChange::Rechunked(diff)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_dotfiles_dependencies_and_lockfiles() {
        let root = Path::new("/repo");
        assert_eq!(
            watched_relative_path(root, Path::new("/repo/src/auth.ts")),
            Some("src/auth.ts".to_string())
        );
        assert_eq!(watched_relative_path(root, Path::new("/repo/.git/index")), None);
        assert_eq!(watched_relative_path(root, Path::new("/repo/.env")), None);
        assert_eq!(
            watched_relative_path(root, Path::new("/repo/node_modules/x/index.js")),
            None
        );
        assert_eq!(watched_relative_path(root, Path::new("/repo/target/debug/app")), None);
        assert_eq!(watched_relative_path(root, Path::new("/repo/package-lock.json")), None);
        assert_eq!(watched_relative_path(Path::new("/other"), Path::new("/repo/a.ts")), None);
    }

    #[tokio::test]
    async fn process_path_rechunks_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let repo = store.register_repo(dir.path(), None).unwrap();
        let ctx = WatchContext {
            repo_id: repo.id.clone(),
            root: dir.path().to_path_buf(),
            store: store.clone(),
            chunker: Chunker::new(Default::default()).unwrap(),
            max_file_bytes: 1024 * 1024,
            config: WatcherConfig::default(),
            coordinator: Arc::new(Coordinator::new()),
        };

        std::fs::write(dir.path().join("a.ts"), "export const a = 1;\n").unwrap();
        let change = process_path(&ctx, "a.ts").await.unwrap();
        assert_eq!(
            change,
            Some(FileChange::Rechunked(ChunkDiff {
                inserted: 1,
                unchanged: 0,
                deleted: 0
            }))
        );

        let again = process_path(&ctx, "a.ts").await.unwrap();
        assert_eq!(
            again,
            Some(FileChange::Rechunked(ChunkDiff {
                inserted: 0,
                unchanged: 1,
                deleted: 0
            }))
        );

        std::fs::remove_file(dir.path().join("a.ts")).unwrap();
        let removed = process_path(&ctx, "a.ts").await.unwrap();
        assert_eq!(removed, Some(FileChange::Removed { chunks: 1 }));
        assert_eq!(store.chunk_count(&repo.id).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn paths_settling_together_are_all_rechunked() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let repo = store.register_repo(dir.path(), None).unwrap();
        let mut paths = Vec::new();
        for i in 0..8 {
            let path = dir.path().join(format!("f{i}.ts"));
            std::fs::write(&path, format!("export const v{i} = {i};\n")).unwrap();
            paths.push(path);
        }
        let ctx = WatchContext {
            repo_id: repo.id.clone(),
            root: dir.path().to_path_buf(),
            store: store.clone(),
            chunker: Chunker::new(Default::default()).unwrap(),
            max_file_bytes: 1024 * 1024,
            config: WatcherConfig { debounce_ms: 20 },
            coordinator: Arc::new(Coordinator::new()),
        };

        let (event_tx, event_rx) = mpsc::channel(16);
        let (updates, mut received) = broadcast::channel(64);
        let task = tokio::spawn(run_watch_loop(ctx, 1, (), event_rx, updates));
        let mut event = Event::new(EventKind::Modify(notify::event::ModifyKind::Any));
        event.paths = paths;
        event_tx.send(Ok(event)).await.unwrap();

        let mut seen = HashSet::new();
        while seen.len() < 8 {
            let update = tokio::time::timeout(std::time::Duration::from_secs(5), received.recv())
                .await
                .expect("update before timeout")
                .unwrap();
            assert!(matches!(update.change, FileChange::Rechunked(_)));
            seen.insert(update.path);
        }
        assert_eq!(store.chunk_count(&repo.id).unwrap(), 8);

        drop(event_tx);
        task.await.unwrap();
    }
}
