use pretty_assertions::assert_eq;
use scout_indexer::{IndexEngine, IndexMode, IndexOutcome, IndexerConfig, WatcherConfig};
use scout_store::{IndexStatus, Store};
use scout_vector_store::{Capabilities, StubEmbedder};
use std::collections::HashSet;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(repo: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .expect("git command");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn init_git(repo: &Path) {
    git(repo, &["init", "-q"]);
    git(repo, &["config", "user.email", "test@example.com"]);
    git(repo, &["config", "user.name", "Test"]);
    git(repo, &["config", "commit.gpgsign", "false"]);
}

fn commit_all(repo: &Path, message: &str) -> String {
    git(repo, &["add", "-A"]);
    git(repo, &["commit", "-q", "-m", message]);
    git(repo, &["rev-parse", "HEAD"])
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn engine(capabilities: Capabilities) -> Arc<IndexEngine> {
    let store = Arc::new(Store::open_in_memory().expect("store"));
    Arc::new(
        IndexEngine::new(
            store,
            capabilities,
            IndexerConfig::default(),
            WatcherConfig::default(),
        )
        .expect("engine"),
    )
}

fn seed_project(root: &Path) {
    write(
        root,
        "src/auth/session.ts",
        "/** Session storage */\nexport function createSession(user: string) {\n  return { user };\n}\n",
    );
    write(
        root,
        "src/auth/middleware.ts",
        "import { createSession } from './session';\n\nexport function authMiddleware(req, res, next) {\n  createSession(req.user);\n  next();\n}\n",
    );
    write(
        root,
        "src/auth/login.ts",
        "import { authMiddleware } from './middleware';\n\nexport async function login(user: string) {\n  return authMiddleware;\n}\n",
    );
    write(
        root,
        "src/utils/date.ts",
        "export function formatDate(d: Date) {\n  return d.toISOString();\n}\n",
    );
}

#[tokio::test]
async fn second_run_is_skipped_unless_forced() {
    let temp = TempDir::new().unwrap();
    seed_project(temp.path());
    let engine = engine(Capabilities::none());
    let repo = engine.register(temp.path(), Some("demo")).unwrap();
    assert_eq!(repo.index_status, IndexStatus::Pending);

    let first = engine.run_index(&repo.id, false).await.unwrap();
    let IndexOutcome::Indexed(stats) = &first else {
        panic!("expected an index run, got {first:?}");
    };
    assert_eq!(stats.mode, IndexMode::Full);
    assert_eq!(stats.files_indexed, 4);
    assert_eq!(stats.chunks.inserted, 4);

    let second = engine.run_index(&repo.id, false).await.unwrap();
    assert!(second.is_skipped());
    assert_eq!(second.commit(), first.commit());

    let forced = engine.run_index(&repo.id, true).await.unwrap();
    let IndexOutcome::Indexed(stats) = forced else {
        panic!("forced run must index");
    };
    assert_eq!(stats.chunks.inserted, 0);
    assert_eq!(stats.chunks.unchanged, 4);

    let stored = engine.store().require_repo(&repo.id).unwrap();
    assert_eq!(stored.index_status, IndexStatus::Ready);
    assert_eq!(stored.max_import_depth, Some(2));
    assert_eq!(
        engine.store().list_imports(&repo.id).unwrap(),
        vec![
            ("src/auth/login.ts".to_string(), "src/auth/middleware.ts".to_string()),
            ("src/auth/middleware.ts".to_string(), "src/auth/session.ts".to_string()),
        ]
    );
    let meta = engine
        .store()
        .get_file_metadata(&repo.id, "src/auth/session.ts")
        .unwrap()
        .unwrap();
    assert_eq!(meta.exports, vec!["createSession".to_string()]);
    assert_eq!(meta.docstring, "Session storage");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_for_one_repo_serialize() {
    let temp = TempDir::new().unwrap();
    seed_project(temp.path());
    let engine = engine(Capabilities::none());
    let repo = engine.register(temp.path(), None).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        let id = repo.id.clone();
        tasks.push(tokio::spawn(async move { engine.run_index(&id, true).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let chunks = engine.store().chunks_for_repo(&repo.id).unwrap();
    assert_eq!(chunks.len(), 4);
    let keys: HashSet<(String, usize)> = chunks
        .iter()
        .map(|c| (c.path.clone(), c.chunk_index))
        .collect();
    assert_eq!(keys.len(), chunks.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_waits_for_the_repo_lock_and_runs_do_not_interleave() {
    let temp = TempDir::new().unwrap();
    seed_project(temp.path());
    let engine = engine(Capabilities::none());
    let repo = engine.register(temp.path(), None).unwrap();

    // Hold the repository lock the way an in-progress run does
    let lock = engine.coordinator().repo_lock(&repo.id);
    let held = lock.lock().await;
    assert!(engine.coordinator().is_indexing(&repo.id));

    let mut runs = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        let id = repo.id.clone();
        runs.push(tokio::spawn(async move { engine.run_index(&id, false).await }));
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(runs.iter().all(|run| !run.is_finished()));
    assert_eq!(engine.store().chunk_count(&repo.id).unwrap(), 0);
    assert_eq!(
        engine.store().require_repo(&repo.id).unwrap().index_status,
        IndexStatus::Pending
    );

    drop(held);
    let mut outcomes = Vec::new();
    for run in runs {
        outcomes.push(run.await.unwrap().unwrap());
    }
    // The second run observes the first one's marker
    assert_eq!(outcomes.iter().filter(|o| o.is_skipped()).count(), 1);
    assert_eq!(outcomes[0].commit(), outcomes[1].commit());
    assert_eq!(engine.store().chunk_count(&repo.id).unwrap(), 4);
    assert!(!engine.coordinator().is_indexing(&repo.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn other_repos_index_while_one_is_locked() {
    let busy = TempDir::new().unwrap();
    let free = TempDir::new().unwrap();
    seed_project(busy.path());
    seed_project(free.path());
    let engine = engine(Capabilities::none());
    let busy_repo = engine.register(busy.path(), None).unwrap();
    let free_repo = engine.register(free.path(), None).unwrap();

    let lock = engine.coordinator().repo_lock(&busy_repo.id);
    let held = lock.lock().await;

    let blocked = {
        let engine = Arc::clone(&engine);
        let id = busy_repo.id.clone();
        tokio::spawn(async move { engine.run_index(&id, false).await })
    };
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        engine.run_index(&free_repo.id, false),
    )
    .await
    .expect("unlocked repo must not wait")
    .unwrap();
    assert!(!outcome.is_skipped());
    assert!(!blocked.is_finished());

    drop(held);
    assert!(!blocked.await.unwrap().unwrap().is_skipped());
}

#[tokio::test]
async fn full_scan_drops_files_that_disappeared() {
    let temp = TempDir::new().unwrap();
    seed_project(temp.path());
    let engine = engine(Capabilities::none());
    let repo = engine.register(temp.path(), None).unwrap();
    engine.run_index(&repo.id, false).await.unwrap();

    std::fs::remove_file(temp.path().join("src/utils/date.ts")).unwrap();
    let outcome = engine.run_index(&repo.id, false).await.unwrap();
    let IndexOutcome::Indexed(stats) = outcome else {
        panic!("filesystem revision must change after a delete");
    };
    assert_eq!(stats.files_deleted, 1);
    assert!(engine
        .store()
        .get_file_metadata(&repo.id, "src/utils/date.ts")
        .unwrap()
        .is_none());
    assert_eq!(engine.store().chunk_count(&repo.id).unwrap(), 3);
}

#[tokio::test]
async fn git_repo_diff_scan_and_history() {
    if !git_available() {
        eprintln!("skipping git_repo_diff_scan_and_history: git not available");
        return;
    }
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    init_git(root);
    seed_project(root);
    let first_head = commit_all(root, "initial");

    let engine = engine(Capabilities::none());
    let repo = engine.register(root, None).unwrap();
    let first = engine.run_index(&repo.id, false).await.unwrap();
    assert_eq!(first.commit(), first_head);
    let IndexOutcome::Indexed(stats) = &first else {
        panic!("expected index run");
    };
    assert!(stats.git_analyzed);

    // login and middleware change together twice
    for round in 0..2 {
        write(root, "src/auth/login.ts", &format!("import {{ authMiddleware }} from './middleware';\nexport const round = {round};\n"));
        write(root, "src/auth/middleware.ts", &format!("import {{ createSession }} from './session';\nexport const mw = {round};\n"));
        commit_all(root, &format!("auth round {round}"));
    }
    git(root, &["mv", "src/utils/date.ts", "src/utils/time.ts"]);
    let head = commit_all(root, "rename");

    let second = engine.run_index(&repo.id, false).await.unwrap();
    let IndexOutcome::Indexed(stats) = &second else {
        panic!("expected index run");
    };
    assert_eq!(stats.mode, IndexMode::Diff);
    assert_eq!(second.commit(), head);
    // login, middleware and the rename target; the rename source is deleted
    assert_eq!(stats.files_indexed, 3);
    assert_eq!(stats.files_deleted, 1);

    let paths: HashSet<String> = engine
        .store()
        .chunked_paths(&repo.id)
        .unwrap()
        .into_iter()
        .collect();
    assert!(paths.contains("src/utils/time.ts"));
    assert!(!paths.contains("src/utils/date.ts"));

    let cochanges = engine.store().list_cochanges(&repo.id, 1).unwrap();
    let pair = cochanges
        .iter()
        .find(|c| c.path_a == "src/auth/login.ts" && c.path_b == "src/auth/middleware.ts")
        .expect("login/middleware co-change");
    // initial commit plus two rounds
    assert_eq!(pair.count, 3);

    let stats_rows = engine.store().list_file_stats(&repo.id).unwrap();
    let login = stats_rows
        .iter()
        .find(|s| s.path == "src/auth/login.ts")
        .unwrap();
    assert_eq!(login.commit_count, 3);
    assert_eq!(login.recent_commit_count, 3);

    let stored = engine.store().require_repo(&repo.id).unwrap();
    assert_eq!(stored.last_git_analysis_commit.as_deref(), Some(head.as_str()));
    assert!(engine.run_index(&repo.id, false).await.unwrap().is_skipped());
}

#[tokio::test]
async fn enrichment_embeds_and_builds_vocab_once_per_commit() {
    let temp = TempDir::new().unwrap();
    seed_project(temp.path());
    let engine = engine(Capabilities::none().with_embedder(Arc::new(StubEmbedder::new(32))));
    let repo = engine.register(temp.path(), None).unwrap();
    engine.run_index(&repo.id, false).await.unwrap();

    let report = engine.enrich(&repo.id).await.unwrap();
    assert_eq!(report.backfill.embedded_count, 4);
    assert!(report.vocab_clusters.is_some());
    let stored = engine.store().require_repo(&repo.id).unwrap();
    assert_eq!(stored.vocab_clusters_commit, stored.last_indexed_commit);

    let again = engine.enrich(&repo.id).await.unwrap();
    assert_eq!(again.backfill.embedded_count, 0);
    assert_eq!(again.vocab_clusters, None);
}

#[tokio::test]
async fn unknown_repo_is_not_found() {
    let engine = engine(Capabilities::none());
    let err = engine.run_index("ffffffffffffffff", false).await.unwrap_err();
    assert!(err.is_not_found());
}
