use pretty_assertions::assert_eq;
use scout_code_chunker::{Chunker, ChunkerConfig};
use scout_store::{FileMetadataRecord, GitHistoryDelta, Store};

#[test]
fn removing_repo_cascades_to_derived_rows() {
    let db_dir = tempfile::tempdir().unwrap();
    let repo_dir = tempfile::tempdir().unwrap();
    let store = Store::open(db_dir.path().join("scout.db")).unwrap();

    let repo = store.register_repo(repo_dir.path(), Some("demo")).unwrap();
    let other = store.register_repo(db_dir.path(), Some("other")).unwrap();

    let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
    let chunks = chunker.chunk("export function login() {}\n");
    for id in [&repo.id, &other.id] {
        store.apply_file_chunks(id, "auth/login.ts", "typescript", &chunks).unwrap();
        store
            .upsert_file_metadata(
                id,
                &FileMetadataRecord {
                    path: "auth/login.ts".to_string(),
                    language: "typescript".to_string(),
                    exports: vec!["login".to_string()],
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .replace_imports(id, &[("auth/login.ts".to_string(), "auth/session.ts".to_string())])
            .unwrap();
        let mut delta = GitHistoryDelta {
            head: "c1".to_string(),
            ..Default::default()
        };
        delta.file_commits.insert("auth/login.ts".to_string(), (1, 10));
        delta.cochanges.insert(
            ("auth/login.ts".to_string(), "auth/session.ts".to_string()),
            1,
        );
        store.apply_git_history(id, &delta).unwrap();
    }

    assert!(store.remove_repo(&repo.id).unwrap());

    assert!(store.get_repo(&repo.id).unwrap().is_none());
    assert_eq!(store.chunk_count(&repo.id).unwrap(), 0);
    assert!(store.list_file_metadata(&repo.id).unwrap().is_empty());
    assert!(store.list_imports(&repo.id).unwrap().is_empty());
    assert!(store.list_file_stats(&repo.id).unwrap().is_empty());
    assert!(store.list_cochanges(&repo.id, 0).unwrap().is_empty());

    // The other repository is untouched.
    assert_eq!(store.chunk_count(&other.id).unwrap(), 1);
    assert_eq!(store.list_imports(&other.id).unwrap().len(), 1);
    assert_eq!(store.list_repos().unwrap().len(), 1);
}

#[test]
fn reopening_database_keeps_rows() {
    let db_dir = tempfile::tempdir().unwrap();
    let repo_dir = tempfile::tempdir().unwrap();
    let path = db_dir.path().join("scout.db");

    let id = {
        let store = Store::open(&path).unwrap();
        let repo = store.register_repo(repo_dir.path(), None).unwrap();
        store.mark_indexed(&repo.id, "deadbeef").unwrap();
        repo.id
    };

    let store = Store::open(&path).unwrap();
    let repo = store.require_repo(&id).unwrap();
    assert_eq!(repo.last_indexed_commit.as_deref(), Some("deadbeef"));
}
