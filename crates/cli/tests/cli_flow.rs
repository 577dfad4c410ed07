use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn setup_repo() -> TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(
        root,
        "src/auth/middleware.ts",
        "/** Rejects requests without a session */\nexport function authMiddleware(req, res, next) {\n  next();\n}\n",
    );
    write(
        root,
        "src/auth/login.ts",
        "export async function login(user: string, password: string) {\n  return verifyPassword(user, password);\n}\n",
    );
    write(
        root,
        "src/utils/date.ts",
        "export function formatDate(d: Date) {\n  return d.toISOString();\n}\n",
    );
    temp
}

#[allow(deprecated)]
fn scout(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("scout").expect("binary");
    cmd.arg("--quiet").arg("--db").arg(db);
    cmd
}

fn run_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn index_then_skip_until_forced() {
    let repo = setup_repo();
    let state = tempdir().unwrap();
    let db = state.path().join("index.db");

    let first = run_json(scout(&db).arg("index").arg(repo.path()));
    assert_eq!(first["outcome"]["status"], "indexed");
    assert_eq!(first["outcome"]["files_indexed"], 3);
    assert_eq!(first["repo"]["index_status"], "ready");

    let second = run_json(scout(&db).arg("index").arg(repo.path()));
    assert_eq!(second["outcome"]["status"], "skipped");
    assert_eq!(second["repo"]["id"], first["repo"]["id"]);

    let forced = run_json(scout(&db).arg("index").arg(repo.path()).arg("--force"));
    assert_eq!(forced["outcome"]["status"], "indexed");
}

#[test]
fn default_database_lives_inside_the_project_and_is_not_indexed() {
    let repo = setup_repo();
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("scout").expect("binary");
    let body = run_json(cmd.arg("--quiet").arg("index").arg(repo.path()));
    assert_eq!(body["outcome"]["files_indexed"], 3);
    assert!(repo.path().join(".scout/index.db").exists());
}

#[test]
fn context_prints_a_pack_for_the_goal() {
    let repo = setup_repo();
    let state = tempdir().unwrap();
    let db = state.path().join("index.db");

    scout(&db)
        .arg("context")
        .arg("add auth middleware")
        .arg("--path")
        .arg(repo.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Goal: add auth middleware"))
        .stdout(predicate::str::contains("src/auth/middleware.ts"));

    let body = run_json(
        scout(&db)
            .arg("context")
            .arg("add auth middleware")
            .arg("--path")
            .arg(repo.path())
            .arg("--json"),
    );
    assert_eq!(body["stats"]["cached"], false);
    assert_eq!(body["stats"]["index_fresh"], true);
    assert!(body["stats"]["files_in_context"].as_u64().unwrap() >= 2);
}

#[test]
fn semantic_search_without_embeddings_reports_grep() {
    let repo = setup_repo();
    let state = tempdir().unwrap();
    let db = state.path().join("index.db");

    let body = run_json(
        scout(&db)
            .arg("search")
            .arg("formatDate")
            .arg("--path")
            .arg(repo.path())
            .arg("--mode")
            .arg("semantic")
            .arg("--json"),
    );
    assert_eq!(body["search_mode_used"], "grep");
    let results = body["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["path"], "src/utils/date.ts");
}

#[test]
fn stub_embeddings_enable_semantic_search() {
    let repo = setup_repo();
    let state = tempdir().unwrap();
    let db = state.path().join("index.db");

    let body = run_json(
        scout(&db)
            .arg("--embed-mode")
            .arg("stub")
            .arg("search")
            .arg("formatDate toISOString")
            .arg("--path")
            .arg(repo.path())
            .arg("--mode")
            .arg("hybrid")
            .arg("--limit")
            .arg("2")
            .arg("--json"),
    );
    assert_eq!(body["search_mode_used"], "hybrid");
    let results = body["results"].as_array().unwrap();
    assert!(results.len() <= 2);
    assert_eq!(results[0]["path"], "src/utils/date.ts");
}

#[test]
fn blank_search_query_fails() {
    let repo = setup_repo();
    let state = tempdir().unwrap();
    let db = state.path().join("index.db");

    scout(&db)
        .arg("search")
        .arg("   ")
        .arg("--path")
        .arg(repo.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Search failed"));
}

#[test]
fn eval_reports_hits_and_telemetry_is_written() {
    let repo = setup_repo();
    let state = tempdir().unwrap();
    let db = state.path().join("index.db");
    let telemetry = state.path().join("events.jsonl");
    let dataset = state.path().join("dataset.json");
    fs::write(
        &dataset,
        r#"{
  "schema_version": 1,
  "name": "auth",
  "cases": [
    { "id": "auth", "query": "add auth middleware", "expected_paths": ["src/auth/middleware.ts"] }
  ]
}"#,
    )
    .unwrap();

    let report = run_json(
        scout(&db)
            .arg("--telemetry")
            .arg(&telemetry)
            .arg("eval")
            .arg(&dataset)
            .arg("--path")
            .arg(repo.path())
            .arg("-k")
            .arg("5"),
    );
    assert_eq!(report["dataset"], "auth");
    assert_eq!(report["k"], 5);
    assert_eq!(report["summary"]["cases"], 1);
    assert_eq!(report["summary"]["hit_at_k"], 1.0);

    scout(&db)
        .arg("--telemetry")
        .arg(&telemetry)
        .arg("context")
        .arg("add auth middleware")
        .arg("--path")
        .arg(repo.path())
        .assert()
        .success();
    let events = fs::read_to_string(&telemetry).unwrap();
    let lines: Vec<Value> = events
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["operation"], "context");
}

#[test]
fn invalid_eval_dataset_is_rejected() {
    let repo = setup_repo();
    let state = tempdir().unwrap();
    let db = state.path().join("index.db");
    let dataset = state.path().join("dataset.json");
    fs::write(&dataset, r#"{"schema_version": 2, "cases": []}"#).unwrap();

    scout(&db)
        .arg("eval")
        .arg(&dataset)
        .arg("--path")
        .arg(repo.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("schema_version"));
}

#[test]
fn repos_list_and_remove() {
    let repo = setup_repo();
    let state = tempdir().unwrap();
    let db = state.path().join("index.db");

    let indexed = run_json(scout(&db).arg("index").arg(repo.path()).arg("--name").arg("demo"));
    let id = indexed["repo"]["id"].as_str().unwrap().to_string();

    let listed = run_json(scout(&db).arg("repos").arg("list"));
    let repos = listed.as_array().unwrap();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0]["name"], "demo");

    let removed = run_json(scout(&db).arg("repos").arg("remove").arg(&id));
    assert_eq!(removed["removed"], true);
    let listed = run_json(scout(&db).arg("repos").arg("list"));
    assert!(listed.as_array().unwrap().is_empty());
}
