use crate::error::Result;
use rusqlite::Connection;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS repos (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    root_path TEXT NOT NULL UNIQUE,
    last_indexed_commit TEXT,
    index_status TEXT NOT NULL DEFAULT 'pending',
    last_git_analysis_commit TEXT,
    max_import_depth INTEGER,
    vocab_clusters TEXT,
    vocab_clusters_commit TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id TEXT NOT NULL REFERENCES repos(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    content TEXT NOT NULL,
    language TEXT NOT NULL,
    last_seen INTEGER NOT NULL,
    embedding BLOB,
    UNIQUE(repo_id, path, chunk_index, content_hash)
);
CREATE INDEX IF NOT EXISTS idx_chunks_repo_path ON chunks(repo_id, path);
CREATE INDEX IF NOT EXISTS idx_chunks_pending_embedding
    ON chunks(repo_id) WHERE embedding IS NULL;

CREATE TABLE IF NOT EXISTS file_metadata (
    repo_id TEXT NOT NULL REFERENCES repos(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    language TEXT NOT NULL,
    exports TEXT NOT NULL DEFAULT '[]',
    imports TEXT NOT NULL DEFAULT '[]',
    docstring TEXT NOT NULL DEFAULT '',
    sections TEXT NOT NULL DEFAULT '[]',
    internals TEXT NOT NULL DEFAULT '[]',
    purpose TEXT,
    purpose_hash TEXT,
    content_hash TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (repo_id, path)
);

CREATE TABLE IF NOT EXISTS file_imports (
    repo_id TEXT NOT NULL REFERENCES repos(id) ON DELETE CASCADE,
    source_path TEXT NOT NULL,
    target_path TEXT NOT NULL,
    PRIMARY KEY (repo_id, source_path, target_path)
);
CREATE INDEX IF NOT EXISTS idx_file_imports_target ON file_imports(repo_id, target_path);

CREATE TABLE IF NOT EXISTS file_stats (
    repo_id TEXT NOT NULL REFERENCES repos(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    commit_count INTEGER NOT NULL DEFAULT 0,
    recent_commit_count INTEGER NOT NULL DEFAULT 0,
    last_modified INTEGER,
    PRIMARY KEY (repo_id, path)
);

CREATE TABLE IF NOT EXISTS file_cochanges (
    repo_id TEXT NOT NULL REFERENCES repos(id) ON DELETE CASCADE,
    path_a TEXT NOT NULL,
    path_b TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (repo_id, path_a, path_b),
    CHECK (path_a < path_b)
);
";

/// Configure the connection and create every table idempotently
pub(crate) fn initialize(conn: &Connection, in_memory: bool) -> Result<()> {
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    if !in_memory {
        // journal_mode returns a row, so it cannot go through execute()
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
    }
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
