use crate::error::{Result, StoreError};
use crate::types::{IndexStatus, RepoRecord};
use crate::{unix_now, Store};
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::path::Path;

const REPO_COLUMNS: &str = "id, name, root_path, last_indexed_commit, index_status, \
     last_git_analysis_commit, max_import_depth, vocab_clusters, vocab_clusters_commit";

/// Stable repository id derived from the canonical root path
pub fn repo_id_for_path(root: &Path) -> String {
    let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

fn repo_from_row(row: &Row<'_>) -> rusqlite::Result<RepoRecord> {
    let status: String = row.get(4)?;
    let depth: Option<i64> = row.get(6)?;
    Ok(RepoRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        root_path: row.get(2)?,
        last_indexed_commit: row.get(3)?,
        index_status: IndexStatus::parse(&status),
        last_git_analysis_commit: row.get(5)?,
        max_import_depth: depth.map(|d| d.max(0) as u32),
        vocab_clusters: row.get(7)?,
        vocab_clusters_commit: row.get(8)?,
    })
}

impl Store {
    /// Register a repository, or return the existing row for the same root
    pub fn register_repo(&self, root: &Path, name: Option<&str>) -> Result<RepoRecord> {
        let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let id = repo_id_for_path(&canonical);
        let display_name = name.map(str::to_string).unwrap_or_else(|| {
            canonical
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| id.clone())
        });
        let now = unix_now();

        {
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO repos (id, name, root_path, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(root_path) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at",
                params![id, display_name, canonical.to_string_lossy(), now],
            )?;
        }
        log::debug!("Registered repo {} at {}", id, canonical.display());
        self.require_repo(&id)
    }

    pub fn get_repo(&self, repo_id: &str) -> Result<Option<RepoRecord>> {
        let conn = self.lock()?;
        let repo = conn
            .query_row(
                &format!("SELECT {REPO_COLUMNS} FROM repos WHERE id = ?1"),
                params![repo_id],
                repo_from_row,
            )
            .optional()?;
        Ok(repo)
    }

    /// Like [`Store::get_repo`] but a missing repo is an error
    pub fn require_repo(&self, repo_id: &str) -> Result<RepoRecord> {
        self.get_repo(repo_id)?
            .ok_or_else(|| StoreError::RepoNotFound(repo_id.to_string()))
    }

    pub fn list_repos(&self) -> Result<Vec<RepoRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {REPO_COLUMNS} FROM repos ORDER BY name"))?;
        let rows = stmt.query_map([], repo_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a repository and, by cascade, everything derived from it
    pub fn remove_repo(&self, repo_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM repos WHERE id = ?1", params![repo_id])?;
        if removed > 0 {
            log::info!("Removed repo {repo_id}");
        }
        Ok(removed > 0)
    }

    pub fn set_index_status(&self, repo_id: &str, status: IndexStatus) -> Result<()> {
        self.update_repo(
            repo_id,
            "UPDATE repos SET index_status = ?2, updated_at = ?3 WHERE id = ?1",
            params![repo_id, status.as_str(), unix_now()],
        )
    }

    /// Record a completed index run: new HEAD and `ready` in one statement
    pub fn mark_indexed(&self, repo_id: &str, commit: &str) -> Result<()> {
        self.update_repo(
            repo_id,
            "UPDATE repos SET last_indexed_commit = ?2, index_status = 'ready', updated_at = ?3
             WHERE id = ?1",
            params![repo_id, commit, unix_now()],
        )
    }

    pub fn set_git_analysis_commit(&self, repo_id: &str, commit: &str) -> Result<()> {
        self.update_repo(
            repo_id,
            "UPDATE repos SET last_git_analysis_commit = ?2, updated_at = ?3 WHERE id = ?1",
            params![repo_id, commit, unix_now()],
        )
    }

    pub fn set_max_import_depth(&self, repo_id: &str, depth: u32) -> Result<()> {
        self.update_repo(
            repo_id,
            "UPDATE repos SET max_import_depth = ?2, updated_at = ?3 WHERE id = ?1",
            params![repo_id, i64::from(depth), unix_now()],
        )
    }

    pub fn set_vocab_clusters(&self, repo_id: &str, clusters_json: &str, commit: &str) -> Result<()> {
        self.update_repo(
            repo_id,
            "UPDATE repos SET vocab_clusters = ?2, vocab_clusters_commit = ?3, updated_at = ?4
             WHERE id = ?1",
            params![repo_id, clusters_json, commit, unix_now()],
        )
    }

    fn update_repo(&self, repo_id: &str, sql: &str, params: impl rusqlite::Params) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(sql, params)?;
        if changed == 0 {
            return Err(StoreError::RepoNotFound(repo_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn register_is_an_upsert_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();

        let first = store.register_repo(dir.path(), Some("demo")).unwrap();
        let second = store.register_repo(dir.path(), Some("renamed")).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "renamed");
        assert_eq!(second.index_status, IndexStatus::Pending);
        assert_eq!(store.list_repos().unwrap().len(), 1);
    }

    #[test]
    fn mark_indexed_sets_commit_and_ready() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let repo = store.register_repo(dir.path(), None).unwrap();

        store.set_index_status(&repo.id, IndexStatus::Indexing).unwrap();
        store.mark_indexed(&repo.id, "abc123").unwrap();

        let repo = store.require_repo(&repo.id).unwrap();
        assert_eq!(repo.last_indexed_commit.as_deref(), Some("abc123"));
        assert_eq!(repo.index_status, IndexStatus::Ready);
    }

    #[test]
    fn missing_repo_is_typed_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store.require_repo("nope").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.set_index_status("nope", IndexStatus::Ready).is_err());
        assert!(!store.remove_repo("nope").unwrap());
    }

    #[test]
    fn repo_id_is_stable_for_same_root() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(repo_id_for_path(dir.path()), repo_id_for_path(dir.path()));
        assert_eq!(repo_id_for_path(dir.path()).len(), 16);
    }
}
