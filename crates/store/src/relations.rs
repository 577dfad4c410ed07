use crate::error::Result;
use crate::types::{ordered_pair, CochangeRecord, FileStatRecord, GitHistoryDelta};
use crate::{unix_now, Store};
use rusqlite::params;
use std::collections::BTreeSet;

impl Store {
    /// Rebuild the import edge set of a repository wholesale
    pub fn replace_imports(&self, repo_id: &str, edges: &[(String, String)]) -> Result<usize> {
        let unique: BTreeSet<(&str, &str)> = edges
            .iter()
            .filter(|(source, target)| source != target)
            .map(|(s, t)| (s.as_str(), t.as_str()))
            .collect();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM file_imports WHERE repo_id = ?1", params![repo_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO file_imports (repo_id, source_path, target_path)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (source, target) in &unique {
                stmt.execute(params![repo_id, source, target])?;
            }
        }
        tx.commit()?;
        Ok(unique.len())
    }

    /// Directed `(source, target)` import edges
    pub fn list_imports(&self, repo_id: &str) -> Result<Vec<(String, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source_path, target_path FROM file_imports WHERE repo_id = ?1
             ORDER BY source_path, target_path",
        )?;
        let rows = stmt.query_map(params![repo_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Apply a git walk: accumulate commit counts and co-changes, replace the
    /// recent-window counts and advance the analysis marker, all in one transaction.
    ///
    /// A `replace` delta resets the accumulated counts first.
    pub fn apply_git_history(&self, repo_id: &str, delta: &GitHistoryDelta) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            if delta.replace {
                tx.execute(
                    "UPDATE file_stats SET commit_count = 0 WHERE repo_id = ?1",
                    params![repo_id],
                )?;
                tx.execute(
                    "DELETE FROM file_cochanges WHERE repo_id = ?1",
                    params![repo_id],
                )?;
            }
            let mut upsert = tx.prepare(
                "INSERT INTO file_stats (repo_id, path, commit_count, last_modified)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(repo_id, path) DO UPDATE SET
                    commit_count = commit_count + excluded.commit_count,
                    last_modified = max(coalesce(last_modified, 0), excluded.last_modified)",
            )?;
            for (path, (count, last_modified)) in &delta.file_commits {
                upsert.execute(params![repo_id, path, i64::from(*count), last_modified])?;
            }

            tx.execute(
                "UPDATE file_stats SET recent_commit_count = 0 WHERE repo_id = ?1",
                params![repo_id],
            )?;
            let mut recent = tx.prepare(
                "INSERT INTO file_stats (repo_id, path, recent_commit_count)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(repo_id, path) DO UPDATE SET recent_commit_count = excluded.recent_commit_count",
            )?;
            for (path, count) in &delta.recent_counts {
                recent.execute(params![repo_id, path, i64::from(*count)])?;
            }

            let mut cochange = tx.prepare(
                "INSERT INTO file_cochanges (repo_id, path_a, path_b, count)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(repo_id, path_a, path_b) DO UPDATE SET count = count + excluded.count",
            )?;
            for ((a, b), count) in &delta.cochanges {
                if a == b {
                    continue;
                }
                let (a, b) = ordered_pair(a, b);
                cochange.execute(params![repo_id, a, b, i64::from(*count)])?;
            }

            tx.execute(
                "UPDATE repos SET last_git_analysis_commit = ?2, updated_at = ?3 WHERE id = ?1",
                params![repo_id, delta.head, unix_now()],
            )?;
        }
        tx.commit()?;
        log::debug!(
            "git history for {repo_id}: {} files, {} pairs, head {}, replace {}",
            delta.file_commits.len(),
            delta.cochanges.len(),
            delta.head,
            delta.replace
        );
        Ok(())
    }

    pub fn list_file_stats(&self, repo_id: &str) -> Result<Vec<FileStatRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT path, commit_count, recent_commit_count, last_modified
             FROM file_stats WHERE repo_id = ?1 ORDER BY path",
        )?;
        let rows = stmt.query_map(params![repo_id], |row| {
            let commits: i64 = row.get(1)?;
            let recent: i64 = row.get(2)?;
            Ok(FileStatRecord {
                path: row.get(0)?,
                commit_count: commits.max(0) as u32,
                recent_commit_count: recent.max(0) as u32,
                last_modified: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Co-change pairs with at least `min_count` shared commits, strongest first
    pub fn list_cochanges(&self, repo_id: &str, min_count: u32) -> Result<Vec<CochangeRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT path_a, path_b, count FROM file_cochanges
             WHERE repo_id = ?1 AND count >= ?2
             ORDER BY count DESC, path_a, path_b",
        )?;
        let rows = stmt.query_map(params![repo_id, i64::from(min_count)], |row| {
            let count: i64 = row.get(2)?;
            Ok(CochangeRecord {
                path_a: row.get(0)?,
                path_b: row.get(1)?,
                count: count.max(0) as u32,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
