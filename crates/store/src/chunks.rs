use crate::error::Result;
use crate::types::{ChunkDiff, StoredChunk};
use crate::{decode_embedding, encode_embedding, unix_now, Store};
use rusqlite::{params, Row};
use scout_code_chunker::CodeChunk;
use std::collections::{HashMap, HashSet};

const CHUNK_COLUMNS: &str =
    "id, path, chunk_index, content_hash, start_line, end_line, content, language, embedding";

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<(StoredChunk, Option<Vec<u8>>)> {
    let chunk_index: i64 = row.get(2)?;
    let start_line: i64 = row.get(4)?;
    let end_line: i64 = row.get(5)?;
    Ok((
        StoredChunk {
            id: row.get(0)?,
            path: row.get(1)?,
            chunk_index: chunk_index as usize,
            content_hash: row.get(3)?,
            start_line: start_line as usize,
            end_line: end_line as usize,
            content: row.get(6)?,
            language: row.get(7)?,
            embedding: None,
        },
        row.get(8)?,
    ))
}

fn decode_rows(rows: Vec<(StoredChunk, Option<Vec<u8>>)>) -> Result<Vec<StoredChunk>> {
    rows.into_iter()
        .map(|(mut chunk, blob)| {
            chunk.embedding = blob.as_deref().map(decode_embedding).transpose()?;
            Ok(chunk)
        })
        .collect()
}

impl Store {
    /// Reconcile the stored chunks of one file with a fresh chunking.
    ///
    /// Keys are `(chunk_index, content_hash)`: matching rows are touched and
    /// keep their embedding, new keys are inserted, vanished keys are deleted.
    pub fn apply_file_chunks(
        &self,
        repo_id: &str,
        path: &str,
        language: &str,
        chunks: &[CodeChunk],
    ) -> Result<ChunkDiff> {
        let now = unix_now();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing: HashMap<(usize, String), i64> = {
            let mut stmt = tx.prepare(
                "SELECT id, chunk_index, content_hash FROM chunks WHERE repo_id = ?1 AND path = ?2",
            )?;
            let rows = stmt.query_map(params![repo_id, path], |row| {
                let idx: i64 = row.get(1)?;
                Ok(((idx as usize, row.get::<_, String>(2)?), row.get::<_, i64>(0)?))
            })?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut diff = ChunkDiff::default();
        let mut seen: HashSet<i64> = HashSet::new();
        {
            let mut touch = tx.prepare(
                "UPDATE chunks SET last_seen = ?2, start_line = ?3, end_line = ?4 WHERE id = ?1",
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO chunks
                 (repo_id, path, chunk_index, content_hash, start_line, end_line, content, language, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(repo_id, path, chunk_index, content_hash) DO UPDATE SET last_seen = excluded.last_seen",
            )?;

            for chunk in chunks {
                let key = (chunk.chunk_index, chunk.content_hash.clone());
                if let Some(&id) = existing.get(&key) {
                    touch.execute(params![
                        id,
                        now,
                        chunk.start_line as i64,
                        chunk.end_line as i64
                    ])?;
                    seen.insert(id);
                    diff.unchanged += 1;
                } else {
                    insert.execute(params![
                        repo_id,
                        path,
                        chunk.chunk_index as i64,
                        chunk.content_hash,
                        chunk.start_line as i64,
                        chunk.end_line as i64,
                        chunk.content,
                        language,
                        now
                    ])?;
                    diff.inserted += 1;
                }
            }

            let mut delete = tx.prepare("DELETE FROM chunks WHERE id = ?1")?;
            for id in existing.values().filter(|id| !seen.contains(*id)) {
                delete.execute(params![id])?;
                diff.deleted += 1;
            }
        }

        tx.commit()?;
        log::trace!(
            "{path}: +{} ={} -{}",
            diff.inserted,
            diff.unchanged,
            diff.deleted
        );
        Ok(diff)
    }

    /// Remove every chunk of a path (file deleted or no longer indexable)
    pub fn delete_file_chunks(&self, repo_id: &str, path: &str) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM chunks WHERE repo_id = ?1 AND path = ?2",
            params![repo_id, path],
        )?;
        Ok(removed)
    }

    pub fn chunk_count(&self, repo_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE repo_id = ?1",
            params![repo_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Paths that currently have at least one chunk
    pub fn chunked_paths(&self, repo_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT path FROM chunks WHERE repo_id = ?1 ORDER BY path")?;
        let rows = stmt.query_map(params![repo_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    pub fn chunks_for_path(&self, repo_id: &str, path: &str) -> Result<Vec<StoredChunk>> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks WHERE repo_id = ?1 AND path = ?2 ORDER BY chunk_index"
            ))?;
            let rows = stmt.query_map(params![repo_id, path], chunk_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        decode_rows(rows)
    }

    /// Every chunk of a repository, ordered by path and position
    pub fn chunks_for_repo(&self, repo_id: &str) -> Result<Vec<StoredChunk>> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks WHERE repo_id = ?1 ORDER BY path, chunk_index"
            ))?;
            let rows = stmt.query_map(params![repo_id], chunk_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        decode_rows(rows)
    }

    /// Chunks that already carry an embedding
    pub fn embedded_chunks(&self, repo_id: &str) -> Result<Vec<StoredChunk>> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks WHERE repo_id = ?1 AND embedding IS NOT NULL"
            ))?;
            let rows = stmt.query_map(params![repo_id], chunk_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        decode_rows(rows)
    }

    pub fn embedded_chunk_count(&self, repo_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE repo_id = ?1 AND embedding IS NOT NULL",
            params![repo_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Next batch of chunks waiting for an embedding.
    ///
    /// Only languages in `languages` qualify and blank content is skipped.
    /// `exclude` holds ids already attempted in this pass.
    pub fn chunks_pending_embedding(
        &self,
        repo_id: &str,
        languages: &[&str],
        exclude: &HashSet<i64>,
        limit: usize,
    ) -> Result<Vec<StoredChunk>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks
             WHERE repo_id = ?1 AND embedding IS NULL
             ORDER BY id"
        ))?;
        let mut rows = stmt.query(params![repo_id])?;
        let mut batch = Vec::with_capacity(limit);
        while let Some(row) = rows.next()? {
            let (chunk, _) = chunk_from_row(row)?;
            if exclude.contains(&chunk.id)
                || chunk.content.trim().is_empty()
                || !languages.contains(&chunk.language.as_str())
            {
                continue;
            }
            batch.push(chunk);
            if batch.len() >= limit {
                break;
            }
        }
        Ok(batch)
    }

    /// Write embeddings back by chunk id in one transaction
    pub fn set_chunk_embeddings(&self, embeddings: &[(i64, Vec<f32>)]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare("UPDATE chunks SET embedding = ?2 WHERE id = ?1")?;
            for (id, vector) in embeddings {
                written += stmt.execute(params![id, encode_embedding(vector)])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }
}
