//! # Scout Store
//!
//! SQLite persistence for repositories, chunks, file metadata, import edges,
//! git statistics and co-change pairs. Every derived row hangs off `repos` with
//! `ON DELETE CASCADE`, so removing a repository removes everything indexed for it.
//!
//! The connection sits behind a mutex; every write is scoped to a single row or
//! a `(repo, path)` key and multi-statement writes run in one transaction.

mod chunks;
mod error;
mod metadata;
mod relations;
mod repos;
mod schema;
mod types;

pub use error::{Result, StoreError};
pub use repos::repo_id_for_path;
pub use types::{
    ordered_pair, ChunkDiff, CochangeRecord, FileMetadataRecord, FileStatRecord, GitHistoryDelta,
    IndexStatus, RepoRecord, StoredChunk, VocabCluster,
};

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Shared handle to the index database
pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        log::info!("Opening index database at {}", path.display());
        let conn = Connection::open(&path)?;
        schema::initialize(&conn, false)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Private in-memory database, used by tests and one-shot runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn, true)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Current unix time in seconds
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Serialize an embedding as little-endian f32 bytes
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Inverse of [`encode_embedding`]
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::InvalidEmbedding(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_blob_preserves_values() {
        let v = vec![0.25_f32, -1.5, 3.0e-7];
        let bytes = encode_embedding(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_embedding(&bytes).unwrap(), v);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(matches!(
            decode_embedding(&[0, 1, 2]),
            Err(StoreError::InvalidEmbedding(3))
        ));
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scout.db");
        let store = Store::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(path.exists());
    }
}
