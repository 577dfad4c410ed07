use crate::error::Result;
use crate::types::FileMetadataRecord;
use crate::Store;
use rusqlite::{params, OptionalExtension, Row};

const METADATA_COLUMNS: &str = "path, language, exports, imports, docstring, sections, internals, \
     purpose, purpose_hash, content_hash";

type RawMetadata = (FileMetadataRecord, [String; 4]);

fn metadata_from_row(row: &Row<'_>) -> rusqlite::Result<RawMetadata> {
    Ok((
        FileMetadataRecord {
            path: row.get(0)?,
            language: row.get(1)?,
            docstring: row.get(4)?,
            purpose: row.get(7)?,
            purpose_hash: row.get(8)?,
            content_hash: row.get(9)?,
            ..Default::default()
        },
        [row.get(2)?, row.get(3)?, row.get(5)?, row.get(6)?],
    ))
}

fn decode(raw: RawMetadata) -> Result<FileMetadataRecord> {
    let (mut record, [exports, imports, sections, internals]) = raw;
    record.exports = serde_json::from_str(&exports)?;
    record.imports = serde_json::from_str(&imports)?;
    record.sections = serde_json::from_str(&sections)?;
    record.internals = serde_json::from_str(&internals)?;
    Ok(record)
}

impl Store {
    /// Insert or replace the extracted facts for a file.
    ///
    /// An existing purpose is kept; it is only replaced through
    /// [`Store::set_file_purpose`].
    pub fn upsert_file_metadata(&self, repo_id: &str, record: &FileMetadataRecord) -> Result<()> {
        let exports = serde_json::to_string(&record.exports)?;
        let imports = serde_json::to_string(&record.imports)?;
        let sections = serde_json::to_string(&record.sections)?;
        let internals = serde_json::to_string(&record.internals)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO file_metadata
             (repo_id, path, language, exports, imports, docstring, sections, internals, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(repo_id, path) DO UPDATE SET
                language = excluded.language,
                exports = excluded.exports,
                imports = excluded.imports,
                docstring = excluded.docstring,
                sections = excluded.sections,
                internals = excluded.internals,
                content_hash = excluded.content_hash",
            params![
                repo_id,
                record.path,
                record.language,
                exports,
                imports,
                record.docstring,
                sections,
                internals,
                record.content_hash
            ],
        )?;
        Ok(())
    }

    pub fn set_file_purpose(
        &self,
        repo_id: &str,
        path: &str,
        purpose: &str,
        content_hash: &str,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE file_metadata SET purpose = ?3, purpose_hash = ?4 WHERE repo_id = ?1 AND path = ?2",
            params![repo_id, path, purpose, content_hash],
        )?;
        Ok(())
    }

    pub fn get_file_metadata(&self, repo_id: &str, path: &str) -> Result<Option<FileMetadataRecord>> {
        let raw = {
            let conn = self.lock()?;
            conn.query_row(
                &format!(
                    "SELECT {METADATA_COLUMNS} FROM file_metadata WHERE repo_id = ?1 AND path = ?2"
                ),
                params![repo_id, path],
                metadata_from_row,
            )
            .optional()?
        };
        raw.map(decode).transpose()
    }

    /// All file metadata for a repository, ordered by path
    pub fn list_file_metadata(&self, repo_id: &str) -> Result<Vec<FileMetadataRecord>> {
        let raw = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {METADATA_COLUMNS} FROM file_metadata WHERE repo_id = ?1 ORDER BY path"
            ))?;
            let rows = stmt.query_map(params![repo_id], metadata_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        raw.into_iter().map(decode).collect()
    }

    pub fn delete_file_metadata(&self, repo_id: &str, path: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM file_metadata WHERE repo_id = ?1 AND path = ?2",
            params![repo_id, path],
        )?;
        Ok(())
    }
}
