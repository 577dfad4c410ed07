use crate::error::{IndexerError, Result};
use crate::git::{git_head, run_git};
use crate::scanner::{is_binary_path, is_lockfile, FileScanner};
use scout_code_chunker::Language;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::time::Duration;

const GIT_LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix of revisions derived from a filesystem watermark instead of git
pub const FS_REVISION_PREFIX: &str = "fs:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
}

/// A file selected for indexing (or removal)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Root-relative path with `/` separators
    pub path: String,
    pub language: Language,
    pub status: FileStatus,
}

impl DiscoveredFile {
    fn new(path: String, status: FileStatus) -> Self {
        let language = Language::from_path(&path);
        Self {
            path,
            language,
            status,
        }
    }
}

/// Finds the files of a project that need indexing
pub struct Discovery {
    root: PathBuf,
    max_file_bytes: u64,
}

impl Discovery {
    pub fn new(root: impl AsRef<Path>, max_file_bytes: u64) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_file_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the root is a git work tree with at least one commit
    pub async fn is_git(&self) -> bool {
        git_head(&self.root).await.is_some()
    }

    /// Every indexable file, tagged `Added`.
    ///
    /// Git-tracked files when the root is a git work tree, otherwise a
    /// `.gitignore`-aware filesystem walk.
    pub async fn full_scan(&self) -> Result<Vec<DiscoveredFile>> {
        let paths = if self.is_git().await {
            let stdout = run_git(&self.root, &["ls-files", "-z"], GIT_LIST_TIMEOUT).await?;
            let mut paths = Vec::new();
            for raw in stdout.split(|b| *b == 0).filter(|s| !s.is_empty()) {
                let path = String::from_utf8_lossy(raw).into_owned();
                if self.accepts(&path, true).await {
                    paths.push(path);
                }
            }
            paths.sort();
            paths
        } else {
            let scanner = FileScanner::new(&self.root, self.max_file_bytes);
            tokio::task::spawn_blocking(move || scanner.scan())
                .await
                .map_err(|e| IndexerError::Other(format!("filesystem scan failed: {e}")))?
        };

        log::debug!("Full scan of {}: {} files", self.root.display(), paths.len());
        Ok(paths
            .into_iter()
            .map(|p| DiscoveredFile::new(p, FileStatus::Added))
            .collect())
    }

    /// Files changed between two commits.
    ///
    /// Renames become a deletion of the old path plus an addition of the new
    /// one. Deleted files skip the size check.
    pub async fn diff_scan(&self, from: &str, to: &str) -> Result<Vec<DiscoveredFile>> {
        let stdout = run_git(
            &self.root,
            &["diff", "--name-status", "-z", from, to],
            GIT_LIST_TIMEOUT,
        )
        .await?;

        let mut files = Vec::new();
        for (status, path) in parse_name_status(&stdout) {
            let keep = match status {
                FileStatus::Deleted => self.accepts(&path, false).await,
                _ => self.accepts(&path, true).await,
            };
            if keep {
                files.push(DiscoveredFile::new(path, status));
            }
        }
        log::debug!(
            "Diff scan {}..{} of {}: {} files",
            short(from),
            short(to),
            self.root.display(),
            files.len()
        );
        Ok(files)
    }

    /// Git HEAD, or an `fs:` revision hashed from the filesystem watermark
    pub async fn current_revision(&self) -> Result<String> {
        if let Some(head) = git_head(&self.root).await {
            return Ok(head);
        }
        self.filesystem_revision().await
    }

    async fn filesystem_revision(&self) -> Result<String> {
        let root = self.root.clone();
        let max_file_bytes = self.max_file_bytes;
        let watermark = tokio::task::spawn_blocking(move || {
            let files = FileScanner::new(&root, max_file_bytes).scan();
            let mut file_count = 0u64;
            let mut total_bytes = 0u64;
            let mut max_mtime_ms = 0u64;
            for rel in &files {
                let meta = std::fs::metadata(root.join(rel))?;
                file_count += 1;
                total_bytes = total_bytes.saturating_add(meta.len());
                if let Ok(modified) = meta.modified() {
                    let mtime_ms = modified
                        .duration_since(UNIX_EPOCH)
                        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                        .unwrap_or(0);
                    max_mtime_ms = max_mtime_ms.max(mtime_ms);
                }
            }
            Ok::<_, IndexerError>((file_count, max_mtime_ms, total_bytes))
        })
        .await
        .map_err(|e| IndexerError::Other(format!("failed to compute filesystem watermark: {e}")))??;

        let (file_count, max_mtime_ms, total_bytes) = watermark;
        let mut hasher = Sha256::new();
        hasher.update(file_count.to_be_bytes());
        hasher.update(max_mtime_ms.to_be_bytes());
        hasher.update(total_bytes.to_be_bytes());
        let digest = hasher.finalize();
        let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        Ok(format!("{FS_REVISION_PREFIX}{hex}"))
    }

    async fn accepts(&self, path: &str, check_size: bool) -> bool {
        let candidate = Path::new(path);
        if is_binary_path(candidate) || is_lockfile(candidate) {
            return false;
        }
        if !check_size {
            return true;
        }
        match tokio::fs::metadata(self.root.join(path)).await {
            Ok(meta) if meta.is_file() => {
                if meta.len() > self.max_file_bytes {
                    log::debug!("Skipping oversized file {path} ({} bytes)", meta.len());
                    false
                } else {
                    true
                }
            }
            // Tracked but missing from the work tree
            _ => false,
        }
    }
}

/// Parse `git diff --name-status -z` output into per-path statuses
pub(crate) fn parse_name_status(stdout: &[u8]) -> Vec<(FileStatus, String)> {
    let tokens: Vec<&[u8]> = stdout
        .split(|b| *b == 0)
        .filter(|s| !s.is_empty())
        .collect();

    let mut out = Vec::new();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let status = tokens[idx];
        idx += 1;
        if idx >= tokens.len() {
            break;
        }
        let path1 = String::from_utf8_lossy(tokens[idx]).into_owned();
        idx += 1;

        let Some(first) = status.first() else {
            continue;
        };
        match first {
            b'R' | b'C' => {
                if idx >= tokens.len() {
                    break;
                }
                let path2 = String::from_utf8_lossy(tokens[idx]).into_owned();
                idx += 1;
                if *first == b'R' {
                    out.push((FileStatus::Deleted, path1));
                }
                out.push((FileStatus::Added, path2));
            }
            b'A' => out.push((FileStatus::Added, path1)),
            b'D' => out.push((FileStatus::Deleted, path1)),
            // M, T (type change), U (unmerged)
            _ => out.push((FileStatus::Modified, path1)),
        }
    }
    out
}

fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn name_status_handles_renames_and_copies() {
        let raw = b"M\0src/a.ts\0A\0src/new.ts\0D\0old.py\0R100\0lib/x.rs\0lib/y.rs\0C75\0a.go\0b.go\0T\0link\0";
        let parsed = parse_name_status(raw);
        assert_eq!(
            parsed,
            vec![
                (FileStatus::Modified, "src/a.ts".to_string()),
                (FileStatus::Added, "src/new.ts".to_string()),
                (FileStatus::Deleted, "old.py".to_string()),
                (FileStatus::Deleted, "lib/x.rs".to_string()),
                (FileStatus::Added, "lib/y.rs".to_string()),
                (FileStatus::Added, "b.go".to_string()),
                (FileStatus::Modified, "link".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn filesystem_revision_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();
        let discovery = Discovery::new(dir.path(), 1024);

        let first = discovery.current_revision().await.unwrap();
        assert!(first.starts_with(FS_REVISION_PREFIX));
        assert_eq!(first, discovery.current_revision().await.unwrap());

        std::fs::write(dir.path().join("b.txt"), "bravo bravo\n").unwrap();
        let second = discovery.current_revision().await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn full_scan_without_git_walks_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/app.ts"), "export const app = 1;\n").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8; 4]).unwrap();

        let files = Discovery::new(dir.path(), 1024).full_scan().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/app.ts");
        assert_eq!(files[0].language, Language::TypeScript);
        assert_eq!(files[0].status, FileStatus::Added);
    }
}
