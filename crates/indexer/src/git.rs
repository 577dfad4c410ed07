use crate::error::{IndexerError, Result};
use crate::scanner::is_lockfile;
use scout_store::{ordered_pair, GitHistoryDelta};
use std::collections::HashMap;
use std::path::Path;
use tokio::time::{timeout, Duration};

const GIT_PROBE_TIMEOUT: Duration = Duration::from_millis(1_000);
const GIT_LOG_TIMEOUT: Duration = Duration::from_secs(60);

const COMMIT_MARKER: &str = "__COMMIT__";

/// Run `git -C root <args>` and return stdout, failing on a non-zero exit
pub(crate) async fn run_git(root: &Path, args: &[&str], limit: Duration) -> Result<Vec<u8>> {
    let command = args.first().copied().unwrap_or("").to_string();
    let output = timeout(
        limit,
        tokio::process::Command::new("git")
            .arg("-C")
            .arg(root)
            .args(args)
            .output(),
    )
    .await
    .map_err(|_| IndexerError::Git {
        command: command.clone(),
        message: format!("timed out after {}ms", limit.as_millis()),
    })?
    .map_err(|e| IndexerError::Git {
        command: command.clone(),
        message: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(IndexerError::Git {
            command,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Current HEAD commit, or `None` outside a git work tree (or with no commits)
pub async fn git_head(root: &Path) -> Option<String> {
    let stdout = run_git(root, &["rev-parse", "HEAD"], GIT_PROBE_TIMEOUT)
        .await
        .ok()?;
    let head = String::from_utf8_lossy(&stdout).trim().to_string();
    if head.is_empty() {
        None
    } else {
        Some(head)
    }
}

/// Walks commit history and turns it into per-file statistics and co-change pairs
pub struct GitAnalyzer {
    history_limit: usize,
    max_files_per_commit: usize,
    recent_window_days: u64,
}

/// One commit from `git log --name-only`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommitFiles {
    pub time: i64,
    pub files: Vec<String>,
}

impl GitAnalyzer {
    pub fn new(history_limit: usize, max_files_per_commit: usize, recent_window_days: u64) -> Self {
        Self {
            history_limit,
            max_files_per_commit,
            recent_window_days,
        }
    }

    /// Analyze commits in `since..head`, or the last `history_limit` commits
    /// when there is no previous analysis or `since` is no longer reachable.
    pub async fn analyze(
        &self,
        root: &Path,
        since: Option<&str>,
        head: &str,
    ) -> Result<GitHistoryDelta> {
        if since == Some(head) {
            log::debug!("Git history already analyzed at {head}");
            return Ok(GitHistoryDelta {
                head: head.to_string(),
                recent_counts: self.recent_counts(root, head).await?,
                ..Default::default()
            });
        }

        let (commits, replace) = match since {
            Some(since) if self.is_ancestor(root, since, head).await => {
                let range = format!("{since}..{head}");
                (self.log(root, &[range.as_str()]).await?, false)
            }
            Some(since) => {
                log::warn!("Previous analysis commit {since} is not an ancestor of {head}; re-walking history");
                (self.log_limited(root, head).await?, true)
            }
            None => (self.log_limited(root, head).await?, true),
        };

        let mut delta = self.accumulate(&commits);
        delta.head = head.to_string();
        delta.replace = replace;
        delta.recent_counts = self.recent_counts(root, head).await?;
        log::info!(
            "Git analysis: {} commits, {} files, {} co-change pairs",
            commits.len(),
            delta.file_commits.len(),
            delta.cochanges.len()
        );
        Ok(delta)
    }

    pub(crate) fn accumulate(&self, commits: &[CommitFiles]) -> GitHistoryDelta {
        let mut file_commits: HashMap<String, (u32, i64)> = HashMap::new();
        let mut cochanges: HashMap<(String, String), u32> = HashMap::new();

        for commit in commits {
            let files: Vec<&String> = commit
                .files
                .iter()
                .filter(|f| !is_lockfile(Path::new(f.as_str())))
                .collect();
            for file in &files {
                let entry = file_commits
                    .entry((*file).clone())
                    .or_insert((0, commit.time));
                entry.0 += 1;
                entry.1 = entry.1.max(commit.time);
            }

            let n = files.len();
            if n < 2 || n > self.max_files_per_commit {
                continue;
            }
            for i in 0..n {
                for j in (i + 1)..n {
                    let (a, b) = ordered_pair(files[i], files[j]);
                    if a == b {
                        continue;
                    }
                    *cochanges
                        .entry((a.to_string(), b.to_string()))
                        .or_insert(0) += 1;
                }
            }
        }

        GitHistoryDelta {
            head: String::new(),
            file_commits,
            cochanges,
            recent_counts: HashMap::new(),
            replace: false,
        }
    }

    async fn recent_counts(&self, root: &Path, head: &str) -> Result<HashMap<String, u32>> {
        let since = format!("--since={} days ago", self.recent_window_days);
        let commits = self.log(root, &[since.as_str(), head]).await?;
        let mut counts = HashMap::new();
        for commit in commits {
            for file in commit.files {
                if is_lockfile(Path::new(&file)) {
                    continue;
                }
                *counts.entry(file).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn is_ancestor(&self, root: &Path, ancestor: &str, head: &str) -> bool {
        run_git(
            root,
            &["merge-base", "--is-ancestor", ancestor, head],
            GIT_PROBE_TIMEOUT,
        )
        .await
        .is_ok()
    }

    async fn log_limited(&self, root: &Path, head: &str) -> Result<Vec<CommitFiles>> {
        let limit = format!("-n{}", self.history_limit);
        self.log(root, &[limit.as_str(), head]).await
    }

    async fn log(&self, root: &Path, extra: &[&str]) -> Result<Vec<CommitFiles>> {
        let format = format!("--format={COMMIT_MARKER}%H %ct");
        let mut args = vec!["log", format.as_str(), "--name-only", "--no-renames"];
        args.extend_from_slice(extra);
        let stdout = run_git(root, &args, GIT_LOG_TIMEOUT).await?;
        Ok(parse_log(&String::from_utf8_lossy(&stdout)))
    }
}

/// Parse `--format=__COMMIT__%H %ct --name-only` output
pub(crate) fn parse_log(output: &str) -> Vec<CommitFiles> {
    let mut commits = Vec::new();
    let mut current: Option<CommitFiles> = None;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix(COMMIT_MARKER) {
            if let Some(done) = current.take() {
                commits.push(done);
            }
            let time = header
                .split_whitespace()
                .nth(1)
                .and_then(|t| t.parse::<i64>().ok())
                .unwrap_or(0);
            current = Some(CommitFiles {
                time,
                files: Vec::new(),
            });
        } else if let Some(commit) = current.as_mut() {
            if !commit.files.iter().any(|f| f == line) {
                commit.files.push(line.to_string());
            }
        }
    }
    if let Some(done) = current {
        commits.push(done);
    }
    commits
}
