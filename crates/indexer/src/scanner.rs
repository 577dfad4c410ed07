use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

/// Filesystem walker used when the project is not a git repository
pub struct FileScanner {
    root: PathBuf,
    max_file_bytes: u64,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>, max_file_bytes: u64) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_file_bytes,
        }
    }

    /// Scan for indexable files (.gitignore aware), returned as sorted
    /// root-relative paths with `/` separators
    pub fn scan(&self) -> Vec<String> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .require_git(false);
        builder.filter_entry(move |entry| {
            entry
                .path()
                .strip_prefix(&root)
                .map(|rel| !has_ignored_component(rel))
                .unwrap_or(true)
        });

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    if !entry.file_type().is_some_and(|t| t.is_file()) {
                        continue;
                    }
                    let path = entry.path();
                    if is_binary_path(path) || is_lockfile(path) {
                        continue;
                    }
                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.max_file_bytes {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.max_file_bytes
                            );
                            continue;
                        }
                    }
                    if let Some(rel) = relative_path(&self.root, path) {
                        files.push(rel);
                    }
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::debug!("Scanner found {} files under {}", files.len(), self.root.display());
        files
    }
}

/// Root-relative path with forward slashes
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Dotfiles/dot-directories and build or dependency directories
pub fn has_ignored_component(relative: &Path) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.')
                || IGNORED_SCOPES
                    .iter()
                    .any(|ignored| name.eq_ignore_ascii_case(ignored))
        }
        _ => false,
    })
}

pub fn is_lockfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            LOCKFILE_NAMES
                .iter()
                .any(|candidate| name.eq_ignore_ascii_case(candidate))
        })
}

pub fn is_binary_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        })
}

const IGNORED_SCOPES: &[&str] = &[
    "node_modules",
    "bower_components",
    "target",
    "build",
    "dist",
    "out",
    "coverage",
    "vendor",
    "__pycache__",
    "venv",
    "env",
    "site-packages",
    "bin",
    "obj",
];

const LOCKFILE_NAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "Cargo.lock",
    "Gemfile.lock",
    "poetry.lock",
    "Pipfile.lock",
    "composer.lock",
    "go.sum",
    "flake.lock",
];

const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd", "icns",
    // archives
    "zip", "gz", "tgz", "tar", "bz2", "xz", "7z", "rar", "jar", "war",
    // compiled / native
    "exe", "dll", "so", "dylib", "a", "o", "obj", "lib", "class", "pyc", "pyo", "wasm", "bin",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // media
    "mp3", "mp4", "wav", "ogg", "flac", "mov", "avi", "webm", "mkv",
    // documents / data
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "sqlite", "db", "parquet", "pkl",
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn skips_ignored_directories_binaries_and_lockfiles() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), b"x").unwrap();
        fs::write(root.join(".cache/state.json"), b"{}").unwrap();
        fs::write(root.join("src/main.rs"), b"fn main() {}").unwrap();
        fs::write(root.join("logo.png"), b"\x89PNG").unwrap();
        fs::write(root.join("Cargo.lock"), b"# lock").unwrap();
        fs::write(root.join("README.md"), b"# demo").unwrap();

        let files = FileScanner::new(root, 1024).scan();
        assert_eq!(files, vec!["README.md".to_string(), "src/main.rs".to_string()]);
    }

    #[test]
    fn skips_oversized_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("big.txt"), vec![b'a'; 64]).unwrap();
        fs::write(temp.path().join("small.txt"), b"ok").unwrap();

        let files = FileScanner::new(temp.path(), 16).scan();
        assert_eq!(files, vec!["small.txt".to_string()]);
    }

    #[test]
    fn path_predicates() {
        assert!(has_ignored_component(Path::new(".git/HEAD")));
        assert!(has_ignored_component(Path::new("web/node_modules/x.js")));
        assert!(!has_ignored_component(Path::new("src/auth/login.ts")));
        assert!(is_binary_path(Path::new("a/B.PNG")));
        assert!(!is_binary_path(Path::new("a/b.ts")));
        assert!(is_lockfile(Path::new("web/yarn.lock")));
    }
}
