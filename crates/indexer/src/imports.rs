use scout_code_chunker::Language;
use std::collections::{HashMap, HashSet};

const JS_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts", "vue", "svelte",
];
const JS_ALIAS_PREFIXES: &[&str] = &["@/", "~/"];
const GO_MAX_TARGETS: usize = 5;

/// Resolves raw import specifiers to files of the same repository
pub struct ImportResolver {
    files: HashSet<String>,
    /// Directory -> files directly inside it
    dirs: HashMap<String, Vec<String>>,
    /// File stem -> paths with that stem
    stems: HashMap<String, Vec<String>>,
}

impl ImportResolver {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut files = HashSet::new();
        let mut dirs: HashMap<String, Vec<String>> = HashMap::new();
        let mut stems: HashMap<String, Vec<String>> = HashMap::new();
        for path in paths {
            let path: String = path.into();
            dirs.entry(parent(&path).to_string())
                .or_default()
                .push(path.clone());
            stems.entry(stem(&path).to_string())
                .or_default()
                .push(path.clone());
            files.insert(path);
        }
        for list in dirs.values_mut().chain(stems.values_mut()) {
            list.sort();
        }
        Self { files, dirs, stems }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    /// In-repo targets of one specifier written in `source`
    pub fn resolve(&self, source: &str, language: Language, spec: &str) -> Vec<String> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Vec::new();
        }
        let resolved = match language {
            Language::JavaScript | Language::TypeScript => self.resolve_js(source, spec),
            Language::Python => self.resolve_python(source, spec),
            Language::Rust => self.resolve_rust(source, spec),
            Language::Go => self.resolve_go(spec),
            _ => {
                let relative = self.resolve_relative(source, spec);
                if relative.is_empty() {
                    self.resolve_suffix(spec).into_iter().collect()
                } else {
                    relative
                }
            }
        };
        resolved.into_iter().filter(|t| t != source).collect()
    }

    /// Resolve every file's specifiers into deduplicated `(source, target)` edges
    pub fn resolve_edges<'a, I>(&self, files: I) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = (&'a str, Language, &'a [String])>,
    {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for (source, language, specs) in files {
            for spec in specs {
                for target in self.resolve(source, language, spec) {
                    if seen.insert((source.to_string(), target.clone())) {
                        edges.push((source.to_string(), target));
                    }
                }
            }
        }
        edges
    }

    fn first_existing<I>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        candidates
            .into_iter()
            .find(|c| self.files.contains(c))
            .into_iter()
            .collect()
    }

    fn resolve_js(&self, source: &str, spec: &str) -> Vec<String> {
        let bases: Vec<String> = if spec.starts_with('.') {
            normalize(&join(parent(source), spec)).into_iter().collect()
        } else if let Some(rest) = JS_ALIAS_PREFIXES.iter().find_map(|p| spec.strip_prefix(p)) {
            [format!("src/{rest}"), rest.to_string()]
                .into_iter()
                .filter_map(|p| normalize(&p))
                .collect()
        } else {
            // Bare package specifier
            return Vec::new();
        };

        for base in bases {
            let mut candidates = vec![base.clone()];
            for compiled in [".js", ".jsx", ".mjs", ".cjs"] {
                if let Some(stripped) = base.strip_suffix(compiled) {
                    candidates.extend(["ts", "tsx", "mts", "cts"].iter().map(|e| format!("{stripped}.{e}")));
                }
            }
            candidates.extend(JS_EXTENSIONS.iter().map(|e| format!("{base}.{e}")));
            candidates.extend(JS_EXTENSIONS.iter().map(|e| format!("{base}/index.{e}")));
            let found = self.first_existing(candidates);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    fn resolve_python(&self, source: &str, spec: &str) -> Vec<String> {
        let dots = spec.chars().take_while(|c| *c == '.').count();
        let module = spec[dots..].replace('.', "/");

        let mut bases = Vec::new();
        if dots > 0 {
            let mut dir = parent(source).to_string();
            for _ in 1..dots {
                dir = parent(&dir).to_string();
            }
            bases.push(join(&dir, &module));
        } else {
            bases.push(module.clone());
            bases.push(format!("src/{module}"));
            // Sibling module imported by bare name
            bases.push(join(parent(source), &module));
        }

        for base in bases {
            let base = base.trim_matches('/').to_string();
            let candidates = if base.is_empty() {
                vec!["__init__.py".to_string()]
            } else {
                vec![format!("{base}.py"), format!("{base}/__init__.py")]
            };
            let found = self.first_existing(candidates);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    fn resolve_rust(&self, source: &str, spec: &str) -> Vec<String> {
        let module_dir = rust_module_dir(source);

        if let Some(name) = spec.strip_prefix("mod:") {
            return self.first_existing([
                join(&module_dir, &format!("{name}.rs")),
                join(&module_dir, &format!("{name}/mod.rs")),
            ]);
        }

        let mut segments: Vec<&str> = spec.split("::").filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Vec::new();
        }
        let mut base = match segments.remove(0) {
            "crate" => rust_crate_root(source),
            "self" => module_dir,
            "super" => {
                let mut dir = parent(&module_dir).to_string();
                while segments.first() == Some(&"super") {
                    segments.remove(0);
                    dir = parent(&dir).to_string();
                }
                dir
            }
            _ => return Vec::new(),
        };

        // Longest module path that exists; trailing segments may be items
        let mut best = Vec::new();
        for segment in segments {
            base = join(&base, segment);
            let found = self.first_existing([format!("{base}.rs"), format!("{base}/mod.rs")]);
            if found.is_empty() {
                break;
            }
            best = found;
        }
        best
    }

    fn resolve_go(&self, spec: &str) -> Vec<String> {
        let spec_parts: Vec<&str> = spec.split('/').filter(|s| !s.is_empty()).collect();
        let needed = spec_parts.len().min(2);

        let mut best: Option<(usize, &str)> = None;
        for dir in self.dirs.keys() {
            let dir_parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
            if dir_parts.is_empty() || dir_parts.len() > spec_parts.len() {
                continue;
            }
            // Longest run of trailing components shared by dir and spec
            let matched = dir_parts
                .iter()
                .rev()
                .zip(spec_parts.iter().rev())
                .take_while(|(a, b)| a == b)
                .count();
            if matched < needed.max(1) {
                continue;
            }
            if best.map_or(true, |(m, d)| matched > m || (matched == m && dir.as_str() < d)) {
                best = Some((matched, dir.as_str()));
            }
        }

        let Some((_, dir)) = best else {
            return Vec::new();
        };
        self.dirs
            .get(dir)
            .map(|files| {
                files
                    .iter()
                    .filter(|f| f.ends_with(".go") && !f.ends_with("_test.go"))
                    .take(GO_MAX_TARGETS)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn resolve_relative(&self, source: &str, spec: &str) -> Vec<String> {
        let spec = spec.trim_matches(|c| c == '"' || c == '\'' || c == '<' || c == '>');
        normalize(&join(parent(source), spec))
            .map(|p| self.first_existing([p]))
            .unwrap_or_default()
    }

    /// Unique file whose path (with or without extension) ends with the
    /// specifier, read either literally or with `.`/`::` as separators
    fn resolve_suffix(&self, spec: &str) -> Option<String> {
        let spec = spec.trim_matches(|c| c == '"' || c == '\'' || c == '<' || c == '>');
        let literal = spec.trim_start_matches("./").trim_matches('/').to_string();
        let dotted = spec.replace("::", "/").replace('.', "/");
        let dotted = dotted.trim_matches('/').to_string();

        let mut matches: Vec<&String> = Vec::new();
        for form in [literal, dotted] {
            let Some(last) = form.rsplit('/').next() else {
                continue;
            };
            let Some(candidates) = self.stems.get(stem(last)) else {
                continue;
            };
            for path in candidates {
                let without_ext = strip_extension(path);
                let hit = path.as_str() == form
                    || without_ext == form
                    || path.ends_with(&format!("/{form}"))
                    || without_ext.ends_with(&format!("/{form}"));
                if hit && !matches.contains(&path) {
                    matches.push(path);
                }
            }
        }
        match matches.as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        }
    }
}

fn parent(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

fn file_name(path: &str) -> &str {
    path.rfind('/').map(|i| &path[i + 1..]).unwrap_or(path)
}

fn stem(path: &str) -> &str {
    let name = file_name(path);
    match name.find('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}

fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(0) | None => path,
        Some(i) => &path[..name_start + i],
    }
}

fn join(dir: &str, rel: &str) -> String {
    if dir.is_empty() {
        rel.to_string()
    } else if rel.is_empty() {
        dir.to_string()
    } else {
        format!("{dir}/{rel}")
    }
}

/// Collapse `.` and `..`; `None` when the path escapes the root
fn normalize(path: &str) -> Option<String> {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop()?;
            }
            other => out.push(other),
        }
    }
    Some(out.join("/"))
}

fn rust_module_dir(source: &str) -> String {
    let dir = parent(source);
    match file_name(source) {
        "mod.rs" | "lib.rs" | "main.rs" => dir.to_string(),
        _ => join(dir, stem(source)),
    }
}

fn rust_crate_root(source: &str) -> String {
    let parts: Vec<&str> = source.split('/').collect();
    match parts.iter().rposition(|p| *p == "src") {
        Some(idx) if idx + 1 < parts.len() => parts[..=idx].join("/"),
        _ => parent(source).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver(paths: &[&str]) -> ImportResolver {
        ImportResolver::new(paths.iter().copied())
    }

    fn one(v: &str) -> Vec<String> {
        vec![v.to_string()]
    }

    #[test]
    fn javascript_relative_alias_and_index() {
        let r = resolver(&[
            "src/auth/middleware.ts",
            "src/auth/session.ts",
            "src/auth/index.ts",
            "src/utils/date.ts",
            "src/routes.ts",
        ]);
        let ts = Language::TypeScript;
        assert_eq!(r.resolve("src/auth/middleware.ts", ts, "./session"), one("src/auth/session.ts"));
        assert_eq!(r.resolve("src/auth/middleware.ts", ts, "./session.js"), one("src/auth/session.ts"));
        assert_eq!(r.resolve("src/auth/middleware.ts", ts, "../utils/date"), one("src/utils/date.ts"));
        assert_eq!(r.resolve("src/routes.ts", ts, "./auth"), one("src/auth/index.ts"));
        assert_eq!(r.resolve("src/routes.ts", ts, "@/utils/date"), one("src/utils/date.ts"));
        assert!(r.resolve("src/routes.ts", ts, "express").is_empty());
        assert!(r.resolve("src/routes.ts", ts, "../../outside").is_empty());
    }

    #[test]
    fn python_relative_and_absolute() {
        let r = resolver(&[
            "app/__init__.py",
            "app/models.py",
            "app/auth/__init__.py",
            "app/auth/login.py",
            "src/core/db.py",
        ]);
        let py = Language::Python;
        assert_eq!(r.resolve("app/auth/login.py", py, "..models"), one("app/models.py"));
        assert_eq!(r.resolve("app/auth/login.py", py, "."), one("app/auth/__init__.py"));
        assert_eq!(r.resolve("app/models.py", py, "app.auth"), one("app/auth/__init__.py"));
        assert_eq!(r.resolve("app/models.py", py, "core.db"), one("src/core/db.py"));
        assert!(r.resolve("app/models.py", py, "os").is_empty());
    }

    #[test]
    fn rust_module_paths() {
        let r = resolver(&[
            "crates/store/src/lib.rs",
            "crates/store/src/chunks.rs",
            "crates/store/src/schema/mod.rs",
            "crates/store/src/schema/tables.rs",
        ]);
        let rs = Language::Rust;
        assert_eq!(
            r.resolve("crates/store/src/lib.rs", rs, "mod:chunks"),
            one("crates/store/src/chunks.rs")
        );
        assert_eq!(
            r.resolve("crates/store/src/lib.rs", rs, "mod:schema"),
            one("crates/store/src/schema/mod.rs")
        );
        assert_eq!(
            r.resolve("crates/store/src/chunks.rs", rs, "crate::schema::tables::Table"),
            one("crates/store/src/schema/tables.rs")
        );
        assert_eq!(
            r.resolve("crates/store/src/schema/tables.rs", rs, "super::super::chunks"),
            one("crates/store/src/chunks.rs")
        );
        assert_eq!(
            r.resolve("crates/store/src/schema/mod.rs", rs, "self::tables"),
            one("crates/store/src/schema/tables.rs")
        );
    }

    #[test]
    fn go_package_directories() {
        let r = resolver(&[
            "internal/store/store.go",
            "internal/store/store_test.go",
            "internal/store/cache.go",
            "cmd/server/main.go",
        ]);
        let targets = r.resolve("cmd/server/main.go", Language::Go, "example.com/app/internal/store");
        assert_eq!(
            targets,
            vec!["internal/store/cache.go".to_string(), "internal/store/store.go".to_string()]
        );
        assert!(r.resolve("cmd/server/main.go", Language::Go, "fmt").is_empty());
    }

    #[test]
    fn suffix_fallback_requires_unique_match() {
        let r = resolver(&["lib/net/http.h", "include/util/strings.h", "src/util/strings.h"]);
        assert_eq!(r.resolve("src/main.c", Language::C, "net/http.h"), one("lib/net/http.h"));
        assert!(r.resolve("src/main.c", Language::C, "strings.h").is_empty());
        assert_eq!(
            r.resolve("src/main.c", Language::C, "util/strings.h"),
            one("src/util/strings.h")
        );
    }

    #[test]
    fn edges_are_deduplicated_and_exclude_self() {
        let r = resolver(&["a.ts", "b.ts"]);
        let specs_a = vec!["./b".to_string(), "./b.js".to_string(), "./a".to_string()];
        let edges = r.resolve_edges([("a.ts", Language::TypeScript, specs_a.as_slice())]);
        assert_eq!(edges, vec![("a.ts".to_string(), "b.ts".to_string())]);
    }
}
