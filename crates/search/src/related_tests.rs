use std::cmp::Reverse;

const TEST_DIRS: &[&str] = &["tests", "test", "__tests__", "spec", "specs"];

/// Maximum tests reported per file
pub const MAX_RELATED_TESTS: usize = 3;

fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}

/// Whether `path` looks like a test file
pub fn is_test_path(path: &str) -> bool {
    let path = path.replace('\\', "/");
    let (dir, name) = split_path(&path);
    let name = name.to_ascii_lowercase();
    let stem = name.split('.').next().unwrap_or_default();
    name.contains(".test.")
        || name.contains(".spec.")
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("_spec")
        || dir.split('/').any(|segment| TEST_DIRS.contains(&segment))
}

/// The source file stem a test file exercises
fn test_subject(path: &str) -> Option<String> {
    if !is_test_path(path) {
        return None;
    }
    let (_, name) = split_path(path);
    let stem = name.split('.').next()?.to_ascii_lowercase();
    let subject = stem
        .strip_prefix("test_")
        .or_else(|| stem.strip_suffix("_test"))
        .or_else(|| stem.strip_suffix("_spec"))
        .unwrap_or(stem.as_str());
    (!subject.is_empty()).then(|| subject.to_string())
}

/// Test files among `all_paths` that exercise `path`.
///
/// Matches sibling `*.test.*`/`*.spec.*` files, `test_*.py`, `*_test.go`
/// and files under test directories named after the source file's stem.
/// Same-directory tests come first.
pub fn find_related_tests(path: &str, all_paths: &[String]) -> Vec<String> {
    if is_test_path(path) {
        return Vec::new();
    }
    let (dir, name) = split_path(path);
    let Some(stem) = name.split('.').next().map(str::to_ascii_lowercase) else {
        return Vec::new();
    };
    if stem.is_empty() {
        return Vec::new();
    }

    let mut tests: Vec<&String> = all_paths
        .iter()
        .filter(|candidate| candidate.as_str() != path)
        .filter(|candidate| test_subject(candidate).as_deref() == Some(stem.as_str()))
        .collect();
    tests.sort_by_key(|candidate| (Reverse(split_path(candidate).0 == dir), candidate.as_str()));
    tests.into_iter().take(MAX_RELATED_TESTS).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn recognizes_test_layouts() {
        assert!(is_test_path("src/auth/login.test.ts"));
        assert!(is_test_path("src/auth/login.spec.tsx"));
        assert!(is_test_path("app/test_models.py"));
        assert!(is_test_path("pkg/store/store_test.go"));
        assert!(is_test_path("crates/store/tests/flow.rs"));
        assert!(is_test_path("src/__tests__/login.ts"));
        assert!(!is_test_path("src/auth/login.ts"));
        assert!(!is_test_path("src/latest/contest.ts"));
    }

    #[test]
    fn finds_tests_for_a_source_file() {
        let all = paths(&[
            "src/auth/login.ts",
            "src/auth/login.test.ts",
            "test/auth/login.spec.ts",
            "src/auth/loginForm.test.ts",
            "src/auth/session.test.ts",
        ]);
        assert_eq!(
            find_related_tests("src/auth/login.ts", &all),
            vec!["src/auth/login.test.ts", "test/auth/login.spec.ts"]
        );
        assert!(find_related_tests("src/auth/login.test.ts", &all).is_empty());
    }

    #[test]
    fn python_and_go_conventions() {
        let all = paths(&["app/models.py", "tests/test_models.py", "pkg/store/store.go", "pkg/store/store_test.go"]);
        assert_eq!(find_related_tests("app/models.py", &all), vec!["tests/test_models.py"]);
        assert_eq!(find_related_tests("pkg/store/store.go", &all), vec!["pkg/store/store_test.go"]);
    }
}
