use crate::terms::{is_stopword, MIN_TOKEN_LEN};
use once_cell::sync::Lazy;
use regex::Regex;
use scout_code_chunker::split_identifier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// A bare identifier such as `requireAuth` or `Store::open`
    Symbol,
    /// Contains at least one recognizable stack frame
    StackTrace,
    /// Looks like a pasted error line without frames
    ErrorMessage,
    Natural,
}

/// One `path:line` location parsed from a stack trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub path: String,
    pub line: usize,
    pub column: Option<usize>,
    pub function: Option<String>,
}

impl StackFrame {
    /// Whether this frame points at `file` (a repo-relative path).
    ///
    /// Either path may be the longer one; they must agree on whole trailing
    /// path components.
    pub fn matches_file(&self, file: &str) -> bool {
        let frame = normalize_frame_path(&self.path);
        let file = file.trim_start_matches("./");
        if frame.is_empty() || file.is_empty() {
            return false;
        }
        component_suffix(&frame, file) || component_suffix(file, &frame)
    }
}

fn component_suffix(long: &str, short: &str) -> bool {
    long == short
        || (long.ends_with(short) && long[..long.len() - short.len()].ends_with('/'))
}

fn normalize_frame_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path
        .strip_prefix("file://")
        .unwrap_or(&path)
        .trim_start_matches("./");
    path.to_string()
}

/// The classified query plus everything later stages need from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub raw: String,
    pub kind: QueryKind,
    pub frames: Vec<StackFrame>,
    /// Identifier for [`QueryKind::Symbol`] queries (last `::`/`.` segment)
    pub symbol: Option<String>,
    /// Lowercase word parts of the query, stopwords removed
    pub natural_tokens: Vec<String>,
}

static PYTHON_FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"File "(?P<path>[^"]+)", line (?P<line>\d+)(?:, in (?P<func>[\w<>.]+))?"#)
        .expect("python frame regex")
});

static JS_FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"at (?:(?P<func>[\w$.<>\[\] ]+?) \()?(?P<path>[^\s():]+):(?P<line>\d+):(?P<col>\d+)\)?",
    )
    .expect("js frame regex")
});

static PATH_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<path>[\w./\\@-]+\.(?:rs|go|ts|tsx|js|jsx|mjs|cjs|py|java|kt|rb|c|cc|cpp|h|hpp|cs|swift|php|scala)):(?P<line>\d+)(?::(?P<col>\d+))?",
    )
    .expect("path:line regex")
});

static ERROR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\b\w*(error|exception)\b\s*:|\bpanicked at\b|\btraceback\b|\bunhandled\b|\bcannot read propert|\bis not (a function|defined)\b|\bsegmentation fault\b|\bnull pointer\b|\bundefined reference\b)",
    )
    .expect("error message regex")
});

pub struct QueryClassifier;

impl QueryClassifier {
    pub fn parse(goal: &str) -> ParsedQuery {
        let raw = goal.trim().to_string();
        let frames = parse_stack_frames(&raw);
        let symbol = Self::bare_symbol(&raw);
        let kind = if !frames.is_empty() {
            QueryKind::StackTrace
        } else if ERROR_RE.is_match(&raw) {
            QueryKind::ErrorMessage
        } else if symbol.is_some() {
            QueryKind::Symbol
        } else {
            QueryKind::Natural
        };
        let symbol = if kind == QueryKind::Symbol { symbol } else { None };

        ParsedQuery {
            natural_tokens: natural_tokens(&raw),
            raw,
            kind,
            frames,
            symbol,
        }
    }

    pub fn classify(goal: &str) -> QueryKind {
        Self::parse(goal).kind
    }

    /// `requireAuth`, `user_store`, `Store::open`, `auth.requireAuth()`
    fn bare_symbol(query: &str) -> Option<String> {
        let token = query
            .trim_matches(|c: char| c == '`' || c == '\'' || c == '"')
            .trim_end_matches("()");
        if token.is_empty() || token.chars().any(char::is_whitespace) {
            return None;
        }
        if !token
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == ':' || c == '.' || c == '$')
        {
            return None;
        }
        let last = token
            .rsplit(|c| c == ':' || c == '.')
            .find(|s| !s.is_empty())?;
        // `a.b` is often a file name, so only `::` qualifies a plain word
        if !token.contains("::") && !Self::is_identifier_like(last) {
            return None;
        }
        if !last.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$') {
            return None;
        }
        Some(last.to_string())
    }

    fn is_identifier_like(token: &str) -> bool {
        let has_snake = token.contains('_');
        let has_digits = token.chars().any(|c| c.is_ascii_digit());
        let has_mixed_case = token.chars().any(|c| c.is_lowercase())
            && token.chars().skip(1).any(|c| c.is_uppercase());
        has_snake || has_digits || has_mixed_case
    }
}

/// Frames from JS, Python and `path:line[:col]` (Rust, Go, compilers) traces
pub fn parse_stack_frames(text: &str) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |path: &str, line: &str, column: Option<&str>, function: Option<&str>| {
        let Ok(line) = line.parse::<usize>() else {
            return;
        };
        let path = normalize_frame_path(path);
        if line == 0 || path.is_empty() || path.starts_with("node:") || !seen.insert((path.clone(), line)) {
            return;
        }
        frames.push(StackFrame {
            path,
            line,
            column: column.and_then(|c| c.parse().ok()),
            function: function.map(|f| f.trim().to_string()).filter(|f| !f.is_empty()),
        });
    };

    for caps in PYTHON_FRAME_RE.captures_iter(text) {
        push(&caps["path"], &caps["line"], None, caps.name("func").map(|m| m.as_str()));
    }
    for caps in JS_FRAME_RE.captures_iter(text) {
        push(
            &caps["path"],
            &caps["line"],
            caps.name("col").map(|m| m.as_str()),
            caps.name("func").map(|m| m.as_str()),
        );
    }
    for caps in PATH_LINE_RE.captures_iter(text) {
        push(&caps["path"], &caps["line"], caps.name("col").map(|m| m.as_str()), None);
    }
    frames
}

fn natural_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split_whitespace()
        .flat_map(split_identifier)
        .filter(|t| t.len() >= MIN_TOKEN_LEN && !is_stopword(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
