//! Heuristic, regex-based structure extraction.
//!
//! Every language goes through [`SourceExtractor`]; languages without a
//! dedicated implementation fall back to [`GenericExtractor`]. Nothing here
//! parses an AST, so results are best-effort by construction.

use once_cell::sync::Lazy;
use regex::Regex;
use scout_code_chunker::Language;
use std::collections::HashSet;

const MAX_NAMES: usize = 100;
const MAX_SECTIONS: usize = 50;
const MAX_DOCSTRING_CHARS: usize = 300;

/// Structural facts extracted from one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMetadata {
    pub exports: Vec<String>,
    /// Raw specifiers as written (`./session`, `..models`, `crate::auth`, `mod:auth`)
    pub imports: Vec<String>,
    pub docstring: String,
    pub sections: Vec<String>,
    pub internals: Vec<String>,
}

/// Per-language extraction contract
pub trait SourceExtractor: Send + Sync {
    fn exports(&self, content: &str) -> Vec<String>;

    fn imports(&self, content: &str) -> Vec<String>;

    /// Non-exported functions and types
    fn internals(&self, content: &str) -> Vec<String>;

    fn docstring(&self, content: &str) -> String {
        leading_comment(content)
    }

    fn sections(&self, content: &str) -> Vec<String> {
        comment_sections(content)
    }
}

pub fn extractor_for(language: Language) -> &'static dyn SourceExtractor {
    match language {
        Language::JavaScript | Language::TypeScript => &JsExtractor,
        Language::Python => &PythonExtractor,
        Language::Rust => &RustExtractor,
        Language::Go => &GoExtractor,
        Language::Markdown => &MarkdownExtractor,
        _ => &GenericExtractor,
    }
}

pub fn extract_metadata(language: Language, content: &str) -> ExtractedMetadata {
    let extractor = extractor_for(language);
    let exports = cap(dedup(extractor.exports(content)), MAX_NAMES);
    let exported: HashSet<&str> = exports.iter().map(String::as_str).collect();
    let internals = cap(
        dedup(extractor.internals(content))
            .into_iter()
            .filter(|name| !exported.contains(name.as_str()))
            .collect(),
        MAX_NAMES,
    );

    ExtractedMetadata {
        imports: dedup(extractor.imports(content)),
        docstring: truncate_chars(extractor.docstring(content).trim(), MAX_DOCSTRING_CHARS),
        sections: cap(dedup(extractor.sections(content)), MAX_SECTIONS),
        exports,
        internals,
    }
}

fn captures(re: &Regex, content: &str) -> Vec<String> {
    re.captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .collect()
}

fn cap(mut items: Vec<String>, limit: usize) -> Vec<String> {
    items.truncate(limit);
    items
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}…", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// JavaScript / TypeScript
// ---------------------------------------------------------------------------

static JS_EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*export\s+(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:function\*?|class|const|let|var|interface|type|enum|namespace)\s+([A-Za-z_$][\w$]*)",
    )
    .expect("js export regex")
});
static JS_EXPORT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*export\s*\{([^}]*)\}").expect("js export list regex"));
static JS_COMMONJS_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:module\.)?exports\.([A-Za-z_$][\w$]*)\s*=").expect("commonjs regex")
});
static JS_IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*(?:import|export)\s+(?:type\s+)?(?:[^'";]*?\s+from\s+)?['"]([^'"]+)['"]"#)
        .expect("js import regex")
});
static JS_REQUIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:require|import)\(\s*['"]([^'"]+)['"]\s*\)"#).expect("js require regex")
});
static JS_INTERNAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:async\s+)?(?:function\*?\s+([A-Za-z_$][\w$]*)|class\s+([A-Za-z_$][\w$]*))",
    )
    .expect("js internal regex")
});
static JS_ARROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:const|let)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s*)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>",
    )
    .expect("js arrow regex")
});

pub struct JsExtractor;

impl SourceExtractor for JsExtractor {
    fn exports(&self, content: &str) -> Vec<String> {
        let mut names = captures(&JS_EXPORT_DECL, content);
        for caps in JS_EXPORT_LIST.captures_iter(content) {
            let Some(list) = caps.get(1) else { continue };
            for item in list.as_str().split(',') {
                // `a as b` exports `b`
                let name = item.split_whitespace().last().unwrap_or("");
                if !name.is_empty() && name != "type" {
                    names.push(name.to_string());
                }
            }
        }
        names.extend(captures(&JS_COMMONJS_EXPORT, content));
        names
    }

    fn imports(&self, content: &str) -> Vec<String> {
        let mut specs = captures(&JS_IMPORT_FROM, content);
        specs.extend(captures(&JS_REQUIRE, content));
        specs
    }

    fn internals(&self, content: &str) -> Vec<String> {
        let mut names: Vec<String> = JS_INTERNAL
            .captures_iter(content)
            .filter(|c| !c[0].trim_start().starts_with("export"))
            .filter_map(|c| c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().to_string()))
            .collect();
        names.extend(captures(&JS_ARROW, content));
        names
    }
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

static PY_TOP_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:async\s+)?(?:def|class)\s+([A-Za-z_]\w*)").expect("python def regex")
});
static PY_CONSTANT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([A-Z][A-Z0-9_]+)\s*(?::[^=]+)?=").expect("python const regex"));
static PY_NESTED_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]+(?:async\s+)?def\s+([A-Za-z_]\w*)").expect("python method regex")
});
static PY_FROM_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*from\s+(\.*[\w.]*)\s+import\b").expect("python from regex"));
static PY_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*import\s+([\w.]+(?:\s+as\s+\w+)?(?:\s*,\s*[\w.]+(?:\s+as\s+\w+)?)*)")
        .expect("python import regex")
});
static PY_MODULE_DOC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)\A(?:\s*#[^\n]*\n)*\s*[rRuU]?(?:"""(.*?)"""|'''(.*?)''')"#)
        .expect("python docstring regex")
});

pub struct PythonExtractor;

impl SourceExtractor for PythonExtractor {
    fn exports(&self, content: &str) -> Vec<String> {
        let mut names: Vec<String> = captures(&PY_TOP_LEVEL, content)
            .into_iter()
            .filter(|n| !n.starts_with('_'))
            .collect();
        names.extend(captures(&PY_CONSTANT, content));
        names
    }

    fn imports(&self, content: &str) -> Vec<String> {
        let mut specs = captures(&PY_FROM_IMPORT, content);
        for list in captures(&PY_IMPORT, content) {
            for item in list.split(',') {
                if let Some(module) = item.split_whitespace().next() {
                    specs.push(module.to_string());
                }
            }
        }
        specs
    }

    fn internals(&self, content: &str) -> Vec<String> {
        let mut names: Vec<String> = captures(&PY_TOP_LEVEL, content)
            .into_iter()
            .filter(|n| n.starts_with('_') && !n.starts_with("__"))
            .collect();
        names.extend(
            captures(&PY_NESTED_DEF, content)
                .into_iter()
                .filter(|n| !n.starts_with("__")),
        );
        names
    }

    fn docstring(&self, content: &str) -> String {
        PY_MODULE_DOC
            .captures(content)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| collapse_whitespace(m.as_str()))
            .unwrap_or_else(|| leading_comment(content))
    }
}

// ---------------------------------------------------------------------------
// Rust
// ---------------------------------------------------------------------------

static RS_PUB_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*pub(?:\([^)]*\))?\s+(?:async\s+)?(?:unsafe\s+)?(?:const\s+)?(?:extern\s+\S+\s+)?(?:fn|struct|enum|trait|type|mod|const|static|union)\s+([A-Za-z_]\w*)",
    )
    .expect("rust pub regex")
});
static RS_PRIVATE_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:async\s+)?(?:unsafe\s+)?(?:const\s+)?(?:fn|struct|enum|trait)\s+([A-Za-z_]\w*)")
        .expect("rust item regex")
});
static RS_USE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+((?:crate|super|self)(?:::\w+)*)")
        .expect("rust use regex")
});
static RS_MOD_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_]\w*)\s*;").expect("rust mod regex")
});

pub struct RustExtractor;

impl SourceExtractor for RustExtractor {
    fn exports(&self, content: &str) -> Vec<String> {
        captures(&RS_PUB_ITEM, content)
    }

    /// `use crate::…`/`super::`/`self::` paths plus `mod:<name>` for
    /// out-of-line module declarations; external crates are skipped.
    fn imports(&self, content: &str) -> Vec<String> {
        let mut specs = captures(&RS_USE, content);
        specs.extend(
            captures(&RS_MOD_DECL, content)
                .into_iter()
                .map(|m| format!("mod:{m}")),
        );
        specs
    }

    fn internals(&self, content: &str) -> Vec<String> {
        captures(&RS_PRIVATE_ITEM, content)
    }

    fn docstring(&self, content: &str) -> String {
        let inner: Vec<&str> = content
            .lines()
            .map(str::trim)
            .skip_while(|l| l.is_empty())
            .take_while(|l| l.starts_with("//!"))
            .map(|l| l.trim_start_matches("//!").trim())
            .collect();
        if inner.is_empty() {
            leading_comment(content)
        } else {
            collapse_whitespace(&inner.join(" "))
        }
    }
}

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

static GO_FUNC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)").expect("go func regex")
});
static GO_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:type|var|const)\s+([A-Za-z_]\w*)").expect("go decl regex")
});
static GO_IMPORT_SINGLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:\w+\s+)?"([^"]+)""#).expect("go import regex")
});
static GO_IMPORT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)import\s*\((.*?)\)").expect("go import block regex"));
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("quoted regex"));

pub struct GoExtractor;

impl GoExtractor {
    fn names(content: &str) -> Vec<String> {
        let mut names = captures(&GO_FUNC, content);
        names.extend(captures(&GO_DECL, content));
        names
    }
}

impl SourceExtractor for GoExtractor {
    fn exports(&self, content: &str) -> Vec<String> {
        Self::names(content)
            .into_iter()
            .filter(|n| n.starts_with(|c: char| c.is_uppercase()))
            .collect()
    }

    fn imports(&self, content: &str) -> Vec<String> {
        let mut specs = captures(&GO_IMPORT_SINGLE, content);
        for block in captures(&GO_IMPORT_BLOCK, content) {
            specs.extend(captures(&QUOTED, &block));
        }
        specs
    }

    fn internals(&self, content: &str) -> Vec<String> {
        Self::names(content)
            .into_iter()
            .filter(|n| !n.starts_with(|c: char| c.is_uppercase()) && n != "init" && n != "main")
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

static MD_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,3}\s+(.+?)\s*#*\s*$").expect("markdown heading regex"));

pub struct MarkdownExtractor;

impl SourceExtractor for MarkdownExtractor {
    fn exports(&self, _content: &str) -> Vec<String> {
        Vec::new()
    }

    fn imports(&self, _content: &str) -> Vec<String> {
        Vec::new()
    }

    fn internals(&self, _content: &str) -> Vec<String> {
        Vec::new()
    }

    /// First prose paragraph
    fn docstring(&self, content: &str) -> String {
        let paragraph: Vec<&str> = content
            .lines()
            .map(str::trim)
            .skip_while(|l| l.is_empty() || l.starts_with('#') || l.starts_with('!'))
            .take_while(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();
        collapse_whitespace(&paragraph.join(" "))
    }

    fn sections(&self, content: &str) -> Vec<String> {
        captures(&MD_HEADING, content)
    }
}

// ---------------------------------------------------------------------------
// Everything else
// ---------------------------------------------------------------------------

static GENERIC_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:export\s+|public\s+|open\s+|internal\s+)?(?:static\s+|final\s+|abstract\s+|sealed\s+|data\s+|partial\s+)*(?:class|interface|enum|record|struct|object|trait|module)\s+([A-Za-z_]\w*)",
    )
    .expect("generic type regex")
});
static GENERIC_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:(?:public|private|protected|static|async|override|suspend)\s+)*(?:def|fun|func|function|sub|proc)\s+([A-Za-z_]\w*)")
        .expect("generic function regex")
});
static GENERIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*(?:import|using|#include|require_relative|require|include)\s+(?:static\s+)?[<"']?([\w./:\\-]+)"#)
        .expect("generic import regex")
});

pub struct GenericExtractor;

impl SourceExtractor for GenericExtractor {
    fn exports(&self, content: &str) -> Vec<String> {
        captures(&GENERIC_TYPE, content)
    }

    fn imports(&self, content: &str) -> Vec<String> {
        captures(&GENERIC_IMPORT, content)
            .into_iter()
            .map(|s| s.trim_end_matches(';').to_string())
            .collect()
    }

    fn internals(&self, content: &str) -> Vec<String> {
        captures(&GENERIC_FUNCTION, content)
    }
}

// ---------------------------------------------------------------------------
// Shared comment handling
// ---------------------------------------------------------------------------

static SECTION_MARK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*//\s*MARK:\s*-?\s*(.+?)\s*$").expect("mark regex"));
static SECTION_REGION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?://\s*|#\s*)?#?region\s+(.+?)\s*$").expect("region regex")
});
static SECTION_BANNER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?://|#|--|/\*)\s*[-=*#]{3,}\s*([A-Za-z][^-=*#]*?)\s*[-=*#]{3,}\s*(?:\*/)?\s*$")
        .expect("banner regex")
});

/// Section titles from `MARK:`, `#region` and `// ==== Title ====` banners
pub fn comment_sections(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            [&*SECTION_MARK, &*SECTION_REGION, &*SECTION_BANNER]
                .iter()
                .find_map(|re| re.captures(line))
                .and_then(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        })
        .collect()
}

/// Leading comment block (after a shebang), markers stripped
pub fn leading_comment(content: &str) -> String {
    let mut lines = content.lines().map(str::trim).peekable();
    while let Some(line) = lines.peek() {
        if line.is_empty() || line.starts_with("#!") || line.starts_with("'use ") || line.starts_with("\"use ") {
            lines.next();
        } else {
            break;
        }
    }

    let mut text = Vec::new();
    let Some(first) = lines.next() else {
        return String::new();
    };

    if first.starts_with("/*") {
        let mut line = first;
        loop {
            let done = line.contains("*/");
            let cleaned = line
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .split("*/")
                .next()
                .unwrap_or("")
                .trim_start_matches('*')
                .trim();
            if !cleaned.is_empty() && !cleaned.starts_with('@') {
                text.push(cleaned.to_string());
            }
            if done {
                break;
            }
            match lines.next() {
                Some(next) => line = next,
                None => break,
            }
        }
    } else if let Some(marker) = ["///", "//", "--", "#"].iter().find(|m| first.starts_with(*m)) {
        let mut line = first;
        loop {
            let cleaned = line.trim_start_matches(marker).trim();
            if !cleaned.is_empty() && !cleaned.chars().all(|c| "-=*#/".contains(c)) {
                text.push(cleaned.to_string());
            }
            match lines.next() {
                Some(next) if next.starts_with(marker) => line = next,
                _ => break,
            }
        }
    }

    collapse_whitespace(&text.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
