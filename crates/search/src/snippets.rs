use crate::config::EnrichmentConfig;
use crate::query_classifier::{ParsedQuery, QueryKind};
use crate::types::ContextFile;
use regex::Regex;
use scout_code_chunker::{is_declaration_line, split_identifier};
use scout_store::{FileMetadataRecord, StoredChunk};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Why a snippet points at its line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnippetAnchor {
    StackFrame,
    Symbol { name: String },
    Export { name: String },
}

/// A bounded code excerpt around one line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub path: String,
    /// 1-based anchor line
    pub line: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub code: String,
    pub anchor: SnippetAnchor,
}

/// Snippets for the first `config.snippet_files` files, in file order
pub fn resolve_snippets(
    query: &ParsedQuery,
    files: &[ContextFile],
    metadata: &HashMap<String, FileMetadataRecord>,
    chunks: &HashMap<String, Vec<StoredChunk>>,
    config: &EnrichmentConfig,
) -> Vec<Snippet> {
    let query_tokens: HashSet<&str> = query.natural_tokens.iter().map(String::as_str).collect();
    let mut snippets = Vec::new();

    for file in files.iter().take(config.snippet_files) {
        let Some(file_chunks) = chunks.get(&file.path).filter(|c| !c.is_empty()) else {
            continue;
        };
        let meta = metadata.get(&file.path);
        let Some((line, anchor)) = locate(query, &query_tokens, &file.path, meta, file_chunks)
        else {
            continue;
        };
        if let Some((start_line, end_line, code)) =
            slice_around(file_chunks, line, config.snippet_radius)
        {
            snippets.push(Snippet {
                path: file.path.clone(),
                line,
                start_line,
                end_line,
                code,
                anchor,
            });
        }
    }
    snippets
}

fn locate(
    query: &ParsedQuery,
    query_tokens: &HashSet<&str>,
    path: &str,
    meta: Option<&FileMetadataRecord>,
    chunks: &[StoredChunk],
) -> Option<(usize, SnippetAnchor)> {
    if let Some(frame) = query.frames.iter().find(|f| f.matches_file(path)) {
        return Some((frame.line, SnippetAnchor::StackFrame));
    }
    let meta = meta?;

    if query.kind == QueryKind::Symbol {
        if let Some(symbol) = &query.symbol {
            let known = meta.exports.iter().chain(&meta.internals).any(|n| n == symbol);
            if known {
                if let Some(line) = find_declaration_line(symbol, chunks) {
                    return Some((line, SnippetAnchor::Symbol { name: symbol.clone() }));
                }
            }
        }
    }

    let mut best: Option<(&String, usize)> = None;
    for export in &meta.exports {
        let overlap = split_identifier(export)
            .iter()
            .filter(|t| query_tokens.contains(t.as_str()))
            .count();
        if overlap > 0 && best.map_or(true, |(_, o)| overlap > o) {
            best = Some((export, overlap));
        }
    }
    let (export, _) = best?;
    let line = find_declaration_line(export, chunks)?;
    Some((line, SnippetAnchor::Export { name: export.clone() }))
}

/// 1-based line declaring `symbol`.
///
/// A declaration-keyword line mentioning the symbol wins over the first
/// plain occurrence.
pub fn find_declaration_line(symbol: &str, chunks: &[StoredChunk]) -> Option<usize> {
    let pattern = Regex::new(&format!(r"(^|[^\w$]){}($|[^\w$])", regex::escape(symbol))).ok()?;
    let mut ordered: Vec<&StoredChunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.start_line);

    let mut first_mention = None;
    for chunk in ordered {
        for (offset, text) in chunk.content.lines().enumerate() {
            if !pattern.is_match(text) {
                continue;
            }
            let line = chunk.start_line + offset;
            if is_declaration_line(text) {
                return Some(line);
            }
            first_mention.get_or_insert(line);
        }
    }
    first_mention
}

/// `radius` lines on each side of `line`, clipped to the chunk that owns it.
/// Returns `(start_line, end_line, code)`.
pub fn slice_around(
    chunks: &[StoredChunk],
    line: usize,
    radius: usize,
) -> Option<(usize, usize, String)> {
    let chunk = chunks
        .iter()
        .filter(|c| c.start_line <= line && line <= c.end_line)
        .min_by_key(|c| c.start_line)?;
    let start = line.saturating_sub(radius).max(chunk.start_line);
    let end = (line + radius).min(chunk.end_line);
    let code: Vec<&str> = chunk
        .content
        .lines()
        .skip(start - chunk.start_line)
        .take(end - start + 1)
        .collect();
    if code.is_empty() {
        return None;
    }
    let end = start + code.len() - 1;
    Some((start, end, code.join("\n")))
}
