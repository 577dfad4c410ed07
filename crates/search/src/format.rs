use crate::config::FormatterConfig;
use crate::enrich::Enrichment;
use crate::snippets::Snippet;
use crate::types::{ContextFile, FileOrigin};
use scout_code_chunker::estimate_tokens;
use scout_store::FileMetadataRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const HIGH_TOP_SCORE: f64 = 60.0;
const HIGH_PAIRED_TOP: f64 = 40.0;
const HIGH_PAIRED_RATIO: f64 = 2.0;
const HIGH_RATIO: f64 = 2.5;
const MODERATE_TOP_SCORE: f64 = 25.0;
const MODERATE_RATIO: f64 = 1.5;

/// Files listed under "Most likely" in a moderate pack
const MOST_LIKELY: usize = 2;
/// Items shown per inline hint
const HINT_ITEMS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Moderate,
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

/// Confidence tier for scores sorted highest first.
///
/// A lone score has no runner-up to separate from, so its ratio is 1.
pub fn classify_confidence(scores: &[f64]) -> Confidence {
    let Some(&top) = scores.first() else {
        return Confidence::Low;
    };
    let ratio = match scores.get(1) {
        Some(&second) if second > 0.0 => top / second,
        _ => 1.0,
    };

    if top >= HIGH_TOP_SCORE
        || (top >= HIGH_PAIRED_TOP && ratio >= HIGH_PAIRED_RATIO)
        || ratio >= HIGH_RATIO
    {
        Confidence::High
    } else if (top >= MODERATE_TOP_SCORE && ratio >= MODERATE_RATIO) || ratio >= MODERATE_RATIO {
        Confidence::Moderate
    } else {
        Confidence::Low
    }
}

/// Drop scored files below `min_score_ratio` of the top score; unscored
/// files survive only within the first `unscored_keep_positions`.
pub fn filter_weak_files(files: &[ContextFile], config: &FormatterConfig) -> Vec<ContextFile> {
    let top = files
        .iter()
        .filter_map(|f| f.score)
        .fold(0.0_f64, f64::max);
    let floor = top * config.min_score_ratio;
    files
        .iter()
        .enumerate()
        .filter(|(position, file)| match file.score {
            Some(score) => score >= floor,
            None => *position < config.unscored_keep_positions,
        })
        .map(|(_, file)| file.clone())
        .collect()
}

/// Everything rendered into a pack
#[derive(Debug, Clone, Copy)]
pub struct PackInput<'a> {
    pub goal: &'a str,
    /// Selected files, best first
    pub files: &'a [ContextFile],
    pub metadata: &'a HashMap<String, FileMetadataRecord>,
    pub enrichment: &'a Enrichment,
    pub snippets: &'a [Snippet],
    /// Source file -> related test files
    pub tests: &'a HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StripStep {
    Prose,
    Chain,
    Files,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPack {
    pub text: String,
    pub confidence: Confidence,
    /// Files that made it into `text`, in order
    pub files: Vec<String>,
    pub estimated_tokens: usize,
    pub stripped: Vec<StripStep>,
}

#[derive(Debug, Clone, Copy)]
struct RenderOptions {
    prose: bool,
    chain: bool,
    max_files: Option<usize>,
}

enum Line {
    Text(String),
    /// Description and hint lines, the first thing dropped over budget
    Prose(String),
    Blank,
}

pub struct ContextFormatter {
    config: FormatterConfig,
}

impl ContextFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    pub fn format(&self, input: &PackInput<'_>) -> ContextPack {
        let files = filter_weak_files(input.files, &self.config);
        let mut scores: Vec<f64> = files.iter().filter_map(|f| f.score).collect();
        scores.sort_by(|a, b| b.total_cmp(a));
        let confidence = classify_confidence(&scores);

        let steps = [
            (None, RenderOptions { prose: true, chain: true, max_files: None }),
            (Some(StripStep::Prose), RenderOptions { prose: false, chain: true, max_files: None }),
            (Some(StripStep::Chain), RenderOptions { prose: false, chain: false, max_files: None }),
            (
                Some(StripStep::Files),
                RenderOptions {
                    prose: false,
                    chain: false,
                    max_files: Some(self.config.stripped_file_limit),
                },
            ),
        ];

        let mut stripped = Vec::new();
        let mut pack = None;
        for (step, options) in steps {
            if let Some(step) = step {
                stripped.push(step);
            }
            let (text, rendered) = render(input, &files, confidence, options);
            let estimated_tokens = estimate_tokens(&text);
            let fits = estimated_tokens <= self.config.token_budget;
            pack = Some(ContextPack {
                text,
                confidence,
                files: rendered,
                estimated_tokens,
                stripped: stripped.clone(),
            });
            if fits {
                break;
            }
        }

        let pack = pack.unwrap_or_else(|| ContextPack {
            text: String::new(),
            confidence,
            files: Vec::new(),
            estimated_tokens: 0,
            stripped,
        });
        log::debug!(
            "Formatted {} pack: {} files, ~{} tokens, stripped {:?}",
            confidence.as_str(),
            pack.files.len(),
            pack.estimated_tokens,
            pack.stripped
        );
        pack
    }
}

fn render(
    input: &PackInput<'_>,
    files: &[ContextFile],
    confidence: Confidence,
    options: RenderOptions,
) -> (String, Vec<String>) {
    let files: Vec<&ContextFile> = match options.max_files {
        Some(limit) => files.iter().take(limit).collect(),
        None => files.iter().collect(),
    };
    let mut lines = vec![
        Line::Text(format!("Goal: {}", input.goal.trim())),
        Line::Text(format!("Confidence: {}", confidence.as_str())),
        Line::Blank,
    ];

    if files.is_empty() {
        lines.push(Line::Text("No relevant files found.".to_string()));
    } else {
        match confidence {
            Confidence::High => render_high(input, &files, &mut lines),
            Confidence::Moderate => render_moderate(input, &files, &mut lines),
            Confidence::Low => render_low(&files, &mut lines),
        }
        if options.chain && confidence != Confidence::Low {
            render_chains(input, &files, &mut lines);
        }
    }

    let mut text = String::new();
    for line in lines {
        match line {
            Line::Text(s) => {
                text.push_str(&s);
                text.push('\n');
            }
            Line::Prose(s) if options.prose => {
                text.push_str(&s);
                text.push('\n');
            }
            Line::Prose(_) => {}
            Line::Blank => {
                if !text.ends_with("\n\n") {
                    text.push('\n');
                }
            }
        }
    }
    let rendered = files.iter().map(|f| f.path.clone()).collect();
    (text.trim_end().to_string() + "\n", rendered)
}

fn render_high(input: &PackInput<'_>, files: &[&ContextFile], lines: &mut Vec<Line>) {
    let (first, rest) = files.split_at(1);
    let start = first[0];
    lines.push(Line::Text(format!("Start here: {}", start.path)));
    if let Some(description) = describe(input, &start.path) {
        lines.push(Line::Prose(format!("  {description}")));
    }
    let importers = input.enrichment.importers_of(&start.path);
    if !importers.is_empty() {
        lines.push(Line::Prose(format!("  Imported by: {}", importers.join(", "))));
    }
    if let Some(tests) = input.tests.get(&start.path).filter(|t| !t.is_empty()) {
        lines.push(Line::Prose(format!("  Tests: {}", tests.join(", "))));
    }
    push_snippet(input, &start.path, lines);

    if !rest.is_empty() {
        lines.push(Line::Blank);
        lines.push(Line::Text("Related:".to_string()));
        for (i, file) in rest.iter().enumerate() {
            lines.push(Line::Text(format!("{}. {}{}", i + 2, file.path, inline_hints(input, file))));
        }
    }
}

fn render_moderate(input: &PackInput<'_>, files: &[&ContextFile], lines: &mut Vec<Line>) {
    let split = files.len().min(MOST_LIKELY);
    let (likely, also) = files.split_at(split);
    lines.push(Line::Text("Most likely:".to_string()));
    for (i, file) in likely.iter().enumerate() {
        lines.push(Line::Text(format!("{}. {}{}", i + 1, file.path, inline_hints(input, file))));
        if let Some(description) = describe(input, &file.path) {
            lines.push(Line::Prose(format!("   {description}")));
        }
        push_snippet(input, &file.path, lines);
    }
    if !also.is_empty() {
        lines.push(Line::Blank);
        lines.push(Line::Text("Also relevant:".to_string()));
        for (i, file) in also.iter().enumerate() {
            lines.push(Line::Text(format!(
                "{}. {}{}",
                i + split + 1,
                file.path,
                inline_hints(input, file)
            )));
        }
    }
}

fn render_low(files: &[&ContextFile], lines: &mut Vec<Line>) {
    lines.push(Line::Text("Candidates:".to_string()));
    for (i, file) in files.iter().enumerate() {
        lines.push(Line::Text(format!("{}. {}", i + 1, file.path)));
    }
}

fn render_chains(input: &PackInput<'_>, files: &[&ContextFile], lines: &mut Vec<Line>) {
    let chains: Vec<String> = input
        .enrichment
        .chains
        .iter()
        .filter(|chain| files.iter().any(|f| f.path == chain.root()))
        .map(|chain| format!("  {}", chain.render()))
        .collect();
    if chains.is_empty() {
        return;
    }
    lines.push(Line::Blank);
    lines.push(Line::Text("Chain:".to_string()));
    lines.extend(chains.into_iter().map(Line::Text));
}

/// Purpose, else docstring, else the export list
fn describe(input: &PackInput<'_>, path: &str) -> Option<String> {
    let meta = input.metadata.get(path)?;
    if let Some(purpose) = meta.purpose.as_deref().filter(|p| !p.trim().is_empty()) {
        return Some(purpose.trim().to_string());
    }
    if !meta.docstring.trim().is_empty() {
        return Some(meta.docstring.trim().to_string());
    }
    if !meta.exports.is_empty() {
        return Some(format!("Exports: {}", meta.exports.join(", ")));
    }
    None
}

fn inline_hints(input: &PackInput<'_>, file: &ContextFile) -> String {
    let mut hints = Vec::new();
    match file.origin {
        FileOrigin::Cochange | FileOrigin::Cluster => {
            let strongest = input
                .files
                .iter()
                .filter_map(|other| {
                    input
                        .enrichment
                        .partners_of(&other.path)
                        .iter()
                        .find(|p| p.path == file.path)
                        .map(|p| (other.path.as_str(), p.count))
                })
                .max_by_key(|(_, count)| *count);
            match strongest {
                Some((partner, count)) => hints.push(format!("changes with {partner} {count}x")),
                None => hints.push("changes with selected files".to_string()),
            }
        }
        FileOrigin::Semantic => hints.push("semantic match".to_string()),
        FileOrigin::Keyword => {}
    }
    let imports = input.enrichment.imports_of(&file.path);
    if !imports.is_empty() {
        hints.push(format!("imports {}", abbreviate(imports)));
    }
    let importers = input.enrichment.importers_of(&file.path);
    if !importers.is_empty() {
        hints.push(format!("imported by {}", abbreviate(importers)));
    }
    if let Some(tests) = input.tests.get(&file.path).filter(|t| !t.is_empty()) {
        hints.push(format!("tests {}", abbreviate(tests)));
    }
    if hints.is_empty() {
        String::new()
    } else {
        format!(" ({})", hints.join("; "))
    }
}

fn abbreviate(items: &[String]) -> String {
    let shown: Vec<&str> = items.iter().take(HINT_ITEMS).map(String::as_str).collect();
    let more = items.len().saturating_sub(HINT_ITEMS);
    if more > 0 {
        format!("{} +{more}", shown.join(", "))
    } else {
        shown.join(", ")
    }
}

fn push_snippet(input: &PackInput<'_>, path: &str, lines: &mut Vec<Line>) {
    let Some(snippet) = input.snippets.iter().find(|s| s.path == path) else {
        return;
    };
    lines.push(Line::Text(format!(
        "  {}:{}-{}",
        snippet.path, snippet.start_line, snippet.end_line
    )));
    lines.push(Line::Text("  ```".to_string()));
    for code in snippet.code.lines() {
        lines.push(Line::Text(format!("  {code}")));
    }
    lines.push(Line::Text("  ```".to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::CochangePartner;
    use crate::snippets::SnippetAnchor;
    use pretty_assertions::assert_eq;
    use scout_graph::ImportChain;

    fn scored(path: &str, score: f64) -> ContextFile {
        ContextFile {
            path: path.to_string(),
            score: Some(score),
            origin: FileOrigin::Keyword,
        }
    }

    #[test]
    fn confidence_fixtures() {
        assert_eq!(classify_confidence(&[62.0]), Confidence::High);
        assert_eq!(classify_confidence(&[42.0, 18.0]), Confidence::High);
        assert_eq!(classify_confidence(&[28.0, 17.0]), Confidence::Moderate);
        assert_eq!(classify_confidence(&[10.0, 9.0]), Confidence::Low);
        assert_eq!(classify_confidence(&[80.0, 20.0]), Confidence::High);
        assert_eq!(classify_confidence(&[12.0, 4.0]), Confidence::High);
        assert_eq!(classify_confidence(&[30.0, 25.0]), Confidence::Low);
        assert_eq!(classify_confidence(&[]), Confidence::Low);
    }

    #[test]
    fn weak_and_late_unscored_files_are_dropped() {
        let files = vec![
            scored("a", 100.0),
            ContextFile::promoted("p1", FileOrigin::Cochange),
            scored("b", 14.0),
            scored("c", 15.5),
            scored("d", 16.0),
            ContextFile::promoted("p2", FileOrigin::Cluster),
        ];
        let kept: Vec<String> = filter_weak_files(&files, &FormatterConfig::default())
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(kept, vec!["a", "p1", "c", "d"]);
    }

    fn fixture_metadata(paths: &[&str]) -> HashMap<String, FileMetadataRecord> {
        paths
            .iter()
            .map(|p| {
                (
                    p.to_string(),
                    FileMetadataRecord {
                        path: p.to_string(),
                        docstring: format!(
                            "{p} coordinates a long list of responsibilities that nobody \
                             remembers, documented here at considerable length for the reader"
                        ),
                        exports: vec!["handler".to_string()],
                        ..FileMetadataRecord::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn high_confidence_pack_reads_as_a_narrative() {
        let files = vec![
            scored("src/auth/middleware.ts", 70.0),
            ContextFile::promoted("src/auth/login.ts", FileOrigin::Cochange),
        ];
        let metadata = fixture_metadata(&["src/auth/middleware.ts"]);
        let mut enrichment = Enrichment::default();
        enrichment.importers.insert(
            "src/auth/middleware.ts".to_string(),
            vec!["src/routes.ts".to_string()],
        );
        enrichment.partners.insert(
            "src/auth/middleware.ts".to_string(),
            vec![CochangePartner {
                path: "src/auth/login.ts".to_string(),
                count: 6,
            }],
        );
        enrichment.chains.push(ImportChain {
            path: vec!["src/auth/middleware.ts".to_string(), "src/routes.ts".to_string()],
        });
        let tests = HashMap::from([(
            "src/auth/middleware.ts".to_string(),
            vec!["src/auth/middleware.test.ts".to_string()],
        )]);
        let snippets = vec![Snippet {
            path: "src/auth/middleware.ts".to_string(),
            line: 4,
            start_line: 3,
            end_line: 5,
            code: "// guard\nexport function requireAuth() {\n}".to_string(),
            anchor: SnippetAnchor::StackFrame,
        }];
        let input = PackInput {
            goal: "add auth middleware",
            files: &files,
            metadata: &metadata,
            enrichment: &enrichment,
            snippets: &snippets,
            tests: &tests,
        };
        let formatter = ContextFormatter::new(FormatterConfig {
            token_budget: 10_000,
            ..FormatterConfig::default()
        });
        let pack = formatter.format(&input);
        assert_eq!(pack.confidence, Confidence::High);
        assert!(pack.stripped.is_empty());
        assert!(pack.text.starts_with("Goal: add auth middleware\nConfidence: high\n\nStart here: src/auth/middleware.ts\n"));
        assert!(pack.text.contains("  Imported by: src/routes.ts\n"));
        assert!(pack.text.contains("  Tests: src/auth/middleware.test.ts\n"));
        assert!(pack.text.contains("  export function requireAuth() {\n"));
        assert!(pack.text.contains("2. src/auth/login.ts (changes with src/auth/middleware.ts 6x)\n"));
        assert!(pack.text.contains("Chain:\n  src/auth/middleware.ts <- src/routes.ts\n"));
        assert_eq!(pack.files, vec!["src/auth/middleware.ts", "src/auth/login.ts"]);
    }

    #[test]
    fn moderate_and_low_layouts() {
        let metadata = HashMap::new();
        let enrichment = Enrichment::default();
        let tests = HashMap::new();
        let formatter = ContextFormatter::new(FormatterConfig::default());

        let moderate = vec![scored("a.ts", 28.0), scored("b.ts", 17.0), scored("c.ts", 9.0)];
        let pack = formatter.format(&PackInput {
            goal: "q",
            files: &moderate,
            metadata: &metadata,
            enrichment: &enrichment,
            snippets: &[],
            tests: &tests,
        });
        assert_eq!(pack.confidence, Confidence::Moderate);
        assert_eq!(
            pack.text,
            "Goal: q\nConfidence: moderate\n\nMost likely:\n1. a.ts\n2. b.ts\n\nAlso relevant:\n3. c.ts\n"
        );

        let low = vec![scored("a.ts", 10.0), scored("b.ts", 9.0)];
        let pack = formatter.format(&PackInput {
            goal: "q",
            files: &low,
            metadata: &metadata,
            enrichment: &enrichment,
            snippets: &[],
            tests: &tests,
        });
        assert_eq!(pack.confidence, Confidence::Low);
        assert_eq!(pack.text, "Goal: q\nConfidence: low\n\nCandidates:\n1. a.ts\n2. b.ts\n");
    }

    #[test]
    fn oversized_pack_is_stripped_progressively() {
        let paths: Vec<String> = (0..12).map(|i| format!("src/module{i}/service{i}.ts")).collect();
        let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let metadata = fixture_metadata(&path_refs);
        let mut files = vec![scored(&paths[0], 90.0)];
        files.extend(paths[1..].iter().map(|p| scored(p, 30.0)));
        let mut enrichment = Enrichment::default();
        for p in &paths {
            enrichment.chains.push(ImportChain {
                path: vec![p.clone(), format!("{p}.consumer.ts"), format!("{p}.root.ts")],
            });
        }
        let tests = HashMap::new();
        let input = PackInput {
            goal: "service wiring",
            files: &files,
            metadata: &metadata,
            enrichment: &enrichment,
            snippets: &[],
            tests: &tests,
        };
        let formatter = ContextFormatter::new(FormatterConfig::default());
        let pack = formatter.format(&input);

        assert_eq!(pack.confidence, Confidence::High);
        assert!(!pack.stripped.is_empty());
        assert!(pack.estimated_tokens <= 350 || pack.files.len() <= 3);
        assert!(!pack.text.contains("responsibilities"));
        assert_eq!(pack.estimated_tokens, estimate_tokens(&pack.text));
    }
}
