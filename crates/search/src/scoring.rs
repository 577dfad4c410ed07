use crate::config::ScoringConfig;
use crate::noise::NoiseFilter;
use crate::terms::QueryTerms;
use crate::types::ScoredFile;
use scout_code_chunker::split_identifier;
use scout_store::{FileMetadataRecord, FileStatRecord, VocabCluster};
use std::collections::{HashMap, HashSet};

const FILENAME_WEIGHT: f64 = 4.0;
const DIRECTORY_WEIGHT: f64 = 2.0;
const EXPORTS_WEIGHT: f64 = 2.0;
const EXPORT_TOKEN_WEIGHT: f64 = 2.5;
const DOC_WEIGHT: f64 = 1.0;
const SECTIONS_WEIGHT: f64 = 1.0;
const INTERNALS_WEIGHT: f64 = 1.5;

const MIN_TERM_WEIGHT: f64 = 1.0;
const MAX_TERM_WEIGHT: f64 = 10.0;

/// Directory segments (nearest first) that contribute path tokens
const DIRECTORY_SEGMENTS: usize = 3;

/// Everything the ranker reads about a repository
#[derive(Debug, Clone, Copy, Default)]
pub struct RankInput<'a> {
    pub files: &'a [FileMetadataRecord],
    /// Per-file git activity; empty when history was never analyzed
    pub stats: &'a [FileStatRecord],
    pub clusters: &'a [VocabCluster],
    pub indegree: Option<&'a HashMap<String, usize>>,
    pub max_import_depth: Option<u32>,
}

/// Capped ranking plus the scored files that did not make the cut
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub files: Vec<ScoredFile>,
    pub overflow: Vec<ScoredFile>,
    pub file_cap: usize,
}

/// Lowercased, tokenized view of one file's metadata
struct FileFields<'a> {
    record: &'a FileMetadataRecord,
    filename_tokens: HashSet<String>,
    dir_tokens: HashSet<String>,
    exports_text: String,
    export_tokens: HashSet<String>,
    doc_text: String,
    sections_text: String,
    internals_text: String,
}

impl<'a> FileFields<'a> {
    fn new(record: &'a FileMetadataRecord) -> Self {
        let path = record.path.replace('\\', "/");
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let file_name = segments.pop().unwrap_or_default();

        let stem = file_name.split('.').next().unwrap_or(file_name);
        let mut filename_tokens: HashSet<String> = split_identifier(stem).into_iter().collect();
        filename_tokens.insert(stem.to_lowercase());

        let mut dir_tokens = HashSet::new();
        for segment in segments.iter().rev().take(DIRECTORY_SEGMENTS) {
            dir_tokens.insert(segment.to_lowercase());
            dir_tokens.extend(split_identifier(segment));
        }

        let export_tokens = record
            .exports
            .iter()
            .flat_map(|e| split_identifier(e))
            .collect();
        let mut doc_text = record.docstring.to_lowercase();
        if let Some(purpose) = &record.purpose {
            doc_text.push('\n');
            doc_text.push_str(&purpose.to_lowercase());
        }

        Self {
            record,
            filename_tokens,
            dir_tokens,
            exports_text: record.exports.join(" ").to_lowercase(),
            export_tokens,
            doc_text,
            sections_text: record.sections.join(" ").to_lowercase(),
            internals_text: record.internals.join(" ").to_lowercase(),
        }
    }

    /// Field multiplier sum for an exact term
    fn exact_multiplier(&self, term: &str) -> f64 {
        let mut m = 0.0;
        if self.filename_tokens.contains(term) {
            m += FILENAME_WEIGHT;
        }
        if self.dir_tokens.contains(term) {
            m += DIRECTORY_WEIGHT;
        }
        if self.export_tokens.contains(term) {
            m += EXPORT_TOKEN_WEIGHT;
        } else if self.exports_text.contains(term) {
            m += EXPORTS_WEIGHT;
        }
        m + self.content_multiplier(term)
    }

    /// Field multiplier sum for a stem; paths never match stems
    fn stem_multiplier(&self, stem: &str) -> f64 {
        let mut m = 0.0;
        if self.export_tokens.iter().any(|t| t.starts_with(stem)) {
            m += EXPORT_TOKEN_WEIGHT;
        } else if self.exports_text.contains(stem) {
            m += EXPORTS_WEIGHT;
        }
        m + self.content_multiplier(stem)
    }

    fn content_multiplier(&self, needle: &str) -> f64 {
        let mut m = 0.0;
        if self.doc_text.contains(needle) {
            m += DOC_WEIGHT;
        }
        if self.sections_text.contains(needle) {
            m += SECTIONS_WEIGHT;
        }
        if self.internals_text.contains(needle) {
            m += INTERNALS_WEIGHT;
        }
        m
    }
}

/// TF-IDF-style file ranker
pub struct FileRanker<'a> {
    config: &'a ScoringConfig,
    noise: &'a NoiseFilter,
}

impl<'a> FileRanker<'a> {
    pub fn new(config: &'a ScoringConfig, noise: &'a NoiseFilter) -> Self {
        Self { config, noise }
    }

    /// Score every file against `terms`; files scoring zero are dropped.
    /// Highest score first, ties by path.
    pub fn score_files(&self, terms: &QueryTerms, input: &RankInput<'_>) -> Vec<ScoredFile> {
        if terms.is_empty() || input.files.is_empty() {
            return Vec::new();
        }
        let fields: Vec<FileFields<'_>> = input.files.iter().map(FileFields::new).collect();
        let n = fields.len() as f64;

        // (multipliers per file, source term) for every term, exact and stemmed
        let mut columns: Vec<(Vec<f64>, &str)> = Vec::new();
        for term in &terms.exact {
            columns.push((fields.iter().map(|f| f.exact_multiplier(term)).collect(), term));
        }
        for stemmed in &terms.stemmed {
            columns.push((
                fields.iter().map(|f| f.stem_multiplier(&stemmed.stem)).collect(),
                &stemmed.source,
            ));
        }

        let mut raw = vec![0.0_f64; fields.len()];
        let mut matched: Vec<Vec<&str>> = vec![Vec::new(); fields.len()];
        for (multipliers, source) in &columns {
            let df = multipliers.iter().filter(|m| **m > 0.0).count();
            if df == 0 {
                continue;
            }
            let weight = (n / df as f64).ln().clamp(MIN_TERM_WEIGHT, MAX_TERM_WEIGHT);
            for (i, m) in multipliers.iter().enumerate() {
                if *m > 0.0 {
                    raw[i] += m * weight;
                    if !matched[i].contains(source) {
                        matched[i].push(source);
                    }
                }
            }
        }

        let recent: HashMap<&str, u32> = input
            .stats
            .iter()
            .map(|s| (s.path.as_str(), s.recent_commit_count))
            .collect();
        let total_terms = terms.exact.len().max(1) as f64;

        let mut scored: Vec<ScoredFile> = fields
            .iter()
            .zip(raw)
            .zip(matched)
            .filter(|((_, score), _)| *score > 0.0)
            .map(|((file, base), matched)| {
                let path = file.record.path.as_str();
                let mut score = base;

                if matched.len() > 1 {
                    let coverage = (matched.len() as f64 / total_terms).min(1.0);
                    score *= 1.0 + coverage * coverage;
                }

                let exports = file.record.exports.len();
                let threshold = self.config.export_dampen_threshold;
                if exports > threshold {
                    score /= 1.0 + (exports as f64 / threshold as f64).log2() * 0.3;
                }

                if let Some(&count) = recent.get(path) {
                    score += f64::from(count.min(self.config.recent_commit_cap))
                        * self.config.recent_commit_weight;
                }
                if terms.cluster_files.contains(path) {
                    score *= self.config.cluster_member_boost;
                }
                if let Some(&degree) = input.indegree.and_then(|map| map.get(path)) {
                    if degree >= self.config.hub_min_indegree {
                        score *= 1.0 + (degree as f64).log2() * 0.1;
                    }
                }
                if self.noise.is_noise(path) {
                    score *= self.config.noise_factor;
                }

                ScoredFile {
                    path: path.to_string(),
                    score,
                    matched_terms: matched.into_iter().map(String::from).collect(),
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
        scored
    }

    /// Scored files capped by import depth, at most
    /// `siblings_per_group` per sibling group
    pub fn rank(&self, terms: &QueryTerms, input: &RankInput<'_>) -> Ranking {
        let file_cap = self.config.file_cap(input.max_import_depth);
        let mut per_group: HashMap<String, usize> = HashMap::new();
        let mut files = Vec::new();
        let mut overflow = Vec::new();

        for file in self.score_files(terms, input) {
            let group = per_group.entry(sibling_key(&file.path)).or_insert(0);
            if files.len() < file_cap && *group < self.config.siblings_per_group {
                *group += 1;
                files.push(file);
            } else {
                overflow.push(file);
            }
        }

        log::debug!(
            "Ranked {} files (cap {file_cap}, {} overflow)",
            files.len(),
            overflow.len()
        );
        Ranking {
            files,
            overflow,
            file_cap,
        }
    }
}

/// Directory plus the first three dash/dot-separated filename tokens
pub fn sibling_key(path: &str) -> String {
    let path = path.replace('\\', "/");
    let (dir, name) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
    let head: Vec<String> = name
        .split(|c| c == '-' || c == '.')
        .filter(|t| !t.is_empty())
        .take(3)
        .map(str::to_lowercase)
        .collect();
    format!("{dir}/{}", head.join("."))
}
