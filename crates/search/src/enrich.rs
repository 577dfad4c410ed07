use crate::config::EnrichmentConfig;
use crate::noise::NoiseFilter;
use crate::types::{ContextFile, FileOrigin};
use scout_graph::{cochange_clusters, ImportChain, ImportGraph};
use scout_store::CochangeRecord;
use scout_vector_store::VectorHit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Keyword score given to semantic hits when nothing was keyword-ranked
const SEMANTIC_SCALE_FALLBACK: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CochangePartner {
    pub path: String,
    pub count: u32,
}

/// Structural evidence around the selected files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Selected file -> files importing it
    pub importers: BTreeMap<String, Vec<String>>,
    /// Selected file -> files it imports
    pub imports: BTreeMap<String, Vec<String>>,
    /// Two-hop reverse-dependency chains from the top files
    pub chains: Vec<ImportChain>,
    /// Selected file -> strongest co-change partners
    pub partners: BTreeMap<String, Vec<CochangePartner>>,
}

impl Enrichment {
    pub fn importers_of(&self, path: &str) -> &[String] {
        self.importers.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn imports_of(&self, path: &str) -> &[String] {
        self.imports.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn partners_of(&self, path: &str) -> &[CochangePartner] {
        self.partners.get(path).map(Vec::as_slice).unwrap_or_default()
    }
}

pub fn enrich(
    files: &[ContextFile],
    graph: &ImportGraph,
    cochanges: &[CochangeRecord],
    config: &EnrichmentConfig,
) -> Enrichment {
    let mut enrichment = Enrichment::default();
    for file in files {
        let importers = graph.importers(&file.path);
        if !importers.is_empty() {
            enrichment.importers.insert(file.path.clone(), importers);
        }
        let imports = graph.imports(&file.path);
        if !imports.is_empty() {
            enrichment.imports.insert(file.path.clone(), imports);
        }

        let mut partners: Vec<CochangePartner> = cochanges
            .iter()
            .filter_map(|record| {
                record.partner_of(&file.path).map(|partner| CochangePartner {
                    path: partner.to_string(),
                    count: record.count,
                })
            })
            .collect();
        partners.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.path.cmp(&b.path)));
        partners.truncate(config.partners_per_file);
        if !partners.is_empty() {
            enrichment.partners.insert(file.path.clone(), partners);
        }
    }

    let roots: Vec<String> = files
        .iter()
        .take(config.chain_roots)
        .map(|f| f.path.clone())
        .collect();
    enrichment.chains = graph.reverse_chains(&roots, config.chains_per_root);
    enrichment
}

/// Promote up to `limit` unselected files with the highest co-change count
/// against a selected file. Each promoted file is placed right after its
/// partner. Returns the number promoted.
pub fn promote_cochange_partners(
    files: &mut Vec<ContextFile>,
    cochanges: &[CochangeRecord],
    noise: &NoiseFilter,
    limit: usize,
) -> usize {
    if limit == 0 {
        return 0;
    }
    let selected: HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
    let mut best: HashMap<&str, (u32, &str)> = HashMap::new();
    for record in cochanges {
        for (anchor, candidate) in [
            (record.path_a.as_str(), record.path_b.as_str()),
            (record.path_b.as_str(), record.path_a.as_str()),
        ] {
            if !selected.contains(anchor) || selected.contains(candidate) || noise.is_noise(candidate) {
                continue;
            }
            let entry = best.entry(candidate).or_insert((0, anchor));
            if record.count > entry.0 {
                *entry = (record.count, anchor);
            }
        }
    }

    let mut ranked: Vec<(&str, u32, &str)> = best
        .into_iter()
        .map(|(candidate, (count, anchor))| (candidate, count, anchor))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(limit);
    let promotions: Vec<(String, String)> = ranked
        .into_iter()
        .map(|(candidate, _, anchor)| (candidate.to_string(), anchor.to_string()))
        .collect();

    for (candidate, anchor) in &promotions {
        let mut at = files
            .iter()
            .position(|f| &f.path == anchor)
            .map_or(files.len(), |i| i + 1);
        while files.get(at).is_some_and(|f| f.origin == FileOrigin::Cochange) {
            at += 1;
        }
        files.insert(at, ContextFile::promoted(candidate.clone(), FileOrigin::Cochange));
    }
    if !promotions.is_empty() {
        log::debug!("Promoted {} co-change partners", promotions.len());
    }
    promotions.len()
}

/// Promote members of strong co-change clusters touching the selection.
///
/// Clusters are built over the selected files, `candidates` and the direct
/// partners of selected files, joining pairs with `count >= min_count`.
/// Members are appended until `cap` files are selected. Returns the number
/// promoted.
pub fn promote_cochange_clusters(
    files: &mut Vec<ContextFile>,
    candidates: &[String],
    cochanges: &[CochangeRecord],
    noise: &NoiseFilter,
    min_count: u32,
    cap: usize,
) -> usize {
    if files.len() >= cap {
        return 0;
    }
    let mut selected: HashSet<String> = files.iter().map(|f| f.path.clone()).collect();
    let strong: Vec<&CochangeRecord> = cochanges.iter().filter(|r| r.count >= min_count).collect();
    if strong.is_empty() {
        return 0;
    }

    let mut universe: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
    universe.extend(candidates.iter().cloned());
    for record in &strong {
        if selected.contains(&record.path_a) {
            universe.push(record.path_b.clone());
        }
        if selected.contains(&record.path_b) {
            universe.push(record.path_a.clone());
        }
    }
    let mut seen = HashSet::new();
    universe.retain(|p| seen.insert(p.clone()));

    let pairs: Vec<(String, String, u32)> = strong
        .iter()
        .map(|r| (r.path_a.clone(), r.path_b.clone(), r.count))
        .collect();

    let mut promoted = 0;
    'clusters: for cluster in cochange_clusters(&universe, &pairs, min_count) {
        if !cluster.iter().any(|member| selected.contains(member)) {
            continue;
        }
        for member in cluster {
            if files.len() >= cap {
                break 'clusters;
            }
            if selected.contains(&member) || noise.is_noise(&member) {
                continue;
            }
            selected.insert(member.clone());
            files.push(ContextFile::promoted(member, FileOrigin::Cluster));
            promoted += 1;
        }
    }
    if promoted > 0 {
        log::debug!("Promoted {promoted} co-change cluster members");
    }
    promoted
}

/// Merge up to `limit` semantic hits not already selected.
///
/// Cosine similarity is scaled by the best keyword score so both live on one
/// scale. A hit is appended while there is room under `cap`; otherwise it
/// replaces the lowest-scored file when it scores higher. Returns the
/// number merged.
pub fn merge_semantic_hits(
    files: &mut Vec<ContextFile>,
    hits: &[VectorHit],
    limit: usize,
    cap: usize,
) -> usize {
    let scale = files
        .iter()
        .filter_map(|f| f.score)
        .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
        .unwrap_or(SEMANTIC_SCALE_FALLBACK);

    let mut merged = 0;
    for hit in hits {
        if merged >= limit {
            break;
        }
        if files.iter().any(|f| f.path == hit.path) {
            continue;
        }
        let score = f64::from(hit.score.max(0.0)) * scale;
        if files.len() >= cap {
            let lowest = files
                .iter()
                .enumerate()
                .filter_map(|(i, f)| f.score.map(|s| (i, s)))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            match lowest {
                Some((i, s)) if s < score => {
                    files.remove(i);
                }
                _ => continue,
            }
        }
        let at = files
            .iter()
            .position(|f| f.score.is_some_and(|s| s < score))
            .unwrap_or(files.len());
        files.insert(
            at,
            ContextFile {
                path: hit.path.clone(),
                score: Some(score),
                origin: FileOrigin::Semantic,
            },
        );
        merged += 1;
    }
    merged
}
