use crate::error::{GraphError, Result};
use crate::types::ImportChain;
use petgraph::algo::{condensation, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

/// Directed file import graph: an edge `a -> b` means `a` imports `b`
pub struct ImportGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build from `(source, target)` pairs; self-edges and duplicates are ignored
    pub fn from_edges<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut graph = Self::new();
        let mut seen = BTreeSet::new();
        for (source, target) in edges {
            if source == target || !seen.insert((source, target)) {
                continue;
            }
            let a = graph.node(source);
            let b = graph.node(target);
            graph.graph.add_edge(a, b, ());
        }
        graph
    }

    fn node(&mut self, path: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(path) {
            return idx;
        }
        let idx = self.graph.add_node(path.to_string());
        self.index.insert(path.to_string(), idx);
        idx
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn neighbors(&self, path: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.index.get(path) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Files that import `path` (reverse imports), sorted
    pub fn importers(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Incoming)
    }

    /// Files `path` imports (forward imports), sorted
    pub fn imports(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Like [`ImportGraph::importers`] but a path absent from the graph is an error
    pub fn require_importers(&self, path: &str) -> Result<Vec<String>> {
        if !self.contains(path) {
            return Err(GraphError::NodeNotFound(path.to_string()));
        }
        Ok(self.importers(path))
    }

    /// Number of files importing each path
    pub fn indegree_map(&self) -> HashMap<String, usize> {
        self.graph
            .node_indices()
            .map(|idx| {
                let count = self
                    .graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count();
                (self.graph[idx].clone(), count)
            })
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Longest import chain, in edges.
    ///
    /// Cycles are collapsed to a single node first, so a cycle counts as one hop.
    pub fn max_depth(&self) -> Result<u32> {
        if self.graph.edge_count() == 0 {
            return Ok(0);
        }
        let condensed = condensation(self.graph.clone(), true);
        let order = toposort(&condensed, None).map_err(|cycle| {
            let members = condensed[cycle.node_id()].join(", ");
            GraphError::Cycle(members)
        })?;

        let mut depth: HashMap<NodeIndex, u32> = HashMap::new();
        let mut max = 0;
        for node in order {
            let here = depth.get(&node).copied().unwrap_or(0);
            max = max.max(here);
            for next in condensed.neighbors_directed(node, Direction::Outgoing) {
                let entry = depth.entry(next).or_insert(0);
                *entry = (*entry).max(here + 1);
            }
        }
        log::debug!("import graph depth {max} over {} files", self.node_count());
        Ok(max)
    }

    /// Two-hop reverse-dependency chains rooted at each of `roots`.
    ///
    /// For every importer `i` of a root, emits `[root, i, j]` for each importer
    /// `j` of `i`, or `[root, i]` when `i` has no importers. At most
    /// `per_root` chains per root.
    pub fn reverse_chains(&self, roots: &[String], per_root: usize) -> Vec<ImportChain> {
        let mut chains = Vec::new();
        for root in roots {
            let mut emitted = 0;
            'importers: for importer in self.importers(root) {
                let second: Vec<String> = self
                    .importers(&importer)
                    .into_iter()
                    .filter(|p| p != root && p != &importer)
                    .collect();
                if second.is_empty() {
                    if emitted >= per_root {
                        break;
                    }
                    chains.push(ImportChain {
                        path: vec![root.clone(), importer.clone()],
                    });
                    emitted += 1;
                    continue;
                }
                for upstream in second {
                    if emitted >= per_root {
                        break 'importers;
                    }
                    chains.push(ImportChain {
                        path: vec![root.clone(), importer.clone(), upstream],
                    });
                    emitted += 1;
                }
            }
        }
        chains
    }
}

impl Default for ImportGraph {
    fn default() -> Self {
        Self::new()
    }
}
