//! # Scout Graph
//!
//! File-level structure: the import graph and co-change clustering.
//!
//! ```text
//! (source, target) import edges
//!     │
//!     ├──> ImportGraph (petgraph DiGraph<path, ()>)
//!     │      ├─ importers / imports / indegree
//!     │      ├─ 2-hop reverse-dependency chains
//!     │      └─ max depth (condensation + longest path)
//!     │
//! (a, b, count) co-change pairs
//!     │
//!     └──> cochange_clusters (union-find over strong pairs)
//! ```

mod cochange;
mod error;
mod graph;
mod types;

pub use cochange::cochange_clusters;
pub use error::{GraphError, Result};
pub use graph::ImportGraph;
pub use types::ImportChain;
