use serde::{Deserialize, Serialize};

/// A reverse-dependency path starting at a selected file.
///
/// `path[0]` is the root, `path[1]` imports it, `path[2]` (if any) imports `path[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportChain {
    pub path: Vec<String>,
}

impl ImportChain {
    pub fn root(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or("")
    }

    /// Render as `a <- b <- c`
    pub fn render(&self) -> String {
        self.path.join(" <- ")
    }
}
