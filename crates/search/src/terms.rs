use once_cell::sync::Lazy;
use scout_code_chunker::split_identifier;
use scout_store::VocabCluster;
use std::collections::{HashMap, HashSet};

/// Tokens shorter than this are dropped
pub const MIN_TOKEN_LEN: usize = 3;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "from", "into", "onto", "that", "this", "these", "those",
        "are", "was", "were", "been", "being", "has", "have", "had", "does", "did", "doing",
        "can", "could", "should", "would", "will", "shall", "may", "might", "must", "not",
        "but", "all", "any", "each", "some", "such", "its", "our", "your", "their", "there",
        "here", "where", "when", "what", "which", "who", "whom", "why", "how", "than", "then",
        "also", "just", "only", "very", "too", "via", "out", "off", "over", "under", "about",
        "after", "before", "between", "without", "within", "add", "adding", "implement",
        "implementing", "make", "making", "create", "creating", "update", "updating", "change",
        "changing", "fix", "fixing", "need", "needs", "want", "wants", "use", "using", "get",
        "set", "new", "way", "code", "file", "files", "thing", "things", "work", "works",
        "please", "help", "like", "let", "lets", "support",
    ]
    .into_iter()
    .collect()
});

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

const MIN_STEM_LEN: usize = 4;

/// Suffixes removed by [`stem`], longest first
const SUFFIXES: &[&str] = &[
    "ization", "ational", "ation", "ment", "ness", "tion", "sion", "ing", "ers", "ies", "able",
    "ible", "ity", "ize", "ise", "ive", "er", "ed", "es", "ly", "s",
];

/// Light suffix-stripping stemmer; `None` when nothing was stripped.
///
/// The remaining stem keeps at least four characters.
pub fn stem(token: &str) -> Option<String> {
    for suffix in SUFFIXES {
        let Some(base) = token.strip_suffix(suffix) else {
            continue;
        };
        if base.chars().count() < MIN_STEM_LEN {
            continue;
        }
        if *suffix == "s" && (base.ends_with('s') || base.ends_with('u')) {
            // "class", "status"
            continue;
        }
        if *suffix == "ies" {
            return Some(format!("{base}y"));
        }
        return Some(base.to_string());
    }
    None
}

fn stem_or_self(token: &str) -> String {
    stem(token).unwrap_or_else(|| token.to_string())
}

/// Lowercase query tokens: non-alphanumerics (except `_` and `-`) split
/// words, identifiers are also split into parts, stopwords and short
/// tokens are dropped. Order of first appearance, no duplicates.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    let mut push = |token: String| {
        if token.chars().count() >= MIN_TOKEN_LEN && !is_stopword(&token) && seen.insert(token.clone()) {
            tokens.push(token);
        }
    };

    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .map(|w| w.trim_matches(|c| c == '-' || c == '_'))
        .filter(|w| !w.is_empty())
    {
        push(word.to_lowercase());
        let has_inner_upper = word.chars().skip(1).any(char::is_uppercase)
            && word.chars().any(char::is_lowercase);
        if has_inner_upper || word.contains('_') {
            for part in split_identifier(word) {
                push(part);
            }
        }
    }
    tokens
}

/// A stemmed form and the exact term it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemTerm {
    pub stem: String,
    pub source: String,
}

/// Expanded query terms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTerms {
    /// Query tokens, hyphen parts, synonyms and vocab-cluster terms
    pub exact: Vec<String>,
    /// Stems of exact terms that differ from every exact term
    pub stemmed: Vec<StemTerm>,
    /// Files of every vocab cluster the query touched
    pub cluster_files: HashSet<String>,
}

impl QueryTerms {
    /// Terms without stems or clusters, mainly for tests and callers that
    /// supply their own vocabulary
    pub fn exact_only<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut exact: Vec<String> = Vec::new();
        for term in terms {
            let term = term.into();
            if !exact.contains(&term) {
                exact.push(term);
            }
        }
        Self {
            exact,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.stemmed.is_empty()
    }

    fn push_exact(&mut self, term: &str) {
        if term.chars().count() >= MIN_TOKEN_LEN && !self.exact.iter().any(|t| t == term) {
            self.exact.push(term.to_string());
        }
    }
}

/// Query expander with a concept-to-implementation synonym table
pub struct QueryExpander {
    synonyms: HashMap<&'static str, &'static [&'static str]>,
}

impl QueryExpander {
    pub fn new() -> Self {
        let table: &[(&'static str, &'static [&'static str])] = &[
            (
                "auth",
                &[
                    "authentication", "authorization", "login", "session", "token", "jwt",
                    "middleware", "guard", "interceptor", "credential", "oauth",
                ],
            ),
            ("authentication", &["auth", "login", "session", "token", "credential"]),
            ("authorization", &["auth", "permission", "role", "policy", "guard"]),
            ("login", &["auth", "session", "signin", "credential", "password"]),
            ("logout", &["auth", "session", "signout"]),
            ("password", &["hash", "bcrypt", "credential", "reset"]),
            ("session", &["cookie", "token", "auth"]),
            ("cache", &["ttl", "memo", "memoize", "redis", "lru", "invalidate", "expire"]),
            ("api", &["route", "router", "endpoint", "handler", "controller", "request"]),
            ("endpoint", &["route", "router", "handler", "controller"]),
            ("route", &["router", "endpoint", "handler", "controller"]),
            ("database", &["query", "schema", "migration", "model", "repository", "sql"]),
            ("db", &["database", "query", "schema", "migration", "model", "sql"]),
            ("error", &["exception", "failure", "handler", "retry", "fallback"]),
            ("log", &["logger", "logging", "trace", "telemetry"]),
            ("logging", &["logger", "log", "trace", "telemetry"]),
            ("config", &["settings", "env", "options", "configuration"]),
            ("settings", &["config", "preferences", "options"]),
            ("test", &["spec", "fixture", "mock"]),
            ("ui", &["component", "view", "render", "layout"]),
            ("payment", &["billing", "invoice", "stripe", "checkout", "subscription"]),
            ("billing", &["payment", "invoice", "subscription", "plan"]),
            ("notification", &["email", "notify", "push", "webhook"]),
            ("email", &["mail", "smtp", "notification", "template"]),
            ("upload", &["storage", "multipart", "bucket", "blob"]),
            ("search", &["query", "index", "rank", "filter"]),
            ("user", &["account", "profile", "member"]),
            ("permission", &["role", "policy", "access", "acl"]),
            ("queue", &["job", "worker", "task", "schedule"]),
            ("state", &["store", "reducer", "context"]),
            ("validation", &["validator", "schema", "sanitize"]),
            ("validate", &["validator", "schema", "sanitize"]),
            ("deploy", &["docker", "pipeline", "release"]),
            ("rate", &["limit", "throttle", "quota"]),
        ];
        Self {
            synonyms: table.iter().copied().collect(),
        }
    }

    /// Expand `goal` into exact and stemmed terms.
    ///
    /// Steps: tokens, hyphen-split parts, synonyms (looked up by token and by
    /// stem), then vocab clusters. A cluster term equal to an exact term, or
    /// sharing its stem, pulls in the whole cluster and its files.
    pub fn expand(&self, goal: &str, clusters: &[VocabCluster]) -> QueryTerms {
        let mut terms = QueryTerms::default();
        let tokens = tokenize(goal);

        for token in &tokens {
            terms.push_exact(token);
        }
        for token in &tokens {
            if token.contains('-') {
                for part in token.split('-').filter(|p| !is_stopword(p)) {
                    terms.push_exact(part);
                }
            }
        }

        let base: Vec<String> = terms.exact.clone();
        for token in &base {
            let synonyms = self
                .synonyms
                .get(token.as_str())
                .or_else(|| stem(token).and_then(|s| self.synonyms.get(s.as_str())));
            for synonym in synonyms.copied().unwrap_or_default() {
                terms.push_exact(synonym);
            }
        }

        if !clusters.is_empty() {
            let stems: HashSet<String> = terms.exact.iter().map(|t| stem_or_self(t)).collect();
            let exact: HashSet<String> = terms.exact.iter().cloned().collect();
            for cluster in clusters {
                let hit = cluster
                    .terms
                    .iter()
                    .any(|t| exact.contains(t) || stems.contains(&stem_or_self(t)));
                if !hit {
                    continue;
                }
                for term in &cluster.terms {
                    terms.push_exact(term);
                }
                terms.cluster_files.extend(cluster.files.iter().cloned());
            }
        }

        for term in terms.exact.clone() {
            let Some(stemmed) = stem(&term) else {
                continue;
            };
            let taken = terms.exact.contains(&stemmed)
                || terms.stemmed.iter().any(|s| s.stem == stemmed);
            if !taken {
                terms.stemmed.push(StemTerm {
                    stem: stemmed,
                    source: term,
                });
            }
        }

        log::debug!(
            "Expanded '{goal}' into {} exact and {} stemmed terms",
            terms.exact.len(),
            terms.stemmed.len()
        );
        terms
    }
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tokenize_drops_stopwords_and_short_tokens() {
        assert_eq!(tokenize("Add the auth middleware to an API"), vec!["auth", "middleware", "api"]);
        assert_eq!(
            tokenize("fix rate-limit in requestHandler!"),
            vec!["rate-limit", "requesthandler", "request", "handler"]
        );
        assert_eq!(tokenize("user_id"), vec!["user_id", "user"]);
    }

    #[test]
    fn stemmer_strips_common_suffixes() {
        assert_eq!(stem("handling").as_deref(), Some("handl"));
        assert_eq!(stem("validation").as_deref(), Some("valid"));
        assert_eq!(stem("payments").as_deref(), Some("payment"));
        assert_eq!(stem("policies").as_deref(), Some("policy"));
        assert_eq!(stem("class"), None);
        assert_eq!(stem("status"), None);
        assert_eq!(stem("auth"), None);
        assert_eq!(stem("bed"), None);
        assert_eq!(stem("session"), None);
    }

    #[test]
    fn expansion_adds_hyphen_parts_and_synonyms() {
        let terms = QueryExpander::new().expand("add auth rate-limit", &[]);
        assert_eq!(&terms.exact[..3], &["auth", "rate-limit", "rate"]);
        assert!(terms.exact.contains(&"limit".to_string()));
        assert!(terms.exact.contains(&"middleware".to_string()));
        assert!(terms.exact.contains(&"throttle".to_string()));
        assert!(terms.cluster_files.is_empty());
    }

    #[test]
    fn stems_stay_separate_from_exact_terms() {
        let terms = QueryExpander::new().expand("handling payments", &[]);
        assert!(terms.exact.contains(&"handling".to_string()));
        assert!(!terms.exact.contains(&"handl".to_string()));
        assert!(terms.stemmed.contains(&StemTerm {
            stem: "handl".to_string(),
            source: "handling".to_string(),
        }));
        // "payments" has synonyms through its stem
        assert!(terms.exact.contains(&"invoice".to_string()));
        assert!(terms.stemmed.iter().any(|s| s.stem == "payment"));
    }

    #[test]
    fn vocab_clusters_pull_in_terms_and_files() {
        let clusters = vec![
            VocabCluster {
                terms: vec!["invoice".to_string(), "ledger".to_string(), "receipt".to_string()],
                files: vec!["src/billing/ledger.ts".to_string()],
            },
            VocabCluster {
                terms: vec!["avatar".to_string(), "thumbnail".to_string()],
                files: vec!["src/media/avatar.ts".to_string()],
            },
        ];
        let terms = QueryExpander::new().expand("print receipts", &clusters);
        assert!(terms.exact.contains(&"ledger".to_string()));
        assert!(terms.exact.contains(&"invoice".to_string()));
        assert!(!terms.exact.contains(&"avatar".to_string()));
        assert_eq!(
            terms.cluster_files,
            HashSet::from(["src/billing/ledger.ts".to_string()])
        );
    }
}
