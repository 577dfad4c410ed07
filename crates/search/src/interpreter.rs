use crate::config::ScoringConfig;
use crate::error::Result;
use crate::noise::NoiseFilter;
use crate::query_classifier::{ParsedQuery, QueryClassifier};
use crate::scoring::{FileRanker, RankInput, Ranking};
use crate::terms::{QueryExpander, QueryTerms};

/// What a goal means for one repository
#[derive(Debug, Clone)]
pub struct Interpretation {
    pub query: ParsedQuery,
    pub terms: QueryTerms,
    pub ranking: Ranking,
}

/// Turns a free-form goal into a capped file ranking
pub struct QueryInterpreter {
    expander: QueryExpander,
    config: ScoringConfig,
    noise: NoiseFilter,
}

impl QueryInterpreter {
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        let noise = NoiseFilter::new(&config.noise_patterns)?;
        Ok(Self {
            expander: QueryExpander::new(),
            config,
            noise,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn noise(&self) -> &NoiseFilter {
        &self.noise
    }

    pub fn interpret(&self, goal: &str, input: &RankInput<'_>) -> Interpretation {
        let query = QueryClassifier::parse(goal);
        let terms = self.expander.expand(goal, input.clusters);
        let ranking = FileRanker::new(&self.config, &self.noise).rank(&terms, input);
        log::debug!(
            "Interpreted {:?} goal: {} exact terms, {} stems, {} files",
            query.kind,
            terms.exact.len(),
            terms.stemmed.len(),
            ranking.files.len()
        );
        Interpretation {
            query,
            terms,
            ranking,
        }
    }
}
