use std::sync::Arc;

use rand::seq::SliceRandom;

use dinely_core::domain::restaurant::Candidate;
use dinely_db::repositories::{RepositoryError, SearchIndex};

/// Turns a request's category into a bounded random sample of candidate
/// restaurants. The sample is clamped to the hit count, so a thin category
/// yields fewer suggestions rather than an error.
pub struct CandidateResolver {
    index: Arc<dyn SearchIndex>,
}

impl CandidateResolver {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    pub async fn resolve(
        &self,
        category: &str,
        sample_size: usize,
    ) -> Result<Vec<Candidate>, RepositoryError> {
        let hits = self.index.find_by_category(category).await?;

        let amount = sample_size.min(hits.len());
        let mut rng = rand::thread_rng();
        Ok(hits.choose_multiple(&mut rng, amount).cloned().collect())
    }
}
