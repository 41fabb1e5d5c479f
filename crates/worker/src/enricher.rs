use std::sync::Arc;

use tracing::warn;

use dinely_core::domain::restaurant::{Candidate, RestaurantDetail};
use dinely_db::repositories::{DetailsStore, RepositoryError};

/// Point-looks-up each sampled candidate in the details store. A candidate
/// without a detail record is dropped with a warning; the search projection
/// and the details store are loaded by separate jobs and can briefly disagree.
pub struct DetailEnricher {
    store: Arc<dyn DetailsStore>,
}

impl DetailEnricher {
    pub fn new(store: Arc<dyn DetailsStore>) -> Self {
        Self { store }
    }

    pub async fn enrich(
        &self,
        candidates: &[Candidate],
    ) -> Result<Vec<RestaurantDetail>, RepositoryError> {
        let mut details = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.store.find_by_id(&candidate.id).await? {
                Some(detail) => details.push(detail),
                None => {
                    warn!(restaurant_id = %candidate.id.0, "candidate has no detail record");
                }
            }
        }
        Ok(details)
    }
}
