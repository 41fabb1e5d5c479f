use async_trait::async_trait;
use thiserror::Error;

use dinely_core::domain::restaurant::{Candidate, LastSearch, RestaurantDetail, RestaurantId};

pub mod details;
pub mod last_search;
pub mod memory;
pub mod queue;
pub mod search_index;

pub use details::SqlDetailsStore;
pub use last_search::SqlLastSearchRepository;
pub use memory::{InMemoryDetailsStore, InMemoryLastSearchRepository, InMemorySearchIndex};
pub use queue::SqlRequestQueue;
pub use search_index::SqlSearchIndex;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Category-keyed search projection over the ingested restaurant corpus.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn find_by_category(&self, category: &str) -> Result<Vec<Candidate>, RepositoryError>;
    async fn save(&self, candidate: Candidate) -> Result<(), RepositoryError>;
}

/// Primary store of display attributes, keyed by the search projection's id.
#[async_trait]
pub trait DetailsStore: Send + Sync {
    async fn find_by_id(&self, id: &RestaurantId)
        -> Result<Option<RestaurantDetail>, RepositoryError>;
    async fn save(&self, detail: RestaurantDetail) -> Result<(), RepositoryError>;
}

/// Most-recent-search record per delivery address, overwritten on every
/// completed request.
#[async_trait]
pub trait LastSearchRepository: Send + Sync {
    async fn find_by_key(&self, lookup_key: &str) -> Result<Option<LastSearch>, RepositoryError>;
    async fn upsert(&self, record: LastSearch) -> Result<(), RepositoryError>;
}
