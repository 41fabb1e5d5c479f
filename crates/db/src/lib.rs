pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::seed_sample_restaurants;
pub use repositories::{
    DetailsStore, InMemoryDetailsStore, InMemoryLastSearchRepository, InMemorySearchIndex,
    LastSearchRepository, RepositoryError, SearchIndex, SqlDetailsStore, SqlLastSearchRepository,
    SqlRequestQueue, SqlSearchIndex,
};
