use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use dinely_core::domain::restaurant::{Candidate, LastSearch, RestaurantDetail, RestaurantId};

use super::{DetailsStore, LastSearchRepository, RepositoryError, SearchIndex};

/// Scriptable fake: lookups can be made to fail for exercising the
/// redelivery path in worker tests.
#[derive(Default)]
pub struct InMemorySearchIndex {
    candidates: RwLock<HashMap<String, Candidate>>,
    fail_reads: AtomicBool,
}

impl InMemorySearchIndex {
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn find_by_category(&self, category: &str) -> Result<Vec<Candidate>, RepositoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Decode("injected read failure".to_string()));
        }
        let candidates = self.candidates.read().await;
        let mut hits: Vec<Candidate> = candidates
            .values()
            .filter(|candidate| candidate.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect();
        hits.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(hits)
    }

    async fn save(&self, candidate: Candidate) -> Result<(), RepositoryError> {
        let mut candidates = self.candidates.write().await;
        candidates.insert(candidate.id.0.clone(), candidate);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDetailsStore {
    details: RwLock<HashMap<String, RestaurantDetail>>,
    fail_reads: AtomicBool,
}

impl InMemoryDetailsStore {
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DetailsStore for InMemoryDetailsStore {
    async fn find_by_id(
        &self,
        id: &RestaurantId,
    ) -> Result<Option<RestaurantDetail>, RepositoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Decode("injected read failure".to_string()));
        }
        let details = self.details.read().await;
        Ok(details.get(&id.0).cloned())
    }

    async fn save(&self, detail: RestaurantDetail) -> Result<(), RepositoryError> {
        let mut details = self.details.write().await;
        details.insert(detail.id.0.clone(), detail);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLastSearchRepository {
    records: RwLock<HashMap<String, LastSearch>>,
}

#[async_trait::async_trait]
impl LastSearchRepository for InMemoryLastSearchRepository {
    async fn find_by_key(&self, lookup_key: &str) -> Result<Option<LastSearch>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(lookup_key).cloned())
    }

    async fn upsert(&self, record: LastSearch) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(record.lookup_key.clone(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use dinely_core::domain::restaurant::{Candidate, LastSearch, RestaurantDetail, RestaurantId};

    use crate::repositories::{
        DetailsStore, InMemoryDetailsStore, InMemoryLastSearchRepository, InMemorySearchIndex,
        LastSearchRepository, SearchIndex,
    };

    #[tokio::test]
    async fn in_memory_search_index_filters_by_category() {
        let index = InMemorySearchIndex::default();
        index
            .save(Candidate { id: RestaurantId("r-1".to_string()), category: "thai".to_string() })
            .await
            .expect("save r-1");
        index
            .save(Candidate { id: RestaurantId("r-2".to_string()), category: "Thai".to_string() })
            .await
            .expect("save r-2");
        index
            .save(Candidate { id: RestaurantId("r-3".to_string()), category: "korean".to_string() })
            .await
            .expect("save r-3");

        let hits = index.find_by_category("thai").await.expect("find");
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn injected_read_failures_surface_as_repository_errors() {
        let index = InMemorySearchIndex::default();
        index
            .save(Candidate { id: RestaurantId("r-1".to_string()), category: "thai".to_string() })
            .await
            .expect("save r-1");
        index.fail_reads();
        index.find_by_category("thai").await.expect_err("reads are failing");

        let store = InMemoryDetailsStore::default();
        store.fail_reads();
        store
            .find_by_id(&RestaurantId("r-1".to_string()))
            .await
            .expect_err("reads are failing");
    }

    #[tokio::test]
    async fn in_memory_details_store_round_trip() {
        let store = InMemoryDetailsStore::default();
        let detail = RestaurantDetail {
            id: RestaurantId("r-1".to_string()),
            name: "Somtum Der".to_string(),
            location: vec!["85 Avenue A".to_string(), "New York, NY 10009".to_string()],
        };

        store.save(detail.clone()).await.expect("save detail");
        let found = store.find_by_id(&detail.id).await.expect("find detail");
        assert_eq!(found, Some(detail));
    }

    #[tokio::test]
    async fn in_memory_last_search_upsert_overwrites() {
        let repo = InMemoryLastSearchRepository::default();
        let mut record = LastSearch {
            lookup_key: "a@b.com".to_string(),
            area: "Manhattan".to_string(),
            category: "Japanese".to_string(),
            delivery_address: "a@b.com".to_string(),
            searched_at: Utc::now(),
        };

        repo.upsert(record.clone()).await.expect("first upsert");
        record.category = "Thai".to_string();
        repo.upsert(record.clone()).await.expect("second upsert");

        let found = repo.find_by_key("a@b.com").await.expect("find");
        assert_eq!(found.map(|value| value.category), Some("Thai".to_string()));
    }
}
