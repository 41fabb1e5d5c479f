use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use dinely_core::domain::request::SuggestionRequest;
use dinely_core::domain::restaurant::LastSearch;
use dinely_core::queue::{QueueError, QueueMessage, RequestQueue};
use dinely_db::repositories::LastSearchRepository;
use dinely_notify::channel::{ensure_verified, DeliveryChannel, DeliveryError};

use crate::composer;
use crate::enricher::DetailEnricher;
use crate::resolver::CandidateResolver;

const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct WorkerSettings {
    pub batch_size: usize,
    pub poll_wait: Duration,
    pub visibility_timeout: Duration,
    pub sample_size: usize,
    pub call_timeout: Duration,
    pub verification_timeout: Duration,
    pub verification_poll: Duration,
}

impl WorkerSettings {
    pub fn from_config(
        queue: &dinely_core::config::QueueConfig,
        worker: &dinely_core::config::WorkerConfig,
    ) -> Self {
        Self {
            batch_size: queue.batch_size,
            poll_wait: Duration::from_secs(queue.wait_secs),
            visibility_timeout: Duration::from_secs(queue.visibility_timeout_secs),
            sample_size: worker.sample_size,
            call_timeout: Duration::from_secs(worker.call_timeout_secs),
            verification_timeout: Duration::from_secs(worker.verification_timeout_secs),
            verification_poll: Duration::from_secs(worker.verification_poll_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("malformed queue message: {0}")]
    MalformedMessage(String),
    #[error("{stage} failed: {detail}")]
    Transient { stage: &'static str, detail: String },
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Polling consumer of the request queue. Each message runs the
/// resolve/enrich/compose/notify pipeline and is acknowledged only after the
/// send succeeds; everything before that point relies on queue redelivery as
/// the retry mechanism.
pub struct FulfillmentWorker {
    queue: Arc<dyn RequestQueue>,
    resolver: CandidateResolver,
    enricher: DetailEnricher,
    channel: Arc<dyn DeliveryChannel>,
    last_search: Arc<dyn LastSearchRepository>,
    settings: WorkerSettings,
}

impl FulfillmentWorker {
    pub fn new(
        queue: Arc<dyn RequestQueue>,
        resolver: CandidateResolver,
        enricher: DetailEnricher,
        channel: Arc<dyn DeliveryChannel>,
        last_search: Arc<dyn LastSearchRepository>,
        settings: WorkerSettings,
    ) -> Self {
        Self { queue, resolver, enricher, channel, last_search, settings }
    }

    /// Runs forever. Queue errors back off and retry; per-message failures are
    /// logged inside the cycle and never stop the loop.
    pub async fn run(&self) {
        info!(
            batch_size = self.settings.batch_size,
            sample_size = self.settings.sample_size,
            "fulfillment worker started"
        );

        loop {
            if let Err(queue_error) = self.poll_once().await {
                error!(error = %queue_error, "polling cycle failed");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }

    /// One polling cycle: claim a batch and process every message
    /// concurrently. Returns the number of messages fulfilled this cycle.
    pub async fn poll_once(&self) -> Result<usize, QueueError> {
        let batch = self
            .queue
            .receive(self.settings.batch_size, self.settings.visibility_timeout, self.settings.poll_wait)
            .await?;

        if batch.is_empty() {
            return Ok(0);
        }
        debug!(claimed = batch.len(), "claimed queue batch");

        let outcomes = join_all(batch.into_iter().map(|message| async move {
            let message_id = message.message_id.clone();
            let receive_count = message.receive_count;
            (message_id, receive_count, self.process_message(message).await)
        }))
        .await;

        let mut fulfilled = 0;
        for (message_id, receive_count, outcome) in outcomes {
            match outcome {
                Ok(()) => fulfilled += 1,
                Err(fulfillment_error) => {
                    warn!(
                        message_id,
                        receive_count,
                        error = %fulfillment_error,
                        "message left for redelivery"
                    );
                }
            }
        }

        Ok(fulfilled)
    }

    async fn process_message(&self, message: QueueMessage) -> Result<(), FulfillmentError> {
        let request = match SuggestionRequest::from_attributes(&message.attributes) {
            Ok(request) => request,
            Err(decode_error) => {
                // Poison: redelivery cannot fix a malformed payload, so the
                // message is dropped instead of looping forever.
                error!(
                    message_id = message.message_id,
                    error = %decode_error,
                    "dropping undecodable message"
                );
                if let Err(ack_error) = self.queue.acknowledge(&message.receipt_handle).await {
                    warn!(
                        message_id = message.message_id,
                        error = %ack_error,
                        "failed to drop poison message"
                    );
                }
                return Err(FulfillmentError::MalformedMessage(decode_error.to_string()));
            }
        };

        let candidates = tokio::time::timeout(
            self.settings.call_timeout,
            self.resolver.resolve(&request.category, self.settings.sample_size),
        )
        .await
        .map_err(|_| timed_out("resolve"))?
        .map_err(|repo_error| transient("resolve", repo_error))?;

        let suggestions = tokio::time::timeout(
            self.settings.call_timeout,
            self.enricher.enrich(&candidates),
        )
        .await
        .map_err(|_| timed_out("enrich"))?
        .map_err(|repo_error| transient("enrich", repo_error))?;

        let subject = composer::subject(&request);
        let body = composer::body(&request, &suggestions);

        ensure_verified(
            self.channel.as_ref(),
            &request.delivery_address,
            self.settings.verification_timeout,
            self.settings.verification_poll,
        )
        .await?;

        tokio::time::timeout(
            self.settings.call_timeout,
            self.channel.send(&request.delivery_address, &subject, &body),
        )
        .await
        .map_err(|_| timed_out("send"))??;

        // Best effort: a failed bookkeeping write must not force a redelivery
        // and a duplicate email.
        let record = LastSearch {
            lookup_key: request.delivery_address.clone(),
            area: request.area.clone(),
            category: request.category.clone(),
            delivery_address: request.delivery_address.clone(),
            searched_at: Utc::now(),
        };
        if let Err(repo_error) = self.last_search.upsert(record).await {
            warn!(
                delivery_address = request.delivery_address,
                error = %repo_error,
                "last search record was not updated"
            );
        }

        self.queue.acknowledge(&message.receipt_handle).await?;
        info!(
            message_id = message.message_id,
            delivery_address = request.delivery_address,
            suggestions = suggestions.len(),
            "suggestion request fulfilled"
        );
        Ok(())
    }
}

fn timed_out(stage: &'static str) -> FulfillmentError {
    FulfillmentError::Transient { stage, detail: "call timed out".to_string() }
}

fn transient(stage: &'static str, error: impl std::fmt::Display) -> FulfillmentError {
    FulfillmentError::Transient { stage, detail: error.to_string() }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use dinely_core::domain::request::SuggestionRequest;
    use dinely_core::domain::restaurant::{Candidate, RestaurantDetail, RestaurantId};
    use dinely_core::domain::session::SlotName;
    use dinely_core::queue::{InMemoryRequestQueue, QueueMessage, ReceiptHandle, RequestQueue};
    use dinely_db::repositories::{
        DetailsStore, InMemoryDetailsStore, InMemoryLastSearchRepository, InMemorySearchIndex,
        LastSearchRepository, SearchIndex,
    };
    use dinely_notify::channel::InMemoryDeliveryChannel;

    use super::{FulfillmentError, FulfillmentWorker, WorkerSettings};
    use crate::enricher::DetailEnricher;
    use crate::resolver::CandidateResolver;

    struct Harness {
        queue: Arc<InMemoryRequestQueue>,
        index: Arc<InMemorySearchIndex>,
        details: Arc<InMemoryDetailsStore>,
        channel: Arc<InMemoryDeliveryChannel>,
        last_search: Arc<InMemoryLastSearchRepository>,
        worker: FulfillmentWorker,
    }

    fn settings() -> WorkerSettings {
        WorkerSettings {
            batch_size: 10,
            poll_wait: Duration::ZERO,
            visibility_timeout: Duration::from_secs(30),
            sample_size: 5,
            call_timeout: Duration::from_secs(2),
            verification_timeout: Duration::from_millis(50),
            verification_poll: Duration::from_millis(5),
        }
    }

    fn harness() -> Harness {
        let queue = Arc::new(InMemoryRequestQueue::default());
        let index = Arc::new(InMemorySearchIndex::default());
        let details = Arc::new(InMemoryDetailsStore::default());
        let channel = Arc::new(InMemoryDeliveryChannel::default());
        let last_search = Arc::new(InMemoryLastSearchRepository::default());

        let worker = FulfillmentWorker::new(
            queue.clone(),
            CandidateResolver::new(index.clone()),
            DetailEnricher::new(details.clone()),
            channel.clone(),
            last_search.clone(),
            settings(),
        );

        Harness { queue, index, details, channel, last_search, worker }
    }

    fn request() -> SuggestionRequest {
        SuggestionRequest::from_slots(&BTreeMap::from([
            (SlotName::Area, "Manhattan".to_string()),
            (SlotName::Category, "Japanese".to_string()),
            (SlotName::PartySize, "4".to_string()),
            (SlotName::Date, "2026-08-26".to_string()),
            (SlotName::Time, "18:30".to_string()),
            (SlotName::DeliveryAddress, "a@b.com".to_string()),
        ]))
        .expect("complete slots")
    }

    async fn seed_restaurants(harness: &Harness, count: usize, with_details: usize) {
        for i in 0..count {
            let id = RestaurantId(format!("r-{i}"));
            harness
                .index
                .save(Candidate { id: id.clone(), category: "japanese".to_string() })
                .await
                .expect("save candidate");
            if i < with_details {
                harness
                    .details
                    .save(RestaurantDetail {
                        id,
                        name: format!("Restaurant {i}"),
                        location: vec![format!("{i} Main St"), "New York, NY".to_string()],
                    })
                    .await
                    .expect("save detail");
            }
        }
    }

    #[tokio::test]
    async fn a_deep_category_produces_exactly_five_suggestions_and_an_ack() {
        let harness = harness();
        seed_restaurants(&harness, 12, 12).await;
        harness.channel.verify_immediately("a@b.com");
        harness.queue.enqueue(&request()).await.expect("enqueue");

        let fulfilled = harness.worker.poll_once().await.expect("poll");
        assert_eq!(fulfilled, 1);

        let sent = harness.channel.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].address, "a@b.com");
        assert!(sent[0].body.contains("5. "));
        assert!(!sent[0].body.contains("6. "));

        assert_eq!(harness.queue.pending_count(), 0, "fulfilled message is acknowledged");
    }

    #[tokio::test]
    async fn a_failed_send_leaves_the_message_for_redelivery() {
        let harness = harness();
        seed_restaurants(&harness, 3, 3).await;
        harness.channel.verify_immediately("a@b.com");
        harness.channel.fail_sends_to("a@b.com");
        harness.queue.enqueue(&request()).await.expect("enqueue");

        let fulfilled = harness.worker.poll_once().await.expect("poll");
        assert_eq!(fulfilled, 0);
        assert_eq!(harness.queue.pending_count(), 1, "failed message is never acknowledged");
        assert!(harness.channel.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn a_failed_candidate_lookup_leaves_the_message_for_redelivery() {
        let harness = harness();
        seed_restaurants(&harness, 3, 3).await;
        harness.channel.verify_immediately("a@b.com");
        harness.index.fail_reads();
        harness.queue.enqueue(&request()).await.expect("enqueue");

        let fulfilled = harness.worker.poll_once().await.expect("poll");
        assert_eq!(fulfilled, 0);
        assert_eq!(harness.queue.pending_count(), 1, "resolve failure is never acknowledged");
        assert!(harness.channel.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn a_failed_detail_lookup_leaves_the_message_for_redelivery() {
        let harness = harness();
        seed_restaurants(&harness, 3, 3).await;
        harness.channel.verify_immediately("a@b.com");
        harness.details.fail_reads();
        harness.queue.enqueue(&request()).await.expect("enqueue");

        let fulfilled = harness.worker.poll_once().await.expect("poll");
        assert_eq!(fulfilled, 0);
        assert_eq!(harness.queue.pending_count(), 1, "enrich failure is never acknowledged");
        assert!(harness.channel.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn verification_timeout_leaves_the_message_and_sends_nothing() {
        let harness = harness();
        seed_restaurants(&harness, 3, 3).await;
        harness.queue.enqueue(&request()).await.expect("enqueue");

        let fulfilled = harness.worker.poll_once().await.expect("poll");
        assert_eq!(fulfilled, 0);
        assert_eq!(harness.queue.pending_count(), 1);
        assert!(harness.channel.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn an_address_that_verifies_while_polling_gets_its_message() {
        let harness = harness();
        seed_restaurants(&harness, 3, 3).await;
        harness.channel.verify_after_polls("a@b.com", 2);
        harness.queue.enqueue(&request()).await.expect("enqueue");

        let fulfilled = harness.worker.poll_once().await.expect("poll");
        assert_eq!(fulfilled, 1);
        assert_eq!(harness.channel.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn partial_enrichment_composes_what_survived() {
        let harness = harness();
        seed_restaurants(&harness, 3, 2).await;
        harness.channel.verify_immediately("a@b.com");
        harness.queue.enqueue(&request()).await.expect("enqueue");

        let fulfilled = harness.worker.poll_once().await.expect("poll");
        assert_eq!(fulfilled, 1);

        let sent = harness.channel.sent_messages();
        assert!(sent[0].body.contains("2. "));
        assert!(!sent[0].body.contains("3. "));
    }

    #[tokio::test]
    async fn fulfillment_records_the_last_search() {
        let harness = harness();
        seed_restaurants(&harness, 3, 3).await;
        harness.channel.verify_immediately("a@b.com");
        harness.queue.enqueue(&request()).await.expect("enqueue");

        harness.worker.poll_once().await.expect("poll");

        let record = harness
            .last_search
            .find_by_key("a@b.com")
            .await
            .expect("find record")
            .expect("record exists");
        assert_eq!(record.category, "Japanese");
        assert_eq!(record.area, "Manhattan");
    }

    #[tokio::test]
    async fn undecodable_messages_are_dropped_as_poison() {
        let harness = harness();

        let poison = QueueMessage {
            message_id: "poison-1".to_string(),
            receipt_handle: ReceiptHandle("gone".to_string()),
            body: "{}".to_string(),
            attributes: BTreeMap::from([("category".to_string(), "japanese".to_string())]),
            receive_count: 1,
        };

        let error = harness
            .worker
            .process_message(poison)
            .await
            .expect_err("incomplete attributes cannot decode");
        assert!(matches!(error, FulfillmentError::MalformedMessage(_)));
        assert!(harness.channel.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn a_batch_processes_every_message_independently() {
        let harness = harness();
        seed_restaurants(&harness, 6, 6).await;
        harness.channel.verify_immediately("a@b.com");
        harness.channel.verify_immediately("c@d.com");

        harness.queue.enqueue(&request()).await.expect("enqueue first");
        let mut second = request();
        second.delivery_address = "c@d.com".to_string();
        harness.queue.enqueue(&second).await.expect("enqueue second");

        let fulfilled = harness.worker.poll_once().await.expect("poll");
        assert_eq!(fulfilled, 2);
        assert_eq!(harness.channel.sent_messages().len(), 2);
        assert_eq!(harness.queue.pending_count(), 0);
    }
}
