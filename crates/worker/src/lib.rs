pub mod composer;
pub mod enricher;
pub mod resolver;
pub mod runner;

pub use enricher::DetailEnricher;
pub use resolver::CandidateResolver;
pub use runner::{FulfillmentError, FulfillmentWorker, WorkerSettings};
