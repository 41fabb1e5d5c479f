pub mod clock;
pub mod config;
pub mod dialog;
pub mod domain;
pub mod queue;
pub mod validate;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dialog::{DialogAction, DialogError, DialogManager, SlotInput, TurnOutcome, TurnRequest};
pub use domain::intent::Intent;
pub use domain::request::SuggestionRequest;
pub use domain::restaurant::{Candidate, LastSearch, RestaurantDetail, RestaurantId};
pub use domain::session::{DialogState, Session, SessionId, Slot, SlotName, SlotValue};
pub use queue::{InMemoryRequestQueue, QueueError, QueueMessage, ReceiptHandle, RequestQueue};
pub use validate::ValidationOutcome;
