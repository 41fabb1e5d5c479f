use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::domain::intent::Intent;
use crate::domain::request::{RequestError, SuggestionRequest};
use crate::domain::session::{DialogState, Session, SlotName};
use crate::queue::{QueueError, RequestQueue};
use crate::validate::{default_prompt, validate_filled, ValidationOutcome};

const GREETING_PROMPT: &str = "Hi! How can I help you?";
const CLOSING_MESSAGE: &str = "You're welcome, have a great day!";

/// Which hook the caller is invoking: per-turn validation while slots are
/// still being collected, or the one-shot fulfillment step once readiness has
/// been confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogPhase {
    Validation,
    Fulfillment,
}

/// Per-field input from the NLU collaborator. The best-guess value is the
/// first resolved candidate, falling back to the raw transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInput {
    pub raw_input: String,
    #[serde(default)]
    pub resolved_candidates: Vec<String>,
}

impl SlotInput {
    pub fn best_guess(&self) -> &str {
        self.resolved_candidates.first().map(String::as_str).unwrap_or(&self.raw_input)
    }
}

/// Structured turn payload from the NLU collaborator. This core never parses
/// raw utterances; it only sees intent names and per-field candidates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    pub intent: String,
    pub phase: DialogPhase,
    #[serde(default)]
    pub slots: BTreeMap<String, SlotInput>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogAction {
    /// Ask the user for exactly one field, with a corrective or default prompt.
    ElicitSlot { field: SlotName, prompt: String },
    /// Open-ended: ask the user what they want to do.
    ElicitIntent { prompt: String },
    /// Every filled field is valid; the caller drives any remaining
    /// elicitation in its own order.
    Delegate { slots: BTreeMap<SlotName, String> },
    /// The conversation is finished for this intent.
    Close { intent: Intent, fulfilled: bool },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub action: DialogAction,
    pub messages: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DialogError {
    #[error("intent `{0}` is not supported")]
    UnsupportedIntent(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Turn-taking orchestrator. Reads and writes the session's slot store, runs
/// the field validator, and hands completed requests to the queue. It never
/// talks to the search index, details store, or delivery channel; the queue is
/// that boundary.
#[derive(Clone, Debug)]
pub struct DialogManager<C = SystemClock> {
    clock: C,
}

impl Default for DialogManager<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C> DialogManager<C>
where
    C: Clock,
{
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub async fn handle_turn(
        &self,
        session: &mut Session,
        turn: &TurnRequest,
        queue: &dyn RequestQueue,
    ) -> Result<TurnOutcome, DialogError> {
        let intent = Intent::parse(&turn.intent)
            .ok_or_else(|| DialogError::UnsupportedIntent(turn.intent.clone()))?;
        session.switch_intent(intent);

        match intent {
            Intent::Greeting => Ok(TurnOutcome {
                action: DialogAction::ElicitIntent { prompt: GREETING_PROMPT.to_string() },
                messages: vec![GREETING_PROMPT.to_string()],
            }),
            Intent::Closing => {
                session.state = DialogState::Closed;
                Ok(TurnOutcome {
                    action: DialogAction::Close { intent, fulfilled: true },
                    messages: vec![CLOSING_MESSAGE.to_string()],
                })
            }
            Intent::DiningSuggestion => match turn.phase {
                DialogPhase::Validation => Ok(self.validation_turn(session, turn)),
                DialogPhase::Fulfillment => self.fulfillment_turn(session, queue).await,
            },
        }
    }

    fn validation_turn(&self, session: &mut Session, turn: &TurnRequest) -> TurnOutcome {
        for (key, input) in &turn.slots {
            let Some(name) = SlotName::parse(key) else {
                continue;
            };
            let value = input.best_guess().trim();
            if !value.is_empty() {
                session.fill(name, Some(input.raw_input.clone()), value.to_string());
            }
        }

        match validate_filled(&session.filled_values(), &self.clock) {
            ValidationOutcome::Invalid { field, message } => {
                // The violated slot is reset so the conversation cannot proceed
                // with a candidate-but-unvalidated value; it becomes the next
                // elicitation target.
                session.clear(field);
                session.state = DialogState::Eliciting(session.intent);
                let prompt = message.unwrap_or_else(|| default_prompt(field).to_string());
                TurnOutcome {
                    action: DialogAction::ElicitSlot { field, prompt: prompt.clone() },
                    messages: vec![prompt],
                }
            }
            ValidationOutcome::Valid => {
                if session.missing_required().is_empty() {
                    session.state = DialogState::Delegating;
                } else {
                    session.state = DialogState::Eliciting(session.intent);
                }
                TurnOutcome {
                    action: DialogAction::Delegate { slots: session.filled_values() },
                    messages: Vec::new(),
                }
            }
        }
    }

    async fn fulfillment_turn(
        &self,
        session: &mut Session,
        queue: &dyn RequestQueue,
    ) -> Result<TurnOutcome, DialogError> {
        let request = SuggestionRequest::from_slots(&session.filled_values())?;
        queue.enqueue(&request).await?;
        session.state = DialogState::Closed;

        let acknowledgment = format!(
            "You're all set. Expect my suggestions at {} shortly!",
            request.delivery_address
        );
        Ok(TurnOutcome {
            action: DialogAction::Close { intent: session.intent, fulfilled: true },
            messages: vec![acknowledgment],
        })
    }
}
