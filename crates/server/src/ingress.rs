use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use dinely_core::dialog::{DialogError, DialogManager, TurnOutcome, TurnRequest};
use dinely_core::domain::intent::Intent;
use dinely_core::domain::session::{Session, SessionId};
use dinely_core::queue::RequestQueue;

/// Shared state for the turn endpoint. Sessions are in-process only; a
/// restart starts every conversation over, which the dialog model tolerates.
/// Each session carries its own lock; the map lock guards only the lookup.
#[derive(Clone)]
pub struct IngressState {
    dialog: Arc<DialogManager>,
    queue: Arc<dyn RequestQueue>,
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<Session>>>>>,
}

impl IngressState {
    pub fn new(dialog: Arc<DialogManager>, queue: Arc<dyn RequestQueue>) -> Self {
        Self { dialog, queue, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn router(state: IngressState) -> Router {
    Router::new().route("/v1/turn", post(turn)).with_state(state)
}

pub async fn turn(
    State(state): State<IngressState>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnOutcome>, (StatusCode, Json<ErrorBody>)> {
    let session = {
        let mut sessions = state.sessions.write().await;
        sessions
            .entry(request.session_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Session::new(
                    SessionId(request.session_id.clone()),
                    Intent::Greeting,
                )))
            })
            .clone()
    };
    // Only this session's lock is held while the turn runs, so turns for
    // distinct sessions proceed concurrently.
    let mut session = session.lock().await;

    match state.dialog.handle_turn(&mut session, &request, state.queue.as_ref()).await {
        Ok(outcome) => {
            info!(
                event_name = "dialog.turn.handled",
                session_id = request.session_id,
                intent = request.intent,
                "turn handled"
            );
            Ok(Json(outcome))
        }
        Err(DialogError::UnsupportedIntent(intent)) => {
            warn!(
                event_name = "dialog.turn.unsupported_intent",
                session_id = request.session_id,
                intent,
                "unsupported intent"
            );
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorBody { error: format!("intent `{intent}` is not supported") }),
            ))
        }
        Err(DialogError::Queue(queue_error)) => {
            warn!(
                event_name = "dialog.turn.queue_error",
                session_id = request.session_id,
                error = %queue_error,
                "request could not be enqueued"
            );
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody { error: "suggestion request could not be queued".to_string() }),
            ))
        }
        Err(DialogError::Request(request_error)) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody { error: request_error.to_string() }),
        )),
    }
}
