// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP surface of the fabric.
//!
//! - `POST /v1/dispatch` forwards the JSON body to [`Coordinator::dispatch`].
//!   The acting agent comes from the `x-aegis-agent-id` header and defaults to
//!   `agent:anonymous`.
//! - `GET /v1/events` streams coordination events as Server-Sent Events.
//! - `GET /health` is a liveness probe.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::application::coordinator::{Coordinator, CoordinatorResponse, ErrorBody};
use crate::domain::error::{CoordinationError, ErrorKind};
use crate::domain::ids::AgentId;

pub const AGENT_HEADER: &str = "x-aegis-agent-id";

pub struct AppState {
    pub coordinator: Coordinator,
    pub start_time: Instant,
}

pub fn app(coordinator: Coordinator) -> Router {
    let state = Arc::new(AppState {
        coordinator,
        start_time: Instant::now(),
    });

    Router::new()
        .route("/health", get(health))
        .route("/v1/dispatch", post(dispatch))
        .route("/v1/events", get(stream_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PreconditionFailed => StatusCode::CONFLICT,
        ErrorKind::MalformedInput => StatusCode::BAD_REQUEST,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Result<AgentId, CoordinationError> {
    match headers.get(AGENT_HEADER) {
        None => Ok(AgentId::anonymous()),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| {
                    CoordinationError::malformed(format!("{} is not valid text", AGENT_HEADER))
                })?;
            AgentId::parse(raw)
        }
    }
}

fn rejected(err: &CoordinationError) -> Response {
    let body = CoordinatorResponse::Error {
        message_type: None,
        error: ErrorBody::from(err),
    };
    (status_for(err.kind()), Json(body)).into_response()
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "event_subscribers": state.coordinator.fabric().event_bus.subscriber_count(),
    }))
}

async fn dispatch(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(err) => return rejected(&err),
    };
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            return rejected(&CoordinationError::malformed(format!(
                "request body is not JSON: {}",
                e
            )))
        }
    };

    let response = state.coordinator.dispatch(&actor, message).await;
    let status = match response.error() {
        None => StatusCode::OK,
        Some(error) => status_for(error.kind),
    };
    (status, Json(response)).into_response()
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.coordinator.fabric().event_bus.subscribe_raw();
    let stream = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(event) => Event::default().event(event.kind()).json_data(&event).ok().map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "SSE subscriber lagged behind the event bus");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
