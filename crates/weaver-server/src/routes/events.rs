//! Server-sent events: a live stream of job state transitions.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/events — one SSE `job` event per persisted job transition.
///
/// Events carry `{ job_id, status, progress }` and are emitted after the
/// transition is written, so a subscriber observes the same ordering a
/// poller of the jobs endpoint would.
pub async fn events(
    State(app): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = app.engine.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        msg.ok().and_then(|event| {
            serde_json::to_string(&event)
                .ok()
                .map(|data| Ok(Event::default().event("job").data(data)))
        })
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
