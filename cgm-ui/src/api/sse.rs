//! Live dashboard updates

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;

use cgm_common::sse::event_bus_sse_stream;

use crate::AppState;

/// GET /api/events
///
/// Streams every [`cgm_common::events::CgmEvent`] as JSON, named by its
/// type, plus a periodic heartbeat.
pub async fn event_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_bus_sse_stream(&state.event_bus, "cgm-ui")
}

pub fn sse_routes() -> Router<AppState> {
    Router::new().route("/api/events", get(event_stream))
}
