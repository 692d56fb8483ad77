//! `GET /mcp/sse`: `connected`, then `server_info`, then a `ping` per heartbeat.

use crate::server::{server_info, AppState};
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::{self, Stream};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

fn ping() -> Event {
    let payload = json!({ "timestamp": chrono::Utc::now().to_rfc3339() });
    Event::default().event("ping").data(payload.to_string())
}

/// The stream ends when axum drops it on client disconnect.
pub async fn handle_sse(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("sse client connected");
    let opening = stream::iter([
        Event::default()
            .event("connected")
            .data(json!({ "status": "connected" }).to_string()),
        Event::default()
            .event("server_info")
            .data(server_info().to_string()),
    ]);
    // First tick fires immediately, so a ping follows server_info at once.
    let pings = IntervalStream::new(tokio::time::interval(state.heartbeat)).map(|_| ping());
    Sse::new(opening.chain(pings).map(Ok::<_, Infallible>))
}
