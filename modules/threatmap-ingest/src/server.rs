use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::broadcast::{EventBroadcaster, Subscription};

#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Arc<EventBroadcaster>,
    pub feeds: Vec<String>,
}

pub fn router(state: AppState, frontend_url: &str) -> Router {
    let cors = match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => {
            warn!(frontend_url, "Invalid FRONTEND_URL, allowing any origin");
            CorsLayer::new().allow_origin(Any)
        }
    }
    .allow_methods(Any)
    .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/live", get(live))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            },
        ))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "feeds": state.feeds,
        "subscribers": state.broadcaster.subscriber_count(),
    }))
}

async fn live(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state.broadcaster))
}

async fn stream_events(socket: WebSocket, broadcaster: Arc<EventBroadcaster>) {
    let Subscription { id, mut receiver } = broadcaster.register();
    let (mut outgoing, mut incoming) = socket.split();

    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else { break };
                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize live event");
                        continue;
                    }
                };
                if outgoing.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    broadcaster.deregister(id);
    debug!(subscriber = %id, "Live connection closed");
}
