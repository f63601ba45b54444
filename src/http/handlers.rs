use super::state::AppState;
use crate::error::{ErrorResponse, RecordError};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

fn status_for(error: &RecordError) -> StatusCode {
    match error {
        RecordError::SessionNotFound(_) | RecordError::TransportNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        RecordError::LayoutUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RecordError::AlreadyRecording(_)
        | RecordError::DuplicateSession(_)
        | RecordError::StartCancelled(_) => StatusCode::CONFLICT,
        RecordError::SessionMismatch { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: RecordError) -> axum::response::Response {
    (status_for(&error), Json(ErrorResponse::from(error))).into_response()
}

/// GET /ws
/// Signaling socket; one session per connection
pub async fn signaling_socket(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let dispatcher = Arc::clone(&state.dispatcher);

    let (session_id, greeting) = match dispatcher.open_session().await {
        Ok(opened) => opened,
        Err(e) => {
            error!("Failed to open session: {}", e);
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    match serde_json::to_string(&greeting) {
        Ok(text) => {
            let _ = tx.send(text);
        }
        Err(e) => error!("Failed to encode greeting for {}: {}", session_id, e),
    }

    info!("Signaling connection open for {}", session_id);

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let dispatcher = Arc::clone(&dispatcher);
                let tx = tx.clone();
                let session_id = session_id.clone();
                tokio::spawn(async move {
                    if let Some(reply) = dispatcher.handle_text(&session_id, &text).await {
                        let _ = tx.send(reply);
                    }
                });
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => debug!("Ignoring non-text frame from {}", session_id),
            Err(e) => {
                warn!("Signaling socket error for {}: {}", session_id, e);
                break;
            }
        }
    }

    info!("Signaling connection closed for {}", session_id);

    dispatcher.close_session(&session_id).await;
    writer.abort();
}

/// GET /sessions/:session_id/status
/// Live counters of one session
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.dispatcher.registry().get(&session_id).await {
        Ok(session) => {
            let stats = session.lock().await.stats();
            (StatusCode::OK, Json(stats)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /recordings/combine
/// Merge the finished recordings into one file
pub async fn combine_recordings(State(state): State<AppState>) -> impl IntoResponse {
    match state.dispatcher.combiner().combine().await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            error!("Combine failed: {}", e);
            error_response(e)
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
