use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use tracing::error;

use parley_db::StoreError;
use parley_types::api::{ApiFailure, MessageRecord, SendMessageRequest, SendMessageResponse};
use parley_types::events::GatewayEvent;

use crate::auth::{AppState, AppStateInner};

pub async fn get_messages(State(state): State<AppState>) -> Response {
    match fetch_history(&state).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!("history fetch failed: {}", e);
            Json(ApiFailure::server_error()).into_response()
        }
    }
}

/// Whole history, oldest first, no pagination.
pub async fn fetch_history(state: &AppStateInner) -> Result<Vec<MessageRecord>, StoreError> {
    let rows = state.store.list_messages().await?;
    Ok(rows
        .into_iter()
        .map(|row| MessageRecord {
            id: row.id,
            sender: row.sender,
            message: row.message,
            timestamp: row.timestamp,
        })
        .collect())
}

pub async fn post_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Json<SendMessageResponse> {
    Json(send_message(&state, req).await)
}

/// Persist, then push to every connected client. The broadcast reads its own
/// clock, so its timestamp can differ by a tick from the stored one; the two
/// steps are not atomic either, a broadcast only happens after a successful
/// insert.
pub async fn send_message(state: &AppStateInner, req: SendMessageRequest) -> SendMessageResponse {
    if let Err(e) = state.store.insert_message(&req.sender, &req.message).await {
        error!("message insert failed: {}", e);
        return SendMessageResponse { success: false };
    }

    state.dispatcher.broadcast(GatewayEvent::NewMessage {
        sender: req.sender,
        message: req.message,
        timestamp: chrono::Utc::now(),
    });

    SendMessageResponse { success: true }
}
