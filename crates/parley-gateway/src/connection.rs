use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_types::events::GatewayCommand;

use crate::dispatcher::Dispatcher;

/// Drive a single WebSocket client until it hangs up. The connection starts
/// anonymous; it only enters the presence registry once the client sends a
/// userOnline announce.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher) {
    let conn_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    info!("gateway connection {} established", conn_id);

    let mut broadcast_rx = dispatcher.subscribe();

    // Forward broadcasts -> client, skipping events this connection originated
    // where the event says so.
    let mut send_task = tokio::spawn(async move {
        loop {
            let outbound = match broadcast_rx.recv().await {
                Ok(outbound) => outbound,
                Err(RecvError::Lagged(n)) => {
                    warn!("connection {} lagged by {} events", conn_id, n);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if outbound.exclude == Some(conn_id) {
                continue;
            }

            let text = match serde_json::to_string(&outbound.event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("could not serialize gateway event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Read commands from the client.
    let dispatcher_recv = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&dispatcher_recv, conn_id, cmd).await,
                    Err(e) => {
                        warn!(
                            "connection {} bad command: {} -- raw: {}",
                            conn_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either side to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.disconnect(conn_id).await;
    info!("gateway connection {} closed", conn_id);
}

async fn handle_command(dispatcher: &Dispatcher, conn_id: Uuid, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::UserOnline { username } => {
            if dispatcher.announce(&username, conn_id).await {
                debug!("{} announced on connection {}", username, conn_id);
            } else {
                // registry full: the client gets no reply either way
                debug!("announce from {} dropped, registry full", username);
            }
        }

        GatewayCommand::UserTyping { username } => {
            dispatcher.typing(conn_id, username);
        }
    }
}
