//! The realtime channel: one WebSocket per client. Outbound traffic is a
//! fan-out of the relay's broadcast channel; inbound frames are query
//! commands. There is no per-connection state to clean up on disconnect.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::AppState;
use crate::domain::messages::ClientCommand;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    tracing::info!("New connection {conn_id}");

    let (mut sender, mut receiver) = socket.split();
    let mut outbound = state.outbound.subscribe();

    // Forward broadcasts until the client goes away or the relay stops.
    let forward = tokio::spawn(async move {
        loop {
            match outbound.recv().await {
                Ok(envelope) => match serde_json::to_string(&envelope) {
                    Ok(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::error!("failed to serialize broadcast: {err}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    // Slow client; it loses messages, nobody else waits.
                    tracing::warn!("client {conn_id} lagged behind, skipped {skipped} broadcasts");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(text.as_str())
            {
                Ok(command) => apply_command(&state, conn_id, command),
                Err(err) => {
                    tracing::warn!("client {conn_id} sent malformed command, ignoring: {err}");
                }
            },
            Ok(Message::Close(_)) => break,
            Err(err) => {
                tracing::warn!("websocket error on {conn_id}: {err}");
                break;
            }
            _ => {}
        }
    }

    forward.abort();
    tracing::info!("client {conn_id} disconnected");
}

fn apply_command(state: &AppState, conn_id: Uuid, command: ClientCommand) {
    match command {
        ClientCommand::SetQuery { data } => {
            tracing::info!("set-query from {conn_id}: {:?}", data.query);
            state.store.set(data.query);
        }
        ClientCommand::SetAllQuery => {
            tracing::info!("set-all-query from {conn_id}");
            state.store.set_all();
        }
    }
}
