use crate::game::types::Identity;
use crate::game::world::World;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Drives one authenticated socket. Inbound frames are only read once the
/// connect sequence has finished, so no action can race ahead of registration.
pub async fn handle_socket(socket: WebSocket, world: Arc<World>, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let Some(connection) = world.connect(identity, tx).await else {
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    let send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        let Ok(message) = result else { break };
        match message {
            Message::Text(text) => {
                world.handle_text_message(connection, &text).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    world.disconnect(connection).await;
    send_task.abort();
}
