use super::PlayerStore;
use crate::game::types::SavedPosition;
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

enum StoreRequest {
    Save {
        player_id: String,
        saved: SavedPosition,
    },
    Load {
        player_id: String,
        reply: oneshot::Sender<anyhow::Result<Option<SavedPosition>>>,
    },
    Flush {
        done: oneshot::Sender<()>,
    },
}

/// Funnels every record store call through one task, in the order they were issued.
///
/// A save can never be overtaken by an older one for the same player, and a load
/// observes every save queued before it. Each store call is bounded by `timeout`.
#[derive(Clone)]
pub struct StoreWriter {
    tx: UnboundedSender<StoreRequest>,
}

impl StoreWriter {
    /// Must be called from within a Tokio runtime.
    pub fn spawn<S: PlayerStore>(store: Arc<S>, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(store, timeout, rx));
        Self { tx }
    }

    pub fn save(&self, player_id: String, saved: SavedPosition) {
        if self.tx.send(StoreRequest::Save { player_id, saved }).is_err() {
            tracing::warn!("store writer stopped, dropping save");
        }
    }

    pub async fn load(&self, player_id: &str) -> anyhow::Result<Option<SavedPosition>> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(StoreRequest::Load {
                player_id: player_id.to_string(),
                reply,
            })
            .map_err(|_| anyhow!("store writer stopped"))?;
        response.await.map_err(|_| anyhow!("store writer dropped the load"))?
    }

    /// Resolves once everything queued before it has been written or given up on.
    pub async fn flush(&self) {
        let (done, finished) = oneshot::channel();
        if self.tx.send(StoreRequest::Flush { done }).is_ok() {
            let _ = finished.await;
        }
    }
}

async fn run<S: PlayerStore>(
    store: Arc<S>,
    timeout: Duration,
    mut rx: UnboundedReceiver<StoreRequest>,
) {
    while let Some(request) = rx.recv().await {
        match request {
            StoreRequest::Save { player_id, saved } => {
                match tokio::time::timeout(timeout, store.save_player(&player_id, saved)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        tracing::warn!(?error, player_id = %player_id, "failed to save player position")
                    }
                    Err(_) => tracing::warn!(player_id = %player_id, "player save timed out"),
                }
            }
            StoreRequest::Load { player_id, reply } => {
                let result = tokio::time::timeout(timeout, store.load_player(&player_id))
                    .await
                    .unwrap_or_else(|_| Err(anyhow!("player load timed out")));
                let _ = reply.send(result);
            }
            StoreRequest::Flush { done } => {
                let _ = done.send(());
            }
        }
    }
}
