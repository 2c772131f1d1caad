mod sqlite;
mod writer;

#[cfg(test)]
pub(crate) mod memory;

pub use sqlite::SqlitePlayerStore;
pub use writer::StoreWriter;

use crate::game::types::SavedPosition;
use std::future::Future;

/// Durable record of each player's last known transform, keyed by the stable player id.
pub trait PlayerStore: Send + Sync + 'static {
    fn load_player(
        &self,
        player_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<SavedPosition>>> + Send;

    fn save_player(
        &self,
        player_id: &str,
        saved: SavedPosition,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}
