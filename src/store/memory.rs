use super::PlayerStore;
use crate::game::types::SavedPosition;
use anyhow::bail;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

/// In-process store for tests; `failing` makes every call error out and
/// `slow_first_save` stalls the first write.
#[derive(Debug, Default)]
pub(crate) struct MemoryPlayerStore {
    records: StdMutex<HashMap<String, SavedPosition>>,
    failing: AtomicBool,
    first_save_delay: StdMutex<Option<Duration>>,
}

impl MemoryPlayerStore {
    pub(crate) fn with_record(player_id: &str, saved: SavedPosition) -> Self {
        let store = Self::default();
        store
            .records
            .lock()
            .unwrap()
            .insert(player_id.to_string(), saved);
        store
    }

    pub(crate) fn failing() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    pub(crate) fn slow_first_save(delay: Duration) -> Self {
        let store = Self::default();
        *store.first_save_delay.lock().unwrap() = Some(delay);
        store
    }

    pub(crate) fn record(&self, player_id: &str) -> Option<SavedPosition> {
        self.records.lock().unwrap().get(player_id).copied()
    }
}

impl PlayerStore for MemoryPlayerStore {
    async fn load_player(&self, player_id: &str) -> anyhow::Result<Option<SavedPosition>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        Ok(self.record(player_id))
    }

    async fn save_player(&self, player_id: &str, saved: SavedPosition) -> anyhow::Result<()> {
        let delay = self.first_save_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        self.records
            .lock()
            .unwrap()
            .insert(player_id.to_string(), saved);
        Ok(())
    }
}
