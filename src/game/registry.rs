use super::types::{ConnectionId, Identity, PlayerState, Vec3};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
}

/// Live players keyed by connection handle.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<ConnectionId, PlayerState>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        connection: ConnectionId,
        identity: &Identity,
        seed_position: Vec3,
        seed_rotation: Vec3,
    ) -> Result<PlayerState, RegistryError> {
        if self.players.contains_key(&connection) {
            return Err(RegistryError::DuplicateConnection(connection));
        }
        let state = PlayerState {
            connection_handle: connection,
            player_id: identity.player_id.clone(),
            display_name: identity.display_name.clone(),
            position: seed_position,
            rotation: seed_rotation,
        };
        self.players.insert(connection, state.clone());
        Ok(state)
    }

    pub fn unregister(&mut self, connection: ConnectionId) -> Option<PlayerState> {
        self.players.remove(&connection)
    }

    pub fn get(&self, connection: ConnectionId) -> Option<&PlayerState> {
        self.players.get(&connection)
    }

    pub(crate) fn get_mut(&mut self, connection: ConnectionId) -> Option<&mut PlayerState> {
        self.players.get_mut(&connection)
    }

    /// Ordered by connection handle so repeated snapshots are stable.
    pub fn snapshot(&self, excluding: Option<ConnectionId>) -> Vec<PlayerState> {
        let mut players: Vec<PlayerState> = self
            .players
            .values()
            .filter(|player| Some(player.connection_handle) != excluding)
            .cloned()
            .collect();
        players.sort_by_key(|player| player.connection_handle);
        players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
