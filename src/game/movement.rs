use super::registry::PlayerRegistry;
use super::types::{ConnectionId, SavedPosition, Vec3};
use crate::protocol::ServerMessage;
use std::collections::HashMap;

/// Applies client-reported transforms and coalesces them for persistence.
///
/// Moves are trusted apart from rejecting non-finite coordinates. Only the most
/// recent transform per connection is kept until the next [`MovementRelay::drain_pending`].
#[derive(Debug, Default)]
pub struct MovementRelay {
    pending: HashMap<ConnectionId, (String, SavedPosition)>,
}

impl MovementRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `playerMoved` message to fan out to everyone but `connection`.
    pub fn apply_move(
        &mut self,
        registry: &mut PlayerRegistry,
        connection: ConnectionId,
        position: Vec3,
        rotation: Vec3,
    ) -> Option<ServerMessage> {
        if !position.is_finite() || !rotation.is_finite() {
            tracing::debug!(connection = %connection, "discarding non-finite move");
            return None;
        }
        let Some(player) = registry.get_mut(connection) else {
            tracing::debug!(connection = %connection, "move from unregistered connection");
            return None;
        };
        player.position = position;
        player.rotation = rotation;
        self.pending.insert(
            connection,
            (player.player_id.clone(), player.saved_position()),
        );

        Some(ServerMessage::PlayerMoved {
            connection_handle: connection,
            player_id: player.player_id.clone(),
            display_name: player.display_name.clone(),
            position,
            rotation,
        })
    }

    /// Drops the buffered save of `connection` once its final save supersedes it.
    pub fn forget(&mut self, connection: ConnectionId) {
        self.pending.remove(&connection);
    }

    pub fn drain_pending(&mut self) -> Vec<(String, SavedPosition)> {
        self.pending.drain().map(|(_, pending)| pending).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
