use super::dispatch::Dispatcher;
use super::movement::MovementRelay;
use super::nodes::{ActOutcome, NodeDefinition, NodeSummary, ResourceNodeTable, RespawnDue};
use super::registry::PlayerRegistry;
use super::session::{Session, SessionPhase};
use super::types::{ConnectionId, Identity, SavedPosition};
use crate::protocol::{self, ClientMessage, ServerMessage};
use crate::store::{PlayerStore, StoreWriter};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct WorldSettings {
    pub persist_interval: Duration,
    pub store_timeout: Duration,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            persist_interval: Duration::from_millis(5_000),
            store_timeout: Duration::from_millis(2_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldStats {
    pub players: usize,
    pub nodes: usize,
    pub depleted_nodes: usize,
}

/// The authoritative world: every event runs to completion under `state`.
///
/// Record store I/O never happens while `state` is held. Seed loads are awaited
/// with a timeout before locking. Saves are queued on the [`StoreWriter`] while
/// `state` is held, so the store sees them in the order the world produced them.
pub struct World {
    state: Mutex<WorldState>,
    writer: StoreWriter,
    settings: WorldSettings,
    respawn_rx: StdMutex<Option<UnboundedReceiver<RespawnDue>>>,
}

struct WorldState {
    sessions: HashMap<ConnectionId, Session>,
    registry: PlayerRegistry,
    nodes: ResourceNodeTable,
    movement: MovementRelay,
    dispatcher: Dispatcher,
}

impl World {
    /// Must be called from within a Tokio runtime; the store writer is spawned here.
    pub fn new<S: PlayerStore>(
        settings: WorldSettings,
        store: Arc<S>,
        definitions: Vec<NodeDefinition>,
    ) -> Arc<Self> {
        let (respawn_tx, respawn_rx) = mpsc::unbounded_channel();
        let mut nodes = ResourceNodeTable::new(respawn_tx);
        nodes.initialize(definitions);
        Arc::new(Self {
            state: Mutex::new(WorldState {
                sessions: HashMap::new(),
                registry: PlayerRegistry::new(),
                nodes,
                movement: MovementRelay::new(),
                dispatcher: Dispatcher::new(),
            }),
            writer: StoreWriter::spawn(store, settings.store_timeout),
            settings,
            respawn_rx: StdMutex::new(Some(respawn_rx)),
        })
    }

    /// Spawns the respawn and position-flush loops. Calling it twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        let Some(respawn_rx) = self
            .respawn_rx
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
        else {
            return;
        };
        tokio::spawn(respawn_loop(Arc::downgrade(self), respawn_rx));
        tokio::spawn(persist_loop(
            Arc::downgrade(self),
            self.settings.persist_interval,
        ));
    }

    /// Runs `Authenticated -> Active` for a connection whose identity already passed the gate.
    pub async fn connect(
        &self,
        identity: Identity,
        outbox: UnboundedSender<String>,
    ) -> Option<ConnectionId> {
        let connection = ConnectionId::new();
        let mut session = Session::authenticated(connection, identity);
        let seed = self.load_seed(&session.identity.player_id).await;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let player = match state.registry.register(
            connection,
            &session.identity,
            seed.position,
            seed.rotation,
        ) {
            Ok(player) => player,
            Err(error) => {
                tracing::error!(%error, "player registration failed");
                return None;
            }
        };
        if let Err(error) = session.advance(SessionPhase::Active) {
            tracing::error!(%error, connection = %connection, "session activation failed");
            state.registry.unregister(connection);
            return None;
        }
        state.dispatcher.attach(connection, outbox);
        state.sessions.insert(session.connection, session);

        state.dispatcher.to_one(
            connection,
            &ServerMessage::Welcome {
                me: player.clone(),
                nodes: state.nodes.snapshot(),
            },
        );
        state.dispatcher.to_one(
            connection,
            &ServerMessage::PlayersSnapshot {
                players: state.registry.snapshot(Some(connection)),
            },
        );
        let total_count = state.registry.len();
        tracing::info!(
            connection = %connection,
            player_id = %player.player_id,
            total_count,
            "player joined"
        );
        state.dispatcher.to_all_except(
            connection,
            &ServerMessage::PlayerJoined {
                player,
                total_count,
            },
        );
        Some(connection)
    }

    pub async fn handle_text_message(&self, connection: ConnectionId, text: &str) {
        let Some(message) = protocol::decode_client_message(text) else {
            tracing::debug!(connection = %connection, "discarding malformed message");
            return;
        };
        self.handle_message(connection, message).await;
    }

    pub async fn handle_message(&self, connection: ConnectionId, message: ClientMessage) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        match message {
            ClientMessage::Move { position, rotation } => {
                if let Some(moved) =
                    state
                        .movement
                        .apply_move(&mut state.registry, connection, position, rotation)
                {
                    state.dispatcher.to_all_except(connection, &moved);
                }
            }
            ClientMessage::NodeAction { node_id } => {
                state.handle_node_action(connection, &node_id);
            }
            ClientMessage::Chat { text } => {
                state.handle_chat(connection, &text);
            }
            ClientMessage::Resync => {
                if state.registry.get(connection).is_none() {
                    return;
                }
                state.dispatcher.to_one(
                    connection,
                    &ServerMessage::PlayersSnapshot {
                        players: state.registry.snapshot(Some(connection)),
                    },
                );
                state.dispatcher.to_one(
                    connection,
                    &ServerMessage::NodesSnapshot {
                        nodes: state.nodes.snapshot(),
                    },
                );
            }
        }
    }

    /// Runs `Active -> Closed`. Safe for connections that never registered.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.dispatcher.detach(connection);
        if let Some(mut session) = state.sessions.remove(&connection) {
            if let Err(error) = session.advance(SessionPhase::Closed) {
                tracing::warn!(%error, connection = %connection, "unexpected session phase on close");
            }
        }

        let Some(player) = state.registry.get(connection).cloned() else {
            tracing::debug!(connection = %connection, "disconnect without a registered player");
            return;
        };
        state.movement.forget(connection);
        self.writer.save(player.player_id.clone(), player.saved_position());
        state.registry.unregister(connection);

        let total_count = state.registry.len();
        tracing::info!(
            connection = %connection,
            player_id = %player.player_id,
            total_count,
            "player left"
        );
        state.dispatcher.to_all(&ServerMessage::PlayerLeft {
            connection_handle: connection,
            total_count,
        });
    }

    pub async fn apply_respawn(&self, due: RespawnDue) {
        let mut state = self.state.lock().await;
        if let Some(summary) = state.nodes.respawn(&due) {
            state.dispatcher.to_all(&ServerMessage::node_update(&summary));
        }
    }

    /// Persists every coalesced move since the previous flush.
    pub async fn flush_positions(&self) {
        let mut state = self.state.lock().await;
        for (player_id, saved) in state.movement.drain_pending() {
            self.writer.save(player_id, saved);
        }
    }

    pub async fn nodes_snapshot(&self) -> Vec<NodeSummary> {
        self.state.lock().await.nodes.snapshot()
    }

    pub async fn stats(&self) -> WorldStats {
        let state = self.state.lock().await;
        WorldStats {
            players: state.registry.len(),
            nodes: state.nodes.len(),
            depleted_nodes: state.nodes.depleted_count(),
        }
    }

    /// Cancels respawn timers, then writes out buffered positions before returning.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock().await;
            state.nodes.shutdown();
            for (player_id, saved) in state.movement.drain_pending() {
                self.writer.save(player_id, saved);
            }
        }
        self.writer.flush().await;
    }

    /// Queued behind any save already issued, so a quick reconnect sees its final position.
    async fn load_seed(&self, player_id: &str) -> SavedPosition {
        match tokio::time::timeout(self.settings.store_timeout, self.writer.load(player_id)).await
        {
            Ok(Ok(Some(saved))) => saved,
            Ok(Ok(None)) => SavedPosition::default(),
            Ok(Err(error)) => {
                tracing::warn!(?error, player_id, "failed to load player, using origin");
                SavedPosition::default()
            }
            Err(_) => {
                tracing::warn!(player_id, "player load timed out, using origin");
                SavedPosition::default()
            }
        }
    }
}

impl WorldState {
    fn handle_node_action(&mut self, connection: ConnectionId, node_id: &str) {
        if self.registry.get(connection).is_none() {
            tracing::debug!(connection = %connection, node_id, "node action from unregistered connection");
            return;
        }
        match self.nodes.act(connection, node_id) {
            ActOutcome::Damaged(summary) => {
                self.dispatcher.to_all(&ServerMessage::node_update(&summary));
            }
            ActOutcome::Depleted { summary, reward } => {
                self.dispatcher.to_one(
                    connection,
                    &ServerMessage::Reward {
                        node_id: reward.node_id,
                        resource: reward.resource,
                        units: reward.units,
                        xp: reward.xp,
                    },
                );
                self.dispatcher.to_all(&ServerMessage::node_update(&summary));
            }
            ActOutcome::Ignored | ActOutcome::UnknownNode => {}
        }
    }

    fn handle_chat(&mut self, connection: ConnectionId, text: &str) {
        let Some(player) = self.registry.get(connection) else { return };
        let Some(text) = protocol::clean_chat_text(text) else { return };
        let message = ServerMessage::Chat {
            connection_handle: connection,
            display_name: player.display_name.clone(),
            text,
        };
        self.dispatcher.to_all_except(connection, &message);
    }
}

async fn respawn_loop(world: Weak<World>, mut rx: UnboundedReceiver<RespawnDue>) {
    while let Some(due) = rx.recv().await {
        let Some(world) = world.upgrade() else { break };
        world.apply_respawn(due).await;
    }
}

async fn persist_loop(world: Weak<World>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(world) = world.upgrade() else { break };
        world.flush_positions().await;
    }
}
