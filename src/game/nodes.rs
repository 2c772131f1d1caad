use super::types::{ConnectionId, GroundPoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Tree,
    Rock,
}

/// Per-kind tuning shared by every node of that kind unless a definition overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeKindConfig {
    pub max_health: u32,
    pub damage_per_action: u32,
    pub reward_units: u32,
    pub reward_xp: u32,
    pub respawn_delay: Duration,
    pub resource: &'static str,
}

impl NodeKind {
    pub fn config(self) -> NodeKindConfig {
        match self {
            NodeKind::Tree => NodeKindConfig {
                max_health: 100,
                damage_per_action: 20,
                reward_units: 1,
                reward_xp: 25,
                respawn_delay: Duration::from_millis(30_000),
                resource: "wood",
            },
            NodeKind::Rock => NodeKindConfig {
                max_health: 150,
                damage_per_action: 25,
                reward_units: 1,
                reward_xp: 35,
                respawn_delay: Duration::from_millis(45_000),
                resource: "stone",
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinitionFile {
    pub id: String,
    pub kind: NodeKind,
    pub x: f64,
    pub z: f64,
    #[serde(default)]
    pub max_health: Option<u32>,
    #[serde(default)]
    pub damage_per_action: Option<u32>,
    #[serde(default)]
    pub reward_units: Option<u32>,
    #[serde(default)]
    pub reward_xp: Option<u32>,
    #[serde(default)]
    pub respawn_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDefinition {
    pub id: String,
    pub kind: NodeKind,
    pub position: GroundPoint,
    pub max_health: u32,
    pub damage_per_action: u32,
    pub reward_units: u32,
    pub reward_xp: u32,
    pub respawn_delay: Duration,
}

impl NodeDefinition {
    pub fn from_kind(id: impl Into<String>, kind: NodeKind, position: GroundPoint) -> Self {
        let config = kind.config();
        Self {
            id: id.into(),
            kind,
            position,
            max_health: config.max_health,
            damage_per_action: config.damage_per_action,
            reward_units: config.reward_units,
            reward_xp: config.reward_xp,
            respawn_delay: config.respawn_delay,
        }
    }
}

impl From<NodeDefinitionFile> for NodeDefinition {
    fn from(file: NodeDefinitionFile) -> Self {
        let base = NodeDefinition::from_kind(file.id, file.kind, GroundPoint { x: file.x, z: file.z });
        NodeDefinition {
            max_health: file.max_health.unwrap_or(base.max_health).max(1),
            damage_per_action: file
                .damage_per_action
                .unwrap_or(base.damage_per_action)
                .max(1),
            reward_units: file.reward_units.unwrap_or(base.reward_units),
            reward_xp: file.reward_xp.unwrap_or(base.reward_xp),
            respawn_delay: file
                .respawn_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(base.respawn_delay),
            ..base
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub id: String,
    pub kind: NodeKind,
    pub position: GroundPoint,
    pub health: u32,
    pub max_health: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reward {
    pub node_id: String,
    pub resource: &'static str,
    pub units: u32,
    pub xp: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActOutcome {
    UnknownNode,
    /// Node is depleted or the table is shut down.
    Ignored,
    Damaged(NodeSummary),
    Depleted { summary: NodeSummary, reward: Reward },
}

/// Posted by a respawn timer once its deadline passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespawnDue {
    pub node_id: String,
    pub generation: u64,
}

#[derive(Debug)]
struct RespawnTimer {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Debug)]
enum NodeLife {
    Alive,
    Depleted { timer: Option<RespawnTimer> },
}

#[derive(Debug)]
struct ResourceNode {
    def: NodeDefinition,
    health: u32,
    life: NodeLife,
}

impl ResourceNode {
    fn is_alive(&self) -> bool {
        matches!(self.life, NodeLife::Alive)
    }

    fn summary(&self) -> NodeSummary {
        NodeSummary {
            id: self.def.id.clone(),
            kind: self.def.kind,
            position: self.def.position,
            health: self.health,
            max_health: self.def.max_health,
            alive: self.is_alive(),
        }
    }
}

/// Owns every resource node and its respawn timer.
///
/// Timers run as spawned tasks that sleep until a deadline fixed when they were
/// armed, then post [`RespawnDue`] on the channel handed to [`ResourceNodeTable::new`].
/// Whoever drains that channel applies the respawn through [`ResourceNodeTable::respawn`],
/// which ignores any message whose generation no longer matches the armed timer.
#[derive(Debug)]
pub struct ResourceNodeTable {
    nodes: BTreeMap<String, ResourceNode>,
    respawn_tx: UnboundedSender<RespawnDue>,
    next_generation: u64,
    closed: bool,
}

impl ResourceNodeTable {
    pub fn new(respawn_tx: UnboundedSender<RespawnDue>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            respawn_tx,
            next_generation: 1,
            closed: false,
        }
    }

    pub fn initialize(&mut self, definitions: impl IntoIterator<Item = NodeDefinition>) {
        for def in definitions {
            if def.max_health == 0 {
                tracing::warn!(node_id = %def.id, "skipping node with zero max health");
                continue;
            }
            if self.nodes.contains_key(&def.id) {
                tracing::warn!(node_id = %def.id, "duplicate node id, keeping the first definition");
                continue;
            }
            let node = ResourceNode {
                health: def.max_health,
                life: NodeLife::Alive,
                def,
            };
            self.nodes.insert(node.def.id.clone(), node);
        }
        tracing::info!(nodes = self.nodes.len(), "resource node table initialized");
    }

    /// Health check, damage, reward and timer arming happen in this one call, so
    /// a second action against a node it just depleted always sees `Depleted`.
    pub fn act(&mut self, actor: ConnectionId, node_id: &str) -> ActOutcome {
        if self.closed {
            return ActOutcome::Ignored;
        }
        let Some(node) = self.nodes.get_mut(node_id) else {
            tracing::debug!(connection = %actor, node_id, "action on unknown node");
            return ActOutcome::UnknownNode;
        };
        if !node.is_alive() {
            return ActOutcome::Ignored;
        }

        node.health = node.health.saturating_sub(node.def.damage_per_action);
        if node.health > 0 {
            return ActOutcome::Damaged(node.summary());
        }

        node.life = NodeLife::Depleted { timer: None };
        let reward = Reward {
            node_id: node.def.id.clone(),
            resource: node.def.kind.config().resource,
            units: node.def.reward_units,
            xp: node.def.reward_xp,
        };
        tracing::debug!(connection = %actor, node_id, "node depleted");
        self.arm_respawn(node_id);

        match self.nodes.get(node_id) {
            Some(node) => ActOutcome::Depleted {
                summary: node.summary(),
                reward,
            },
            None => ActOutcome::UnknownNode,
        }
    }

    fn arm_respawn(&mut self, node_id: &str) {
        let generation = self.next_generation;
        let Some(node) = self.nodes.get_mut(node_id) else { return };
        let NodeLife::Depleted { timer } = &mut node.life else {
            tracing::warn!(node_id, "refusing to arm respawn on a live node");
            return;
        };
        if let Some(previous) = timer.take() {
            tracing::warn!(
                node_id,
                previous = previous.generation,
                "respawn already armed, replacing it"
            );
            previous.handle.abort();
        }

        self.next_generation += 1;
        let deadline = Instant::now() + node.def.respawn_delay;
        let tx = self.respawn_tx.clone();
        let due = RespawnDue {
            node_id: node_id.to_string(),
            generation,
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(due);
        })
        .abort_handle();
        *timer = Some(RespawnTimer { generation, handle });
    }

    /// Applies a fired timer. Returns the fresh summary when the node came back.
    pub fn respawn(&mut self, due: &RespawnDue) -> Option<NodeSummary> {
        if self.closed {
            return None;
        }
        let Some(node) = self.nodes.get_mut(&due.node_id) else {
            tracing::debug!(node_id = %due.node_id, "respawn for unknown node");
            return None;
        };
        match &node.life {
            NodeLife::Depleted {
                timer: Some(timer),
            } if timer.generation == due.generation => {}
            _ => {
                tracing::debug!(
                    node_id = %due.node_id,
                    generation = due.generation,
                    "ignoring stale respawn"
                );
                return None;
            }
        }
        node.health = node.def.max_health;
        node.life = NodeLife::Alive;
        tracing::debug!(node_id = %due.node_id, "node respawned");
        Some(node.summary())
    }

    pub fn snapshot(&self) -> Vec<NodeSummary> {
        self.nodes.values().map(ResourceNode::summary).collect()
    }

    pub fn get(&self, node_id: &str) -> Option<NodeSummary> {
        self.nodes.get(node_id).map(ResourceNode::summary)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn depleted_count(&self) -> usize {
        self.nodes.values().filter(|node| !node.is_alive()).count()
    }

    /// Cancels every pending respawn; the table ignores all later actions.
    pub fn shutdown(&mut self) {
        self.closed = true;
        let mut cancelled = 0usize;
        for node in self.nodes.values_mut() {
            if let NodeLife::Depleted { timer } = &mut node.life {
                if let Some(timer) = timer.take() {
                    timer.handle.abort();
                    cancelled += 1;
                }
            }
        }
        tracing::info!(cancelled, "resource node table shut down");
    }
}

pub fn load_node_definitions(json: &str) -> anyhow::Result<Vec<NodeDefinition>> {
    let files: Vec<NodeDefinitionFile> = serde_json::from_str(json)?;
    Ok(files.into_iter().map(NodeDefinition::from).collect())
}
