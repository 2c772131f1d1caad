use crate::game::nodes::NodeSummary;
use crate::game::types::{ConnectionId, PlayerState, Vec3};
use serde::{Deserialize, Serialize};

pub const MAX_CHAT_LENGTH: usize = 200;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Move {
        position: Vec3,
        rotation: Vec3,
    },
    Chat {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    NodeAction {
        node_id: String,
    },
    Resync,
}

pub fn decode_client_message(text: &str) -> Option<ClientMessage> {
    serde_json::from_str(text).ok()
}

/// Trims and clips chat text; `None` when nothing is left to send.
pub fn clean_chat_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_CHAT_LENGTH).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Welcome {
        #[serde(rename = "self")]
        me: PlayerState,
        nodes: Vec<NodeSummary>,
    },
    PlayersSnapshot {
        players: Vec<PlayerState>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player: PlayerState,
        total_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    PlayerMoved {
        connection_handle: ConnectionId,
        player_id: String,
        display_name: String,
        position: Vec3,
        rotation: Vec3,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        connection_handle: ConnectionId,
        total_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    NodeUpdate {
        id: String,
        health: u32,
        max_health: u32,
        alive: bool,
    },
    NodesSnapshot {
        nodes: Vec<NodeSummary>,
    },
    #[serde(rename_all = "camelCase")]
    Reward {
        node_id: String,
        resource: &'static str,
        units: u32,
        xp: u32,
    },
    #[serde(rename_all = "camelCase")]
    Chat {
        connection_handle: ConnectionId,
        display_name: String,
        text: String,
    },
}

impl ServerMessage {
    pub fn node_update(summary: &NodeSummary) -> Self {
        ServerMessage::NodeUpdate {
            id: summary.id.clone(),
            health: summary.health,
            max_health: summary.max_health,
            alive: summary.alive,
        }
    }

    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(text) => Some(text),
            Err(error) => {
                tracing::warn!(?error, "failed to encode server message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn decode_move_with_position_and_rotation() {
        let text = r#"{"type":"move","position":{"x":1.5,"y":0,"z":-2},"rotation":{"x":0,"y":3.1,"z":0}}"#;
        match decode_client_message(text).expect("message") {
            ClientMessage::Move { position, rotation } => {
                assert_eq!(position, Vec3::new(1.5, 0.0, -2.0));
                assert!((rotation.y - 3.1).abs() < 1e-9);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn decode_node_action_uses_camel_case_id() {
        let text = r#"{"type":"nodeAction","nodeId":"tree-3"}"#;
        assert_eq!(
            decode_client_message(text),
            Some(ClientMessage::NodeAction {
                node_id: "tree-3".to_string()
            })
        );
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(decode_client_message("not json").is_none());
        assert!(decode_client_message(r#"{"type":"move","position":{"x":1}}"#).is_none());
        assert!(decode_client_message(r#"{"type":"teleport"}"#).is_none());
        assert!(decode_client_message(r#"{"type":"nodeAction"}"#).is_none());
    }

    #[test]
    fn node_update_serializes_with_wire_names() {
        let message = ServerMessage::NodeUpdate {
            id: "rock-1".to_string(),
            health: 0,
            max_health: 150,
            alive: false,
        };
        let value: Value = serde_json::from_str(&message.to_json().expect("json")).expect("value");
        assert_eq!(value["type"], "nodeUpdate");
        assert_eq!(value["maxHealth"], 150);
        assert_eq!(value["alive"], false);
    }

    #[test]
    fn welcome_carries_self_field() {
        let me = PlayerState {
            connection_handle: ConnectionId::new(),
            player_id: "p".to_string(),
            display_name: "P".to_string(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
        };
        let message = ServerMessage::Welcome {
            me,
            nodes: Vec::new(),
        };
        let value: Value = serde_json::from_str(&message.to_json().expect("json")).expect("value");
        assert_eq!(value["type"], "welcome");
        assert_eq!(value["self"]["playerId"], "p");
        assert!(value["nodes"].as_array().expect("nodes").is_empty());
    }

    #[test]
    fn chat_text_is_trimmed_and_clipped() {
        assert_eq!(clean_chat_text("  hi  "), Some("hi".to_string()));
        assert_eq!(clean_chat_text("   "), None);
        let long = "a".repeat(MAX_CHAT_LENGTH + 50);
        assert_eq!(
            clean_chat_text(&long).map(|text| text.len()),
            Some(MAX_CHAT_LENGTH)
        );
    }
}
