use super::nodes::{NodeDefinition, NodeKind};
use super::types::GroundPoint;

pub const GRID_SPACING: f64 = 12.0;
pub const TREE_RING_RADIUS: usize = 3;
pub const ROCK_COUNT: usize = 6;
pub const ROCK_RING_DISTANCE: f64 = 50.0;

/// Trees on a square grid around spawn (the centre tile stays clear) and a ring of rocks further out.
pub fn default_node_definitions() -> Vec<NodeDefinition> {
    let mut definitions = Vec::new();
    let radius = TREE_RING_RADIUS as i64;
    let mut tree_index = 0usize;
    for row in -radius..=radius {
        for col in -radius..=radius {
            if row == 0 && col == 0 {
                continue;
            }
            let position = GroundPoint {
                x: col as f64 * GRID_SPACING,
                z: row as f64 * GRID_SPACING,
            };
            definitions.push(NodeDefinition::from_kind(
                format!("tree-{tree_index}"),
                NodeKind::Tree,
                position,
            ));
            tree_index += 1;
        }
    }

    for index in 0..ROCK_COUNT {
        let angle = index as f64 / ROCK_COUNT as f64 * std::f64::consts::TAU;
        let position = GroundPoint {
            x: angle.cos() * ROCK_RING_DISTANCE,
            z: angle.sin() * ROCK_RING_DISTANCE,
        };
        definitions.push(NodeDefinition::from_kind(
            format!("rock-{index}"),
            NodeKind::Rock,
            position,
        ));
    }
    definitions
}
