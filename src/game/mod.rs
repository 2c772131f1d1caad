pub mod dispatch;
pub mod layout;
pub mod movement;
pub mod nodes;
pub mod registry;
pub mod session;
pub mod types;
pub mod world;
