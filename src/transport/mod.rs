pub mod gate;
pub mod ws_session;
