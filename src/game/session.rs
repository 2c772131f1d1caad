use super::types::{ConnectionId, Identity};
use thiserror::Error;

/// Lifecycle of a live connection. The `Connecting` step is the HTTP upgrade
/// itself: a session only exists once the identity gate has accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Authenticated,
    Active,
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("illegal session transition {from:?} -> {to:?}")]
    IllegalTransition { from: SessionPhase, to: SessionPhase },
}

#[derive(Debug, Clone)]
pub struct Session {
    pub connection: ConnectionId,
    pub identity: Identity,
    phase: SessionPhase,
}

impl Session {
    pub fn authenticated(connection: ConnectionId, identity: Identity) -> Self {
        Self {
            connection,
            identity,
            phase: SessionPhase::Authenticated,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Moves forward one step. Any phase may close; nothing leaves `Closed`.
    pub fn advance(&mut self, to: SessionPhase) -> Result<(), SessionError> {
        use SessionPhase::*;
        let allowed = matches!(
            (self.phase, to),
            (Authenticated, Active) | (Authenticated, Closed) | (Active, Closed)
        );
        if !allowed {
            return Err(SessionError::IllegalTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }
}
