//! Client session state machine
//!
//! ```text
//! HANDSHAKING ──▶ ACTIVE ──▶ CLOSING ──▶ CLOSED
//!      │                        ▲
//!      └────────────────────────┘   (errors from any live state)
//! ```

use std::fmt;
use std::time::Instant;

use crate::error::SessionError;
use crate::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Handshaking => "HANDSHAKING",
            SessionState::Active => "ACTIVE",
            SessionState::Closing => "CLOSING",
            SessionState::Closed => "CLOSED",
        }
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Handshaking, Active) | (Handshaking, Closing) | (Active, Closing) | (Closing, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One viewer connection. Holds no frame history; a reconnect starts over.
#[derive(Debug)]
pub struct ClientSession {
    id: SessionId,
    state: SessionState,
    last_delivered: Option<u64>,
    frames_sent: u64,
    connected_at: Instant,
}

impl ClientSession {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            state: SessionState::Handshaking,
            last_delivered: None,
            frames_sent: 0,
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        tracing::debug!("Session {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Handshake done, frames may flow
    pub fn activate(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Active)
    }

    /// Enter CLOSING from any live state. Repeated calls are no-ops.
    pub fn begin_close(&mut self) {
        if matches!(self.state, SessionState::Handshaking | SessionState::Active) {
            self.state = SessionState::Closing;
        }
    }

    pub fn finish(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Closed)
    }

    pub fn record_delivery(&mut self, sequence: u64) {
        self.last_delivered = Some(sequence);
        self.frames_sent += 1;
    }

    /// Sequence of the last frame written, for diagnostics only
    pub fn last_delivered(&self) -> Option<u64> {
        self.last_delivered
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn connected_for(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}
