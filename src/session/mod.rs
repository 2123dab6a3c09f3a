//! Viewer sessions
//!
//! [`ClientSession`] tracks one connection's lifecycle; [`run_session`] drives
//! it over a websocket.

pub mod runner;
pub mod state;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use runner::run_session;
pub use state::{ClientSession, SessionState};

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
