//! Frame fan-out
//!
//! Delivers each produced frame to every connected session through a
//! per-session bounded mailbox.

pub mod hub;
pub mod mailbox;

pub use hub::{BroadcastHub, FrameMailbox, PublishReport};
pub use mailbox::Mailbox;
