//! Broadcast hub
//!
//! Fans each produced frame out to every subscribed session. Publishing never
//! waits on a consumer; a session that cannot keep up loses its oldest queued
//! frames instead of delaying the pipeline or the other sessions.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::broadcast::mailbox::Mailbox;
use crate::pipeline::{FrameMessage, PipelineState};
use crate::session::SessionId;

pub type FrameMailbox = Mailbox<Arc<FrameMessage>>;

/// Outcome of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub evicted: usize,
}

pub struct BroadcastHub {
    sessions: DashMap<SessionId, Arc<FrameMailbox>>,
    capacity: usize,
    state: Arc<PipelineState>,
    closed: AtomicBool,
    published: AtomicU64,
}

impl BroadcastHub {
    pub fn new(capacity: usize, state: Arc<PipelineState>) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity: capacity.max(1),
            state,
            closed: AtomicBool::new(false),
            published: AtomicU64::new(0),
        }
    }

    /// Register a session and return its mailbox.
    ///
    /// After the hub is closed the returned mailbox is already closed and the
    /// session is not registered.
    pub fn subscribe(&self, id: SessionId) -> Arc<FrameMailbox> {
        let mailbox = Arc::new(Mailbox::new(self.capacity));
        if self.is_closed() {
            mailbox.close();
            return mailbox;
        }

        // Count first so a concurrent removal never sees the counter behind the registry
        self.state.session_added();
        if let Some(previous) = self.sessions.insert(id, mailbox.clone()) {
            previous.close();
            self.state.session_removed();
        }

        // close() may have swept the registry between the check and the insert
        if self.is_closed() {
            if self.sessions.remove(&id).is_some() {
                self.state.session_removed();
            }
            mailbox.close();
            return mailbox;
        }

        tracing::debug!("Session {} subscribed ({} active)", id, self.sessions.len());
        mailbox
    }

    /// Remove a session. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SessionId) {
        if let Some((_, mailbox)) = self.sessions.remove(&id) {
            mailbox.close();
            self.state.session_removed();
            tracing::debug!("Session {} unsubscribed ({} active)", id, self.sessions.len());
        }
    }

    /// Offer a frame to every subscriber without blocking
    pub fn publish(&self, frame: Arc<FrameMessage>) -> PublishReport {
        let mut report = PublishReport::default();
        if self.is_closed() {
            return report;
        }

        for entry in self.sessions.iter() {
            if entry.value().push(frame.clone()) {
                report.evicted += 1;
            }
            report.delivered += 1;
        }

        self.published.fetch_add(1, Ordering::Relaxed);
        self.state.add_dropped_frames(report.evicted as u64);
        report
    }

    /// Stop accepting frames and close every mailbox
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sessions.retain(|_, mailbox| {
            mailbox.close();
            self.state.session_removed();
            false
        });
        tracing::info!("Broadcast hub closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> &Arc<PipelineState> {
        &self.state
    }
}
