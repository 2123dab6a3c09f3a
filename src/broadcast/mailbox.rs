//! Bounded drop-oldest mailbox
//!
//! One per subscriber. The producer never blocks: when the mailbox is full the
//! oldest queued item is evicted to make room, so a slow consumer only ever
//! falls behind by `capacity` items.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

pub struct Mailbox<T> {
    queue: ArrayQueue<T>,
    notify: Notify,
    closed: AtomicBool,
    evicted: AtomicU64,
}

impl<T> Mailbox<T> {
    /// Create a mailbox holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            evicted: AtomicU64::new(0),
        }
    }

    /// Enqueue an item, evicting the oldest one if full.
    ///
    /// Returns `true` if an item was evicted. Pushing into a closed mailbox
    /// is a no-op.
    pub fn push(&self, item: T) -> bool {
        if self.is_closed() {
            return false;
        }
        let evicted = self.queue.force_push(item).is_some();
        if evicted {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        evicted
    }

    pub fn try_recv(&self) -> Option<T> {
        self.queue.pop()
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the mailbox is closed; items queued before the
    /// close are discarded.
    pub async fn recv(&self) -> Option<T> {
        loop {
            if self.is_closed() {
                return None;
            }
            if let Some(item) = self.queue.pop() {
                return Some(item);
            }
            let notified = self.notify.notified();
            // Re-check after registering so a push between pop and await is not lost
            if self.is_closed() {
                return None;
            }
            if let Some(item) = self.queue.pop() {
                return Some(item);
            }
            notified.await;
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Items dropped because the consumer fell behind
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}
