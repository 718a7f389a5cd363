//! Single-frame mailbox shared by the producer thread and the server.
//!
//! The producer publishes whole frames; readers get an `Arc` to whichever
//! frame was current, so a reader never sees a half-written buffer. The lock
//! only guards the pointer swap.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use super::camera::Frame;

/// Latest-frame slot. Last write wins.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<Arc<Frame>>>,
    published: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame.
    ///
    /// A frame whose sequence number is not newer than the current one is
    /// dropped and `false` is returned.
    pub fn publish(
        &self,
        frame: Frame,
    ) -> bool {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = latest.as_ref() {
            if frame.seq() <= current.seq() {
                tracing::warn!(
                    stale = frame.seq(),
                    current = current.seq(),
                    "dropping out-of-order frame"
                );
                return false;
            }
        }
        *latest = Some(Arc::new(frame));
        self.published.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Most recently published frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of frames accepted so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
