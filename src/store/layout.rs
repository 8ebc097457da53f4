//! Layout collaborators own geometry, not graph state. The engine only tells
//! them when the current frame is rebuilt; per-entity changes reach them
//! through a bus subscription.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait Layout: Send {
    fn reset(&mut self);
}

/// Counts resets. Clones share the counter, so one clone can be handed to
/// the engine and the other read from outside.
#[derive(Debug, Default, Clone)]
pub struct ResetCounter {
    resets: Arc<AtomicUsize>,
}

impl ResetCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.resets.load(Ordering::Relaxed)
    }
}

impl Layout for ResetCounter {
    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }
}
