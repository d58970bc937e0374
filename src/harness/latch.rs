//! One-shot guard for the shutdown sequence.

use std::sync::atomic::{AtomicBool, Ordering};

/// Lets exactly one caller through, no matter how many termination paths
/// race to shut the run down.
#[derive(Debug, Default)]
pub struct ShutdownLatch {
    tripped: AtomicBool,
}

impl ShutdownLatch {
    /// A latch that has not fired yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the latch. Returns `true` only for the first caller.
    #[must_use]
    pub fn trip(&self) -> bool {
        !self.tripped.swap(true, Ordering::AcqRel)
    }
}
