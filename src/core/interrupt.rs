//! User interrupt flag
//!
//! Set from the Ctrl-C handler thread, polled by the read loop and the
//! input loop on the main thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared interrupt request
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// Create a cleared flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an interrupt
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Consume a pending request, returning whether there was one
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    /// Whether a request is pending
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
