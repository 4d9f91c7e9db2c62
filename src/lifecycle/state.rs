//! Process-wide running flags.
//!
//! Each flag has exactly one writer:
//! - `done_initializing`, `done_loading`: the controller
//! - `signal_received`: the shutdown coordinator
//!
//! Readers are remote callers polling readiness, the supervisor and the
//! controller's own main loop.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::observability::metrics;

#[derive(Debug, Default)]
pub struct RunningState {
    done_initializing: AtomicBool,
    done_loading: AtomicBool,
    signal_received: AtomicBool,
}

impl RunningState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done_initializing(&self) -> bool {
        self.done_initializing.load(Ordering::SeqCst)
    }

    pub fn mark_done_initializing(&self) {
        self.done_initializing.store(true, Ordering::SeqCst);
        metrics::record_done_initializing(true);
    }

    pub fn is_done_loading(&self) -> bool {
        self.done_loading.load(Ordering::SeqCst)
    }

    pub fn mark_done_loading(&self) {
        self.done_loading.store(true, Ordering::SeqCst);
    }

    /// True once a termination signal has been handled.
    pub fn signal_received(&self) -> bool {
        self.signal_received.load(Ordering::SeqCst)
    }

    /// Record the termination signal. Returns `true` the first time.
    pub fn mark_signal_received(&self) -> bool {
        !self.signal_received.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_start_cleared() {
        let state = RunningState::new();
        assert!(!state.is_done_initializing());
        assert!(!state.is_done_loading());
        assert!(!state.signal_received());
    }

    #[test]
    fn signal_is_first_only_once() {
        let state = RunningState::new();
        assert!(state.mark_signal_received());
        assert!(!state.mark_signal_received());
        assert!(state.signal_received());
    }
}
