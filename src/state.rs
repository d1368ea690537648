//! Shared dispatch state - lets another thread watch and stop a running session

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Dispatch loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatchState {
    Idle = 0,
    Running = 1,
    ShuttingDown = 2,
    Stopped = 3,
}

impl From<u8> for DispatchState {
    fn from(v: u8) -> Self {
        match v {
            0 => DispatchState::Idle,
            1 => DispatchState::Running,
            2 => DispatchState::ShuttingDown,
            _ => DispatchState::Stopped,
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::Idle => write!(f, "IDLE"),
            DispatchState::Running => write!(f, "RUNNING"),
            DispatchState::ShuttingDown => write!(f, "SHUTTING_DOWN"),
            DispatchState::Stopped => write!(f, "STOPPED"),
        }
    }
}

struct Shared {
    state: AtomicU8,
    cancel_requested: AtomicBool,
}

/// Cloneable view of a session's state
#[derive(Clone)]
pub struct DispatchHandle {
    shared: Arc<Shared>,
}

impl DispatchHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(DispatchState::Idle as u8),
                cancel_requested: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> DispatchState {
        DispatchState::from(self.shared.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: DispatchState) {
        self.shared.state.store(state as u8, Ordering::SeqCst);
    }

    /// Ask the loop to stop; observed within one poll interval
    pub fn cancel(&self) {
        self.shared.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel_requested.load(Ordering::SeqCst)
    }
}

impl Default for DispatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("state", &self.state())
            .field("cancel_requested", &self.is_cancel_requested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        for s in [
            DispatchState::Idle,
            DispatchState::Running,
            DispatchState::ShuttingDown,
            DispatchState::Stopped,
        ] {
            assert_eq!(DispatchState::from(s as u8), s);
        }
        assert_eq!(DispatchState::ShuttingDown.to_string(), "SHUTTING_DOWN");
    }

    #[test]
    fn test_handle_clones_share_state() {
        let handle = DispatchHandle::new();
        let other = handle.clone();
        assert_eq!(other.state(), DispatchState::Idle);

        handle.set_state(DispatchState::Running);
        other.cancel();
        assert_eq!(other.state(), DispatchState::Running);
        assert!(handle.is_cancel_requested());
    }
}
