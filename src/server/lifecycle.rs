//! Server lifecycle: `Running → ShuttingDown → Stopped`.
//!
//! Connection tasks request shutdown when they see the control path; the
//! accept loop watches for it and stops.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
    Stopped,
}

/// Shared handle to the server state. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Running);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Moves `Running` to `ShuttingDown`.
    ///
    /// Returns `false` if shutdown was already underway.
    pub fn request_shutdown(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == LifecycleState::Running {
                *state = LifecycleState::ShuttingDown;
                true
            } else {
                false
            }
        })
    }

    pub fn mark_stopped(&self) {
        self.state.send_replace(LifecycleState::Stopped);
    }

    /// Resolves once the state has left `Running`.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|state| *state != LifecycleState::Running).await;
    }
}
