//! Open state machine.

use crate::error::{OpenError, OpenResult};
use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// The state of a single open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    /// Nothing has happened yet.
    NotStarted,
    /// The initial download from the server is in progress.
    Downloading,
    /// The initial download completed.
    Ready,
    /// The sync session or authority failed.
    Failed,
    /// The configured wait bound elapsed first.
    TimedOut,
}

impl OpenState {
    /// Returns true if no further transitions can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OpenState::Ready | OpenState::Failed | OpenState::TimedOut
        )
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: OpenState) -> bool {
        matches!(
            (self, next),
            (OpenState::NotStarted, OpenState::Downloading)
                | (OpenState::Downloading, OpenState::Ready)
                | (OpenState::Downloading, OpenState::Failed)
                | (OpenState::Downloading, OpenState::TimedOut)
        )
    }
}

impl fmt::Display for OpenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpenState::NotStarted => "not started",
            OpenState::Downloading => "downloading",
            OpenState::Ready => "ready",
            OpenState::Failed => "failed",
            OpenState::TimedOut => "timed out",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct Inner {
    state: OpenState,
    download_started: Option<Instant>,
    download_elapsed: Option<Duration>,
}

/// Tracks the state of one open request.
///
/// Shared between the caller-facing task handle and the worker driving
/// the open.
#[derive(Debug)]
pub struct OpenStateMachine {
    inner: Mutex<Inner>,
}

impl OpenStateMachine {
    /// Creates a machine in `NotStarted`.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: OpenState::NotStarted,
                download_started: None,
                download_elapsed: None,
            }),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> OpenState {
        self.inner.lock().state
    }

    /// Time spent in `Downloading`, so far or in total.
    pub fn download_elapsed(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        inner
            .download_elapsed
            .or_else(|| inner.download_started.map(|started| started.elapsed()))
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if `next` is not a legal successor;
    /// the state is left unchanged.
    pub fn transition(&self, next: OpenState) -> OpenResult<()> {
        let mut inner = self.inner.lock();
        let current = inner.state;
        if !current.can_transition_to(next) {
            return Err(OpenError::InvalidStateTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        let now = Instant::now();
        if next == OpenState::Downloading {
            inner.download_started = Some(now);
        } else if let Some(started) = inner.download_started {
            inner.download_elapsed = Some(now.duration_since(started));
        }
        inner.state = next;
        debug!(from = %current, to = %next, "open state transition");
        Ok(())
    }
}

impl Default for OpenStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
