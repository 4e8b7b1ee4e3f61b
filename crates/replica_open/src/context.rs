//! Non-blockable execution contexts.
//!
//! The embedding application designates the threads that must never block
//! on network I/O (typically its UI or event-loop thread). A waiting
//! synchronous open on such a thread is rejected.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Registry of threads that must not block.
#[derive(Debug, Default)]
pub struct ExecutionContexts {
    non_blockable: RwLock<HashSet<ThreadId>>,
}

impl ExecutionContexts {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Designates `thread` as non-blockable. Returns false if it already was.
    pub fn designate(&self, thread: ThreadId) -> bool {
        self.non_blockable.write().insert(thread)
    }

    /// Removes the designation. Returns false if the thread was not designated.
    pub fn release(&self, thread: ThreadId) -> bool {
        self.non_blockable.write().remove(&thread)
    }

    /// Designates the calling thread until the guard is dropped.
    pub fn designate_current(self: &Arc<Self>) -> NonBlockableGuard {
        let thread = thread::current().id();
        self.designate(thread);
        NonBlockableGuard {
            contexts: Arc::clone(self),
            thread,
        }
    }

    /// Returns true if `thread` is designated.
    pub fn is_non_blockable(&self, thread: ThreadId) -> bool {
        self.non_blockable.read().contains(&thread)
    }

    /// Returns true if the calling thread is designated.
    pub fn is_current_non_blockable(&self) -> bool {
        self.is_non_blockable(thread::current().id())
    }
}

/// Releases a thread designation on drop.
#[derive(Debug)]
pub struct NonBlockableGuard {
    contexts: Arc<ExecutionContexts>,
    thread: ThreadId,
}

impl Drop for NonBlockableGuard {
    fn drop(&mut self) {
        self.contexts.release(self.thread);
    }
}
