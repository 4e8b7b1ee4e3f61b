//! # Replica Open
//!
//! Opens local replicas described by a [`SyncConfiguration`], deciding
//! whether to block, for how long, and on which threads.
//!
//! This crate provides:
//! - The open state machine (not started → downloading → ready / failed / timed out)
//! - A registry of non-blockable execution contexts
//! - Store engine and sync session boundaries
//! - Synchronous, callback and awaitable open paths
//! - In-memory and file-backed collaborators
//!
//! ## Open Policy
//!
//! | Mode | Wait | Behavior |
//! |------|------|----------|
//! | sync | yes  | Blocks until ready, failed or timed out. Rejected on non-blockable threads. |
//! | sync | no   | Returns once the local store is open; sync continues in the background. |
//! | async | yes | Never blocks; the callback fires once a terminal state is reached. |
//! | async | no  | Never blocks; the callback fires once the local store is open. |
//!
//! ## Key Invariants
//!
//! - Policy is captured by value when an open begins
//! - A non-blockable thread is rejected before any store or network access
//! - Timed out and failed opens are distinct errors
//! - A timed out download is not rolled back; the local store stays usable
//! - Async callbacks fire exactly once
//!
//! [`SyncConfiguration`]: replica_config::SyncConfiguration

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod coordinator;
mod error;
mod session;
mod state;
mod store;

pub use config::CoordinatorConfig;
pub use context::{ExecutionContexts, NonBlockableGuard};
pub use coordinator::{AsyncOpenTask, OpenCoordinator};
pub use error::{OpenError, OpenResult, StoreError, StoreResult, SyncError, SyncResult};
pub use session::{DownloadSession, MockSession, MockSessionProvider, SessionProvider};
pub use state::{OpenState, OpenStateMachine};
pub use store::{FileStore, FileStoreEngine, MemoryStore, MemoryStoreEngine, StoreEngine};
