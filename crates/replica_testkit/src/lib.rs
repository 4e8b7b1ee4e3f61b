//! # Replica Testkit
//!
//! Test utilities for replica configuration and open coordination.
//!
//! This crate provides:
//! - Latches and gated collaborators for controlling open timing
//! - Fixtures for authorities, configurations and coordinators
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use replica_testkit::prelude::*;
//!
//! #[test]
//! fn opens_after_release() {
//!     let latch = Latch::new();
//!     let coordinator = gated_coordinator(&latch);
//!     // ... open asynchronously, then latch.release()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
