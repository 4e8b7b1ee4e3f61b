//! # Replica Config
//!
//! Configuration for opening a local replica that synchronizes with a
//! remote object server.
//!
//! This crate provides:
//! - Remote locators with single-wildcard identity resolution
//! - The authority boundary (authenticated identity + liveness)
//! - `SyncConfiguration`, validated at construction
//! - Open policy snapshots (wait for server changes, wait timeout)
//! - Local store layout derivation and reserved file suffixes
//!
//! ## Key Invariants
//!
//! - The locator and authority are fixed at construction
//! - A resolved locator never contains the wildcard
//! - A resolved locator never points at a store, lock or management file
//! - Only the two policy fields change after construction
//!
//! ## Example
//!
//! ```rust
//! use replica_config::{SessionAuthority, SyncConfiguration};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let user = Arc::new(SessionAuthority::new("alice"));
//! let mut config = SyncConfiguration::new(user, "realms://example.org/~/notes")?;
//! config.set_wait_for_server_changes(true);
//! config.set_server_wait_timeout(Duration::from_secs(10));
//!
//! assert_eq!(config.locator().as_str(), "realms://example.org/alice/notes");
//! # Ok::<(), replica_config::ValidationError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod authority;
mod configuration;
mod error;
mod layout;
mod locator;
mod policy;

pub use authority::{Authority, AuthorityState, SessionAuthority};
pub use configuration::{SyncConfiguration, SyncConfigurationBuilder};
pub use error::{ValidationError, ValidationResult};
pub use layout::{
    reserved_suffix, StoreLayout, LOCK_SUFFIX, MANAGEMENT_SUFFIX, RESERVED_SUFFIXES, STORE_SUFFIX,
};
pub use locator::{Locator, SCHEME_PLAIN, SCHEME_SECURE, WILDCARD};
pub use policy::{timeout_from_secs, OpenPolicy};
