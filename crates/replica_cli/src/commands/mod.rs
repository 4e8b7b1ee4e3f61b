//! CLI command implementations.

pub mod layout;
pub mod open;
pub mod resolve;
