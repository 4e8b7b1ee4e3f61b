//! Error types for sync configuration.

use thiserror::Error;

/// Result type for configuration construction.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors detected while constructing a sync configuration.
///
/// All of these are reported synchronously at construction time and are
/// never deferred to open time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The resolved locator points at a storage-engine artifact.
    #[error("locator {locator} ends with reserved suffix {suffix}")]
    ReservedSuffix {
        /// The resolved locator.
        locator: String,
        /// The reserved suffix that matched.
        suffix: &'static str,
    },

    /// A configuration was requested without its mandatory fields.
    #[error("sync configuration cannot be created without {missing}")]
    ConstructionDisallowed {
        /// Name of the missing field.
        missing: &'static str,
    },

    /// The locator is not a valid absolute reference.
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    /// The locator uses a scheme other than the plain or secure sync scheme.
    #[error("unsupported locator scheme: {0}")]
    UnsupportedScheme(String),

    /// The locator contains more than one wildcard segment.
    #[error("locator contains {count} wildcard segments, at most one is allowed")]
    MultipleWildcards {
        /// Number of wildcard segments found.
        count: usize,
    },

    /// The authority cannot be used to resolve a locator.
    #[error("invalid authority: {0}")]
    InvalidAuthority(String),
}
