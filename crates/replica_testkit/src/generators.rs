//! Property-based test generators using proptest.
//!
//! Generated locators are already in normalized form, so an unresolved
//! locator without a wildcard round-trips through parsing unchanged.

use proptest::prelude::*;
use replica_config::{OpenPolicy, RESERVED_SUFFIXES};
use std::time::Duration;

/// Strategy for generating authority identities.
pub fn identity_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f0-9]{8,32}").expect("Invalid regex")
}

/// Strategy for generating free-form identities that need escaping in a path.
pub fn display_identity_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 +%@_-]{1,24}").expect("Invalid regex")
}

/// Strategy for generating host names.
pub fn host_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,15}(\\.[a-z]{2,6}){0,2}").expect("Invalid regex")
}

/// Strategy for generating plain path segments (never a wildcard).
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-]{1,16}").expect("Invalid regex")
}

/// Strategy for generating a scheme.
pub fn scheme_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("realm"), Just("realms")]
}

/// Strategy for generating locators without a wildcard.
pub fn plain_locator_strategy() -> impl Strategy<Value = String> {
    (
        scheme_strategy(),
        host_strategy(),
        prop::collection::vec(segment_strategy(), 1..5),
    )
        .prop_map(|(scheme, host, segments)| {
            format!("{scheme}://{host}/{}", segments.join("/"))
        })
}

/// Strategy for generating locators with exactly one wildcard segment.
pub fn wildcard_locator_strategy() -> impl Strategy<Value = String> {
    (
        scheme_strategy(),
        host_strategy(),
        prop::collection::vec(segment_strategy(), 0..4),
        any::<prop::sample::Index>(),
    )
        .prop_map(|(scheme, host, mut segments, index)| {
            let at = index.index(segments.len() + 1);
            segments.insert(at, "~".to_string());
            format!("{scheme}://{host}/{}", segments.join("/"))
        })
}

/// Strategy for generating locators ending in a reserved suffix.
pub fn reserved_locator_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![plain_locator_strategy(), wildcard_locator_strategy()],
        prop::sample::select(RESERVED_SUFFIXES.to_vec()),
    )
        .prop_map(|(locator, suffix)| format!("{locator}{suffix}"))
}

/// Strategy for generating open policies, including disabled timeouts.
pub fn policy_strategy() -> impl Strategy<Value = OpenPolicy> {
    (
        any::<bool>(),
        prop::option::of((1u64..10_000).prop_map(Duration::from_millis)),
    )
        .prop_map(|(wait_for_server_changes, server_wait_timeout)| OpenPolicy {
            wait_for_server_changes,
            server_wait_timeout,
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a quick test configuration (fewer cases).
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
