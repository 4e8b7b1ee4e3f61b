//! Open policy snapshots.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Converts fractional seconds to a wait timeout.
///
/// Zero, negative, NaN and infinite values mean "wait indefinitely" and
/// map to `None`.
pub fn timeout_from_secs(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// The policy fields of a sync configuration, captured by value when an
/// open begins.
///
/// Changing the configuration after an open has started does not affect
/// that open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpenPolicy {
    /// Block (or delay the completion callback) until the initial set of
    /// server changes has been downloaded.
    #[serde(default)]
    pub wait_for_server_changes: bool,

    /// Upper bound on the wait. `None` waits indefinitely.
    #[serde(default, rename = "server_wait_timeout_secs", with = "timeout_secs")]
    pub server_wait_timeout: Option<Duration>,
}

impl OpenPolicy {
    /// A policy that opens without waiting for the server.
    pub const fn immediate() -> Self {
        Self {
            wait_for_server_changes: false,
            server_wait_timeout: None,
        }
    }

    /// A policy that waits for the server, optionally bounded.
    pub const fn wait(timeout: Option<Duration>) -> Self {
        Self {
            wait_for_server_changes: true,
            server_wait_timeout: timeout,
        }
    }

    /// Returns the timeout that actually applies to an open.
    ///
    /// The timeout is inert unless `wait_for_server_changes` is set.
    pub fn effective_timeout(&self) -> Option<Duration> {
        if self.wait_for_server_changes {
            self.server_wait_timeout.filter(|t| !t.is_zero())
        } else {
            None
        }
    }
}

mod timeout_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(value.map_or(0.0, |d| d.as_secs_f64()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(super::timeout_from_secs(f64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_timeouts_disable_the_bound() {
        assert_eq!(timeout_from_secs(0.0), None);
        assert_eq!(timeout_from_secs(-5.0), None);
        assert_eq!(timeout_from_secs(f64::NAN), None);
        assert_eq!(timeout_from_secs(f64::INFINITY), None);
        assert_eq!(timeout_from_secs(1.5), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn timeout_is_inert_without_wait() {
        let policy = OpenPolicy {
            wait_for_server_changes: false,
            server_wait_timeout: Some(Duration::from_secs(3)),
        };
        assert_eq!(policy.effective_timeout(), None);

        let policy = OpenPolicy::wait(Some(Duration::from_secs(3)));
        assert_eq!(policy.effective_timeout(), Some(Duration::from_secs(3)));

        assert_eq!(OpenPolicy::wait(Some(Duration::ZERO)).effective_timeout(), None);
    }

    #[test]
    fn json_uses_fractional_seconds() {
        let policy: OpenPolicy = serde_json::from_str(
            r#"{"wait_for_server_changes": true, "server_wait_timeout_secs": 0.25}"#,
        )
        .unwrap();
        assert_eq!(policy, OpenPolicy::wait(Some(Duration::from_millis(250))));

        let policy: OpenPolicy =
            serde_json::from_str(r#"{"wait_for_server_changes": true, "server_wait_timeout_secs": -1}"#)
                .unwrap();
        assert_eq!(policy.server_wait_timeout, None);

        let policy: OpenPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, OpenPolicy::immediate());

        let json = serde_json::to_string(&OpenPolicy::wait(None)).unwrap();
        assert!(json.contains("\"server_wait_timeout_secs\":0.0"));
    }
}
