//! The sync configuration value object.

use crate::authority::Authority;
use crate::error::{ValidationError, ValidationResult};
use crate::layout::{reserved_suffix, StoreLayout};
use crate::locator::Locator;
use crate::policy::{timeout_from_secs, OpenPolicy};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a local replica that syncs with a remote store.
///
/// The authority and locator are fixed at construction. Only the two
/// policy fields (`wait_for_server_changes` and `server_wait_timeout`) can
/// change afterwards, and an open captures them by value when it starts.
///
/// There is no default value: the only ways to obtain a configuration are
/// [`SyncConfiguration::new`], [`SyncConfiguration::with_locator`] and
/// [`SyncConfigurationBuilder::build`], all of which validate.
#[derive(Clone)]
pub struct SyncConfiguration {
    authority: Arc<dyn Authority>,
    locator: Locator,
    wait_for_server_changes: bool,
    server_wait_timeout: Option<Duration>,
}

impl SyncConfiguration {
    /// Creates a configuration from an authority and an unresolved locator.
    ///
    /// The wildcard segment `~`, if present, is replaced with the
    /// authority's identity before validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the locator cannot be parsed, the authority has
    /// an empty identity, or the resolved locator ends with a reserved
    /// suffix.
    pub fn new(authority: Arc<dyn Authority>, locator: &str) -> ValidationResult<Self> {
        Self::with_locator(authority, Locator::parse(locator)?)
    }

    /// Creates a configuration from an already parsed locator.
    pub fn with_locator(authority: Arc<dyn Authority>, locator: Locator) -> ValidationResult<Self> {
        if authority.identity().is_empty() {
            return Err(ValidationError::InvalidAuthority(
                "authority identity is empty".into(),
            ));
        }

        if locator.has_wildcard() && authority.identity().bytes().all(|b| b == b'.') {
            return Err(ValidationError::InvalidAuthority(format!(
                "identity {:?} cannot stand in for the wildcard",
                authority.identity()
            )));
        }

        let resolved = locator.resolve(authority.identity());
        if let Some(suffix) = reserved_suffix(&resolved.decoded_path()) {
            return Err(ValidationError::ReservedSuffix {
                locator: resolved.to_string(),
                suffix,
            });
        }

        Ok(Self {
            authority,
            locator: resolved,
            wait_for_server_changes: false,
            server_wait_timeout: None,
        })
    }

    /// Starts a builder.
    pub fn builder() -> SyncConfigurationBuilder {
        SyncConfigurationBuilder::default()
    }

    /// The authority that owns the remote store.
    pub fn authority(&self) -> &Arc<dyn Authority> {
        &self.authority
    }

    /// The resolved locator.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Whether opens wait for the initial server download.
    pub fn wait_for_server_changes(&self) -> bool {
        self.wait_for_server_changes
    }

    /// Sets whether opens wait for the initial server download.
    pub fn set_wait_for_server_changes(&mut self, wait: bool) {
        self.wait_for_server_changes = wait;
    }

    /// Bound on the initial download wait. `None` waits indefinitely.
    ///
    /// Ignored unless `wait_for_server_changes` is set.
    pub fn server_wait_timeout(&self) -> Option<Duration> {
        self.server_wait_timeout
    }

    /// Sets the wait bound. A zero duration waits indefinitely.
    pub fn set_server_wait_timeout(&mut self, timeout: Duration) {
        self.server_wait_timeout = Some(timeout).filter(|t| !t.is_zero());
    }

    /// Sets the wait bound in seconds. Zero or negative waits indefinitely.
    pub fn set_server_wait_timeout_secs(&mut self, secs: f64) {
        self.server_wait_timeout = timeout_from_secs(secs);
    }

    /// Removes the wait bound.
    pub fn clear_server_wait_timeout(&mut self) {
        self.server_wait_timeout = None;
    }

    /// Sets whether opens wait for the initial server download.
    #[must_use]
    pub fn waiting_for_server_changes(mut self, wait: bool) -> Self {
        self.set_wait_for_server_changes(wait);
        self
    }

    /// Sets the wait bound.
    #[must_use]
    pub fn with_server_wait_timeout(mut self, timeout: Duration) -> Self {
        self.set_server_wait_timeout(timeout);
        self
    }

    /// Applies both policy fields at once.
    pub fn apply_policy(&mut self, policy: OpenPolicy) {
        self.wait_for_server_changes = policy.wait_for_server_changes;
        self.server_wait_timeout = policy.server_wait_timeout.filter(|t| !t.is_zero());
    }

    /// Captures the current policy fields.
    pub fn policy(&self) -> OpenPolicy {
        OpenPolicy {
            wait_for_server_changes: self.wait_for_server_changes,
            server_wait_timeout: self.server_wait_timeout,
        }
    }

    /// Derives the local store layout under `root`.
    pub fn layout(&self, root: &Path) -> StoreLayout {
        StoreLayout::for_configuration(root, self)
    }
}

impl fmt::Debug for SyncConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfiguration")
            .field("identity", &self.authority.identity())
            .field("locator", &self.locator.as_str())
            .field("wait_for_server_changes", &self.wait_for_server_changes)
            .field("server_wait_timeout", &self.server_wait_timeout)
            .finish()
    }
}

/// Builder for [`SyncConfiguration`].
///
/// `build` fails with `ConstructionDisallowed` unless both the authority
/// and the locator were supplied.
#[derive(Default)]
pub struct SyncConfigurationBuilder {
    authority: Option<Arc<dyn Authority>>,
    locator: Option<String>,
    policy: OpenPolicy,
}

impl SyncConfigurationBuilder {
    /// Sets the authority.
    #[must_use]
    pub fn authority(mut self, authority: Arc<dyn Authority>) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Sets the unresolved locator.
    #[must_use]
    pub fn locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    /// Sets whether opens wait for the initial server download.
    #[must_use]
    pub fn wait_for_server_changes(mut self, wait: bool) -> Self {
        self.policy.wait_for_server_changes = wait;
        self
    }

    /// Sets the wait bound.
    #[must_use]
    pub fn server_wait_timeout(mut self, timeout: Duration) -> Self {
        self.policy.server_wait_timeout = Some(timeout);
        self
    }

    /// Sets both policy fields.
    #[must_use]
    pub fn policy(mut self, policy: OpenPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> ValidationResult<SyncConfiguration> {
        let authority = self
            .authority
            .ok_or(ValidationError::ConstructionDisallowed {
                missing: "authority",
            })?;
        let locator = self
            .locator
            .ok_or(ValidationError::ConstructionDisallowed { missing: "locator" })?;

        let mut config = SyncConfiguration::new(authority, &locator)?;
        config.apply_policy(self.policy);
        Ok(config)
    }
}
