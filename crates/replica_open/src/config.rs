//! Configuration for the open coordinator.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for an [`OpenCoordinator`](crate::OpenCoordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Directory under which local replicas are laid out.
    pub root_dir: PathBuf,
    /// How often the authority is checked while waiting for a download.
    ///
    /// Also bounds how late a timeout can be noticed.
    pub authority_poll_interval: Duration,
}

impl CoordinatorConfig {
    /// Creates a configuration rooted at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            authority_poll_interval: Duration::from_millis(50),
        }
    }

    /// Sets the authority poll interval. Zero is raised to one millisecond.
    pub fn with_authority_poll_interval(mut self, interval: Duration) -> Self {
        self.authority_poll_interval = interval.max(Duration::from_millis(1));
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new("replicas")
    }
}
