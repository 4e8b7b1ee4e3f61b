//! Sync session boundary.
//!
//! The sync engine owns the wire protocol and merge logic. The coordinator
//! only asks it for a session and, when waiting, for the initial download.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use replica_config::{StoreLayout, SyncConfiguration};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A sync session bound to one replica.
pub trait DownloadSession: Send + 'static {
    /// Blocks until the initial set of server changes has been downloaded
    /// and applied to the local store.
    fn download_initial(&self) -> SyncResult<()>;
}

/// Creates sync sessions.
pub trait SessionProvider: Send + Sync {
    /// Session type.
    type Session: DownloadSession;

    /// Connects a session for the replica described by `configuration`.
    fn session_for(
        &self,
        configuration: &SyncConfiguration,
        layout: &StoreLayout,
    ) -> SyncResult<Self::Session>;
}

#[derive(Debug, Default)]
struct MockState {
    delay: Mutex<Duration>,
    download_failure: Mutex<Option<SyncError>>,
    connect_failure: Mutex<Option<SyncError>>,
    network_calls: AtomicUsize,
    downloads_completed: AtomicUsize,
}

/// A session provider simulating a remote server.
#[derive(Debug, Clone, Default)]
pub struct MockSessionProvider {
    state: Arc<MockState>,
}

impl MockSessionProvider {
    /// Creates a provider whose downloads complete immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider whose downloads take `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        let provider = Self::new();
        provider.set_delay(delay);
        provider
    }

    /// Sets how long each download takes.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = delay;
    }

    /// Makes downloads fail with `error` after the delay, or clears it.
    pub fn set_download_failure(&self, error: Option<SyncError>) {
        *self.state.download_failure.lock() = error;
    }

    /// Makes session creation fail with `error`, or clears it.
    pub fn set_connect_failure(&self, error: Option<SyncError>) {
        *self.state.connect_failure.lock() = error;
    }

    /// Number of simulated network calls (connects and downloads).
    pub fn network_calls(&self) -> usize {
        self.state.network_calls.load(Ordering::SeqCst)
    }

    /// Number of downloads that ran to successful completion.
    pub fn downloads_completed(&self) -> usize {
        self.state.downloads_completed.load(Ordering::SeqCst)
    }
}

impl SessionProvider for MockSessionProvider {
    type Session = MockSession;

    fn session_for(
        &self,
        _configuration: &SyncConfiguration,
        _layout: &StoreLayout,
    ) -> SyncResult<MockSession> {
        self.state.network_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.state.connect_failure.lock().clone() {
            return Err(error);
        }

        Ok(MockSession {
            state: Arc::clone(&self.state),
            delay: *self.state.delay.lock(),
            failure: self.state.download_failure.lock().clone(),
        })
    }
}

/// A session created by [`MockSessionProvider`].
///
/// Delay and outcome are fixed when the session is created.
#[derive(Debug)]
pub struct MockSession {
    state: Arc<MockState>,
    delay: Duration,
    failure: Option<SyncError>,
}

impl DownloadSession for MockSession {
    fn download_initial(&self) -> SyncResult<()> {
        self.state.network_calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => {
                self.state.downloads_completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_config::SessionAuthority;

    fn configuration() -> SyncConfiguration {
        SyncConfiguration::new(
            Arc::new(SessionAuthority::new("alice")),
            "realm://example.org/~/notes",
        )
        .unwrap()
    }

    #[test]
    fn mock_session_counts_network_calls() {
        let provider = MockSessionProvider::new();
        let layout = StoreLayout::new("/replicas/notes");

        let session = provider.session_for(&configuration(), &layout).unwrap();
        assert_eq!(provider.network_calls(), 1);

        session.download_initial().unwrap();
        assert_eq!(provider.network_calls(), 2);
        assert_eq!(provider.downloads_completed(), 1);
    }

    #[test]
    fn mock_session_failures() {
        let provider = MockSessionProvider::new();
        let layout = StoreLayout::new("/replicas/notes");

        provider.set_connect_failure(Some(SyncError::AuthenticationFailed("expired".into())));
        assert!(matches!(
            provider.session_for(&configuration(), &layout),
            Err(SyncError::AuthenticationFailed(_))
        ));

        provider.set_connect_failure(None);
        provider.set_download_failure(Some(SyncError::transport_retryable("reset")));
        let session = provider.session_for(&configuration(), &layout).unwrap();
        assert!(session.download_initial().is_err());
        assert_eq!(provider.downloads_completed(), 0);
    }
}
