//! Test fixtures and gated collaborators.
//!
//! Gated collaborators block until a [`Latch`] is released, which lets a
//! test observe what an open does before the store or the server answers.

use parking_lot::{Condvar, Mutex};
use replica_config::{
    Authority, OpenPolicy, SessionAuthority, StoreLayout, SyncConfiguration,
};
use replica_open::{
    CoordinatorConfig, DownloadSession, MemoryStoreEngine, OpenCoordinator, SessionProvider,
    StoreEngine, StoreResult, SyncError, SyncResult,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Poll interval used by test coordinators.
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A one-shot gate shared between a test and gated collaborators.
#[derive(Debug, Clone, Default)]
pub struct Latch {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Latch {
    /// Creates a closed latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the latch, waking every waiter.
    pub fn release(&self) {
        let (open, condvar) = &*self.inner;
        *open.lock() = true;
        condvar.notify_all();
    }

    /// Returns true once released.
    pub fn is_released(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Blocks until released.
    pub fn wait(&self) {
        let (open, condvar) = &*self.inner;
        let mut open = open.lock();
        while !*open {
            condvar.wait(&mut open);
        }
    }
}

/// A store engine whose opens block until a latch is released.
#[derive(Debug)]
pub struct GatedStoreEngine<E> {
    inner: E,
    latch: Latch,
}

impl<E: StoreEngine> GatedStoreEngine<E> {
    /// Wraps `inner`.
    pub fn new(inner: E, latch: Latch) -> Self {
        Self { inner, latch }
    }

    /// Gets the wrapped engine.
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: StoreEngine> StoreEngine for GatedStoreEngine<E> {
    type Store = E::Store;

    fn open_local(&self, layout: &StoreLayout) -> StoreResult<E::Store> {
        self.latch.wait();
        self.inner.open_local(layout)
    }
}

/// A session provider whose downloads block until a latch is released.
#[derive(Debug, Clone)]
pub struct GatedSessionProvider {
    latch: Latch,
    failure: Option<SyncError>,
    network_calls: Arc<AtomicUsize>,
}

impl GatedSessionProvider {
    /// Creates a provider whose downloads succeed once `latch` is released.
    pub fn new(latch: Latch) -> Self {
        Self {
            latch,
            failure: None,
            network_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes downloads fail with `error` once released.
    pub fn failing(latch: Latch, error: SyncError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(latch)
        }
    }

    /// Number of sessions created.
    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }
}

impl SessionProvider for GatedSessionProvider {
    type Session = GatedSession;

    fn session_for(
        &self,
        _configuration: &SyncConfiguration,
        _layout: &StoreLayout,
    ) -> SyncResult<GatedSession> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GatedSession {
            latch: self.latch.clone(),
            failure: self.failure.clone(),
        })
    }
}

/// A session created by [`GatedSessionProvider`].
#[derive(Debug)]
pub struct GatedSession {
    latch: Latch,
    failure: Option<SyncError>,
}

impl DownloadSession for GatedSession {
    fn download_initial(&self) -> SyncResult<()> {
        self.latch.wait();
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// A temporary storage root removed on drop.
#[derive(Debug)]
pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    /// Creates a fresh root.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Path of the root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates an active authority.
pub fn authority(identity: &str) -> Arc<SessionAuthority> {
    Arc::new(SessionAuthority::new(identity))
}

/// Creates a configuration, panicking on validation errors.
pub fn configuration(
    authority: Arc<dyn Authority>,
    locator: &str,
    policy: OpenPolicy,
) -> SyncConfiguration {
    let mut config =
        SyncConfiguration::new(authority, locator).expect("Failed to build sync configuration");
    config.apply_policy(policy);
    config
}

/// Coordinator config rooted at `root` with a short poll interval.
pub fn test_config(root: &Path) -> CoordinatorConfig {
    CoordinatorConfig::new(root).with_authority_poll_interval(TEST_POLL_INTERVAL)
}

/// An in-memory coordinator whose opens and downloads wait on `latch`.
pub fn gated_coordinator(
    latch: &Latch,
) -> OpenCoordinator<GatedStoreEngine<MemoryStoreEngine>, GatedSessionProvider> {
    OpenCoordinator::new(
        test_config(Path::new("/replicas")),
        GatedStoreEngine::new(MemoryStoreEngine::new(), latch.clone()),
        GatedSessionProvider::new(latch.clone()),
    )
}
