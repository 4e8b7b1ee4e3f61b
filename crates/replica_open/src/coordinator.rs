//! The open coordinator.

use crate::config::CoordinatorConfig;
use crate::context::ExecutionContexts;
use crate::error::{OpenError, OpenResult, SyncError, SyncResult};
use crate::session::{DownloadSession, SessionProvider};
use crate::state::{OpenState, OpenStateMachine};
use crate::store::StoreEngine;
use replica_config::{OpenPolicy, StoreLayout, SyncConfiguration};
use std::future::Future;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

struct Shared<E, P> {
    config: CoordinatorConfig,
    engine: E,
    sessions: P,
}

/// Opens local replicas according to their sync configuration.
///
/// The coordinator reads the configuration's policy once, when the open
/// begins:
///
/// - Without `wait_for_server_changes`, the open finishes as soon as the
///   local store is structurally open. The initial download runs on a
///   background thread.
/// - With `wait_for_server_changes`, the open finishes when the initial
///   download completes, fails, or exceeds `server_wait_timeout`. A
///   synchronous open of this kind is rejected on threads registered in
///   [`ExecutionContexts`].
pub struct OpenCoordinator<E: StoreEngine, P: SessionProvider> {
    shared: Arc<Shared<E, P>>,
    contexts: Arc<ExecutionContexts>,
}

impl<E, P> OpenCoordinator<E, P>
where
    E: StoreEngine + 'static,
    P: SessionProvider + 'static,
{
    /// Creates a coordinator with an empty execution context registry.
    pub fn new(config: CoordinatorConfig, engine: E, sessions: P) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                engine,
                sessions,
            }),
            contexts: Arc::new(ExecutionContexts::new()),
        }
    }

    /// Uses an execution context registry owned by the embedder.
    #[must_use]
    pub fn with_contexts(mut self, contexts: Arc<ExecutionContexts>) -> Self {
        self.contexts = contexts;
        self
    }

    /// Gets the execution context registry.
    pub fn contexts(&self) -> &Arc<ExecutionContexts> {
        &self.contexts
    }

    /// Gets the coordinator configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Gets the store engine.
    pub fn engine(&self) -> &E {
        &self.shared.engine
    }

    /// Gets the session provider.
    pub fn sessions(&self) -> &P {
        &self.shared.sessions
    }

    /// Derives the local layout used for `configuration`.
    pub fn layout_for(&self, configuration: &SyncConfiguration) -> StoreLayout {
        configuration.layout(&self.shared.config.root_dir)
    }

    /// Opens a replica, blocking the calling thread if the policy says so.
    ///
    /// # Errors
    ///
    /// - `MainThreadBlockingDisallowed` if waiting is requested on a
    ///   non-blockable thread; nothing is opened and no session is created
    /// - `TimedOut` if the wait bound elapses; the store stays usable
    /// - `Failed` if the session fails or the authority becomes invalid
    /// - `Store` if the local store cannot be opened
    pub fn open(&self, configuration: &SyncConfiguration) -> OpenResult<E::Store> {
        let policy = configuration.policy();
        if policy.wait_for_server_changes && self.contexts.is_current_non_blockable() {
            warn!(
                locator = %configuration.locator(),
                "refusing to wait for server changes on a non-blockable thread"
            );
            return Err(OpenError::MainThreadBlockingDisallowed);
        }

        let machine = Arc::new(OpenStateMachine::new());
        self.shared.open(configuration.clone(), policy, &machine)
    }

    /// Opens a replica without blocking the calling thread.
    ///
    /// `callback` runs exactly once on a worker thread, with the store or
    /// the error. When waiting, it runs after a terminal state is reached;
    /// otherwise as soon as the local store is open.
    ///
    /// # Errors
    ///
    /// Returns `Worker` only if the worker thread cannot be spawned, in
    /// which case `callback` is never called.
    pub fn open_async<F>(
        &self,
        configuration: &SyncConfiguration,
        callback: F,
    ) -> OpenResult<AsyncOpenTask>
    where
        F: FnOnce(OpenResult<E::Store>) + Send + 'static,
    {
        let policy = configuration.policy();
        let configuration = configuration.clone();
        let machine = Arc::new(OpenStateMachine::new());

        let shared = Arc::clone(&self.shared);
        let worker_machine = Arc::clone(&machine);
        let handle = thread::Builder::new()
            .name("replica-open".into())
            .spawn(move || {
                let result = shared.open(configuration, policy, &worker_machine);
                callback(result);
            })
            .map_err(|e| OpenError::Worker(e.to_string()))?;

        Ok(AsyncOpenTask { machine, handle })
    }

    /// Opens a replica, resolving when the async open's callback would run.
    pub fn open_future(
        &self,
        configuration: &SyncConfiguration,
    ) -> impl Future<Output = OpenResult<E::Store>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let task = self.open_async(configuration, move |result| {
            let _ = tx.send(result);
        });

        async move {
            let _task = task?;
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(OpenError::Worker(
                    "open worker exited without a result".into(),
                )),
            }
        }
    }
}

impl<E, P> Shared<E, P>
where
    E: StoreEngine + 'static,
    P: SessionProvider + 'static,
{
    fn open(
        self: &Arc<Self>,
        configuration: SyncConfiguration,
        policy: OpenPolicy,
        machine: &Arc<OpenStateMachine>,
    ) -> OpenResult<E::Store> {
        let layout = configuration.layout(&self.config.root_dir);
        let store = self.engine.open_local(&layout)?;
        info!(
            locator = %configuration.locator(),
            path = %layout.store_file().display(),
            wait = policy.wait_for_server_changes,
            "local store open"
        );

        if !policy.wait_for_server_changes {
            self.download_in_background(configuration, layout, Arc::clone(machine))?;
            return Ok(store);
        }

        machine.transition(OpenState::Downloading)?;
        match self.wait_for_download(configuration, layout, policy.effective_timeout()) {
            Ok(()) => {
                machine.transition(OpenState::Ready)?;
                info!(elapsed = ?machine.download_elapsed(), "initial download complete");
                Ok(store)
            }
            Err(e) => {
                let terminal = if e.is_timeout() {
                    OpenState::TimedOut
                } else {
                    OpenState::Failed
                };
                machine.transition(terminal)?;
                warn!(state = %terminal, error = %e, "initial download did not complete");
                Err(e)
            }
        }
    }

    fn download(&self, configuration: &SyncConfiguration, layout: &StoreLayout) -> SyncResult<()> {
        let session = self.sessions.session_for(configuration, layout)?;
        session.download_initial()
    }

    fn download_in_background(
        self: &Arc<Self>,
        configuration: SyncConfiguration,
        layout: StoreLayout,
        machine: Arc<OpenStateMachine>,
    ) -> OpenResult<()> {
        machine.transition(OpenState::Downloading)?;

        let shared = Arc::clone(self);
        let worker_machine = Arc::clone(&machine);
        let spawned = thread::Builder::new()
            .name("replica-sync".into())
            .spawn(move || {
                let next = match shared.download(&configuration, &layout) {
                    Ok(()) => {
                        debug!(locator = %configuration.locator(), "background download complete");
                        OpenState::Ready
                    }
                    Err(e) => {
                        warn!(locator = %configuration.locator(), error = %e, "background download failed");
                        OpenState::Failed
                    }
                };
                let _ = worker_machine.transition(next);
            });

        if let Err(e) = spawned {
            let _ = machine.transition(OpenState::Failed);
            return Err(OpenError::Worker(e.to_string()));
        }
        Ok(())
    }

    fn wait_for_download(
        self: &Arc<Self>,
        configuration: SyncConfiguration,
        layout: StoreLayout,
        timeout: Option<Duration>,
    ) -> OpenResult<()> {
        let authority = Arc::clone(configuration.authority());
        let (tx, rx) = mpsc::channel();

        let shared = Arc::clone(self);
        thread::Builder::new()
            .name("replica-download".into())
            .spawn(move || {
                let outcome = shared.download(&configuration, &layout);
                if tx.send(outcome).is_err() {
                    debug!(locator = %configuration.locator(), "download finished after the open stopped waiting");
                }
            })
            .map_err(|e| OpenError::Worker(e.to_string()))?;

        let bound = timeout.map(|timeout| (timeout, Instant::now() + timeout));
        let poll = self.config.authority_poll_interval;

        loop {
            if !authority.is_valid() {
                return Err(SyncError::AuthorityRevoked(authority.identity().to_string()).into());
            }

            let slice = match bound {
                Some((timeout, deadline)) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(OpenError::TimedOut { timeout });
                    }
                    remaining.min(poll)
                }
                None => poll,
            };

            match rx.recv_timeout(slice) {
                Ok(outcome) => return outcome.map_err(OpenError::from),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(OpenError::Worker(
                        "download worker exited without a result".into(),
                    ))
                }
            }
        }
    }
}

/// Handle to an asynchronous open.
#[derive(Debug)]
pub struct AsyncOpenTask {
    machine: Arc<OpenStateMachine>,
    handle: JoinHandle<()>,
}

impl AsyncOpenTask {
    /// Current state of the open.
    pub fn state(&self) -> OpenState {
        self.machine.state()
    }

    /// Time spent downloading, so far or in total.
    pub fn download_elapsed(&self) -> Option<Duration> {
        self.machine.download_elapsed()
    }

    /// Returns true once the callback has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the callback to return.
    pub fn join(self) -> OpenResult<()> {
        self.handle
            .join()
            .map_err(|_| OpenError::Worker("open callback panicked".into()))
    }
}
