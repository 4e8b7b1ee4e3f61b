//! Open command implementation.

use replica_config::{OpenPolicy, SessionAuthority, SyncConfiguration};
use replica_open::{
    CoordinatorConfig, ExecutionContexts, FileStoreEngine, MockSessionProvider, OpenCoordinator,
    OpenError, OpenState, SyncError,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tracing::info;

/// Options for the open command.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Storage root directory.
    pub root: PathBuf,
    /// Wait for the initial server download.
    pub wait: bool,
    /// Wait bound in seconds.
    pub timeout: Option<f64>,
    /// JSON file holding an `OpenPolicy`.
    pub policy_file: Option<PathBuf>,
    /// Simulated download duration in milliseconds.
    pub download_ms: u64,
    /// Simulated download failure message.
    pub fail: Option<String>,
    /// Use the asynchronous open path.
    pub asynchronous: bool,
    /// Treat the calling thread as non-blockable.
    pub non_blockable: bool,
}

/// Outcome of an open.
#[derive(Debug, Serialize)]
pub struct OpenReport {
    /// Resolved locator.
    pub locator: String,
    /// Local store file.
    pub path: String,
    /// Whether the async path was used.
    pub asynchronous: bool,
    /// Whether the open waited for the server.
    pub wait_for_server_changes: bool,
    /// Effective wait bound in seconds.
    pub timeout_secs: Option<f64>,
    /// Open state when control returned.
    pub state: String,
    /// Milliseconds until control returned or the callback ran.
    pub elapsed_ms: u128,
    /// Error, if the open did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reads the policy from the options.
pub fn load_policy(options: &OpenOptions) -> Result<OpenPolicy, Box<dyn std::error::Error>> {
    if let Some(path) = &options.policy_file {
        let text = std::fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&text)?);
    }

    Ok(OpenPolicy {
        wait_for_server_changes: options.wait,
        server_wait_timeout: options.timeout.and_then(replica_config::timeout_from_secs),
    })
}

/// Opens a replica and reports what happened.
pub fn execute(
    identity: &str,
    locator: &str,
    options: &OpenOptions,
) -> Result<OpenReport, Box<dyn std::error::Error>> {
    let policy = load_policy(options)?;
    let mut config = SyncConfiguration::new(Arc::new(SessionAuthority::new(identity)), locator)?;
    config.apply_policy(policy);

    let sessions = MockSessionProvider::with_delay(Duration::from_millis(options.download_ms));
    if let Some(message) = &options.fail {
        sessions.set_download_failure(Some(SyncError::ServerError(message.clone())));
    }

    let contexts = Arc::new(ExecutionContexts::new());
    let _guard = options.non_blockable.then(|| contexts.designate_current());
    let coordinator = OpenCoordinator::new(
        CoordinatorConfig::new(&options.root),
        FileStoreEngine::new(),
        sessions,
    )
    .with_contexts(Arc::clone(&contexts));

    let start = Instant::now();
    let (result, state) = if options.asynchronous {
        let (tx, rx) = mpsc::channel();
        let task = coordinator.open_async(&config, move |result| {
            let _ = tx.send(result);
        })?;
        info!(locator = %config.locator(), "open started asynchronously");

        let result = rx
            .recv()
            .map_err(|_| "open worker exited without a result")?;
        let state = task.state();
        task.join()?;
        (result, state)
    } else {
        let result = coordinator.open(&config);
        let state = sync_state(&policy, &result);
        (result, state)
    };

    Ok(OpenReport {
        locator: config.locator().to_string(),
        path: coordinator
            .layout_for(&config)
            .store_file()
            .display()
            .to_string(),
        asynchronous: options.asynchronous,
        wait_for_server_changes: policy.wait_for_server_changes,
        timeout_secs: policy.effective_timeout().map(|t| t.as_secs_f64()),
        state: state.to_string(),
        elapsed_ms: start.elapsed().as_millis(),
        error: result.err().map(|e| e.to_string()),
    })
}

fn sync_state<T>(policy: &OpenPolicy, result: &Result<T, OpenError>) -> OpenState {
    match result {
        Ok(_) if policy.wait_for_server_changes => OpenState::Ready,
        Ok(_) => OpenState::Downloading,
        Err(OpenError::TimedOut { .. }) => OpenState::TimedOut,
        Err(OpenError::Failed(_)) => OpenState::Failed,
        Err(_) => OpenState::NotStarted,
    }
}

/// Runs the open command.
pub fn run(
    identity: &str,
    locator: &str,
    options: OpenOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = execute(identity, locator, &options)?;

    println!("Locator: {}", report.locator);
    println!("Path:    {}", report.path);
    println!(
        "Mode:    {}",
        if report.asynchronous { "async" } else { "sync" }
    );
    println!("Wait:    {}", report.wait_for_server_changes);
    match report.timeout_secs {
        Some(secs) => println!("Timeout: {secs}s"),
        None => println!("Timeout: none"),
    }
    println!("State:   {}", report.state);
    println!("Elapsed: {}ms", report.elapsed_ms);

    match report.error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}
