//! Integration tests for the open policy.

use replica_config::{OpenPolicy, SyncConfiguration};
use replica_open::{
    FileStoreEngine, MemoryStore, MemoryStoreEngine, MockSessionProvider, OpenCoordinator,
    OpenError, OpenState, StoreEngine, SyncError,
};
use replica_testkit::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

const LOCATOR: &str = "realms://sync.example.org/~/notes";

fn memory_coordinator(delay: Duration) -> OpenCoordinator<MemoryStoreEngine, MockSessionProvider> {
    OpenCoordinator::new(
        test_config(std::path::Path::new("/replicas")),
        MemoryStoreEngine::new(),
        MockSessionProvider::with_delay(delay),
    )
}

/// Opens the replica's local store directly, bypassing the coordinator.
fn open_directly(
    coordinator: &OpenCoordinator<MemoryStoreEngine, MockSessionProvider>,
    config: &SyncConfiguration,
) -> MemoryStore {
    coordinator
        .engine()
        .open_local(&coordinator.layout_for(config))
        .unwrap()
}

fn alice(policy: OpenPolicy) -> SyncConfiguration {
    configuration(authority("alice"), LOCATOR, policy)
}

#[test]
fn disabled_timeout_never_times_out() {
    let coordinator = memory_coordinator(Duration::from_millis(300));

    let mut config = alice(OpenPolicy::wait(None));
    config.set_server_wait_timeout_secs(-1.0);
    assert!(coordinator.open(&config).is_ok());

    config.set_server_wait_timeout(Duration::ZERO);
    assert!(coordinator.open(&config).is_ok());

    assert_eq!(coordinator.sessions().downloads_completed(), 2);
}

#[test]
fn waiting_open_on_non_blockable_thread_fails_fast() {
    let coordinator = memory_coordinator(Duration::from_secs(5));
    let _guard = coordinator.contexts().designate_current();

    let start = Instant::now();
    let err = coordinator
        .open(&alice(OpenPolicy::wait(Some(Duration::from_secs(10)))))
        .unwrap_err();

    assert!(matches!(err, OpenError::MainThreadBlockingDisallowed));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(coordinator.engine().open_count(), 0);
    assert_eq!(coordinator.sessions().network_calls(), 0);
}

#[test]
fn waiting_open_on_worker_thread_reaches_ready() {
    let coordinator = Arc::new(memory_coordinator(Duration::from_millis(50)));
    let _guard = coordinator.contexts().designate_current();

    let worker = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || {
            coordinator.open(&alice(OpenPolicy::wait(Some(Duration::from_secs(5)))))
        })
    };

    let store = worker.join().unwrap().unwrap();
    store.put("greeting", b"hello".to_vec());
    assert_eq!(coordinator.sessions().downloads_completed(), 1);
}

#[test]
fn waiting_open_times_out_at_the_bound() {
    let coordinator = memory_coordinator(Duration::from_secs(3));
    let timeout = Duration::from_millis(100);
    let mut config = alice(OpenPolicy::wait(Some(timeout)));

    let existing = open_directly(&coordinator, &config);
    existing.put("before", b"local".to_vec());

    let start = Instant::now();
    let err = coordinator.open(&config).unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, OpenError::TimedOut { timeout: t } if t == timeout));
    assert!(elapsed >= timeout);
    assert!(elapsed < Duration::from_secs(1));

    // The store is still usable without waiting.
    config.set_wait_for_server_changes(false);
    let store = coordinator.open(&config).unwrap();
    assert!(store.same_store(&existing));
    assert_eq!(store.get("before"), Some(b"local".to_vec()));
}

#[test]
fn failures_are_distinct_from_timeouts() {
    let coordinator = memory_coordinator(Duration::from_millis(10));
    coordinator
        .sessions()
        .set_download_failure(Some(SyncError::transport_fatal("connection refused")));

    let err = coordinator
        .open(&alice(OpenPolicy::wait(Some(Duration::from_secs(5)))))
        .unwrap_err();

    assert!(!err.is_timeout());
    assert!(matches!(
        err,
        OpenError::Failed(SyncError::Transport { retryable: false, .. })
    ));
}

#[test]
fn connect_failure_is_propagated() {
    let coordinator = memory_coordinator(Duration::ZERO);
    coordinator
        .sessions()
        .set_connect_failure(Some(SyncError::AuthenticationFailed("expired token".into())));

    let err = coordinator.open(&alice(OpenPolicy::wait(None))).unwrap_err();
    assert!(matches!(err, OpenError::Failed(SyncError::AuthenticationFailed(_))));
}

#[test]
fn revoked_authority_fails_the_wait() {
    let coordinator = memory_coordinator(Duration::from_secs(3));
    let user = authority("alice");
    let config = configuration(user.clone(), LOCATOR, OpenPolicy::wait(None));

    let revoker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        user.revoke();
    });

    let start = Instant::now();
    let err = coordinator.open(&config).unwrap_err();
    revoker.join().unwrap();

    assert!(matches!(err, OpenError::Failed(SyncError::AuthorityRevoked(ref id)) if id == "alice"));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn non_waiting_open_does_not_consult_the_authority() {
    let coordinator = memory_coordinator(Duration::ZERO);
    let user = authority("alice");
    user.log_out();

    let config = configuration(user, LOCATOR, OpenPolicy::immediate());
    assert!(coordinator.open(&config).is_ok());
}

#[test]
fn async_open_never_blocks_the_caller() {
    let policies = [
        OpenPolicy::immediate(),
        OpenPolicy {
            wait_for_server_changes: false,
            server_wait_timeout: Some(Duration::from_millis(20)),
        },
        OpenPolicy::wait(None),
        OpenPolicy::wait(Some(Duration::from_secs(5))),
    ];

    for policy in policies {
        let latch = Latch::new();
        let coordinator = gated_coordinator(&latch);
        let calls = Arc::new(AtomicUsize::new(0));

        let task = {
            let calls = Arc::clone(&calls);
            coordinator
                .open_async(&alice(policy), move |result| {
                    assert!(result.is_ok());
                    calls.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };

        // Neither the store nor the server has answered yet.
        assert_eq!(calls.load(Ordering::SeqCst), 0, "policy {policy:?}");
        assert!(!task.is_finished());

        latch.release();
        task.join().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "policy {policy:?}");
    }
}

#[test]
fn async_waiting_open_notifies_after_terminal_state() {
    let coordinator = memory_coordinator(Duration::from_millis(50));
    let (tx, rx) = mpsc::channel();

    let start = Instant::now();
    let task = coordinator
        .open_async(&alice(OpenPolicy::wait(None)), move |result| {
            tx.send((result.is_ok(), start.elapsed())).unwrap();
        })
        .unwrap();

    let (ok, notified_after) = rx.recv().unwrap();
    assert!(ok);
    assert!(notified_after >= Duration::from_millis(50));
    assert_eq!(task.state(), OpenState::Ready);
    task.join().unwrap();
}

#[test]
fn async_waiting_open_reports_timeout_through_callback() {
    let coordinator = memory_coordinator(Duration::from_secs(3));
    let (tx, rx) = mpsc::channel();

    let task = coordinator
        .open_async(
            &alice(OpenPolicy::wait(Some(Duration::from_millis(50)))),
            move |result| {
                tx.send(result.err().map(|e| e.is_timeout())).unwrap();
            },
        )
        .unwrap();

    assert_eq!(rx.recv().unwrap(), Some(true));
    assert_eq!(task.state(), OpenState::TimedOut);
}

#[test]
fn async_waiting_open_ignores_non_blockable_threads() {
    let coordinator = memory_coordinator(Duration::from_millis(10));
    let _guard = coordinator.contexts().designate_current();
    let (tx, rx) = mpsc::channel();

    coordinator
        .open_async(&alice(OpenPolicy::wait(None)), move |result| {
            tx.send(result.is_ok()).unwrap();
        })
        .unwrap();

    assert!(rx.recv().unwrap());
}

#[test]
fn async_non_waiting_open_notifies_before_download() {
    let coordinator = memory_coordinator(Duration::from_millis(300));
    let (tx, rx) = mpsc::channel();

    let task = coordinator
        .open_async(&alice(OpenPolicy::immediate()), move |result| {
            tx.send(result.is_ok()).unwrap();
        })
        .unwrap();

    assert!(rx.recv().unwrap());
    assert_eq!(task.state(), OpenState::Downloading);

    let deadline = Instant::now() + Duration::from_secs(5);
    while task.state() != OpenState::Ready && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(task.state(), OpenState::Ready);
}

fn split_gated_coordinator(
    store_gate: &Latch,
    sessions: GatedSessionProvider,
) -> OpenCoordinator<GatedStoreEngine<MemoryStoreEngine>, GatedSessionProvider> {
    OpenCoordinator::new(
        test_config(std::path::Path::new("/replicas")),
        GatedStoreEngine::new(MemoryStoreEngine::new(), store_gate.clone()),
        sessions,
    )
}

#[test]
fn policy_is_captured_when_open_begins() {
    let store_gate = Latch::new();
    let download_gate = Latch::new();
    let coordinator =
        split_gated_coordinator(&store_gate, GatedSessionProvider::new(download_gate.clone()));
    let mut config = alice(OpenPolicy::immediate());
    let (tx, rx) = mpsc::channel();

    let task = coordinator
        .open_async(&config, move |result| {
            tx.send(result.is_ok()).unwrap();
        })
        .unwrap();

    // Switch to waiting while the open is still blocked on the store.
    config.set_wait_for_server_changes(true);
    store_gate.release();

    // The download never completes, so only a non-waiting open can notify.
    let notified = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(notified);
    assert_eq!(task.state(), OpenState::Downloading);
    assert_eq!(coordinator.engine().inner().open_count(), 1);
    task.join().unwrap();

    download_gate.release();
    let deadline = Instant::now() + Duration::from_secs(5);
    while coordinator.sessions().network_calls() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(coordinator.sessions().network_calls(), 1);
}

#[test]
fn async_waiting_open_reports_session_failure() {
    let latch = Latch::new();
    let coordinator = split_gated_coordinator(
        &latch,
        GatedSessionProvider::failing(latch.clone(), SyncError::ServerError("maintenance".into())),
    );
    let (tx, rx) = mpsc::channel();

    let task = coordinator
        .open_async(&alice(OpenPolicy::wait(None)), move |result| {
            tx.send(result.err()).unwrap();
        })
        .unwrap();

    latch.release();
    let err = rx.recv().unwrap();
    assert!(matches!(err, Some(OpenError::Failed(SyncError::ServerError(_)))));
    assert_eq!(task.state(), OpenState::Failed);
    assert_eq!(coordinator.sessions().network_calls(), 1);
    assert_eq!(coordinator.engine().inner().open_count(), 1);
    task.join().unwrap();
}

#[test]
fn file_backed_store_survives_timeout() {
    let root = TestRoot::new();
    let coordinator = OpenCoordinator::new(
        test_config(root.path()),
        FileStoreEngine::new(),
        MockSessionProvider::with_delay(Duration::from_secs(3)),
    );
    let mut config = alice(OpenPolicy::wait(Some(Duration::from_millis(50))));

    let err = coordinator.open(&config).unwrap_err();
    assert!(err.is_timeout());

    let layout = coordinator.layout_for(&config);
    assert!(layout.store_file().is_file());
    assert!(layout.lock_file().is_file());
    assert!(layout.management_dir().is_dir());

    config.set_wait_for_server_changes(false);
    let store = coordinator.open(&config).unwrap();
    assert_eq!(store.layout(), &layout);
}

#[tokio::test]
async fn awaitable_open_resolves() {
    let coordinator = memory_coordinator(Duration::from_millis(20));

    let store = coordinator
        .open_future(&alice(OpenPolicy::wait(Some(Duration::from_secs(5)))))
        .await
        .unwrap();
    store.put("k", b"v".to_vec());

    let err = {
        coordinator
            .sessions()
            .set_download_failure(Some(SyncError::ServerError("maintenance".into())));
        coordinator
            .open_future(&alice(OpenPolicy::wait(None)))
            .await
            .unwrap_err()
    };
    assert!(matches!(err, OpenError::Failed(SyncError::ServerError(_))));
}
