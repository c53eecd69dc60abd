//! Health monitor sweeps, status transitions, and eviction.


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use infermux::monitor::HealthMonitor;
use infermux::registry::{WorkerRegistry, WorkerStatus};
use test_harness::{
    assert_eventually, start_dispatcher_with_workers, test_config, MockBehavior, MockWorker,
};

fn probe_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

fn make_monitor(registry: Arc<RwLock<WorkerRegistry>>) -> HealthMonitor {
    HealthMonitor::new(
        registry,
        probe_client(),
        Duration::from_millis(100),
        3,
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn test_sweep_refreshes_healthy_worker() {
    let worker = MockWorker::start(MockBehavior::Echo).await;
    let registry = Arc::new(RwLock::new(WorkerRegistry::new()));
    registry.write().await.upsert(&worker.url(), "m");

    // Degrade the streak, then let a passing probe repair it.
    registry.write().await.record_probe_failure(&worker.url(), 3);
    let before = registry.read().await.get(&worker.url()).unwrap().last_heartbeat;

    let monitor = make_monitor(registry.clone());
    monitor.sweep().await;

    let record = registry.read().await.get(&worker.url()).unwrap().clone();
    assert_eq!(record.status, WorkerStatus::Healthy);
    assert_eq!(record.failed_pings, 0);
    assert!(record.last_heartbeat >= before);
    assert_eq!(worker.health_count(), 1);
}

#[tokio::test]
async fn test_worker_survives_below_probe_threshold() {
    let worker = MockWorker::start(MockBehavior::Echo).await;
    worker.set_healthy(false);

    let registry = Arc::new(RwLock::new(WorkerRegistry::new()));
    registry.write().await.upsert(&worker.url(), "m");

    let monitor = make_monitor(registry.clone());
    monitor.sweep().await;
    monitor.sweep().await;

    // Two failures: still registered, streak recorded.
    let record = registry.read().await.get(&worker.url()).unwrap().clone();
    assert_eq!(record.failed_pings, 2);
    assert_eq!(record.status, WorkerStatus::Healthy);
}

#[tokio::test]
async fn test_worker_evicted_after_threshold_sweeps() {
    let worker = MockWorker::start(MockBehavior::Echo).await;
    worker.set_healthy(false);

    let registry = Arc::new(RwLock::new(WorkerRegistry::new()));
    registry.write().await.upsert(&worker.url(), "m");

    let monitor = make_monitor(registry.clone());
    monitor.sweep().await;
    monitor.sweep().await;
    monitor.sweep().await;

    assert!(registry.read().await.is_empty());
    assert_eq!(worker.health_count(), 3);
}

#[tokio::test]
async fn test_recovery_resets_streak_before_threshold() {
    let worker = MockWorker::start(MockBehavior::Echo).await;
    let registry = Arc::new(RwLock::new(WorkerRegistry::new()));
    registry.write().await.upsert(&worker.url(), "m");

    let monitor = make_monitor(registry.clone());

    worker.set_healthy(false);
    monitor.sweep().await;
    monitor.sweep().await;

    worker.set_healthy(true);
    monitor.sweep().await;

    // Recovery wipes the streak; two more bad sweeps must not evict.
    worker.set_healthy(false);
    monitor.sweep().await;
    monitor.sweep().await;

    let record = registry.read().await.get(&worker.url()).unwrap().clone();
    assert_eq!(record.failed_pings, 2);
    assert_eq!(registry.read().await.len(), 1);
}

#[tokio::test]
async fn test_unreachable_worker_is_evicted() {
    // Nothing listens here; every probe is a transport error.
    let registry = Arc::new(RwLock::new(WorkerRegistry::new()));
    registry.write().await.upsert("http://127.0.0.1:9", "m");

    let monitor = make_monitor(registry.clone());
    monitor.sweep().await;
    monitor.sweep().await;
    monitor.sweep().await;

    assert!(registry.read().await.is_empty());
}

#[tokio::test]
async fn test_busy_worker_is_not_a_failure_signal() {
    let worker = MockWorker::start(MockBehavior::Echo).await;
    let registry = Arc::new(RwLock::new(WorkerRegistry::new()));
    registry.write().await.upsert(&worker.url(), "m");
    registry.write().await.mark_busy(&worker.url());

    let monitor = make_monitor(registry.clone());
    monitor.sweep().await;

    let record = registry.read().await.get(&worker.url()).unwrap().clone();
    assert_eq!(record.status, WorkerStatus::Healthy);
    assert_eq!(record.failed_pings, 0);
    // The sweep never touches the busy flag.
    assert!(record.busy);
}

#[tokio::test]
async fn test_end_to_end_eviction_through_dispatcher() {
    let worker = MockWorker::start(MockBehavior::Echo).await;
    let dispatcher = start_dispatcher_with_workers(
        test_config().with_heartbeat_period(Duration::from_millis(50)),
        &[&worker],
    )
    .await;

    assert_eq!(dispatcher.stats().await.total_workers, 1);

    worker.set_healthy(false);

    let probe = dispatcher.clone();
    assert_eventually(
        || {
            let dispatcher = probe.clone();
            async move { dispatcher.stats().await.total_workers == 0 }
        },
        Duration::from_secs(3),
        "worker was not evicted after repeated failed probes",
    )
    .await;
}
