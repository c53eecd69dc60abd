use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use infermux::dispatch::job::Job;
use infermux::dispatch::queue;
use infermux::error::DispatchError;

fn make_job(tag: u64) -> Job {
    let (job, _handle) = Job::new("/v1/chat/completions", json!({ "tag": tag }), 3);
    job
}

#[tokio::test]
async fn test_fifo_order_preserved() {
    let (tx, rx) = queue::bounded(8);
    let shutdown = CancellationToken::new();

    for tag in 0..3u64 {
        tx.enqueue(make_job(tag)).await.unwrap();
    }

    for expected in 0..3u64 {
        let job = rx.next(&shutdown).await.unwrap();
        assert_eq!(job.body["tag"], expected);
    }
}

#[tokio::test]
async fn test_try_enqueue_rejects_when_full() {
    let (tx, _rx) = queue::bounded(2);

    tx.try_enqueue(make_job(0)).unwrap();
    tx.try_enqueue(make_job(1)).unwrap();

    let (job, err) = tx.try_enqueue(make_job(2)).unwrap_err();
    assert!(matches!(err, DispatchError::Overloaded));
    assert_eq!(job.body["tag"], 2);

    assert_eq!(tx.pending(), 2);
    assert_eq!(tx.capacity(), 2);
}

#[tokio::test]
async fn test_enqueue_waits_for_capacity() {
    let (tx, rx) = queue::bounded(1);
    let shutdown = CancellationToken::new();

    tx.enqueue(make_job(0)).await.unwrap();

    // Free one slot shortly after the producer starts waiting.
    let rx_clone = rx.clone();
    let shutdown_clone = shutdown.clone();
    let drainer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        rx_clone.next(&shutdown_clone).await
    });

    tx.enqueue(make_job(1)).await.unwrap();

    let drained = drainer.await.unwrap().unwrap();
    assert_eq!(drained.body["tag"], 0);
    assert_eq!(rx.next(&shutdown).await.unwrap().body["tag"], 1);
}

#[tokio::test]
async fn test_enqueue_aborts_when_deadline_fires_on_full_queue() {
    let (tx, _rx) = queue::bounded(1);
    tx.enqueue(make_job(0)).await.unwrap();

    let (job, _handle) = Job::new("/v1/chat/completions", json!({}), 3);
    job.cancel_after(Duration::from_millis(30));

    let start = tokio::time::Instant::now();
    let (_, err) = tx.enqueue(job).await.unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_enqueue_rejects_already_cancelled_job() {
    let (tx, _rx) = queue::bounded(8);

    let (job, _handle) = Job::new("/v1/chat/completions", json!({}), 3);
    job.cancel.cancel();

    let (_, err) = tx.enqueue(job).await.unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));
}

#[tokio::test]
async fn test_enqueue_reports_closed_queue() {
    let (tx, rx) = queue::bounded(2);
    drop(rx);

    let (_, err) = tx.enqueue(make_job(0)).await.unwrap_err();
    assert!(matches!(err, DispatchError::QueueClosed));
}

#[tokio::test]
async fn test_intake_yields_none_on_shutdown() {
    let (_tx, rx) = queue::bounded(2);
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    assert!(rx.next(&shutdown).await.is_none());
}

#[tokio::test]
async fn test_pending_tracks_depth() {
    let (tx, rx) = queue::bounded(4);
    let shutdown = CancellationToken::new();

    assert_eq!(tx.pending(), 0);
    tx.enqueue(make_job(0)).await.unwrap();
    tx.enqueue(make_job(1)).await.unwrap();
    assert_eq!(tx.pending(), 2);

    rx.next(&shutdown).await.unwrap();
    assert_eq!(tx.pending(), 1);
}
