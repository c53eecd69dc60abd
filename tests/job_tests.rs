use std::time::Duration;

use serde_json::json;

use infermux::dispatch::job::Job;
use infermux::error::DispatchError;

#[tokio::test]
async fn test_new_job_carries_retry_budget() {
    let (job, _handle) = Job::new("/v1/chat/completions", json!({ "x": 1 }), 3);

    assert_eq!(job.endpoint, "/v1/chat/completions");
    assert_eq!(job.body["x"], 1);
    assert_eq!(job.retry_count, 0);
    assert_eq!(job.max_retries, 3);
    assert!(job.retries_left());
    assert!(!job.cancel.is_cancelled());
}

#[tokio::test]
async fn test_cancel_after_fires_token() {
    let (job, _handle) = Job::new("/v1/embeddings", json!({}), 0);
    job.cancel_after(Duration::from_millis(20));

    assert!(!job.cancel.is_cancelled());
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(job.cancel.is_cancelled());
}

#[tokio::test]
async fn test_handle_resolves_queue_closed_when_job_dropped() {
    // A job dropped without emitting (dispatcher torn down) must not hang
    // its producer.
    let (job, handle) = Job::new("/v1/chat/completions", json!({}), 3);
    drop(job);

    let err = handle.outcome().await.unwrap_err();
    assert!(matches!(err, DispatchError::QueueClosed));
}

#[tokio::test]
async fn test_retries_left_exhausts() {
    let (mut job, _handle) = Job::new("/v1/chat/completions", json!({}), 2);

    assert!(job.retries_left());
    job.retry_count += 1;
    assert!(job.retries_left());
    job.retry_count += 1;
    assert!(!job.retries_left());
}

#[tokio::test]
async fn test_zero_retry_budget() {
    let (job, _handle) = Job::new("/v1/chat/completions", json!({}), 0);
    assert!(!job.retries_left());
}

#[tokio::test]
async fn test_job_ids_are_unique() {
    let (a, _ha) = Job::new("/a", json!({}), 0);
    let (b, _hb) = Job::new("/b", json!({}), 0);
    assert_ne!(a.id, b.id);
}
