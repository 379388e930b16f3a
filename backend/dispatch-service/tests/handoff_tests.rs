//! Claim and hand-off failure handling in the pending sweep and on submit

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{service_with, FailingQueue, FlakyStore, RecordingQueue, Scheduled};
use dispatch_service::error::{DispatchError, QueueError};
use dispatch_service::models::{Notification, SentState};
use dispatch_service::{DispatchTask, MemoryStore, PushStore, SubmitNotification};
use serde_json::json;

#[tokio::test]
async fn test_failed_sweep_hand_off_releases_claim() {
    let store = Arc::new(MemoryStore::new());
    let notification = Notification::new("stuck".to_string(), json!({}), Default::default());
    store.insert_notification(&notification).await.unwrap();

    let queue = Arc::new(FailingQueue::default());
    let (service, _) = service_with(store.clone(), queue.clone(), 1000);

    let result = service.lifecycle().check_pending().await;
    assert!(matches!(result, Err(DispatchError::Queue(QueueError::Closed))));
    assert_eq!(queue.attempts.load(Ordering::SeqCst), 1);

    let stored = store.find_notification(notification.id).await.unwrap();
    assert_eq!(stored.sent, SentState::NotSent);
    assert!(stored.date_started.is_none());

    // A healthy queue picks it up on the next sweep
    let recording = Arc::new(RecordingQueue::default());
    let (service, _) = service_with(store.clone(), recording.clone(), 1000);
    assert_eq!(service.lifecycle().check_pending().await.unwrap(), 1);
    assert_eq!(
        store.find_notification(notification.id).await.unwrap().sent,
        SentState::InProgress
    );
}

#[tokio::test]
async fn test_failed_submit_hand_off_releases_claim() {
    let store = Arc::new(MemoryStore::new());
    let (service, _) = service_with(store.clone(), Arc::new(FailingQueue::default()), 1000);

    let result = service
        .submit_notification(SubmitNotification::new("later", json!({})))
        .await;
    assert!(matches!(result, Err(DispatchError::Queue(QueueError::Closed))));

    let pending = store.pending_notifications().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].sent, SentState::NotSent);
}

#[tokio::test]
async fn test_claim_error_skips_only_that_notification() {
    let memory = Arc::new(MemoryStore::new());
    let first = Notification::new("locked".to_string(), json!({}), Default::default());
    let second = Notification::new("free".to_string(), json!({}), Default::default());
    memory.insert_notification(&first).await.unwrap();
    memory.insert_notification(&second).await.unwrap();

    let store = Arc::new(FlakyStore::new(memory.clone()));
    store.break_claim(first.id);
    let queue = Arc::new(RecordingQueue::default());
    let (service, _) = service_with(store, queue.clone(), 1000);

    assert_eq!(service.lifecycle().check_pending().await.unwrap(), 1);

    let expanded: Vec<_> = queue
        .history()
        .into_iter()
        .filter_map(|s| match s {
            Scheduled::Single(DispatchTask::Expand { notification }) => notification.id,
            _ => None,
        })
        .collect();
    assert_eq!(expanded, vec![second.id]);
    assert_eq!(
        memory.find_notification(first.id).await.unwrap().sent,
        SentState::NotSent
    );
}
