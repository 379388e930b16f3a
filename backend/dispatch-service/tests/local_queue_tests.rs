//! End-to-end runs through the in-process task queue

mod common;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedFactory, ScriptedTransport};
use dispatch_service::config::DispatchConfig;
use dispatch_service::models::{Platform, SentState};
use dispatch_service::store::PushStore;
use dispatch_service::transport::DispatchOutcome;
use dispatch_service::{DispatcherRegistry, LocalTaskQueue, MemoryStore, PushService, SubmitNotification};
use serde_json::json;
use tokio::sync::oneshot;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fanout_completes_through_local_queue() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(ScriptedTransport::default());
    let factory = Arc::new(ScriptedFactory {
        transport: transport.clone(),
        created: AtomicUsize::new(0),
    });
    let registry = Arc::new(DispatcherRegistry::new(factory.clone()));
    let queue = LocalTaskQueue::new(8);
    let config = DispatchConfig {
        batch_size: 4,
        ..DispatchConfig::default()
    };
    let service = Arc::new(PushService::new(
        store.clone(),
        registry.clone(),
        queue.clone(),
        &config,
    ));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let worker = tokio::spawn(queue.clone().run(service.clone(), async {
        let _ = stop_rx.await;
    }));

    for i in 0..10 {
        let platform = if i % 2 == 0 { Platform::Android } else { Platform::Ios };
        service
            .register_device(format!("token-{}", i), platform, None)
            .await
            .unwrap();
    }
    transport.script("token-9", DispatchOutcome::InvalidToken);

    let notification = service
        .submit_notification(SubmitNotification::new("hello", json!({"message": "hi"})))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), queue.wait_idle())
        .await
        .unwrap();

    let stored = store.find_notification(notification.id).await.unwrap();
    assert_eq!(stored.sent, SentState::Sent);
    assert_eq!(transport.sent_count(), 10);
    assert_eq!(store.device_count().await, 9);
    assert_eq!(registry.cached_platforms(), 2);
    assert_eq!(
        factory.created.load(std::sync::atomic::Ordering::SeqCst),
        2
    );

    stop_tx.send(()).unwrap();
    worker.await.unwrap();
}
