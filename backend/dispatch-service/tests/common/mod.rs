//! Shared fixtures: in-memory store, scripted transports and a recording queue
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dispatch_service::config::DispatchConfig;
use dispatch_service::error::{QueueError, StoreError, StoreResult};
use dispatch_service::models::{Device, DeviceFilter, Notification, Platform};
use dispatch_service::transport::{DispatchOutcome, PushTransport, TransportFactory};
use dispatch_service::{
    DispatchTask, DispatcherRegistry, MemoryStore, PushService, PushStore, TaskExecutor, TaskQueue,
};
use uuid::Uuid;

/// Transport answering from a per-key script; unknown keys are delivered
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<String, DispatchOutcome>>,
    sent: Mutex<Vec<(Platform, String)>>,
}

impl ScriptedTransport {
    pub fn script(&self, key: &str, outcome: DispatchOutcome) {
        self.script.lock().unwrap().insert(key.to_string(), outcome);
    }

    pub fn sent_keys(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, k)| k.clone()).collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

struct PlatformTransport {
    platform: Platform,
    inner: Arc<ScriptedTransport>,
}

#[async_trait]
impl PushTransport for PlatformTransport {
    async fn send(&self, device_key: &str, _payload: &serde_json::Value) -> DispatchOutcome {
        self.inner
            .sent
            .lock()
            .unwrap()
            .push((self.platform, device_key.to_string()));
        self.inner
            .script
            .lock()
            .unwrap()
            .get(device_key)
            .cloned()
            .unwrap_or(DispatchOutcome::Sent(None))
    }
}

pub struct ScriptedFactory {
    pub transport: Arc<ScriptedTransport>,
    pub created: AtomicUsize,
}

impl TransportFactory for ScriptedFactory {
    fn create(&self, platform: Platform) -> Arc<dyn PushTransport> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(PlatformTransport {
            platform,
            inner: self.transport.clone(),
        })
    }
}

/// What a caller handed to the queue
#[derive(Debug, Clone, PartialEq)]
pub enum Scheduled {
    Single(DispatchTask),
    Group(Vec<DispatchTask>),
    Join {
        tasks: Vec<DispatchTask>,
        on_complete: DispatchTask,
    },
}

/// Queue that records scheduling calls and runs them only on `drain`
#[derive(Default)]
pub struct RecordingQueue {
    pending: Mutex<VecDeque<Scheduled>>,
    history: Mutex<Vec<Scheduled>>,
}

impl RecordingQueue {
    fn record(&self, scheduled: Scheduled) {
        self.history.lock().unwrap().push(scheduled.clone());
        self.pending.lock().unwrap().push_back(scheduled);
    }

    pub fn history(&self) -> Vec<Scheduled> {
        self.history.lock().unwrap().clone()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Runs everything scheduled, including work scheduled while draining
    pub async fn drain(&self, executor: &dyn TaskExecutor) {
        loop {
            let next = self.pending.lock().unwrap().pop_front();
            let Some(scheduled) = next else { break };
            match scheduled {
                Scheduled::Single(task) => {
                    executor.execute(task).await;
                }
                Scheduled::Group(tasks) => {
                    for task in tasks {
                        executor.execute(task).await;
                    }
                }
                Scheduled::Join { tasks, on_complete } => {
                    for task in tasks {
                        executor.execute(task).await;
                    }
                    executor.execute(on_complete).await;
                }
            }
        }
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn schedule(&self, task: DispatchTask) -> Result<(), QueueError> {
        self.record(Scheduled::Single(task));
        Ok(())
    }

    async fn schedule_group(&self, tasks: Vec<DispatchTask>) -> Result<(), QueueError> {
        self.record(Scheduled::Group(tasks));
        Ok(())
    }

    async fn schedule_join(
        &self,
        tasks: Vec<DispatchTask>,
        on_complete: DispatchTask,
    ) -> Result<(), QueueError> {
        self.record(Scheduled::Join { tasks, on_complete });
        Ok(())
    }
}

/// Queue whose every scheduling call fails as if the broker were down
#[derive(Default)]
pub struct FailingQueue {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl TaskQueue for FailingQueue {
    async fn schedule(&self, _task: DispatchTask) -> Result<(), QueueError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::Closed)
    }

    async fn schedule_group(&self, _tasks: Vec<DispatchTask>) -> Result<(), QueueError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::Closed)
    }

    async fn schedule_join(
        &self,
        _tasks: Vec<DispatchTask>,
        _on_complete: DispatchTask,
    ) -> Result<(), QueueError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::Closed)
    }
}

/// `MemoryStore` wrapper that refuses to claim one chosen notification
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    pub broken_claim: Mutex<Option<Uuid>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            broken_claim: Mutex::new(None),
        }
    }

    pub fn break_claim(&self, id: Uuid) {
        *self.broken_claim.lock().unwrap() = Some(id);
    }
}

#[async_trait]
impl PushStore for FlakyStore {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.inner.insert_notification(notification).await
    }

    async fn find_notification(&self, id: Uuid) -> StoreResult<Notification> {
        self.inner.find_notification(id).await
    }

    async fn save_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.inner.save_notification(notification).await
    }

    async fn pending_notifications(&self) -> StoreResult<Vec<Notification>> {
        self.inner.pending_notifications().await
    }

    async fn claim_pending(&self, id: Uuid) -> StoreResult<bool> {
        if *self.broken_claim.lock().unwrap() == Some(id) {
            return Err(StoreError::Corrupt("claim row locked".to_string()));
        }
        self.inner.claim_pending(id).await
    }

    async fn release_claim(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.release_claim(id).await
    }

    async fn delete_sent_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.delete_sent_before(cutoff).await
    }

    async fn insert_device(&self, device: &Device) -> StoreResult<()> {
        self.inner.insert_device(device).await
    }

    async fn find_device(&self, id: Uuid) -> StoreResult<Device> {
        self.inner.find_device(id).await
    }

    async fn count_devices(&self, filter: &DeviceFilter) -> StoreResult<usize> {
        self.inner.count_devices(filter).await
    }

    async fn filtered_devices(
        &self,
        filter: &DeviceFilter,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<Device>> {
        self.inner.filtered_devices(filter, offset, limit).await
    }

    async fn update_device_key(&self, id: Uuid, new_key: &str) -> StoreResult<()> {
        self.inner.update_device_key(id, new_key).await
    }

    async fn delete_device(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_device(id).await
    }

    async fn delete_devices_by_key(&self, key: &str) -> StoreResult<u64> {
        self.inner.delete_devices_by_key(key).await
    }
}

/// Service over arbitrary store and queue, with a scripted transport
pub fn service_with(
    store: Arc<dyn PushStore>,
    queue: Arc<dyn TaskQueue>,
    batch_size: usize,
) -> (PushService, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::default());
    let factory = Arc::new(ScriptedFactory {
        transport: transport.clone(),
        created: AtomicUsize::new(0),
    });
    let registry = Arc::new(DispatcherRegistry::new(factory));
    let config = DispatchConfig {
        batch_size,
        ..DispatchConfig::default()
    };
    (
        PushService::new(store, registry, queue, &config),
        transport,
    )
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
    pub queue: Arc<RecordingQueue>,
    pub service: PushService,
}

impl Harness {
    pub fn new(batch_size: usize, max_age: Option<chrono::Duration>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::default());
        let factory = Arc::new(ScriptedFactory {
            transport: transport.clone(),
            created: AtomicUsize::new(0),
        });
        let registry = Arc::new(DispatcherRegistry::new(factory));
        let queue = Arc::new(RecordingQueue::default());

        let config = DispatchConfig {
            batch_size,
            notification_max_age: max_age,
            ..DispatchConfig::default()
        };
        let service = PushService::new(store.clone(), registry, queue.clone(), &config);

        Self {
            store,
            transport,
            queue,
            service,
        }
    }

    pub async fn drain(&self) {
        self.queue.drain(&self.service).await;
    }
}
