use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::{BatchSender, DeviceRef, FanoutScheduler, Lifecycle};
use crate::config::DispatchConfig;
use crate::error::{Result, StoreError};
use crate::models::{Device, DeviceFilter, Notification, Platform, SentState};
use crate::queue::{DispatchTask, TaskExecutor, TaskQueue};
use crate::registry::DispatcherRegistry;
use crate::store::PushStore;

/// Request for `PushService::submit_notification`
#[derive(Debug, Clone)]
pub struct SubmitNotification {
    pub title: String,
    pub payload: serde_json::Value,
    /// Send to this device only, skipping the batch path
    pub target_device: Option<Uuid>,
    pub filter_user: Option<Uuid>,
    pub filter_type: Option<Platform>,
    pub persist: bool,
}

impl SubmitNotification {
    pub fn new(title: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            title: title.into(),
            payload,
            target_device: None,
            filter_user: None,
            filter_type: None,
            persist: true,
        }
    }

    pub fn to_device(mut self, device_id: Uuid) -> Self {
        self.target_device = Some(device_id);
        self
    }

    pub fn for_user(mut self, user_id: Uuid) -> Self {
        self.filter_user = Some(user_id);
        self
    }

    pub fn for_platform(mut self, platform: Platform) -> Self {
        self.filter_type = Some(platform);
        self
    }

    pub fn transient(mut self) -> Self {
        self.persist = false;
        self
    }
}

/// Push dispatch core
///
/// Owns the stage services and executes whatever the task queue hands back.
pub struct PushService {
    store: Arc<dyn PushStore>,
    queue: Arc<dyn TaskQueue>,
    sender: BatchSender,
    scheduler: FanoutScheduler,
    lifecycle: Arc<Lifecycle>,
}

impl PushService {
    pub fn new(
        store: Arc<dyn PushStore>,
        registry: Arc<DispatcherRegistry>,
        queue: Arc<dyn TaskQueue>,
        config: &DispatchConfig,
    ) -> Self {
        let lifecycle = Arc::new(Lifecycle::new(
            store.clone(),
            queue.clone(),
            config.notification_max_age,
        ));
        let scheduler = FanoutScheduler::new(
            store.clone(),
            queue.clone(),
            lifecycle.clone(),
            config.batch_size,
        );

        Self {
            sender: BatchSender::new(store.clone(), registry),
            scheduler,
            lifecycle,
            store,
            queue,
        }
    }

    pub fn sender(&self) -> &BatchSender {
        &self.sender
    }

    pub fn scheduler(&self) -> &FanoutScheduler {
        &self.scheduler
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Submit a notification.
    ///
    /// With a target device only one direct send is scheduled and nothing is
    /// stored. Otherwise the notification is stored (unless transient) and
    /// scheduled for expansion.
    pub async fn submit_notification(&self, request: SubmitNotification) -> Result<Notification> {
        let filter = DeviceFilter {
            platform: request.filter_type,
            user_id: request.filter_user,
        };
        let mut notification = Notification::new(request.title, request.payload, filter);

        if let Some(device_id) = request.target_device {
            self.queue
                .schedule(DispatchTask::SendOne {
                    device_id,
                    payload: notification.payload.clone(),
                })
                .await?;
            debug!(device_id = %device_id, "Direct send scheduled");
            return Ok(notification);
        }

        if !request.persist {
            let mut snapshot = notification.snapshot();
            snapshot.id = None;
            self.queue
                .schedule(DispatchTask::Expand {
                    notification: snapshot,
                })
                .await?;
            debug!("Transient notification scheduled");
            return Ok(notification);
        }

        self.store.insert_notification(&notification).await?;

        if self.store.claim_pending(notification.id).await? {
            notification.sent = SentState::InProgress;
            let task = DispatchTask::Expand {
                notification: notification.snapshot(),
            };
            if let Err(e) = self.queue.schedule(task).await {
                self.lifecycle.release(notification.id).await;
                return Err(e.into());
            }
        }

        info!(notification_id = %notification.id, "Notification submitted");
        Ok(notification)
    }

    /// Register a device token
    pub async fn register_device(
        &self,
        key: impl Into<String>,
        platform: Platform,
        user_id: Option<Uuid>,
    ) -> Result<Device> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(StoreError::Validation("device key must not be empty".to_string()).into());
        }

        let device = Device::new(key, platform, user_id);
        self.store.insert_device(&device).await?;
        debug!(device_id = %device.id, platform = %platform, "Device registered");
        Ok(device)
    }

    /// Remove every device registered under `key`
    pub async fn unregister_device(&self, key: &str) -> Result<u64> {
        let deleted = self.store.delete_devices_by_key(key).await?;
        if deleted == 0 {
            return Err(StoreError::NotFound.into());
        }
        debug!(deleted, "Devices unregistered");
        Ok(deleted)
    }
}

#[async_trait]
impl TaskExecutor for PushService {
    async fn execute(&self, task: DispatchTask) -> bool {
        match task {
            DispatchTask::Expand { notification } => self.scheduler.expand(notification).await,
            DispatchTask::SendBatch {
                notification,
                offset,
                limit,
            } => self.sender.send_batch(&notification, offset, limit).await,
            DispatchTask::SendOne { device_id, payload } => {
                self.sender
                    .send_one(DeviceRef::Id(device_id), &payload)
                    .await
            }
            DispatchTask::Finalize { notification_id } => {
                self.lifecycle.finalize(notification_id).await
            }
        }
    }
}
