/// Batch Sender
///
/// Sends one notification payload to a slice of the filtered device set and
/// reconciles the device registry from each outcome:
/// - canonical id: rotate the stored key, or drop the row if the new key is
///   already registered
/// - invalid token: delete the device
/// - anything else: log and leave the device alone
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::metrics;
use crate::models::{Device, NotificationSnapshot};
use crate::registry::DispatcherRegistry;
use crate::store::PushStore;
use crate::transport::DispatchOutcome;

/// Device given either as a loaded record or as an id to resolve
#[derive(Debug, Clone)]
pub enum DeviceRef {
    Loaded(Device),
    Id(Uuid),
}

pub struct BatchSender {
    store: Arc<dyn PushStore>,
    registry: Arc<DispatcherRegistry>,
}

impl BatchSender {
    pub fn new(store: Arc<dyn PushStore>, registry: Arc<DispatcherRegistry>) -> Self {
        Self { store, registry }
    }

    /// Send to the devices in `[offset, offset + limit)`.
    ///
    /// Returns `false` without error when the notification no longer exists.
    /// Per-device failures never fail the batch.
    pub async fn send_batch(
        &self,
        snapshot: &NotificationSnapshot,
        offset: usize,
        limit: usize,
    ) -> bool {
        let (payload, filter) = match snapshot.id {
            Some(id) => match self.store.find_notification(id).await {
                Ok(notification) => (notification.payload, notification.filter),
                Err(StoreError::NotFound) => {
                    debug!(notification_id = %id, "Notification gone, skipping batch");
                    return false;
                }
                Err(e) => {
                    error!(notification_id = %id, error = %e, "Failed to load notification");
                    return false;
                }
            },
            None => (snapshot.payload.clone(), snapshot.filter),
        };

        let devices = match self.store.filtered_devices(&filter, offset, limit).await {
            Ok(devices) => devices,
            Err(e) => {
                error!(offset, limit, error = %e, "Failed to load device batch");
                return false;
            }
        };

        let total = devices.len();
        let mut delivered = 0usize;
        for device in devices {
            if self.send_one(DeviceRef::Loaded(device), &payload).await {
                delivered += 1;
            }
        }

        info!(
            notification_id = ?snapshot.id,
            offset,
            total,
            delivered,
            "Batch complete"
        );
        true
    }

    /// Send to a single device and apply the outcome policy.
    ///
    /// Returns `true` when the provider accepted the push; `false` when the
    /// device no longer exists or the send failed.
    pub async fn send_one(&self, target: DeviceRef, payload: &serde_json::Value) -> bool {
        let device = match target {
            DeviceRef::Loaded(device) => device,
            DeviceRef::Id(id) => match self.store.find_device(id).await {
                Ok(device) => device,
                Err(StoreError::NotFound) => {
                    debug!(device_id = %id, "Device no longer exists");
                    return false;
                }
                Err(e) => {
                    error!(device_id = %id, error = %e, "Failed to load device");
                    return false;
                }
            },
        };

        let dispatcher = self.registry.get_dispatcher(device.platform);
        let outcome = dispatcher.send(&device.key, payload).await;
        metrics::observe_dispatch(device.platform.as_str(), outcome.label());

        match outcome {
            DispatchOutcome::Sent(None) => true,
            DispatchOutcome::Sent(Some(new_key)) => {
                if new_key != device.key {
                    self.rotate_key(&device, &new_key).await;
                }
                true
            }
            DispatchOutcome::InvalidToken => {
                debug!(device_id = %device.id, "Token for device does not exist, deleting");
                self.delete(&device, "deleted_invalid").await;
                false
            }
            DispatchOutcome::InvalidData
            | DispatchOutcome::AuthFailure
            | DispatchOutcome::ServerFailure => {
                error!(
                    device_id = %device.id,
                    platform = %device.platform,
                    outcome = outcome.label(),
                    "An error occurred while sending push notification"
                );
                false
            }
        }
    }

    async fn rotate_key(&self, device: &Device, new_key: &str) {
        match self.store.update_device_key(device.id, new_key).await {
            Ok(()) => {
                debug!(device_id = %device.id, "Device key rotated to canonical id");
                metrics::observe_device_mutation("rotated");
            }
            Err(StoreError::UniquenessViolation) => {
                // The canonical registration already has its own row
                debug!(device_id = %device.id, "Canonical key already registered, dropping device");
                self.delete(device, "deleted_collision").await;
            }
            Err(StoreError::NotFound) => {
                debug!(device_id = %device.id, "Device deleted before key rotation");
            }
            Err(e) => {
                warn!(device_id = %device.id, error = %e, "Failed to rotate device key");
            }
        }
    }

    async fn delete(&self, device: &Device, action: &str) {
        match self.store.delete_device(device.id).await {
            Ok(true) => metrics::observe_device_mutation(action),
            Ok(false) => debug!(device_id = %device.id, "Device already deleted"),
            Err(e) => warn!(device_id = %device.id, error = %e, "Failed to delete device"),
        }
    }
}
