use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::PushStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{Device, DeviceFilter, Notification, SentState};

/// In-process store with the same uniqueness and ordering rules as Postgres
#[derive(Default)]
pub struct MemoryStore {
    notifications: RwLock<HashMap<Uuid, Notification>>,
    devices: RwLock<Vec<Device>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn notification_count(&self) -> usize {
        self.notifications.read().await.len()
    }

    fn sorted(devices: impl Iterator<Item = Device>) -> Vec<Device> {
        let mut devices: Vec<Device> = devices.collect();
        devices.sort_by(|a, b| (a.date_created, a.id).cmp(&(b.date_created, b.id)));
        devices
    }
}

#[async_trait]
impl PushStore for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        let mut notifications = self.notifications.write().await;
        if notifications.contains_key(&notification.id) {
            return Err(StoreError::Validation(format!(
                "notification {} already exists",
                notification.id
            )));
        }
        notifications.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn find_notification(&self, id: Uuid) -> StoreResult<Notification> {
        self.notifications
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn save_notification(&self, notification: &Notification) -> StoreResult<()> {
        let mut notifications = self.notifications.write().await;
        let slot = notifications
            .get_mut(&notification.id)
            .ok_or(StoreError::NotFound)?;
        *slot = notification.clone();
        Ok(())
    }

    async fn pending_notifications(&self) -> StoreResult<Vec<Notification>> {
        let mut pending: Vec<Notification> = self
            .notifications
            .read()
            .await
            .values()
            .filter(|n| n.active && n.sent == SentState::NotSent)
            .cloned()
            .collect();
        pending.sort_by_key(|n| n.date_created);
        Ok(pending)
    }

    async fn claim_pending(&self, id: Uuid) -> StoreResult<bool> {
        let mut notifications = self.notifications.write().await;
        match notifications.get_mut(&id) {
            Some(n) if n.sent == SentState::NotSent => {
                n.sent = SentState::InProgress;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_claim(&self, id: Uuid) -> StoreResult<bool> {
        let mut notifications = self.notifications.write().await;
        match notifications.get_mut(&id) {
            Some(n) if n.sent == SentState::InProgress && n.date_started.is_none() => {
                n.sent = SentState::NotSent;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_sent_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut notifications = self.notifications.write().await;
        let before = notifications.len();
        notifications.retain(|_, n| {
            !(n.sent == SentState::Sent && n.date_finished.map_or(false, |d| d < cutoff))
        });
        Ok((before - notifications.len()) as u64)
    }

    async fn insert_device(&self, device: &Device) -> StoreResult<()> {
        let mut devices = self.devices.write().await;
        if devices
            .iter()
            .any(|d| d.key == device.key && d.platform == device.platform)
        {
            return Err(StoreError::UniquenessViolation);
        }
        devices.push(device.clone());
        Ok(())
    }

    async fn find_device(&self, id: Uuid) -> StoreResult<Device> {
        self.devices
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn count_devices(&self, filter: &DeviceFilter) -> StoreResult<usize> {
        Ok(self
            .devices
            .read()
            .await
            .iter()
            .filter(|d| filter.matches(d))
            .count())
    }

    async fn filtered_devices(
        &self,
        filter: &DeviceFilter,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<Device>> {
        let devices = self.devices.read().await;
        let matching = Self::sorted(devices.iter().filter(|d| filter.matches(d)).cloned());
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn update_device_key(&self, id: Uuid, new_key: &str) -> StoreResult<()> {
        let mut devices = self.devices.write().await;
        let platform = devices
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.platform)
            .ok_or(StoreError::NotFound)?;

        if devices
            .iter()
            .any(|d| d.id != id && d.key == new_key && d.platform == platform)
        {
            return Err(StoreError::UniquenessViolation);
        }

        if let Some(device) = devices.iter_mut().find(|d| d.id == id) {
            device.key = new_key.to_string();
        }
        Ok(())
    }

    async fn delete_device(&self, id: Uuid) -> StoreResult<bool> {
        let mut devices = self.devices.write().await;
        let before = devices.len();
        devices.retain(|d| d.id != id);
        Ok(devices.len() < before)
    }

    async fn delete_devices_by_key(&self, key: &str) -> StoreResult<u64> {
        let mut devices = self.devices.write().await;
        let before = devices.len();
        devices.retain(|d| d.key != key);
        Ok((before - devices.len()) as u64)
    }
}
