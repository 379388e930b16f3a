/// Durable store abstraction for notifications and devices
///
/// The dispatch core only talks to this trait. `MemoryStore` backs tests and
/// database-less runs; `PgPushStore` is the Postgres implementation.
mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgPushStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{Device, DeviceFilter, Notification};

#[async_trait]
pub trait PushStore: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()>;

    /// Returns `StoreError::NotFound` when the row is gone
    async fn find_notification(&self, id: Uuid) -> StoreResult<Notification>;

    /// Overwrites state, flags and timestamps of an existing notification
    async fn save_notification(&self, notification: &Notification) -> StoreResult<()>;

    /// Active notifications still in `NotSent`, oldest first
    async fn pending_notifications(&self) -> StoreResult<Vec<Notification>>;

    /// Atomically moves `NotSent -> InProgress`.
    ///
    /// Returns `false` when the notification is missing or already claimed.
    async fn claim_pending(&self, id: Uuid) -> StoreResult<bool>;

    /// Reverts a claim (`InProgress -> NotSent`) whose hand-off failed
    async fn release_claim(&self, id: Uuid) -> StoreResult<bool>;

    /// Deletes `Sent` notifications finished before `cutoff`
    async fn delete_sent_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    /// Fails with `StoreError::UniquenessViolation` on a `(key, platform)` collision
    async fn insert_device(&self, device: &Device) -> StoreResult<()>;

    async fn find_device(&self, id: Uuid) -> StoreResult<Device>;

    async fn count_devices(&self, filter: &DeviceFilter) -> StoreResult<usize>;

    /// Devices matching `filter` ordered by `(date_created, id)`, sliced to
    /// `[offset, offset + limit)`
    async fn filtered_devices(
        &self,
        filter: &DeviceFilter,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<Device>>;

    /// Single-statement key rotation.
    ///
    /// Fails with `StoreError::UniquenessViolation` when another device owns
    /// `(new_key, platform)` and `StoreError::NotFound` when the row is gone.
    async fn update_device_key(&self, id: Uuid, new_key: &str) -> StoreResult<()>;

    /// Returns whether a row was removed
    async fn delete_device(&self, id: Uuid) -> StoreResult<bool>;

    async fn delete_devices_by_key(&self, key: &str) -> StoreResult<u64>;
}
