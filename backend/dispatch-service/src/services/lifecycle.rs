use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ConfigError, DispatchError, Result, StoreError};
use crate::metrics;
use crate::queue::{DispatchTask, TaskQueue};
use crate::store::PushStore;

/// Notification lifecycle: pending sweep, finalize and retention
pub struct Lifecycle {
    store: Arc<dyn PushStore>,
    queue: Arc<dyn TaskQueue>,
    max_age: Option<chrono::Duration>,
}

impl Lifecycle {
    pub fn new(
        store: Arc<dyn PushStore>,
        queue: Arc<dyn TaskQueue>,
        max_age: Option<chrono::Duration>,
    ) -> Self {
        Self {
            store,
            queue,
            max_age,
        }
    }

    /// Hand every active not-sent notification to the scheduler.
    ///
    /// Each notification is claimed before it is scheduled, so overlapping
    /// sweeps never expand the same one twice. A claim whose hand-off fails is
    /// released again. Returns how many were handed off.
    pub async fn check_pending(&self) -> Result<usize> {
        let pending = self.store.pending_notifications().await?;
        let mut scheduled = 0usize;

        for notification in pending {
            match self.store.claim_pending(notification.id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(notification_id = %notification.id, "Notification claimed elsewhere");
                    continue;
                }
                Err(e) => {
                    error!(notification_id = %notification.id, error = %e, "Failed to claim notification");
                    continue;
                }
            }

            let task = DispatchTask::Expand {
                notification: notification.snapshot(),
            };
            if let Err(e) = self.queue.schedule(task).await {
                self.release(notification.id).await;
                return Err(e.into());
            }
            scheduled += 1;
        }

        if scheduled > 0 {
            info!(scheduled, "Pending notifications handed to scheduler");
        }
        Ok(scheduled)
    }

    /// Return a claimed notification to `NotSent` so the next sweep retries it
    pub(crate) async fn release(&self, id: Uuid) {
        match self.store.release_claim(id).await {
            Ok(true) => warn!(notification_id = %id, "Hand-off failed, claim released"),
            Ok(false) => debug!(notification_id = %id, "Claim already moved on"),
            Err(e) => error!(notification_id = %id, error = %e, "Failed to release claim"),
        }
    }

    /// Mark a notification sent once all of its batches completed.
    ///
    /// Returns `false` for transient submissions, missing rows and
    /// notifications that were already finalized.
    pub async fn finalize(&self, notification_id: Option<Uuid>) -> bool {
        let Some(id) = notification_id else {
            debug!("Transient submission finished, nothing to finalize");
            return false;
        };

        let mut notification = match self.store.find_notification(id).await {
            Ok(notification) => notification,
            Err(StoreError::NotFound) => {
                error!(notification_id = %id, "Notification vanished before finalize");
                return false;
            }
            Err(e) => {
                error!(notification_id = %id, error = %e, "Failed to load notification");
                return false;
            }
        };

        if let Err(e) = notification.finish(Utc::now()) {
            warn!(notification_id = %id, error = %e, "Notification already finalized");
            return false;
        }

        match self.store.save_notification(&notification).await {
            Ok(()) => {
                metrics::observe_finalized();
                info!(notification_id = %id, "Notification sent");
                true
            }
            Err(e) => {
                error!(notification_id = %id, error = %e, "Failed to save finalized notification");
                false
            }
        }
    }

    /// Purge sent notifications finished longer ago than the configured max age.
    ///
    /// Fails with `MissingMaxAge` before touching storage when no age is set.
    pub async fn clean_sent_notifications(&self) -> Result<u64> {
        let max_age = self
            .max_age
            .ok_or(DispatchError::Config(ConfigError::MissingMaxAge))?;

        let cutoff = Utc::now() - max_age;
        let deleted = self.store.delete_sent_before(cutoff).await?;
        info!(deleted, %cutoff, "Old sent notifications purged");
        Ok(deleted)
    }
}
