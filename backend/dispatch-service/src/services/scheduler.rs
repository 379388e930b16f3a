use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::Lifecycle;
use crate::error::StoreError;
use crate::metrics;
use crate::models::{NotificationSnapshot, SentState};
use crate::queue::{DispatchTask, TaskQueue};
use crate::store::PushStore;

/// Fan-out scheduler
///
/// Splits the filtered device set into contiguous windows of `batch_size`,
/// schedules one batch per window and joins them on a single finalize task.
pub struct FanoutScheduler {
    store: Arc<dyn PushStore>,
    queue: Arc<dyn TaskQueue>,
    lifecycle: Arc<Lifecycle>,
    batch_size: usize,
}

impl FanoutScheduler {
    pub fn new(
        store: Arc<dyn PushStore>,
        queue: Arc<dyn TaskQueue>,
        lifecycle: Arc<Lifecycle>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            queue,
            lifecycle,
            batch_size: batch_size.max(1),
        }
    }

    /// Expand a notification into batches.
    ///
    /// Returns `false` when the notification is gone, disabled or already
    /// sent, or when scheduling failed.
    pub async fn expand(&self, snapshot: NotificationSnapshot) -> bool {
        let snapshot = match snapshot.id {
            Some(id) => {
                let mut notification = match self.store.find_notification(id).await {
                    Ok(notification) => notification,
                    Err(StoreError::NotFound) => {
                        debug!(notification_id = %id, "Notification gone before expansion");
                        return false;
                    }
                    Err(e) => {
                        error!(notification_id = %id, error = %e, "Failed to load notification");
                        return false;
                    }
                };

                if !notification.active {
                    info!(notification_id = %id, "Notification disabled, not expanding");
                    return false;
                }
                if notification.sent == SentState::Sent {
                    debug!(notification_id = %id, "Notification already sent");
                    return false;
                }

                if let Err(e) = notification.start(Utc::now()) {
                    warn!(notification_id = %id, error = %e, "Cannot start notification");
                    return false;
                }
                if let Err(e) = self.store.save_notification(&notification).await {
                    error!(notification_id = %id, error = %e, "Failed to stamp start date");
                    return false;
                }

                notification.snapshot()
            }
            None => snapshot,
        };

        let count = match self.store.count_devices(&snapshot.filter).await {
            Ok(count) => count,
            Err(e) => {
                error!(notification_id = ?snapshot.id, error = %e, "Failed to count devices");
                return false;
            }
        };

        if count == 0 {
            debug!(notification_id = ?snapshot.id, "No matching devices, finalizing");
            self.lifecycle.finalize(snapshot.id).await;
            return true;
        }

        let batches = self.batches(&snapshot, count);
        let batch_count = batches.len();
        let finalize = DispatchTask::Finalize {
            notification_id: snapshot.id,
        };

        if let Err(e) = self.queue.schedule_join(batches, finalize).await {
            error!(notification_id = ?snapshot.id, error = %e, "Failed to schedule batches");
            return false;
        }

        metrics::observe_batches_scheduled(batch_count);
        info!(
            notification_id = ?snapshot.id,
            devices = count,
            batches = batch_count,
            "Notification expanded"
        );
        true
    }

    fn batches(&self, snapshot: &NotificationSnapshot, count: usize) -> Vec<DispatchTask> {
        (0..count)
            .step_by(self.batch_size)
            .map(|offset| DispatchTask::SendBatch {
                notification: snapshot.clone(),
                offset,
                limit: self.batch_size,
            })
            .collect()
    }
}
