/// Scheduling substrate seam
///
/// The dispatch core describes work as `DispatchTask` values and hands them to
/// a `TaskQueue`; whichever substrate runs them calls back into a
/// `TaskExecutor`. `LocalTaskQueue` is the in-process implementation.
mod local;

pub use local::{JoinBarrier, LocalTaskQueue};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueError;
use crate::models::NotificationSnapshot;

/// Unit of work passed between scheduler stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum DispatchTask {
    /// Fan a notification out into batches
    Expand { notification: NotificationSnapshot },
    /// Send to the devices in `[offset, offset + limit)` of the filtered set
    SendBatch {
        notification: NotificationSnapshot,
        offset: usize,
        limit: usize,
    },
    /// Send to one device, looked up by id at execution time
    SendOne {
        device_id: Uuid,
        payload: serde_json::Value,
    },
    /// Mark the notification sent once every batch has completed
    Finalize { notification_id: Option<Uuid> },
}

impl DispatchTask {
    pub fn name(&self) -> &'static str {
        match self {
            DispatchTask::Expand { .. } => "expand",
            DispatchTask::SendBatch { .. } => "send_batch",
            DispatchTask::SendOne { .. } => "send_one",
            DispatchTask::Finalize { .. } => "finalize",
        }
    }
}

/// Runs a task; the returned flag is the unit's logical success
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: DispatchTask) -> bool;
}

/// Scheduling substrate with at-least-once semantics
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn schedule(&self, task: DispatchTask) -> Result<(), QueueError>;

    /// Runs every task independently, with no ordering between them
    async fn schedule_group(&self, tasks: Vec<DispatchTask>) -> Result<(), QueueError>;

    /// Like `schedule_group`, then runs `on_complete` exactly once after all
    /// tasks have finished, whatever their individual results
    async fn schedule_join(
        &self,
        tasks: Vec<DispatchTask>,
        on_complete: DispatchTask,
    ) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceFilter;
    use serde_json::json;

    #[test]
    fn test_task_wire_format() {
        let task = DispatchTask::SendBatch {
            notification: NotificationSnapshot {
                id: Some(Uuid::nil()),
                payload: json!({"k": "v"}),
                filter: DeviceFilter::default(),
            },
            offset: 1000,
            limit: 1000,
        };

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["task"], "send_batch");
        assert_eq!(value["offset"], 1000);

        let decoded: DispatchTask = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, task);
    }
}
