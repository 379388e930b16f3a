/// Dispatch core services
///
/// - `BatchSender`: per-device sends and registry reconciliation
/// - `FanoutScheduler`: batch expansion with a join on finalize
/// - `Lifecycle`: pending sweep, finalize, retention
/// - `PushService`: public entry points and task execution
pub mod batch_sender;
pub mod lifecycle;
pub mod push_service;
pub mod scheduler;

pub use batch_sender::{BatchSender, DeviceRef};
pub use lifecycle::Lifecycle;
pub use push_service::{PushService, SubmitNotification};
pub use scheduler::FanoutScheduler;
