pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod registry;
pub mod services;
pub mod store;
pub mod transport;

pub use config::Config;
pub use error::{DispatchError, Result};
pub use queue::{DispatchTask, LocalTaskQueue, TaskExecutor, TaskQueue};
pub use registry::DispatcherRegistry;
pub use services::{PushService, SubmitNotification};
pub use store::{MemoryStore, PgPushStore, PushStore};
