use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::{debug, error, info, warn};

use super::{DispatchTask, TaskExecutor, TaskQueue};
use crate::error::QueueError;

/// Completion counter shared by the members of one join
///
/// Each member calls `complete_one` exactly once when it finishes; the call
/// that brings the counter to zero takes the callback.
pub struct JoinBarrier {
    remaining: AtomicUsize,
    on_complete: Mutex<Option<DispatchTask>>,
}

impl JoinBarrier {
    pub fn new(members: usize, on_complete: DispatchTask) -> Self {
        Self {
            remaining: AtomicUsize::new(members),
            on_complete: Mutex::new(Some(on_complete)),
        }
    }

    pub fn complete_one(&self) -> Option<DispatchTask> {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return None;
        }
        self.on_complete
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }
}

struct Job {
    task: DispatchTask,
    barrier: Option<Arc<JoinBarrier>>,
}

/// In-process task substrate
///
/// Jobs go through an unbounded channel; `run` executes them concurrently,
/// bounded by `concurrency`. A panicking task still counts as complete for
/// its join barrier.
pub struct LocalTaskQueue {
    sender: mpsc::UnboundedSender<Job>,
    receiver: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    concurrency: usize,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl LocalTaskQueue {
    pub fn new(concurrency: usize) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            sender,
            receiver: tokio::sync::Mutex::new(Some(receiver)),
            concurrency: concurrency.max(1),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        })
    }

    fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.sender.send(job).map_err(|_| {
            self.finish_one();
            QueueError::Closed
        })
    }

    fn finish_one(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Jobs queued or running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves once no job is queued or running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Worker loop; returns when `shutdown` resolves
    pub async fn run<S>(self: Arc<Self>, executor: Arc<dyn TaskExecutor>, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        let Some(mut receiver) = self.receiver.lock().await.take() else {
            warn!("Task queue worker already running");
            return;
        };

        let permits = Arc::new(Semaphore::new(self.concurrency));
        info!(concurrency = self.concurrency, "Task queue worker started");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                job = receiver.recv() => {
                    let Some(job) = job else { break };
                    let Ok(permit) = permits.clone().acquire_owned().await else { break };

                    let queue = self.clone();
                    let executor = executor.clone();
                    tokio::spawn(async move {
                        queue.run_job(executor, job).await;
                        drop(permit);
                    });
                }
            }
        }

        info!("Task queue worker stopped");
        *self.receiver.lock().await = Some(receiver);
    }

    async fn run_job(&self, executor: Arc<dyn TaskExecutor>, job: Job) {
        let name = job.task.name();
        let result = AssertUnwindSafe(executor.execute(job.task))
            .catch_unwind()
            .await;

        match result {
            Ok(success) => debug!(task = name, success, "Task completed"),
            Err(_) => error!(task = name, "Task panicked"),
        }

        if let Some(barrier) = job.barrier {
            if let Some(callback) = barrier.complete_one() {
                debug!(task = callback.name(), "Join barrier released");
                if let Err(e) = self.enqueue(Job {
                    task: callback,
                    barrier: None,
                }) {
                    error!(error = %e, "Failed to enqueue join callback");
                }
            }
        }

        self.finish_one();
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn schedule(&self, task: DispatchTask) -> Result<(), QueueError> {
        self.enqueue(Job {
            task,
            barrier: None,
        })
    }

    async fn schedule_group(&self, tasks: Vec<DispatchTask>) -> Result<(), QueueError> {
        for task in tasks {
            self.enqueue(Job {
                task,
                barrier: None,
            })?;
        }
        Ok(())
    }

    async fn schedule_join(
        &self,
        tasks: Vec<DispatchTask>,
        on_complete: DispatchTask,
    ) -> Result<(), QueueError> {
        if tasks.is_empty() {
            return self.schedule(on_complete).await;
        }

        let barrier = Arc::new(JoinBarrier::new(tasks.len(), on_complete));
        for task in tasks {
            self.enqueue(Job {
                task,
                barrier: Some(barrier.clone()),
            })?;
        }
        Ok(())
    }
}
