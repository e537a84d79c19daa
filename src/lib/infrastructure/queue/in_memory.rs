//! Process-local queue service
//!
//! Every connection name maps onto the same channel. Nothing survives a
//! restart.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};

use crate::domain::delivery::{errors::QueueError, DeliveryJob, JobId, QueueService};

/// A job the queue gave up on
#[derive(Clone, Debug)]
pub struct DeadJob {
    /// The job as it was when it failed
    pub job: DeliveryJob,

    /// Why it failed
    pub reason: String,

    /// When it failed
    pub failed_at: DateTime<Utc>,
}

/// Receiving end handed to a [`Worker`](super::Worker)
#[derive(Debug)]
pub struct JobReceiver(pub(super) mpsc::UnboundedReceiver<DeliveryJob>);

#[derive(Debug, Default)]
struct QueueState {
    released: usize,
    dead: Vec<DeadJob>,
}

/// In-memory [`QueueService`]
#[derive(Debug, Clone)]
pub struct InMemoryQueue {
    sender: mpsc::UnboundedSender<DeliveryJob>,
    outstanding: Arc<watch::Sender<usize>>,
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryQueue {
    /// Create a queue and the receiver its worker pops jobs from
    pub fn new() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0);

        let queue = Self {
            sender,
            outstanding: Arc::new(outstanding),
            state: Arc::new(Mutex::new(QueueState::default())),
        };

        (queue, JobReceiver(receiver))
    }

    /// Jobs enqueued and not yet finished
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Number of releases so far
    pub async fn released(&self) -> usize {
        self.state.lock().await.released
    }

    /// Jobs that were given up on
    pub async fn dead_jobs(&self) -> Vec<DeadJob> {
        self.state.lock().await.dead.clone()
    }

    /// Wait until every enqueued job has succeeded or failed
    pub async fn wait_idle(&self) {
        let mut outstanding = self.outstanding.subscribe();

        // The sender lives in `self`, so this cannot fail while we wait.
        let _ = outstanding.wait_for(|count| *count == 0).await;
    }

    /// Mark a job as finished
    pub fn settle(&self, job: &DeliveryJob) {
        self.outstanding
            .send_modify(|count| *count = count.saturating_sub(1));

        info!(job = %job.id(), state = ?job.state(), "job settled");
    }
}

#[async_trait]
impl QueueService for InMemoryQueue {
    async fn enqueue(&self, job: DeliveryJob) -> Result<JobId, QueueError> {
        let id = job.id();
        let target = job.target().clone();

        self.outstanding.send_modify(|count| *count += 1);

        if self.sender.send(job).is_err() {
            self.outstanding
                .send_modify(|count| *count = count.saturating_sub(1));
            return Err(QueueError::Closed);
        }

        info!(
            job = %id,
            connection = target.connection.as_deref().unwrap_or("default"),
            queue = %target.queue,
            "job enqueued"
        );

        Ok(id)
    }

    async fn release(&self, job: &DeliveryJob, delay: Duration) -> Result<(), QueueError> {
        if self.sender.is_closed() {
            return Err(QueueError::Closed);
        }

        self.state.lock().await.released += 1;

        let queue = self.clone();
        let job = job.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if let Err(mpsc::error::SendError(job)) = queue.sender.send(job) {
                warn!(job = %job.id(), "queue closed before release, dropping job");
                queue.settle(&job);
            }
        });

        Ok(())
    }

    async fn fail(&self, job: &DeliveryJob, reason: &str) -> Result<(), QueueError> {
        self.state.lock().await.dead.push(DeadJob {
            job: job.clone(),
            reason: reason.to_string(),
            failed_at: Utc::now(),
        });

        self.settle(job);

        Ok(())
    }
}
