//! Queue service seam

use std::time::Duration;

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

use super::{errors::QueueError, DeliveryJob, JobId};

/// The queue that owns delivery jobs between attempts
#[async_trait]
pub trait QueueService: Send + Sync + 'static {
    /// Accept a new job on the connection and queue named by its
    /// [`QueueTarget`](super::QueueTarget).
    async fn enqueue(&self, job: DeliveryJob) -> Result<JobId, QueueError>;

    /// Put a copy of the job back on its queue once `delay` has passed.
    async fn release(&self, job: &DeliveryJob, delay: Duration) -> Result<(), QueueError>;

    /// Record a job that will never be delivered.
    async fn fail(&self, job: &DeliveryJob, reason: &str) -> Result<(), QueueError>;
}

#[cfg(test)]
mock! {
    pub QueueService {}

    #[async_trait]
    impl QueueService for QueueService {
        async fn enqueue(&self, job: DeliveryJob) -> Result<JobId, QueueError>;
        async fn release(&self, job: &DeliveryJob, delay: Duration) -> Result<(), QueueError>;
        async fn fail(&self, job: &DeliveryJob, reason: &str) -> Result<(), QueueError>;
    }
}
