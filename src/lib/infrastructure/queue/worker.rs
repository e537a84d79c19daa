//! Queue worker

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info_span, warn, Instrument};

use crate::domain::delivery::{DeliveryClient, DeliveryJob, JobState};

use super::{InMemoryQueue, JobReceiver};

/// Pops jobs off an [`InMemoryQueue`] and runs them, a bounded number at a
/// time. Each job is owned by exactly one task while it runs.
#[derive(Debug)]
pub struct Worker<C>
where
    C: DeliveryClient,
{
    queue: InMemoryQueue,
    receiver: JobReceiver,
    client: Arc<C>,
    concurrency: usize,
}

impl<C> Worker<C>
where
    C: DeliveryClient,
{
    /// Create a worker running one job at a time
    pub fn new(queue: InMemoryQueue, receiver: JobReceiver, client: Arc<C>) -> Self {
        Self {
            queue,
            receiver,
            client,
            concurrency: 1,
        }
    }

    /// Run up to `concurrency` jobs at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Process jobs until the task running this is aborted.
    ///
    /// The worker keeps a queue handle of its own for releases, so the
    /// channel never closes underneath it.
    #[mutants::skip]
    pub async fn run(mut self) {
        let permits = Arc::new(Semaphore::new(self.concurrency));

        while let Some(job) = self.receiver.0.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };

            let queue = self.queue.clone();
            let client = self.client.clone();
            let span = info_span!("delivery_job", job = %job.id(), attempt = job.attempts() + 1);

            tokio::spawn(
                async move {
                    process(job, client.as_ref(), &queue).await;
                    drop(permit);
                }
                .instrument(span),
            );
        }
    }
}

async fn process<C>(mut job: DeliveryJob, client: &C, queue: &InMemoryQueue)
where
    C: DeliveryClient,
{
    let err = match job.handle(client, queue).await {
        Ok(JobState::Succeeded) => return queue.settle(&job),
        Ok(_) => return,
        Err(err) => err,
    };

    // The queue could not record a terminal state, so `failed` has nothing
    // left to do and the job would never settle.
    if job.state().is_terminal() {
        error!(error = %err, state = ?job.state(), "could not finish job, dropping it");
        return queue.settle(&job);
    }

    warn!(error = %err, "job faulted, invoking failure handler");

    if let Err(err) = job.failed(&err.to_string(), queue).await {
        error!(error = %err, "could not requeue job, dropping it");
        queue.settle(&job);
    }
}
