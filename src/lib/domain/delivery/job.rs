//! Delivery job and its retry state machine

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::mail::Payload;

use super::{
    errors::{DeliveryError, QueueError},
    DeliveryClient, QueueService,
};

/// Delay before a failed job is picked up again
pub const RELEASE_DELAY: Duration = Duration::from_secs(60);

/// Attempts before a job is given up on: a day of retries at one a minute
pub const MAX_ATTEMPTS: u32 = 1440;

/// Queue used when none is configured
pub const DEFAULT_QUEUE: &str = "mailapi";

/// Delivery job identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// A new time-ordered id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a job is queued
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTarget {
    /// Queue connection; `None` means the queue service's default
    pub connection: Option<String>,

    /// Queue name
    pub queue: String,
}

impl Default for QueueTarget {
    fn default() -> Self {
        Self {
            connection: None,
            queue: DEFAULT_QUEUE.to_string(),
        }
    }
}

/// Lifecycle of a delivery job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Queued, never run
    Pending,

    /// An attempt is in progress
    Running,

    /// The provider accepted the payload
    Succeeded,

    /// Released back onto the queue after a failed attempt
    AwaitingRetry,

    /// Out of attempts
    Exhausted,
}

impl JobState {
    /// Succeeded or exhausted
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }
}

/// POSTs one payload to the provider, retrying through the queue until it
/// succeeds or runs out of attempts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryJob {
    id: JobId,
    endpoint: String,
    payload: Payload,
    target: QueueTarget,
    attempts: u32,
    max_attempts: u32,
    state: JobState,
}

impl DeliveryJob {
    /// Create a pending job
    pub fn new(endpoint: impl Into<String>, payload: Payload, target: QueueTarget) -> Self {
        Self {
            id: JobId::new(),
            endpoint: endpoint.into(),
            payload,
            target,
            attempts: 0,
            max_attempts: MAX_ATTEMPTS,
            state: JobState::Pending,
        }
    }

    /// The job id
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Provider endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The payload to post
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Connection and queue the job belongs to
    pub fn target(&self) -> &QueueTarget {
        &self.target
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Attempts allowed in total
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Current state
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Run one attempt.
    ///
    /// A 200 response finishes the job. Anything else releases it back onto
    /// the queue after [`RELEASE_DELAY`], or exhausts it once
    /// [`MAX_ATTEMPTS`] have been made. Only failures of the queue itself
    /// are returned as errors.
    pub async fn handle<C, Q>(&mut self, client: &C, queue: &Q) -> Result<JobState, QueueError>
    where
        C: DeliveryClient + ?Sized,
        Q: QueueService + ?Sized,
    {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        if self.attempts >= self.max_attempts {
            return self.exhaust("maximum attempts reached", queue).await;
        }

        self.attempts += 1;
        self.state = JobState::Running;

        let failure = match client.post_json(&self.endpoint, &self.payload).await {
            Ok(response) if response.is_success() => {
                self.state = JobState::Succeeded;

                info!(job = %self.id, attempts = self.attempts, "delivered payload");

                return Ok(self.state);
            }
            Ok(response) => DeliveryError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            },
            Err(err) => err,
        };

        self.retry_or_exhaust(&failure.to_string(), queue).await
    }

    /// Called by the queue runtime when running the job faulted outside of
    /// a normal attempt. Retries on the same schedule as a failed attempt.
    pub async fn failed<Q>(&mut self, reason: &str, queue: &Q) -> Result<JobState, QueueError>
    where
        Q: QueueService + ?Sized,
    {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        self.retry_or_exhaust(reason, queue).await
    }

    async fn retry_or_exhaust<Q>(&mut self, reason: &str, queue: &Q) -> Result<JobState, QueueError>
    where
        Q: QueueService + ?Sized,
    {
        if self.attempts >= self.max_attempts {
            return self.exhaust(reason, queue).await;
        }

        warn!(
            job = %self.id,
            attempt = self.attempts,
            max_attempts = self.max_attempts,
            endpoint = %self.endpoint,
            reason,
            "delivery attempt failed, releasing"
        );

        self.state = JobState::AwaitingRetry;
        queue.release(self, RELEASE_DELAY).await?;

        Ok(self.state)
    }

    async fn exhaust<Q>(&mut self, reason: &str, queue: &Q) -> Result<JobState, QueueError>
    where
        Q: QueueService + ?Sized,
    {
        self.state = JobState::Exhausted;

        error!(
            job = %self.id,
            attempts = self.attempts,
            endpoint = %self.endpoint,
            reason,
            "giving up on delivery"
        );

        queue.fail(self, reason).await?;

        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use mockall::Sequence;
    use testresult::TestResult;

    use super::*;
    use crate::domain::{
        delivery::{
            tests::{MockDeliveryClient, MockQueueService},
            DeliveryResponse,
        },
        mail::{Message, PayloadBuilder, PayloadStrategy},
    };

    const ENDPOINT: &str = "https://mail.example.com/api/send";

    fn job() -> TestResult<DeliveryJob> {
        let message = Message::builder().to("a@b.com").subject("Hi").build();
        let payload = PayloadBuilder::new("key", PayloadStrategy::Queued).build(&message)?;

        Ok(DeliveryJob::new(ENDPOINT, payload, QueueTarget::default()))
    }

    fn ok() -> Result<DeliveryResponse, DeliveryError> {
        Ok(DeliveryResponse {
            status: 200,
            body: r#"{"message_id":"abc"}"#.to_string(),
        })
    }

    #[test]
    fn test_new_job_is_pending() -> TestResult {
        let job = job()?;

        assert_eq!(job.state(), JobState::Pending);
        assert_eq!(job.attempts(), 0);
        assert_eq!(job.max_attempts(), MAX_ATTEMPTS);
        assert_eq!(job.target().queue, "mailapi");
        assert_eq!(job.target().connection, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() -> TestResult {
        let mut client = MockDeliveryClient::new();
        let mut queue = MockQueueService::new();

        client
            .expect_post_json()
            .times(1)
            .withf(|endpoint, payload| endpoint == ENDPOINT && payload.api_key == "key")
            .returning(|_, _| ok());
        queue.expect_release().never();
        queue.expect_fail().never();

        let mut job = job()?;

        assert_eq!(job.handle(&client, &queue).await?, JobState::Succeeded);
        assert_eq!(job.attempts(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_retries_until_success() -> TestResult {
        let mut client = MockDeliveryClient::new();
        let mut queue = MockQueueService::new();
        let mut seq = Sequence::new();

        client
            .expect_post_json()
            .times(3)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(DeliveryError::Network(anyhow::anyhow!("connection refused"))));
        client
            .expect_post_json()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| ok());

        queue
            .expect_release()
            .times(3)
            .withf(|job, delay| *delay == RELEASE_DELAY && job.state() == JobState::AwaitingRetry)
            .returning(|_, _| Ok(()));
        queue.expect_fail().never();

        let mut job = job()?;
        let mut states = Vec::new();

        for _ in 0..4 {
            states.push(job.handle(&client, &queue).await?);
        }

        assert_eq!(
            states,
            vec![
                JobState::AwaitingRetry,
                JobState::AwaitingRetry,
                JobState::AwaitingRetry,
                JobState::Succeeded,
            ]
        );
        assert_eq!(job.attempts(), 4);

        // Finished jobs are not attempted again.
        assert_eq!(job.handle(&client, &queue).await?, JobState::Succeeded);

        Ok(())
    }

    #[tokio::test]
    async fn test_non_200_status_is_retried() -> TestResult {
        let mut client = MockDeliveryClient::new();
        let mut queue = MockQueueService::new();

        client.expect_post_json().times(1).returning(|_, _| {
            Ok(DeliveryResponse {
                status: 202,
                body: "accepted".to_string(),
            })
        });
        queue
            .expect_release()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut job = job()?;

        assert_eq!(job.handle(&client, &queue).await?, JobState::AwaitingRetry);

        Ok(())
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() -> TestResult {
        let mut client = MockDeliveryClient::new();
        let mut queue = MockQueueService::new();

        client
            .expect_post_json()
            .times(MAX_ATTEMPTS as usize)
            .returning(|_, _| Err(DeliveryError::Timeout));
        queue
            .expect_release()
            .times(MAX_ATTEMPTS as usize - 1)
            .returning(|_, _| Ok(()));
        queue
            .expect_fail()
            .times(1)
            .withf(|job, _| job.attempts() == MAX_ATTEMPTS && job.state() == JobState::Exhausted)
            .returning(|_, _| Ok(()));

        let mut job = job()?;
        let mut last = JobState::Pending;

        for _ in 0..MAX_ATTEMPTS {
            last = job.handle(&client, &queue).await?;
        }

        assert_eq!(last, JobState::Exhausted);

        // No further posts or releases.
        assert_eq!(job.handle(&client, &queue).await?, JobState::Exhausted);

        Ok(())
    }

    #[tokio::test]
    async fn test_job_picked_up_without_attempts_left_is_exhausted() -> TestResult {
        let mut client = MockDeliveryClient::new();
        let mut queue = MockQueueService::new();

        client.expect_post_json().never();
        queue.expect_release().never();
        queue.expect_fail().times(1).returning(|_, _| Ok(()));

        let mut job = job()?;
        job.attempts = MAX_ATTEMPTS;
        job.state = JobState::AwaitingRetry;

        assert_eq!(job.handle(&client, &queue).await?, JobState::Exhausted);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_callback_releases_with_delay() -> TestResult {
        let mut queue = MockQueueService::new();

        queue
            .expect_release()
            .times(1)
            .withf(|_, delay| *delay == RELEASE_DELAY)
            .returning(|_, _| Ok(()));

        let mut job = job()?;
        job.attempts = 1;

        assert_eq!(job.failed("worker fault", &queue).await?, JobState::AwaitingRetry);

        Ok(())
    }

    #[tokio::test]
    async fn test_release_failure_is_returned() -> TestResult {
        let mut client = MockDeliveryClient::new();
        let mut queue = MockQueueService::new();

        client
            .expect_post_json()
            .returning(|_, _| Err(DeliveryError::Timeout));
        queue
            .expect_release()
            .times(1)
            .returning(|_, _| Err(QueueError::Closed));

        let mut job = job()?;

        assert!(matches!(
            job.handle(&client, &queue).await,
            Err(QueueError::Closed)
        ));

        Ok(())
    }
}
