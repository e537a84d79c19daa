//! Queued mail transport

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::mail::{
    errors::TransportError, Message, PayloadBuilder, SubmissionResult, Transport,
};

use super::{DeliveryJob, QueueService, QueueTarget};

/// Builds the payload on the caller's task and leaves delivery to a
/// [`DeliveryJob`] on the queue.
#[derive(Debug, Clone)]
pub struct DeliveryTransport<Q>
where
    Q: QueueService,
{
    builder: PayloadBuilder,
    endpoint: String,
    target: QueueTarget,
    queue: Arc<Q>,
}

impl<Q> DeliveryTransport<Q>
where
    Q: QueueService,
{
    /// Create a queued transport
    pub fn new(
        builder: PayloadBuilder,
        endpoint: impl Into<String>,
        target: QueueTarget,
        queue: Arc<Q>,
    ) -> Self {
        Self {
            builder,
            endpoint: endpoint.into(),
            target,
            queue,
        }
    }
}

#[async_trait]
impl<Q> Transport for DeliveryTransport<Q>
where
    Q: QueueService,
{
    async fn send(&self, message: &Message) -> Result<SubmissionResult, TransportError> {
        let payload = self.builder.build(message)?;
        let job = DeliveryJob::new(&self.endpoint, payload, self.target.clone());

        let id = self.queue.enqueue(job).await?;

        info!(
            job = %id,
            connection = self.target.connection.as_deref().unwrap_or("default"),
            queue = %self.target.queue,
            "queued delivery job"
        );

        Ok(SubmissionResult::new(message.recipient_count()))
    }
}
