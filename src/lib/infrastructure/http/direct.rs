//! Synchronous transport: posts from the caller and reports the provider's
//! message id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::domain::{
    delivery::{errors::DeliveryError, DeliveryClient},
    mail::{errors::TransportError, Message, PayloadBuilder, SubmissionResult, Transport},
};

/// Headers carrying the provider's message id
pub const MESSAGE_ID_HEADERS: [&str; 2] = ["X-Message-ID", "X-SES-Message-ID"];

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    message_id: Option<Value>,
}

/// Posts each message straight to the provider, without a queue or retries
#[derive(Debug, Clone)]
pub struct DirectHttpTransport<C>
where
    C: DeliveryClient,
{
    builder: PayloadBuilder,
    endpoint: String,
    client: Arc<C>,
}

impl<C> DirectHttpTransport<C>
where
    C: DeliveryClient,
{
    /// Create a direct transport
    pub fn new(builder: PayloadBuilder, endpoint: impl Into<String>, client: Arc<C>) -> Self {
        Self {
            builder,
            endpoint: endpoint.into(),
            client,
        }
    }

    fn message_id(&self, body: &str) -> Result<String, TransportError> {
        let invalid = |reason: String| {
            TransportError::request(&self.endpoint, DeliveryError::InvalidResponse(reason))
        };

        let response: ProviderResponse =
            serde_json::from_str(body).map_err(|err| invalid(err.to_string()))?;

        match response.message_id {
            Some(Value::String(id)) if !id.is_empty() => Ok(id),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(invalid("missing message_id".to_string())),
        }
    }
}

#[async_trait]
impl<C> Transport for DirectHttpTransport<C>
where
    C: DeliveryClient,
{
    async fn send(&self, message: &Message) -> Result<SubmissionResult, TransportError> {
        let payload = self.builder.build(message)?;

        let response = self
            .client
            .post_json(&self.endpoint, &payload)
            .await
            .map_err(|err| TransportError::request(&self.endpoint, err))?;

        if !response.is_success() {
            return Err(TransportError::request(
                &self.endpoint,
                DeliveryError::UnexpectedStatus {
                    status: response.status,
                    body: response.body,
                },
            ));
        }

        let message_id = self.message_id(&response.body)?;

        info!(message_id = %message_id, "provider accepted message");

        Ok(SubmissionResult {
            recipients: message.recipient_count(),
            headers: MESSAGE_ID_HEADERS
                .iter()
                .map(|name| (name.to_string(), message_id.clone()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::domain::{
        delivery::{tests::MockDeliveryClient, DeliveryResponse},
        mail::{Body, PayloadStrategy},
    };

    const ENDPOINT: &str = "https://mail.example.com/api/send";

    fn transport(client: MockDeliveryClient) -> DirectHttpTransport<MockDeliveryClient> {
        DirectHttpTransport::new(
            PayloadBuilder::new("key", PayloadStrategy::DirectHttp),
            ENDPOINT,
            Arc::new(client),
        )
    }

    fn message() -> Message {
        Message::builder()
            .to("a@b.com")
            .cc("c@d.com")
            .body(Body::Text("plain".to_string()))
            .build()
    }

    #[tokio::test]
    async fn test_success_adds_message_id_headers() -> TestResult {
        let mut client = MockDeliveryClient::new();

        client
            .expect_post_json()
            .times(1)
            .withf(|endpoint, payload| {
                endpoint == ENDPOINT
                    && payload.text.as_deref() == Some("plain")
                    && payload.html.is_none()
            })
            .returning(|_, _| {
                Ok(DeliveryResponse {
                    status: 200,
                    body: r#"{"message_id":"0100-abc"}"#.to_string(),
                })
            });

        let result = transport(client).send(&message()).await?;

        assert_eq!(result.recipients, 2);
        assert_eq!(result.header("X-Message-ID"), Some("0100-abc"));
        assert_eq!(result.header("X-SES-Message-ID"), Some("0100-abc"));

        Ok(())
    }

    #[tokio::test]
    async fn test_non_200_is_a_request_error() {
        let mut client = MockDeliveryClient::new();

        client.expect_post_json().returning(|_, _| {
            Ok(DeliveryResponse {
                status: 422,
                body: r#"{"error":"bad"}"#.to_string(),
            })
        });

        let result = transport(client).send(&message()).await;

        assert!(matches!(
            result,
            Err(TransportError::Request {
                source: DeliveryError::UnexpectedStatus { status: 422, .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_network_failure_is_a_request_error() {
        let mut client = MockDeliveryClient::new();

        client
            .expect_post_json()
            .returning(|_, _| Err(DeliveryError::Timeout));

        let err = transport(client).send(&message()).await.unwrap_err();

        assert_eq!(err.to_string(), format!("Request to {ENDPOINT} API failed."));
    }

    #[tokio::test]
    async fn test_missing_message_id_is_a_request_error() {
        let mut client = MockDeliveryClient::new();

        client.expect_post_json().returning(|_, _| {
            Ok(DeliveryResponse {
                status: 200,
                body: "{}".to_string(),
            })
        });

        let result = transport(client).send(&message()).await;

        assert!(matches!(
            result,
            Err(TransportError::Request {
                source: DeliveryError::InvalidResponse(_),
                ..
            })
        ));
    }
}
