//! reqwest-backed delivery client

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::domain::{
    delivery::{errors::DeliveryError, DeliveryClient, DeliveryResponse},
    mail::Payload,
};

/// Time allowed to establish a connection to the provider
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Posts payloads with reqwest. No read timeout is set.
#[derive(Debug, Clone)]
pub struct ReqwestDeliveryClient {
    client: reqwest::Client,
}

impl ReqwestDeliveryClient {
    /// Create a client with the default connect timeout
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(CONNECT_TIMEOUT)
    }

    /// Create a client with a custom connect timeout
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DeliveryClient for ReqwestDeliveryClient {
    async fn post_json(
        &self,
        endpoint: &str,
        payload: &Payload,
    ) -> Result<DeliveryResponse, DeliveryError> {
        let response = self.client.post(endpoint).json(payload).send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(endpoint, status, "provider responded");

        Ok(DeliveryResponse { status, body })
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        debug!("reqwest::Error -> DeliveryError: {:?}", err);

        if err.is_timeout() {
            DeliveryError::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() {
            DeliveryError::Network(err.into())
        } else {
            DeliveryError::UnknownError(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use testresult::TestResult;
    use tokio::net::TcpListener;

    use super::*;
    use crate::domain::mail::{Message, PayloadBuilder, PayloadStrategy};

    async fn serve(router: Router) -> TestResult<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;

        tokio::spawn(async move { axum::serve(listener, router).await });

        Ok(format!("http://{address}/send"))
    }

    fn payload() -> TestResult<Payload> {
        let message = Message::builder()
            .from("Sender <sender@example.com>")
            .to("a@b.com")
            .subject("Hello")
            .build();

        Ok(PayloadBuilder::new("secret", PayloadStrategy::Queued).build(&message)?)
    }

    #[tokio::test]
    async fn test_posts_payload_as_json() -> TestResult {
        let endpoint = serve(Router::new().route(
            "/send",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let content_type = headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();

                Json(json!({
                    "message_id": "msg-1",
                    "content_type": content_type,
                    "echo": body,
                }))
            }),
        ))
        .await?;

        let response = ReqwestDeliveryClient::new()?
            .post_json(&endpoint, &payload()?)
            .await?;

        assert!(response.is_success());

        let body: Value = serde_json::from_str(&response.body)?;
        assert_eq!(body["content_type"], "application/json");
        assert_eq!(body["echo"]["api_key"], "secret");
        assert_eq!(body["echo"]["to"], "a@b.com");
        assert_eq!(body["echo"]["from_name"], "Sender");

        Ok(())
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() -> TestResult {
        let endpoint = serve(Router::new().route(
            "/send",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }),
        ))
        .await?;

        let response = ReqwestDeliveryClient::new()?
            .post_json(&endpoint, &payload()?)
            .await?;

        assert_eq!(response.status, 503);
        assert_eq!(response.body, "try later");
        assert!(!response.is_success());

        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_a_network_error() -> TestResult {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        drop(listener);

        let result = ReqwestDeliveryClient::with_connect_timeout(Duration::from_secs(5))?
            .post_json(&format!("http://{address}/send"), &payload()?)
            .await;

        assert!(matches!(result, Err(DeliveryError::Network(_))));

        Ok(())
    }
}
