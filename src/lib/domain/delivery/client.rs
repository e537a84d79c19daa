//! HTTP client seam used by delivery jobs

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

use crate::domain::mail::Payload;

use super::errors::DeliveryError;

/// Status and body of a provider response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryResponse {
    /// HTTP status code
    pub status: u16,

    /// Raw response body
    pub body: String,
}

impl DeliveryResponse {
    /// Only a 200 counts as delivered
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Posts payloads to the provider
#[async_trait]
pub trait DeliveryClient: Send + Sync + 'static {
    /// POST `payload` as JSON to `endpoint`.
    ///
    /// Any response is returned as `Ok`, whatever its status; only transport
    /// failures are errors.
    async fn post_json(
        &self,
        endpoint: &str,
        payload: &Payload,
    ) -> Result<DeliveryResponse, DeliveryError>;
}

#[cfg(test)]
mock! {
    pub DeliveryClient {}

    #[async_trait]
    impl DeliveryClient for DeliveryClient {
        async fn post_json(&self, endpoint: &str, payload: &Payload) -> Result<DeliveryResponse, DeliveryError>;
    }
}
