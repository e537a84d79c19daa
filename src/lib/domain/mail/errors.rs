//! Error types for building and submitting mail

use thiserror::Error;
use tracing::debug;

use crate::domain::delivery::errors::{DeliveryError, QueueError};

use super::EmailAddressError;

/// Errors raised while turning a message into a provider payload
#[derive(Debug, Error)]
pub enum BuildError {
    /// An address in the message is malformed
    #[error("invalid {field} address: {source}")]
    InvalidAddress {
        /// Which field held the address
        field: &'static str,
        /// The validation failure
        source: EmailAddressError,
    },

    /// An attachment could not be read
    #[error("could not read attachment \"{filename}\": {source}")]
    UnreadableAttachment {
        /// The attachment's file name
        filename: String,
        /// The I/O failure
        source: std::io::Error,
    },
}

/// Errors surfaced to the caller of a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The payload could not be built
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The delivery job could not be queued
    #[error("could not queue delivery job: {0}")]
    Queue(#[from] QueueError),

    /// A synchronous request to the provider failed
    #[error("Request to {endpoint} API failed.")]
    Request {
        /// The provider endpoint
        endpoint: String,
        /// The underlying failure
        source: DeliveryError,
    },

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

impl TransportError {
    /// Wrap a delivery failure for the given endpoint
    pub fn request(endpoint: &str, source: DeliveryError) -> Self {
        debug!("DeliveryError -> TransportError");

        TransportError::Request {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}
