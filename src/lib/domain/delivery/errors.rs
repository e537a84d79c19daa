//! Error types for delivery jobs and the queue

use thiserror::Error;

/// A failed delivery attempt. Always retried by the job.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request did not complete in time
    #[error("request to the provider timed out")]
    Timeout,

    /// The provider could not be reached
    #[error("could not reach the provider: {0}")]
    Network(#[source] anyhow::Error),

    /// The provider answered with something other than 200
    #[error("provider responded with status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The provider answered 200 with a body we could not use
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Errors raised by a queue service
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue no longer accepts jobs
    #[error("queue is closed")]
    Closed,

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}
