//! Queued delivery of provider payloads

mod client;
mod job;
mod queue;
mod transport;

pub mod errors;

pub use client::{DeliveryClient, DeliveryResponse};
pub use job::{DeliveryJob, JobId, JobState, QueueTarget, DEFAULT_QUEUE, MAX_ATTEMPTS, RELEASE_DELAY};
pub use queue::QueueService;
pub use transport::DeliveryTransport;
