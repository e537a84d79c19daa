//! In-process queue service and worker

mod in_memory;
mod worker;

pub use in_memory::{DeadJob, InMemoryQueue, JobReceiver};
pub use worker::Worker;
