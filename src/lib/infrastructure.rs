//! Adapters for configuration, HTTP and queueing

pub mod config;
pub mod http;
pub mod queue;
