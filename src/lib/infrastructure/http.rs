//! Provider HTTP client and the synchronous transport built on it

mod client;
mod direct;

pub use client::{ReqwestDeliveryClient, CONNECT_TIMEOUT};
pub use direct::{DirectHttpTransport, MESSAGE_ID_HEADERS};
