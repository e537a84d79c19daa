//! Transport capability

use async_trait::async_trait;

use super::{errors::TransportError, Message};

/// What a transport reports back once a message has been handed off
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionResult {
    /// Number of intended recipients (To + Cc + Bcc). Not a delivery count.
    pub recipients: usize,

    /// Headers the host mailer should add to its copy of the message
    pub headers: Vec<(String, String)>,
}

impl SubmissionResult {
    /// A result with no headers
    pub fn new(recipients: usize) -> Self {
        Self {
            recipients,
            headers: Vec::new(),
        }
    }

    /// Value of the first header with the given name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Mail transport
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Submit a message.
    ///
    /// # Arguments
    /// * `message` - The [`Message`] to send.
    ///
    /// # Returns
    /// A [`SubmissionResult`] once the message has been handed off, or a
    /// [`TransportError`] if the payload could not be built or submitted.
    async fn send(&self, message: &Message) -> Result<SubmissionResult, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let result = SubmissionResult {
            recipients: 1,
            headers: vec![("X-Message-ID".to_string(), "abc".to_string())],
        };

        assert_eq!(result.header("x-message-id"), Some("abc"));
        assert_eq!(result.header("X-Other"), None);
    }
}
