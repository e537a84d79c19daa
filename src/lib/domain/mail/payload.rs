//! Provider payload and the builder that produces it

use std::fs;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    errors::BuildError, Attachment, AttachmentContent, Body, DevRecipientPolicy, Disposition,
    EmailAddress, Message, Recipients,
};

/// JSON body posted to the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Provider API key
    pub api_key: String,

    /// Sender address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_email: Option<String>,

    /// Sender display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,

    /// Subject line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// HTML content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Plain text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Comma-joined `to` recipients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Comma-joined `cc` recipients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,

    /// Comma-joined `bcc` recipients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,

    /// Attachments, in message order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<PayloadAttachment>>,
}

impl Payload {
    fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            from_email: None,
            from_name: None,
            subject: None,
            html: None,
            text: None,
            to: None,
            cc: None,
            bcc: None,
            attachments: None,
        }
    }
}

/// An attachment inside a [`Payload`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadAttachment {
    /// File name
    pub filename: String,

    /// Base64 encoded content
    pub content: String,

    /// MIME type
    pub content_type: String,

    /// `cid:` reference, only for inline parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

/// Which flavour of payload to build
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PayloadStrategy {
    /// Synchronous HTTP send; picks `html` or `text` from the body's content type
    DirectHttp,

    /// Queued send; content always goes under `html`
    #[default]
    Queued,

    /// Queued send with development recipient redirection
    DevAware,
}

impl PayloadStrategy {
    fn prefers_html(&self) -> bool {
        !matches!(self, Self::DirectHttp)
    }

    fn is_dev_aware(&self) -> bool {
        matches!(self, Self::DevAware)
    }
}

/// Builds provider payloads from messages. Pure apart from reading
/// attachments that point at files.
#[derive(Clone, Debug)]
pub struct PayloadBuilder {
    api_key: String,
    strategy: PayloadStrategy,
    dev_policy: DevRecipientPolicy,
}

impl PayloadBuilder {
    /// Create a builder without recipient redirection
    pub fn new(api_key: impl Into<String>, strategy: PayloadStrategy) -> Self {
        Self {
            api_key: api_key.into(),
            strategy,
            dev_policy: DevRecipientPolicy::default(),
        }
    }

    /// Set the policy consulted by [`PayloadStrategy::DevAware`]
    pub fn with_dev_policy(mut self, dev_policy: DevRecipientPolicy) -> Self {
        self.dev_policy = dev_policy;
        self
    }

    /// The strategy in use
    pub fn strategy(&self) -> PayloadStrategy {
        self.strategy
    }

    /// Build the payload for a message
    pub fn build(&self, message: &Message) -> Result<Payload, BuildError> {
        let mut payload = Payload::new(&self.api_key);

        self.add_from(message, &mut payload)?;
        let prefix = self.add_recipients(message, &mut payload)?;
        self.add_subject(message, prefix, &mut payload);
        self.add_content(message, &mut payload);
        self.add_attachments(message, &mut payload)?;

        debug!(
            strategy = ?self.strategy,
            attachments = payload.attachments.as_ref().map_or(0, Vec::len),
            "built payload"
        );

        Ok(payload)
    }

    fn add_from(&self, message: &Message, payload: &mut Payload) -> Result<(), BuildError> {
        let Some(from) = &message.from else {
            return Ok(());
        };

        if from.address.trim().is_empty() {
            return Ok(());
        }

        let address = EmailAddress::new(&from.address).map_err(|source| {
            BuildError::InvalidAddress {
                field: "from",
                source,
            }
        })?;

        payload.from_email = Some(address.into());
        payload.from_name = from.display_name().map(str::to_string);

        Ok(())
    }

    /// Returns the subject prefix to apply when recipients were redirected.
    fn add_recipients(
        &self,
        message: &Message,
        payload: &mut Payload,
    ) -> Result<Option<String>, BuildError> {
        let real = Recipients::from_message(message)?;

        let (recipients, prefix) = if self.strategy.is_dev_aware() {
            let resolved = self.dev_policy.resolve(real);
            let prefix = resolved.subject_prefix();
            (resolved.recipients, prefix)
        } else {
            (real, None)
        };

        payload.to = recipients.to;
        payload.cc = recipients.cc;
        payload.bcc = recipients.bcc;

        Ok(prefix)
    }

    fn add_subject(&self, message: &Message, prefix: Option<String>, payload: &mut Payload) {
        let subject = message.subject.as_deref().filter(|s| !s.is_empty());

        payload.subject = match (prefix, subject) {
            (Some(prefix), Some(subject)) => Some(format!("{prefix}{subject}")),
            (Some(prefix), None) => Some(prefix.trim_end().to_string()),
            (None, subject) => subject.map(str::to_string),
        };
    }

    fn add_content(&self, message: &Message, payload: &mut Payload) {
        if self.strategy.prefers_html() {
            let content = match &message.body {
                Body::Html(html) | Body::Alternative { html, .. } => html,
                Body::Text(text) | Body::Untyped(text) => text,
            };
            payload.html = Some(content.clone());
            return;
        }

        match &message.body {
            Body::Html(html) | Body::Alternative { html, .. } => payload.html = Some(html.clone()),
            Body::Text(text) => payload.text = Some(text.clone()),
            Body::Untyped(body) if looks_like_html(body) => payload.html = Some(body.clone()),
            Body::Untyped(body) => payload.text = Some(body.clone()),
        }
    }

    fn add_attachments(&self, message: &Message, payload: &mut Payload) -> Result<(), BuildError> {
        let attachments = message
            .attachments()
            .map(encode_attachment)
            .collect::<Result<Vec<_>, _>>()?;

        if !attachments.is_empty() {
            payload.attachments = Some(attachments);
        }

        Ok(())
    }
}

/// A body is HTML when stripping its tags changes it.
fn looks_like_html(body: &str) -> bool {
    strip_tags(body) != body
}

/// Drop everything from a `<` that is not followed by whitespace up to the
/// next `>`. An unclosed tag runs to the end of the input.
fn strip_tags(body: &str) -> String {
    let mut stripped = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '<' || chars.peek().is_some_and(|next| next.is_whitespace()) {
            stripped.push(c);
            continue;
        }

        for inner in chars.by_ref() {
            if inner == '>' {
                break;
            }
        }
    }

    stripped
}

fn encode_attachment(attachment: &Attachment) -> Result<PayloadAttachment, BuildError> {
    let content = match &attachment.content {
        AttachmentContent::Bytes(bytes) => STANDARD.encode(bytes),
        AttachmentContent::Path(path) => {
            let bytes = fs::read(path).map_err(|source| BuildError::UnreadableAttachment {
                filename: attachment.filename.clone(),
                source,
            })?;
            STANDARD.encode(bytes)
        }
    };

    let content_id = match (&attachment.disposition, &attachment.content_id) {
        (Disposition::Attachment, _) => None,
        (Disposition::Inline, Some(id)) if !id.is_empty() => Some(format!("cid:{id}")),
        (Disposition::Inline, _) => None,
    };

    Ok(PayloadAttachment {
        filename: attachment.filename.clone(),
        content,
        content_type: attachment.content_type.clone(),
        content_id,
    })
}
