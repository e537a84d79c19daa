//! Mail message model
//!
//! This is the shape a host mailer hands over once it has parsed its own
//! message type. Nothing here is validated; the payload builder does that.

use std::{convert::Infallible, fmt, path::PathBuf, str::FromStr};

/// A mailbox: an address with an optional display name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mailbox {
    /// The raw address
    pub address: String,

    /// The display name, if any
    pub name: Option<String>,
}

impl Mailbox {
    /// Create a mailbox without a display name
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Create a mailbox with a display name
    pub fn named(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }

    /// The display name, ignoring blank ones
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Parses either `address` or `Display Name <address>`.
impl FromStr for Mailbox {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        match (s.rfind('<'), s.ends_with('>')) {
            (Some(start), true) => {
                let address = s[start + 1..s.len() - 1].trim();
                let name = s[..start].trim().trim_matches('"').trim();

                Ok(Self {
                    address: address.to_string(),
                    name: (!name.is_empty()).then(|| name.to_string()),
                })
            }
            _ => Ok(Self::new(s)),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_name() {
            Some(name) => write!(f, "{name} <{}>", self.address.trim()),
            None => write!(f, "{}", self.address.trim()),
        }
    }
}

/// Recipient field of a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecipientKind {
    /// Primary recipients
    To,
    /// Carbon copy
    Cc,
    /// Blind carbon copy
    Bcc,
}

impl RecipientKind {
    /// Every kind, in payload priority order
    pub const ALL: [RecipientKind; 3] = [RecipientKind::To, RecipientKind::Cc, RecipientKind::Bcc];

    /// The payload key for this kind
    pub fn key(&self) -> &'static str {
        match self {
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
        }
    }
}

/// Message body as exposed by the host mailer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    /// A `text/html` body
    Html(String),

    /// A `text/plain` body
    Text(String),

    /// Both an HTML and a plain text alternative
    Alternative {
        /// The HTML alternative
        html: String,
        /// The plain text alternative
        text: String,
    },

    /// A body whose content type the host does not expose
    Untyped(String),
}

impl Default for Body {
    fn default() -> Self {
        Self::Untyped(String::new())
    }
}

/// Whether an attachment is shown inline or offered as a download
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Disposition {
    /// `Content-Disposition: attachment`
    #[default]
    Attachment,

    /// `Content-Disposition: inline`
    Inline,
}

/// Where an attachment's bytes come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentContent {
    /// Bytes already in memory
    Bytes(Vec<u8>),

    /// A file read when the payload is built
    Path(PathBuf),
}

/// A binary attachment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// File name presented to the recipient
    pub filename: String,

    /// The raw content
    pub content: AttachmentContent,

    /// MIME type, e.g. `image/png`
    pub content_type: String,

    /// Content-ID used by inline parts, without the `cid:` prefix
    pub content_id: Option<String>,

    /// Content disposition
    pub disposition: Disposition,
}

impl Attachment {
    /// A downloadable attachment from in-memory bytes
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content: AttachmentContent::Bytes(bytes.into()),
            content_type: content_type.into(),
            content_id: None,
            disposition: Disposition::Attachment,
        }
    }

    /// A downloadable attachment read from disk at build time
    pub fn from_path(path: impl Into<PathBuf>, content_type: impl Into<String>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            filename,
            content: AttachmentContent::Path(path),
            content_type: content_type.into(),
            content_id: None,
            disposition: Disposition::Attachment,
        }
    }

    /// Mark the attachment as inline with the given content id
    pub fn inline(mut self, content_id: impl Into<String>) -> Self {
        self.disposition = Disposition::Inline;
        self.content_id = Some(content_id.into());
        self
    }
}

/// A child MIME part of a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MimePart {
    /// A binary attachment
    Attachment(Attachment),

    /// Any other part, e.g. an alternative body
    Related {
        /// MIME type of the part
        content_type: String,
        /// Part body
        body: String,
    },
}

/// A structured mail message
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// The sender
    pub from: Option<Mailbox>,

    /// The subject line
    pub subject: Option<String>,

    /// The body
    pub body: Body,

    /// Primary recipients
    pub to: Vec<Mailbox>,

    /// Carbon copy recipients
    pub cc: Vec<Mailbox>,

    /// Blind carbon copy recipients
    pub bcc: Vec<Mailbox>,

    /// Child parts, in order
    pub parts: Vec<MimePart>,
}

impl Message {
    /// Start building a message
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Recipients of the given kind, in input order
    pub fn recipients(&self, kind: RecipientKind) -> &[Mailbox] {
        match kind {
            RecipientKind::To => &self.to,
            RecipientKind::Cc => &self.cc,
            RecipientKind::Bcc => &self.bcc,
        }
    }

    /// Number of intended recipients across To, Cc and Bcc
    pub fn recipient_count(&self) -> usize {
        RecipientKind::ALL
            .iter()
            .map(|kind| self.recipients(*kind).len())
            .sum()
    }

    /// The binary attachments among the child parts
    pub fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.parts.iter().filter_map(|part| match part {
            MimePart::Attachment(attachment) => Some(attachment),
            MimePart::Related { .. } => None,
        })
    }
}

/// Fluent builder for [`Message`]
#[derive(Debug, Default)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    /// Set the sender, as `address` or `Name <address>`
    pub fn from(mut self, mailbox: &str) -> Self {
        self.message.from = Some(parse_mailbox(mailbox));
        self
    }

    /// Set the subject
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.message.subject = Some(subject.into());
        self
    }

    /// Set the body
    pub fn body(mut self, body: Body) -> Self {
        self.message.body = body;
        self
    }

    /// Add a recipient of the given kind
    pub fn recipient(mut self, kind: RecipientKind, mailbox: &str) -> Self {
        let mailbox = parse_mailbox(mailbox);

        match kind {
            RecipientKind::To => self.message.to.push(mailbox),
            RecipientKind::Cc => self.message.cc.push(mailbox),
            RecipientKind::Bcc => self.message.bcc.push(mailbox),
        }

        self
    }

    /// Add a `To` recipient
    pub fn to(self, mailbox: &str) -> Self {
        self.recipient(RecipientKind::To, mailbox)
    }

    /// Add a `Cc` recipient
    pub fn cc(self, mailbox: &str) -> Self {
        self.recipient(RecipientKind::Cc, mailbox)
    }

    /// Add a `Bcc` recipient
    pub fn bcc(self, mailbox: &str) -> Self {
        self.recipient(RecipientKind::Bcc, mailbox)
    }

    /// Add an attachment
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.message.parts.push(MimePart::Attachment(attachment));
        self
    }

    /// Add a non-attachment child part
    pub fn part(mut self, part: MimePart) -> Self {
        self.message.parts.push(part);
        self
    }

    /// Finish building
    pub fn build(self) -> Message {
        self.message
    }
}

fn parse_mailbox(raw: &str) -> Mailbox {
    match raw.parse() {
        Ok(mailbox) => mailbox,
        Err(never) => match never {},
    }
}
