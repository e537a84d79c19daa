//! Mail messages, provider payloads and the transport capability

mod dev_recipients;
mod email_address;
mod message;
mod payload;
mod recipients;
mod transport;

pub mod errors;

pub use dev_recipients::{
    DevForceConfig, DevRecipientPolicy, ResolvedRecipients, DEFAULT_DEV_ENVIRONMENTS,
};
pub use email_address::{EmailAddress, EmailAddressError};
pub use message::{
    Attachment, AttachmentContent, Body, Disposition, Mailbox, Message, MessageBuilder, MimePart,
    RecipientKind,
};
pub use payload::{Payload, PayloadAttachment, PayloadBuilder, PayloadStrategy};
pub use recipients::Recipients;
pub use transport::{SubmissionResult, Transport};
