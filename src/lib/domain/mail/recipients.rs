//! Recipient formatting

use super::{errors::BuildError, EmailAddress, Mailbox, Message, RecipientKind};

/// Formatted recipient lists, one comma-joined string per kind
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Recipients {
    /// `to` field
    pub to: Option<String>,

    /// `cc` field
    pub cc: Option<String>,

    /// `bcc` field
    pub bcc: Option<String>,
}

impl Recipients {
    /// Format and validate the recipients of a message.
    ///
    /// Each contact becomes `Display <address>` or the bare address, joined
    /// with `", "`. Kinds without contacts stay `None`.
    pub fn from_message(message: &Message) -> Result<Self, BuildError> {
        let mut recipients = Self::default();

        for kind in RecipientKind::ALL {
            let formatted = message
                .recipients(kind)
                .iter()
                .map(|mailbox| format_contact(kind.key(), mailbox))
                .collect::<Result<Vec<_>, _>>()?;

            if !formatted.is_empty() {
                *recipients.get_mut(kind) = Some(formatted.join(", "));
            }
        }

        Ok(recipients)
    }

    /// The formatted list for a kind
    pub fn get(&self, kind: RecipientKind) -> Option<&str> {
        match kind {
            RecipientKind::To => self.to.as_deref(),
            RecipientKind::Cc => self.cc.as_deref(),
            RecipientKind::Bcc => self.bcc.as_deref(),
        }
    }

    fn get_mut(&mut self, kind: RecipientKind) -> &mut Option<String> {
        match kind {
            RecipientKind::To => &mut self.to,
            RecipientKind::Cc => &mut self.cc,
            RecipientKind::Bcc => &mut self.bcc,
        }
    }

    /// The first non-empty list, checking `to`, then `cc`, then `bcc`
    pub fn first(&self) -> Option<&str> {
        RecipientKind::ALL.iter().find_map(|kind| self.get(*kind))
    }
}

fn format_contact(field: &'static str, mailbox: &Mailbox) -> Result<String, BuildError> {
    let address = EmailAddress::new(&mailbox.address)
        .map_err(|source| BuildError::InvalidAddress { field, source })?;

    Ok(match mailbox.display_name() {
        Some(name) => format!("{name} <{address}>"),
        None => address.into(),
    })
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn test_formats_and_joins_in_order() -> TestResult {
        let message = Message::builder()
            .to("Jane <jane@example.com>")
            .to("bob@example.com")
            .build();

        let recipients = Recipients::from_message(&message)?;

        assert_eq!(
            recipients.to.as_deref(),
            Some("Jane <jane@example.com>, bob@example.com")
        );
        assert_eq!(recipients.cc, None);
        assert_eq!(recipients.bcc, None);

        Ok(())
    }

    #[test]
    fn test_first_prefers_to_then_cc_then_bcc() -> TestResult {
        let message = Message::builder()
            .bcc("hidden@example.com")
            .cc("copy@example.com")
            .build();

        let recipients = Recipients::from_message(&message)?;

        assert_eq!(recipients.first(), Some("copy@example.com"));

        Ok(())
    }

    #[test]
    fn test_invalid_address_names_the_field() {
        let message = Message::builder().cc("not-an-address").build();

        let result = Recipients::from_message(&message);

        assert!(matches!(
            result,
            Err(BuildError::InvalidAddress { field: "cc", .. })
        ));
    }
}
