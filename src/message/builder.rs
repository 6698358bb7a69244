use std::path::PathBuf;

use chrono::Utc;
use ulid::Ulid;

use super::{attachment::Attachment, priority::Priority, Message};
use crate::{
    address::{Address, AddressList},
    error::BuildError,
};

/// Builder for [`Message`].
///
/// Setters accept raw strings and never fail; all validation happens in
/// [`MessageBuilder::build`]. Address setters accept a single address or a
/// comma-separated list.
///
/// # Examples
///
/// ```no_run
/// use mailsend::MessageBuilder;
///
/// let message = MessageBuilder::new()
///     .from("Sender <sender@example.com>")
///     .to("recipient@example.com")
///     .subject("Hello")
///     .text_body("This is the message body")
///     .priority("High")
///     .attach("report.pdf")
///     .build()?;
/// # Ok::<(), mailsend::BuildError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    reply_to: Vec<String>,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: Option<String>,
    priority: Option<String>,
    text_body: Option<String>,
    html_body: Option<String>,
    attachments: Vec<PathBuf>,
}

impl MessageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender. Exactly one address is allowed.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    #[must_use]
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to.push(address.into());
        self
    }

    #[must_use]
    pub fn reply_to_multiple(mut self, addresses: &[impl AsRef<str>]) -> Self {
        self.reply_to
            .extend(addresses.iter().map(|a| a.as_ref().to_string()));
        self
    }

    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    #[must_use]
    pub fn to_multiple(mut self, addresses: &[impl AsRef<str>]) -> Self {
        self.to
            .extend(addresses.iter().map(|a| a.as_ref().to_string()));
        self
    }

    #[must_use]
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    #[must_use]
    pub fn cc_multiple(mut self, addresses: &[impl AsRef<str>]) -> Self {
        self.cc
            .extend(addresses.iter().map(|a| a.as_ref().to_string()));
        self
    }

    #[must_use]
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    #[must_use]
    pub fn bcc_multiple(mut self, addresses: &[impl AsRef<str>]) -> Self {
        self.bcc
            .extend(addresses.iter().map(|a| a.as_ref().to_string()));
        self
    }

    /// Sets the subject. Blank subjects are dropped at build time.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the priority token, see [`Priority`] for the accepted values.
    #[must_use]
    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Sets the HTML body. HTML entities are decoded at build time, so markup
    /// that was escaped in transit renders as markup.
    #[must_use]
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Adds a file attachment. The file is read when the message is built.
    #[must_use]
    pub fn attach(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    #[must_use]
    pub fn attach_multiple(mut self, paths: &[impl AsRef<std::path::Path>]) -> Self {
        self.attachments
            .extend(paths.iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    /// Validates the collected fields, reads every attachment and assembles
    /// the message.
    ///
    /// # Errors
    ///
    /// - [`BuildError::MissingSender`] if no sender was given (checked first)
    /// - [`BuildError::NoRecipients`] if the To list is empty
    /// - [`BuildError::InvalidAddress`] for any malformed address
    /// - [`BuildError::InvalidPriority`] for an unknown priority token
    /// - [`BuildError::AttachmentUnavailable`] if any attachment cannot be read
    pub fn build(self) -> Result<Message, BuildError> {
        let from = match self.from.as_deref().map(str::trim) {
            None | Some("") => return Err(BuildError::MissingSender),
            Some(from) => Address::parse(from).map_err(|source| BuildError::InvalidAddress {
                input: from.to_string(),
                source,
            })?,
        };

        let to = parse_lists(&self.to)?;
        if to.is_empty() {
            return Err(BuildError::NoRecipients);
        }

        let reply_to = parse_lists(&self.reply_to)?;
        let cc = parse_lists(&self.cc)?;
        let bcc = parse_lists(&self.bcc)?;

        let priority = self
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()?;

        let attachments = self
            .attachments
            .iter()
            .map(Attachment::from_path)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Message {
            from,
            reply_to,
            to,
            cc,
            bcc,
            subject: self.subject.filter(|s| !is_blank(s)),
            priority,
            text_body: self.text_body.filter(|s| !is_blank(s)),
            html_body: self
                .html_body
                .filter(|s| !is_blank(s))
                .map(|html| html_escape::decode_html_entities(&html).into_owned()),
            attachments,
            id: Ulid::new(),
            date: Utc::now(),
        })
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn parse_lists(entries: &[String]) -> Result<AddressList, BuildError> {
    let mut list = AddressList::default();

    for entry in entries {
        let parsed = AddressList::parse(entry)
            .map_err(|(input, source)| BuildError::InvalidAddress { input, source })?;
        list.extend(parsed.0);
    }

    Ok(list)
}
