//! Message assembly.
//!
//! [`MessageBuilder`] collects loosely validated input and produces an
//! immutable [`Message`]; [`Message::formatted`] renders it as MIME.

mod attachment;
mod builder;
pub mod mime;
pub mod priority;

use chrono::{DateTime, Utc};
use ulid::Ulid;

pub use self::{
    attachment::Attachment,
    builder::MessageBuilder,
    priority::{InvalidPriority, Priority},
};
use crate::{
    address::{Address, AddressList},
    address_parser::Mailbox,
};

/// A fully assembled message, ready for transmission.
///
/// Every field has been validated and every attachment read; nothing about a
/// `Message` can fail once it exists.
#[derive(Debug, Clone)]
pub struct Message {
    from: Address,
    reply_to: AddressList,
    to: AddressList,
    cc: AddressList,
    bcc: AddressList,
    subject: Option<String>,
    priority: Option<Priority>,
    text_body: Option<String>,
    html_body: Option<String>,
    attachments: Vec<Attachment>,
    id: Ulid,
    date: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    #[must_use]
    pub const fn from(&self) -> &Address {
        &self.from
    }

    #[must_use]
    pub const fn reply_to(&self) -> &AddressList {
        &self.reply_to
    }

    #[must_use]
    pub const fn to(&self) -> &AddressList {
        &self.to
    }

    #[must_use]
    pub const fn cc(&self) -> &AddressList {
        &self.cc
    }

    #[must_use]
    pub const fn bcc(&self) -> &AddressList {
        &self.bcc
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub const fn priority(&self) -> Option<Priority> {
        self.priority
    }

    #[must_use]
    pub fn text_body(&self) -> Option<&str> {
        self.text_body.as_deref()
    }

    /// The HTML body, after entity decoding.
    #[must_use]
    pub fn html_body(&self) -> Option<&str> {
        self.html_body.as_deref()
    }

    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    #[must_use]
    pub const fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// The `Message-ID` header value, including angle brackets.
    #[must_use]
    pub fn message_id(&self) -> String {
        format!("<{}@{}>", self.id, self.from.mailbox().domain)
    }

    pub(crate) const fn boundary_seed(&self) -> Ulid {
        self.id
    }

    /// The reverse-path for `MAIL FROM`.
    #[must_use]
    pub const fn envelope_sender(&self) -> &Mailbox {
        self.from.mailbox()
    }

    /// Forward-paths for `RCPT TO`: To, then Cc, then Bcc, in input order.
    pub fn envelope_recipients(&self) -> impl Iterator<Item = &Mailbox> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(Address::mailbox)
    }

    /// Renders the message as a MIME document with CRLF line endings.
    #[must_use]
    pub fn formatted(&self) -> String {
        mime::render(self)
    }
}
