use std::{
    fmt::{self, Display},
    ops::Deref,
    str::FromStr,
};

use mailparse::{MailAddr, MailParseError, SingleInfo};
use thiserror::Error;

use crate::{
    address_parser::{parse_mailbox, Mailbox, MailboxError},
    message::mime,
};

/// Errors raised while parsing an address or address list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    #[error("Malformed address: {0}")]
    Syntax(String),

    #[error("Expected exactly one address, found {0}")]
    NotSingle(usize),
}

impl From<MailParseError> for AddressError {
    fn from(value: MailParseError) -> Self {
        Self::Syntax(value.to_string())
    }
}

/// A message participant: an optional display name and a validated mailbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    name: Option<String>,
    mailbox: Mailbox,
}

impl Address {
    #[must_use]
    pub const fn new(name: Option<String>, mailbox: Mailbox) -> Self {
        Self { name, mailbox }
    }

    /// Parses `user@example.com`, `<user@example.com>` or
    /// `Display Name <user@example.com>` (the display name may be quoted).
    ///
    /// # Errors
    ///
    /// Returns an [`AddressError`] when the input is not a single valid address.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let mut list = AddressList::parse(input).map_err(|(_, e)| e)?;

        match list.0.len() {
            1 => Ok(list.0.remove(0)),
            n => Err(AddressError::NotSingle(n)),
        }
    }

    fn from_single(single: SingleInfo) -> Result<Self, (String, AddressError)> {
        let mailbox = parse_mailbox(single.addr.trim())
            .map_err(|e| (single.addr.trim().to_string(), AddressError::Mailbox(e)))?;
        let name = single.display_name.filter(|name| !name.trim().is_empty());

        Ok(Self::new(name, mailbox))
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Renders the address as a header value, encoding or quoting the display
    /// name as required.
    #[must_use]
    pub fn to_header(&self) -> String {
        match &self.name {
            None => self.mailbox.to_string(),
            Some(name) => format!("{} <{}>", mime::encode_phrase(name), self.mailbox),
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.mailbox),
            None => Display::fmt(&self.mailbox, f),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Mailbox> for Address {
    fn from(value: Mailbox) -> Self {
        Self::new(None, value)
    }
}

/// An ordered list of addresses. Duplicates are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressList(pub Vec<Address>);

impl AddressList {
    /// Parses an RFC 5322 address list. Group syntax is flattened into its
    /// members, so `Team: a@x.com, b@x.com;` yields two addresses and an
    /// empty group yields none.
    ///
    /// # Errors
    ///
    /// Returns the offending entry together with its error. A syntax error
    /// names the whole input, since the list could not be split.
    pub fn parse(input: &str) -> Result<Self, (String, AddressError)> {
        let parsed = mailparse::addrparse(input)
            .map_err(|e| (input.trim().to_string(), AddressError::from(e)))?;

        let mut list = Self::default();
        for entry in parsed.into_inner() {
            match entry {
                MailAddr::Single(single) => list.0.push(Address::from_single(single)?),
                MailAddr::Group(group) => {
                    for single in group.addrs {
                        list.0.push(Address::from_single(single)?);
                    }
                }
            }
        }

        Ok(list)
    }

    /// Renders the list as a header value.
    #[must_use]
    pub fn to_header(&self) -> String {
        self.iter()
            .map(Address::to_header)
            .collect::<Vec<_>>()
            .join(",\r\n ")
    }
}

impl Display for AddressList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, addr) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            Display::fmt(addr, f)?;
        }
        Ok(())
    }
}

impl From<Vec<Address>> for AddressList {
    fn from(value: Vec<Address>) -> Self {
        Self(value)
    }
}

impl FromIterator<Address> for AddressList {
    fn from_iter<T: IntoIterator<Item = Address>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for AddressList {
    type Target = Vec<Address>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Extend<Address> for AddressList {
    fn extend<T: IntoIterator<Item = Address>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}
