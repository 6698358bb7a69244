//! Error types for building and sending a message.
//!
//! Failures are split by phase: [`BuildError`] is raised before any network
//! activity, [`SessionError`] once a session has been started. [`Error`] wraps
//! both for callers of [`crate::send_mail`].

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::{address::AddressError, message::priority::InvalidPriority};

/// Errors raised while assembling a [`crate::Message`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// No sender was supplied, or it was blank.
    #[error("A sender (From) address is required")]
    MissingSender,

    /// The To list was empty after parsing.
    #[error("At least one recipient (To) address is required")]
    NoRecipients,

    /// An address could not be parsed.
    #[error("Invalid address '{input}': {source}")]
    InvalidAddress {
        input: String,
        #[source]
        source: AddressError,
    },

    /// The priority token is not one of the recognised values.
    #[error(transparent)]
    InvalidPriority(#[from] InvalidPriority),

    /// An attachment could not be read.
    #[error("Attachment {} is unavailable: {source}", path.display())]
    AttachmentUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised while driving an SMTP session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The relay could not be reached, or the greeting, EHLO or TLS
    /// negotiation failed.
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// The relay refused the supplied credentials or offers no usable
    /// mechanism.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The relay rejected the sender, a recipient or the message itself.
    #[error("Message rejected: {code} {message}")]
    SendRejected { code: u16, message: String },

    /// The connection broke while the message was being transmitted.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

/// The step at which a send attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Build,
    Connect,
    Authenticate,
    Send,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Build => "build",
            Self::Connect => "connect",
            Self::Authenticate => "authenticate",
            Self::Send => "send",
        })
    }
}

/// Top-level error returned by [`crate::send_mail`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to build message: {0}")]
    Build(#[from] BuildError),

    #[error("Failed to send message: {0}")]
    Session(#[from] SessionError),
}

impl Error {
    /// Returns the phase in which this error occurred.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Build(_) => Phase::Build,
            Self::Session(SessionError::ConnectFailed(_)) => Phase::Connect,
            Self::Session(SessionError::AuthFailed(_)) => Phase::Authenticate,
            Self::Session(
                SessionError::SendRejected { .. } | SessionError::ConnectionLost(_),
            ) => Phase::Send,
        }
    }
}
