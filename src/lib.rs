//! Build a MIME message and submit it to an SMTP relay.
//!
//! ```no_run
//! # async fn run() -> Result<(), mailsend::Error> {
//! use mailsend::{Credentials, MessageBuilder, SessionConfig};
//!
//! let builder = MessageBuilder::new()
//!     .from("reports@example.com")
//!     .to("ops@example.com")
//!     .subject("Nightly report")
//!     .text_body("All green.");
//!
//! let config = SessionConfig::new("smtp.example.com")
//!     .with_port(587)
//!     .with_credentials(Some(Credentials::new("reports", "secret")));
//!
//! mailsend::send_mail(builder, &config).await
//! # }
//! ```

pub mod address;
pub mod address_parser;
pub mod config;
mod credentials;
pub mod error;
pub mod logging;
pub mod message;
pub mod session;
pub mod smtp;

pub use tracing;

pub use self::{
    address::{Address, AddressList},
    address_parser::Mailbox,
    config::{ClientTimeouts, JobConfig, SecurityMode, SessionConfig},
    credentials::Credentials,
    error::{BuildError, Error, Phase, SessionError},
    message::{Attachment, Message, MessageBuilder, Priority},
    session::{SessionState, SmtpSession, Transport},
    smtp::SmtpTransport,
};

/// Builds the message, then sends it in a single SMTP session.
///
/// Nothing touches the network unless the message builds successfully.
///
/// # Errors
///
/// [`Error::Build`] if the message is invalid, otherwise [`Error::Session`]
/// for whichever step of the session failed.
pub async fn send_mail(builder: MessageBuilder, config: &SessionConfig) -> Result<(), Error> {
    let message = builder.build()?;
    SmtpSession::new().send(&message, config).await?;
    Ok(())
}
