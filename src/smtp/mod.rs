//! SMTP submission over plain TCP, STARTTLS or implicit TLS.
//!
//! [`SmtpClient`] speaks the wire protocol one command at a time;
//! [`SmtpTransport`] drives it through the connect, authenticate, send and
//! disconnect steps of a [`crate::SmtpSession`].

mod client;
mod error;
pub mod extensions;
mod response;
mod transport;

pub use self::{
    client::SmtpClient,
    error::{ClientError, Result},
    extensions::{AuthMechanism, Capabilities},
    response::{Response, ResponseLine},
    transport::SmtpTransport,
};
