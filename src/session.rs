//! One SMTP session: connect, optionally authenticate, send one message,
//! disconnect.

use core::fmt::{self, Display};

use async_trait::async_trait;

use crate::{
    config::SessionConfig,
    credentials::Credentials,
    error::SessionError,
    message::Message,
    smtp::SmtpTransport,
    tracing,
};

/// The connection-level operations a session is driven through.
///
/// [`SmtpTransport`] is the real implementation; tests substitute their own.
#[async_trait]
pub trait Transport: Send {
    /// Opens the connection and negotiates security.
    ///
    /// # Errors
    /// [`SessionError::ConnectFailed`]; the transport must then report itself
    /// as not connected.
    async fn connect(&mut self, config: &SessionConfig) -> Result<(), SessionError>;

    /// # Errors
    /// [`SessionError::AuthFailed`] if the relay refuses the credentials or
    /// offers no usable mechanism.
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), SessionError>;

    /// Submits the message to every envelope recipient.
    ///
    /// # Errors
    /// [`SessionError::SendRejected`] when the relay refuses a step, or
    /// [`SessionError::ConnectionLost`] when the connection breaks.
    async fn send(&mut self, message: &Message) -> Result<(), SessionError>;

    /// Closes the connection.
    ///
    /// # Errors
    /// Any error here is logged by the session and never surfaced.
    async fn disconnect(&mut self) -> Result<(), SessionError>;

    fn is_connected(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Authenticating,
    Authenticated,
    Sending,
    Sent,
    Disconnecting,
}

impl Display for SessionState {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Disconnecting => "disconnecting",
        })
    }
}

/// Drives a [`Transport`] through a single send.
///
/// Whatever happens after the connection is opened, the session attempts to
/// disconnect exactly once before returning, and returns the error that ended
/// the session rather than any error raised while closing.
pub struct SmtpSession<T = SmtpTransport> {
    transport: T,
    state: SessionState,
}

impl SmtpSession {
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(SmtpTransport::new())
    }
}

impl Default for SmtpSession {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> SmtpSession<T> {
    pub const fn with_transport(transport: T) -> Self {
        Self {
            transport,
            state: SessionState::Disconnected,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Sends `message` using `config`, then disconnects.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by connecting, authenticating or
    /// sending, unchanged.
    #[tracing::instrument(
        skip_all,
        fields(host = %config.host, port = config.port, message_id = %message.message_id())
    )]
    pub async fn send(mut self, message: &Message, config: &SessionConfig) -> Result<(), SessionError> {
        let result = self.run(message, config).await;

        if let Err(error) = &result {
            tracing::warn!(state = %self.state, %error, "Session failed");
        }

        self.close().await;
        result
    }

    async fn run(&mut self, message: &Message, config: &SessionConfig) -> Result<(), SessionError> {
        self.transition(SessionState::Connecting);
        self.transport.connect(config).await?;
        self.transition(SessionState::Connected);

        if let Some(credentials) = &config.credentials {
            self.transition(SessionState::Authenticating);
            self.transport.authenticate(credentials).await?;
            self.transition(SessionState::Authenticated);
        }

        self.transition(SessionState::Sending);
        self.transport.send(message).await?;
        self.transition(SessionState::Sent);

        Ok(())
    }

    async fn close(&mut self) {
        self.transition(SessionState::Disconnecting);

        if self.transport.is_connected() {
            if let Err(error) = self.transport.disconnect().await {
                tracing::debug!(%error, "Ignoring error while disconnecting");
            }
        }

        self.transition(SessionState::Disconnected);
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = %self.state, to = %next, "Session state");
        self.state = next;
    }
}
