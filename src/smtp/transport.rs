use std::{future::Future, time::Duration};

use async_trait::async_trait;

use super::{
    client::SmtpClient,
    error::{ClientError, Result},
    extensions::{AuthMechanism, Capabilities},
    response::Response,
};
use crate::{
    config::{ClientTimeouts, SecurityMode, SessionConfig},
    credentials::Credentials,
    error::SessionError,
    message::Message,
    session::Transport,
    tracing,
};

/// Bounds `step` by `limit`, turning an elapsed timer into
/// [`ClientError::Timeout`].
async fn within<T>(
    limit: Duration,
    step: &'static str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| ClientError::Timeout { step, after: limit })?
}

fn connect_failed(error: ClientError) -> SessionError {
    SessionError::ConnectFailed(error.to_string())
}

fn lost(error: ClientError) -> SessionError {
    SessionError::ConnectionLost(error.to_string())
}

fn rejected(response: &Response) -> SessionError {
    SessionError::SendRejected {
        code: response.code,
        message: response.message(),
    }
}

/// [`Transport`] over a real SMTP connection.
///
/// Holds at most one [`SmtpClient`]; the client only exists between a
/// successful [`Transport::connect`] and [`Transport::disconnect`].
#[derive(Default)]
pub struct SmtpTransport {
    client: Option<SmtpClient>,
    capabilities: Capabilities,
    timeouts: ClientTimeouts,
}

impl SmtpTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&mut self) -> std::result::Result<&mut SmtpClient, SessionError> {
        self.client
            .as_mut()
            .ok_or_else(|| SessionError::ConnectionLost("Not connected".to_string()))
    }

    /// EHLO, falling back to HELO when the relay rejects EHLO.
    async fn hello(
        client: &mut SmtpClient,
        helo_name: &str,
        limit: Duration,
    ) -> std::result::Result<Capabilities, SessionError> {
        let response = within(limit, "EHLO", client.ehlo(helo_name))
            .await
            .map_err(connect_failed)?;

        if response.is_success() {
            return Ok(Capabilities::from_ehlo(&response));
        }

        tracing::debug!(%response, "EHLO rejected, falling back to HELO");

        let response = within(limit, "HELO", client.helo(helo_name))
            .await
            .map_err(connect_failed)?;

        if response.is_success() {
            Ok(Capabilities::default())
        } else {
            Err(SessionError::ConnectFailed(format!(
                "Server rejected HELO: {response}"
            )))
        }
    }

    async fn transfer(&mut self, message: &Message) -> std::result::Result<(), SessionError> {
        let timeouts = self.timeouts.clone();
        let declare_size = self.capabilities.size.is_some();
        let client = self.client()?;

        let content = message.formatted();

        let sender = message.envelope_sender().to_string();
        let response = within(
            timeouts.mail_from(),
            "MAIL FROM",
            client.mail_from(&sender, declare_size.then_some(content.len())),
        )
        .await
        .map_err(lost)?;
        if !response.is_success() {
            return Err(rejected(&response));
        }

        let mut recipients = 0usize;
        for recipient in message.envelope_recipients() {
            let recipient = recipient.to_string();
            let response = within(timeouts.rcpt_to(), "RCPT TO", client.rcpt_to(&recipient))
                .await
                .map_err(lost)?;
            if !response.is_success() {
                tracing::warn!(%recipient, %response, "Recipient rejected");
                return Err(rejected(&response));
            }
            recipients += 1;
        }

        let response = within(timeouts.data(), "DATA", client.data())
            .await
            .map_err(lost)?;
        if !response.is_intermediate() {
            return Err(rejected(&response));
        }

        let response = within(timeouts.data(), "Message data", client.send_data(&content))
            .await
            .map_err(lost)?;
        if !response.is_success() {
            return Err(rejected(&response));
        }

        tracing::info!(recipients, %response, "Message accepted");
        Ok(())
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    #[tracing::instrument(skip_all, fields(address = %config.address(), security = ?config.security))]
    async fn connect(&mut self, config: &SessionConfig) -> std::result::Result<(), SessionError> {
        let address = config.address();
        let timeouts = &config.timeouts;

        if config.accept_invalid_certs {
            tracing::warn!(
                %address,
                "SECURITY WARNING: TLS certificate validation is disabled for this connection"
            );
        }

        let implicit_tls = config.uses_implicit_tls();
        let connecting = async {
            if implicit_tls {
                SmtpClient::connect_tls(&address, config.host.clone(), config.accept_invalid_certs)
                    .await
            } else {
                Ok(SmtpClient::connect(&address, config.host.clone())
                    .await?
                    .accept_invalid_certs(config.accept_invalid_certs))
            }
        };

        let mut client = within(timeouts.connect(), "Connect", connecting)
            .await
            .map_err(|e| SessionError::ConnectFailed(format!("Failed to connect to {address}: {e}")))?;

        let greeting = within(timeouts.ehlo(), "Greeting", client.read_greeting())
            .await
            .map_err(connect_failed)?;
        if !greeting.is_success() {
            return Err(SessionError::ConnectFailed(format!(
                "Server rejected connection: {greeting}"
            )));
        }

        let mut capabilities = Self::hello(&mut client, &config.helo_name, timeouts.ehlo()).await?;

        if config.security == SecurityMode::AutoNegotiate && !client.is_tls() && capabilities.starttls {
            let response = within(timeouts.starttls(), "STARTTLS", client.starttls())
                .await
                .map_err(|e| SessionError::ConnectFailed(format!("STARTTLS failed: {e}")))?;
            if !response.is_success() {
                return Err(SessionError::ConnectFailed(format!(
                    "Server rejected STARTTLS: {response}"
                )));
            }

            // RFC 3207: forget everything learned before the handshake.
            capabilities = Self::hello(&mut client, &config.helo_name, timeouts.ehlo()).await?;
            tracing::info!("TLS negotiated via STARTTLS");
        }

        tracing::debug!(tls = client.is_tls(), ?capabilities, "Connected");

        self.timeouts = timeouts.clone();
        self.capabilities = capabilities;
        self.client = Some(client);
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(username = credentials.username()))]
    async fn authenticate(
        &mut self,
        credentials: &Credentials,
    ) -> std::result::Result<(), SessionError> {
        let mechanism = self.capabilities.preferred_auth().ok_or_else(|| {
            SessionError::AuthFailed(
                "Server does not advertise a supported AUTH mechanism".to_string(),
            )
        })?;
        let limit = self.timeouts.auth();
        let client = self.client()?;

        let secret = credentials.reveal();
        let response = match mechanism {
            AuthMechanism::Plain => {
                within(limit, "AUTH PLAIN", client.auth_plain(credentials.username(), &secret))
                    .await
            }
            AuthMechanism::Login => {
                within(limit, "AUTH LOGIN", client.auth_login(credentials.username(), &secret))
                    .await
            }
        }
        .map_err(|e| SessionError::AuthFailed(e.to_string()))?;

        if response.code != 235 {
            return Err(SessionError::AuthFailed(response.to_string()));
        }

        tracing::info!(%mechanism, "Authenticated");
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn send(&mut self, message: &Message) -> std::result::Result<(), SessionError> {
        let result = self.transfer(message).await;

        if matches!(result, Err(SessionError::ConnectionLost(_))) {
            self.client = None;
        }

        result
    }

    async fn disconnect(&mut self) -> std::result::Result<(), SessionError> {
        let Some(mut client) = self.client.take() else {
            return Ok(());
        };

        let quit = within(self.timeouts.quit(), "QUIT", client.quit()).await;
        drop(client);

        quit.map(|_| ()).map_err(lost)
    }

    fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(SmtpClient::is_connected)
    }
}
