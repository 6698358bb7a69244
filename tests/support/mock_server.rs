//! Scripted SMTP relay for integration tests.
#![allow(dead_code)] // Not every test uses every knob
//!
//! - Answers each command with a configurable reply
//! - Accepts AUTH PLAIN and AUTH LOGIN, recording the decoded credentials
//! - Records every command and the raw message content for verification
//! - Can drop the connection after a number of commands
//! - Can offer STARTTLS or implicit TLS with a throwaway self-signed
//!   certificate for `localhost`
//!
//! # Example
//!
//! ```rust,no_run
//! use support::mock_server::MockSmtpServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockSmtpServer::builder()
//!     .with_capabilities(&["AUTH PLAIN LOGIN"])
//!     .with_rejected_recipient("nobody@example.com", 550, "No such user")
//!     .build()
//!     .await?;
//!
//! // Point a SessionConfig at server.addr()
//!
//! server.shutdown();
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashMap,
    fmt::Write,
    io,
    net::SocketAddr,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine};
use mailsend::tracing;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};
use tokio_rustls::{
    rustls::{
        pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer},
        ServerConfig,
    },
    server::TlsStream,
    TlsAcceptor,
};

/// SMTP command received by the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    Helo(String),
    StartTls,
    /// The TLS handshake completed, either after STARTTLS or on connect
    TlsEstablished,
    /// AUTH with the decoded `username` and `secret`
    Auth {
        mechanism: String,
        username: String,
        secret: String,
    },
    /// MAIL FROM with the reverse-path between the angle brackets
    MailFrom(String),
    /// RCPT TO with the forward-path between the angle brackets
    RcptTo(String),
    Data,
    /// Message content exactly as transmitted, still dot-stuffed
    MessageContent(String),
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct SmtpResponse {
    pub code: u16,
    pub message: String,
}

impl SmtpResponse {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Clone)]
struct EhloResponse {
    code: u16,
    lines: Vec<String>,
}

impl EhloResponse {
    fn to_bytes(&self) -> Vec<u8> {
        let mut response = String::new();
        let last = self.lines.len().saturating_sub(1);

        for (i, line) in self.lines.iter().enumerate() {
            let separator = if i < last { '-' } else { ' ' };
            let _ = write!(&mut response, "{}{separator}{line}\r\n", self.code);
        }

        response.into_bytes()
    }
}

/// How the server offers TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TlsMode {
    None,
    StartTls,
    Implicit,
}

enum MockStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MockStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// A TLS acceptor with a freshly generated self-signed certificate.
fn self_signed_acceptor() -> io::Result<TlsAcceptor> {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(io::Error::other)?;
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        certified.key_pair.serialize_der(),
    ));

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![certified.cert.der().clone()], key)
        .map_err(io::Error::other)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[derive(Clone)]
struct MockServerConfig {
    greeting: SmtpResponse,
    ehlo_response: EhloResponse,
    helo_response: SmtpResponse,
    starttls_response: SmtpResponse,
    auth_response: SmtpResponse,
    mail_from_response: SmtpResponse,
    rcpt_to_response: SmtpResponse,
    rejected_recipients: HashMap<String, SmtpResponse>,
    data_response: SmtpResponse,
    data_end_response: SmtpResponse,
    quit_response: SmtpResponse,
    drop_after_commands: Option<usize>,
    tls: TlsMode,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting: SmtpResponse::new(220, "mock.test ESMTP ready"),
            ehlo_response: EhloResponse {
                code: 250,
                lines: vec!["mock.test".to_string(), "SIZE 10000000".to_string()],
            },
            helo_response: SmtpResponse::new(250, "mock.test"),
            starttls_response: SmtpResponse::new(502, "Command not implemented"),
            auth_response: SmtpResponse::new(235, "Authentication successful"),
            mail_from_response: SmtpResponse::new(250, "OK"),
            rcpt_to_response: SmtpResponse::new(250, "OK"),
            rejected_recipients: HashMap::new(),
            data_response: SmtpResponse::new(354, "Start mail input; end with <CRLF>.<CRLF>"),
            data_end_response: SmtpResponse::new(250, "OK: Message accepted"),
            quit_response: SmtpResponse::new(221, "Bye"),
            drop_after_commands: None,
            tls: TlsMode::None,
        }
    }
}

fn path_argument(argument: &str) -> String {
    let start = argument.find('<').map_or(0, |i| i + 1);
    let end = argument.find('>').unwrap_or(argument.len());
    argument.get(start..end).unwrap_or_default().to_string()
}

fn decode(token: &str) -> String {
    STANDARD
        .decode(token.trim())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands_received: Arc<RwLock<Vec<SmtpCommand>>>,
    shutdown: Arc<AtomicBool>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::new()
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// All commands received so far, across every connection.
    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands_received.read().await.clone()
    }

    /// Recipients in the order RCPT TO was issued.
    pub async fn recipients(&self) -> Vec<String> {
        self.commands()
            .await
            .into_iter()
            .filter_map(|command| match command {
                SmtpCommand::RcptTo(to) => Some(to),
                _ => None,
            })
            .collect()
    }

    /// The first message received, with dot-stuffing removed.
    pub async fn message(&self) -> Option<String> {
        self.commands().await.into_iter().find_map(|command| match command {
            SmtpCommand::MessageContent(content) => Some(
                content
                    .split_inclusive('\n')
                    .map(|line| line.strip_prefix('.').unwrap_or(line))
                    .collect(),
            ),
            _ => None,
        })
    }

    pub async fn quit_count(&self) -> usize {
        self.commands()
            .await
            .iter()
            .filter(|command| **command == SmtpCommand::Quit)
            .count()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    #[allow(clippy::too_many_lines)]
    async fn handle_client(
        stream: TcpStream,
        config: Arc<MockServerConfig>,
        acceptor: Option<TlsAcceptor>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let stream = match (&acceptor, config.tls) {
            (Some(acceptor), TlsMode::Implicit) => {
                let tls = acceptor.accept(stream).await?;
                commands.write().await.push(SmtpCommand::TlsEstablished);
                MockStream::Tls(Box::new(tls))
            }
            _ => MockStream::Plain(stream),
        };

        let mut stream = BufReader::new(stream);
        let mut line = String::new();
        let mut command_count = 0;

        stream.write_all(&config.greeting.to_bytes()).await?;
        stream.flush().await?;

        loop {
            line.clear();

            if config
                .drop_after_commands
                .is_some_and(|limit| command_count >= limit)
            {
                return Ok(());
            }

            let Ok(read) = timeout(Duration::from_secs(10), stream.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }

            command_count += 1;

            let cmd_line = line.trim_end().to_string();
            tracing::debug!("Mock server received: {cmd_line}");

            let (verb, argument) = cmd_line
                .split_once(' ')
                .unwrap_or((cmd_line.as_str(), ""));

            let (response, command) = match verb.to_uppercase().as_str() {
                "EHLO" => (
                    config.ehlo_response.to_bytes(),
                    SmtpCommand::Ehlo(argument.to_string()),
                ),
                "HELO" => (
                    config.helo_response.to_bytes(),
                    SmtpCommand::Helo(argument.to_string()),
                ),
                "STARTTLS" => {
                    commands.write().await.push(SmtpCommand::StartTls);
                    stream.write_all(&config.starttls_response.to_bytes()).await?;
                    stream.flush().await?;

                    let Some(acceptor) = acceptor
                        .as_ref()
                        .filter(|_| config.starttls_response.code == 220)
                    else {
                        continue;
                    };

                    let MockStream::Plain(tcp) = stream.into_inner() else {
                        return Ok(());
                    };
                    let tls = acceptor.accept(tcp).await?;
                    commands.write().await.push(SmtpCommand::TlsEstablished);
                    stream = BufReader::new(MockStream::Tls(Box::new(tls)));
                    continue;
                }
                "AUTH" => {
                    let (mechanism, initial) =
                        argument.split_once(' ').unwrap_or((argument, ""));

                    let command = if mechanism.eq_ignore_ascii_case("LOGIN") {
                        stream.write_all(b"334 VXNlcm5hbWU6\r\n").await?;
                        stream.flush().await?;
                        let mut username = String::new();
                        stream.read_line(&mut username).await?;

                        stream.write_all(b"334 UGFzc3dvcmQ6\r\n").await?;
                        stream.flush().await?;
                        let mut secret = String::new();
                        stream.read_line(&mut secret).await?;

                        SmtpCommand::Auth {
                            mechanism: "LOGIN".to_string(),
                            username: decode(&username),
                            secret: decode(&secret),
                        }
                    } else {
                        let decoded = decode(initial);
                        let mut fields = decoded.split('\0').skip(1);
                        SmtpCommand::Auth {
                            mechanism: mechanism.to_uppercase(),
                            username: fields.next().unwrap_or_default().to_string(),
                            secret: fields.next().unwrap_or_default().to_string(),
                        }
                    };

                    (config.auth_response.to_bytes(), command)
                }
                "MAIL" => (
                    config.mail_from_response.to_bytes(),
                    SmtpCommand::MailFrom(path_argument(argument)),
                ),
                "RCPT" => {
                    let to = path_argument(argument);
                    let response = config
                        .rejected_recipients
                        .get(&to)
                        .unwrap_or(&config.rcpt_to_response);
                    (response.to_bytes(), SmtpCommand::RcptTo(to))
                }
                "DATA" => (config.data_response.to_bytes(), SmtpCommand::Data),
                "QUIT" => {
                    commands.write().await.push(SmtpCommand::Quit);
                    stream.write_all(&config.quit_response.to_bytes()).await?;
                    stream.flush().await?;
                    return Ok(());
                }
                _ => (
                    SmtpResponse::new(500, "Unknown command").to_bytes(),
                    SmtpCommand::Other(cmd_line.clone()),
                ),
            };

            commands.write().await.push(command.clone());
            stream.write_all(&response).await?;
            stream.flush().await?;

            if command == SmtpCommand::Data && config.data_response.code == 354 {
                let mut content = String::new();
                let mut data_line = String::new();

                loop {
                    data_line.clear();
                    if stream.read_line(&mut data_line).await? == 0 {
                        return Ok(());
                    }
                    if data_line == ".\r\n" || data_line == ".\n" {
                        break;
                    }
                    content.push_str(&data_line);
                }

                commands
                    .write()
                    .await
                    .push(SmtpCommand::MessageContent(content));
                stream
                    .write_all(&config.data_end_response.to_bytes())
                    .await?;
                stream.flush().await?;
            }
        }
    }
}

pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    fn new() -> Self {
        Self {
            config: MockServerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = SmtpResponse::new(code, message);
        self
    }

    /// Extension keywords advertised after the EHLO greeting line.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.config.ehlo_response.lines = std::iter::once("mock.test")
            .chain(capabilities.iter().copied())
            .map(str::to_string)
            .collect();
        self
    }

    #[must_use]
    pub fn with_ehlo_code(mut self, code: u16) -> Self {
        self.config.ehlo_response.code = code;
        self
    }

    #[must_use]
    pub fn with_helo_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.helo_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_starttls_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.starttls_response = SmtpResponse::new(code, message);
        self
    }

    /// Final reply to AUTH, after any LOGIN challenges.
    #[must_use]
    pub fn with_auth_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.auth_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to_response = SmtpResponse::new(code, message);
        self
    }

    /// Reject RCPT TO for one address only.
    #[must_use]
    pub fn with_rejected_recipient(
        mut self,
        address: impl Into<String>,
        code: u16,
        message: impl Into<String>,
    ) -> Self {
        self.config
            .rejected_recipients
            .insert(address.into(), SmtpResponse::new(code, message));
        self
    }

    #[must_use]
    pub fn with_data_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_response = SmtpResponse::new(code, message);
        self
    }

    /// Reply after the terminating `.`
    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end_response = SmtpResponse::new(code, message);
        self
    }

    /// Answer STARTTLS with 220 and complete a TLS handshake.
    ///
    /// STARTTLS must still be advertised through [`Self::with_capabilities`].
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.config.tls = TlsMode::StartTls;
        self.config.starttls_response = SmtpResponse::new(220, "Ready to start TLS");
        self
    }

    /// Complete a TLS handshake before the greeting.
    #[must_use]
    pub const fn with_implicit_tls(mut self) -> Self {
        self.config.tls = TlsMode::Implicit;
        self
    }

    /// Close the connection without a reply once `count` commands were read.
    #[must_use]
    pub const fn with_network_error_after_commands(mut self, count: usize) -> Self {
        self.config.drop_after_commands = Some(count);
        self
    }

    /// Binds to a random local port and starts serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to a port
    pub async fn build(self) -> Result<MockSmtpServer, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let acceptor = match self.config.tls {
            TlsMode::None => None,
            TlsMode::StartTls | TlsMode::Implicit => Some(self_signed_acceptor()?),
        };
        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let commands_clone = Arc::clone(&commands);
        let shutdown_clone = Arc::clone(&shutdown);

        tokio::spawn(async move {
            while !shutdown_clone.load(Ordering::Relaxed) {
                let accept_result = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok((stream, _peer))) = accept_result {
                    let config = Arc::clone(&config);
                    let acceptor = acceptor.clone();
                    let commands = Arc::clone(&commands_clone);

                    tokio::spawn(async move {
                        if let Err(e) =
                            MockSmtpServer::handle_client(stream, config, acceptor, commands).await
                        {
                            tracing::debug!("Mock server client error: {e}");
                        }
                    });
                }
            }
        });

        Ok(MockSmtpServer {
            addr,
            commands_received: commands,
            shutdown,
        })
    }
}
