//! The job file read by the `mailsend` binary.
//!
//! ```toml
//! [smtp]
//! host = "smtp.example.com"
//! port = 587
//! username = "reports"
//! password_env = "MAILSEND_PASSWORD"
//!
//! [message]
//! from = "Reports <reports@example.com>"
//! to = ["ops@example.com"]
//! subject = "Nightly report"
//! text_body = "See attached."
//! attachments = ["report.csv"]
//! ```

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use super::SessionConfig;
use crate::{credentials::Credentials, message::MessageBuilder};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("smtp.username is set but smtp.password_env is not")]
    MissingPasswordEnv,

    #[error("Environment variable {0} holding the SMTP password is not set")]
    PasswordNotSet(String),
}

#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub smtp: SmtpSection,
    pub message: MessageSection,
}

#[derive(Debug, Deserialize)]
pub struct SmtpSection {
    #[serde(flatten)]
    pub session: SessionConfig,

    #[serde(default)]
    pub username: Option<String>,

    /// Name of the environment variable holding the password. The password
    /// itself never appears in the file.
    #[serde(default)]
    pub password_env: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MessageSection {
    pub from: Option<String>,
    pub reply_to: Vec<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: Option<String>,
    pub priority: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub attachments: Vec<PathBuf>,
}

impl JobConfig {
    /// Resolves the session configuration, reading the password from the
    /// process environment.
    ///
    /// # Errors
    /// See [`JobConfig::session_config_with`].
    pub fn session_config(&self) -> Result<SessionConfig, JobError> {
        self.session_config_with(|name| std::env::var(name).ok())
    }

    /// Resolves the session configuration, looking the password up with `env`.
    ///
    /// # Errors
    /// - [`JobError::MissingPasswordEnv`] if a username is given without `password_env`
    /// - [`JobError::PasswordNotSet`] if the named variable is unset
    pub fn session_config_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<SessionConfig, JobError> {
        let credentials = match (&self.smtp.username, &self.smtp.password_env) {
            (None, _) => None,
            (Some(_), None) => return Err(JobError::MissingPasswordEnv),
            (Some(username), Some(var)) => {
                let secret = env(var).ok_or_else(|| JobError::PasswordNotSet(var.clone()))?;
                Some(Credentials::new(username.clone(), secret))
            }
        };

        Ok(self.smtp.session.clone().with_credentials(credentials))
    }

    /// A builder holding the `[message]` table. Nothing is validated until
    /// [`MessageBuilder::build`].
    #[must_use]
    pub fn message_builder(&self) -> MessageBuilder {
        let message = &self.message;
        let mut builder = MessageBuilder::new()
            .reply_to_multiple(&message.reply_to)
            .to_multiple(&message.to)
            .cc_multiple(&message.cc)
            .bcc_multiple(&message.bcc)
            .attach_multiple(&message.attachments);

        if let Some(from) = &message.from {
            builder = builder.from(from.as_str());
        }
        if let Some(subject) = &message.subject {
            builder = builder.subject(subject.as_str());
        }
        if let Some(priority) = &message.priority {
            builder = builder.priority(priority.as_str());
        }
        if let Some(text) = &message.text_body {
            builder = builder.text_body(text.as_str());
        }
        if let Some(html) = &message.html_body {
            builder = builder.html_body(html.as_str());
        }

        builder
    }
}
