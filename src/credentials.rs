use std::fmt;

use zeroize::Zeroizing;

/// A username and secret for SMTP authentication.
///
/// The secret is held in a buffer that is zeroed on drop and is never
/// printed by `Debug`. Call [`Credentials::reveal`] to materialise a copy for
/// the duration of a single authentication exchange.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    secret: Zeroizing<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Zeroizing::new(secret.into()),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns a copy of the secret that is zeroed when dropped.
    #[must_use]
    pub fn reveal(&self) -> Zeroizing<String> {
        self.secret.clone()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}
