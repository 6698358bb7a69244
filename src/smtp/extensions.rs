use core::{
    fmt::{self, Display},
    str::FromStr,
};

use super::response::Response;

/// SASL mechanisms this client can perform, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthMechanism {
    /// RFC 4616, a single exchange carrying both username and secret.
    Plain,
    /// The de facto two-challenge LOGIN mechanism.
    Login,
}

impl Display for AuthMechanism {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Plain => fmt.write_str("PLAIN"),
            Self::Login => fmt.write_str("LOGIN"),
        }
    }
}

impl FromStr for AuthMechanism {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("PLAIN") {
            Ok(Self::Plain)
        } else if s.eq_ignore_ascii_case("LOGIN") {
            Ok(Self::Login)
        } else {
            Err(())
        }
    }
}

/// Extensions a relay advertised in its EHLO reply.
///
/// A relay that only answered HELO advertises nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub starttls: bool,
    /// Supported mechanisms, sorted by preference.
    pub auth: Vec<AuthMechanism>,
    /// Maximum message size from `SIZE`; `None` when absent or unlimited.
    pub size: Option<usize>,
}

impl Capabilities {
    /// Reads capabilities from an EHLO reply. The first line is the relay's
    /// greeting and is skipped; unknown keywords are ignored.
    #[must_use]
    pub fn from_ehlo(response: &Response) -> Self {
        let mut capabilities = Self::default();

        for line in response.lines.iter().skip(1) {
            let mut words = line.split_whitespace();
            let Some(keyword) = words.next() else {
                continue;
            };

            match keyword.to_ascii_uppercase().as_str() {
                "STARTTLS" => capabilities.starttls = true,
                "AUTH" => capabilities
                    .auth
                    .extend(words.filter_map(|m| m.parse::<AuthMechanism>().ok())),
                "SIZE" => {
                    capabilities.size = words
                        .next()
                        .and_then(|max| max.parse::<usize>().ok())
                        .filter(|max| *max > 0);
                }
                _ => {}
            }
        }

        capabilities.auth.sort_unstable();
        capabilities.auth.dedup();
        capabilities
    }

    /// The most preferred mechanism both sides support.
    #[must_use]
    pub fn preferred_auth(&self) -> Option<AuthMechanism> {
        self.auth.first().copied()
    }
}
