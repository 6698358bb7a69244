//! RFC 5321 mailbox parser
//!
//! Validates the `local-part@domain` form used for every participant of a
//! message. Display names and angle brackets are handled by
//! [`crate::address`]; this module only sees the bare mailbox.
//!
//! # ABNF Grammar (RFC 5321 Section 4.1.2)
//!
//! ```text
//! Mailbox        = Local-part "@" ( Domain / address-literal )
//! Local-part     = Dot-string / Quoted-string
//! Dot-string     = Atom *("." Atom)
//! Atom           = 1*atext
//! Quoted-string  = DQUOTE *QcontentSMTP DQUOTE
//! Domain         = sub-domain *("." sub-domain)
//! sub-domain     = Let-dig [Ldh-str]
//! address-literal = "[" ( IPv4-address-literal / IPv6-address-literal / General-address-literal ) "]"
//! ```
//!
//! # Size Constraints
//!
//! - Maximum local-part: 64 octets
//! - Maximum domain: 255 octets

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MailboxError>;

/// Reasons a mailbox fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    #[error("Empty address")]
    Empty,
    #[error("Local-part exceeds 64 octets")]
    LocalPartTooLong,
    #[error("Domain exceeds 255 octets")]
    DomainTooLong,
    #[error("Missing '@' separator in mailbox")]
    MissingAtSign,
    #[error("Invalid local-part: {0}")]
    InvalidLocalPart(String),
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    #[error("Invalid address literal: {0}")]
    InvalidAddressLiteral(String),
    #[error("Unclosed quoted string in local-part")]
    UnclosedQuotedString,
    #[error("Invalid quoted string: {0}")]
    InvalidQuotedString(String),
}

/// A validated mailbox (local-part@domain)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox {
    /// The local part (before @)
    pub local_part: String,
    /// The domain or address literal (after @)
    pub domain: String,
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}

impl std::str::FromStr for Mailbox {
    type Err = MailboxError;

    fn from_str(s: &str) -> Result<Self> {
        parse_mailbox(s)
    }
}

/// Parse a Mailbox: `local-part@domain` or `local-part@[address-literal]`
///
/// # Errors
///
/// Returns `MailboxError` if the input does not match the mailbox grammar.
pub fn parse_mailbox(input: &str) -> Result<Mailbox> {
    let input = input.trim();
    if input.is_empty() {
        return Err(MailboxError::Empty);
    }

    let at_pos = find_unquoted_at(input)?;

    let local_part = &input[..at_pos];
    let domain = &input[at_pos + 1..];

    if local_part.len() > 64 {
        return Err(MailboxError::LocalPartTooLong);
    }
    if domain.len() > 255 {
        return Err(MailboxError::DomainTooLong);
    }

    Ok(Mailbox {
        local_part: parse_local_part(local_part)?,
        domain: parse_domain_or_address_literal(domain)?,
    })
}

/// Byte offset of the last '@' outside a quoted string or address literal.
fn find_unquoted_at(input: &str) -> Result<usize> {
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut prev_was_backslash = false;
    let mut found = None;

    for (i, ch) in input.char_indices() {
        if ch == '"' && !prev_was_backslash && !in_brackets {
            in_quotes = !in_quotes;
        } else if ch == '[' && !in_quotes {
            in_brackets = true;
        } else if ch == ']' && !in_quotes {
            in_brackets = false;
        } else if ch == '@' && !in_quotes && !in_brackets {
            found = Some(i);
        }

        prev_was_backslash = ch == '\\' && !prev_was_backslash;
    }

    found.ok_or(MailboxError::MissingAtSign)
}

fn parse_local_part(input: &str) -> Result<String> {
    if input.is_empty() {
        return Err(MailboxError::InvalidLocalPart(
            "Empty local-part".to_string(),
        ));
    }

    if input.starts_with('"') {
        parse_quoted_string(input)
    } else {
        parse_dot_string(input)
    }
}

/// Dot-string: Atom *("." Atom)
fn parse_dot_string(input: &str) -> Result<String> {
    if input.starts_with('.') || input.ends_with('.') {
        return Err(MailboxError::InvalidLocalPart(
            "Dot-string cannot start or end with '.'".to_string(),
        ));
    }

    if input.contains("..") {
        return Err(MailboxError::InvalidLocalPart(
            "Dot-string cannot contain consecutive dots".to_string(),
        ));
    }

    if let Some(ch) = input.chars().find(|&ch| ch != '.' && !is_atext(ch)) {
        return Err(MailboxError::InvalidLocalPart(format!(
            "Invalid character '{ch}' in atom"
        )));
    }

    Ok(input.to_string())
}

/// Quoted-string: DQUOTE *`QcontentSMTP` DQUOTE
fn parse_quoted_string(input: &str) -> Result<String> {
    if !input.ends_with('"') || input.len() < 2 {
        return Err(MailboxError::UnclosedQuotedString);
    }

    let content = &input[1..input.len() - 1];

    let mut chars = content.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) if next.is_ascii_graphic() || next == ' ' => {}
                Some(next) => {
                    return Err(MailboxError::InvalidQuotedString(format!(
                        "Invalid quoted-pair: \\{next}"
                    )));
                }
                None => {
                    return Err(MailboxError::InvalidQuotedString(
                        "Backslash at end of quoted string".to_string(),
                    ));
                }
            }
        } else if !is_qtext_smtp(ch) {
            return Err(MailboxError::InvalidQuotedString(format!(
                "Invalid character '{ch}' in quoted string"
            )));
        }
    }

    Ok(input.to_string())
}

fn parse_domain_or_address_literal(input: &str) -> Result<String> {
    if input.starts_with('[') {
        parse_address_literal(input)
    } else {
        parse_domain(input)
    }
}

/// Domain: sub-domain *("." sub-domain)
fn parse_domain(input: &str) -> Result<String> {
    if input.is_empty() {
        return Err(MailboxError::InvalidDomain("Empty domain".to_string()));
    }

    if input.starts_with('.') || input.ends_with('.') {
        return Err(MailboxError::InvalidDomain(
            "Domain cannot start or end with '.'".to_string(),
        ));
    }

    if input.contains("..") {
        return Err(MailboxError::InvalidDomain(
            "Domain cannot contain consecutive dots".to_string(),
        ));
    }

    input.split('.').try_for_each(parse_subdomain)?;

    Ok(input.to_string())
}

/// sub-domain: Let-dig [Ldh-str]
fn parse_subdomain(input: &str) -> Result<()> {
    let (Some(first), Some(last)) = (input.chars().next(), input.chars().last()) else {
        return Err(MailboxError::InvalidDomain("Empty subdomain".to_string()));
    };

    if !first.is_ascii_alphanumeric() {
        return Err(MailboxError::InvalidDomain(format!(
            "Subdomain must start with letter or digit, got '{first}'"
        )));
    }

    if !last.is_ascii_alphanumeric() {
        return Err(MailboxError::InvalidDomain(format!(
            "Subdomain must end with letter or digit, got '{last}'"
        )));
    }

    if let Some(ch) = input
        .chars()
        .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '-')
    {
        return Err(MailboxError::InvalidDomain(format!(
            "Invalid character '{ch}' in subdomain"
        )));
    }

    Ok(())
}

/// address-literal: `[IPv4]`, `[IPv6:...]` or `[tag:...]`
fn parse_address_literal(input: &str) -> Result<String> {
    if !input.ends_with(']') {
        return Err(MailboxError::InvalidAddressLiteral(
            "Address literal must be enclosed in brackets".to_string(),
        ));
    }

    let content = &input[1..input.len() - 1];

    if content.parse::<Ipv4Addr>().is_ok() {
        return Ok(input.to_string());
    }

    if let Some(ipv6) = content.strip_prefix("IPv6:") {
        if ipv6.parse::<Ipv6Addr>().is_ok() {
            return Ok(input.to_string());
        }
    }

    if let Some((tag, value)) = content.split_once(':') {
        if !tag.is_empty() && !value.is_empty() {
            return Ok(input.to_string());
        }
    }

    Err(MailboxError::InvalidAddressLiteral(format!(
        "Invalid address literal format: {content}"
    )))
}

/// atext = ALPHA / DIGIT / "!" / "#" / "$" / "%" / "&" / "'" /
///         "*" / "+" / "-" / "/" / "=" / "?" / "^" / "_" / "\`" /
///         "{" / "|" / "}" / "~"
#[inline]
const fn is_atext(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '/'
                | '='
                | '?'
                | '^'
                | '_'
                | '`'
                | '{'
                | '|'
                | '}'
                | '~'
        )
}

/// qtextSMTP = %d32-33 / %d35-91 / %d93-126
#[inline]
const fn is_qtext_smtp(ch: char) -> bool {
    matches!(ch as u32, 32..=33 | 35..=91 | 93..=126)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_mailbox() {
        let mailbox = parse_mailbox("user@example.com").unwrap();
        assert_eq!(mailbox.local_part, "user");
        assert_eq!(mailbox.domain, "example.com");
        assert_eq!(mailbox.to_string(), "user@example.com");
    }

    #[test]
    fn dotted_and_tagged_local_part() {
        assert_eq!(
            parse_mailbox("first.last+tag@example.com")
                .unwrap()
                .local_part,
            "first.last+tag"
        );
    }

    #[test]
    fn quoted_local_part() {
        let mailbox = parse_mailbox(r#""user name"@example.com"#).unwrap();
        assert_eq!(mailbox.local_part, r#""user name""#);

        let mailbox = parse_mailbox(r#""a@b"@example.com"#).unwrap();
        assert_eq!(mailbox.local_part, r#""a@b""#);
        assert_eq!(mailbox.domain, "example.com");
    }

    #[test]
    fn address_literals() {
        assert_eq!(
            parse_mailbox("user@[192.168.1.1]").unwrap().domain,
            "[192.168.1.1]"
        );
        assert_eq!(
            parse_mailbox("user@[IPv6:2001:db8::1]").unwrap().domain,
            "[IPv6:2001:db8::1]"
        );
        assert!(matches!(
            parse_mailbox("user@[not-a-literal]"),
            Err(MailboxError::InvalidAddressLiteral(_))
        ));
    }

    #[test]
    fn rejects_malformed_mailboxes() {
        assert_eq!(parse_mailbox("   "), Err(MailboxError::Empty));
        assert_eq!(
            parse_mailbox("userexample.com"),
            Err(MailboxError::MissingAtSign)
        );
        assert!(matches!(
            parse_mailbox("user..name@example.com"),
            Err(MailboxError::InvalidLocalPart(_))
        ));
        assert!(matches!(
            parse_mailbox(".@example.com"),
            Err(MailboxError::InvalidLocalPart(_))
        ));
        assert!(matches!(
            parse_mailbox("user@.example.com"),
            Err(MailboxError::InvalidDomain(_))
        ));
        assert!(matches!(
            parse_mailbox("user@example-.com"),
            Err(MailboxError::InvalidDomain(_))
        ));
        assert!(matches!(
            parse_mailbox("us er@example.com"),
            Err(MailboxError::InvalidLocalPart(_))
        ));
        assert!(matches!(
            parse_mailbox("user@"),
            Err(MailboxError::InvalidDomain(_))
        ));
    }

    #[test]
    fn size_limits() {
        let long_local = format!("{}@example.com", "a".repeat(65));
        assert_eq!(
            parse_mailbox(&long_local),
            Err(MailboxError::LocalPartTooLong)
        );

        let long_domain = format!("user@{}.com", "a".repeat(256));
        assert_eq!(parse_mailbox(&long_domain), Err(MailboxError::DomainTooLong));
    }

    #[test]
    fn non_ascii_does_not_panic() {
        assert!(parse_mailbox("üser@example.com").is_err());
        assert!(parse_mailbox("user@exämple.com").is_err());
    }
}
