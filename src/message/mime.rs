//! MIME rendering for [`Message`].
//!
//! Produces a CRLF-delimited RFC 5322 document. Part layout:
//!
//! - no body and no attachments: an empty `text/plain` part
//! - a single body: `text/plain` or `text/html`
//! - both bodies: `multipart/alternative`, plain text first
//! - attachments: `multipart/mixed` wrapping the body (if any) followed by
//!   each attachment in order

use std::fmt::Write;

use base64::{engine::general_purpose::STANDARD, Engine};

use super::{attachment::Attachment, Message};

/// Longest line allowed in a `7bit` part, excluding CRLF.
const MAX_LINE_LENGTH: usize = 998;

/// Encoded words are kept under the 75 character limit by limiting how many
/// bytes of input each one carries.
const ENCODED_WORD_CHUNK: usize = 45;

const BASE64_LINE_LENGTH: usize = 76;

/// Preferred header line width (RFC 5322 section 2.2.3).
const FOLD_WIDTH: usize = 78;

/// Characters that force a display name into a quoted-string.
const SPECIALS: &[char] = &[
    '(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"',
];

/// Encodes `text` as one or more RFC 2047 `B` encoded words separated by
/// folding whitespace. Multi-byte characters are never split across words.
#[must_use]
pub fn encode_words(text: &str) -> String {
    let mut words = Vec::new();
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        if idx + ch.len_utf8() - start > ENCODED_WORD_CHUNK {
            words.push(&text[start..idx]);
            start = idx;
        }
    }
    words.push(&text[start..]);

    words
        .into_iter()
        .map(|word| format!("=?utf-8?B?{}?=", STANDARD.encode(word)))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Encodes free-form header text such as a subject. `offset` is the width
/// already taken on the first line by the field name.
///
/// ASCII text is folded at spaces. Text that cannot be folded under the
/// line limit, or that is not ASCII, becomes encoded words.
#[must_use]
pub fn encode_text(text: &str, offset: usize) -> String {
    let foldable = text.is_ascii()
        && !text.contains(&['\r', '\n'][..])
        && text
            .split(' ')
            .all(|word| offset + 1 + word.len() <= MAX_LINE_LENGTH);

    if foldable {
        fold(text, offset)
    } else {
        encode_words(text)
    }
}

fn fold(text: &str, offset: usize) -> String {
    let mut folded = String::with_capacity(text.len() + text.len() / FOLD_WIDTH * 3);
    let mut width = offset;

    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            if !word.is_empty() && width + 1 + word.len() > FOLD_WIDTH {
                folded.push_str("\r\n ");
                width = 1;
            } else {
                folded.push(' ');
                width += 1;
            }
        }
        folded.push_str(word);
        width += word.len();
    }

    folded
}

/// Encodes a display name, quoting it when it contains specials.
#[must_use]
pub fn encode_phrase(name: &str) -> String {
    if !name.is_ascii() || name.contains(&['\r', '\n'][..]) {
        encode_words(name)
    } else if name.contains(SPECIALS) {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        name.to_string()
    }
}

/// Converts bare `\n` and `\r` line endings to CRLF.
#[must_use]
pub fn normalize_newlines(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len() + text.len() / 32);
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                normalized.push_str("\r\n");
            }
            '\n' => normalized.push_str("\r\n"),
            c => normalized.push(c),
        }
    }

    normalized
}

/// Base64 encodes `data`, wrapping at 76 columns. Every line, including the
/// last, ends with CRLF.
#[must_use]
pub fn wrap_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / 38 + 2);

    for line in encoded.as_bytes().chunks(BASE64_LINE_LENGTH) {
        // base64 output is always ASCII
        wrapped.push_str(std::str::from_utf8(line).unwrap_or_default());
        wrapped.push_str("\r\n");
    }

    wrapped
}

fn needs_base64(text: &str) -> bool {
    !text.is_ascii() || text.split("\r\n").any(|line| line.len() > MAX_LINE_LENGTH)
}

fn write_text_part(out: &mut String, subtype: &str, text: &str) {
    let text = normalize_newlines(text);

    let _ = write!(out, "Content-Type: text/{subtype}; charset=utf-8\r\n");
    if needs_base64(&text) {
        out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        out.push_str(&wrap_base64(text.as_bytes()));
    } else {
        out.push_str("Content-Transfer-Encoding: 7bit\r\n\r\n");
        out.push_str(&text);
        if !text.is_empty() && !text.ends_with("\r\n") {
            out.push_str("\r\n");
        }
    }
}

fn write_attachment(out: &mut String, attachment: &Attachment) {
    let filename = header_filename(&attachment.filename);

    let _ = write!(
        out,
        "Content-Type: {}; name=\"{filename}\"\r\n",
        attachment.content_type
    );
    out.push_str("Content-Transfer-Encoding: base64\r\n");
    let _ = write!(
        out,
        "Content-Disposition: attachment; filename=\"{filename}\"\r\n\r\n"
    );
    out.push_str(&wrap_base64(&attachment.data));
}

/// Quotes a file name for the `name` and `filename` parameters. Control
/// characters are dropped so the name cannot break out of its header.
fn header_filename(filename: &str) -> String {
    let filename: String = filename.chars().filter(|c| !c.is_control()).collect();

    if filename.is_ascii() {
        filename.replace('\\', "\\\\").replace('"', "\\\"")
    } else {
        encode_words(&filename).replace("\r\n ", " ")
    }
}

/// Writes the body parts (without attachments) including their headers.
fn write_body(out: &mut String, message: &Message, boundary: &str) {
    match (message.text_body(), message.html_body()) {
        (Some(text), Some(html)) => {
            let _ = write!(
                out,
                "Content-Type: multipart/alternative; boundary=\"{boundary}\"\r\n\r\n"
            );
            let _ = write!(out, "--{boundary}\r\n");
            write_text_part(out, "plain", text);
            let _ = write!(out, "--{boundary}\r\n");
            write_text_part(out, "html", html);
            let _ = write!(out, "--{boundary}--\r\n");
        }
        (Some(text), None) => write_text_part(out, "plain", text),
        (None, Some(html)) => write_text_part(out, "html", html),
        (None, None) => write_text_part(out, "plain", ""),
    }
}

fn write_headers(out: &mut String, message: &Message) {
    let _ = write!(out, "Date: {}\r\n", message.date().to_rfc2822());
    let _ = write!(out, "From: {}\r\n", message.from().to_header());

    if !message.reply_to().is_empty() {
        let _ = write!(out, "Reply-To: {}\r\n", message.reply_to().to_header());
    }

    let _ = write!(out, "To: {}\r\n", message.to().to_header());

    if !message.cc().is_empty() {
        let _ = write!(out, "Cc: {}\r\n", message.cc().to_header());
    }

    if let Some(subject) = message.subject() {
        let _ = write!(out, "Subject: {}\r\n", encode_text(subject, "Subject: ".len()));
    }

    let _ = write!(out, "Message-ID: {}\r\n", message.message_id());

    if let Some(priority) = message.priority() {
        let _ = write!(out, "Priority: {}\r\n", priority.header_value());
        let _ = write!(out, "X-Priority: {}\r\n", priority.x_priority());
        let _ = write!(out, "Importance: {}\r\n", priority.importance());
    }

    out.push_str("MIME-Version: 1.0\r\n");
}

/// Renders `message` as a complete MIME document.
#[must_use]
pub fn render(message: &Message) -> String {
    let mut out = String::with_capacity(
        2048 + message
            .attachments()
            .iter()
            .map(|a| a.data.len() * 4 / 3)
            .sum::<usize>(),
    );

    write_headers(&mut out, message);

    let alternative = format!("=_alt_{}", message.boundary_seed());

    if message.attachments().is_empty() {
        write_body(&mut out, message, &alternative);
        return out;
    }

    let mixed = format!("=_mixed_{}", message.boundary_seed());
    let _ = write!(
        out,
        "Content-Type: multipart/mixed; boundary=\"{mixed}\"\r\n\r\n"
    );

    if message.text_body().is_some() || message.html_body().is_some() {
        let _ = write!(out, "--{mixed}\r\n");
        write_body(&mut out, message, &alternative);
    }

    for attachment in message.attachments() {
        let _ = write!(out, "--{mixed}\r\n");
        write_attachment(&mut out, attachment);
    }

    let _ = write!(out, "--{mixed}--\r\n");

    out
}
