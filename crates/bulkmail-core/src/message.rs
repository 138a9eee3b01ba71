//! RFC 5322 message text for a single job.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset};

use crate::job::SendJob;

/// Raw bytes per encoded word; 45 bytes become 60 base64 characters.
const ENCODED_WORD_CHUNK: usize = 45;

/// RFC 5321 line limit, excluding CRLF.
const MAX_LINE_OCTETS: usize = 998;

/// Base64 body line length (RFC 2045).
const BASE64_LINE: usize = 76;

/// Builds the plain text message sent to `job`'s recipient.
///
/// Lines end in CRLF. Bodies that are plain ASCII with short lines go out as
/// `7bit`; anything else is base64 encoded, so the message is valid on servers
/// without 8BITMIME. Dot-stuffing is left to the SMTP layer.
#[must_use]
pub fn compose_message(from: &str, job: &SendJob, date: DateTime<FixedOffset>) -> String {
    let mut out = String::with_capacity(job.body().len() + 256);
    push_header(&mut out, "From", from);
    push_header(&mut out, "To", job.recipient());
    push_header(&mut out, "Subject", &encode_header_value(job.subject()));
    push_header(&mut out, "Date", &date.to_rfc2822());
    push_header(&mut out, "MIME-Version", "1.0");
    push_header(&mut out, "Content-Type", "text/plain; charset=utf-8");

    let body = job.body();
    if is_7bit_safe(body) {
        push_header(&mut out, "Content-Transfer-Encoding", "7bit");
        out.push_str("\r\n");
        for line in body.lines() {
            out.push_str(line);
            out.push_str("\r\n");
        }
    } else {
        push_header(&mut out, "Content-Transfer-Encoding", "base64");
        out.push_str("\r\n");
        push_base64_body(&mut out, body);
    }
    out
}

fn is_7bit_safe(body: &str) -> bool {
    body.is_ascii()
        && !body.contains('\0')
        && body.lines().all(|line| line.len() <= MAX_LINE_OCTETS)
}

fn push_base64_body(out: &mut String, body: &str) {
    let mut canonical = String::with_capacity(body.len() + 16);
    for line in body.lines() {
        canonical.push_str(line);
        canonical.push_str("\r\n");
    }
    let encoded = STANDARD.encode(canonical);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE) {
        out.extend(chunk.iter().map(|&b| char::from(b)));
        out.push_str("\r\n");
    }
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

/// Encodes a header value as RFC 2047 words when it is not plain ASCII.
fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_CHUNK {
            words.push(encoded_word(&chunk));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk));
    }
    words.join("\r\n ")
}

fn encoded_word(text: &str) -> String {
    format!("=?utf-8?B?{}?=", STANDARD.encode(text))
}
