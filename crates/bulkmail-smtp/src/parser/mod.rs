//! Incremental reply parser.
//!
//! Replies arrive one line at a time. Continuation lines use `-` after the
//! code (`250-SIZE 1000`), the final line uses a space or nothing at all
//! (`250 OK`, `250`).

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Collects the lines of one reply.
#[derive(Debug, Default)]
pub struct ReplyParser {
    code: Option<ReplyCode>,
    lines: Vec<String>,
}

impl ReplyParser {
    /// Creates an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line (without CRLF).
    ///
    /// Returns the finished reply once the final line has been seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is malformed or its code differs from the
    /// earlier lines of the same reply.
    pub fn push_line(&mut self, line: &str) -> Result<Option<Reply>> {
        let (code, is_last, text) = split_line(line)?;

        match self.code {
            None => self.code = Some(code),
            Some(first) if first != code => {
                return Err(Error::Protocol(format!(
                    "Reply code changed from {first} to {code} mid-reply"
                )));
            }
            Some(_) => {}
        }
        self.lines.push(text.to_string());

        if is_last {
            let lines = std::mem::take(&mut self.lines);
            self.code = None;
            Ok(Some(Reply::new(code, lines)))
        } else {
            Ok(None)
        }
    }
}

fn split_line(line: &str) -> Result<(ReplyCode, bool, &str)> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(Error::Protocol(format!("Invalid reply line: {line:?}")));
    }

    let code = line[..3]
        .parse::<u16>()
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {line:?}")))?;

    match bytes.get(3) {
        None => Ok((ReplyCode::new(code), true, "")),
        Some(b' ') => Ok((ReplyCode::new(code), true, &line[4..])),
        Some(b'-') => Ok((ReplyCode::new(code), false, &line[4..])),
        Some(_) => Err(Error::Protocol(format!("Invalid reply separator: {line:?}"))),
    }
}

/// Parses a complete reply from its lines.
///
/// # Errors
///
/// Returns an error if a line is malformed or the last line is a continuation.
pub fn parse_reply<S: AsRef<str>>(lines: &[S]) -> Result<Reply> {
    let mut parser = ReplyParser::new();
    for line in lines {
        if let Some(reply) = parser.push_line(line.as_ref())? {
            return Ok(reply);
        }
    }
    Err(Error::Protocol("Incomplete reply".into()))
}
