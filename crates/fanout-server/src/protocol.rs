//! Command parsing for the line protocol.
//!
//! ```text
//! PUB <channel> <payload>   publish payload on channel
//! SUB <client> <channel>    deliver channel messages to this connection
//! ```
//!
//! Lines are raw bytes. Tokens are separated by ASCII whitespace. The payload
//! is everything after the channel, trimmed, and is passed through untouched,
//! so it need not be UTF-8. Replies are `ERROR <reason>` lines; deliveries
//! are `DATA <payload>` lines.

use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest accepted command line, excluding the newline.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pub { channel: String, payload: Vec<u8> },
    Sub { client: String, channel: String },
}

impl Command {
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Pub { .. } => "PUB",
            Self::Sub { .. } => "SUB",
        }
    }
}

/// Malformed input. Reported back on the connection, never to the bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("not enough arguments")]
    NotEnoughArguments,

    #[error("unknown command {0}")]
    Unknown(String),

    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),
}

impl CommandError {
    /// The reply line sent back to the client.
    #[must_use]
    pub fn reply(&self) -> String {
        format!("ERROR {self}\n")
    }
}

/// Result of reading one line from a connection.
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    /// A line is in the buffer, newline stripped.
    Complete,
    /// The line was longer than the limit and has been discarded.
    TooLong,
    /// The peer closed the connection.
    Eof,
}

/// Read one `\n`-terminated line into `buf`, holding at most `max + 1`
/// bytes at a time.
///
/// An over-long line is consumed up to and including its newline so the
/// next call starts on a fresh line. A final line without a newline counts
/// as complete.
pub async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    let limit = max as u64 + 1;

    buf.clear();
    if (&mut *reader).take(limit).read_until(b'\n', buf).await? == 0 {
        return Ok(Line::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        return Ok(Line::Complete);
    }
    if buf.len() <= max {
        return Ok(Line::Complete);
    }

    loop {
        buf.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if read == 0 || buf.last() == Some(&b'\n') {
            buf.clear();
            return Ok(Line::TooLong);
        }
    }
}

/// Parse one line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &[u8]) -> Result<Option<Command>, CommandError> {
    let Some((verb, rest)) = split_token(line) else {
        return Ok(None);
    };

    match verb {
        b"PUB" => {
            let (channel, payload) = split_token(rest).ok_or(CommandError::NotEnoughArguments)?;
            let payload = payload.trim_ascii();
            if payload.is_empty() {
                return Err(CommandError::NotEnoughArguments);
            }
            Ok(Some(Command::Pub {
                channel: token_string(channel),
                payload: payload.to_vec(),
            }))
        }
        b"SUB" => {
            let (client, rest) = split_token(rest).ok_or(CommandError::NotEnoughArguments)?;
            let (channel, _) = split_token(rest).ok_or(CommandError::NotEnoughArguments)?;
            Ok(Some(Command::Sub {
                client: token_string(client),
                channel: token_string(channel),
            }))
        }
        other => Err(CommandError::Unknown(token_string(other))),
    }
}

/// Encode a delivery line.
#[must_use]
pub fn data_line(payload: &[u8]) -> Vec<u8> {
    let mut line = Vec::with_capacity(payload.len() + 6);
    line.extend_from_slice(b"DATA ");
    line.extend_from_slice(payload);
    line.push(b'\n');
    line
}

fn split_token(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let input = input.trim_ascii_start();
    if input.is_empty() {
        return None;
    }
    match input.iter().position(u8::is_ascii_whitespace) {
        Some(end) => Some((&input[..end], &input[end..])),
        None => Some((input, &input[input.len()..])),
    }
}

// Channel and client ids are map keys; invalid UTF-8 is kept distinct via
// replacement characters rather than rejected.
fn token_string(token: &[u8]) -> String {
    String::from_utf8_lossy(token).into_owned()
}
