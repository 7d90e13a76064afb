//! Line codec for the queue protocol.
//!
//! Every frame is a single `\n`-terminated line of the form `COMMAND [DATA]`,
//! where `COMMAND` is one ASCII word and `DATA` is either base64 or plain text
//! depending on the command.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// How the payload of an outbound frame is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    Base64,
    /// Payload is already text (sizes, queue names) and is written as-is.
    Identity,
}

/// Split a line into its command word and the raw argument after the first
/// space. The argument is `None` when the line has no space at all.
pub fn decode_command(line: &[u8]) -> (String, Option<&[u8]>) {
    let (head, rest) = match line.iter().position(|&b| b == b' ') {
        Some(idx) => (&line[..idx], Some(&line[idx + 1..])),
        None => (line, None),
    };
    let command = String::from_utf8_lossy(head.trim_ascii()).into_owned();
    (command, rest)
}

/// Strict base64 decode, ignoring surrounding whitespace.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(data.trim_ascii())
}

/// Build an outbound frame, newline included.
pub fn encode(command: &str, payload: Option<&[u8]>, encoding: PayloadEncoding) -> Vec<u8> {
    let Some(payload) = payload else {
        let mut frame = Vec::with_capacity(command.len() + 1);
        frame.extend_from_slice(command.as_bytes());
        frame.push(b'\n');
        return frame;
    };

    let mut frame = Vec::with_capacity(command.len() + payload.len() * 4 / 3 + 6);
    frame.extend_from_slice(command.as_bytes());
    frame.push(b' ');
    match encoding {
        PayloadEncoding::Base64 => frame.extend_from_slice(BASE64.encode(payload).as_bytes()),
        PayloadEncoding::Identity => frame.extend_from_slice(payload),
    }
    frame.push(b'\n');
    frame
}

pub fn encode_base64(command: &str, payload: &[u8]) -> Vec<u8> {
    encode(command, Some(payload), PayloadEncoding::Base64)
}

pub fn encode_plain(command: &str, payload: Option<&[u8]>) -> Vec<u8> {
    encode(command, payload, PayloadEncoding::Identity)
}
