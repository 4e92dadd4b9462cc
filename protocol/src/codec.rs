//! Message codec: framing and serialization for the wire protocol.
//!
//! Each frame is a 4-byte big-endian body length followed by the JSON
//! envelope.

use crate::message::{Envelope, Message};
use crate::ProtocolError;

/// Maximum message size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encode a message for transmission (length-prefixed JSON).
pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let envelope = message.to_envelope()?;
    let body =
        serde_json::to_vec(&envelope).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: body.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode a message from a frame body (without the length prefix).
pub fn decode(body: &[u8]) -> Result<Message, ProtocolError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    Message::from_envelope(envelope)
}

/// Validate a length prefix and return the body length it announces.
pub fn frame_length(prefix: [u8; LENGTH_PREFIX_SIZE]) -> Result<usize, ProtocolError> {
    let size = u32::from_be_bytes(prefix) as usize;
    if size > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(size)
}
