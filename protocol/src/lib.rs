//! Wire protocol: message envelope, typed payloads, length-prefixed JSON framing.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{decode, encode, frame_length, LENGTH_PREFIX_SIZE, MAX_MESSAGE_SIZE};
pub use error::ProtocolError;
pub use message::{
    BlockPayload, BlockRequestPayload, HandshakePayload, Message, MessageBody, MessageType,
    PeerListPayload, TxGossipPayload,
};
