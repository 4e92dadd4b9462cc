//! Message envelope and typed payloads.
//!
//! On the wire every record is `{sender_id, request_id, response_id, type,
//! payload}`. The payload shape is selected by `type`; inside the node the
//! pair is held as the closed [`MessageBody`] enum.

use crate::ProtocolError;
use sehat_types::{Block, Transaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    HandshakeRequest,
    HandshakeResponse,
    BlockRequest,
    BlockSend,
    PeersRequest,
    PeersSend,
    #[serde(rename = "CONSENSUS_TX_GOSSIP")]
    TxGossip,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandshakeRequest => "HANDSHAKE_REQUEST",
            Self::HandshakeResponse => "HANDSHAKE_RESPONSE",
            Self::BlockRequest => "BLOCK_REQUEST",
            Self::BlockSend => "BLOCK_SEND",
            Self::PeersRequest => "PEERS_REQUEST",
            Self::PeersSend => "PEERS_SEND",
            Self::TxGossip => "CONSENSUS_TX_GOSSIP",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity exchanged in both directions of a handshake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakePayload {
    pub node_id: String,
    /// The sender's P2P listening port.
    pub port: u16,
    pub secret: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequestPayload {
    pub height: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPayload {
    /// The sender's chain height at the time of sending.
    pub latest_height: u64,
    pub block: Block,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerListPayload {
    /// Peer id to `host:port`.
    pub peers: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxGossipPayload {
    pub transaction: Transaction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    HandshakeRequest(HandshakePayload),
    HandshakeResponse(HandshakePayload),
    BlockRequest(BlockRequestPayload),
    BlockSend(BlockPayload),
    PeersRequest,
    PeersSend(PeerListPayload),
    TxGossip(TxGossipPayload),
}

impl MessageBody {
    pub fn kind(&self) -> MessageType {
        match self {
            Self::HandshakeRequest(_) => MessageType::HandshakeRequest,
            Self::HandshakeResponse(_) => MessageType::HandshakeResponse,
            Self::BlockRequest(_) => MessageType::BlockRequest,
            Self::BlockSend(_) => MessageType::BlockSend,
            Self::PeersRequest => MessageType::PeersRequest,
            Self::PeersSend(_) => MessageType::PeersSend,
            Self::TxGossip(_) => MessageType::TxGossip,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub sender_id: String,
    pub request_id: String,
    /// Empty unless this message answers a request.
    pub response_id: String,
    pub body: MessageBody,
}

impl Message {
    /// A new outbound message with a fresh request id.
    pub fn new(sender_id: impl Into<String>, body: MessageBody) -> Self {
        Self {
            sender_id: sender_id.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
            response_id: String::new(),
            body,
        }
    }

    /// A response correlated to `self`.
    pub fn reply(&self, sender_id: impl Into<String>, body: MessageBody) -> Self {
        Self {
            sender_id: sender_id.into(),
            request_id: self.request_id.clone(),
            response_id: self.request_id.clone(),
            body,
        }
    }

    /// Whether this message answers the request carrying the same id.
    pub fn is_response(&self) -> bool {
        !self.response_id.is_empty() && self.response_id == self.request_id
    }

    pub fn kind(&self) -> MessageType {
        self.body.kind()
    }

    pub(crate) fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let payload = match &self.body {
            MessageBody::HandshakeRequest(p) | MessageBody::HandshakeResponse(p) => to_value(p)?,
            MessageBody::BlockRequest(p) => to_value(p)?,
            MessageBody::BlockSend(p) => to_value(p)?,
            MessageBody::PeersRequest => serde_json::Value::Null,
            MessageBody::PeersSend(p) => to_value(p)?,
            MessageBody::TxGossip(p) => to_value(p)?,
        };
        Ok(Envelope {
            sender_id: self.sender_id.clone(),
            request_id: self.request_id.clone(),
            response_id: self.response_id.clone(),
            kind: self.kind(),
            payload,
        })
    }

    pub(crate) fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let payload = envelope.payload;
        let body = match envelope.kind {
            MessageType::HandshakeRequest => MessageBody::HandshakeRequest(from_value(payload)?),
            MessageType::HandshakeResponse => {
                MessageBody::HandshakeResponse(from_value(payload)?)
            }
            MessageType::BlockRequest => MessageBody::BlockRequest(from_value(payload)?),
            MessageType::BlockSend => MessageBody::BlockSend(from_value(payload)?),
            MessageType::PeersRequest => MessageBody::PeersRequest,
            MessageType::PeersSend => MessageBody::PeersSend(from_value(payload)?),
            MessageType::TxGossip => MessageBody::TxGossip(from_value(payload)?),
        };
        Ok(Self {
            sender_id: envelope.sender_id,
            request_id: envelope.request_id,
            response_id: envelope.response_id,
            body,
        })
    }
}

/// The record as it appears on the wire.
#[derive(Serialize, Deserialize)]
pub(crate) struct Envelope {
    sender_id: String,
    request_id: String,
    #[serde(default)]
    response_id: String,
    #[serde(rename = "type")]
    kind: MessageType,
    #[serde(default)]
    payload: serde_json::Value,
}

fn to_value<T: Serialize>(payload: &T) -> Result<serde_json::Value, ProtocolError> {
    serde_json::to_value(payload).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

fn from_value<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|e| ProtocolError::Malformed(e.to_string()))
}
