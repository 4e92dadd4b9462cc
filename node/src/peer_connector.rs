//! Outbound connection to configured validators: tie-break, handshake,
//! bounded retry.

use std::sync::Arc;
use std::time::Duration;

use sehat_network::{NetworkError, PeerHandle};
use sehat_protocol::{HandshakePayload, Message, MessageBody};
use sehat_types::ValidatorConfig;
use tracing::Instrument;

use crate::node_core::NodeCore;
use crate::tracing_spans::handshake_span;
use crate::NodeError;

/// Whether `self_id` dials `peer_id` right away. The node with the greater
/// id waits first, so two validators starting together usually end up with
/// one connection instead of two.
pub fn should_initiate(self_id: &str, peer_id: &str) -> bool {
    self_id < peer_id
}

/// Why a handshake identity is refused, if it is.
pub(crate) fn check_identity(core: &NodeCore, payload: &HandshakePayload) -> Result<(), String> {
    if payload.node_id.trim().is_empty() {
        return Err("empty node id".into());
    }
    if payload.node_id == core.node_id() {
        return Err("connection to self".into());
    }
    if let Some(credential) = core.engine.validators().credential(&payload.node_id) {
        if !credential.matches_secret(&payload.secret) {
            return Err(format!("bad secret for validator {}", payload.node_id));
        }
    }
    Ok(())
}

pub(crate) fn own_identity(core: &NodeCore) -> HandshakePayload {
    HandshakePayload {
        node_id: core.node_id().to_string(),
        port: core.listen_port(),
        secret: core.config.secret.clone(),
    }
}

/// Dial `address`, exchange identities and register the peer under its
/// negotiated id. Returns that id.
pub(crate) async fn handshake(core: &NodeCore, address: &str) -> Result<String, NodeError> {
    let handle = core.transport.connect(address).await?;
    match exchange_identity(core, &handle, address).await {
        Ok(peer_id) => {
            core.transport.register_peer(&handle, &peer_id, address);
            Ok(peer_id)
        }
        Err(e) => {
            handle.close();
            Err(e)
        }
    }
}

async fn exchange_identity(
    core: &NodeCore,
    handle: &Arc<PeerHandle>,
    address: &str,
) -> Result<String, NodeError> {
    let request = Message::new(
        core.node_id(),
        MessageBody::HandshakeRequest(own_identity(core)),
    );
    let response = core
        .transport
        .request_on(handle, request, core.config.handshake_timeout())
        .await?;
    let MessageBody::HandshakeResponse(payload) = response.body else {
        return Err(NetworkError::UnexpectedResponse {
            peer: address.to_string(),
            kind: response.body.kind().to_string(),
        }
        .into());
    };
    check_identity(core, &payload).map_err(|reason| NodeError::Handshake {
        peer: address.to_string(),
        reason,
    })?;
    Ok(payload.node_id)
}

/// Connect to one validator, applying the tie-break and retrying with a
/// fixed backoff. Returns whether the peer ended up connected.
pub(crate) async fn connect_with_retry(core: Arc<NodeCore>, peer: ValidatorConfig) -> bool {
    let span = handshake_span(&peer.id);
    async move {
        let bootstrap = &core.config.bootstrap;
        if core.engine.is_validator() && !should_initiate(core.node_id(), &peer.id) {
            tokio::time::sleep(Duration::from_millis(bootstrap.tie_break_wait_ms)).await;
            if core.transport.is_connected(&peer.id) {
                tracing::debug!("peer dialed first");
                return true;
            }
        }

        for attempt in 1..=bootstrap.attempts {
            if core.transport.is_connected(&peer.id) {
                return true;
            }
            match handshake(&core, &peer.address).await {
                Ok(id) if id == peer.id => return true,
                Ok(id) => {
                    tracing::warn!(address = %peer.address, answered_as = %id, "validator answered under another id");
                    return false;
                }
                Err(e) => {
                    tracing::warn!(attempt, max = bootstrap.attempts, error = %e, "handshake attempt failed");
                }
            }
            if attempt < bootstrap.attempts {
                tokio::time::sleep(Duration::from_millis(bootstrap.backoff_ms)).await;
            }
        }
        tracing::warn!(address = %peer.address, "giving up on validator");
        false
    }
    .instrument(span)
    .await
}
