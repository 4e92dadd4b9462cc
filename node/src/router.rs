//! Dispatch of inbound messages that are not responses to our own requests.

use std::sync::Arc;

use sehat_network::{Inbound, PeerHandle};
use sehat_protocol::{
    BlockPayload, BlockRequestPayload, HandshakePayload, Message, MessageBody, PeerListPayload,
};
use sehat_types::{Block, Transaction};
use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use crate::node_core::NodeCore;
use crate::peer_connector::{check_identity, own_identity};
use crate::tracing_spans::network_recv_span;

/// Consume inbound messages in arrival order until shutdown or until the
/// transport drops its sender.
pub(crate) async fn run_router(
    core: Arc<NodeCore>,
    mut inbound: mpsc::Receiver<Inbound>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("router shutting down");
                break;
            }
            next = inbound.recv() => match next {
                Some(inbound) => dispatch(&core, inbound).await,
                None => break,
            }
        }
    }
}

pub(crate) async fn dispatch(core: &NodeCore, inbound: Inbound) {
    let span = network_recv_span(&inbound.peer.label(), inbound.message.kind().as_str());
    handle(core, inbound.peer, inbound.message).instrument(span).await
}

async fn handle(core: &NodeCore, peer: Arc<PeerHandle>, message: Message) {
    // A response whose waiter already timed out.
    if message.is_response() {
        tracing::debug!(kind = %message.kind(), "dropping late response");
        return;
    }

    match &message.body {
        MessageBody::HandshakeRequest(payload) => {
            on_handshake(core, &peer, &message, payload).await
        }
        MessageBody::PeersRequest => {
            let reply = message.reply(
                core.node_id(),
                MessageBody::PeersSend(PeerListPayload {
                    peers: core.transport.peer_addresses(),
                }),
            );
            send_reply(core, &peer, &reply).await;
        }
        MessageBody::BlockRequest(BlockRequestPayload { height }) => {
            match core.ledger.get_block(*height) {
                Ok(block) => {
                    let reply = message.reply(
                        core.node_id(),
                        MessageBody::BlockSend(BlockPayload {
                            latest_height: core.ledger.latest_height(),
                            block,
                        }),
                    );
                    send_reply(core, &peer, &reply).await;
                }
                Err(e) => tracing::debug!(error = %e, "cannot serve block request"),
            }
        }
        MessageBody::TxGossip(payload) => on_gossip(core, payload.transaction.clone()),
        MessageBody::BlockSend(payload) => on_block(core, payload.block.clone()),
        MessageBody::HandshakeResponse(_) | MessageBody::PeersSend(_) => {
            tracing::debug!(kind = %message.kind(), "ignoring unsolicited message");
        }
    }
}

async fn on_handshake(
    core: &NodeCore,
    peer: &Arc<PeerHandle>,
    message: &Message,
    payload: &HandshakePayload,
) {
    if let Err(reason) = check_identity(core, payload) {
        tracing::warn!(claimed = %payload.node_id, %reason, "refusing handshake");
        peer.close();
        return;
    }
    let listen_addr = format!("{}:{}", peer.remote_addr().ip(), payload.port);
    core.transport.register_peer(peer, &payload.node_id, &listen_addr);

    let reply = message.reply(
        core.node_id(),
        MessageBody::HandshakeResponse(own_identity(core)),
    );
    send_reply(core, peer, &reply).await;
}

fn on_gossip(core: &NodeCore, tx: Transaction) {
    if let Err(e) = tx.check_well_formed() {
        tracing::warn!(tx = %tx.id, error = %e, "dropping malformed gossip");
        return;
    }
    core.accept_transaction(tx);
}

fn on_block(core: &NodeCore, block: Block) {
    // Rejections are logged by the engine; the sender gets no answer.
    if core.engine.handle_incoming_block(core, block).is_ok() {
        core.maybe_start_round();
    }
}

async fn send_reply(core: &NodeCore, peer: &Arc<PeerHandle>, reply: &Message) {
    if let Err(e) = core.transport.send_on(peer, reply).await {
        tracing::warn!(kind = %reply.kind(), error = %e, "reply failed");
    }
}
