//! Catch-up sync: bring a lagging or rejoining node to the network height.
//!
//! 1. Probe every connected peer with a block request for our own latest
//!    height. Any peer at or above it answers, and the response envelope
//!    carries its `latest_height`.
//! 2. Fetch the missing heights one at a time, asking peers in turn, and
//!    commit each block through the consensus accept path before asking for
//!    the next.
//! 3. A height nobody serves ends the round; the next round starts after a
//!    delay. Sync ends once the local height reaches the target, or after
//!    too many rounds without progress.

use std::time::Duration;

use sehat_protocol::{BlockRequestPayload, Message, MessageBody};
use sehat_types::Block;
use tracing::Instrument;

use crate::node_core::NodeCore;
use crate::tracing_spans::sync_span;
use crate::NodeError;

/// Run sync to completion. Returns the final local height.
pub(crate) async fn catch_up(core: &NodeCore) -> Result<u64, NodeError> {
    let span = sync_span(core.ledger.latest_height());
    run(core).instrument(span).await
}

async fn run(core: &NodeCore) -> Result<u64, NodeError> {
    let cfg = &core.config.sync;
    let mut idle_rounds = 0;

    loop {
        let local = core.ledger.latest_height();
        let mut target = probe_network_height(core, local).await;
        if target <= local {
            tracing::info!(height = local, "in sync with the network");
            return Ok(local);
        }
        tracing::info!(local, target, "catching up");

        let mut progressed = false;
        while core.ledger.latest_height() < target {
            let next = core.ledger.latest_height() + 1;
            let Some((block, peer_height)) = fetch_block(core, next).await else {
                tracing::debug!(height = next, "no peer served the block");
                break;
            };
            target = target.max(peer_height);
            match core.engine.accept_synced_block(core, block) {
                Ok(()) => progressed = true,
                // Live consensus committed it first.
                Err(e) if e.is_stale() => progressed = true,
                Err(e) => {
                    tracing::warn!(height = next, error = %e, "synced block rejected");
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(cfg.fetch_pause_ms)).await;
        }

        if core.ledger.latest_height() >= target {
            tracing::info!(height = core.ledger.latest_height(), "sync finished");
            return Ok(core.ledger.latest_height());
        }
        if progressed {
            idle_rounds = 0;
        } else {
            idle_rounds += 1;
            if idle_rounds >= cfg.max_idle_rounds {
                let height = core.ledger.latest_height();
                tracing::warn!(height, target, "sync made no progress, giving up");
                return Err(NodeError::SyncStalled { height, target });
            }
        }
        tokio::time::sleep(Duration::from_millis(cfg.retry_delay_ms)).await;
    }
}

/// Highest `latest_height` reported by any connected peer, or `local` if
/// none report more.
async fn probe_network_height(core: &NodeCore, local: u64) -> u64 {
    let mut target = local;
    for peer_id in core.transport.peer_ids() {
        match request_block(core, &peer_id, local).await {
            Some((_, latest)) => {
                tracing::debug!(peer = %peer_id, latest, "peer height");
                target = target.max(latest);
            }
            None => tracing::debug!(peer = %peer_id, "peer did not answer the probe"),
        }
    }
    target
}

/// Ask each connected peer in turn for `height` until one serves it.
async fn fetch_block(core: &NodeCore, height: u64) -> Option<(Block, u64)> {
    for peer_id in core.transport.peer_ids() {
        if let Some(found) = request_block(core, &peer_id, height).await {
            tracing::debug!(peer = %peer_id, height, "fetched block");
            return Some(found);
        }
    }
    None
}

async fn request_block(core: &NodeCore, peer_id: &str, height: u64) -> Option<(Block, u64)> {
    let timeout = Duration::from_millis(core.config.sync.request_timeout_ms);
    let request = Message::new(
        core.node_id(),
        MessageBody::BlockRequest(BlockRequestPayload { height }),
    );
    match core.transport.request(peer_id, request, timeout).await {
        Ok(Message {
            body: MessageBody::BlockSend(payload),
            ..
        }) if payload.block.header.height == height => Some((payload.block, payload.latest_height)),
        Ok(other) => {
            tracing::debug!(peer = %peer_id, kind = %other.kind(), "unexpected reply to block request");
            None
        }
        Err(e) => {
            tracing::debug!(peer = %peer_id, height, error = %e, "block request failed");
            None
        }
    }
}
