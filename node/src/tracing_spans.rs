//! Named [`tracing::Span`] constructors for common node operations.

use tracing::{info_span, Span};

/// Handling of one inbound message that reached the router.
pub fn network_recv_span(peer: &str, msg_type: &str) -> Span {
    info_span!("network_recv", peer = %peer, msg_type = %msg_type)
}

/// One block going through the commit critical section.
pub fn block_commit_span(height: u64, proposer: &str) -> Span {
    info_span!("block_commit", height, proposer = %proposer)
}

/// One catch-up sync run.
pub fn sync_span(local_height: u64) -> Span {
    info_span!("sync", from = local_height)
}

/// Outbound connection and handshake to a configured validator.
pub fn handshake_span(peer: &str) -> Span {
    info_span!("handshake", peer = %peer)
}
