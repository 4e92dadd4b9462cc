//! Sehat node: wires the peer transport, round-robin consensus, ledger,
//! mempool and claim state machine into one process.
//!
//! The node:
//! - listens for peers and connects to the configured validators
//! - routes inbound messages (handshakes, peer lists, block requests,
//!   gossip, blocks)
//! - commits blocks through one critical section (ledger append, execution,
//!   mempool pruning)
//! - catches up from peers after joining

mod bootstrap;
pub mod config;
pub mod error;
pub mod intake;
pub mod logging;
pub mod node;
mod node_core;
pub mod peer_connector;
mod router;
pub mod shutdown;
pub mod tracing_spans;

pub use config::{BootstrapConfig, NodeConfig, SyncConfig};
pub use error::NodeError;
pub use intake::{ClaimSubmission, RecordSubmission, TransactionFactory, VisitOutcome};
pub use logging::{init_logging, LogFormat};
pub use node::SehatNode;
pub use peer_connector::should_initiate;
pub use shutdown::ShutdownController;
