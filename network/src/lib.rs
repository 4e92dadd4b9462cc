//! Peer transport for the Sehat claims chain.
//!
//! Owns the listening socket and every peer connection. Each connection has
//! one read task and a write half guarded by its own mutex. Inbound traffic
//! is demultiplexed: responses go to the waiting [`Transport::request`] call,
//! everything else is forwarded to the node's router as an [`Inbound`].

pub mod error;
pub mod frame;
pub mod peer;
pub mod pending;
pub mod registry;
pub mod transport;

pub use error::NetworkError;
pub use peer::PeerHandle;
pub use pending::PendingRequests;
pub use registry::ConnectionRegistry;
pub use transport::{Inbound, Transport, CONNECT_TIMEOUT};
