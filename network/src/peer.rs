//! A single peer connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::task::JoinHandle;

use crate::frame::write_framed;
use crate::NetworkError;

#[derive(Clone, Debug)]
struct PeerIdentity {
    id: String,
    listen_addr: String,
}

/// Owns one TCP connection: the write half, and the read task that owns
/// the read half.
///
/// A handle starts unidentified; the handshake attaches the peer id it is
/// registered under. Closing is idempotent and happens at most once.
pub struct PeerHandle {
    remote_addr: SocketAddr,
    identity: Mutex<Option<PeerIdentity>>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PeerHandle {
    pub(crate) fn new(remote_addr: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            remote_addr,
            identity: Mutex::new(None),
            writer: tokio::sync::Mutex::new(Some(writer)),
            reader_task: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Id negotiated by the handshake, if any.
    pub fn peer_id(&self) -> Option<String> {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|i| i.id.clone())
    }

    /// Address other nodes can dial to reach this peer.
    pub fn listen_addr(&self) -> Option<String> {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|i| i.listen_addr.clone())
    }

    /// Peer id when known, otherwise the remote socket address.
    pub fn label(&self) -> String {
        self.peer_id()
            .unwrap_or_else(|| self.remote_addr.to_string())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn set_identity(&self, id: &str, listen_addr: &str) {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = Some(PeerIdentity {
            id: id.to_string(),
            listen_addr: listen_addr.to_string(),
        });
    }

    pub(crate) fn attach_reader(&self, task: JoinHandle<()>) {
        if self.is_closed() {
            task.abort();
            return;
        }
        *self.reader_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Write one encoded frame. Frames from concurrent callers never
    /// interleave.
    pub async fn write_frame(&self, frame: &[u8]) -> Result<(), NetworkError> {
        if self.is_closed() {
            return Err(NetworkError::Closed(self.label()));
        }
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| NetworkError::Closed(self.label()))?;
        write_framed(writer, frame)
            .await
            .map_err(|e| NetworkError::Io(e.to_string()))
    }

    /// Stop the read task and drop the write half, closing the socket.
    pub fn close(self: &Arc<Self>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self
            .reader_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        match self.writer.try_lock() {
            Ok(mut writer) => {
                writer.take();
            }
            Err(_) => {
                // A write is in flight; release the half once it finishes.
                let this = Arc::clone(self);
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    runtime.spawn(async move {
                        this.writer.lock().await.take();
                    });
                }
            }
        }
        tracing::debug!(peer = %self.label(), "connection closed");
    }
}

impl std::fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHandle")
            .field("remote_addr", &self.remote_addr)
            .field("peer_id", &self.peer_id())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    /// A handle over a real loopback socket, plus the far end of it.
    pub async fn loopback_handle() -> (Arc<PeerHandle>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (_read, write) = client.unwrap().into_split();
        let handle = Arc::new(PeerHandle::new(addr, write));
        (handle, accepted.unwrap().0)
    }
}
