//! TCP transport: listener, outbound dials, per-connection read loops,
//! send / request / broadcast.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sehat_protocol::{codec, Message};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};

use crate::frame::read_framed;
use crate::{ConnectionRegistry, NetworkError, PeerHandle, PendingRequests};

/// Timeout for the initial TCP connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A message that is not a correlated response, tagged with the connection
/// it arrived on.
#[derive(Debug)]
pub struct Inbound {
    pub peer: Arc<PeerHandle>,
    pub message: Message,
}

/// State shared by the transport, the accept loop, and every read loop.
#[derive(Clone)]
struct Shared {
    registry: Arc<ConnectionRegistry>,
    pending: Arc<PendingRequests>,
    inbound_tx: mpsc::Sender<Inbound>,
}

impl Shared {
    /// Spawn the read loop for a fresh connection and return its handle.
    fn adopt(&self, stream: TcpStream, remote_addr: SocketAddr) -> Arc<PeerHandle> {
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        let handle = Arc::new(PeerHandle::new(remote_addr, writer));
        let task = tokio::spawn(run_read_loop(self.clone(), Arc::clone(&handle), reader));
        handle.attach_reader(task);
        handle
    }

    /// Drop a connection after a transport failure.
    fn tear_down(&self, handle: &Arc<PeerHandle>) {
        if let Some(peer_id) = handle.peer_id() {
            if self.registry.remove_if_current(&peer_id, handle) {
                tracing::info!(peer = %peer_id, "peer removed from registry");
            }
        }
        handle.close();
    }

    async fn write(&self, handle: &Arc<PeerHandle>, frame: &[u8]) -> Result<(), NetworkError> {
        let result = handle.write_frame(frame).await;
        if let Err(e) = &result {
            if !matches!(e, NetworkError::Closed(_)) {
                tracing::warn!(peer = %handle.label(), error = %e, "write failed, dropping connection");
                self.tear_down(handle);
            }
        }
        result
    }
}

pub struct Transport {
    node_id: String,
    shared: Shared,
}

impl Transport {
    /// `inbound_tx` receives every message that is not a response to one of
    /// this transport's own requests.
    pub fn new(
        node_id: impl Into<String>,
        registry: Arc<ConnectionRegistry>,
        inbound_tx: mpsc::Sender<Inbound>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            shared: Shared {
                registry,
                pending: Arc::new(PendingRequests::new()),
                inbound_tx,
            },
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.shared.registry
    }

    /// Number of requests currently waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Bind the P2P listener and start accepting connections until
    /// `shutdown` fires. Returns the bound address.
    pub async fn open(
        &self,
        port: u16,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<SocketAddr, NetworkError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| NetworkError::BindFailed {
                port,
                reason: e.to_string(),
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NetworkError::Io(e.to_string()))?;
        tracing::info!(port = local_addr.port(), "P2P listener started");

        let shared = self.shared.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::info!("P2P listener shutting down");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, remote)) => {
                            tracing::debug!(%remote, "accepted inbound connection");
                            shared.adopt(stream, remote);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        });

        Ok(local_addr)
    }

    /// Dial `address` and start its read loop. The returned handle is not
    /// registered until a handshake names it.
    pub async fn connect(&self, address: &str) -> Result<Arc<PeerHandle>, NetworkError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
            .await
            .map_err(|_| NetworkError::ConnectionFailed(format!("connection timed out to {address}")))?
            .map_err(|e| NetworkError::ConnectionFailed(format!("TCP connect to {address} failed: {e}")))?;
        let remote = stream
            .peer_addr()
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
        Ok(self.shared.adopt(stream, remote))
    }

    /// Attach `peer_id` to `handle` and make it the peer's live connection.
    pub fn register_peer(&self, handle: &Arc<PeerHandle>, peer_id: &str, listen_addr: &str) {
        handle.set_identity(peer_id, listen_addr);
        self.shared.registry.register(peer_id, Arc::clone(handle));
        tracing::info!(peer = %peer_id, addr = %listen_addr, "peer registered");
    }

    pub fn remove_peer(&self, peer_id: &str) -> bool {
        self.shared.registry.remove(peer_id).is_some()
    }

    pub fn is_connected(&self, peer_id: &str) -> bool {
        self.shared.registry.contains(peer_id)
    }

    pub fn peer_ids(&self) -> Vec<String> {
        self.shared.registry.peer_ids()
    }

    pub fn peer_addresses(&self) -> BTreeMap<String, String> {
        self.shared.registry.addresses()
    }

    /// One-way send to a registered peer.
    pub async fn send(&self, peer_id: &str, message: &Message) -> Result<(), NetworkError> {
        let handle = self
            .shared
            .registry
            .get(peer_id)
            .ok_or_else(|| NetworkError::PeerNotFound(peer_id.to_string()))?;
        self.send_on(&handle, message).await
    }

    /// One-way send on a specific connection, registered or not.
    pub async fn send_on(
        &self,
        handle: &Arc<PeerHandle>,
        message: &Message,
    ) -> Result<(), NetworkError> {
        let frame = codec::encode(message)?;
        self.shared.write(handle, &frame).await
    }

    /// Send `message` to a registered peer and wait for the correlated
    /// response.
    pub async fn request(
        &self,
        peer_id: &str,
        message: Message,
        timeout: Duration,
    ) -> Result<Message, NetworkError> {
        let handle = self
            .shared
            .registry
            .get(peer_id)
            .ok_or_else(|| NetworkError::PeerNotFound(peer_id.to_string()))?;
        self.request_on(&handle, message, timeout).await
    }

    /// Request over a specific connection; used by the handshake before the
    /// peer has an id.
    pub async fn request_on(
        &self,
        handle: &Arc<PeerHandle>,
        mut message: Message,
        timeout: Duration,
    ) -> Result<Message, NetworkError> {
        message.request_id = uuid::Uuid::new_v4().to_string();
        message.response_id.clear();

        let (_guard, rx) = self.shared.pending.register(&message.request_id);
        self.send_on(handle, &message).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(NetworkError::Closed(handle.label())),
            Err(_) => Err(NetworkError::RequestTimeout {
                peer: handle.label(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Fire-and-forget send to every registered peer. Returns the number of
    /// peers targeted; individual failures are only logged.
    pub fn broadcast(&self, message: &Message) -> usize {
        let frame = match codec::encode(message) {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                tracing::warn!(kind = %message.kind(), error = %e, "cannot encode broadcast");
                return 0;
            }
        };
        let peers = self.shared.registry.handles();
        tracing::debug!(kind = %message.kind(), peer_count = peers.len(), "broadcast");

        for (peer_id, handle) in &peers {
            let shared = self.shared.clone();
            let frame = Arc::clone(&frame);
            let handle = Arc::clone(handle);
            let peer_id = peer_id.clone();
            tokio::spawn(async move {
                if let Err(e) = shared.write(&handle, &frame).await {
                    tracing::warn!(peer = %peer_id, error = %e, "broadcast send failed");
                }
            });
        }
        peers.len()
    }
}

async fn run_read_loop(shared: Shared, handle: Arc<PeerHandle>, mut reader: OwnedReadHalf) {
    match read_loop(&shared, &handle, &mut reader).await {
        Ok(()) => tracing::info!(peer = %handle.label(), "peer disconnected"),
        Err(e) => {
            tracing::warn!(peer = %handle.label(), error = %e, "peer disconnected with error")
        }
    }
    shared.tear_down(&handle);
}

async fn read_loop(
    shared: &Shared,
    handle: &Arc<PeerHandle>,
    reader: &mut OwnedReadHalf,
) -> Result<(), NetworkError> {
    loop {
        let Some(body) = read_framed(reader).await? else {
            return Ok(());
        };
        let message = match codec::decode(&body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(peer = %handle.label(), error = %e, "dropping undecodable message");
                continue;
            }
        };
        let message = match shared.pending.deliver(message) {
            Ok(()) => continue,
            Err(message) => message,
        };
        let inbound = Inbound {
            peer: Arc::clone(handle),
            message,
        };
        if shared.inbound_tx.send(inbound).await.is_err() {
            // Router is gone; the node is shutting down.
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sehat_protocol::{BlockRequestPayload, MessageBody, PeerListPayload};
    use tokio::io::AsyncWriteExt;

    const SHORT: Duration = Duration::from_millis(300);

    struct Endpoint {
        transport: Transport,
        inbound: mpsc::Receiver<Inbound>,
        _shutdown: broadcast::Sender<()>,
        addr: String,
    }

    async fn endpoint(id: &str) -> Endpoint {
        let (tx, inbound) = mpsc::channel(16);
        let transport = Transport::new(id, Arc::new(ConnectionRegistry::new()), tx);
        let (shutdown, rx) = broadcast::channel(1);
        let addr = transport.open(0, rx).await.unwrap();
        Endpoint {
            transport,
            inbound,
            _shutdown: shutdown,
            addr: format!("127.0.0.1:{}", addr.port()),
        }
    }

    #[tokio::test]
    async fn request_gets_correlated_response() {
        let mut server = endpoint("a").await;
        let mut client = endpoint("b").await;

        let handle = client.transport.connect(&server.addr).await.unwrap();
        client.transport.register_peer(&handle, "a", &server.addr);

        let responder = tokio::spawn(async move {
            let inbound = server.inbound.recv().await.unwrap();
            let reply = inbound.message.reply(
                "a",
                MessageBody::PeersSend(PeerListPayload::default()),
            );
            server.transport.send_on(&inbound.peer, &reply).await.unwrap();
            server
        });

        let response = client
            .transport
            .request("a", Message::new("b", MessageBody::PeersRequest), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(matches!(response.body, MessageBody::PeersSend(_)));
        assert_eq!(response.sender_id, "a");
        assert_eq!(client.transport.pending_requests(), 0);

        // The response never reaches the client's router.
        let _server = responder.await.unwrap();
        assert!(client.inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn unanswered_request_times_out_and_deregisters() {
        let server = endpoint("a").await;
        let client = endpoint("b").await;
        let handle = client.transport.connect(&server.addr).await.unwrap();

        let msg = Message::new("b", MessageBody::BlockRequest(BlockRequestPayload { height: 9 }));
        let result = client.transport.request_on(&handle, msg, SHORT).await;

        assert!(matches!(result, Err(NetworkError::RequestTimeout { .. })));
        assert_eq!(client.transport.pending_requests(), 0);
    }

    #[tokio::test]
    async fn send_to_unknown_peer_fails() {
        let node = endpoint("a").await;
        let msg = Message::new("a", MessageBody::PeersRequest);
        assert!(matches!(
            node.transport.send("ghost", &msg).await,
            Err(NetworkError::PeerNotFound(_))
        ));
        assert!(matches!(
            node.transport.request("ghost", msg, SHORT).await,
            Err(NetworkError::PeerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn undecodable_frame_keeps_connection_alive() {
        let mut server = endpoint("a").await;
        let mut raw = TcpStream::connect(&server.addr).await.unwrap();

        let garbage = b"{definitely not an envelope";
        raw.write_all(&(garbage.len() as u32).to_be_bytes()).await.unwrap();
        raw.write_all(garbage).await.unwrap();

        let good = Message::new("c", MessageBody::PeersRequest);
        raw.write_all(&codec::encode(&good).unwrap()).await.unwrap();

        let inbound = tokio::time::timeout(Duration::from_secs(2), server.inbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inbound.message, good);
        assert!(!inbound.peer.is_closed());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_registered_peer() {
        let hub = endpoint("hub").await;
        let mut spoke1 = endpoint("s1").await;
        let mut spoke2 = endpoint("s2").await;

        for spoke in [&spoke1, &spoke2] {
            let handle = hub.transport.connect(&spoke.addr).await.unwrap();
            hub.transport.register_peer(&handle, spoke.transport.node_id(), &spoke.addr);
        }

        let msg = Message::new("hub", MessageBody::PeersRequest);
        assert_eq!(hub.transport.broadcast(&msg), 2);

        for spoke in [&mut spoke1, &mut spoke2] {
            let inbound = tokio::time::timeout(Duration::from_secs(2), spoke.inbound.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(inbound.message.request_id, msg.request_id);
        }
    }

    #[tokio::test]
    async fn remote_close_removes_registered_peer() {
        let mut server = endpoint("a").await;
        let client = endpoint("b").await;

        let handle = client.transport.connect(&server.addr).await.unwrap();
        client.transport.register_peer(&handle, "a", &server.addr);
        client
            .transport
            .send("a", &Message::new("b", MessageBody::PeersRequest))
            .await
            .unwrap();

        let inbound = server.inbound.recv().await.unwrap();
        inbound.peer.close();

        for _ in 0..50 {
            if !client.transport.is_connected("a") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!client.transport.is_connected("a"));
        assert!(handle.is_closed());
    }
}
