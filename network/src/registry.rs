//! Connection registry: maps negotiated peer ids to their live handles.
//!
//! Shared between the transport (sends, broadcasts, read-loop cleanup) and
//! the router (handshake registration). The lock is held only for table
//! mutation; handles are closed after it is released.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::PeerHandle;

#[derive(Default)]
pub struct ConnectionRegistry {
    peers: RwLock<HashMap<String, Arc<PeerHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `peer_id`. A different live handle already
    /// registered under the same id is superseded: it is closed and
    /// returned.
    pub fn register(&self, peer_id: &str, handle: Arc<PeerHandle>) -> Option<Arc<PeerHandle>> {
        let previous = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer_id.to_string(), Arc::clone(&handle));

        match previous {
            Some(old) if !Arc::ptr_eq(&old, &handle) => {
                tracing::info!(
                    peer = %peer_id,
                    old = %old.remote_addr(),
                    new = %handle.remote_addr(),
                    "replacing existing connection"
                );
                old.close();
                Some(old)
            }
            _ => None,
        }
    }

    /// Remove and close the handle registered under `peer_id`.
    pub fn remove(&self, peer_id: &str) -> Option<Arc<PeerHandle>> {
        let removed = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer_id);
        if let Some(handle) = &removed {
            handle.close();
        }
        removed
    }

    /// Remove `peer_id` only if it still maps to `handle`. A connection that
    /// was already superseded must not evict its replacement.
    pub fn remove_if_current(&self, peer_id: &str, handle: &Arc<PeerHandle>) -> bool {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        match peers.get(peer_id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                peers.remove(peer_id);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, peer_id: &str) -> Option<Arc<PeerHandle>> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer_id)
            .cloned()
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered ids, sorted.
    pub fn peer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Snapshot of every registered handle.
    pub fn handles(&self) -> Vec<(String, Arc<PeerHandle>)> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, h)| (id.clone(), Arc::clone(h)))
            .collect()
    }

    /// Peer id to dialable address.
    pub fn addresses(&self) -> BTreeMap<String, String> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, h)| {
                let addr = h
                    .listen_addr()
                    .unwrap_or_else(|| h.remote_addr().to_string());
                (id.clone(), addr)
            })
            .collect()
    }
}
