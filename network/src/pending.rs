//! Table of in-flight requests awaiting a correlated response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use sehat_protocol::Message;
use tokio::sync::oneshot;

#[derive(Default)]
pub struct PendingRequests {
    waiters: Mutex<HashMap<String, oneshot::Sender<Message>>>,
}

/// Deregisters its waiter when dropped, whatever way the request ends.
pub struct WaiterGuard {
    pending: Arc<PendingRequests>,
    request_id: String,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.pending
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.request_id);
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(self: &Arc<Self>, request_id: &str) -> (WaiterGuard, oneshot::Receiver<Message>) {
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id.to_string(), tx);
        let guard = WaiterGuard {
            pending: Arc::clone(self),
            request_id: request_id.to_string(),
        };
        (guard, rx)
    }

    /// Hand `message` to its waiter. Messages that are not responses, or
    /// whose waiter is gone, are returned to the caller.
    pub fn deliver(&self, message: Message) -> Result<(), Message> {
        if !message.is_response() {
            return Err(message);
        }
        let waiter = self
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&message.response_id);
        match waiter {
            // A receiver dropped at this point has just timed out; the late
            // response is discarded.
            Some(tx) => {
                let _ = tx.send(message);
                Ok(())
            }
            None => Err(message),
        }
    }

    pub fn len(&self) -> usize {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
