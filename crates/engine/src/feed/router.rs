use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use common::message::METHOD_AUTH;
use common::Payload;

/// Response channels of the handshakes waiting on the socket, keyed by the
/// `req_id` of their request. Each handshake only ever sees its own replies.
#[derive(Clone, Default)]
pub struct PendingAuth {
    waiting: Arc<Mutex<HashMap<String, mpsc::Sender<Vec<u8>>>>>,
}

impl PendingAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, req_id: impl Into<String>, responses: mpsc::Sender<Vec<u8>>) {
        let mut waiting = self.waiting.lock().await;
        // Handshakes that already finished have dropped their receivers
        waiting.retain(|_, tx| !tx.is_closed());
        waiting.insert(req_id.into(), responses);
    }

    pub async fn remove(&self, req_id: &str) {
        self.waiting.lock().await.remove(req_id);
    }

    pub async fn is_waiting(&self, req_id: &str) -> bool {
        self.waiting
            .lock()
            .await
            .get(req_id)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Hand a frame to the handshake waiting on `req_id`.
    /// Gives the frame back if that handshake is not waiting any more.
    pub async fn offer(&self, req_id: &str, frame: Vec<u8>) -> Option<Vec<u8>> {
        let mut waiting = self.waiting.lock().await;
        let sent = match waiting.get(req_id) {
            Some(tx) => tx.send(frame).await,
            None => return Some(frame),
        };
        match sent {
            Ok(()) => None,
            Err(mpsc::error::SendError(frame)) => {
                waiting.remove(req_id);
                Some(frame)
            }
        }
    }
}

/// Splits inbound frames between waiting handshakes and the dispatch queue.
///
/// Auth replies (no `method`, or `method == "auth"`) whose `req_id` belongs
/// to a waiting handshake go to that handshake. Everything else, in arrival
/// order, goes to the dispatcher.
#[derive(Clone)]
pub struct FrameRouter {
    pending: PendingAuth,
    dispatch_tx: mpsc::Sender<Vec<u8>>,
}

impl FrameRouter {
    pub fn new(pending: PendingAuth, dispatch_tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            pending,
            dispatch_tx,
        }
    }

    pub async fn route(&self, frame: Vec<u8>) {
        let frame = match auth_reply_id(&frame) {
            Some(req_id) => match self.pending.offer(&req_id, frame).await {
                None => return,
                Some(frame) => {
                    debug!(req_id = %req_id, "No handshake waiting for auth reply");
                    frame
                }
            },
            None => frame,
        };

        if self.dispatch_tx.send(frame).await.is_err() {
            warn!("Dispatch queue closed, dropping feed message");
        }
    }
}

/// `req_id` of a frame shaped like an auth reply.
fn auth_reply_id(frame: &[u8]) -> Option<String> {
    let payload: Payload = serde_json::from_slice(frame).ok()?;
    match payload.get("method") {
        None => {}
        Some(Value::String(m)) if m == METHOD_AUTH => {}
        Some(_) => return None,
    }
    payload.get("req_id")?.as_str().map(str::to_owned)
}
