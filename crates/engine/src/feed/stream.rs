use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use common::{Error, Result};

use super::auth::WsAuthenticator;
use super::router::{FrameRouter, PendingAuth};
use crate::dispatcher::Dispatcher;

/// Live feed WebSocket connection.
///
/// Reads frames and routes them to the dispatcher or to the waiting auth
/// handshake, and writes auth requests queued by the paired
/// `WsAuthenticator`. Reconnects automatically with exponential backoff.
pub struct FeedStream {
    url: String,
    outbound_rx: mpsc::Receiver<String>,
    pending: PendingAuth,
    /// Shared with the authenticator; true only while the socket is up.
    connected: Arc<AtomicBool>,
}

impl FeedStream {
    const OUTBOUND_BUFFER: usize = 32;
    const DISPATCH_BUFFER: usize = 1024;

    /// Create the stream and the authenticator that sends over it.
    /// Build the `Dispatcher` around the authenticator, then call `run`.
    pub fn new(url: impl Into<String>) -> (Self, Arc<WsAuthenticator>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(Self::OUTBOUND_BUFFER);
        let pending = PendingAuth::new();
        let connected = Arc::new(AtomicBool::new(false));

        let stream = Self {
            url: url.into(),
            outbound_rx,
            pending: pending.clone(),
            connected: connected.clone(),
        };
        let authenticator = Arc::new(WsAuthenticator::new(outbound_tx, pending, connected));

        (stream, authenticator)
    }

    /// Run the stream loop forever, reconnecting on failure.
    /// Call this inside a `tokio::spawn`.
    pub async fn run(mut self, dispatcher: Arc<Dispatcher>) {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(Self::DISPATCH_BUFFER);
        tokio::spawn(dispatch_loop(dispatcher, dispatch_rx));
        let router = FrameRouter::new(self.pending.clone(), dispatch_tx);

        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        loop {
            info!(url = %self.url, "Connecting to feed WebSocket");
            match self.connect_once(&router).await {
                Ok(()) => {
                    info!(url = %self.url, "Feed WebSocket closed cleanly");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, backoff = ?backoff, "Feed WebSocket error, reconnecting");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn connect_once(&mut self, router: &FrameRouter) -> Result<()> {
        let url = Url::parse(&self.url).map_err(|e| Error::WebSocket(e.to_string()))?;

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        info!(url = %self.url, "Feed connected");

        // Requests queued before the last disconnect belong to handshakes
        // that have already given up
        let mut dropped = 0usize;
        while self.outbound_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "Dropped auth requests from previous connection");
        }
        let _connected = ConnectedGuard::set(&self.connected);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    let Some(msg) = msg else {
                        return Ok(());
                    };
                    match msg.map_err(|e| Error::WebSocket(e.to_string()))? {
                        Message::Text(text) => router.route(text.into_bytes()).await,
                        Message::Binary(bytes) => router.route(bytes).await,
                        Message::Close(_) => return Ok(()),
                        _ => {} // ping/pong are answered by tungstenite
                    }
                }

                Some(request) = self.outbound_rx.recv() => {
                    write
                        .send(Message::Text(request))
                        .await
                        .map_err(|e| Error::WebSocket(e.to_string()))?;
                }
            }
        }
    }
}

/// Marks the feed connected for as long as it lives.
struct ConnectedGuard<'a>(&'a AtomicBool);

impl<'a> ConnectedGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for ConnectedGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handles queued frames one at a time, in arrival order.
async fn dispatch_loop(dispatcher: Arc<Dispatcher>, mut dispatch_rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(frame) = dispatch_rx.recv().await {
        if let Err(e) = dispatcher.handle_message(&frame).await {
            warn!(error = %e, "Failed to handle feed message");
        }
    }
    warn!("Dispatch queue closed");
}
