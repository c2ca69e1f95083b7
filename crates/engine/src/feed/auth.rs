use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use common::message::METHOD_AUTH;
use common::{AuthTicket, Authenticator, Error, Result};

use super::router::PendingAuth;

/// Buffered responses per handshake before the router waits.
const RESPONSE_BUFFER: usize = 16;

/// Sends auth requests over the live feed socket.
///
/// Requests are queued for the connection loop in `FeedStream`; responses
/// come back through the `PendingAuth` map the loop routes into. Requests
/// are refused while the socket is down.
pub struct WsAuthenticator {
    outbound_tx: mpsc::Sender<String>,
    pending: PendingAuth,
    connected: Arc<AtomicBool>,
}

impl WsAuthenticator {
    pub fn new(
        outbound_tx: mpsc::Sender<String>,
        pending: PendingAuth,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            outbound_tx,
            pending,
            connected,
        }
    }
}

#[async_trait]
impl Authenticator for WsAuthenticator {
    async fn authenticate(&self, api_key: &str, api_secret: &str) -> Result<AuthTicket> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(Error::Transport("feed is not connected".into()));
        }

        let req_id = Uuid::new_v4().to_string();
        let (tx, responses) = mpsc::channel(RESPONSE_BUFFER);

        // Register before sending so a fast response cannot slip past
        self.pending.register(req_id.clone(), tx).await;

        let request = json!({
            "method": METHOD_AUTH,
            "req_id": req_id,
            "params": {
                "api_key": api_key,
                "api_secret": api_secret,
            },
        });

        if self.outbound_tx.send(request.to_string()).await.is_err() {
            self.pending.remove(&req_id).await;
            return Err(Error::Transport("feed connection loop is not running".into()));
        }

        debug!(req_id = %req_id, "Auth request queued");
        Ok(AuthTicket { req_id, responses })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;

    use super::*;
    use crate::auth::AuthHandshake;
    use crate::feed::router::FrameRouter;
    use crate::observer::{Observation, RecordingReporter};
    use common::ApiCredentials;

    fn authenticator(connected: bool) -> (WsAuthenticator, mpsc::Receiver<String>, PendingAuth) {
        let (outbound_tx, outbound_rx) = mpsc::channel(4);
        let pending = PendingAuth::new();
        let auth = WsAuthenticator::new(
            outbound_tx,
            pending.clone(),
            Arc::new(AtomicBool::new(connected)),
        );
        (auth, outbound_rx, pending)
    }

    #[tokio::test]
    async fn request_carries_credentials_and_req_id() {
        let (auth, mut outbound_rx, pending) = authenticator(true);

        let ticket = auth.authenticate("key", "secret").await.unwrap();

        let sent: Value = serde_json::from_str(&outbound_rx.recv().await.unwrap()).unwrap();
        assert_eq!(sent["method"], "auth");
        assert_eq!(sent["req_id"], ticket.req_id.as_str());
        assert_eq!(sent["params"]["api_key"], "key");
        assert_eq!(sent["params"]["api_secret"], "secret");
        assert!(pending.is_waiting(&ticket.req_id).await);
    }

    #[tokio::test]
    async fn request_ids_are_unique() {
        let (auth, _outbound_rx, _pending) = authenticator(true);

        let a = auth.authenticate("key", "secret").await.unwrap();
        let b = auth.authenticate("key", "secret").await.unwrap();
        assert_ne!(a.req_id, b.req_id);
    }

    #[tokio::test]
    async fn stopped_connection_loop_is_transport_error() {
        let (auth, outbound_rx, _pending) = authenticator(true);
        drop(outbound_rx);

        let err = auth.authenticate("key", "secret").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn disconnected_feed_refuses_without_queueing() {
        let (auth, mut outbound_rx, _pending) = authenticator(false);

        let err = auth.authenticate("key", "secret").await.unwrap_err();

        assert!(matches!(err, Error::Transport(ref m) if m == "feed is not connected"));
        assert!(outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn concurrent_handshakes_on_one_socket_are_independent() {
        let (auth, mut outbound_rx, pending) = authenticator(true);
        let (dispatch_tx, _dispatch_rx) = mpsc::channel(8);
        let router = FrameRouter::new(pending, dispatch_tx);

        // Feed server: approves each request 50ms after it arrives
        tokio::spawn(async move {
            while let Some(request) = outbound_rx.recv().await {
                let request: Value = serde_json::from_str(&request).unwrap();
                let req_id = request["req_id"].as_str().unwrap().to_string();
                let router = router.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let reply = json!({"method": "auth", "req_id": req_id, "status": true});
                    router.route(reply.to_string().into_bytes()).await;
                });
            }
        });

        let reporter = Arc::new(RecordingReporter::new());
        let hs = AuthHandshake::new(ApiCredentials::new("key", "secret"), reporter.clone())
            .with_timeout(Duration::from_secs(1));

        let (first, second) = tokio::join!(hs.run(&auth), hs.run(&auth));

        assert!(first.is_ok(), "first handshake: {first:?}");
        assert!(second.is_ok(), "second handshake: {second:?}");
        assert_eq!(
            reporter.observations(),
            vec![Observation::AuthSucceeded, Observation::AuthSucceeded]
        );
    }
}
