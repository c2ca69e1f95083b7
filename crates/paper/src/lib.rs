use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use common::{AuthResponse, AuthTicket, Authenticator, Error, Result};

/// Simulated feed transport for paper runs.
///
/// Answers every auth request in-process after a fixed latency.
/// No request ever leaves the process.
pub struct PaperAuthenticator {
    latency: Duration,
    approve: bool,
    /// Send a response for some other request first.
    stale_first: bool,
}

impl PaperAuthenticator {
    pub fn new(latency: Duration, approve: bool) -> Self {
        info!(latency = ?latency, approve = approve, "PaperAuthenticator initialized");
        Self {
            latency,
            approve,
            stale_first: false,
        }
    }

    /// Precede every real answer with one addressed to an unrelated request,
    /// the way a shared connection delivers late replies.
    pub fn with_stale_response(mut self) -> Self {
        self.stale_first = true;
        self
    }
}

#[async_trait]
impl Authenticator for PaperAuthenticator {
    async fn authenticate(&self, api_key: &str, _api_secret: &str) -> Result<AuthTicket> {
        if api_key.is_empty() {
            return Err(Error::Transport("paper feed rejects an empty api key".into()));
        }

        let req_id = uuid::Uuid::new_v4().to_string();
        let (tx, responses) = mpsc::channel(4);

        let mut replies = Vec::with_capacity(2);
        if self.stale_first {
            replies.push(AuthResponse {
                req_id: uuid::Uuid::new_v4().to_string(),
                status: !self.approve,
            });
        }
        replies.push(AuthResponse {
            req_id: req_id.clone(),
            status: self.approve,
        });

        let latency = self.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            for reply in replies {
                let Ok(frame) = serde_json::to_vec(&reply) else {
                    return;
                };
                debug!(req_id = %reply.req_id, status = reply.status, "Paper auth reply");
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
            // Hold the channel open like a live connection would
            tx.closed().await;
        });

        Ok(AuthTicket { req_id, responses })
    }
}

#[cfg(test)]
mod tests {
    use common::AuthVerdict;

    use super::*;

    #[tokio::test]
    async fn replies_with_matching_approval_after_latency() {
        let paper = PaperAuthenticator::new(Duration::from_millis(30), true);

        let started = std::time::Instant::now();
        let mut ticket = paper.authenticate("key", "secret").await.unwrap();
        let frame = ticket.responses.recv().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(
            AuthResponse::correlate(&frame, &ticket.req_id).unwrap(),
            AuthVerdict::Approved
        );
    }

    #[tokio::test]
    async fn rejecting_paper_feed_replies_false() {
        let paper = PaperAuthenticator::new(Duration::ZERO, false);

        let mut ticket = paper.authenticate("key", "secret").await.unwrap();
        let frame = ticket.responses.recv().await.unwrap();

        assert_eq!(
            AuthResponse::correlate(&frame, &ticket.req_id).unwrap(),
            AuthVerdict::Rejected
        );
    }

    #[tokio::test]
    async fn stale_reply_comes_first() {
        let paper = PaperAuthenticator::new(Duration::ZERO, true).with_stale_response();

        let mut ticket = paper.authenticate("key", "secret").await.unwrap();
        let first = ticket.responses.recv().await.unwrap();
        let second = ticket.responses.recv().await.unwrap();

        assert!(matches!(
            AuthResponse::correlate(&first, &ticket.req_id).unwrap(),
            AuthVerdict::Unrelated { req_id: Some(_) }
        ));
        assert_eq!(
            AuthResponse::correlate(&second, &ticket.req_id).unwrap(),
            AuthVerdict::Approved
        );
    }

    #[tokio::test]
    async fn empty_key_is_refused() {
        let paper = PaperAuthenticator::new(Duration::ZERO, true);
        let err = paper.authenticate("", "secret").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
