use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;

/// An issued auth request: the identifier to correlate on and the channel
/// the transport delivers candidate responses on.
///
/// The receiver belongs to exactly one handshake. Dropping it tells the
/// transport nobody is listening any more.
#[derive(Debug)]
pub struct AuthTicket {
    pub req_id: String,
    pub responses: mpsc::Receiver<Vec<u8>>,
}

/// Abstraction over the side of the feed connection that sends auth requests.
///
/// `WsAuthenticator` implements this over the live WebSocket.
/// `PaperAuthenticator` implements this for simulation.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Send an auth request and return its ticket.
    ///
    /// Responses may arrive on the ticket's channel before this returns, so
    /// implementations must register the channel before sending.
    async fn authenticate(&self, api_key: &str, api_secret: &str) -> Result<AuthTicket>;
}
