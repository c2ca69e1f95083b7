use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use common::{ApiCredentials, AuthResponse, AuthTicket, AuthVerdict, Authenticator, Error, Result};

use crate::observer::{Observation, Reporter};

/// How long a handshake may wait for its response unless configured otherwise.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(1);

/// One authentication attempt: send the request, then wait for the response
/// carrying our `req_id` or for the deadline, whichever comes first.
///
/// Holds no per-attempt state, so a single instance can serve any number of
/// concurrent `run` calls; each gets its own request id and deadline.
pub struct AuthHandshake {
    credentials: ApiCredentials,
    timeout: Duration,
    reporter: Arc<dyn Reporter>,
}

impl AuthHandshake {
    pub fn new(credentials: ApiCredentials, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            credentials,
            timeout: DEFAULT_AUTH_TIMEOUT,
            reporter,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the handshake to a terminal state.
    ///
    /// - `Ok(())`: matching response with `status: true`
    /// - `Error::AuthFailed`: matching response with `status: false`
    /// - `Error::AuthTimeout`: nothing matching before the deadline
    /// - any error from `authenticate`, unchanged
    /// - `Error::Json` / `Error::Decode`: unreadable response frame
    ///
    /// The deadline is fixed at the start; unrelated responses do not extend it.
    pub async fn run(&self, authenticator: &dyn Authenticator) -> Result<()> {
        let started = Instant::now();

        let AuthTicket {
            req_id,
            mut responses,
        } = authenticator
            .authenticate(&self.credentials.api_key, &self.credentials.api_secret)
            .await?;

        let deadline = tokio::time::sleep_until(started + self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    self.reporter.report(Observation::AuthTimedOut);
                    return Err(Error::AuthTimeout);
                }

                frame = responses.recv() => {
                    let Some(frame) = frame else {
                        return Err(Error::Transport(format!(
                            "auth response channel closed while waiting for '{req_id}'"
                        )));
                    };

                    match AuthResponse::correlate(&frame, &req_id)? {
                        AuthVerdict::Approved => {
                            self.reporter.report(Observation::AuthSucceeded);
                            return Ok(());
                        }
                        AuthVerdict::Rejected => {
                            self.reporter.report(Observation::AuthRejected);
                            return Err(Error::AuthFailed);
                        }
                        AuthVerdict::Unrelated { req_id } => {
                            self.reporter.report(Observation::AuthResponseIgnored { req_id });
                        }
                    }
                }
            }
        }
    }
}
