use std::sync::Arc;

use serde_json::Value;

use common::{Authenticator, InboundMessage, Result};

use crate::auth::AuthHandshake;
use crate::executions::format_execution_notice;
use crate::observer::{Observation, Reporter};

/// Routes decoded feed frames by `method`.
///
/// Cheap to share behind an `Arc`: concurrent calls to `handle_message`
/// never touch common state.
pub struct Dispatcher {
    authenticator: Arc<dyn Authenticator>,
    handshake: AuthHandshake,
    reporter: Arc<dyn Reporter>,
}

impl Dispatcher {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        handshake: AuthHandshake,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            authenticator,
            handshake,
            reporter,
        }
    }

    /// Decode and handle one raw frame.
    ///
    /// Decode failures and every non-success handshake outcome are returned
    /// to the caller. Unroutable and unrecognized messages are reported and
    /// count as handled.
    pub async fn handle_message(&self, raw: &[u8]) -> Result<()> {
        match InboundMessage::decode(raw)? {
            InboundMessage::AuthExpiring => {
                self.reporter.report(Observation::AuthExpiring);
                self.handshake.run(self.authenticator.as_ref()).await
            }

            InboundMessage::Executions(payload) => {
                let line = format_execution_notice(&payload)?;
                self.reporter.report(Observation::Execution { line });
                Ok(())
            }

            InboundMessage::Auth(payload) => {
                let req_id = payload
                    .get("req_id")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                self.reporter.report(Observation::StaleAuthResponse { req_id });
                Ok(())
            }

            InboundMessage::Unknown { method, payload } => {
                self.reporter.report(Observation::UnknownMethod { method, payload });
                Ok(())
            }

            InboundMessage::Unroutable(payload) => {
                self.reporter.report(Observation::Unroutable { payload });
                Ok(())
            }
        }
    }
}
