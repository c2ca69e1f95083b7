use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Error, Result};

pub const METHOD_AUTH: &str = "auth";
pub const METHOD_AUTH_EXPIRING: &str = "authExpiring";
pub const METHOD_EXECUTIONS: &str = "executions";

/// A decoded feed frame before routing: a JSON object with arbitrary keys.
pub type Payload = Map<String, Value>;

/// One feed frame, classified by its `method` field.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// The server is about to expire the session; re-authenticate.
    AuthExpiring,
    /// An auth response that reached the dispatcher instead of a handshake.
    Auth(Payload),
    /// Fill notification. `data` is validated later by the formatter.
    Executions(Payload),
    /// `method` present but not one we route.
    Unknown { method: String, payload: Payload },
    /// No `method` at all.
    Unroutable(Payload),
}

impl InboundMessage {
    /// Decode a raw frame. Fails on invalid JSON, on anything other than a
    /// JSON object, and on a `method` that is not a string.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let payload: Payload = serde_json::from_slice(raw)?;

        let method = match payload.get("method") {
            None => return Ok(InboundMessage::Unroutable(payload)),
            Some(Value::String(m)) => m.clone(),
            Some(other) => {
                return Err(Error::Decode(format!(
                    "'method' must be a string, got: {other}"
                )))
            }
        };

        Ok(match method.as_str() {
            METHOD_AUTH_EXPIRING => InboundMessage::AuthExpiring,
            METHOD_AUTH => InboundMessage::Auth(payload),
            METHOD_EXECUTIONS => InboundMessage::Executions(payload),
            _ => InboundMessage::Unknown { method, payload },
        })
    }
}

/// Wire shape of an auth response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthResponse {
    pub req_id: String,
    /// `true` = credentials accepted.
    pub status: bool,
}

/// What a candidate response means to the handshake waiting on `req_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthVerdict {
    Approved,
    Rejected,
    /// Belongs to some other request (or carries no `req_id`). Not terminal.
    Unrelated { req_id: Option<String> },
}

impl AuthResponse {
    /// Correlate a raw response frame against the outstanding `req_id`.
    ///
    /// `status` is only inspected once `req_id` matches; a matching response
    /// without a boolean `status` is a decode error.
    pub fn correlate(raw: &[u8], req_id: &str) -> Result<AuthVerdict> {
        let payload: Payload = serde_json::from_slice(raw)?;

        let got = payload.get("req_id").and_then(Value::as_str);
        if got != Some(req_id) {
            return Ok(AuthVerdict::Unrelated {
                req_id: got.map(str::to_owned),
            });
        }

        match payload.get("status") {
            Some(Value::Bool(true)) => Ok(AuthVerdict::Approved),
            Some(Value::Bool(false)) => Ok(AuthVerdict::Rejected),
            Some(other) => Err(Error::Decode(format!(
                "auth response '{req_id}': 'status' must be a boolean, got: {other}"
            ))),
            None => Err(Error::Decode(format!(
                "auth response '{req_id}' has no 'status'"
            ))),
        }
    }
}

/// Fill details carried in the `data` object of an `executions` message.
/// Values are opaque and only ever printed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionNotice {
    pub symbol: Value,
    pub price: Value,
    pub amount: Value,
}

impl ExecutionNotice {
    pub fn from_payload(payload: &Payload) -> Result<Self> {
        let data = match payload.get("data") {
            Some(Value::Object(data)) => data,
            Some(other) => {
                return Err(Error::Decode(format!(
                    "execution 'data' must be an object, got: {other}"
                )))
            }
            None => return Err(Error::Decode("execution notice has no 'data'".into())),
        };

        let field = |key: &str| data.get(key).cloned().unwrap_or(Value::Null);

        Ok(Self {
            symbol: field("symbol"),
            price: field("price"),
            amount: field("amount"),
        })
    }
}

impl std::fmt::Display for ExecutionNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "symbol: {} price: {} amount: {}",
            Printable(&self.symbol),
            Printable(&self.price),
            Printable(&self.amount)
        )
    }
}

/// Strings print bare, everything else as JSON.
struct Printable<'a>(&'a Value);

impl std::fmt::Display for Printable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}
