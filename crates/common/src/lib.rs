pub mod config;
pub mod error;
pub mod message;
pub mod transport;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use message::{AuthResponse, AuthVerdict, ExecutionNotice, InboundMessage, Payload};
pub use transport::{AuthTicket, Authenticator};
pub use types::*;
