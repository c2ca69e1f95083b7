pub mod auth;
pub mod dispatcher;
pub mod executions;
pub mod feed;
pub mod observer;

pub use auth::{AuthHandshake, DEFAULT_AUTH_TIMEOUT};
pub use dispatcher::Dispatcher;
pub use executions::format_execution_notice;
pub use feed::{FeedStream, WsAuthenticator};
pub use observer::{Observation, RecordingReporter, Reporter, TracingReporter};
