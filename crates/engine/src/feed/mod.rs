pub mod auth;
pub mod router;
pub mod stream;

pub use auth::WsAuthenticator;
pub use router::{FrameRouter, PendingAuth};
pub use stream::FeedStream;
