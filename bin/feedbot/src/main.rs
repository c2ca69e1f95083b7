use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Authenticator, Config, FeedMode};
use engine::{AuthHandshake, Dispatcher, FeedStream, Reporter, TracingReporter};
use paper::PaperAuthenticator;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().expect("static directive parses")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(mode = %cfg.feed_mode, auth_timeout = ?cfg.auth_timeout, "FeedBot starting");

    let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter);
    let handshake = AuthHandshake::new(cfg.credentials.clone(), reporter.clone())
        .with_timeout(cfg.auth_timeout);

    match cfg.feed_mode {
        FeedMode::Live => {
            // from_env has already checked FEED_URL is present in live mode
            let url = cfg.feed_url.clone().unwrap_or_default();
            info!(url = %url, "Live mode — using WebSocket feed");

            let (stream, authenticator) = FeedStream::new(url);
            let dispatcher = Arc::new(Dispatcher::new(authenticator, handshake, reporter));
            tokio::spawn(stream.run(dispatcher));

            info!("Feed started. Waiting for shutdown signal.");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received. Exiting.");
        }

        FeedMode::Paper => {
            info!(
                latency = ?cfg.paper_auth_latency,
                approve = cfg.paper_auth_approve,
                "Paper mode — reading frames from stdin"
            );
            let authenticator: Arc<dyn Authenticator> = Arc::new(PaperAuthenticator::new(
                cfg.paper_auth_latency,
                cfg.paper_auth_approve,
            ));
            let dispatcher = Dispatcher::new(authenticator, handshake, reporter);
            run_stdin_feed(&dispatcher).await;
        }
    }
}

/// One JSON frame per line until EOF.
async fn run_stdin_feed(dispatcher: &Dispatcher) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                if let Err(e) = dispatcher.handle_message(line.as_bytes()).await {
                    warn!(error = %e, "Failed to handle feed message");
                }
            }
            Ok(None) => {
                info!("stdin closed. Exiting.");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        }
    }
}
