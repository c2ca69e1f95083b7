use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use common::{ApiCredentials, Authenticator, Error};
use engine::{AuthHandshake, Dispatcher, FeedStream, Observation, RecordingReporter};

/// Local feed server: asks the client to re-authenticate, answers the auth
/// request (after a late reply to some other request), then sends one fill.
async fn serve_one_client(listener: TcpListener) {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

    ws.send(Message::Text(json!({"method": "authExpiring"}).to_string()))
        .await
        .unwrap();

    let request: Value = loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => break serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => {}
            other => panic!("client went away: {other:?}"),
        }
    };
    assert_eq!(request["method"], "auth");
    assert_eq!(request["params"]["api_key"], "key");
    let req_id = request["req_id"].as_str().unwrap().to_string();

    for reply in [
        json!({"method": "auth", "req_id": "someone-else", "status": false}),
        json!({"method": "auth", "req_id": req_id, "status": true}),
        json!({"method": "executions", "data": {"symbol": "ETH", "price": "3100", "amount": "2"}}),
    ] {
        ws.send(Message::Text(reply.to_string())).await.unwrap();
    }

    // Keep the connection open until the client drops it
    while ws.next().await.is_some() {}
}

#[tokio::test]
async fn live_feed_reauthenticates_and_dispatches() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(serve_one_client(listener));

    let reporter = Arc::new(RecordingReporter::new());
    let (stream, authenticator) = FeedStream::new(url);
    let handshake = AuthHandshake::new(ApiCredentials::new("key", "secret"), reporter.clone())
        .with_timeout(Duration::from_secs(2));
    let dispatcher = Arc::new(Dispatcher::new(authenticator, handshake, reporter.clone()));
    let feed = tokio::spawn(stream.run(dispatcher));

    // The reply for someone else never reaches our handshake; the dispatcher
    // sees it once the handshake is done
    let expected = vec![
        Observation::AuthExpiring,
        Observation::AuthSucceeded,
        Observation::StaleAuthResponse { req_id: Some("someone-else".into()) },
        Observation::Execution { line: "symbol: ETH price: 3100 amount: 2".into() },
    ];

    let seen = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let obs = reporter.observations();
            if obs.len() >= expected.len() {
                return obs;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("timeout waiting for feed observations");

    feed.abort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn auth_is_refused_before_the_feed_connects() {
    let (_stream, authenticator) = FeedStream::new("ws://127.0.0.1:1");

    let err = authenticator.authenticate("key", "secret").await.unwrap_err();

    assert!(matches!(err, Error::Transport(_)), "Expected Transport, got: {err:?}");
}
