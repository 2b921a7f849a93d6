use matrix_session::types::{SyncResponse, UserId};
use matrix_session::{MatrixSession, SyncTermination};
use std::time::{Duration, Instant};
use serde_json::json;
use tokio::sync::mpsc;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session(server: &MockServer) -> MatrixSession {
    MatrixSession::builder(
        Url::parse(&server.uri()).unwrap(),
        "syt_secret",
        UserId::from("@julia:example.org"),
    )
    .long_poll_window(Duration::from_millis(100))
    .build()
    .unwrap()
}

fn batch(next_batch: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "next_batch": next_batch }))
}

/// The `since` parameter of each sync request the server saw, in order.
async fn since_params(server: &MockServer) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| {
            request
                .url
                .query_pairs()
                .find(|(name, _)| name == "since")
                .map(|(_, value)| value.into_owned())
        })
        .collect()
}

#[tokio::test]
async fn cursor_advances_batch_by_batch() {
    let server = MockServer::start().await;

    // specific cursors first; the catch-all answers the initial sync
    Mock::given(method("GET"))
        .and(path("/_matrix/client/r0/sync"))
        .and(query_param("since", "c1"))
        .respond_with(batch("c2"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_matrix/client/r0/sync"))
        .and(query_param("since", "c2"))
        .respond_with(batch("c3"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_matrix/client/r0/sync"))
        .respond_with(batch("c1"))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::channel::<SyncResponse>(10);
    let handle = session(&server).sync_loop(tx);
    let mut cursors = Vec::new();

    for _ in 0..3 {
        cursors.push(rx.recv().await.unwrap().next_batch);
    }

    handle.cancel();

    assert!(matches!(handle.join().await, SyncTermination::Cancelled));
    assert_eq!(cursors, ["c1", "c2", "c3"]);

    let params = since_params(&server).await;

    assert_eq!(params[0], None);
    assert_eq!(params[1].as_deref(), Some("c1"));
    assert_eq!(params[2].as_deref(), Some("c2"));
}

#[tokio::test]
async fn cancellation_abandons_the_poll_in_flight() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/_matrix/client/r0/sync"))
        .respond_with(batch("c1").set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::channel::<SyncResponse>(10);
    let handle = session(&server).sync_loop(tx);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();

    handle.cancel();

    assert!(matches!(handle.join().await, SyncTermination::Cancelled));
    // the in-flight call is abandoned, not waited out
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn revoked_authentication_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/_matrix/client/r0/sync"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errcode": "M_UNKNOWN_TOKEN",
            "error": "Unrecognised access token.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (tx, _rx) = mpsc::channel::<SyncResponse>(10);
    let termination = session(&server).sync_loop(tx).join().await;

    match termination {
        SyncTermination::AuthRevoked(error) => {
            assert_eq!(error.errcode.as_deref(), Some("M_UNKNOWN_TOKEN"));
        },
        other => panic!("expected AuthRevoked, got {other:?}"),
    }
}

#[tokio::test]
async fn transient_failures_retry_with_the_same_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/_matrix/client/r0/sync"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_matrix/client/r0/sync"))
        .respond_with(batch("c1"))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::channel::<SyncResponse>(10);
    let handle = session(&server).sync_loop(tx);
    let received = rx.recv().await.unwrap();

    handle.cancel();
    handle.join().await;

    assert_eq!(received.next_batch, "c1");

    let params = since_params(&server).await;

    // the failed poll and its retry both asked for the initial sync
    assert_eq!(params[0], None);
    assert_eq!(params[1], None);
}
