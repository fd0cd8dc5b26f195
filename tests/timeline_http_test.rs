//! HTTP timeline source against a mock remote API.

use autolists::errors::FeedError;
use autolists::feed::{HttpTimelineSource, Status, TimelineSource};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source(server: &MockServer) -> HttpTimelineSource {
    HttpTimelineSource::new(
        reqwest::Client::new(),
        &server.uri(),
        Some("token".to_string()),
        50,
    )
}

#[tokio::test]
async fn test_fetch_parses_timeline_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/statuses/home_timeline.json"))
        .and(query_param("count", "50"))
        .and(query_param("since_id", "41"))
        .and(header("Authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 43, "text": "newest", "user": {"id": 7, "screen_name": "seven"}},
            {"id": 42, "text": "older", "user": {"id": 8, "screen_name": "eight"}, "extra": true}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let statuses = source(&server).fetch(Some(41)).await.unwrap();

    assert_eq!(
        statuses,
        vec![
            Status::new(43, "newest", 7, "seven"),
            Status::new(42, "older", 8, "eight"),
        ]
    );
}

#[tokio::test]
async fn test_fetch_without_since_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/statuses/home_timeline.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let statuses = source(&server).fetch(None).await.unwrap();
    assert!(statuses.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(
        !requests[0]
            .url
            .query_pairs()
            .any(|(key, _)| key == "since_id")
    );
}

#[tokio::test]
async fn test_fetch_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let result = source(&server).fetch(None).await;
    assert!(matches!(
        result,
        Err(FeedError::UnexpectedStatus { status: 429 })
    ));
}
