//! HTTP boundary tests: routes, status mapping, correlation header.

use std::time::Duration;

use serde_json::Value;
use upstream_relay::http::X_CORRELATION_ID;
use upstream_relay::observability::MessageCode;

mod common;
use common::{client, start_mock_upstream, start_server, unreachable_base_url, MockReply};

const POSTS: &str = r#"[{"id": 1, "title": "hello", "body": "first post", "userId": 1, "dummy": "x"}]"#;
const USER: &str = r#"{"id": 1, "name": "foo", "email": "foo@example.com"}"#;

async fn get(url: &str) -> (u16, Option<String>, Value) {
    let res = client().get(url).send().await.expect("relay unreachable");
    let status = res.status().as_u16();
    let correlation = res
        .headers()
        .get(X_CORRELATION_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = res.json::<Value>().await.expect("body is not JSON");
    (status, correlation, body)
}

#[tokio::test]
async fn test_posts_success() {
    let upstream = start_mock_upstream(|_| MockReply::ok(POSTS)).await;
    let server = start_server(&upstream.base_url(), 3000).await;

    let (status, correlation, body) = get(&server.url("/external")).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"][0]["title"], "hello");
    assert_eq!(body["data"][0]["userId"], 1);

    let correlation = correlation.expect("missing correlation header");
    assert_eq!(correlation.len(), 16);
    assert!(correlation.chars().all(|c| c.is_ascii_hexdigit()));

    let events = server.sink.events();
    let request_events: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.code, MessageCode::RequestStart | MessageCode::RequestEnd))
        .collect();
    assert_eq!(request_events.len(), 2);
    assert!(events.iter().all(|e| {
        e.correlation_id.map(|id| id.to_string()).as_deref() == Some(correlation.as_str())
    }));
}

#[tokio::test]
async fn test_unreachable_upstream_is_503() {
    let base_url = unreachable_base_url().await;
    let server = start_server(&base_url, 3000).await;

    let (status, _, body) = get(&server.url("/external")).await;

    assert_eq!(status, 503);
    assert_eq!(body["error"], "E001-00002");
}

#[tokio::test]
async fn test_slow_upstream_is_503() {
    let upstream =
        start_mock_upstream(|_| MockReply::ok(POSTS).delayed(Duration::from_secs(2))).await;
    let server = start_server(&upstream.base_url(), 200).await;

    let (status, _, body) = get(&server.url("/external")).await;

    assert_eq!(status, 503);
    assert_eq!(body["error"], "W001-00012");
}

#[tokio::test]
async fn test_upstream_error_is_502() {
    let upstream =
        start_mock_upstream(|_| MockReply::status(400, r#"{"message": "something wrong"}"#)).await;
    let server = start_server(&upstream.base_url(), 3000).await;

    let (status, _, body) = get(&server.url("/external")).await;

    assert_eq!(status, 502);
    assert_eq!(body["error"], "E001-00003");
}

#[tokio::test]
async fn test_user_with_posts() {
    let upstream = start_mock_upstream(|target| match target {
        "/users/1" => MockReply::ok(USER),
        "/posts?userId=1" => MockReply::ok(POSTS),
        _ => MockReply::status(404, "{}"),
    })
    .await;
    let server = start_server(&upstream.base_url(), 3000).await;

    let (status, _, body) = get(&server.url("/external/users/1")).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["user"]["name"], "foo");
    assert_eq!(body["data"]["posts"][0]["title"], "hello");
}

#[tokio::test]
async fn test_user_with_posts_fails_fast() {
    let upstream = start_mock_upstream(|target| match target {
        "/users/1" => MockReply::status(400, r#"{"message": "bad user"}"#),
        _ => MockReply::ok(POSTS).delayed(Duration::from_secs(2)),
    })
    .await;
    let server = start_server(&upstream.base_url(), 3000).await;

    let started = std::time::Instant::now();
    let (status, _, body) = get(&server.url("/external/users/1")).await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(status, 502);
    assert_eq!(body["error"], "E001-00003");
}

#[tokio::test]
async fn test_invalid_user_id_is_400() {
    let upstream = start_mock_upstream(|_| MockReply::ok(POSTS)).await;
    let server = start_server(&upstream.base_url(), 3000).await;

    let (status, _, body) = get(&server.url("/external/users/abc")).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "I001-00010");
    assert_eq!(upstream.hits(), 0);
    assert_eq!(server.sink.count(MessageCode::BadRequest), 1);
}

#[tokio::test]
async fn test_health() {
    let base_url = unreachable_base_url().await;
    let server = start_server(&base_url, 3000).await;

    let (status, correlation, body) = get(&server.url("/health")).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert!(correlation.is_some());
}
