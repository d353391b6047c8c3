use super::*;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Echo {
    value: String,
}

fn oracle_for(server: &MockServer, attempts: u32) -> HttpOracle {
    let base_url = Url::parse(&server.uri()).expect("mock server uri should parse");
    HttpOracle::new(base_url, Duration::from_secs(5))
        .with_retry_policy(RetryPolicy::exponential(attempts).with_base_delay(Duration::ZERO))
}

#[test]
fn retry_policy_backoff() {
    let policy = RetryPolicy::exponential(4).with_base_delay(Duration::from_millis(100));
    assert_eq!(policy.attempts(), 4);
    assert_eq!(policy.delay_after(1), Duration::from_millis(100));
    assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    assert_eq!(policy.delay_after(3), Duration::from_millis(400));

    assert_eq!(RetryPolicy::exponential(0).attempts(), 1);
    assert_eq!(RetryPolicy::none().attempts(), 1);
    assert_eq!(RetryPolicy::default(), RetryPolicy::none());
}

#[test]
fn retryable_errors() {
    assert!(is_retryable(&ureq::Error::StatusCode(500)));
    assert!(is_retryable(&ureq::Error::StatusCode(503)));
    assert!(is_retryable(&ureq::Error::StatusCode(429)));
    assert!(is_retryable(&ureq::Error::ConnectionFailed));
    assert!(!is_retryable(&ureq::Error::StatusCode(400)));
    assert!(!is_retryable(&ureq::Error::StatusCode(401)));
}

#[tokio::test]
async fn post_json_sends_body_and_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/echo"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_json(json!({ "value": "hello" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "world" })))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = oracle_for(&server, 1).with_bearer_token("test-key".to_string());
    let response: Echo = oracle
        .post_json("/v2/echo", &json!({ "value": "hello" }))
        .expect("request should succeed");

    assert_eq!(response.value, "world");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "ok" })))
        .mount(&server)
        .await;

    let oracle = oracle_for(&server, 3);
    let response: Echo = oracle.get_json("/flaky").expect("third attempt should succeed");
    assert_eq!(response.value, "ok");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/unauthorized"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = oracle_for(&server, 3);
    let result: Result<Echo> = oracle.get_json("/unauthorized");

    let error = result.expect_err("401 should fail");
    assert!(error.to_string().contains("HTTP 401"));
}

#[tokio::test]
async fn gives_up_after_configured_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let oracle = oracle_for(&server, 2);
    let result: Result<Echo> = oracle.get_json("/down");

    let error = result.expect_err("persistent 500 should fail");
    assert!(error.to_string().contains("HTTP 500"));
}

#[tokio::test]
async fn malformed_response_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let oracle = oracle_for(&server, 1);
    let result: Result<Echo> = oracle.get_json("/garbage");
    assert!(result.is_err());
}
