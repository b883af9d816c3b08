//! Integration tests for `EnrichClient` using wiremock HTTP mocks.

use aeodb_enrich::{EnrichClient, EnrichError, SuggestionKind};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> EnrichClient {
    EnrichClient::with_base_url(Some("test-key"), 30, base_url)
        .expect("client construction should not fail")
}

#[tokio::test]
async fn suggest_returns_parsed_suggestions() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "ok",
        "suggestions": [
            { "name": "Globex", "detail": "Direct competitor in mid-market SaaS" },
            { "name": "Initech" }
        ]
    });

    Mock::given(method("POST"))
        .and(path("/v1/suggest"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "kind": "competitors",
            "company": "Acme Analytics"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let suggestions = client
        .suggest(
            SuggestionKind::Competitors,
            "Acme Analytics",
            Some("Marketing software"),
            None,
        )
        .await
        .expect("should parse suggestions");

    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].name, "Globex");
    assert_eq!(
        suggestions[0].detail.as_deref(),
        Some("Direct competitor in mid-market SaaS")
    );
    assert_eq!(suggestions[1].detail, None);
}

#[tokio::test]
async fn error_status_surfaces_as_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/suggest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "error",
            "error": "model overloaded"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .suggest(SuggestionKind::Products, "Acme", None, None)
        .await
        .expect_err("should fail");

    assert!(
        matches!(err, EnrichError::Api(ref msg) if msg == "model overloaded"),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn http_failure_surfaces_as_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/suggest"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .suggest(SuggestionKind::Icps, "Acme", None, None)
        .await
        .expect_err("should fail");

    assert!(matches!(err, EnrichError::Http(_)), "got: {err:?}");
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/suggest"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .suggest(SuggestionKind::Personas, "Acme", None, None)
        .await
        .expect_err("should fail");

    assert!(matches!(err, EnrichError::Deserialize { .. }), "got: {err:?}");
}

#[tokio::test]
async fn missing_api_key_sends_no_auth_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/suggest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "suggestions": []
        })))
        .mount(&server)
        .await;

    let client = EnrichClient::with_base_url(None, 30, &server.uri()).expect("client");
    let suggestions = client
        .suggest(SuggestionKind::Products, "Acme", None, None)
        .await
        .expect("empty suggestions are fine");
    assert!(suggestions.is_empty());
}
