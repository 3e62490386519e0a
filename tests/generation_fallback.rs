// tests/generation_fallback.rs
//
// Generation pipeline against a mock chat-completions service.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bid_radar::config::preferences::DEFAULT_BID_TEMPLATE;
use bid_radar::config::{Preferences, Profile};
use bid_radar::generate::{BidGenerator, BidSource, OpenAiProvider};

fn generator(base: &str) -> BidGenerator {
    let p = OpenAiProvider::new(base, Duration::from_secs(2)).unwrap();
    BidGenerator::new(Arc::new(p), 4, Duration::from_secs(2))
}

fn prefs(api_key: &str, template: &str) -> Preferences {
    Preferences {
        api_key: api_key.into(),
        bid_template: template.into(),
        ..Preferences::default()
    }
}

#[tokio::test]
async fn successful_completion_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 1500,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello,\nI can build this.\n"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let profile = Profile {
        name: "Ada".into(),
        ..Profile::default()
    };
    let bid = generator(&server.uri())
        .generate_bid("Need a Rust CLI", &prefs("sk-test", "T"), &profile)
        .await;
    assert_eq!(bid.source, BidSource::Generated);
    assert_eq!(bid.text, "Hello,\nI can build this.\n");

    let reqs = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&reqs[0].body).unwrap();
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("Need a Rust CLI"));
    assert!(user.contains("This is my name:Ada"));
    assert!(user.ends_with("Characters must be no longer than 1500."));
    assert_eq!(body["messages"][0]["role"], "system");
}

#[tokio::test]
async fn empty_credential_never_calls_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let g = generator(&server.uri());
    let bid = g.generate_bid("d", &prefs("", "My own template"), &Profile::default()).await;
    assert_eq!(bid.text, "My own template");
    assert_eq!(bid.source, BidSource::NoCredential);

    let text = g.generate("d", &prefs("  ", ""), &Profile::default()).await;
    assert_eq!(text, DEFAULT_BID_TEMPLATE);
}

#[tokio::test]
async fn service_errors_fall_back_to_template() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let g = generator(&server.uri());
    for _ in 0..2 {
        let bid = g.generate_bid("d", &prefs("sk-test", "Fallback"), &Profile::default()).await;
        assert_eq!(bid.text, "Fallback");
        assert!(matches!(bid.source, BidSource::Fallback { .. }));
    }
}

#[tokio::test]
async fn unreachable_service_falls_back() {
    let g = generator("http://127.0.0.1:9");
    let text = g.generate("d", &prefs("sk-test", ""), &Profile::default()).await;
    assert_eq!(text, DEFAULT_BID_TEMPLATE);
}

#[tokio::test]
async fn credential_validation_uses_models_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer sk-good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let g = generator(&server.uri());
    assert!(g.validate_credential("sk-good").await);
    assert!(!g.validate_credential("sk-bad").await);
    assert!(!g.validate_credential("").await);
}
