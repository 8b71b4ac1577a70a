mod common;

use common::test_utils::create_test_llm_config;
use healthmate::{
    config::LlmProvider,
    llm::{GenerativeBackend, GenerativeModel, OpenAiBackend},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(text: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "gemini-2.0-flash",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    })
}

async fn sent_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].body).unwrap()
}

async fn mount_completion(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Stay hydrated.")))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_temperature_omitted_when_unset() {
    let server = MockServer::start().await;
    mount_completion(&server).await;

    let mut config = create_test_llm_config(&format!("{}/v1", server.uri()));
    config.provider = LlmProvider::Openai;
    let backend = OpenAiBackend::new(&config);

    let model = backend.acquire("gemini-2.0-flash").unwrap();
    assert_eq!(model.generate("hello").await.unwrap(), "Stay hydrated.");

    let body = sent_body(&server).await;
    assert_eq!(body["model"], "gemini-2.0-flash");
    assert_eq!(body["messages"][0]["content"], "hello");
    assert!(body.get("temperature").is_none());
}

#[tokio::test]
async fn test_temperature_sent_when_configured() {
    let server = MockServer::start().await;
    mount_completion(&server).await;

    let mut config = create_test_llm_config(&format!("{}/v1", server.uri()));
    config.provider = LlmProvider::Openai;
    config.temperature = Some(0.25);
    let backend = OpenAiBackend::new(&config);

    let model = backend.acquire("gemini-2.0-flash").unwrap();
    model.generate("hello").await.unwrap();

    let body = sent_body(&server).await;
    assert_eq!(body["temperature"], json!(0.25));
}
