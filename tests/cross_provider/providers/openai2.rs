use super::{load_fixture, ProviderTestSetup, ANSWER, SYSTEM_PROMPT, USER_PROMPT};
use promptline::{Credentials, Profile};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// OpenAI-compatible server that lists its models; the profile asks for a
/// model the server lacks, then `auto`.
pub struct OpenAI2TestSetup;

const SERVED_MODEL: &str = "llama3.1-8b";

fn messages() -> serde_json::Value {
    json!([
        {"role": "system", "content": SYSTEM_PROMPT},
        {"role": "user", "content": USER_PROMPT}
    ])
}

async fn mount_models(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {"id": SERVED_MODEL, "object": "model", "owned_by": "local"},
                {"id": "qwen2.5-7b", "object": "model", "owned_by": "local"}
            ]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[async_trait::async_trait]
impl ProviderTestSetup for OpenAI2TestSetup {
    fn profile(server_uri: &str) -> Profile {
        Profile::new("openai2", "gpt-4o, auto")
            .with_endpoint(format!("{server_uri}/v1/chat/completions"))
            .with_credentials(Credentials {
                api_key: Some("test-api-key".to_string()),
                ..Credentials::default()
            })
    }

    async fn mount_chat_mock(server: &MockServer) {
        mount_models(server).await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_json(json!({"model": SERVED_MODEL, "messages": messages()})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-2",
                "object": "chat.completion",
                "model": SERVED_MODEL,
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": ANSWER},
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_stream_mock(server: &MockServer) {
        mount_models(server).await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_json(json!({
                "model": SERVED_MODEL,
                "messages": messages(),
                "stream": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(load_fixture(
                        "tests/cross_provider/fixtures/openai/chat_stream.sse",
                    ))
                    .insert_header("content-type", "text/event-stream"),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_error_mock(server: &MockServer) {
        // No model list: the first named model is used and rejected.
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_json(json!({"model": "gpt-4o", "messages": messages()})))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"message": "The model `gpt-4o` does not exist", "type": "invalid_request_error"}
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_json(json!({"model": "gpt-4o", "messages": messages(), "stream": true})))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"message": "The model `gpt-4o` does not exist", "type": "invalid_request_error"}
            })))
            .mount(server)
            .await;
    }
}
