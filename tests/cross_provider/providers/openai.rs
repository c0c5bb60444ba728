use super::{load_fixture, ProviderTestSetup, ANSWER, SYSTEM_PROMPT, USER_PROMPT};
use promptline::{Credentials, Profile};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct OpenAITestSetup;

fn messages() -> serde_json::Value {
    json!([
        {"role": "system", "content": SYSTEM_PROMPT},
        {"role": "user", "content": USER_PROMPT}
    ])
}

#[async_trait::async_trait]
impl ProviderTestSetup for OpenAITestSetup {
    fn profile(server_uri: &str) -> Profile {
        Profile::new("openai", "gpt-4o-mini")
            .with_endpoint(format!("{server_uri}/v1/chat/completions"))
            .with_credentials(Credentials {
                api_key: Some("test-api-key".to_string()),
                ..Credentials::default()
            })
    }

    async fn mount_chat_mock(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_json(json!({"model": "gpt-4o-mini", "messages": messages()})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "model": "gpt-4o-mini",
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
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_json(json!({
                "model": "gpt-4o-mini",
                "messages": messages(),
                "stream": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(load_fixture(
                        "tests/cross_provider/fixtures/openai/chat_stream.sse",
                    ))
                    .insert_header("content-type", "text/event-stream")
                    .insert_header("cache-control", "no-cache"),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_error_mock(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(server)
            .await;
    }
}
