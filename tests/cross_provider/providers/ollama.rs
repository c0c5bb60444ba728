use super::{load_fixture, ProviderTestSetup, ANSWER, SYSTEM_PROMPT, USER_PROMPT};
use promptline::Profile;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct OllamaTestSetup;

fn request_body(stream: bool) -> serde_json::Value {
    json!({
        "model": "llama3",
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": USER_PROMPT}
        ],
        "stream": stream
    })
}

#[async_trait::async_trait]
impl ProviderTestSetup for OllamaTestSetup {
    fn profile(server_uri: &str) -> Profile {
        Profile::new("ollama", "llama3").with_endpoint(format!("{server_uri}/api/chat"))
    }

    async fn mount_chat_mock(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(request_body(false)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3",
                "message": {"role": "assistant", "content": ANSWER},
                "done": true
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_stream_mock(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(request_body(true)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(load_fixture(
                        "tests/cross_provider/fixtures/ollama/chat_stream.ndjson",
                    ))
                    .insert_header("content-type", "application/x-ndjson"),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_error_mock(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": "model 'llama3' not found"})),
            )
            .mount(server)
            .await;
    }
}
