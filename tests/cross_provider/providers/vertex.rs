use super::{load_fixture, ProviderTestSetup, ANSWER, SYSTEM_PROMPT, USER_PROMPT};
use promptline::{Credentials, Profile};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct VertexTestSetup;

const MODEL_PATH: &str =
    "/v1/projects/test-project/locations/europe-west1/publishers/google/models/gemini-1.5-flash";

fn request_body() -> serde_json::Value {
    json!({
        "contents": [{"role": "user", "parts": [{"text": USER_PROMPT}]}],
        "systemInstruction": {"role": "user", "parts": [{"text": SYSTEM_PROMPT}]}
    })
}

#[async_trait::async_trait]
impl ProviderTestSetup for VertexTestSetup {
    fn profile(server_uri: &str) -> Profile {
        Profile::new("vertexai", "gemini-1.5-flash")
            .with_endpoint(server_uri)
            .with_credentials(Credentials {
                access_token: Some("test-token".to_string()),
                project_id: Some("test-project".to_string()),
                location: Some("europe-west1".to_string()),
                ..Credentials::default()
            })
    }

    async fn mount_chat_mock(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(format!("{MODEL_PATH}:generateContent")))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(request_body()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": ANSWER}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 7, "totalTokenCount": 19}
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_stream_mock(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(format!("{MODEL_PATH}:streamGenerateContent")))
            .and(query_param("alt", "sse"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(request_body()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(load_fixture(
                        "tests/cross_provider/fixtures/vertex/stream_generate_content.sse",
                    ))
                    .insert_header("content-type", "text/event-stream"),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_error_mock(server: &MockServer) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Permission denied on resource project test-project.", "status": "PERMISSION_DENIED"}
            })))
            .mount(server)
            .await;
    }
}
