pub mod ollama;
pub mod openai;
pub mod openai2;
pub mod vertex;

use promptline::Profile;
use wiremock::MockServer;

pub const SYSTEM_PROMPT: &str = "Answer in one sentence.";
pub const USER_PROMPT: &str = "What is the capital of France?";
pub const ANSWER: &str = "Paris is the capital of France.";

/// Load test fixture from file
pub fn load_fixture(filename: &str) -> String {
    std::fs::read_to_string(filename)
        .unwrap_or_else(|_| panic!("Failed to load test fixture: {filename}"))
}

/// Provider-specific wiring for the shared scenarios.
///
/// Every streaming fixture carries the same three text pieces:
/// `"Paris"`, `" is the capital"`, `" of France."`.
#[async_trait::async_trait]
pub trait ProviderTestSetup {
    /// Profile pointing the backend at the mock server.
    fn profile(server_uri: &str) -> Profile;

    /// Answer a buffered request with [`ANSWER`].
    async fn mount_chat_mock(server: &MockServer);

    /// Answer a streaming request from the fixture.
    async fn mount_stream_mock(server: &MockServer);

    /// Reject every request with an error status.
    async fn mount_error_mock(server: &MockServer);
}
