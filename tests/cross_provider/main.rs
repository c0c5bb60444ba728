//! The same scenarios run against every network backend, each talking to a
//! wiremock server that replays recorded wire traffic.

mod providers;

use std::io;
use std::sync::Arc;

use promptline::{
    ErrorKind, Invocation, LimitKind, LimitMode, Limits, MemoryDiagnostics, Pipeline, Profile,
    PromptSources, ProviderRegistry, RunSummary, Stdin, StreamOutcome,
};
use providers::ollama::OllamaTestSetup;
use providers::openai::OpenAITestSetup;
use providers::openai2::OpenAI2TestSetup;
use providers::vertex::VertexTestSetup;
use providers::{ProviderTestSetup, ANSWER, SYSTEM_PROMPT, USER_PROMPT};
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

fn pipeline() -> (Pipeline, Arc<MemoryDiagnostics>) {
    let diagnostics = Arc::new(MemoryDiagnostics::new());
    let pipeline =
        Pipeline::new(ProviderRegistry::with_builtin()).with_diagnostics(diagnostics.clone());
    (pipeline, diagnostics)
}

fn response_limit(ceiling: u64, mode: LimitMode) -> Limits {
    Limits {
        max_response_size_bytes: ceiling,
        on_output_exceeded: mode,
        ..Limits::default()
    }
}

async fn run(
    profile: Profile,
    stream: bool,
) -> (Result<RunSummary, promptline::Error>, String, Arc<MemoryDiagnostics>) {
    let (pipeline, diagnostics) = pipeline();
    let invocation = Invocation::new(profile)
        .with_system(PromptSources::inline(SYSTEM_PROMPT))
        .with_user(PromptSources::inline(USER_PROMPT))
        .streaming(stream);

    let mut out = Vec::new();
    let result = pipeline
        .run(
            invocation,
            Stdin::interactive(io::empty()),
            &mut out,
            &CancellationToken::new(),
        )
        .await;
    let out = String::from_utf8(out).expect("output is valid UTF-8");
    (result, out, diagnostics)
}

async fn test_buffered_chat<P: ProviderTestSetup>() {
    let server = MockServer::start().await;
    P::mount_chat_mock(&server).await;

    let (result, out, _) = run(P::profile(&server.uri()), false).await;
    let summary = tokio_test::assert_ok!(result);

    assert_eq!(out, format!("{ANSWER}\n"));
    assert_eq!(summary.outcome, StreamOutcome::Completed);
    assert_eq!(summary.bytes_written, ANSWER.len() as u64 + 1);
}

async fn test_streaming_chat<P: ProviderTestSetup>() {
    let server = MockServer::start().await;
    P::mount_stream_mock(&server).await;

    let (result, out, diagnostics) = run(P::profile(&server.uri()), true).await;
    let summary = tokio_test::assert_ok!(result);

    assert_eq!(out, format!("{ANSWER}\n"));
    assert_eq!(summary.outcome, StreamOutcome::Completed);
    assert!(diagnostics.is_empty());
}

async fn test_streaming_warn_truncates<P: ProviderTestSetup>() {
    let server = MockServer::start().await;
    P::mount_stream_mock(&server).await;

    let profile = P::profile(&server.uri()).with_limits(response_limit(12, LimitMode::Warn));
    let (result, out, diagnostics) = run(profile, true).await;
    let summary = tokio_test::assert_ok!(result);

    assert_eq!(out, "Paris is the");
    assert_eq!(summary.outcome, StreamOutcome::Truncated);
    assert_eq!(summary.bytes_written, 12);
    assert_eq!(diagnostics.len(), 1);
}

async fn test_streaming_stop_rejects<P: ProviderTestSetup>() {
    let server = MockServer::start().await;
    P::mount_stream_mock(&server).await;

    let profile = P::profile(&server.uri()).with_limits(response_limit(12, LimitMode::Stop));
    let (result, out, _) = run(profile, true).await;
    let error = tokio_test::assert_err!(result);

    assert_eq!(error.kind(), ErrorKind::LimitExceeded);
    assert!(matches!(
        error,
        promptline::Error::LimitExceeded {
            kind: LimitKind::Response,
            size: 20,
            limit: 12,
        }
    ));
    // Tokens that fitted were already delivered.
    assert_eq!(out, "Paris");
}

async fn test_buffered_warn_truncates<P: ProviderTestSetup>() {
    let server = MockServer::start().await;
    P::mount_chat_mock(&server).await;

    let profile = P::profile(&server.uri()).with_limits(response_limit(5, LimitMode::Warn));
    let (result, out, diagnostics) = run(profile, false).await;
    let summary = tokio_test::assert_ok!(result);

    assert_eq!(out, "Paris");
    assert_eq!(summary.outcome, StreamOutcome::Truncated);
    assert_eq!(diagnostics.len(), 1);
}

async fn test_error_status<P: ProviderTestSetup>(stream: bool) {
    let server = MockServer::start().await;
    P::mount_error_mock(&server).await;

    let (result, out, _) = run(P::profile(&server.uri()), stream).await;
    let error = tokio_test::assert_err!(result);

    assert_eq!(error.kind(), ErrorKind::Provider);
    assert!(error.to_string().contains("API request failed with status"));
    assert!(out.is_empty());
}

#[tokio::test]
async fn openai2_priority_list_without_a_match_fails() {
    let server = MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/v1/models"))
        .respond_with(
            wiremock::ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": [{"id": "llama3.1-8b"}]})),
        )
        .mount(&server)
        .await;

    let profile = OpenAI2TestSetup::profile(&server.uri());
    let profile = Profile {
        model: "gpt-4o,claude".to_string(),
        ..profile
    };
    let (result, out, _) = run(profile, false).await;
    let error = tokio_test::assert_err!(result);

    assert_eq!(error.kind(), ErrorKind::Configuration);
    assert!(error.to_string().contains("could not resolve a valid model"));
    assert!(out.is_empty());
}

macro_rules! provider_tests {
    ($module:ident, $setup:ty) => {
        mod $module {
            use super::*;

            #[tokio::test]
            async fn buffered_chat() {
                test_buffered_chat::<$setup>().await;
            }

            #[tokio::test]
            async fn streaming_chat() {
                test_streaming_chat::<$setup>().await;
            }

            #[tokio::test]
            async fn streaming_warn_truncates() {
                test_streaming_warn_truncates::<$setup>().await;
            }

            #[tokio::test]
            async fn streaming_stop_rejects() {
                test_streaming_stop_rejects::<$setup>().await;
            }

            #[tokio::test]
            async fn buffered_warn_truncates() {
                test_buffered_warn_truncates::<$setup>().await;
            }

            #[tokio::test]
            async fn buffered_error_status() {
                test_error_status::<$setup>(false).await;
            }

            #[tokio::test]
            async fn streaming_error_status() {
                test_error_status::<$setup>(true).await;
            }
        }
    };
}

provider_tests!(ollama, OllamaTestSetup);
provider_tests!(openai, OpenAITestSetup);
provider_tests!(openai2, OpenAI2TestSetup);
provider_tests!(vertex, VertexTestSetup);
