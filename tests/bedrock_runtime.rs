//! Bedrock runtime over HTTP.
//!
//! Uses wiremock to stand in for the `InvokeAgent` endpoint and serves
//! hand-built event-stream bodies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agent_chat::agent::bedrock::{BedrockAgentRuntime, EVENT_STREAM_CONTENT_TYPE, SESSION_ID_HEADER};
use agent_chat::agent::config::AgentConfig;
use agent_chat::agent::eventstream::{Header, encode_message};
use agent_chat::agent::types::InvokeAgentRequest;
use agent_chat::agent::{Agent, AgentClient, AgentError, AgentRuntime};
use agent_chat::conversation::{Conversation, ConversationConfig, Message, Outcome};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::StreamExt;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AGENT_ID: &str = "ZZ88CT3BIC";
const ALIAS_ID: &str = "TSTALIASID";
const INVOKE_PATH: &str = "/agents/ZZ88CT3BIC/agentAliases/TSTALIASID/sessions/sess-1/text";

// ============================================================================
// Helpers
// ============================================================================

fn config_for(server: &MockServer) -> AgentConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("BEDROCK_AGENT_ID", AGENT_ID.to_string()),
        ("BEDROCK_AGENT_ALIAS_ID", ALIAS_ID.to_string()),
        ("BEDROCK_ENDPOINT_URL", server.uri()),
        ("AWS_REGION", "us-west-2".to_string()),
        ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE".to_string()),
        ("AWS_SECRET_ACCESS_KEY", "secretkey".to_string()),
    ]);
    AgentConfig::from_lookup(move |key: &str| vars.get(key).cloned()).unwrap()
}

fn chunk_frame(text: &str) -> Vec<u8> {
    let payload = serde_json::json!({ "bytes": BASE64.encode(text) }).to_string();
    encode_message(
        &[
            Header::string(":event-type", "chunk"),
            Header::string(":content-type", "application/json"),
            Header::string(":message-type", "event"),
        ],
        payload.as_bytes(),
    )
    .unwrap()
}

fn exception_frame(kind: &str, message: &str) -> Vec<u8> {
    let payload = serde_json::json!({ "message": message }).to_string();
    encode_message(
        &[Header::string(":exception-type", kind), Header::string(":message-type", "exception")],
        payload.as_bytes(),
    )
    .unwrap()
}

fn event_stream(parts: &[&str]) -> Vec<u8> {
    parts.iter().flat_map(|p| chunk_frame(p)).collect()
}

fn event_stream_response(body: Vec<u8>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body, EVENT_STREAM_CONTENT_TYPE)
        .insert_header(SESSION_ID_HEADER, "sess-1")
}

fn request(prompt: &str) -> InvokeAgentRequest {
    InvokeAgentRequest {
        agent_id: AGENT_ID.into(),
        agent_alias_id: ALIAS_ID.into(),
        session_id: "sess-1".into(),
        input_text: prompt.into(),
        enable_trace: false,
        end_session: false,
    }
}

// ============================================================================
// Request shape
// ============================================================================

#[tokio::test]
async fn invoke_posts_signed_json_to_session_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .and(header("content-type", "application/json"))
        .and(header_exists("authorization"))
        .and(header_exists("x-amz-date"))
        .and(body_json(serde_json::json!({
            "inputText": "What is a duelist?",
            "enableTrace": false,
            "endSession": false,
        })))
        .respond_with(event_stream_response(event_stream(&["ok"])))
        .expect(1)
        .mount(&server)
        .await;

    let client = AgentClient::from_config(&config_for(&server)).unwrap();
    let result = client.invoke("What is a duelist?", "sess-1").await.unwrap();
    assert_eq!(result.completion, "ok");

    let received = server.received_requests().await.unwrap();
    let auth = received[0].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"), "{auth}");
    assert!(auth.contains("/us-west-2/bedrock/aws4_request"), "{auth}");
    assert!(auth.contains("SignedHeaders=host;x-amz-date"), "{auth}");
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn client_assembles_streamed_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(event_stream_response(event_stream(&[
            "A duelist ",
            "is an aggressive ",
            "entry agent.",
        ])))
        .mount(&server)
        .await;

    let client = AgentClient::from_config(&config_for(&server)).unwrap();
    let result = client.invoke("What is a duelist?", "sess-1").await.unwrap();
    assert_eq!(result.session_id, "sess-1");
    assert_eq!(result.completion, "A duelist is an aggressive entry agent.");
}

#[tokio::test]
async fn runtime_yields_one_event_per_frame() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(event_stream_response(event_stream(&["one", "two", "three"])))
        .mount(&server)
        .await;

    let runtime = BedrockAgentRuntime::new(&config_for(&server)).unwrap();
    let response = runtime.invoke_agent(request("count")).await.unwrap();
    let events: Vec<_> = response.completion.unwrap().collect().await;
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(Result::is_ok));
}

#[tokio::test]
async fn mid_stream_exception_is_an_error() {
    let server = MockServer::start().await;
    let mut body = chunk_frame("partial ");
    body.extend(exception_frame("throttlingException", "Rate exceeded"));
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(event_stream_response(body))
        .mount(&server)
        .await;

    let client = AgentClient::from_config(&config_for(&server)).unwrap();
    let err = client.invoke("hi", "sess-1").await.unwrap_err();
    match err {
        AgentError::StreamException { kind, message } => {
            assert_eq!(kind, "throttlingException");
            assert_eq!(message, "Rate exceeded");
        }
        other => panic!("expected StreamException, got {other:?}"),
    }
}

#[tokio::test]
async fn truncated_body_is_an_error() {
    let server = MockServer::start().await;
    let mut body = chunk_frame("whole");
    let partial = chunk_frame("cut");
    body.extend_from_slice(&partial[..partial.len() / 2]);
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(event_stream_response(body))
        .mount(&server)
        .await;

    let client = AgentClient::from_config(&config_for(&server)).unwrap();
    let err = client.invoke("hi", "sess-1").await.unwrap_err();
    assert!(matches!(err, AgentError::EventStream(_)), "{err:?}");
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn http_error_status_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(
            ResponseTemplate::new(403).set_body_string(r#"{"message":"The security token included in the request is invalid."}"#),
        )
        .mount(&server)
        .await;

    let client = AgentClient::from_config(&config_for(&server)).unwrap();
    let err = client.invoke("hi", "sess-1").await.unwrap_err();
    match err {
        AgentError::ApiResponse { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("security token"));
        }
        other => panic!("expected ApiResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn non_stream_body_is_missing_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INVOKE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sessionId": "sess-1" })))
        .mount(&server)
        .await;

    let client = AgentClient::from_config(&config_for(&server)).unwrap();
    let err = client.invoke("hi", "sess-1").await.unwrap_err();
    assert!(matches!(err, AgentError::MissingCompletion));
}

#[tokio::test]
async fn unreachable_endpoint_is_request_error() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    drop(server);

    let client = AgentClient::from_config(&config).unwrap();
    let err = client.invoke("hi", "sess-1").await.unwrap_err();
    assert!(matches!(err, AgentError::ApiRequest(_)), "{err:?}");
}

// ============================================================================
// Conversation over HTTP
// ============================================================================

#[tokio::test]
async fn conversation_appends_streamed_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(event_stream_response(event_stream(&["Sova ", "is an initiator."])))
        .mount(&server)
        .await;

    let client = AgentClient::from_config(&config_for(&server)).unwrap();
    let convo = Conversation::new(Arc::new(client), ConversationConfig::default());
    let outcome = convo.submit("Who is Sova?").unwrap().await.unwrap();

    assert!(matches!(outcome, Outcome::Completed(_)));
    assert_eq!(convo.messages().last(), Some(&Message::bot("Sova is an initiator.")));
    assert!(!convo.is_loading());

    let received = server.received_requests().await.unwrap();
    assert!(received[0].url.path().contains(convo.session_id()));
}

#[tokio::test]
async fn slow_endpoint_times_out_to_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(event_stream_response(event_stream(&["too late"])).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = AgentClient::from_config(&config_for(&server)).unwrap();
    let config = ConversationConfig::default().with_timeout(Duration::from_millis(200));
    let fallback = config.fallback_reply.clone();
    let convo = Conversation::new(Arc::new(client), config);

    let outcome = convo.submit("slow").unwrap().await.unwrap();
    assert!(matches!(outcome, Outcome::TimedOut));
    assert_eq!(convo.messages().last(), Some(&Message::bot(fallback)));
    assert_eq!(convo.messages().len(), 3);
}
