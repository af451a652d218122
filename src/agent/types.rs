//! Agent types — request/response shapes, stream events, and errors.
//!
//! The two traits here are the seams of the crate: [`AgentRuntime`] is the
//! authenticated handle to the remote service, [`Agent`] is what the
//! conversation controller calls. Both are object-safe so tests can swap in
//! mocks behind an `Arc<dyn ...>`.

use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;

use super::eventstream::EventStreamError;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by agent invocation.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// A required configuration variable is not set.
    #[error("missing config: env var {var} not set")]
    MissingConfig { var: String },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The prompt was empty after trimming whitespace.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// The HTTP request to the agent endpoint failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The agent endpoint returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The response carried no streamable completion payload.
    #[error("agent response is missing its completion stream")]
    MissingCompletion,

    /// The binary event stream was malformed.
    #[error("event stream error: {0}")]
    EventStream(#[from] EventStreamError),

    /// The service reported an exception inside the event stream.
    #[error("agent stream exception {kind}: {message}")]
    StreamException { kind: String, message: String },

    /// A chunk or event payload could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),
}

impl AgentError {
    /// Stable code for logs and diagnostics.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::MissingConfig { .. } => "E_MISSING_CONFIG",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::EmptyPrompt => "E_EMPTY_PROMPT",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::MissingCompletion => "E_MISSING_COMPLETION",
            Self::EventStream(_) => "E_EVENT_STREAM",
            Self::StreamException { .. } => "E_STREAM_EXCEPTION",
            Self::Decode(_) => "E_DECODE",
        }
    }
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// One `InvokeAgent` call. Serialized fields form the JSON request body;
/// the identifiers travel in the URL path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeAgentRequest {
    #[serde(skip)]
    pub agent_id: String,
    #[serde(skip)]
    pub agent_alias_id: String,
    #[serde(skip)]
    pub session_id: String,
    pub input_text: String,
    pub enable_trace: bool,
    pub end_session: bool,
}

/// A single event decoded from the response stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// A fragment of completion text, still UTF-8 encoded.
    Chunk(Bytes),
    /// Orchestration trace emitted when tracing is enabled.
    Trace(serde_json::Value),
    /// Any event type this client does not interpret.
    Other { event_type: String },
}

/// Lazy, finite stream of response events.
pub type CompletionStream = BoxStream<'static, Result<ResponseEvent, AgentError>>;

/// Raw response of the runtime handle.
pub struct InvokeAgentResponse {
    /// Session id echoed by the service.
    pub session_id: String,
    /// `None` when the response carried no streamable payload.
    pub completion: Option<CompletionStream>,
}

impl std::fmt::Debug for InvokeAgentResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokeAgentResponse")
            .field("session_id", &self.session_id)
            .field("completion", &self.completion.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

/// Assembled result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub session_id: String,
    pub completion: String,
}

// =============================================================================
// TRAITS
// =============================================================================

/// Authenticated handle to the remote agent service.
#[async_trait::async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Send one invocation and return the (still unconsumed) response stream.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] if the request cannot be sent or the
    /// service answers with a non-success status.
    async fn invoke_agent(&self, request: InvokeAgentRequest) -> Result<InvokeAgentResponse, AgentError>;
}

/// Prompt-in, completion-out view of an agent. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    /// Run one prompt against the agent within the given session.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] on transport, decode, or missing-completion
    /// failures. Never returns success with absent data.
    async fn invoke(&self, prompt: &str, session_id: &str) -> Result<Invocation, AgentError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
