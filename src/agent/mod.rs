//! Agent — invocation client for a hosted Bedrock agent.
//!
//! DESIGN
//! ======
//! `AgentClient` is a pure request/response function over an injected
//! `AgentRuntime` handle: build the request, consume the chunk stream to the
//! end, and return the assembled completion or an explicit error. It holds
//! no mutable state, so one client serves any number of conversations.
//!
//! `BedrockAgentRuntime` is the production handle; tests substitute their
//! own runtime or skip the client entirely by mocking `Agent`.

pub mod bedrock;
pub mod completion;
pub mod config;
pub mod eventstream;
pub mod sigv4;
pub mod types;

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info};

use completion::CompletionBuilder;
use config::AgentConfig;
pub use types::{Agent, AgentError, AgentRuntime, Invocation};
use types::{InvokeAgentRequest, ResponseEvent};

// =============================================================================
// CLIENT
// =============================================================================

/// Invokes one configured agent alias through a runtime handle.
pub struct AgentClient {
    runtime: Arc<dyn AgentRuntime>,
    agent_id: String,
    agent_alias_id: String,
    enable_trace: bool,
}

impl AgentClient {
    #[must_use]
    pub fn new(runtime: Arc<dyn AgentRuntime>, agent_id: impl Into<String>, agent_alias_id: impl Into<String>) -> Self {
        Self { runtime, agent_id: agent_id.into(), agent_alias_id: agent_alias_id.into(), enable_trace: false }
    }

    /// Request orchestration traces from the service. They are logged at
    /// debug level and never become part of the completion.
    #[must_use]
    pub fn with_trace(mut self, enable_trace: bool) -> Self {
        self.enable_trace = enable_trace;
        self
    }

    /// Build a client backed by [`bedrock::BedrockAgentRuntime`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let runtime = bedrock::BedrockAgentRuntime::new(config)?;
        Ok(Self::new(Arc::new(runtime), config.agent_id.clone(), config.agent_alias_id.clone())
            .with_trace(config.enable_trace))
    }

    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    #[must_use]
    pub fn agent_alias_id(&self) -> &str {
        &self.agent_alias_id
    }

    async fn invoke_inner(&self, prompt: &str, session_id: &str) -> Result<Invocation, AgentError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AgentError::EmptyPrompt);
        }

        let request = InvokeAgentRequest {
            agent_id: self.agent_id.clone(),
            agent_alias_id: self.agent_alias_id.clone(),
            session_id: session_id.to_string(),
            input_text: prompt.to_string(),
            enable_trace: self.enable_trace,
            end_session: false,
        };

        info!(%session_id, agent_id = %self.agent_id, prompt_len = prompt.len(), "agent: invoking");

        let response = self.runtime.invoke_agent(request).await?;
        let mut stream = response.completion.ok_or(AgentError::MissingCompletion)?;

        let mut builder = CompletionBuilder::new();
        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::Chunk(bytes) => builder.push(&bytes)?,
                ResponseEvent::Trace(trace) => debug!(%session_id, %trace, "agent: trace"),
                ResponseEvent::Other { event_type } => debug!(%session_id, %event_type, "agent: ignoring event"),
            }
        }

        let chunks = builder.chunks();
        let completion = builder.finish()?;
        info!(%session_id, chunks, completion_len = completion.len(), "agent: completion assembled");

        Ok(Invocation { session_id: response.session_id, completion })
    }
}

#[async_trait::async_trait]
impl Agent for AgentClient {
    async fn invoke(&self, prompt: &str, session_id: &str) -> Result<Invocation, AgentError> {
        self.invoke_inner(prompt, session_id).await
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
