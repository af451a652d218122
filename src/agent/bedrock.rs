//! Bedrock Agents runtime client.
//!
//! Thin HTTP wrapper for `InvokeAgent`. Signs each request with `SigV4`,
//! streams the event-stream body lazily, and maps frames to
//! [`ResponseEvent`]s. Frame mapping lives in `event_from_message` so it can
//! be tested without a server.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use time::OffsetDateTime;
use tracing::debug;

use super::config::AgentConfig;
use super::eventstream::{EventMessage, EventStreamDecoder, EventStreamError};
use super::sigv4::{self, AwsCredentials, encode_segment};
use super::types::{AgentError, AgentRuntime, CompletionStream, InvokeAgentRequest, InvokeAgentResponse, ResponseEvent};

pub const EVENT_STREAM_CONTENT_TYPE: &str = "application/vnd.amazon.eventstream";
pub const SESSION_ID_HEADER: &str = "x-amz-bedrock-agent-session-id";
const SIGNING_SERVICE: &str = "bedrock";

// =============================================================================
// CLIENT
// =============================================================================

pub struct BedrockAgentRuntime {
    http: reqwest::Client,
    endpoint_url: String,
    region: String,
    credentials: AwsCredentials,
}

impl BedrockAgentRuntime {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| AgentError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            endpoint_url: config.endpoint_url.clone(),
            region: config.region.clone(),
            credentials: config.credentials.clone(),
        })
    }

    fn invoke_url(&self, request: &InvokeAgentRequest) -> Result<Url, AgentError> {
        let raw = format!(
            "{}/agents/{}/agentAliases/{}/sessions/{}/text",
            self.endpoint_url,
            encode_segment(&request.agent_id),
            encode_segment(&request.agent_alias_id),
            encode_segment(&request.session_id),
        );
        Url::parse(&raw).map_err(|e| AgentError::ConfigParse(format!("invalid endpoint url '{raw}': {e}")))
    }
}

#[async_trait::async_trait]
impl AgentRuntime for BedrockAgentRuntime {
    async fn invoke_agent(&self, request: InvokeAgentRequest) -> Result<InvokeAgentResponse, AgentError> {
        let url = self.invoke_url(&request)?;
        let body = serde_json::to_vec(&request).map_err(|e| AgentError::ApiRequest(format!("encode body: {e}")))?;
        let signed = sigv4::sign(
            "POST",
            &url,
            &body,
            &self.credentials,
            &self.region,
            SIGNING_SERVICE,
            OffsetDateTime::now_utc(),
        );

        let mut builder = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header("x-amz-date", &signed.amz_date)
            .header(AUTHORIZATION, &signed.authorization);
        if let Some(token) = &signed.security_token {
            builder = builder.header("x-amz-security-token", token);
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| AgentError::ApiRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::ApiResponse { status: status.as_u16(), body: text });
        }

        let session_id = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| request.session_id.clone(), str::to_string);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        debug!(%session_id, %content_type, status = status.as_u16(), "bedrock: response headers received");

        let completion = content_type
            .starts_with(EVENT_STREAM_CONTENT_TYPE)
            .then(|| decode_events(response.bytes_stream()));

        Ok(InvokeAgentResponse { session_id, completion })
    }
}

// =============================================================================
// STREAM DECODING
// =============================================================================

/// Turn a raw byte stream into a stream of decoded events. The first error
/// ends the stream.
pub fn decode_events<S, E>(body: S) -> CompletionStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = (Box::pin(body), EventStreamDecoder::new(), false);

    futures::stream::unfold(state, |(mut body, mut decoder, done)| async move {
        if done {
            return None;
        }
        loop {
            match decoder.next_message() {
                Ok(Some(message)) => {
                    let item = event_from_message(&message);
                    let done = item.is_err();
                    return Some((item, (body, decoder, done)));
                }
                Ok(None) => {}
                Err(e) => return Some((Err(e.into()), (body, decoder, true))),
            }

            match body.next().await {
                Some(Ok(bytes)) => decoder.push(&bytes),
                Some(Err(e)) => {
                    let err = AgentError::ApiRequest(format!("stream read failed: {e}"));
                    return Some((Err(err), (body, decoder, true)));
                }
                None if decoder.remaining() > 0 => {
                    let err: AgentError = EventStreamError::Truncated(decoder.remaining()).into();
                    return Some((Err(err), (body, decoder, true)));
                }
                None => return None,
            }
        }
    })
    .boxed()
}

#[derive(serde::Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    bytes: Option<String>,
}

#[derive(serde::Deserialize)]
struct ExceptionPayload {
    #[serde(default)]
    message: Option<String>,
}

fn event_from_message(message: &EventMessage) -> Result<ResponseEvent, AgentError> {
    match message.header_str(":message-type").unwrap_or("event") {
        "event" => match message.header_str(":event-type").unwrap_or_default() {
            "chunk" => {
                let payload: ChunkPayload = serde_json::from_slice(&message.payload)
                    .map_err(|e| AgentError::Decode(format!("chunk payload: {e}")))?;
                let bytes = match payload.bytes {
                    Some(encoded) => BASE64
                        .decode(encoded)
                        .map_err(|e| AgentError::Decode(format!("chunk bytes: {e}")))?,
                    None => Vec::new(),
                };
                Ok(ResponseEvent::Chunk(Bytes::from(bytes)))
            }
            "trace" => {
                let value = serde_json::from_slice(&message.payload).unwrap_or_else(|_| {
                    serde_json::Value::String(String::from_utf8_lossy(&message.payload).into_owned())
                });
                Ok(ResponseEvent::Trace(value))
            }
            other => Ok(ResponseEvent::Other { event_type: other.to_string() }),
        },
        "exception" => {
            let kind = message
                .header_str(":exception-type")
                .unwrap_or("unknownException")
                .to_string();
            Err(AgentError::StreamException { kind, message: exception_text(&message.payload) })
        }
        "error" => {
            let kind = message
                .header_str(":error-code")
                .unwrap_or("unknownError")
                .to_string();
            let text = message
                .header_str(":error-message")
                .unwrap_or_default()
                .to_string();
            Err(AgentError::StreamException { kind, message: text })
        }
        other => Err(AgentError::Decode(format!("unknown message type '{other}'"))),
    }
}

fn exception_text(payload: &[u8]) -> String {
    serde_json::from_slice::<ExceptionPayload>(payload)
        .ok()
        .and_then(|p| p.message)
        .unwrap_or_else(|| String::from_utf8_lossy(payload).into_owned())
}

#[cfg(test)]
#[path = "bedrock_test.rs"]
mod tests;
