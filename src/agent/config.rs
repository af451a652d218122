//! Agent configuration parsed from environment variables.

use super::sigv4::AwsCredentials;
use super::types::AgentError;

pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_AGENT_ALIAS_ID: &str = "TSTALIASID";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 1200;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub region: String,
    pub agent_id: String,
    pub agent_alias_id: String,
    pub endpoint_url: String,
    pub credentials: AwsCredentials,
    pub enable_trace: bool,
    pub timeouts: RequestTimeouts,
}

impl AgentConfig {
    /// Build typed agent config from environment variables.
    ///
    /// Required:
    /// - `BEDROCK_AGENT_ID`
    /// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
    ///
    /// Optional:
    /// - `AWS_REGION`: default `us-west-2`
    /// - `AWS_SESSION_TOKEN`
    /// - `BEDROCK_AGENT_ALIAS_ID`: default `TSTALIASID`
    /// - `BEDROCK_ENDPOINT_URL`: default derived from the region
    /// - `BEDROCK_ENABLE_TRACE`: `true`/`false`, default false
    /// - `BEDROCK_REQUEST_TIMEOUT_SECS`: default 1200
    /// - `BEDROCK_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails
    /// to parse.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AgentConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails
    /// to parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AgentError> {
        let require = |var: &str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AgentError::MissingConfig { var: var.into() })
        };

        let region = lookup("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());
        let agent_id = require("BEDROCK_AGENT_ID")?;
        let agent_alias_id = lookup("BEDROCK_AGENT_ALIAS_ID").unwrap_or_else(|| DEFAULT_AGENT_ALIAS_ID.to_string());
        let endpoint_url = lookup("BEDROCK_ENDPOINT_URL")
            .unwrap_or_else(|| default_endpoint(&region))
            .trim_end_matches('/')
            .to_string();

        let credentials = AwsCredentials {
            access_key_id: require("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            session_token: lookup("AWS_SESSION_TOKEN").filter(|v| !v.is_empty()),
        };

        let enable_trace = parse_bool(lookup("BEDROCK_ENABLE_TRACE").as_deref())?;
        let timeouts = RequestTimeouts {
            request_secs: parse_u64(&lookup, "BEDROCK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_u64(&lookup, "BEDROCK_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        Ok(Self { region, agent_id, agent_alias_id, endpoint_url, credentials, enable_trace, timeouts })
    }
}

#[must_use]
pub fn default_endpoint(region: &str) -> String {
    format!("https://bedrock-agent-runtime.{region}.amazonaws.com")
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64, AgentError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| AgentError::ConfigParse(format!("{key} must be a non-negative integer, got '{raw}'"))),
    }
}

fn parse_bool(raw: Option<&str>) -> Result<bool, AgentError> {
    match raw.map(str::trim) {
        None | Some("" | "0" | "false") => Ok(false),
        Some("1" | "true") => Ok(true),
        Some(other) => Err(AgentError::ConfigParse(format!("BEDROCK_ENABLE_TRACE must be true or false, got '{other}'"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
