//! Conversation settings parsed from environment variables.

use std::time::Duration;

use crate::agent::AgentError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_GREETING: &str = "Hi there! I am a chat bot that can engage in a conversation with you!";
pub const DEFAULT_FALLBACK_REPLY: &str = "Sorry, there was an error processing your request.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationConfig {
    /// Upper bound on one agent round trip, measured from dispatch.
    pub timeout: Duration,
    /// First message of every fresh or cleared conversation.
    pub greeting: String,
    /// Bot reply appended on timeout or any agent failure.
    pub fallback_reply: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            greeting: DEFAULT_GREETING.to_string(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
        }
    }
}

impl ConversationConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from environment variables.
    ///
    /// - `CHAT_TIMEOUT_SECS`: default 10
    /// - `CHAT_GREETING`: default greeting text
    /// - `CHAT_FALLBACK_REPLY`: default fallback text
    ///
    /// # Errors
    ///
    /// Returns an error if `CHAT_TIMEOUT_SECS` is not a positive integer.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConversationConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if `CHAT_TIMEOUT_SECS` is not a positive integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AgentError> {
        let defaults = Self::default();

        let timeout = match lookup("CHAT_TIMEOUT_SECS") {
            None => defaults.timeout,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(AgentError::ConfigParse(format!(
                        "CHAT_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                    )));
                }
            },
        };
        let greeting = lookup("CHAT_GREETING")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.greeting);
        let fallback_reply = lookup("CHAT_FALLBACK_REPLY")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.fallback_reply);

        Ok(Self { timeout, greeting, fallback_reply })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
