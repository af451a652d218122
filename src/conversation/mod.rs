//! Conversation — sequences user sends against the agent.
//!
//! DESIGN
//! ======
//! One send is in flight at a time. `submit` appends the user message and
//! flips `loading` before anything touches the network, then spawns a task
//! that races the agent call against the configured timeout. Exactly one bot
//! message is appended per send: the completion, or the fallback reply on
//! timeout or error.
//!
//! Every send gets an id and a `CancellationToken`. The spawned task only
//! applies its outcome if its id is still the pending one when it takes the
//! lock, so a late result can never land after the send was resolved by a
//! timeout or discarded by `clear`.
//!
//! `clear` while a send is pending cancels that send: its token fires, the
//! in-flight call is dropped, and no bot message is ever appended for it.
//!
//! State changes are published on a `watch` channel so a presentation layer
//! can re-render without polling.

pub mod config;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{Agent, AgentError};
pub use config::ConversationConfig;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One entry of the message log. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
}

impl Message {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self { text: text.into(), sender: Sender::User }
    }

    #[must_use]
    pub fn bot(text: impl Into<String>) -> Self {
        Self { text: text.into(), sender: Sender::Bot }
    }
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub loading: bool,
}

/// How a single send resolved.
#[derive(Debug)]
pub enum Outcome {
    /// The agent answered in time; its text was appended.
    Completed(String),
    /// The timeout fired first; the fallback reply was appended.
    TimedOut,
    /// The agent failed; the fallback reply was appended.
    Failed(AgentError),
    /// The send was cleared before it resolved; nothing was appended.
    Discarded,
}

struct PendingSend {
    id: u64,
    cancel: CancellationToken,
}

struct State {
    messages: Vec<Message>,
    pending: Option<PendingSend>,
    next_send_id: u64,
}

impl State {
    fn snapshot(&self) -> Snapshot {
        Snapshot { messages: self.messages.clone(), loading: self.pending.is_some() }
    }
}

struct Shared {
    agent: Arc<dyn Agent>,
    session_id: String,
    config: ConversationConfig,
    state: Mutex<State>,
    updates: watch::Sender<Snapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &State) {
        self.updates.send_replace(state.snapshot());
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Conversation controller. Cheap to clone; clones share one conversation.
#[derive(Clone)]
pub struct Conversation {
    shared: Arc<Shared>,
}

impl Conversation {
    /// Start a conversation with a freshly generated session id.
    #[must_use]
    pub fn new(agent: Arc<dyn Agent>, config: ConversationConfig) -> Self {
        Self::with_session_id(agent, config, Uuid::new_v4().to_string())
    }

    /// Start a conversation bound to an existing session id.
    #[must_use]
    pub fn with_session_id(agent: Arc<dyn Agent>, config: ConversationConfig, session_id: impl Into<String>) -> Self {
        let state = State { messages: vec![Message::bot(&config.greeting)], pending: None, next_send_id: 0 };
        let (updates, _) = watch::channel(state.snapshot());
        let shared = Shared { agent, session_id: session_id.into(), config, state: Mutex::new(state), updates };
        Self { shared: Arc::new(shared) }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    #[must_use]
    pub fn config(&self) -> &ConversationConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().messages.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.shared.lock().snapshot()
    }

    /// Receive a fresh [`Snapshot`] after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.shared.updates.subscribe()
    }

    /// Submit user text.
    ///
    /// Returns `None`, with no state change, when the trimmed text is empty
    /// or another send is pending. Otherwise the user message is appended
    /// before this returns and the handle resolves once the send settles.
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, text: &str) -> Option<JoinHandle<Outcome>> {
        let prompt = text.trim();
        if prompt.is_empty() {
            return None;
        }

        let (send_id, cancel) = {
            let mut state = self.shared.lock();
            if state.pending.is_some() {
                debug!(session_id = %self.shared.session_id, "conversation: send ignored, another is pending");
                return None;
            }
            state.next_send_id += 1;
            let send_id = state.next_send_id;
            let cancel = CancellationToken::new();
            state.messages.push(Message::user(prompt));
            state.pending = Some(PendingSend { id: send_id, cancel: cancel.clone() });
            self.shared.publish(&state);
            (send_id, cancel)
        };

        info!(session_id = %self.shared.session_id, send_id, prompt_len = prompt.len(), "conversation: send dispatched");

        let shared = Arc::clone(&self.shared);
        let prompt = prompt.to_string();
        Some(tokio::spawn(async move { run_send(shared, send_id, cancel, prompt).await }))
    }

    /// Reset the log to the greeting. A pending send is discarded.
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        if let Some(pending) = state.pending.take() {
            pending.cancel.cancel();
            info!(session_id = %self.shared.session_id, send_id = pending.id, "conversation: pending send discarded by clear");
        }
        state.messages = vec![Message::bot(&self.shared.config.greeting)];
        self.shared.publish(&state);
    }
}

async fn run_send(shared: Arc<Shared>, send_id: u64, cancel: CancellationToken, prompt: String) -> Outcome {
    let timeout = shared.config.timeout;
    let call = shared.agent.invoke(&prompt, &shared.session_id);

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => Outcome::Discarded,
        result = tokio::time::timeout(timeout, call) => match result {
            Ok(Ok(invocation)) => Outcome::Completed(invocation.completion),
            Ok(Err(e)) => {
                warn!(session_id = %shared.session_id, send_id, error = %e, code = e.error_code(), "conversation: agent call failed");
                Outcome::Failed(e)
            }
            Err(_) => {
                warn!(
                    session_id = %shared.session_id,
                    send_id,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "conversation: agent call timed out"
                );
                Outcome::TimedOut
            }
        },
    };

    settle(&shared, send_id, outcome)
}

/// Apply an outcome if `send_id` still owns the pending slot.
fn settle(shared: &Shared, send_id: u64, outcome: Outcome) -> Outcome {
    let mut state = shared.lock();
    if state.pending.as_ref().map(|p| p.id) != Some(send_id) {
        debug!(session_id = %shared.session_id, send_id, "conversation: stale outcome dropped");
        return Outcome::Discarded;
    }
    state.pending = None;

    let reply = match &outcome {
        Outcome::Completed(text) => text.clone(),
        Outcome::TimedOut | Outcome::Failed(_) => shared.config.fallback_reply.clone(),
        Outcome::Discarded => {
            shared.publish(&state);
            return outcome;
        }
    };
    state.messages.push(Message::bot(reply));
    shared.publish(&state);

    info!(session_id = %shared.session_id, send_id, messages = state.messages.len(), "conversation: send settled");
    outcome
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
