//! Completion assembly — UTF-8 decoding of chunk bytes in arrival order.
//!
//! A multi-byte character may straddle two chunks, so an incomplete trailing
//! sequence is held back and completed by the next chunk. Bytes that can never
//! form valid UTF-8 are an error.

use super::types::AgentError;

#[derive(Debug, Default)]
pub struct CompletionBuilder {
    text: String,
    pending: Vec<u8>,
    chunks: usize,
}

impl CompletionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Decode`] if the bytes are not valid UTF-8.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), AgentError> {
        self.chunks += 1;
        self.pending.extend_from_slice(bytes);

        match std::str::from_utf8(&self.pending) {
            Ok(s) => {
                self.text.push_str(s);
                self.pending.clear();
            }
            Err(e) if e.error_len().is_none() => {
                // Incomplete trailing sequence: keep the tail for the next chunk.
                let valid = e.valid_up_to();
                let (head, _) = self.pending.split_at(valid);
                self.text.push_str(std::str::from_utf8(head).unwrap_or_default());
                self.pending.drain(..valid);
            }
            Err(e) => {
                return Err(AgentError::Decode(format!("chunk {} is not valid UTF-8: {e}", self.chunks)));
            }
        }
        Ok(())
    }

    /// Number of chunks pushed so far.
    #[must_use]
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Finish assembly.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Decode`] if the stream ended mid-character.
    pub fn finish(self) -> Result<String, AgentError> {
        if !self.pending.is_empty() {
            return Err(AgentError::Decode(format!(
                "completion ended with {} bytes of an incomplete UTF-8 sequence",
                self.pending.len()
            )));
        }
        Ok(self.text)
    }
}

#[cfg(test)]
#[path = "completion_test.rs"]
mod tests;
