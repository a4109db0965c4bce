//! Speech Pipeline Contract
//!
//! The full speech-to-text / turn-generation / text-to-speech contract the
//! agent drives per inbound frame. The service ships the null reference
//! implementation; a real backend implements this trait and drops in
//! without changes to the agent or the session registry.

use async_trait::async_trait;
use bytes::Bytes;

use super::{AgentError, Message};

/// The three stages of a conversational turn.
#[async_trait]
pub trait SpeechPipeline: Send + Sync {
    /// Transcribe one inbound audio frame.
    ///
    /// Returns `None` when the frame completes no utterance yet (or, for
    /// the null pipeline, always).
    async fn transcribe(&self, audio: &[u8]) -> Result<Option<String>, AgentError>;

    /// Generate the assistant's reply for the conversation so far.
    async fn complete(&self, history: &[Message]) -> Result<String, AgentError>;

    /// Synthesize speech for the reply text.
    async fn synthesize(&self, text: &str) -> Result<Bytes, AgentError>;
}

/// Reference pipeline: consumes audio, produces nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPipeline;

#[async_trait]
impl SpeechPipeline for NullPipeline {
    async fn transcribe(&self, _audio: &[u8]) -> Result<Option<String>, AgentError> {
        Ok(None)
    }

    async fn complete(&self, _history: &[Message]) -> Result<String, AgentError> {
        Ok(String::new())
    }

    async fn synthesize(&self, _text: &str) -> Result<Bytes, AgentError> {
        Ok(Bytes::new())
    }
}
