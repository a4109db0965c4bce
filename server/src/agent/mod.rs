//! Agent Worker
//!
//! Stateful per-room conversational entity with an explicit
//! start / process / stop lifecycle. Inbound audio frames flow in from the
//! room's track loop; any response frames flow back out through the room's
//! audio source.

pub mod pipeline;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use pipeline::{NullPipeline, SpeechPipeline};

/// A single conversation turn.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Who produced the turn.
    pub role: Role,
    /// Turn text.
    pub content: String,
}

impl Message {
    /// System message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Errors from the speech pipeline stages.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Speech-to-text failure.
    #[error("Transcription failed: {0}")]
    Transcription(String),

    /// Turn-generation failure.
    #[error("Completion failed: {0}")]
    Completion(String),

    /// Text-to-speech failure.
    #[error("Synthesis failed: {0}")]
    Synthesis(String),
}

/// Per-room conversational agent.
///
/// The conversation context is an ordered message sequence whose first
/// entry is always the system prompt, seeded on `start`.
pub struct VoiceAgent {
    system_prompt: String,
    running: AtomicBool,
    history: Mutex<Vec<Message>>,
    pipeline: Arc<dyn SpeechPipeline>,
}

impl VoiceAgent {
    /// Create an agent with the given system prompt and pipeline.
    #[must_use]
    pub fn new(system_prompt: impl Into<String>, pipeline: Arc<dyn SpeechPipeline>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            running: AtomicBool::new(false),
            history: Mutex::new(Vec::new()),
            pipeline,
        }
    }

    /// Start the agent, seeding the conversation context.
    ///
    /// Idempotent: a second start leaves an already-running agent (and its
    /// context) untouched.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut history = self.history.lock().await;
        *history = vec![Message::system(self.system_prompt.clone())];
        info!("Voice agent started");
    }

    /// Process one inbound audio frame, possibly producing a response frame.
    ///
    /// Safe to call repeatedly at track cadence. Returns `Ok(None)` while
    /// the agent is not running or when the pipeline has no response for
    /// this frame.
    pub async fn process_audio(&self, frame: &[u8]) -> Result<Option<Bytes>, AgentError> {
        if !self.running.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let Some(text) = self.pipeline.transcribe(frame).await? else {
            return Ok(None);
        };
        debug!(utterance = %text, "Transcribed inbound audio");

        let reply = {
            let mut history = self.history.lock().await;
            history.push(Message::user(text));
            let reply = self.pipeline.complete(&history).await?;
            history.push(Message::assistant(reply.clone()));
            reply
        };

        let audio = self.pipeline.synthesize(&reply).await?;
        Ok(Some(audio))
    }

    /// Stop the agent. Idempotent.
    pub async fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Voice agent stopped");
        }
    }

    /// Whether the agent is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the conversation context.
    pub async fn history(&self) -> Vec<Message> {
        self.history.lock().await.clone()
    }

    /// The agent's system prompt.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}
