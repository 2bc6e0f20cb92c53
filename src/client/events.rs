//! Typed server-push events
//!
//! Every frame carries a JSON envelope `{"type": <name>, "payload": {...}}`.
//! The frame's `event:` name selects the payload shape; frames without one
//! fall back to the envelope's `type`.

use super::sse::SseFrame;
use crate::state_machine::state::{Phase, Retrieval};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Events the research server pushes over the session stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    PhaseChanged { phase: Phase },
    RetrievalFinished(Retrieval),
    AssistantChunk { content: String },
    ClarificationPrompt { question: String },
    /// Server confirms it queued a clarification answer
    ClarificationAck { answer: Option<String> },
    /// Terminal report; the stream ends after it
    FinalOutput { content: String },
}

impl ServerEvent {
    pub const PHASE_CHANGED: &'static str = "phase_changed";
    pub const RETRIEVAL_FINISHED: &'static str = "retrieval_finished";
    pub const ASSISTANT_CHUNK: &'static str = "assistant_chunk";
    pub const CLARIFICATION_PROMPT: &'static str = "clarification_prompt";
    pub const CLARIFICATION_ACK: &'static str = "clarification_ack";
    pub const FINAL_OUTPUT: &'static str = "final_output";

    const KNOWN: [&'static str; 6] = [
        Self::PHASE_CHANGED,
        Self::RETRIEVAL_FINISHED,
        Self::ASSISTANT_CHUNK,
        Self::CLARIFICATION_PROMPT,
        Self::CLARIFICATION_ACK,
        Self::FINAL_OUTPUT,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::PhaseChanged { .. } => Self::PHASE_CHANGED,
            ServerEvent::RetrievalFinished(_) => Self::RETRIEVAL_FINISHED,
            ServerEvent::AssistantChunk { .. } => Self::ASSISTANT_CHUNK,
            ServerEvent::ClarificationPrompt { .. } => Self::CLARIFICATION_PROMPT,
            ServerEvent::ClarificationAck { .. } => Self::CLARIFICATION_ACK,
            ServerEvent::FinalOutput { .. } => Self::FINAL_OUTPUT,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerEvent::FinalOutput { .. })
    }

    /// Decode one SSE frame.
    ///
    /// Returns `Ok(None)` for event names this client does not know, so the
    /// stream can keep going when the server adds new kinds.
    pub fn from_frame(frame: &SseFrame) -> Result<Option<Self>, DecodeError> {
        if let Some(name) = frame.event.as_deref() {
            if !Self::KNOWN.contains(&name) {
                return Ok(None);
            }
        }

        let envelope: Envelope =
            serde_json::from_str(&frame.data).map_err(|e| DecodeError::Json {
                event: frame.event.clone(),
                message: e.to_string(),
            })?;

        let Some(name) = frame.event.as_deref().or(envelope.kind.as_deref()) else {
            return Err(DecodeError::MissingName);
        };

        Self::from_payload(name, envelope.payload)
    }

    fn from_payload(name: &str, payload: Value) -> Result<Option<Self>, DecodeError> {
        let event = match name {
            Self::PHASE_CHANGED => {
                let p: PhasePayload = parse(name, payload)?;
                ServerEvent::PhaseChanged { phase: p.phase }
            }
            Self::RETRIEVAL_FINISHED => ServerEvent::RetrievalFinished(parse(name, payload)?),
            Self::ASSISTANT_CHUNK => {
                let p: ContentPayload = parse(name, payload)?;
                ServerEvent::AssistantChunk { content: p.content }
            }
            Self::CLARIFICATION_PROMPT => {
                let p: QuestionPayload = parse(name, payload)?;
                ServerEvent::ClarificationPrompt { question: p.question }
            }
            Self::CLARIFICATION_ACK => {
                let p: AckPayload = parse(name, payload)?;
                ServerEvent::ClarificationAck { answer: p.answer }
            }
            Self::FINAL_OUTPUT => {
                let p: ContentPayload = parse(name, payload)?;
                ServerEvent::FinalOutput { content: p.content }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// A frame for a known event kind that could not be decoded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid JSON in {} frame: {message}", .event.as_deref().unwrap_or("unnamed"))]
    Json {
        event: Option<String>,
        message: String,
    },
    #[error("invalid {event} payload: {message}")]
    Payload { event: String, message: String },
    #[error("frame has neither an event name nor an envelope type")]
    MissingName,
}

fn parse<T: DeserializeOwned>(name: &str, payload: Value) -> Result<T, DecodeError> {
    serde_json::from_value(payload).map_err(|e| DecodeError::Payload {
        event: name.to_string(),
        message: e.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct PhasePayload {
    phase: Phase,
}

#[derive(Debug, Deserialize)]
struct ContentPayload {
    content: String,
}

#[derive(Debug, Deserialize)]
struct QuestionPayload {
    question: String,
}

#[derive(Debug, Deserialize)]
struct AckPayload {
    #[serde(default)]
    answer: Option<String>,
}
