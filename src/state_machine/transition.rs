//! Pure state transition function
//!
//! Given the same session and event it always produces the same new session
//! and effects; all I/O happens in the runtime that executes the effects.

use super::state::{ChatMessage, Lifecycle, Phase, Session};
use super::{Effect, Event};
use crate::client::ServerEvent;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Session) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// No mutation, no effects
    pub fn unchanged(state: &Session) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Input is empty")]
    EmptyInput,
    #[error("Session has ended; start a new session for a new query")]
    SessionTerminal,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(session: &Session, event: Event) -> Result<TransitionResult, TransitionError> {
    // Terminal sessions are frozen; stragglers from a closed stream are dropped
    if session.is_terminal() {
        return match event {
            Event::UserSubmit { .. } => Err(TransitionError::SessionTerminal),
            _ => Ok(TransitionResult::unchanged(session)),
        };
    }

    match (&session.lifecycle, event) {
        // ============================================================
        // User input
        // ============================================================
        (_, Event::UserSubmit { text }) => submit(session, text),

        // ============================================================
        // Start request outcome
        // ============================================================
        (Lifecycle::Starting, Event::SessionStarted { session_id }) => {
            let mut next = session.clone();
            next.lifecycle = Lifecycle::Active {
                session_id: session_id.clone(),
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::OpenStream { session_id })
                .with_effect(Effect::NotifyRender))
        }

        (Lifecycle::Starting, Event::StartFailed { reason }) => {
            let mut next = session.clone();
            next.lifecycle = Lifecycle::Failed {
                session_id: None,
                reason,
            };
            Ok(TransitionResult::new(next).with_effect(Effect::NotifyRender))
        }

        // ============================================================
        // Event stream
        // ============================================================
        (Lifecycle::Active { .. }, Event::Server(server_event)) => {
            Ok(apply_server_event(session, server_event))
        }

        // No rollback: phase and content stay as last reported
        (Lifecycle::Active { session_id }, Event::StreamFailed { reason }) => {
            let mut next = session.clone();
            next.lifecycle = Lifecycle::Failed {
                session_id: Some(session_id.clone()),
                reason,
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::CloseStream)
                .with_effect(Effect::NotifyRender))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (lifecycle, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {lifecycle:?} with event {event:?}"
        ))),
    }
}

/// Route one user utterance: start, clarification answer, or ignored
fn submit(session: &Session, text: String) -> Result<TransitionResult, TransitionError> {
    if text.trim().is_empty() {
        return Err(TransitionError::EmptyInput);
    }

    let mut next = session.clone();
    next.messages.push(ChatMessage::user(text.clone()));

    match &session.lifecycle {
        // First query of this session
        Lifecycle::New => {
            next.phase = Phase::Idle;
            next.retrievals.clear();
            next.final_report.clear();
            next.awaiting_clarification = false;
            next.lifecycle = Lifecycle::Starting;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::NotifyRender)
                .with_effect(Effect::StartResearch { query: text }))
        }

        // Answer to the pending question; flag cleared before the request goes out
        Lifecycle::Active { session_id } if session.awaiting_clarification => {
            next.awaiting_clarification = false;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::NotifyRender)
                .with_effect(Effect::AnswerClarification {
                    session_id: session_id.clone(),
                    answer: text,
                }))
        }

        // Busy: still starting, or the pipeline is working without asking anything
        Lifecycle::Starting | Lifecycle::Active { .. } => Ok(TransitionResult::new(next)
            .with_effect(Effect::NotifyRender)
            .with_effect(Effect::InputIgnored { text })),

        Lifecycle::Finished { .. } | Lifecycle::Failed { .. } => {
            Err(TransitionError::SessionTerminal)
        }
    }
}

fn apply_server_event(session: &Session, event: ServerEvent) -> TransitionResult {
    let mut next = session.clone();

    match event {
        ServerEvent::PhaseChanged { phase } => {
            next.phase = phase;
        }
        ServerEvent::RetrievalFinished(retrieval) => {
            next.retrievals.push(retrieval);
        }
        ServerEvent::AssistantChunk { content } => {
            next.push_assistant_chunk(&content);
        }
        ServerEvent::ClarificationPrompt { question } => {
            next.awaiting_clarification = true;
            next.messages.push(ChatMessage::clarification(question));
        }
        ServerEvent::ClarificationAck { .. } => {
            return TransitionResult::unchanged(session);
        }
        ServerEvent::FinalOutput { content } => {
            next.final_report = content;
            if let Lifecycle::Active { session_id } = &session.lifecycle {
                next.lifecycle = Lifecycle::Finished {
                    session_id: session_id.clone(),
                };
            }
            return TransitionResult::new(next)
                .with_effect(Effect::RevealReport)
                .with_effect(Effect::CloseStream)
                .with_effect(Effect::NotifyRender);
        }
    }

    TransitionResult::new(next).with_effect(Effect::NotifyRender)
}
