//! Research session state types

use serde::Deserialize;
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Server-issued session identifier, never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Returns `None` for empty or whitespace-only ids
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "session id must not be empty".to_string())
    }
}

// ============================================================================
// Phase
// ============================================================================

/// Coarse pipeline stage as reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum Phase {
    #[default]
    Idle,
    Clarifying,
    Retrieving,
    Drafting,
    Done,
    /// A stage name this client does not know yet
    Other(String),
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Phase::Idle => "idle",
            Phase::Clarifying => "clarifying",
            Phase::Retrieving => "retrieving",
            Phase::Drafting => "drafting",
            Phase::Done => "done",
            Phase::Other(name) => name,
        }
    }
}

impl From<String> for Phase {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "idle" => Phase::Idle,
            "clarify" | "clarifying" | "clarification" => Phase::Clarifying,
            "retrieve" | "retrieving" => Phase::Retrieving,
            "draft" | "drafting" | "write" | "writing" => Phase::Drafting,
            "done" | "finished" | "complete" => Phase::Done,
            _ => Phase::Other(value),
        }
    }
}

impl From<&str> for Phase {
    fn from(value: &str) -> Self {
        Phase::from(value.to_string())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Conversation content
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One bubble in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Clarification questions are sealed: streamed chunks never merge into them
    pub clarification: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            clarification: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            clarification: false,
        }
    }

    pub fn clarification(question: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: question.into(),
            clarification: true,
        }
    }

    /// Whether an incoming assistant chunk may be appended to this message
    pub fn accepts_chunks(&self) -> bool {
        self.role == Role::Assistant && !self.clarification
    }
}

/// A document the pipeline consulted
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Retrieval {
    pub title: String,
    /// Source database, e.g. `PubMed`
    #[serde(default)]
    pub source: Option<String>,
    /// Sub-goal of the research plan this retrieval served
    #[serde(default)]
    pub sub_goal_id: Option<String>,
}

impl Retrieval {
    #[allow(dead_code)] // used in tests
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: None,
            sub_goal_id: None,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Where a session is in its one-way life
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// No query submitted yet
    #[default]
    New,
    /// Start request in flight; the id is not known yet
    Starting,
    /// Server accepted the query and the event stream is (being) opened
    Active { session_id: SessionId },
    /// Final report received (terminal)
    Finished { session_id: SessionId },
    /// Start or stream failed (terminal)
    Failed {
        session_id: Option<SessionId>,
        reason: String,
    },
}

/// One research conversation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub lifecycle: Lifecycle,
    pub phase: Phase,
    pub awaiting_clarification: bool,
    pub messages: Vec<ChatMessage>,
    pub retrievals: Vec<Retrieval>,
    pub final_report: String,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match &self.lifecycle {
            Lifecycle::Active { session_id } | Lifecycle::Finished { session_id } => {
                Some(session_id)
            }
            Lifecycle::Failed { session_id, .. } => session_id.as_ref(),
            Lifecycle::New | Lifecycle::Starting => None,
        }
    }

    /// Frozen: no further events or submissions are applied
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.lifecycle,
            Lifecycle::Finished { .. } | Lifecycle::Failed { .. }
        )
    }

    /// Pipeline is running and not asking the user anything
    #[allow(dead_code)] // used in tests
    pub fn is_busy(&self) -> bool {
        match self.lifecycle {
            Lifecycle::Starting => true,
            Lifecycle::Active { .. } => !self.awaiting_clarification,
            _ => false,
        }
    }

    pub(crate) fn push_assistant_chunk(&mut self, chunk: &str) {
        match self.messages.last_mut() {
            Some(last) if last.accepts_chunks() => last.content.push_str(chunk),
            _ => self.messages.push(ChatMessage::assistant(chunk)),
        }
    }
}
