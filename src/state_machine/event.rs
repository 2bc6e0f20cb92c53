//! Events that can occur in a research session

use crate::client::ServerEvent;
use crate::state_machine::state::SessionId;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserSubmit {
        text: String,
    },

    // Start request outcome
    SessionStarted {
        session_id: SessionId,
    },
    StartFailed {
        reason: String,
    },

    // Event stream
    Server(ServerEvent),
    StreamFailed {
        reason: String,
    },
}

impl Event {
    pub fn submit(text: impl Into<String>) -> Self {
        Event::UserSubmit { text: text.into() }
    }
}
