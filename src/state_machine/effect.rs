//! Effects produced by state transitions

use crate::state_machine::state::SessionId;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue the start request for a new session
    StartResearch { query: String },

    /// Send the user's answer to the pending clarification question
    AnswerClarification {
        session_id: SessionId,
        answer: String,
    },

    /// Open the event stream for a freshly started session
    OpenStream { session_id: SessionId },

    /// Close the event stream
    CloseStream,

    /// Tell the render sink the session changed
    NotifyRender,

    /// Tell the render sink to show the final report
    RevealReport,

    /// Input was recorded but nothing was sent because the pipeline is busy
    InputIgnored { text: String },
}

impl Effect {
    #[allow(dead_code)] // used in tests
    pub fn is_network_request(&self) -> bool {
        matches!(
            self,
            Effect::StartResearch { .. }
                | Effect::AnswerClarification { .. }
                | Effect::OpenStream { .. }
        )
    }
}
