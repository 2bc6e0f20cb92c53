//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runtime with mock implementations.

use crate::client::{ApiError, ServerEvent};
use crate::state_machine::state::{Session, SessionId};
use async_trait::async_trait;
use futures::stream::Stream;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;

/// Decoded server events for one session, in arrival order
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ServerEvent, ApiError>> + Send>>;

/// Body of a successful start request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartResponse {
    pub session_id: SessionId,
    /// Informational pipeline status the server reports on start
    #[serde(default)]
    pub status: Option<String>,
}

/// Outbound calls to the research server
#[async_trait]
pub trait ResearchApi: Send + Sync {
    /// Start a new research session for `query`
    async fn start(&self, query: &str) -> Result<StartResponse, ApiError>;

    /// Answer the pending clarification question
    async fn answer_clarification(
        &self,
        session_id: &SessionId,
        answer: &str,
    ) -> Result<(), ApiError>;

    /// Open the server-push channel for a session
    async fn subscribe(&self, session_id: &SessionId) -> Result<EventStream, ApiError>;
}

/// Observer notified after every session mutation
pub trait RenderSink: Send {
    fn state_changed(&mut self, session: &Session);

    /// The final report arrived and should be shown
    fn reveal_report(&mut self, _report: &str) {}

    /// User input was recorded but not sent because the pipeline is busy
    fn input_ignored(&mut self, _text: &str) {}
}

// ============================================================================
// Arc / Box implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ResearchApi + ?Sized> ResearchApi for Arc<T> {
    async fn start(&self, query: &str) -> Result<StartResponse, ApiError> {
        (**self).start(query).await
    }

    async fn answer_clarification(
        &self,
        session_id: &SessionId,
        answer: &str,
    ) -> Result<(), ApiError> {
        (**self).answer_clarification(session_id, answer).await
    }

    async fn subscribe(&self, session_id: &SessionId) -> Result<EventStream, ApiError> {
        (**self).subscribe(session_id).await
    }
}

impl<T: RenderSink + ?Sized> RenderSink for Box<T> {
    fn state_changed(&mut self, session: &Session) {
        (**self).state_changed(session);
    }

    fn reveal_report(&mut self, report: &str) {
        (**self).reveal_report(report);
    }

    fn input_ignored(&mut self, text: &str) {
        (**self).input_ignored(text);
    }
}
