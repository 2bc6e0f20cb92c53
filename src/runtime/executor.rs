//! Session runtime executor

use super::traits::{RenderSink, ResearchApi};
use crate::client::{EventStreamReader, ServerEvent};
use crate::state_machine::{transition, Effect, Event, Lifecycle, Session, TransitionError};
use std::sync::Arc;
use tokio::sync::mpsc;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Drives one research session: applies user input and server events
/// through the state machine and executes the resulting effects.
///
/// All session mutation happens on the task that owns the runtime. Network
/// calls run on spawned tasks and report back through the event channel.
pub struct SessionRuntime<A, R>
where
    A: ResearchApi + 'static,
    R: RenderSink,
{
    session: Session,
    api: Arc<A>,
    sink: R,
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    /// The one live stream of this session, if open
    reader: Option<EventStreamReader>,
}

impl<A, R> SessionRuntime<A, R>
where
    A: ResearchApi + 'static,
    R: RenderSink,
{
    pub fn new(api: A, sink: R) -> Self {
        Self::with_shared_api(Arc::new(api), sink)
    }

    pub fn with_shared_api(api: Arc<A>, sink: R) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            session: Session::new(),
            api,
            sink,
            event_tx,
            event_rx,
            reader: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stream_open(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| !r.is_closed())
    }

    /// Handle one line of user input
    #[allow(dead_code)] // used in tests
    pub fn submit(&mut self, text: impl Into<String>) -> Result<(), TransitionError> {
        self.process_event(Event::submit(text))
    }

    /// Run until the session is terminal, or until input ends before any query was sent.
    /// Returns the final session.
    pub async fn run(mut self, mut input_rx: mpsc::Receiver<String>) -> Session {
        tracing::info!("Starting research session runtime");
        let mut input_open = true;

        loop {
            tokio::select! {
                Some(event) = self.event_rx.recv() => {
                    let _ = self.process_event(event);
                }
                text = input_rx.recv(), if input_open => match text {
                    Some(text) => {
                        let _ = self.process_event(Event::UserSubmit { text });
                    }
                    None => {
                        tracing::debug!("User input closed");
                        input_open = false;
                    }
                },
                else => break,
            }

            if self.session.is_terminal() {
                break;
            }
            if !input_open && self.session.lifecycle == Lifecycle::New {
                break;
            }
        }

        self.close_stream();
        tracing::info!(
            session_id = self.session.session_id().map_or("-", |id| id.as_str()),
            "Research session runtime stopped"
        );
        self.session
    }

    /// Wait for the next network outcome or stream event and apply it
    #[allow(dead_code)] // used in tests
    pub async fn step(&mut self) -> Option<Result<(), TransitionError>> {
        let event = self.event_rx.recv().await?;
        Some(self.process_event(event))
    }

    pub fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        if let Event::Server(server_event) = &event {
            log_server_event(server_event);
        }

        let result = match transition(&self.session, event) {
            Ok(r) => r,
            Err(e) => {
                match &e {
                    TransitionError::EmptyInput => tracing::debug!("Ignoring empty input"),
                    TransitionError::SessionTerminal => {
                        tracing::warn!(error = %e, "Input rejected");
                    }
                    TransitionError::InvalidTransition(_) => {
                        tracing::error!(error = %e, "Error handling event");
                    }
                }
                return Err(e);
            }
        };

        self.session = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::StartResearch { query } => {
                let api = Arc::clone(&self.api);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let event = match api.start(&query).await {
                        Ok(response) => Event::SessionStarted {
                            session_id: response.session_id,
                        },
                        Err(e) => {
                            tracing::error!(error = %e, kind = ?e.kind, "Failed to start research");
                            Event::StartFailed {
                                reason: e.to_string(),
                            }
                        }
                    };
                    let _ = tx.send(event).await;
                });
            }

            Effect::AnswerClarification { session_id, answer } => {
                let api = Arc::clone(&self.api);
                tokio::spawn(async move {
                    match api.answer_clarification(&session_id, &answer).await {
                        Ok(()) => tracing::debug!(session_id = %session_id, "Clarification answer sent"),
                        Err(e) => tracing::warn!(
                            session_id = %session_id,
                            error = %e,
                            "Failed to send clarification answer"
                        ),
                    }
                });
            }

            Effect::OpenStream { session_id } => {
                if self.stream_open() {
                    tracing::warn!(session_id = %session_id, "Event stream already open");
                    return;
                }
                tracing::info!(session_id = %session_id, "Opening event stream");
                self.reader = Some(EventStreamReader::open(
                    Arc::clone(&self.api),
                    session_id,
                    self.event_tx.clone(),
                ));
            }

            Effect::CloseStream => self.close_stream(),

            Effect::NotifyRender => self.sink.state_changed(&self.session),

            Effect::RevealReport => self.sink.reveal_report(&self.session.final_report),

            Effect::InputIgnored { text } => {
                tracing::warn!(phase = %self.session.phase, "Research in progress, input ignored");
                self.sink.input_ignored(&text);
            }
        }
    }

    fn close_stream(&mut self) {
        if let Some(reader) = self.reader.take() {
            tracing::debug!(session_id = %reader.session_id(), "Closing event stream");
            reader.close();
        }
    }
}

fn log_server_event(event: &ServerEvent) {
    match event {
        ServerEvent::ClarificationAck { answer } => {
            tracing::debug!(answer = answer.as_deref().unwrap_or(""), "Clarification acknowledged");
        }
        ServerEvent::PhaseChanged { phase } => {
            tracing::info!(phase = %phase, "Phase changed");
        }
        other => tracing::debug!(event = other.name(), "Server event"),
    }
}
