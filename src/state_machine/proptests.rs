//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::client::ServerEvent;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn session_id() -> SessionId {
    SessionId::new("abc").unwrap()
}

fn active_session() -> Session {
    Session {
        lifecycle: Lifecycle::Active {
            session_id: session_id(),
        },
        ..Session::default()
    }
}

/// Apply events, skipping rejected ones, and collect every effect produced
fn run(mut session: Session, events: Vec<Event>) -> (Session, Vec<Effect>) {
    let mut effects = Vec::new();
    for event in events {
        if let Ok(result) = transition(&session, event) {
            session = result.new_state;
            effects.extend(result.effects);
        }
    }
    (session, effects)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_phase() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::Idle),
        Just(Phase::Clarifying),
        Just(Phase::Retrieving),
        Just(Phase::Drafting),
        Just(Phase::Done),
        "[a-z]{3,10}".prop_map(Phase::from),
    ]
}

fn arb_chunk() -> impl Strategy<Value = String> {
    "[a-zA-Z .,]{0,12}"
}

/// Server events that never end the session
fn arb_non_terminal_server_event() -> impl Strategy<Value = ServerEvent> {
    prop_oneof![
        arb_phase().prop_map(|phase| ServerEvent::PhaseChanged { phase }),
        "[a-zA-Z ]{1,20}".prop_map(|t| ServerEvent::RetrievalFinished(Retrieval::titled(t))),
        arb_chunk().prop_map(|content| ServerEvent::AssistantChunk { content }),
        "[a-zA-Z ?]{1,20}".prop_map(|question| ServerEvent::ClarificationPrompt { question }),
        proptest::option::of("[a-z]{1,8}").prop_map(|answer| ServerEvent::ClarificationAck { answer }),
    ]
}

/// Chunks and events that must not break a chunk merge
fn arb_merge_neutral_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_chunk().prop_map(|content| Event::Server(ServerEvent::AssistantChunk { content })),
        arb_phase().prop_map(|phase| Event::Server(ServerEvent::PhaseChanged { phase })),
        "[a-zA-Z ]{1,20}"
            .prop_map(|t| Event::Server(ServerEvent::RetrievalFinished(Retrieval::titled(t)))),
        Just(Event::Server(ServerEvent::ClarificationAck { answer: None })),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        4 => "[a-z ]{0,10}".prop_map(Event::submit),
        1 => Just(Event::SessionStarted { session_id: session_id() }),
        1 => "[a-z]{1,10}".prop_map(|reason| Event::StartFailed { reason }),
        6 => arb_non_terminal_server_event().prop_map(Event::Server),
        1 => "[a-zA-Z#]{0,10}".prop_map(|content| Event::Server(ServerEvent::FinalOutput { content })),
        1 => "[a-z]{1,10}".prop_map(|reason| Event::StreamFailed { reason }),
    ]
}

fn count_starts(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::StartResearch { .. }))
        .count()
}

fn count_opens(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::OpenStream { .. }))
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Consecutive chunks build one message equal to their concatenation
    #[test]
    fn prop_chunks_concatenate(events in proptest::collection::vec(arb_merge_neutral_event(), 1..30)) {
        let expected: String = events
            .iter()
            .filter_map(|e| match e {
                Event::Server(ServerEvent::AssistantChunk { content }) => Some(content.as_str()),
                _ => None,
            })
            .collect();
        let has_chunk = events
            .iter()
            .any(|e| matches!(e, Event::Server(ServerEvent::AssistantChunk { .. })));

        let (session, _) = run(active_session(), events);

        if has_chunk {
            prop_assert_eq!(session.messages.len(), 1);
            prop_assert_eq!(&session.messages[0].content, &expected);
        } else {
            prop_assert!(session.messages.is_empty());
        }
    }

    // A clarification question is never merged into, in either direction
    #[test]
    fn prop_clarification_is_its_own_message(
        before in proptest::collection::vec(arb_non_terminal_server_event(), 0..10),
        question in "[a-zA-Z ?]{1,20}",
        after in arb_chunk(),
    ) {
        let mut events: Vec<Event> = before.into_iter().map(Event::Server).collect();
        events.push(Event::Server(ServerEvent::ClarificationPrompt { question: question.clone() }));
        let (session, _) = run(active_session(), events);

        let asked = session.messages.last().unwrap().clone();
        prop_assert_eq!(&asked.content, &question);
        prop_assert!(asked.clarification);
        prop_assert!(session.awaiting_clarification);

        let (session, _) = run(
            session,
            vec![Event::Server(ServerEvent::AssistantChunk { content: after.clone() })],
        );
        let n = session.messages.len();
        prop_assert_eq!(&session.messages[n - 2].content, &question);
        prop_assert_eq!(&session.messages[n - 1].content, &after);
    }

    // However the user hammers submit, one start request and one stream per session
    #[test]
    fn prop_at_most_one_start_and_stream(events in proptest::collection::vec(arb_event(), 0..40)) {
        let (_, effects) = run(Session::new(), events);
        prop_assert!(count_starts(&effects) <= 1);
        prop_assert!(count_opens(&effects) <= 1);
        prop_assert!(count_opens(&effects) <= count_starts(&effects));
    }

    // Branch A runs once even with many submits before the response
    #[test]
    fn prop_submits_before_response_start_once(texts in proptest::collection::vec("[a-z]{1,8}", 1..8)) {
        let mut events: Vec<Event> = texts.iter().cloned().map(Event::submit).collect();
        events.push(Event::SessionStarted { session_id: session_id() });
        let (session, effects) = run(Session::new(), events);

        prop_assert_eq!(count_starts(&effects), 1);
        prop_assert_eq!(count_opens(&effects), 1);
        prop_assert_eq!(session.session_id(), Some(&session_id()));
        // every utterance was recorded
        prop_assert_eq!(session.messages.len(), texts.len());
    }

    // Busy input is recorded but never reaches the network
    #[test]
    fn prop_busy_submit_sends_nothing(
        setup in proptest::collection::vec(arb_merge_neutral_event(), 0..10),
        text in "[a-z]{1,10}",
    ) {
        let (session, _) = run(active_session(), setup);
        prop_assume!(session.is_busy());

        let before = session.messages.len();
        let result = transition(&session, Event::submit(text.clone())).unwrap();

        prop_assert!(!result.effects.iter().any(Effect::is_network_request));
        prop_assert_eq!(result.new_state.messages.len(), before + 1);
        prop_assert_eq!(&result.new_state.messages[before], &ChatMessage::user(text));
    }

    // Answering a clarification never restarts the session
    #[test]
    fn prop_answer_never_restarts(
        question in "[a-zA-Z ?]{1,20}",
        answer in "[a-z]{1,10}",
    ) {
        let (session, _) = run(
            active_session(),
            vec![Event::Server(ServerEvent::ClarificationPrompt { question })],
        );
        let result = transition(&session, Event::submit(answer.clone())).unwrap();

        prop_assert!(!result.new_state.awaiting_clarification);
        prop_assert_eq!(count_starts(&result.effects), 0);
        prop_assert_eq!(
            result.effects.iter().filter(|e| matches!(e, Effect::AnswerClarification { .. })).count(),
            1
        );
        let sent_answer = result.effects.iter().any(|e| matches!(
            e,
            Effect::AnswerClarification { answer: a, .. } if *a == answer
        ));
        prop_assert!(sent_answer);
    }

    // Once the report lands, nothing changes the session again
    #[test]
    fn prop_finished_session_is_frozen(
        report in "[a-zA-Z#]{1,20}",
        later in proptest::collection::vec(arb_event(), 0..20),
    ) {
        let (finished, effects) = run(
            active_session(),
            vec![Event::Server(ServerEvent::FinalOutput { content: report.clone() })],
        );
        prop_assert!(effects.contains(&Effect::CloseStream));
        prop_assert!(finished.is_terminal());

        for event in later {
            match transition(&finished, event) {
                Ok(result) => {
                    prop_assert_eq!(&result.new_state, &finished);
                    prop_assert!(result.effects.is_empty());
                }
                Err(e) => prop_assert_eq!(e, TransitionError::SessionTerminal),
            }
        }
        prop_assert_eq!(&finished.final_report, &report);
    }

    // Structural invariants hold after any sequence
    #[test]
    fn prop_invariants_hold(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut session = Session::new();
        for event in events {
            let Ok(result) = transition(&session, event) else { continue };
            let next = result.new_state;

            // append-only logs
            prop_assert!(next.retrievals.len() >= session.retrievals.len());
            prop_assert_eq!(&next.retrievals[..session.retrievals.len()], &session.retrievals[..]);
            prop_assert!(next.messages.len() >= session.messages.len());

            // only the trailing assistant message may grow in place
            let shared = session.messages.len().saturating_sub(1);
            prop_assert_eq!(&next.messages[..shared], &session.messages[..shared]);

            // the id is immutable once assigned
            if let Some(id) = session.session_id() {
                prop_assert_eq!(next.session_id(), Some(id));
            }

            // waiting on the user implies a live session
            if next.awaiting_clarification {
                let is_active = matches!(next.lifecycle, Lifecycle::Active { .. });
                prop_assert!(is_active || next.is_terminal());
            }

            // a report means the stream is done
            if !next.final_report.is_empty() {
                let is_finished = matches!(next.lifecycle, Lifecycle::Finished { .. });
                prop_assert!(is_finished);
            }

            session = next;
        }
    }
}

// Scenario from a typical clarify → retrieve → draft run
#[test]
fn test_full_research_scenario() {
    let mut session = Session::new();
    let mut effects = Vec::new();
    let mut step = |session: &mut Session, event: Event| {
        let result = transition(session, event).unwrap();
        *session = result.new_state;
        effects.extend(result.effects);
    };

    step(&mut session, Event::submit("what is X"));
    step(&mut session, Event::SessionStarted { session_id: session_id() });
    step(
        &mut session,
        Event::Server(ServerEvent::PhaseChanged { phase: Phase::Idle }),
    );
    step(
        &mut session,
        Event::Server(ServerEvent::ClarificationPrompt {
            question: "Which X do you mean?".to_string(),
        }),
    );
    assert!(session.awaiting_clarification);

    step(&mut session, Event::submit("the first one"));
    assert!(!session.awaiting_clarification);

    step(
        &mut session,
        Event::Server(ServerEvent::AssistantChunk {
            content: "The ".to_string(),
        }),
    );
    step(
        &mut session,
        Event::Server(ServerEvent::AssistantChunk {
            content: "answer is...".to_string(),
        }),
    );
    assert_eq!(session.messages.last().unwrap().content, "The answer is...");

    step(
        &mut session,
        Event::Server(ServerEvent::FinalOutput {
            content: "# Report".to_string(),
        }),
    );
    assert_eq!(session.final_report, "# Report");
    assert!(session.is_terminal());

    assert_eq!(
        effects
            .iter()
            .filter(|e| e.is_network_request())
            .cloned()
            .collect::<Vec<_>>(),
        vec![
            Effect::StartResearch {
                query: "what is X".to_string()
            },
            Effect::OpenStream {
                session_id: session_id()
            },
            Effect::AnswerClarification {
                session_id: session_id(),
                answer: "the first one".to_string(),
            },
        ]
    );
    assert!(effects.contains(&Effect::CloseStream));

    let roles: Vec<Role> = session.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
}
