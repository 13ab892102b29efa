use pulse_session::engine::score::{MAX_SCORE, MIN_CORRECT_SCORE};
use pulse_session::engine::{ClientIdentity, Coordinator, DenyListFilter, SessionError};
use pulse_session::model::{
    Aggregate, ConnectionId, CorrectAnswer, ErrorCode, Question, QuestionKind, QuestionSettings,
    ResponsePayload, ServerEvent, Session, SessionMode,
};
use pulse_session::registry::SessionRegistry;
use pulse_session::storage::{MemoryStore, SessionStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

struct Harness {
    coordinator: Arc<Coordinator>,
    store: Arc<MemoryStore>,
    session: Session,
}

struct Client {
    identity: ClientIdentity,
    connection_id: ConnectionId,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Client {
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Harness {
    async fn new(mode: SessionMode) -> Self {
        let store = Arc::new(MemoryStore::new());
        let session = store.create_session(mode, u64::MAX).await.unwrap();
        let coordinator = Arc::new(Coordinator::new(
            store.clone(),
            Arc::new(SessionRegistry::new()),
            Arc::new(DenyListFilter::new(vec!["slur".to_string()])),
        ));
        Harness {
            coordinator,
            store,
            session,
        }
    }

    async fn add_question(&self, question: Question) -> Question {
        self.store.add_question(question).await.unwrap()
    }

    async fn join(&self, nickname: &str) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        let (identity, _ack) = self
            .coordinator
            .join_participant(&self.session.code, nickname, nickname, connection_id, tx)
            .await
            .unwrap();
        Client {
            identity,
            connection_id,
            rx,
        }
    }

    async fn presenter(&self) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        let (identity, _ack) = self
            .coordinator
            .join_presenter(&self.session.code, connection_id, tx)
            .await
            .unwrap();
        Client {
            identity,
            connection_id,
            rx,
        }
    }

    async fn activate(&self, presenter: &Client, question: &Question) {
        self.coordinator
            .activate_question(&presenter.identity, question.id)
            .await
            .unwrap();
    }

    async fn submit(
        &self,
        client: &Client,
        question: &Question,
        payload: ResponsePayload,
    ) -> Result<(), SessionError> {
        self.coordinator
            .submit_response(&client.identity, client.connection_id, question.id, payload)
            .await
    }
}

fn poll_question(harness: &Harness, position: u32) -> Question {
    Question::new(
        harness.session.id,
        QuestionKind::Poll,
        "Lunch?".to_string(),
        position,
    )
    .with_options(vec!["pizza".to_string(), "sushi".to_string()])
}

fn acks(events: &[ServerEvent]) -> Vec<(bool, Option<bool>, Option<i64>)> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::ResponseSubmitted {
                duplicate,
                is_correct,
                score,
                ..
            } => Some((*duplicate, *is_correct, *score)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn activating_b_deactivates_a() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let a = harness.add_question(poll_question(&harness, 0)).await;
    let b = harness.add_question(poll_question(&harness, 1)).await;
    let presenter = harness.presenter().await;

    harness.activate(&presenter, &a).await;
    harness.activate(&presenter, &b).await;

    let a = harness.store.question_by_id(a.id).await.unwrap().unwrap();
    let b = harness.store.question_by_id(b.id).await.unwrap().unwrap();
    assert!(!a.is_active);
    assert!(b.is_active);
    let active = harness
        .store
        .active_question(harness.session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, b.id);
}

#[tokio::test]
async fn participants_cannot_drive_the_lifecycle() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness.add_question(poll_question(&harness, 0)).await;
    let participant = harness.join("Alice").await;
    let mut presenter = harness.presenter().await;

    let err = harness
        .coordinator
        .activate_question(&participant.identity, question.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);

    // Rejected silently from everyone else's perspective: no broadcast.
    assert!(presenter.drain().is_empty());
}

#[tokio::test]
async fn unknown_question_produces_no_broadcast() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let mut presenter = harness.presenter().await;

    let err = harness
        .coordinator
        .activate_question(&presenter.identity, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::QuestionNotFound(_)));
    assert!(presenter.drain().is_empty());
}

#[tokio::test]
async fn twenty_concurrent_submissions_store_exactly_one() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness.add_question(poll_question(&harness, 0)).await;
    let presenter = harness.presenter().await;
    let mut alice = harness.join("Alice").await;
    harness.activate(&presenter, &question).await;
    alice.drain();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let coordinator = harness.coordinator.clone();
        let identity = alice.identity;
        let connection_id = alice.connection_id;
        let question_id = question.id;
        handles.push(tokio::spawn(async move {
            coordinator
                .submit_response(
                    &identity,
                    connection_id,
                    question_id,
                    ResponsePayload::OptionIndex { index: 0 },
                )
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let events = alice.drain();
    let acks = acks(&events);
    assert_eq!(acks.len(), 20);
    assert_eq!(acks.iter().filter(|(dup, _, _)| !dup).count(), 1);
    assert_eq!(acks.iter().filter(|(dup, _, _)| *dup).count(), 19);
    assert_eq!(harness.store.response_count(question.id).await.unwrap(), 1);

    // The count never decreases and is broadcast exactly once.
    let counts: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::ResponseCountUpdated { count, .. } => Some(*count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![1]);
}

#[tokio::test]
async fn locking_rejects_submissions_until_unlocked() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness.add_question(poll_question(&harness, 0)).await;
    let presenter = harness.presenter().await;
    let mut alice = harness.join("Alice").await;
    harness.activate(&presenter, &question).await;

    harness
        .coordinator
        .lock_question(&presenter.identity, question.id, true)
        .await
        .unwrap();

    let err = harness
        .submit(&alice, &question, ResponsePayload::OptionIndex { index: 0 })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::QuestionLocked);

    harness
        .coordinator
        .lock_question(&presenter.identity, question.id, false)
        .await
        .unwrap();

    harness
        .submit(&alice, &question, ResponsePayload::OptionIndex { index: 0 })
        .await
        .unwrap();
    let acks = acks(&alice.drain());
    assert_eq!(acks.last(), Some(&(false, None, None)));
}

#[tokio::test]
async fn quiz_submission_is_graded_and_scored() {
    let harness = Harness::new(SessionMode::Quiz).await;
    let question = harness
        .add_question(
            Question::new(
                harness.session.id,
                QuestionKind::QuizMc,
                "2+2?".to_string(),
                0,
            )
            .with_options(vec!["3".to_string(), "4".to_string()])
            .with_answer(CorrectAnswer::OptionIndex { index: 1 })
            .with_time_limit_ms(30_000),
        )
        .await;
    let presenter = harness.presenter().await;
    let mut alice = harness.join("Alice").await;
    let mut bob = harness.join("Bob").await;
    harness.activate(&presenter, &question).await;
    alice.drain();
    bob.drain();

    harness
        .submit(&alice, &question, ResponsePayload::OptionIndex { index: 1 })
        .await
        .unwrap();
    let (duplicate, is_correct, score) = acks(&alice.drain())[0];
    assert!(!duplicate);
    assert_eq!(is_correct, Some(true));
    let score = score.unwrap();
    assert!(score >= MIN_CORRECT_SCORE && score <= MAX_SCORE);

    harness
        .submit(&bob, &question, ResponsePayload::OptionIndex { index: 0 })
        .await
        .unwrap();
    let (_, is_correct, score) = acks(&bob.drain())[0];
    assert_eq!(is_correct, Some(false));
    assert_eq!(score, Some(0));
}

#[tokio::test]
async fn live_aggregates_stay_presenter_only_until_reveal() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness.add_question(poll_question(&harness, 0)).await;
    let mut presenter = harness.presenter().await;
    let mut alice = harness.join("Alice").await;
    let mut bob = harness.join("Bob").await;
    harness.activate(&presenter, &question).await;
    alice.drain();
    bob.drain();
    presenter.drain();

    harness
        .submit(&alice, &question, ResponsePayload::OptionIndex { index: 0 })
        .await
        .unwrap();

    // The submitter is acknowledged before seeing the count broadcast.
    let alice_events = alice.drain();
    assert!(matches!(
        alice_events[0],
        ServerEvent::ResponseSubmitted { duplicate: false, .. }
    ));
    assert!(matches!(
        alice_events[1],
        ServerEvent::ResponseCountUpdated { count: 1, .. }
    ));

    let bob_events = bob.drain();
    // The count reaches everyone; the live aggregate does not.
    assert!(bob_events
        .iter()
        .any(|e| matches!(e, ServerEvent::ResponseCountUpdated { count: 1, .. })));
    assert!(!bob_events
        .iter()
        .any(|e| matches!(e, ServerEvent::ResultsUpdated { .. })));

    let presenter_events = presenter.drain();
    let count_at = presenter_events
        .iter()
        .position(|e| matches!(e, ServerEvent::ResponseCountUpdated { .. }))
        .unwrap();
    let results_at = presenter_events
        .iter()
        .position(|e| matches!(e, ServerEvent::ResultsUpdated { .. }))
        .unwrap();
    // The count and aggregate updates for one submission are never
    // observed out of order.
    assert!(count_at < results_at);

    harness
        .coordinator
        .reveal_results(&presenter.identity, question.id)
        .await
        .unwrap();
    let revealed = bob
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::ResultsRevealed { results, .. } => Some(results),
            _ => None,
        })
        .expect("participants see results after reveal");
    match revealed {
        Aggregate::Choice { counts, total, .. } => {
            assert_eq!(counts, vec![1, 0]);
            assert_eq!(total, 1);
        }
        other => panic!("unexpected aggregate {other:?}"),
    }
}

#[tokio::test]
async fn quiz_reveal_broadcasts_leaderboard() {
    let harness = Harness::new(SessionMode::Quiz).await;
    let question = harness
        .add_question(
            Question::new(
                harness.session.id,
                QuestionKind::QuizTf,
                "Rust has a garbage collector".to_string(),
                0,
            )
            .with_options(vec!["true".to_string(), "false".to_string()])
            .with_answer(CorrectAnswer::OptionIndex { index: 1 })
            .with_time_limit_ms(10_000),
        )
        .await;
    let presenter = harness.presenter().await;
    let mut alice = harness.join("Alice").await;
    harness.activate(&presenter, &question).await;

    harness
        .submit(&alice, &question, ResponsePayload::OptionIndex { index: 1 })
        .await
        .unwrap();
    alice.drain();

    harness
        .coordinator
        .reveal_results(&presenter.identity, question.id)
        .await
        .unwrap();

    let entries = alice
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::LeaderboardUpdated { entries } => Some(entries),
            _ => None,
        })
        .expect("leaderboard follows quiz reveal");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].nickname, "Alice");
    assert!(entries[0].score >= MIN_CORRECT_SCORE);
}

#[tokio::test]
async fn word_cloud_scenario() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness
        .add_question(
            Question::new(
                harness.session.id,
                QuestionKind::WordCloud,
                "One word for today?".to_string(),
                0,
            )
            .with_settings(QuestionSettings {
                max_words: Some(3),
                ..Default::default()
            }),
        )
        .await;
    let mut presenter = harness.presenter().await;
    let alice = harness.join("Alice").await;
    harness.activate(&presenter, &question).await;
    presenter.drain();

    let words = ["Cat", "cat ", "  Dog", "x"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    harness
        .coordinator
        .submit_words(&alice.identity, alice.connection_id, question.id, words)
        .await
        .unwrap();

    let cloud = presenter
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::WordCloudUpdated { results, .. } => Some(results),
            _ => None,
        })
        .expect("presenter sees the live cloud");
    match cloud {
        Aggregate::WordCloud { words } => {
            assert_eq!(words.len(), 2);
            assert_eq!(words[0].word, "cat");
            assert_eq!(words[0].weight, 2);
            assert_eq!(words[1].word, "dog");
            assert_eq!(words[1].weight, 1);
        }
        other => panic!("unexpected aggregate {other:?}"),
    }
}

#[tokio::test]
async fn flagged_words_are_stored_but_invisible() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness
        .add_question(Question::new(
            harness.session.id,
            QuestionKind::WordCloud,
            "Thoughts?".to_string(),
            0,
        ))
        .await;
    let presenter = harness.presenter().await;
    let alice = harness.join("Alice").await;
    harness.activate(&presenter, &question).await;

    harness
        .coordinator
        .submit_words(
            &alice.identity,
            alice.connection_id,
            question.id,
            vec!["slur".to_string(), "kind".to_string()],
        )
        .await
        .unwrap();

    let stored = harness.store.words(question.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().any(|w| w.word == "slur" && w.flagged));

    match pulse_session::engine::aggregate::word_cloud(&stored) {
        Aggregate::WordCloud { words } => {
            assert_eq!(words.len(), 1);
            assert_eq!(words[0].word, "kind");
        }
        other => panic!("unexpected aggregate {other:?}"),
    }
}

#[tokio::test]
async fn ranking_aggregate_is_consistent_with_submissions() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness
        .add_question(
            Question::new(
                harness.session.id,
                QuestionKind::Ranking,
                "Rank the priorities".to_string(),
                0,
            )
            .with_options(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
        )
        .await;
    let presenter = harness.presenter().await;
    let alice = harness.join("Alice").await;
    let bob = harness.join("Bob").await;
    harness.activate(&presenter, &question).await;

    harness
        .submit(&alice, &question, ResponsePayload::Ranking { order: vec![0, 1, 2] })
        .await
        .unwrap();
    harness
        .submit(&bob, &question, ResponsePayload::Ranking { order: vec![1, 0, 2] })
        .await
        .unwrap();

    let responses = harness.store.responses(question.id).await.unwrap();
    match pulse_session::engine::aggregate::ranking(
        &["a".to_string(), "b".to_string(), "c".to_string()],
        &responses,
    ) {
        Aggregate::Ranking { options, total } => {
            assert_eq!(total, 2);
            for option in &options {
                assert!(option.average_rank >= 1.0 && option.average_rank <= 3.0);
            }
            let sum: f64 = options.iter().map(|o| o.average_rank).sum();
            assert_eq!(sum, 6.0);
            // "c" sat at rank 3 in both submissions, so it sorts last.
            assert_eq!(options.last().unwrap().label, "c");
            assert_eq!(options.last().unwrap().average_rank, 3.0);
        }
        other => panic!("unexpected aggregate {other:?}"),
    }
}

#[tokio::test]
async fn brainstorm_votes_toggle_and_rebroadcast() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness
        .add_question(Question::new(
            harness.session.id,
            QuestionKind::Brainstorm,
            "Improvements?".to_string(),
            0,
        ))
        .await;
    let presenter = harness.presenter().await;
    let mut alice = harness.join("Alice").await;
    let bob = harness.join("Bob").await;
    harness.activate(&presenter, &question).await;
    alice.drain();

    harness
        .coordinator
        .submit_idea(
            &bob.identity,
            bob.connection_id,
            question.id,
            "standing desks".to_string(),
        )
        .await
        .unwrap();

    let idea = alice
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::IdeaSubmitted { idea, .. } => Some(idea),
            _ => None,
        })
        .expect("ideas broadcast to the room");

    harness
        .coordinator
        .vote_idea(&alice.identity, idea.id)
        .await
        .unwrap();
    harness
        .coordinator
        .vote_idea(&alice.identity, idea.id)
        .await
        .unwrap();

    let votes: Vec<u32> = alice
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::IdeaVotesUpdated {
                question_id: qid,
                votes,
                ..
            } => {
                assert_eq!(qid, question.id);
                Some(votes)
            }
            _ => None,
        })
        .collect();
    // A second vote removes the first instead of double-counting.
    assert_eq!(votes, vec![1, 0]);
}

#[tokio::test]
async fn ending_the_session_notifies_and_rejects_stragglers() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness.add_question(poll_question(&harness, 0)).await;
    let presenter = harness.presenter().await;
    let mut alice = harness.join("Alice").await;
    harness.activate(&presenter, &question).await;
    alice.drain();

    harness
        .coordinator
        .end_session(&presenter.identity)
        .await
        .unwrap();

    assert!(alice
        .drain()
        .iter()
        .any(|e| matches!(e, ServerEvent::SessionEnded { .. })));

    let err = harness
        .submit(&alice, &question, ResponsePayload::OptionIndex { index: 0 })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SessionEnded);
}

#[tokio::test]
async fn removed_participant_is_rejected_but_history_survives() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness.add_question(poll_question(&harness, 0)).await;
    let presenter = harness.presenter().await;
    let alice = harness.join("Alice").await;
    harness.activate(&presenter, &question).await;

    harness
        .submit(&alice, &question, ResponsePayload::OptionIndex { index: 1 })
        .await
        .unwrap();

    let ClientIdentity::Participant { participant_id, .. } = alice.identity else {
        panic!("expected participant identity");
    };
    harness
        .coordinator
        .remove_participant(&presenter.identity, participant_id)
        .await
        .unwrap();

    // Historical responses survive soft removal.
    assert_eq!(harness.store.responses(question.id).await.unwrap().len(), 1);

    // But the participant can no longer submit or rejoin.
    let err = harness
        .submit(&alice, &question, ResponsePayload::OptionIndex { index: 0 })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ParticipantRemoved);

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = harness
        .coordinator
        .join_participant(&harness.session.code, "Alice", "Alice", Uuid::new_v4(), tx)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ParticipantRemoved);
}

#[tokio::test]
async fn profane_nickname_is_a_dedicated_rejection() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let (tx, _rx) = mpsc::unbounded_channel();
    let err = harness
        .coordinator
        .join_participant(&harness.session.code, "slurface", "c-9", Uuid::new_v4(), tx)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ProfanityDetected);
}

#[tokio::test]
async fn reconnect_reuses_the_row_and_restores_the_snapshot() {
    let harness = Harness::new(SessionMode::Engagement).await;
    let question = harness.add_question(poll_question(&harness, 0)).await;
    let presenter = harness.presenter().await;
    let alice = harness.join("Alice").await;
    harness.activate(&presenter, &question).await;

    let ClientIdentity::Participant { participant_id, .. } = alice.identity else {
        panic!("expected participant identity");
    };
    drop(alice);

    let (tx, _rx) = mpsc::unbounded_channel();
    let (identity, ack) = harness
        .coordinator
        .join_participant(&harness.session.code, "Alice", "Alice", Uuid::new_v4(), tx)
        .await
        .unwrap();

    let ClientIdentity::Participant {
        participant_id: rejoined_id,
        ..
    } = identity
    else {
        panic!("expected participant identity");
    };
    assert_eq!(rejoined_id, participant_id);

    match ack {
        ServerEvent::SessionJoined {
            reconnected,
            active_question,
            ..
        } => {
            assert!(reconnected);
            let snapshot = active_question.expect("active question in snapshot");
            assert_eq!(snapshot.question.id, question.id);
            assert!(snapshot.results.is_none());
        }
        other => panic!("unexpected ack {other:?}"),
    }
}
