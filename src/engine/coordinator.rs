use super::aggregate;
use super::score::{grade, quiz_score};
use super::validate::{normalize_words, sanitize_nickname, ContentFilter, NicknameError, DEFAULT_MAX_WORDS};
use crate::model::{
    epoch_ms, ActiveQuestion, Aggregate, ConnectionId, ErrorCode, IdeaId, ParticipantId,
    ParticipantInfo, Question, QuestionId, QuestionKind, ResponsePayload, Role, ServerEvent,
    Session, SessionId, SessionStatus,
};
use crate::registry::{EventSender, LiveSession, SessionRegistry};
use crate::storage::{NewResponse, SessionStore, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Entries shown on the leaderboard after a quiz reveal.
const LEADERBOARD_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    SessionNotFound,

    #[error("session has ended")]
    SessionEnded,

    #[error("question not found: {0}")]
    QuestionNotFound(QuestionId),

    #[error("participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("question is locked")]
    QuestionLocked,

    #[error(transparent)]
    Nickname(#[from] NicknameError),

    #[error("participant was removed from this session")]
    ParticipantRemoved,

    #[error("not authorized for this action")]
    Unauthorized,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Wire code for the `error` event. The enumeration is closed, so
    /// conditions without a dedicated code collapse onto `invalid-session`
    /// and the message carries the detail.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::SessionNotFound => ErrorCode::SessionNotFound,
            SessionError::SessionEnded => ErrorCode::SessionEnded,
            SessionError::QuestionLocked => ErrorCode::QuestionLocked,
            SessionError::ParticipantRemoved => ErrorCode::ParticipantRemoved,
            SessionError::Unauthorized => ErrorCode::Unauthorized,
            SessionError::Nickname(NicknameError::Profane) => ErrorCode::ProfanityDetected,
            SessionError::QuestionNotFound(_)
            | SessionError::ParticipantNotFound(_)
            | SessionError::Nickname(_)
            | SessionError::InvalidPayload(_)
            | SessionError::Storage(_) => ErrorCode::InvalidSession,
        }
    }

    /// Store faults are surfaced as a generic failure; everything the
    /// client could act on keeps its own message.
    pub fn public_message(&self) -> String {
        match self {
            SessionError::Storage(_) => "request could not be processed".to_string(),
            other => other.to_string(),
        }
    }
}

/// What a live connection resolved to. Submissions trust this, never the
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIdentity {
    Participant {
        session_id: SessionId,
        participant_id: ParticipantId,
    },
    Presenter {
        session_id: SessionId,
    },
}

impl ClientIdentity {
    pub fn session_id(&self) -> SessionId {
        match self {
            ClientIdentity::Participant { session_id, .. }
            | ClientIdentity::Presenter { session_id } => *session_id,
        }
    }
}

/// Orchestrates the question lifecycle state machine and the submission
/// protocol against the store, the registry and the broadcast rooms.
///
/// Every method acquires the target session's mutex before mutating, so
/// control actions on one session never race while independent sessions
/// progress concurrently. Submission acks and broadcasts both go out
/// through the room while the lock is held, which gives every observer the
/// issue order; join acks are returned to the connection handler.
pub struct Coordinator {
    store: Arc<dyn SessionStore>,
    registry: Arc<SessionRegistry>,
    filter: Arc<dyn ContentFilter>,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        registry: Arc<SessionRegistry>,
        filter: Arc<dyn ContentFilter>,
    ) -> Self {
        Coordinator {
            store,
            registry,
            filter,
        }
    }

    // ===== Joining =====

    pub async fn join_participant(
        &self,
        code: &str,
        nickname: &str,
        cookie_id: &str,
        connection_id: ConnectionId,
        sender: EventSender,
    ) -> Result<(ClientIdentity, ServerEvent), SessionError> {
        let session = self.joinable_session(code).await?;
        let nickname = sanitize_nickname(nickname, self.filter.as_ref())?;

        let (participant, created) = self
            .store
            .get_or_create_participant(session.id, cookie_id, connection_id, &nickname)
            .await?;
        if participant.is_removed {
            return Err(SessionError::ParticipantRemoved);
        }

        let live = self.registry.get_or_create(session.id).await;
        let mut guard = live.lock().await;
        guard.subscribe(connection_id, Role::Participant, sender);
        guard.connect_participant(participant.id, connection_id);

        if created {
            let connected_count = guard.connected_count();
            guard.broadcast(&ServerEvent::ParticipantJoined {
                participant_id: participant.id,
                nickname: participant.nickname.clone(),
                connected_count,
            });
        }
        info!(session_id = %session.id, participant_id = %participant.id, rejoined = !created, "participant joined");

        let active_question = self.active_snapshot(&guard).await?;
        let ack = ServerEvent::SessionJoined {
            session_id: session.id,
            code: session.code.clone(),
            mode: session.mode,
            participant_id: Some(participant.id),
            nickname: Some(participant.nickname.clone()),
            reconnected: !created,
            active_question,
            participants: None,
        };
        let identity = ClientIdentity::Participant {
            session_id: session.id,
            participant_id: participant.id,
        };
        Ok((identity, ack))
    }

    pub async fn join_presenter(
        &self,
        code: &str,
        connection_id: ConnectionId,
        sender: EventSender,
    ) -> Result<(ClientIdentity, ServerEvent), SessionError> {
        let session = self.joinable_session(code).await?;

        let live = self.registry.get_or_create(session.id).await;
        let mut guard = live.lock().await;
        guard.subscribe(connection_id, Role::Presenter, sender);
        info!(session_id = %session.id, "presenter joined");

        let roster: Vec<ParticipantInfo> = self
            .store
            .participants(session.id)
            .await?
            .into_iter()
            .map(|p| ParticipantInfo {
                is_connected: guard.is_participant_connected(p.id),
                participant_id: p.id,
                nickname: p.nickname,
            })
            .collect();

        let active_question = self.active_snapshot(&guard).await?;
        let ack = ServerEvent::SessionJoined {
            session_id: session.id,
            code: session.code.clone(),
            mode: session.mode,
            participant_id: None,
            nickname: None,
            reconnected: false,
            active_question,
            participants: Some(roster),
        };
        Ok((ClientIdentity::Presenter { session_id: session.id }, ack))
    }

    // ===== Question lifecycle (presenter only) =====

    pub async fn activate_question(
        &self,
        identity: &ClientIdentity,
        question_id: QuestionId,
    ) -> Result<(), SessionError> {
        let session_id = self.require_presenter(identity)?;
        self.require_active_session(session_id).await?;
        let question = self.owned_question(session_id, question_id).await?;

        let live = self.registry.get_or_create(session_id).await;
        let mut guard = live.lock().await;

        let activated = self.store.activate_question(session_id, question.id).await?;
        let activated_at = epoch_ms();
        let response_count = self.store.response_count(question.id).await?;
        guard.set_active(question.id, activated_at);

        guard.broadcast(&ServerEvent::QuestionActivated {
            question: activated.public(),
            response_count,
            activated_at,
        });
        info!(%session_id, %question_id, "question activated");
        Ok(())
    }

    pub async fn lock_question(
        &self,
        identity: &ClientIdentity,
        question_id: QuestionId,
        locked: bool,
    ) -> Result<(), SessionError> {
        let session_id = self.require_presenter(identity)?;
        self.require_active_session(session_id).await?;
        let question = self.owned_question(session_id, question_id).await?;

        let live = self.registry.get_or_create(session_id).await;
        let mut guard = live.lock().await;

        self.store.set_question_locked(question.id, locked).await?;
        guard.set_locked(question.id, locked);
        guard.broadcast(&ServerEvent::QuestionLocked {
            question_id: question.id,
            locked,
        });
        Ok(())
    }

    pub async fn reveal_results(
        &self,
        identity: &ClientIdentity,
        question_id: QuestionId,
    ) -> Result<(), SessionError> {
        let session_id = self.require_presenter(identity)?;
        self.require_active_session(session_id).await?;
        let question = self.owned_question(session_id, question_id).await?;

        let live = self.registry.get_or_create(session_id).await;
        let mut guard = live.lock().await;

        let revealed = self.store.show_results(question.id).await?;
        let results = self.compute_aggregate(&revealed).await?;
        guard.set_results_visible(question.id);

        guard.broadcast(&ServerEvent::ResultsRevealed {
            question_id: revealed.id,
            results,
            answer: revealed.answer.clone(),
        });

        // Quiz reveals are the only trigger for leaderboard recomputation.
        if revealed.kind.is_quiz() {
            let entries = self.store.leaderboard(session_id, LEADERBOARD_LIMIT).await?;
            guard.broadcast(&ServerEvent::LeaderboardUpdated { entries });
        }
        info!(%session_id, %question_id, "results revealed");
        Ok(())
    }

    pub async fn end_session(&self, identity: &ClientIdentity) -> Result<(), SessionError> {
        let session_id = self.require_presenter(identity)?;
        self.require_active_session(session_id).await?;

        self.store
            .update_session_status(session_id, SessionStatus::Ended)
            .await?;

        if let Some(live) = self.registry.get(session_id).await {
            let mut guard = live.lock().await;
            guard.broadcast(&ServerEvent::SessionEnded { session_id });
        }
        self.registry.evict(session_id).await;
        info!(%session_id, "session ended");
        Ok(())
    }

    pub async fn remove_participant(
        &self,
        identity: &ClientIdentity,
        participant_id: ParticipantId,
    ) -> Result<(), SessionError> {
        let session_id = self.require_presenter(identity)?;
        let participant = self
            .store
            .participant_by_id(participant_id)
            .await?
            .filter(|p| p.session_id == session_id)
            .ok_or(SessionError::ParticipantNotFound(participant_id))?;

        self.store.remove_participant(participant.id).await?;

        if let Some(live) = self.registry.get(session_id).await {
            let mut guard = live.lock().await;
            // Announce first so the removed client learns why, then cut
            // their membership.
            guard.broadcast(&ServerEvent::ParticipantRemoved {
                participant_id: participant.id,
            });
            guard.disconnect_participant(participant.id);
            if let Some(connection_id) = participant.connection_id {
                guard.unsubscribe(connection_id);
            }
        }
        info!(%session_id, %participant_id, "participant removed");
        Ok(())
    }

    // ===== Response submission =====

    pub async fn submit_response(
        &self,
        identity: &ClientIdentity,
        connection_id: ConnectionId,
        question_id: QuestionId,
        payload: ResponsePayload,
    ) -> Result<(), SessionError> {
        let (session_id, participant_id) = self.require_participant(identity)?;
        self.require_submitting_participant(participant_id).await?;
        self.require_active_session(session_id).await?;
        let question = self.owned_question(session_id, question_id).await?;

        let live = self.registry.get_or_create(session_id).await;
        let mut guard = live.lock().await;

        self.require_unlocked(&guard, &question)?;
        validate_payload(&question, &payload)?;

        let (is_correct, score, elapsed_ms) = if question.kind.is_quiz() {
            let limit = question.time_limit_ms.unwrap_or(0);
            let elapsed = match guard.active() {
                Some(active) if active.question_id == question.id => {
                    epoch_ms().saturating_sub(active.activated_at)
                }
                // Not the live question: no trusted activation time, so
                // award the floor.
                _ => limit,
            };
            let correct = grade(&question, &payload).unwrap_or(false);
            (Some(correct), quiz_score(correct, elapsed, limit), Some(elapsed))
        } else {
            (None, 0, None)
        };

        let outcome = self
            .store
            .submit_response(NewResponse {
                question_id: question.id,
                participant_id,
                payload,
                is_correct,
                score,
                elapsed_ms,
            })
            .await?;

        if outcome.is_duplicate {
            guard.send_to(
                connection_id,
                &ServerEvent::ResponseSubmitted {
                    question_id: question.id,
                    duplicate: true,
                    is_correct: None,
                    score: None,
                },
            );
            return Ok(());
        }

        if score > 0 {
            self.store.add_score(participant_id, score).await?;
        }

        // Read everything before emitting anything, so a store fault never
        // leaves a partial broadcast behind.
        let count = self.store.response_count(question.id).await?;
        let results = self.compute_aggregate(&question).await?;

        // Ack the submitter first, then fan out; the lock is held for all
        // three, so no observer sees them reordered.
        guard.send_to(
            connection_id,
            &ServerEvent::ResponseSubmitted {
                question_id: question.id,
                duplicate: false,
                is_correct,
                score: is_correct.map(|_| score),
            },
        );
        guard.broadcast(&ServerEvent::ResponseCountUpdated {
            question_id: question.id,
            count,
        });
        guard.broadcast_presenter(&ServerEvent::ResultsUpdated {
            question_id: question.id,
            results,
        });
        Ok(())
    }

    pub async fn submit_words(
        &self,
        identity: &ClientIdentity,
        connection_id: ConnectionId,
        question_id: QuestionId,
        words: Vec<String>,
    ) -> Result<(), SessionError> {
        let (session_id, participant_id) = self.require_participant(identity)?;
        self.require_submitting_participant(participant_id).await?;
        self.require_active_session(session_id).await?;
        let question = self.owned_question(session_id, question_id).await?;
        if question.kind != QuestionKind::WordCloud {
            return Err(SessionError::InvalidPayload(
                "question does not accept words".to_string(),
            ));
        }

        let live = self.registry.get_or_create(session_id).await;
        let mut guard = live.lock().await;
        self.require_unlocked(&guard, &question)?;

        let max_words = question.settings.max_words.unwrap_or(DEFAULT_MAX_WORDS);
        let normalized = normalize_words(&words, max_words);
        if normalized.is_empty() {
            return Err(SessionError::InvalidPayload(
                "no valid words in submission".to_string(),
            ));
        }
        let flagged: Vec<(String, bool)> = normalized
            .into_iter()
            .map(|w| {
                let allowed = self.filter.is_allowed(&w);
                (w, !allowed)
            })
            .collect();

        let outcome = self
            .store
            .submit_words(question.id, participant_id, flagged)
            .await?;
        if outcome.is_duplicate {
            guard.send_to(connection_id, &Self::plain_ack(question.id, true));
            return Ok(());
        }

        let count = self.store.response_count(question.id).await?;
        let results = aggregate::word_cloud(&self.store.words(question.id).await?);
        guard.send_to(connection_id, &Self::plain_ack(question.id, false));
        guard.broadcast(&ServerEvent::ResponseCountUpdated {
            question_id: question.id,
            count,
        });
        guard.broadcast_presenter(&ServerEvent::WordCloudUpdated {
            question_id: question.id,
            results,
        });
        Ok(())
    }

    pub async fn submit_text(
        &self,
        identity: &ClientIdentity,
        connection_id: ConnectionId,
        question_id: QuestionId,
        text: String,
    ) -> Result<(), SessionError> {
        let (session_id, participant_id) = self.require_participant(identity)?;
        self.require_submitting_participant(participant_id).await?;
        self.require_active_session(session_id).await?;
        let question = self.owned_question(session_id, question_id).await?;
        if question.kind != QuestionKind::OpenEnded {
            return Err(SessionError::InvalidPayload(
                "question does not accept open text".to_string(),
            ));
        }
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(SessionError::InvalidPayload("empty text".to_string()));
        }

        let live = self.registry.get_or_create(session_id).await;
        let mut guard = live.lock().await;
        self.require_unlocked(&guard, &question)?;

        let outcome = self
            .store
            .submit_text_response(question.id, participant_id, text)
            .await?;
        let Some(response) = outcome.response else {
            guard.send_to(connection_id, &Self::plain_ack(question.id, true));
            return Ok(());
        };

        let count = self.store.response_count(question.id).await?;
        guard.send_to(connection_id, &Self::plain_ack(question.id, false));
        guard.broadcast(&ServerEvent::ResponseCountUpdated {
            question_id: question.id,
            count,
        });
        guard.broadcast_presenter(&ServerEvent::TextResponseReceived {
            question_id: question.id,
            response,
        });
        Ok(())
    }

    pub async fn submit_idea(
        &self,
        identity: &ClientIdentity,
        connection_id: ConnectionId,
        question_id: QuestionId,
        text: String,
    ) -> Result<(), SessionError> {
        let (session_id, participant_id) = self.require_participant(identity)?;
        self.require_submitting_participant(participant_id).await?;
        self.require_active_session(session_id).await?;
        let question = self.owned_question(session_id, question_id).await?;
        if question.kind != QuestionKind::Brainstorm {
            return Err(SessionError::InvalidPayload(
                "question does not accept ideas".to_string(),
            ));
        }
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(SessionError::InvalidPayload("empty idea".to_string()));
        }

        let live = self.registry.get_or_create(session_id).await;
        let mut guard = live.lock().await;
        self.require_unlocked(&guard, &question)?;

        let idea = self
            .store
            .submit_idea(question.id, participant_id, text)
            .await?;

        let count = self.store.response_count(question.id).await?;
        guard.send_to(connection_id, &Self::plain_ack(question.id, false));
        guard.broadcast(&ServerEvent::ResponseCountUpdated {
            question_id: question.id,
            count,
        });
        // Brainstorms are collaborative: ideas are visible to the room as
        // they arrive, unlike pre-reveal aggregates.
        guard.broadcast(&ServerEvent::IdeaSubmitted {
            question_id: question.id,
            idea,
        });
        Ok(())
    }

    pub async fn vote_idea(
        &self,
        identity: &ClientIdentity,
        idea_id: IdeaId,
    ) -> Result<(), SessionError> {
        let (session_id, participant_id) = self.require_participant(identity)?;
        self.require_submitting_participant(participant_id).await?;
        self.require_active_session(session_id).await?;

        let live = self.registry.get_or_create(session_id).await;
        let mut guard = live.lock().await;

        let outcome = self.store.vote_idea(idea_id, participant_id).await?;
        guard.broadcast(&ServerEvent::IdeaVotesUpdated {
            question_id: outcome.idea.question_id,
            idea_id: outcome.idea.id,
            votes: outcome.idea.votes,
        });
        Ok(())
    }

    // ===== Disconnect =====

    /// Connection teardown. Never fails: submissions already accepted are
    /// not rolled back, and a dangling active question persists until an
    /// explicit end or expiry.
    pub async fn disconnect(&self, identity: Option<&ClientIdentity>, connection_id: ConnectionId) {
        let participant = match self.store.disconnect_participant(connection_id).await {
            Ok(row) => row,
            Err(err) => {
                error!(%connection_id, %err, "failed to record disconnect");
                None
            }
        };

        let Some(identity) = identity else {
            return;
        };
        let Some(live) = self.registry.get(identity.session_id()).await else {
            return;
        };
        let mut guard = live.lock().await;
        guard.unsubscribe(connection_id);

        if let Some(participant) = participant {
            guard.disconnect_participant(participant.id);
            let connected_count = guard.connected_count();
            guard.broadcast(&ServerEvent::ParticipantLeft {
                participant_id: participant.id,
                connected_count,
            });
            info!(participant_id = %participant.id, "participant disconnected");
        }
    }

    // ===== Helpers =====

    /// Ack shape for the submission paths that carry no grading.
    fn plain_ack(question_id: QuestionId, duplicate: bool) -> ServerEvent {
        ServerEvent::ResponseSubmitted {
            question_id,
            duplicate,
            is_correct: None,
            score: None,
        }
    }

    async fn joinable_session(&self, code: &str) -> Result<Session, SessionError> {
        let code = code.trim().to_uppercase();
        let session = self
            .store
            .session_by_code(&code)
            .await?
            .ok_or(SessionError::SessionNotFound)?;
        if session.is_ended() || session.is_expired(epoch_ms()) {
            return Err(SessionError::SessionEnded);
        }
        Ok(session)
    }

    async fn require_active_session(&self, session_id: SessionId) -> Result<(), SessionError> {
        let session = self
            .store
            .session_by_id(session_id)
            .await?
            .ok_or(SessionError::SessionNotFound)?;
        if session.is_ended() || session.is_expired(epoch_ms()) {
            return Err(SessionError::SessionEnded);
        }
        Ok(())
    }

    fn require_presenter(&self, identity: &ClientIdentity) -> Result<SessionId, SessionError> {
        match identity {
            ClientIdentity::Presenter { session_id } => Ok(*session_id),
            ClientIdentity::Participant { .. } => Err(SessionError::Unauthorized),
        }
    }

    fn require_participant(
        &self,
        identity: &ClientIdentity,
    ) -> Result<(SessionId, ParticipantId), SessionError> {
        match identity {
            ClientIdentity::Participant {
                session_id,
                participant_id,
            } => Ok((*session_id, *participant_id)),
            ClientIdentity::Presenter { .. } => Err(SessionError::Unauthorized),
        }
    }

    /// The store wins on removal state: a participant removed mid-session
    /// may still hold an open socket.
    async fn require_submitting_participant(
        &self,
        participant_id: ParticipantId,
    ) -> Result<(), SessionError> {
        let participant = self
            .store
            .participant_by_id(participant_id)
            .await?
            .ok_or(SessionError::ParticipantNotFound(participant_id))?;
        if participant.is_removed {
            return Err(SessionError::ParticipantRemoved);
        }
        Ok(())
    }

    /// Questions from other sessions are indistinguishable from unknown
    /// ones.
    async fn owned_question(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<Question, SessionError> {
        self.store
            .question_by_id(question_id)
            .await?
            .filter(|q| q.session_id == session_id)
            .ok_or(SessionError::QuestionNotFound(question_id))
    }

    fn require_unlocked(
        &self,
        guard: &LiveSession,
        question: &Question,
    ) -> Result<(), SessionError> {
        let locked = match guard.active() {
            Some(active) if active.question_id == question.id => active.locked,
            _ => question.is_locked,
        };
        if locked {
            warn!(question_id = %question.id, "submission rejected: question locked");
            return Err(SessionError::QuestionLocked);
        }
        Ok(())
    }

    async fn compute_aggregate(&self, question: &Question) -> Result<Aggregate, SessionError> {
        // Each family reads only its own row shape; fetch lazily.
        let aggregate = match question.kind {
            QuestionKind::WordCloud => {
                aggregate::word_cloud(&self.store.words(question.id).await?)
            }
            QuestionKind::OpenEnded => Aggregate::Texts {
                responses: self.store.text_responses(question.id).await?,
            },
            QuestionKind::Brainstorm => Aggregate::Ideas {
                ideas: aggregate::ideas_by_votes(&self.store.ideas(question.id).await?),
            },
            _ => {
                let responses = self.store.responses(question.id).await?;
                aggregate::for_question(question, &responses, &[], &[], &[])
            }
        };
        Ok(aggregate)
    }

    async fn active_snapshot(
        &self,
        guard: &LiveSession,
    ) -> Result<Option<ActiveQuestion>, SessionError> {
        let Some(active) = guard.active().copied() else {
            return Ok(None);
        };
        let Some(question) = self.store.question_by_id(active.question_id).await? else {
            return Ok(None);
        };
        let response_count = self.store.response_count(question.id).await?;
        let results = if active.results_visible {
            Some(self.compute_aggregate(&question).await?)
        } else {
            None
        };
        Ok(Some(ActiveQuestion {
            question: question.public(),
            response_count,
            activated_at: active.activated_at,
            results,
        }))
    }
}

/// Shape- and bounds-check a payload against the question kind before it
/// reaches the store.
fn validate_payload(question: &Question, payload: &ResponsePayload) -> Result<(), SessionError> {
    match question.kind {
        QuestionKind::Poll | QuestionKind::QuizMc | QuestionKind::QuizTf => match payload {
            ResponsePayload::OptionIndex { index } if *index < question.option_count() => Ok(()),
            ResponsePayload::OptionIndex { .. } => Err(SessionError::InvalidPayload(
                "option index out of range".to_string(),
            )),
            _ => Err(SessionError::InvalidPayload(
                "expected an option index".to_string(),
            )),
        },
        QuestionKind::Scale | QuestionKind::QuizSlider | QuestionKind::Nps => match payload {
            ResponsePayload::Number { value } => {
                let (default_min, default_max) = if question.kind == QuestionKind::Nps {
                    (Some(0.0), Some(10.0))
                } else {
                    (None, None)
                };
                let min = question.settings.min_value.or(default_min);
                let max = question.settings.max_value.or(default_max);
                if min.is_some_and(|m| *value < m) || max.is_some_and(|m| *value > m) {
                    return Err(SessionError::InvalidPayload(
                        "value out of bounds".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Err(SessionError::InvalidPayload(
                "expected a numeric value".to_string(),
            )),
        },
        QuestionKind::Ranking | QuestionKind::QuizOrder => match payload {
            ResponsePayload::Ranking { order } => {
                let n = question.option_count();
                let mut seen = vec![false; n];
                let valid = order.len() == n
                    && order.iter().all(|&i| {
                        if i < n && !seen[i] {
                            seen[i] = true;
                            true
                        } else {
                            false
                        }
                    });
                if valid {
                    Ok(())
                } else {
                    Err(SessionError::InvalidPayload(
                        "ranking must be a permutation of the options".to_string(),
                    ))
                }
            }
            _ => Err(SessionError::InvalidPayload(
                "expected a ranking".to_string(),
            )),
        },
        QuestionKind::PinImage => match payload {
            ResponsePayload::Pin { x, y }
                if (0.0..=100.0).contains(x) && (0.0..=100.0).contains(y) =>
            {
                Ok(())
            }
            ResponsePayload::Pin { .. } => Err(SessionError::InvalidPayload(
                "pin coordinates are percentages in [0, 100]".to_string(),
            )),
            _ => Err(SessionError::InvalidPayload("expected a pin".to_string())),
        },
        QuestionKind::QuizTyped => match payload {
            ResponsePayload::Text { text } if !text.trim().is_empty() => Ok(()),
            ResponsePayload::Text { .. } => {
                Err(SessionError::InvalidPayload("empty answer".to_string()))
            }
            _ => Err(SessionError::InvalidPayload(
                "expected a text answer".to_string(),
            )),
        },
        // These kinds have dedicated submission paths.
        QuestionKind::WordCloud | QuestionKind::OpenEnded | QuestionKind::Brainstorm => {
            Err(SessionError::InvalidPayload(
                "question uses a dedicated submission type".to_string(),
            ))
        }
    }
}
