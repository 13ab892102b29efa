use super::{
    NewResponse, SessionStore, StorageError, SubmitOutcome, TextSubmitOutcome, VoteAction,
    VoteOutcome, WordSubmitOutcome,
};
use crate::model::{
    epoch_ms, generate_join_code, BrainstormIdea, ConnectionId, IdeaId, LeaderboardEntry,
    Participant, ParticipantId, Question, QuestionId, QuestionKind, Session, SessionId,
    SessionMode, SessionStatus, StoredResponse, StoredWord, TextResponse,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory system of record used by the dev server and the test suite.
/// One lock over the whole state so the composite-uniqueness checks are
/// atomic, exactly as a relational constraint would make them.
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    sessions: HashMap<SessionId, Session>,
    participants: HashMap<ParticipantId, Participant>,
    questions: HashMap<QuestionId, Question>,
    responses: HashMap<QuestionId, Vec<StoredResponse>>,
    response_index: HashSet<(QuestionId, ParticipantId)>,
    words: HashMap<QuestionId, Vec<StoredWord>>,
    word_submitters: HashSet<(QuestionId, ParticipantId)>,
    texts: HashMap<QuestionId, Vec<TextResponse>>,
    text_submitters: HashSet<(QuestionId, ParticipantId)>,
    ideas: HashMap<QuestionId, Vec<BrainstormIdea>>,
    idea_parent: HashMap<IdeaId, QuestionId>,
    idea_votes: HashSet<(IdeaId, ParticipantId)>,
    join_seq: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        mode: SessionMode,
        expires_at: u64,
    ) -> Result<Session, StorageError> {
        let mut state = self.state.write().await;
        let code = loop {
            let candidate = generate_join_code();
            if !state.sessions.values().any(|s| s.code == candidate) {
                break candidate;
            }
        };
        let session = Session::new(code, mode, expires_at);
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn session_by_code(&self, code: &str) -> Result<Option<Session>, StorageError> {
        let state = self.state.read().await;
        Ok(state.sessions.values().find(|s| s.code == code).cloned())
    }

    async fn session_by_id(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        let state = self.state.read().await;
        Ok(state.sessions.get(&id).cloned())
    }

    async fn update_session_status(
        &self,
        id: SessionId,
        status: SessionStatus,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        session.status = status;
        Ok(())
    }

    async fn get_or_create_participant(
        &self,
        session_id: SessionId,
        cookie_id: &str,
        connection_id: ConnectionId,
        nickname: &str,
    ) -> Result<(Participant, bool), StorageError> {
        let mut state = self.state.write().await;
        if !state.sessions.contains_key(&session_id) {
            return Err(StorageError::NotFound(session_id.to_string()));
        }

        let existing = state
            .participants
            .values()
            .find(|p| p.session_id == session_id && p.cookie_id == cookie_id)
            .map(|p| p.id);

        if let Some(id) = existing {
            let participant = state.participants.get_mut(&id).ok_or_else(|| {
                StorageError::Backend("participant index out of sync".to_string())
            })?;
            if !participant.is_removed {
                participant.connection_id = Some(connection_id);
                participant.is_connected = true;
                participant.nickname = nickname.to_string();
            }
            return Ok((participant.clone(), false));
        }

        let seq = state.join_seq;
        state.join_seq += 1;
        let participant = Participant::new(
            session_id,
            cookie_id.to_string(),
            connection_id,
            nickname.to_string(),
            seq,
        );
        state.participants.insert(participant.id, participant.clone());
        Ok((participant, true))
    }

    async fn disconnect_participant(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<Participant>, StorageError> {
        let mut state = self.state.write().await;
        let found = state
            .participants
            .values_mut()
            .find(|p| p.connection_id == Some(connection_id));
        match found {
            Some(participant) => {
                participant.is_connected = false;
                participant.connection_id = None;
                Ok(Some(participant.clone()))
            }
            None => Ok(None),
        }
    }

    async fn remove_participant(&self, participant_id: ParticipantId) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let participant = state
            .participants
            .get_mut(&participant_id)
            .ok_or_else(|| StorageError::NotFound(participant_id.to_string()))?;
        // Soft removal: historical responses stay.
        participant.is_removed = true;
        participant.is_connected = false;
        participant.connection_id = None;
        Ok(())
    }

    async fn participant_by_id(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Option<Participant>, StorageError> {
        let state = self.state.read().await;
        Ok(state.participants.get(&participant_id).cloned())
    }

    async fn participants(&self, session_id: SessionId) -> Result<Vec<Participant>, StorageError> {
        let state = self.state.read().await;
        let mut rows: Vec<Participant> = state
            .participants
            .values()
            .filter(|p| p.session_id == session_id && !p.is_removed)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.joined_seq);
        Ok(rows)
    }

    async fn add_score(
        &self,
        participant_id: ParticipantId,
        points: i64,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let participant = state
            .participants
            .get_mut(&participant_id)
            .ok_or_else(|| StorageError::NotFound(participant_id.to_string()))?;
        participant.score += points;
        Ok(())
    }

    async fn leaderboard(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let state = self.state.read().await;
        let mut rows: Vec<&Participant> = state
            .participants
            .values()
            .filter(|p| p.session_id == session_id && !p.is_removed)
            .collect();
        // Ties break toward the earlier joiner.
        rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.joined_seq.cmp(&b.joined_seq)));
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|p| LeaderboardEntry {
                participant_id: p.id,
                nickname: p.nickname.clone(),
                score: p.score,
            })
            .collect())
    }

    async fn add_question(&self, question: Question) -> Result<Question, StorageError> {
        let mut state = self.state.write().await;
        if !state.sessions.contains_key(&question.session_id) {
            return Err(StorageError::NotFound(question.session_id.to_string()));
        }
        state.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn question_by_id(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let state = self.state.read().await;
        Ok(state.questions.get(&id).cloned())
    }

    async fn questions(&self, session_id: SessionId) -> Result<Vec<Question>, StorageError> {
        let state = self.state.read().await;
        let mut rows: Vec<Question> = state
            .questions
            .values()
            .filter(|q| q.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by_key(|q| q.position);
        Ok(rows)
    }

    async fn active_question(
        &self,
        session_id: SessionId,
    ) -> Result<Option<Question>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .questions
            .values()
            .find(|q| q.session_id == session_id && q.is_active)
            .cloned())
    }

    async fn activate_question(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<Question, StorageError> {
        let mut state = self.state.write().await;
        if !state
            .questions
            .get(&question_id)
            .is_some_and(|q| q.session_id == session_id)
        {
            return Err(StorageError::NotFound(question_id.to_string()));
        }

        for question in state.questions.values_mut() {
            if question.session_id == session_id {
                question.is_active = question.id == question_id;
            }
        }
        let activated = state
            .questions
            .get_mut(&question_id)
            .ok_or_else(|| StorageError::NotFound(question_id.to_string()))?;
        activated.is_locked = false;
        activated.results_visible = false;
        let activated = activated.clone();

        if let Some(session) = state.sessions.get_mut(&session_id) {
            session.current_question = Some(question_id);
        }
        Ok(activated)
    }

    async fn set_question_locked(
        &self,
        question_id: QuestionId,
        locked: bool,
    ) -> Result<Question, StorageError> {
        let mut state = self.state.write().await;
        let question = state
            .questions
            .get_mut(&question_id)
            .ok_or_else(|| StorageError::NotFound(question_id.to_string()))?;
        question.is_locked = locked;
        Ok(question.clone())
    }

    async fn show_results(&self, question_id: QuestionId) -> Result<Question, StorageError> {
        let mut state = self.state.write().await;
        let question = state
            .questions
            .get_mut(&question_id)
            .ok_or_else(|| StorageError::NotFound(question_id.to_string()))?;
        question.results_visible = true;
        Ok(question.clone())
    }

    async fn submit_response(&self, response: NewResponse) -> Result<SubmitOutcome, StorageError> {
        let mut state = self.state.write().await;
        let key = (response.question_id, response.participant_id);
        if state.response_index.contains(&key) {
            return Ok(SubmitOutcome {
                is_duplicate: true,
                stored: None,
            });
        }
        state.response_index.insert(key);
        let stored = StoredResponse {
            id: Uuid::new_v4(),
            question_id: response.question_id,
            participant_id: response.participant_id,
            payload: response.payload,
            is_correct: response.is_correct,
            score: response.score,
            elapsed_ms: response.elapsed_ms,
            submitted_at: epoch_ms(),
        };
        state
            .responses
            .entry(response.question_id)
            .or_default()
            .push(stored.clone());
        Ok(SubmitOutcome {
            is_duplicate: false,
            stored: Some(stored),
        })
    }

    async fn submit_words(
        &self,
        question_id: QuestionId,
        participant_id: ParticipantId,
        words: Vec<(String, bool)>,
    ) -> Result<WordSubmitOutcome, StorageError> {
        let mut state = self.state.write().await;
        let key = (question_id, participant_id);
        if state.word_submitters.contains(&key) {
            return Ok(WordSubmitOutcome {
                is_duplicate: true,
                words: Vec::new(),
            });
        }
        state.word_submitters.insert(key);
        let rows: Vec<StoredWord> = words
            .into_iter()
            .map(|(word, flagged)| StoredWord {
                id: Uuid::new_v4(),
                question_id,
                participant_id,
                word,
                flagged,
            })
            .collect();
        state
            .words
            .entry(question_id)
            .or_default()
            .extend(rows.clone());
        Ok(WordSubmitOutcome {
            is_duplicate: false,
            words: rows,
        })
    }

    async fn submit_text_response(
        &self,
        question_id: QuestionId,
        participant_id: ParticipantId,
        text: String,
    ) -> Result<TextSubmitOutcome, StorageError> {
        let mut state = self.state.write().await;
        let key = (question_id, participant_id);
        if state.text_submitters.contains(&key) {
            return Ok(TextSubmitOutcome {
                is_duplicate: true,
                response: None,
            });
        }
        state.text_submitters.insert(key);
        let row = TextResponse {
            id: Uuid::new_v4(),
            question_id,
            participant_id,
            text,
            submitted_at: epoch_ms(),
        };
        state
            .texts
            .entry(question_id)
            .or_default()
            .push(row.clone());
        Ok(TextSubmitOutcome {
            is_duplicate: false,
            response: Some(row),
        })
    }

    async fn submit_idea(
        &self,
        question_id: QuestionId,
        participant_id: ParticipantId,
        text: String,
    ) -> Result<BrainstormIdea, StorageError> {
        let mut state = self.state.write().await;
        let idea = BrainstormIdea {
            id: Uuid::new_v4(),
            question_id,
            participant_id,
            text,
            votes: 0,
        };
        state.idea_parent.insert(idea.id, question_id);
        state
            .ideas
            .entry(question_id)
            .or_default()
            .push(idea.clone());
        Ok(idea)
    }

    async fn vote_idea(
        &self,
        idea_id: IdeaId,
        participant_id: ParticipantId,
    ) -> Result<VoteOutcome, StorageError> {
        let mut state = self.state.write().await;
        let question_id = *state
            .idea_parent
            .get(&idea_id)
            .ok_or_else(|| StorageError::NotFound(idea_id.to_string()))?;

        let key = (idea_id, participant_id);
        let action = if state.idea_votes.remove(&key) {
            VoteAction::Removed
        } else {
            state.idea_votes.insert(key);
            VoteAction::Added
        };

        let idea = state
            .ideas
            .get_mut(&question_id)
            .and_then(|ideas| ideas.iter_mut().find(|i| i.id == idea_id))
            .ok_or_else(|| StorageError::NotFound(idea_id.to_string()))?;
        match action {
            VoteAction::Added => idea.votes += 1,
            VoteAction::Removed => idea.votes = idea.votes.saturating_sub(1),
        }
        Ok(VoteOutcome {
            action,
            idea: idea.clone(),
        })
    }

    async fn responses(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<StoredResponse>, StorageError> {
        let state = self.state.read().await;
        Ok(state.responses.get(&question_id).cloned().unwrap_or_default())
    }

    async fn response_count(&self, question_id: QuestionId) -> Result<u64, StorageError> {
        let state = self.state.read().await;
        let count = match state.questions.get(&question_id).map(|q| q.kind) {
            Some(QuestionKind::WordCloud) => state
                .word_submitters
                .iter()
                .filter(|(q, _)| *q == question_id)
                .count(),
            Some(QuestionKind::OpenEnded) => state
                .texts
                .get(&question_id)
                .map_or(0, Vec::len),
            Some(QuestionKind::Brainstorm) => state
                .ideas
                .get(&question_id)
                .map_or(0, Vec::len),
            _ => state.responses.get(&question_id).map_or(0, Vec::len),
        };
        Ok(count as u64)
    }

    async fn words(&self, question_id: QuestionId) -> Result<Vec<StoredWord>, StorageError> {
        let state = self.state.read().await;
        Ok(state.words.get(&question_id).cloned().unwrap_or_default())
    }

    async fn text_responses(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<TextResponse>, StorageError> {
        let state = self.state.read().await;
        Ok(state.texts.get(&question_id).cloned().unwrap_or_default())
    }

    async fn ideas(&self, question_id: QuestionId) -> Result<Vec<BrainstormIdea>, StorageError> {
        let state = self.state.read().await;
        Ok(state.ideas.get(&question_id).cloned().unwrap_or_default())
    }
}
