mod memory;

pub use memory::MemoryStore;

use crate::model::{
    BrainstormIdea, ConnectionId, IdeaId, LeaderboardEntry, Participant, ParticipantId, Question,
    QuestionId, ResponsePayload, Session, SessionId, SessionMode, SessionStatus, StoredResponse,
    StoredWord, TextResponse,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A response submission waiting for an id and timestamp from the store.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub question_id: QuestionId,
    pub participant_id: ParticipantId,
    pub payload: ResponsePayload,
    pub is_correct: Option<bool>,
    pub score: i64,
    pub elapsed_ms: Option<u64>,
}

/// Result of an insert under the (question, participant) uniqueness
/// constraint. A duplicate is a normal concurrent-submission outcome, not
/// an error.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub is_duplicate: bool,
    pub stored: Option<StoredResponse>,
}

#[derive(Debug, Clone)]
pub struct WordSubmitOutcome {
    pub is_duplicate: bool,
    pub words: Vec<StoredWord>,
}

#[derive(Debug, Clone)]
pub struct TextSubmitOutcome {
    pub is_duplicate: bool,
    pub response: Option<TextResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Added,
    Removed,
}

#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub action: VoteAction,
    /// The updated idea row; carries its parent question id so callers
    /// never infer the re-broadcast scope from the idea id.
    pub idea: BrainstormIdea,
}

/// The data-access contract the coordination engine consumes. The store is
/// the system of record and the final arbiter of the uniqueness and
/// cascade-delete invariants; the in-memory registry is only a
/// coordination layer on top of it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    // Sessions
    async fn create_session(
        &self,
        mode: SessionMode,
        expires_at: u64,
    ) -> Result<Session, StorageError>;
    async fn session_by_code(&self, code: &str) -> Result<Option<Session>, StorageError>;
    async fn session_by_id(&self, id: SessionId) -> Result<Option<Session>, StorageError>;
    async fn update_session_status(
        &self,
        id: SessionId,
        status: SessionStatus,
    ) -> Result<(), StorageError>;

    // Participants
    /// Returns the participant row for (session, cookie), creating it on
    /// first join. The second element is true when the row was created.
    /// Rejoins refresh the connection id and connectivity flag; removed
    /// rows are returned untouched for the caller to reject.
    async fn get_or_create_participant(
        &self,
        session_id: SessionId,
        cookie_id: &str,
        connection_id: ConnectionId,
        nickname: &str,
    ) -> Result<(Participant, bool), StorageError>;
    async fn disconnect_participant(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<Participant>, StorageError>;
    async fn remove_participant(&self, participant_id: ParticipantId) -> Result<(), StorageError>;
    async fn participant_by_id(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Option<Participant>, StorageError>;
    async fn participants(&self, session_id: SessionId) -> Result<Vec<Participant>, StorageError>;
    async fn add_score(
        &self,
        participant_id: ParticipantId,
        points: i64,
    ) -> Result<(), StorageError>;
    async fn leaderboard(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StorageError>;

    // Questions
    async fn add_question(&self, question: Question) -> Result<Question, StorageError>;
    async fn question_by_id(&self, id: QuestionId) -> Result<Option<Question>, StorageError>;
    async fn questions(&self, session_id: SessionId) -> Result<Vec<Question>, StorageError>;
    async fn active_question(
        &self,
        session_id: SessionId,
    ) -> Result<Option<Question>, StorageError>;
    /// Activates the target and deactivates any other active question in
    /// the session; clears the lock and reveal flags on the target.
    async fn activate_question(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<Question, StorageError>;
    async fn set_question_locked(
        &self,
        question_id: QuestionId,
        locked: bool,
    ) -> Result<Question, StorageError>;
    async fn show_results(&self, question_id: QuestionId) -> Result<Question, StorageError>;

    // Submissions
    async fn submit_response(&self, response: NewResponse) -> Result<SubmitOutcome, StorageError>;
    /// `words` pairs each normalized word with its content-filter flag.
    async fn submit_words(
        &self,
        question_id: QuestionId,
        participant_id: ParticipantId,
        words: Vec<(String, bool)>,
    ) -> Result<WordSubmitOutcome, StorageError>;
    async fn submit_text_response(
        &self,
        question_id: QuestionId,
        participant_id: ParticipantId,
        text: String,
    ) -> Result<TextSubmitOutcome, StorageError>;
    async fn submit_idea(
        &self,
        question_id: QuestionId,
        participant_id: ParticipantId,
        text: String,
    ) -> Result<BrainstormIdea, StorageError>;
    /// Toggle: a second vote from the same participant removes the first.
    async fn vote_idea(
        &self,
        idea_id: IdeaId,
        participant_id: ParticipantId,
    ) -> Result<VoteOutcome, StorageError>;

    // Aggregate-read queries (raw rows; the engine computes summaries)
    async fn responses(&self, question_id: QuestionId)
        -> Result<Vec<StoredResponse>, StorageError>;
    /// Responses to the question in the unit natural to its kind: rows for
    /// the shared shape, distinct submitters for word clouds, text rows
    /// for open-ended, ideas for brainstorms.
    async fn response_count(&self, question_id: QuestionId) -> Result<u64, StorageError>;
    async fn words(&self, question_id: QuestionId) -> Result<Vec<StoredWord>, StorageError>;
    async fn text_responses(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<TextResponse>, StorageError>;
    async fn ideas(&self, question_id: QuestionId) -> Result<Vec<BrainstormIdea>, StorageError>;
}
