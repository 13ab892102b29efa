use super::{IdeaId, ParticipantId, QuestionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type-specific submission payload. Poll, quiz, scale, ranking and pin
/// responses share one stored row shape; the variant tag is the contract
/// with the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    OptionIndex { index: usize },
    Number { value: f64 },
    Ranking { order: Vec<usize> },
    Pin { x: f64, y: f64 },
    Text { text: String },
}

/// A stored response row. Immutable once created; at most one per
/// (question, participant), enforced by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub id: Uuid,
    pub question_id: QuestionId,
    pub participant_id: ParticipantId,
    pub payload: ResponsePayload,
    /// Quiz kinds only.
    pub is_correct: Option<bool>,
    pub score: i64,
    pub elapsed_ms: Option<u64>,
    pub submitted_at: u64,
}

/// One normalized word of a word-cloud submission. Flagged words are
/// retained but excluded from the visible cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWord {
    pub id: Uuid,
    pub question_id: QuestionId,
    pub participant_id: ParticipantId,
    pub word: String,
    pub flagged: bool,
}

/// Open-text response, streamed to the presenter scope as it arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextResponse {
    pub id: Uuid,
    pub question_id: QuestionId,
    pub participant_id: ParticipantId,
    pub text: String,
    pub submitted_at: u64,
}

/// A brainstorm idea. `question_id` is explicit so vote re-broadcasts never
/// infer the parent question from the idea id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainstormIdea {
    pub id: IdeaId,
    pub question_id: QuestionId,
    pub participant_id: ParticipantId,
    pub text: String,
    pub votes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub participant_id: ParticipantId,
    pub nickname: String,
    pub score: i64,
}
