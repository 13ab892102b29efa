mod aggregate;
mod event;
mod participant;
mod question;
mod response;
mod session;

pub use aggregate::{Aggregate, NpsBreakdown, PinPoint, RankedOption, WordWeight};
pub use event::{ActiveQuestion, ClientRequest, ErrorCode, ParticipantInfo, ServerEvent};
pub use participant::{Participant, Role};
pub use question::{CorrectAnswer, Question, QuestionKind, QuestionPublic, QuestionSettings};
pub use response::{
    BrainstormIdea, LeaderboardEntry, ResponsePayload, StoredResponse, StoredWord, TextResponse,
};
pub use session::{Session, SessionMode, SessionStatus, generate_join_code, JOIN_CODE_LEN};

use uuid::Uuid;

pub type SessionId = Uuid;
pub type ParticipantId = Uuid;
pub type QuestionId = Uuid;
pub type IdeaId = Uuid;
pub type ConnectionId = Uuid;

/// Milliseconds since the Unix epoch, from the server clock.
///
/// Clients compute remaining time against timestamps produced here, never
/// against their local clocks.
pub fn epoch_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
