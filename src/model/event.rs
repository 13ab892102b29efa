use super::aggregate::Aggregate;
use super::question::{CorrectAnswer, QuestionPublic};
use super::response::{BrainstormIdea, LeaderboardEntry, ResponsePayload, TextResponse};
use super::session::SessionMode;
use super::{IdeaId, ParticipantId, QuestionId, SessionId};
use serde::{Deserialize, Serialize};

/// Closed error-code enumeration. The kebab-case tags are a contract with
/// the client and never grow ad hoc: conditions without a dedicated code
/// (unknown question, malformed payload, store faults) surface as
/// `invalid-session` with a descriptive message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    SessionNotFound,
    SessionEnded,
    ProfanityDetected,
    ParticipantRemoved,
    QuestionLocked,
    DuplicateResponse,
    InvalidSession,
    Unauthorized,
}

/// Requests clients send over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Join {
        code: String,
        nickname: String,
        cookie_id: String,
    },
    JoinPresenter {
        code: String,
    },
    ActivateQuestion {
        question_id: QuestionId,
    },
    LockQuestion {
        question_id: QuestionId,
        locked: bool,
    },
    RevealResults {
        question_id: QuestionId,
    },
    SubmitResponse {
        question_id: QuestionId,
        payload: ResponsePayload,
    },
    SubmitWords {
        question_id: QuestionId,
        words: Vec<String>,
    },
    SubmitText {
        question_id: QuestionId,
        text: String,
    },
    SubmitIdea {
        question_id: QuestionId,
        text: String,
    },
    VoteIdea {
        idea_id: IdeaId,
    },
    RemoveParticipant {
        participant_id: ParticipantId,
    },
    EndSession,
}

/// Snapshot of the currently active question, sent to late joiners so their
/// view converges immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveQuestion {
    pub question: QuestionPublic,
    pub response_count: u64,
    /// Server timestamp of activation (epoch ms); clients derive remaining
    /// time from this, not from their own clocks.
    pub activated_at: u64,
    /// Present only when the presenter has already revealed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Aggregate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub participant_id: ParticipantId,
    pub nickname: String,
    pub is_connected: bool,
}

/// Events the server pushes to clients. Tag names and payload shapes are a
/// stable contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    SessionJoined {
        session_id: SessionId,
        code: String,
        mode: SessionMode,
        /// Absent for presenter connections.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        participant_id: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
        reconnected: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        active_question: Option<ActiveQuestion>,
        /// Presenter connections get the current roster.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        participants: Option<Vec<ParticipantInfo>>,
    },
    ParticipantJoined {
        participant_id: ParticipantId,
        nickname: String,
        connected_count: u64,
    },
    ParticipantLeft {
        participant_id: ParticipantId,
        connected_count: u64,
    },
    ParticipantRemoved {
        participant_id: ParticipantId,
    },
    QuestionActivated {
        question: QuestionPublic,
        response_count: u64,
        activated_at: u64,
    },
    QuestionLocked {
        question_id: QuestionId,
        locked: bool,
    },
    ResultsRevealed {
        question_id: QuestionId,
        results: Aggregate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<CorrectAnswer>,
    },
    /// Acknowledgement to the submitter only.
    ResponseSubmitted {
        question_id: QuestionId,
        duplicate: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_correct: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<i64>,
    },
    ResponseCountUpdated {
        question_id: QuestionId,
        count: u64,
    },
    /// Presenter scope only: live aggregate before reveal.
    ResultsUpdated {
        question_id: QuestionId,
        results: Aggregate,
    },
    /// Presenter scope only.
    WordCloudUpdated {
        question_id: QuestionId,
        results: Aggregate,
    },
    /// Presenter scope only.
    TextResponseReceived {
        question_id: QuestionId,
        response: TextResponse,
    },
    IdeaSubmitted {
        question_id: QuestionId,
        idea: BrainstormIdea,
    },
    IdeaVotesUpdated {
        question_id: QuestionId,
        idea_id: IdeaId,
        votes: u32,
    },
    LeaderboardUpdated {
        entries: Vec<LeaderboardEntry>,
    },
    SessionEnded {
        session_id: SessionId,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::SessionNotFound).unwrap(),
            "\"session-not-found\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::QuestionLocked).unwrap(),
            "\"question-locked\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::DuplicateResponse).unwrap(),
            "\"duplicate-response\""
        );
    }

    #[test]
    fn request_round_trip() {
        let raw = r#"{"type":"join","code":"ABC234","nickname":"Alice","cookie_id":"c-1"}"#;
        let req: ClientRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(
            req,
            ClientRequest::Join {
                code: "ABC234".to_string(),
                nickname: "Alice".to_string(),
                cookie_id: "c-1".to_string(),
            }
        );
    }

    #[test]
    fn event_tag_is_stable() {
        let event = ServerEvent::ResponseCountUpdated {
            question_id: uuid::Uuid::nil(),
            count: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "response_count_updated");
        assert_eq!(json["count"], 3);
    }
}
