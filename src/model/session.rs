use super::{QuestionId, SessionId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of the human-entered join code.
pub const JOIN_CODE_LEN: usize = 6;

/// Alphabet for join codes. Excludes 0/O and 1/I to keep codes readable
/// when dictated aloud.
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Mixed,
    Engagement,
    Quiz,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Mixed => write!(f, "mixed"),
            SessionMode::Engagement => write!(f, "engagement"),
            SessionMode::Quiz => write!(f, "quiz"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// One live engagement event: a join code, a presenter, and zero or more
/// participants. Created once by presenter action; status transitions are
/// presenter-driven only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub code: String,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub current_question: Option<QuestionId>,
    pub expires_at: u64,
}

impl Session {
    pub fn new(code: String, mode: SessionMode, expires_at: u64) -> Self {
        Session {
            id: Uuid::new_v4(),
            code,
            mode,
            status: SessionStatus::Active,
            current_question: None,
            expires_at,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }
}

/// Generate a fixed-width alphanumeric join code. Uniqueness is enforced by
/// the store, which retries on collision.
pub fn generate_join_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LEN)
        .map(|_| {
            let i = rng.gen_range(0..JOIN_CODE_ALPHABET.len());
            JOIN_CODE_ALPHABET[i] as char
        })
        .collect()
}
