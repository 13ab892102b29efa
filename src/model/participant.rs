use super::{ConnectionId, ParticipantId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role within the session - determines authority over control actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Controls question lifecycle, removal, session end
    Presenter,
    /// Submits responses, sees results after reveal
    Participant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Presenter => write!(f, "presenter"),
            Role::Participant => write!(f, "participant"),
        }
    }
}

/// A participant row. One row per (session, cookie) pair; rejoin attempts
/// with the same cookie reuse the row with a fresh connection id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub session_id: SessionId,
    /// Stable per-browser identifier used to deduplicate rejoins.
    pub cookie_id: String,
    /// Ephemeral; replaced on every reconnect.
    pub connection_id: Option<ConnectionId>,
    pub nickname: String,
    pub score: i64,
    pub is_connected: bool,
    /// Soft removal: historical responses are retained.
    pub is_removed: bool,
    /// Insertion order within the session, used for leaderboard tie-breaks.
    pub joined_seq: u64,
}

impl Participant {
    pub fn new(
        session_id: SessionId,
        cookie_id: String,
        connection_id: ConnectionId,
        nickname: String,
        joined_seq: u64,
    ) -> Self {
        Participant {
            id: Uuid::new_v4(),
            session_id,
            cookie_id,
            connection_id: Some(connection_id),
            nickname,
            score: 0,
            is_connected: true,
            is_removed: false,
            joined_seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_participant_is_connected_with_zero_score() {
        let p = Participant::new(
            Uuid::new_v4(),
            "cookie-1".to_string(),
            Uuid::new_v4(),
            "Alice".to_string(),
            0,
        );
        assert!(p.is_connected);
        assert!(!p.is_removed);
        assert_eq!(p.score, 0);
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Presenter).unwrap(), "\"presenter\"");
    }
}
