use crate::model::{ConnectionId, ParticipantId, QuestionId, Role, ServerEvent, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Process-wide map from session id to live session state. Each entry is
/// behind its own mutex, so control actions on one session serialize while
/// other sessions progress independently.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<LiveSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Entries are created on first activity for a session.
    pub async fn get_or_create(&self, session_id: SessionId) -> Arc<Mutex<LiveSession>> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(LiveSession::new(session_id))))
            .clone()
    }

    pub async fn get(&self, session_id: SessionId) -> Option<Arc<Mutex<LiveSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(&session_id).cloned()
    }

    /// Drop a session's live state. Called on session end; the store
    /// remains the system of record for everything durable.
    pub async fn evict(&self, session_id: SessionId) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&session_id).is_some() {
            debug!(%session_id, "evicted live session");
        }
    }

    /// Evict sessions with no connections that have been idle longer than
    /// `max_idle`. Returns how many entries were dropped.
    pub async fn purge_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut stale = Vec::new();
        for (id, live) in sessions.iter() {
            if let Ok(guard) = live.try_lock() {
                if guard.room.is_empty() && guard.idle_for() > max_idle {
                    stale.push(*id);
                }
            }
        }
        for id in &stale {
            sessions.remove(id);
        }
        stale.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Live activation state of the session's current question. Mirrors the
/// store flags for the hot path; on ambiguity the store wins.
#[derive(Debug, Clone, Copy)]
pub struct ActiveQuestionState {
    pub question_id: QuestionId,
    pub locked: bool,
    pub results_visible: bool,
    /// Server timestamp (epoch ms) used for elapsed-time scoring and for
    /// client countdowns.
    pub activated_at: u64,
}

/// Mutable live state for one session: the active-question pointer, the
/// connected-participant set, and the broadcast room. Only ever mutated
/// while holding the session mutex.
pub struct LiveSession {
    session_id: SessionId,
    active: Option<ActiveQuestionState>,
    connected: HashMap<ParticipantId, ConnectionId>,
    room: Room,
    last_active: Instant,
}

impl LiveSession {
    fn new(session_id: SessionId) -> Self {
        LiveSession {
            session_id,
            active: None,
            connected: HashMap::new(),
            room: Room::default(),
            last_active: Instant::now(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn active(&self) -> Option<&ActiveQuestionState> {
        self.active.as_ref()
    }

    pub fn set_active(&mut self, question_id: QuestionId, activated_at: u64) {
        self.active = Some(ActiveQuestionState {
            question_id,
            locked: false,
            results_visible: false,
            activated_at,
        });
        self.touch();
    }

    pub fn set_locked(&mut self, question_id: QuestionId, locked: bool) {
        if let Some(active) = self.active.as_mut() {
            if active.question_id == question_id {
                active.locked = locked;
            }
        }
        self.touch();
    }

    pub fn set_results_visible(&mut self, question_id: QuestionId) {
        if let Some(active) = self.active.as_mut() {
            if active.question_id == question_id {
                active.results_visible = true;
            }
        }
        self.touch();
    }

    pub fn subscribe(&mut self, connection_id: ConnectionId, role: Role, sender: EventSender) {
        self.room.members.insert(connection_id, RoomMember { role, sender });
        self.touch();
    }

    pub fn unsubscribe(&mut self, connection_id: ConnectionId) {
        self.room.members.remove(&connection_id);
        self.touch();
    }

    pub fn connect_participant(&mut self, participant_id: ParticipantId, connection_id: ConnectionId) {
        self.connected.insert(participant_id, connection_id);
        self.touch();
    }

    pub fn disconnect_participant(&mut self, participant_id: ParticipantId) {
        self.connected.remove(&participant_id);
        self.touch();
    }

    pub fn is_participant_connected(&self, participant_id: ParticipantId) -> bool {
        self.connected.contains_key(&participant_id)
    }

    /// The live set is authoritative for this count; the store's
    /// `is_connected` flag is bookkeeping.
    pub fn connected_count(&self) -> u64 {
        self.connected.len() as u64
    }

    /// Send to everyone in the session: participants and presenter.
    pub fn broadcast(&mut self, event: &ServerEvent) {
        self.room.send_where(event, |_| true);
        self.touch();
    }

    /// Send to presenter connections only. Participants never see live
    /// aggregates before an explicit reveal.
    pub fn broadcast_presenter(&mut self, event: &ServerEvent) {
        self.room.send_where(event, |m| m.role == Role::Presenter);
        self.touch();
    }

    /// Send to a single connection, ahead of any broadcast issued after it
    /// under the same lock.
    pub fn send_to(&mut self, connection_id: ConnectionId, event: &ServerEvent) {
        if let Some(member) = self.room.members.get(&connection_id) {
            if member.sender.send(event.clone()).is_err() {
                debug!(%connection_id, "dropping dead room member");
                self.room.members.remove(&connection_id);
            }
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

struct RoomMember {
    role: Role,
    sender: EventSender,
}

/// The set of live subscriber handles for one session. Broadcasts happen
/// under the session mutex, so every client observes them in the order the
/// coordinator issued them.
#[derive(Default)]
struct Room {
    members: HashMap<ConnectionId, RoomMember>,
}

impl Room {
    fn send_where(&mut self, event: &ServerEvent, keep: impl Fn(&RoomMember) -> bool) {
        // A failed send means the receiver task is gone; drop the member.
        self.members.retain(|connection_id, member| {
            if !keep(member) {
                return true;
            }
            match member.sender.send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(%connection_id, "dropping dead room member");
                    false
                }
            }
        });
    }

    fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
