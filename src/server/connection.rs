use crate::engine::{ClientIdentity, Coordinator, SessionError};
use crate::model::{ClientRequest, ConnectionId, ErrorCode, ServerEvent};
use crate::registry::EventSender;
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Per-connection state, owned by the connection task for the lifetime of
/// the socket. Binds the socket to a resolved identity after a join and
/// routes every subsequent request through the coordinator with that
/// identity, never with identities taken from payloads.
#[derive(Clone)]
pub struct ConnectionHandler {
    connection_id: ConnectionId,
    identity: Arc<RwLock<Option<ClientIdentity>>>,
    coordinator: Arc<Coordinator>,
    sender: EventSender,
}

impl ConnectionHandler {
    pub fn new(coordinator: Arc<Coordinator>, sender: EventSender) -> Self {
        ConnectionHandler {
            connection_id: Uuid::new_v4(),
            identity: Arc::new(RwLock::new(None)),
            coordinator,
            sender,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn identity(&self) -> Option<ClientIdentity> {
        *self.identity.read().unwrap_or_else(|e| e.into_inner())
    }

    #[instrument(skip(self, request), fields(connection_id = %self.connection_id))]
    pub async fn handle_request(&self, request: ClientRequest) {
        match self.dispatch(request).await {
            Ok(Some(ack)) => self.send(ack),
            Ok(None) => {}
            Err(err) => {
                // Failed control actions must not tear down the handler;
                // the requester gets the coded error and can retry.
                warn!(%err, "request rejected");
                self.send(ServerEvent::Error {
                    code: err.code(),
                    message: err.public_message(),
                });
            }
        }
    }

    async fn dispatch(&self, request: ClientRequest) -> Result<Option<ServerEvent>, SessionError> {
        match request {
            ClientRequest::Join {
                code,
                nickname,
                cookie_id,
            } => {
                let (identity, ack) = self
                    .coordinator
                    .join_participant(
                        &code,
                        &nickname,
                        &cookie_id,
                        self.connection_id,
                        self.sender.clone(),
                    )
                    .await?;
                self.bind(identity);
                Ok(Some(ack))
            }
            ClientRequest::JoinPresenter { code } => {
                let (identity, ack) = self
                    .coordinator
                    .join_presenter(&code, self.connection_id, self.sender.clone())
                    .await?;
                self.bind(identity);
                Ok(Some(ack))
            }
            ClientRequest::ActivateQuestion { question_id } => {
                let identity = self.require_identity()?;
                self.coordinator
                    .activate_question(&identity, question_id)
                    .await?;
                Ok(None)
            }
            ClientRequest::LockQuestion {
                question_id,
                locked,
            } => {
                let identity = self.require_identity()?;
                self.coordinator
                    .lock_question(&identity, question_id, locked)
                    .await?;
                Ok(None)
            }
            ClientRequest::RevealResults { question_id } => {
                let identity = self.require_identity()?;
                self.coordinator
                    .reveal_results(&identity, question_id)
                    .await?;
                Ok(None)
            }
            ClientRequest::SubmitResponse {
                question_id,
                payload,
            } => {
                let identity = self.require_identity()?;
                self.coordinator
                    .submit_response(&identity, self.connection_id, question_id, payload)
                    .await?;
                Ok(None)
            }
            ClientRequest::SubmitWords { question_id, words } => {
                let identity = self.require_identity()?;
                self.coordinator
                    .submit_words(&identity, self.connection_id, question_id, words)
                    .await?;
                Ok(None)
            }
            ClientRequest::SubmitText { question_id, text } => {
                let identity = self.require_identity()?;
                self.coordinator
                    .submit_text(&identity, self.connection_id, question_id, text)
                    .await?;
                Ok(None)
            }
            ClientRequest::SubmitIdea { question_id, text } => {
                let identity = self.require_identity()?;
                self.coordinator
                    .submit_idea(&identity, self.connection_id, question_id, text)
                    .await?;
                Ok(None)
            }
            ClientRequest::VoteIdea { idea_id } => {
                let identity = self.require_identity()?;
                self.coordinator.vote_idea(&identity, idea_id).await?;
                Ok(None)
            }
            ClientRequest::RemoveParticipant { participant_id } => {
                let identity = self.require_identity()?;
                self.coordinator
                    .remove_participant(&identity, participant_id)
                    .await?;
                Ok(None)
            }
            ClientRequest::EndSession => {
                let identity = self.require_identity()?;
                self.coordinator.end_session(&identity).await?;
                Ok(None)
            }
        }
    }

    /// Tell the client its frame was unparseable without dropping the
    /// socket.
    pub fn reject_malformed(&self) {
        self.send(ServerEvent::Error {
            code: ErrorCode::InvalidSession,
            message: "malformed request".to_string(),
        });
    }

    #[instrument(skip(self), fields(connection_id = %self.connection_id))]
    pub async fn disconnect(&self) {
        let identity = self.identity();
        self.coordinator
            .disconnect(identity.as_ref(), self.connection_id)
            .await;
    }

    fn bind(&self, identity: ClientIdentity) {
        self.identity
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .replace(identity);
    }

    fn require_identity(&self) -> Result<ClientIdentity, SessionError> {
        self.identity().ok_or(SessionError::Unauthorized)
    }

    fn send(&self, event: ServerEvent) {
        if self.sender.send(event).is_err() {
            debug!(connection_id = %self.connection_id, "receiver task gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DenyListFilter;
    use crate::model::{Question, QuestionKind, SessionMode};
    use crate::registry::SessionRegistry;
    use crate::storage::{MemoryStore, SessionStore};
    use tokio::sync::mpsc;

    async fn setup() -> (Arc<Coordinator>, Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let session = store
            .create_session(SessionMode::Mixed, u64::MAX)
            .await
            .unwrap();
        store
            .add_question(
                Question::new(session.id, QuestionKind::Poll, "Lunch?".to_string(), 0)
                    .with_options(vec!["pizza".to_string(), "sushi".to_string()]),
            )
            .await
            .unwrap();
        let coordinator = Arc::new(Coordinator::new(
            store.clone(),
            Arc::new(SessionRegistry::new()),
            Arc::new(DenyListFilter::permissive()),
        ));
        (coordinator, store, session.code)
    }

    #[tokio::test]
    async fn join_binds_identity_and_acks() {
        let (coordinator, _, code) = setup().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = ConnectionHandler::new(coordinator, tx);
        assert!(handler.identity().is_none());

        handler
            .handle_request(ClientRequest::Join {
                code,
                nickname: "Alice".to_string(),
                cookie_id: "c-1".to_string(),
            })
            .await;

        assert!(matches!(
            handler.identity(),
            Some(ClientIdentity::Participant { .. })
        ));
        // participant_joined broadcast, then the session_joined ack.
        let first = rx.try_recv().unwrap();
        assert!(matches!(first, ServerEvent::ParticipantJoined { .. }));
        let second = rx.try_recv().unwrap();
        assert!(matches!(second, ServerEvent::SessionJoined { .. }));
    }

    #[tokio::test]
    async fn requests_before_join_are_unauthorized() {
        let (coordinator, _, _) = setup().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = ConnectionHandler::new(coordinator, tx);

        handler.handle_request(ClientRequest::EndSession).await;

        match rx.try_recv().unwrap() {
            ServerEvent::Error { code, .. } => assert_eq!(code, ErrorCode::Unauthorized),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_join_code_is_reported() {
        let (coordinator, _, _) = setup().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = ConnectionHandler::new(coordinator, tx);

        handler
            .handle_request(ClientRequest::Join {
                code: "ZZZZZZ".to_string(),
                nickname: "Alice".to_string(),
                cookie_id: "c-1".to_string(),
            })
            .await;

        match rx.try_recv().unwrap() {
            ServerEvent::Error { code, .. } => assert_eq!(code, ErrorCode::SessionNotFound),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(handler.identity().is_none());
    }
}
