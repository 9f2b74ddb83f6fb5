//! Backend trait definition

use chrono::{DateTime, Utc};

use crate::error::ChatResult;
use crate::models::{Message, UserId};

/// Operations the session backend exposes.
///
/// Implementations are blocking; callers decide which thread waits on them.
/// Every method maps a failed round-trip to `ChatError::Transport` and an
/// unreadable payload to `ChatError::Protocol`.
pub trait ChatBackend: Send + Sync {
    /// Authenticate the local user with a pre-hashed password
    fn login(&self, user_id: &UserId, password_digest: &str) -> ChatResult<()>;

    /// Whether the backend finished loading the session's conversations
    fn chats_loaded(&self) -> ChatResult<bool>;

    /// Partners the user already has conversations with
    fn list_chats(&self, user_id: &UserId) -> ChatResult<Vec<UserId>>;

    /// Create a conversation with `target`.
    ///
    /// Returns `ChatError::Conflict` when the backend reports the target invalid.
    fn add_chat(&self, user_id: &UserId, target: &UserId) -> ChatResult<()>;

    /// Full history with `partner`, oldest first
    fn get_messages(&self, user_id: &UserId, partner: &UserId) -> ChatResult<Vec<Message>>;

    /// Messages with `partner` strictly after `since`, oldest first
    fn get_new_messages(
        &self,
        user_id: &UserId,
        partner: &UserId,
        since: &DateTime<Utc>,
    ) -> ChatResult<Vec<Message>>;

    /// Store an outgoing message
    fn send_message(
        &self,
        user_id: &UserId,
        target: &UserId,
        text: &str,
        timestamp: &DateTime<Utc>,
    ) -> ChatResult<()>;

    /// Conversations other users opened with us since the last call
    fn new_chats(&self) -> ChatResult<Vec<UserId>>;

    /// Ask the backend to shut the session down
    fn close_application(&self) -> ChatResult<()>;

    /// Incremental fetch: strictly after `since` when a cursor exists,
    /// full history otherwise
    fn fetch_messages(
        &self,
        user_id: &UserId,
        partner: &UserId,
        since: Option<&DateTime<Utc>>,
    ) -> ChatResult<Vec<Message>> {
        match since {
            Some(since) => self.get_new_messages(user_id, partner, since),
            None => self.get_messages(user_id, partner),
        }
    }
}
