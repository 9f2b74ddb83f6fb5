//! In-memory session backend
//!
//! Behaves like the real backend for a single logged-in user: conversations
//! created by other users show up in the new-chats feed, outgoing messages
//! are reported with the `"me"` sender marker, and incremental fetches
//! return messages strictly after the cursor. Tests script readiness delays
//! and failures and inspect the recorded calls.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::ChatBackend;
use crate::error::{ChatError, ChatResult};
use crate::models::{Message, OUTGOING_SENDER_MARKER, UserId};

/// Sender marker for messages written by the partner
const INCOMING_SENDER_MARKER: &str = "you";

/// A recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login(UserId),
    ChatsLoaded,
    ListChats,
    AddChat(UserId),
    GetMessages(UserId),
    GetNewMessages(UserId, DateTime<Utc>),
    SendMessage(UserId, String),
    NewChats,
    CloseApplication,
}

/// Selector for scripted failures
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallKind {
    Login,
    ChatsLoaded,
    ListChats,
    AddChat,
    /// Either message fetch for the given partner
    Messages(UserId),
    SendMessage,
    NewChats,
    CloseApplication,
}

impl Call {
    fn kind(&self) -> CallKind {
        match self {
            Call::Login(_) => CallKind::Login,
            Call::ChatsLoaded => CallKind::ChatsLoaded,
            Call::ListChats => CallKind::ListChats,
            Call::AddChat(_) => CallKind::AddChat,
            Call::GetMessages(p) | Call::GetNewMessages(p, _) => CallKind::Messages(p.clone()),
            Call::SendMessage(_, _) => CallKind::SendMessage,
            Call::NewChats => CallKind::NewChats,
            Call::CloseApplication => CallKind::CloseApplication,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    from: UserId,
    text: String,
    timestamp: DateTime<Utc>,
    id: u64,
}

#[derive(Default)]
struct ServerState {
    /// user id -> password digest
    accounts: HashMap<UserId, String>,
    session_user: Option<UserId>,
    /// Remaining `{loaded:false}` answers before readiness
    pending_ready_checks: u32,
    /// user id -> partners, in creation order
    chats: HashMap<UserId, Vec<UserId>>,
    /// unordered user pair -> messages sorted by timestamp
    messages: HashMap<(UserId, UserId), Vec<StoredMessage>>,
    /// user id -> partners that opened a chat with them since the last poll
    new_chats: HashMap<UserId, Vec<UserId>>,
    failures: HashMap<CallKind, VecDeque<ChatError>>,
    calls: Vec<Call>,
    next_message_id: u64,
    closed: bool,
}

fn pair_key(a: &UserId, b: &UserId) -> (UserId, UserId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

impl ServerState {
    /// Record the call and pop a scripted failure for it, if any
    fn enter(&mut self, call: Call) -> ChatResult<()> {
        let kind = call.kind();
        self.calls.push(call);
        match self.failures.get_mut(&kind).and_then(|queue| queue.pop_front()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn require_session(&self, user_id: &UserId) -> ChatResult<()> {
        match &self.session_user {
            Some(current) if current == user_id => Ok(()),
            _ => Err(ChatError::status(403, "unauthorized access")),
        }
    }

    fn link_chat(&mut self, owner: &UserId, partner: &UserId) -> bool {
        let partners = self.chats.entry(owner.clone()).or_default();
        if partners.contains(partner) {
            return false;
        }
        partners.push(partner.clone());
        true
    }

    fn store_message(&mut self, from: &UserId, to: &UserId, text: &str, timestamp: DateTime<Utc>) {
        self.next_message_id += 1;
        let id = self.next_message_id;

        let log = self.messages.entry(pair_key(from, to)).or_default();
        log.push(StoredMessage {
            from: from.clone(),
            text: text.to_string(),
            timestamp,
            id,
        });
        log.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        if self.link_chat(to, from) {
            self.new_chats.entry(to.clone()).or_default().push(from.clone());
        }
        self.link_chat(from, to);
    }

    fn history(&self, viewer: &UserId, partner: &UserId, since: Option<&DateTime<Utc>>) -> Vec<Message> {
        self.messages
            .get(&pair_key(viewer, partner))
            .map(|log| {
                log.iter()
                    .filter(|m| since.is_none_or(|since| m.timestamp > *since))
                    .map(|m| Message {
                        sender: if &m.from == viewer {
                            OUTGOING_SENDER_MARKER.to_string()
                        } else {
                            INCOMING_SENDER_MARKER.to_string()
                        },
                        text: m.text.clone(),
                        timestamp: m.timestamp,
                        id: Some(m.id.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-process stand-in for the session backend
#[derive(Default)]
pub struct InMemoryChatServer {
    state: Mutex<ServerState>,
}

impl InMemoryChatServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().expect("in-memory server lock poisoned")
    }

    /// Register an account with the digest its login must present
    pub fn register_account(&self, user_id: impl Into<UserId>, password_digest: impl Into<String>) {
        self.lock()
            .accounts
            .insert(user_id.into(), password_digest.into());
    }

    /// Answer `{loaded:false}` this many times before reporting readiness
    pub fn set_pending_ready_checks(&self, count: u32) {
        self.lock().pending_ready_checks = count;
    }

    /// Create a conversation between two users without going through the API
    pub fn seed_chat(&self, owner: impl Into<UserId>, partner: impl Into<UserId>) {
        let owner = owner.into();
        let partner = partner.into();
        let mut state = self.lock();
        state.link_chat(&owner, &partner);
        state.link_chat(&partner, &owner);
    }

    /// Deliver a message from `from` to `to`.
    ///
    /// If `to` had no conversation with `from`, it is queued on `to`'s
    /// new-chats feed.
    pub fn deliver(
        &self,
        from: impl Into<UserId>,
        to: impl Into<UserId>,
        text: &str,
        timestamp: DateTime<Utc>,
    ) {
        self.lock()
            .store_message(&from.into(), &to.into(), text, timestamp);
    }

    /// Fail the next call of `kind` with `error`
    pub fn fail_next(&self, kind: CallKind, error: ChatError) {
        self.lock()
            .failures
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls matching `kind`
    pub fn call_count(&self, kind: &CallKind) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| &c.kind() == kind)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl ChatBackend for InMemoryChatServer {
    fn login(&self, user_id: &UserId, password_digest: &str) -> ChatResult<()> {
        let mut state = self.lock();
        state.enter(Call::Login(user_id.clone()))?;

        match state.accounts.get(user_id) {
            Some(expected) if expected == password_digest => {
                state.session_user = Some(user_id.clone());
                state.closed = false;
                Ok(())
            }
            _ => Err(ChatError::status(401, "POST /api/login")),
        }
    }

    fn chats_loaded(&self) -> ChatResult<bool> {
        let mut state = self.lock();
        state.enter(Call::ChatsLoaded)?;

        if state.pending_ready_checks > 0 {
            state.pending_ready_checks -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn list_chats(&self, user_id: &UserId) -> ChatResult<Vec<UserId>> {
        let mut state = self.lock();
        state.enter(Call::ListChats)?;
        state.require_session(user_id)?;

        // Conversations listed here are known; drop them from the feed
        state.new_chats.remove(user_id);
        Ok(state.chats.get(user_id).cloned().unwrap_or_default())
    }

    fn add_chat(&self, user_id: &UserId, target: &UserId) -> ChatResult<()> {
        let mut state = self.lock();
        state.enter(Call::AddChat(target.clone()))?;
        state.require_session(user_id)?;

        if target == user_id || !state.accounts.contains_key(target) {
            return Err(ChatError::conflict(format!("invalid user id: {}", target)));
        }
        state.link_chat(user_id, target);
        if state.link_chat(target, user_id) {
            state
                .new_chats
                .entry(target.clone())
                .or_default()
                .push(user_id.clone());
        }
        Ok(())
    }

    fn get_messages(&self, user_id: &UserId, partner: &UserId) -> ChatResult<Vec<Message>> {
        let mut state = self.lock();
        state.enter(Call::GetMessages(partner.clone()))?;
        state.require_session(user_id)?;
        Ok(state.history(user_id, partner, None))
    }

    fn get_new_messages(
        &self,
        user_id: &UserId,
        partner: &UserId,
        since: &DateTime<Utc>,
    ) -> ChatResult<Vec<Message>> {
        let mut state = self.lock();
        state.enter(Call::GetNewMessages(partner.clone(), *since))?;
        state.require_session(user_id)?;
        Ok(state.history(user_id, partner, Some(since)))
    }

    fn send_message(
        &self,
        user_id: &UserId,
        target: &UserId,
        text: &str,
        timestamp: &DateTime<Utc>,
    ) -> ChatResult<()> {
        let mut state = self.lock();
        state.enter(Call::SendMessage(target.clone(), text.to_string()))?;
        state.require_session(user_id)?;
        state.store_message(user_id, target, text, *timestamp);
        Ok(())
    }

    fn new_chats(&self) -> ChatResult<Vec<UserId>> {
        let mut state = self.lock();
        state.enter(Call::NewChats)?;

        let Some(user) = state.session_user.clone() else {
            return Ok(Vec::new());
        };
        Ok(state.new_chats.remove(&user).unwrap_or_default())
    }

    fn close_application(&self) -> ChatResult<()> {
        let mut state = self.lock();
        state.enter(Call::CloseApplication)?;
        state.closed = true;
        state.session_user = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn logged_in(user: &str) -> InMemoryChatServer {
        let server = InMemoryChatServer::new();
        server.register_account(user, "digest");
        server.login(&UserId::new(user), "digest").unwrap();
        server
    }

    #[test]
    fn test_login_requires_matching_digest() {
        let server = InMemoryChatServer::new();
        server.register_account("alice", "good");

        let err = server.login(&UserId::new("alice"), "bad").unwrap_err();
        assert!(matches!(err, ChatError::Transport { status: Some(401), .. }));
        assert!(server.login(&UserId::new("alice"), "good").is_ok());
    }

    #[test]
    fn test_readiness_countdown() {
        let server = InMemoryChatServer::new();
        server.set_pending_ready_checks(2);

        assert!(!server.chats_loaded().unwrap());
        assert!(!server.chats_loaded().unwrap());
        assert!(server.chats_loaded().unwrap());
        assert_eq!(server.call_count(&CallKind::ChatsLoaded), 3);
    }

    #[test]
    fn test_incremental_fetch_is_strictly_after() {
        let server = logged_in("alice");
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let t0 = Utc::now() - Duration::minutes(10);

        server.deliver("bob", "alice", "one", t0);
        server.deliver("alice", "bob", "two", t0 + Duration::minutes(1));

        let all = server.get_messages(&alice, &bob).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].sender, "you");
        assert_eq!(all[1].sender, "me");

        let newer = server.get_new_messages(&alice, &bob, &t0).unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].text, "two");
    }

    #[test]
    fn test_incoming_chat_is_announced_once() {
        let server = logged_in("alice");
        server.deliver("carol", "alice", "hi", Utc::now());
        server.deliver("carol", "alice", "again", Utc::now());

        assert_eq!(server.new_chats().unwrap(), vec![UserId::new("carol")]);
        assert!(server.new_chats().unwrap().is_empty());
    }

    #[test]
    fn test_add_chat_rejects_unknown_and_self() {
        let server = logged_in("alice");
        server.register_account("bob", "x");
        let alice = UserId::new("alice");

        assert!(matches!(
            server.add_chat(&alice, &UserId::new("ghost")),
            Err(ChatError::Conflict { .. })
        ));
        assert!(matches!(
            server.add_chat(&alice, &alice),
            Err(ChatError::Conflict { .. })
        ));
        assert!(server.add_chat(&alice, &UserId::new("bob")).is_ok());
        assert_eq!(server.list_chats(&alice).unwrap(), vec![UserId::new("bob")]);
    }

    #[test]
    fn test_scripted_failure_is_consumed() {
        let server = logged_in("alice");
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        server.fail_next(CallKind::Messages(bob.clone()), ChatError::status(502, "test"));

        assert!(server.get_messages(&alice, &bob).is_err());
        assert!(server.get_messages(&alice, &bob).is_ok());
    }
}
