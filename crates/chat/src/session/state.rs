//! Shared session state and the operations that mutate it
//!
//! Every directory and cursor change happens under the one state lock, which
//! is the single writer for the session. Network calls and observer
//! callbacks run with the lock released.

use chrono::{Local, SubsecRound, Utc};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::{SessionEvent, SessionObserver, SessionPhase, dispatch};
use crate::error::{ChatError, ChatResult};
use crate::models::{Conversation, UserId};
use crate::remote::ChatBackend;
use crate::storage::BucketStore;
use crate::sync::{ConversationDirectory, CursorStore, StopSignal, SyncPasses, SyncStats};
use crate::timeline::{MergeView, RenderPlan, merge_batch, merge_local, render_history};

pub(crate) struct SessionState {
    pub(crate) phase: SessionPhase,
    pub(crate) user: Option<UserId>,
    /// Password digest kept for the lifetime of the session only
    pub(crate) password_digest: Option<String>,
    pub(crate) open: Option<UserId>,
    /// Set once the first full message pass after bootstrap finishes
    pub(crate) initial_load_complete: bool,
    pub(crate) directory: ConversationDirectory,
    pub(crate) cursors: CursorStore,
}

impl SessionState {
    fn new(buckets: Arc<dyn BucketStore>) -> Self {
        Self {
            phase: SessionPhase::Anonymous,
            user: None,
            password_digest: None,
            open: None,
            initial_load_complete: false,
            directory: ConversationDirectory::new(),
            cursors: CursorStore::new(buckets),
        }
    }

    /// The session user, if conversation operations are allowed right now
    pub(crate) fn active_user(&self) -> ChatResult<UserId> {
        match (&self.phase, &self.user) {
            (SessionPhase::Active, Some(user)) => Ok(user.clone()),
            (phase, _) => Err(ChatError::invalid_state(format!("session is {}", phase))),
        }
    }

    /// Whether results fetched for `user` may still be applied
    fn accepts_results_for(&self, user: &UserId) -> bool {
        self.phase.is_active() && self.user.as_ref() == Some(user)
    }

    fn view_of(&self, partner: &UserId) -> MergeView {
        MergeView {
            is_open: self.open.as_ref() == Some(partner),
            initial_load_complete: self.initial_load_complete,
        }
    }

    /// Forget everything tied to the logged-in user
    pub(crate) fn clear(&mut self) {
        self.user = None;
        self.password_digest = None;
        self.open = None;
        self.initial_load_complete = false;
        self.directory = ConversationDirectory::new();
        self.cursors.unbind();
    }
}

pub(crate) struct SessionCore {
    pub(crate) backend: Arc<dyn ChatBackend>,
    observer: Arc<dyn SessionObserver>,
    state: Mutex<SessionState>,
}

impl SessionCore {
    pub(crate) fn new(
        backend: Arc<dyn ChatBackend>,
        observer: Arc<dyn SessionObserver>,
        buckets: Arc<dyn BucketStore>,
    ) -> Self {
        Self {
            backend,
            observer,
            state: Mutex::new(SessionState::new(buckets)),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state lock poisoned")
    }

    pub(crate) fn emit(&self, events: impl IntoIterator<Item = SessionEvent>) {
        for event in events {
            dispatch(self.observer.as_ref(), &event);
        }
    }

    pub(crate) fn set_phase(&self, phase: SessionPhase) {
        self.lock().phase = phase;
        info!("Session {}", phase);
        self.emit([SessionEvent::PhaseChanged(phase)]);
    }

    /// Enter `Bootstrapping` for a freshly authenticated user
    pub(crate) fn begin_bootstrap(&self, user: &UserId, password_digest: String) {
        {
            let mut state = self.lock();
            state.clear();
            state.user = Some(user.clone());
            state.password_digest = Some(password_digest);
            let restored = state.cursors.bind(user);
            debug!("Restored {} date bucket(s) for {}", restored, user);
            state.phase = SessionPhase::Bootstrapping;
        }
        info!("Session {}", SessionPhase::Bootstrapping);
        self.emit([SessionEvent::PhaseChanged(SessionPhase::Bootstrapping)]);
    }

    /// Seed the directory from the backend's conversation list
    pub(crate) fn populate_directory(
        &self,
        partners: Vec<UserId>,
        stop: &StopSignal,
    ) -> ChatResult<()> {
        let added = {
            let mut state = self.lock();
            if state.phase != SessionPhase::Bootstrapping || stop.is_stopped() {
                return Err(ChatError::invalid_state("bootstrap cancelled"));
            }
            state.directory.merge_discovered(partners)
        };
        info!("Directory populated with {} conversation(s)", added.len());
        self.emit(added.into_iter().map(SessionEvent::ConversationAdded));
        Ok(())
    }

    /// Leave `Bootstrapping` for `Active` unless the login was cancelled.
    ///
    /// Cancellation fires `stop` under the state lock, so checking it here
    /// under the same lock cannot miss a concurrent cancel.
    pub(crate) fn activate(&self, stop: &StopSignal) -> ChatResult<()> {
        {
            let mut state = self.lock();
            if state.phase != SessionPhase::Bootstrapping || stop.is_stopped() {
                return Err(ChatError::invalid_state("bootstrap cancelled"));
            }
            state.phase = SessionPhase::Active;
        }
        info!("Session {}", SessionPhase::Active);
        self.emit([SessionEvent::PhaseChanged(SessionPhase::Active)]);
        Ok(())
    }

    /// Back to `Anonymous` after a failed login or bootstrap
    pub(crate) fn abandon_login(&self) {
        self.lock().clear();
        self.set_phase(SessionPhase::Anonymous);
    }

    pub(crate) fn open_conversation(&self, partner: UserId) -> ChatResult<RenderPlan> {
        if partner.is_empty() {
            return Err(ChatError::validation("partner id is required"));
        }

        let (user, events) = {
            let mut state = self.lock();
            let user = state.active_user()?;
            let mut events = Vec::new();
            if state.directory.add(partner.clone()) {
                events.push(SessionEvent::ConversationAdded(partner.clone()));
            }
            if state.directory.set_unread(&partner, false) {
                events.push(SessionEvent::UnreadChanged {
                    partner: partner.clone(),
                    unread: false,
                });
            }
            state.open = Some(partner.clone());
            (user, events)
        };
        self.emit(events);

        debug!("Loading history with {}", partner);
        let history = self.backend.get_messages(&user, &partner)?;

        let plan = {
            let mut state = self.lock();
            if !state.accepts_results_for(&user) || state.open.as_ref() != Some(&partner) {
                debug!("Discarding history for {}: no longer open", partner);
                return Ok(RenderPlan::new(partner));
            }
            render_history(&mut state.cursors, &user, &partner, &history, &Local::now())
        };
        self.emit([SessionEvent::Render(plan.clone())]);
        Ok(plan)
    }

    pub(crate) fn create_chat(&self, partner: UserId) -> ChatResult<RenderPlan> {
        if partner.is_empty() {
            return Err(ChatError::validation("partner id is required"));
        }
        if partner.is_outgoing_marker() {
            return Err(ChatError::validation(format!(
                "'{}' is reserved for outgoing messages",
                partner
            )));
        }
        let user = {
            let state = self.lock();
            let user = state.active_user()?;
            if state.directory.contains(&partner) {
                return Err(ChatError::validation(format!(
                    "conversation with {} already exists",
                    partner
                )));
            }
            user
        };

        self.backend.add_chat(&user, &partner)?;
        info!("Created conversation with {}", partner);
        self.open_conversation(partner)
    }

    pub(crate) fn send_message(&self, text: &str) -> ChatResult<RenderPlan> {
        if text.trim().is_empty() {
            return Err(ChatError::validation("message text is empty"));
        }
        let (user, partner) = {
            let state = self.lock();
            let user = state.active_user()?;
            let partner = state
                .open
                .clone()
                .ok_or_else(|| ChatError::validation("no conversation is open"))?;
            (user, partner)
        };

        // Wire timestamps carry microseconds; match them so a poll echo
        // compares equal to the local copy
        let timestamp = Utc::now().trunc_subsecs(6);
        self.backend.send_message(&user, &partner, text, &timestamp)?;

        let plan = {
            let mut state = self.lock();
            if !state.accepts_results_for(&user) {
                return Ok(RenderPlan::new(partner));
            }
            if state.cursors.get(&partner) >= Some(timestamp) {
                debug!("Message to {} already delivered by a poll", partner);
                RenderPlan::new(partner)
            } else if state.open.as_ref() == Some(&partner) {
                merge_local(&mut state.cursors, &user, &partner, text, timestamp, &Local::now())
            } else {
                // Switched away mid-send; only keep the poll from re-delivering it
                state.cursors.advance(&partner, timestamp);
                RenderPlan::new(partner)
            }
        };
        if !plan.is_empty() {
            self.emit([SessionEvent::Render(plan.clone())]);
        }
        Ok(plan)
    }

    pub(crate) fn conversations(&self) -> Vec<Conversation> {
        let state = self.lock();
        state
            .directory
            .list_known()
            .iter()
            .map(|partner| Conversation {
                partner_id: partner.clone(),
                cursor: state.cursors.get(partner),
                last_rendered_bucket: state.cursors.date_bucket(partner).map(str::to_string),
                unread: state.directory.is_unread(partner),
            })
            .collect()
    }
}

impl SyncPasses for SessionCore {
    fn message_pass(&self, stop: &StopSignal) -> SyncStats {
        let started = Instant::now();
        let mut stats = SyncStats::default();

        let (user, partners) = {
            let state = self.lock();
            match state.active_user() {
                Ok(user) => (user, state.directory.list_known().to_vec()),
                Err(_) => return stats,
            }
        };

        let mut completed = true;
        for partner in &partners {
            if stop.is_stopped() {
                completed = false;
                break;
            }

            let since = self.lock().cursors.get(partner);
            let messages = match self.backend.fetch_messages(&user, partner, since.as_ref()) {
                Ok(messages) => messages,
                Err(e) => {
                    warn!("Failed to fetch messages for {}: {}", partner, e);
                    stats.errors += 1;
                    self.emit([SessionEvent::PollFailed {
                        partner: Some(partner.clone()),
                        error: e,
                    }]);
                    continue;
                }
            };
            stats.conversations_polled += 1;
            if messages.is_empty() {
                continue;
            }
            stats.messages_received += messages.len();

            let events = {
                let mut state = self.lock();
                if stop.is_stopped() || !state.accepts_results_for(&user) {
                    debug!("Discarding late batch for {}", partner);
                    completed = false;
                    break;
                }
                let view = state.view_of(partner);
                let plan = merge_batch(
                    &mut state.cursors,
                    &user,
                    partner,
                    &messages,
                    view,
                    &Local::now(),
                );

                let mut events = Vec::new();
                let unread = plan.marks_unread() && state.directory.set_unread(partner, true);
                if !plan.is_empty() {
                    events.push(SessionEvent::Render(plan));
                }
                if unread {
                    events.push(SessionEvent::UnreadChanged {
                        partner: partner.clone(),
                        unread: true,
                    });
                }
                events
            };
            self.emit(events);
        }

        if completed {
            let mut state = self.lock();
            if state.accepts_results_for(&user) && !state.initial_load_complete {
                state.initial_load_complete = true;
                info!(
                    "Initial load complete ({} conversation(s))",
                    state.directory.len()
                );
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        stats
    }

    fn discovery_pass(&self, stop: &StopSignal) -> SyncStats {
        let started = Instant::now();
        let mut stats = SyncStats::default();

        let user = match self.lock().active_user() {
            Ok(user) => user,
            Err(_) => return stats,
        };

        match self.backend.new_chats() {
            Ok(partners) => {
                let added = {
                    let mut state = self.lock();
                    if stop.is_stopped() || !state.accepts_results_for(&user) {
                        debug!("Discarding late discovery result");
                        Vec::new()
                    } else {
                        state.directory.merge_discovered(partners)
                    }
                };
                if !added.is_empty() {
                    info!("Discovered {} new conversation(s)", added.len());
                }
                stats.conversations_discovered = added.len();
                self.emit(added.into_iter().map(SessionEvent::ConversationAdded));
            }
            Err(e) => {
                warn!("Failed to fetch new conversations: {}", e);
                stats.errors += 1;
                self.emit([SessionEvent::PollFailed {
                    partner: None,
                    error: e,
                }]);
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        stats
    }
}
