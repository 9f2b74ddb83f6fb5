//! The session facade: login, bootstrap, conversation operations and close

use log::{info, warn};
use std::sync::{Arc, Mutex};
use std::thread;

use super::state::SessionCore;
use super::{SessionEvent, SessionObserver, SessionPhase};
use crate::auth::{hash_password, validate_login};
use crate::config::ClientSettings;
use crate::error::{ChatError, ChatResult};
use crate::models::{Conversation, UserId};
use crate::remote::ChatBackend;
use crate::storage::BucketStore;
use crate::sync::{BootstrapGate, StopSignal, SyncPasses, SyncScheduler, SyncStats};
use crate::timeline::RenderPlan;

/// One client's session against the message store.
///
/// Methods block on the network and may be called from any thread. After
/// login the two polling loops run in the background until [`Session::close`]
/// or drop.
pub struct Session {
    core: Arc<SessionCore>,
    settings: ClientSettings,
    background_polling: bool,
    stop: Mutex<StopSignal>,
    scheduler: Mutex<Option<SyncScheduler>>,
}

impl Session {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        buckets: Arc<dyn BucketStore>,
        observer: Arc<dyn SessionObserver>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            core: Arc::new(SessionCore::new(backend, observer, buckets)),
            settings,
            background_polling: true,
            stop: Mutex::new(StopSignal::new()),
            scheduler: Mutex::new(None),
        }
    }

    /// Don't start the polling threads; passes run only through
    /// [`Session::poll_once`] and [`Session::discover_once`]
    pub fn without_background_polling(mut self) -> Self {
        self.background_polling = false;
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn phase(&self) -> SessionPhase {
        self.core.lock().phase
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.core.lock().user.clone()
    }

    pub fn open_partner(&self) -> Option<UserId> {
        self.core.lock().open.clone()
    }

    /// Authenticate, wait for the backend to load, seed the directory and
    /// start polling.
    ///
    /// Any failure returns the session to `Anonymous` without retrying.
    pub fn login(&self, user_id: &str, password: &str) -> ChatResult<()> {
        validate_login(user_id, password)?;
        let user = UserId::new(user_id);

        let stop = StopSignal::new();
        {
            let mut state = self.core.lock();
            if !state.phase.can_login() {
                return Err(ChatError::invalid_state(format!(
                    "cannot log in while {}",
                    state.phase
                )));
            }
            // Installed with the phase so cancel_login never sees a stale signal
            *self.stop.lock().expect("stop signal lock poisoned") = stop.clone();
            state.phase = SessionPhase::Authenticating;
        }
        self.core.emit([SessionEvent::PhaseChanged(
            SessionPhase::Authenticating,
        )]);

        let digest = hash_password(password);
        if let Err(e) = self.core.backend.login(&user, &digest) {
            warn!("Login failed for {}: {}", user, e);
            self.core.abandon_login();
            return Err(e);
        }
        if stop.is_stopped() {
            info!("Login as {} cancelled", user);
            self.core.abandon_login();
            return Err(ChatError::invalid_state("login cancelled"));
        }
        info!("Logged in as {}", user);

        self.core.begin_bootstrap(&user, digest);

        if let Err(e) = self.bootstrap(&user, &stop) {
            warn!("Bootstrap failed for {}: {}", user, e);
            self.core.abandon_login();
            return Err(e);
        }
        Ok(())
    }

    fn bootstrap(&self, user: &UserId, stop: &StopSignal) -> ChatResult<()> {
        let gate = BootstrapGate::new(self.settings.bootstrap_interval());
        gate.await_ready(self.core.backend.as_ref(), stop)?;

        let partners = self.core.backend.list_chats(user)?;
        self.core.populate_directory(partners, stop)?;
        self.core.activate(stop)?;

        if self.background_polling {
            let passes: Arc<dyn SyncPasses> = self.core.clone();
            let scheduler = SyncScheduler::start(
                passes,
                stop.clone(),
                self.settings.message_interval(),
                self.settings.discovery_interval(),
            )
            .map_err(|e| ChatError::invalid_state(format!("failed to start polling: {}", e)))?;
            *self.scheduler.lock().expect("scheduler lock poisoned") = Some(scheduler);
        }
        Ok(())
    }

    /// Make `partner` the open conversation and render its full history
    pub fn open_conversation(&self, partner: &str) -> ChatResult<RenderPlan> {
        self.core.open_conversation(UserId::new(partner))
    }

    /// Create a conversation on the backend, then open it
    pub fn create_chat(&self, partner: &str) -> ChatResult<RenderPlan> {
        self.core.create_chat(UserId::new(partner))
    }

    /// Send `text` to the open conversation and render it locally
    pub fn send_message(&self, text: &str) -> ChatResult<RenderPlan> {
        self.core.send_message(text)
    }

    /// Snapshot of every known conversation, in directory order
    pub fn conversations(&self) -> Vec<Conversation> {
        self.core.conversations()
    }

    /// Run one message pass on the calling thread
    pub fn poll_once(&self) -> ChatResult<SyncStats> {
        self.core.lock().active_user()?;
        let stop = self.current_stop();
        Ok(self.core.message_pass(&stop))
    }

    /// Run one discovery pass on the calling thread
    pub fn discover_once(&self) -> ChatResult<SyncStats> {
        self.core.lock().active_user()?;
        let stop = self.current_stop();
        Ok(self.core.discovery_pass(&stop))
    }

    fn current_stop(&self) -> StopSignal {
        self.stop.lock().expect("stop signal lock poisoned").clone()
    }

    /// Abort a `login` that is still authenticating or waiting for the
    /// backend to become ready.
    ///
    /// The blocked `login` call returns `InvalidState` and the session goes
    /// back to `Anonymous`. Returns false if no login was in progress.
    pub fn cancel_login(&self) -> bool {
        let state = self.core.lock();
        match state.phase {
            SessionPhase::Authenticating | SessionPhase::Bootstrapping => {
                self.current_stop().stop();
                info!("Cancelling login while {}", state.phase);
                true
            }
            _ => false,
        }
    }

    /// Ask the backend to close, then stop polling and drop credentials.
    ///
    /// If the backend refuses, the session stays `Active` and the error is
    /// returned. On success the phase becomes `Closed` after the grace delay.
    pub fn close(&self) -> ChatResult<()> {
        {
            let mut state = self.core.lock();
            state.active_user()?;
            state.phase = SessionPhase::Closing;
        }
        info!("Session {}", SessionPhase::Closing);
        self.core.emit([SessionEvent::PhaseChanged(SessionPhase::Closing)]);

        if let Err(e) = self.core.backend.close_application() {
            warn!("Close request failed: {}", e);
            self.core.set_phase(SessionPhase::Active);
            return Err(e);
        }

        self.stop_polling();
        self.core.lock().clear();

        thread::sleep(self.settings.close_grace());
        self.core.set_phase(SessionPhase::Closed);
        Ok(())
    }

    fn stop_polling(&self) {
        self.current_stop().stop();
        let scheduler = self.scheduler.lock().expect("scheduler lock poisoned").take();
        if let Some(mut scheduler) = scheduler {
            scheduler.stop();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
