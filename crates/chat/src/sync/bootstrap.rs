//! Wait for the backend to finish loading a freshly logged-in session

use log::{debug, info};
use std::time::Duration;

use super::StopSignal;
use crate::error::{ChatError, ChatResult};
use crate::remote::ChatBackend;

/// Readiness poll run once per session before any conversation data is requested
#[derive(Debug, Clone, Copy)]
pub struct BootstrapGate {
    interval: Duration,
}

impl BootstrapGate {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `chats_loaded` until the backend reports readiness.
    ///
    /// Sleeps `interval` between attempts and never gives up on its own; the
    /// caller cancels through `stop`. Any failed call ends the wait with that
    /// error, without retrying it. Returns the number of calls made.
    pub fn await_ready(&self, backend: &dyn ChatBackend, stop: &StopSignal) -> ChatResult<u32> {
        let mut attempts = 0u32;
        loop {
            if stop.is_stopped() {
                return Err(ChatError::invalid_state("bootstrap cancelled"));
            }

            attempts += 1;
            if backend.chats_loaded()? {
                info!("Backend ready after {} readiness check(s)", attempts);
                return Ok(attempts);
            }

            debug!("Backend still loading (attempt {})", attempts);
            if stop.wait_timeout(self.interval) {
                return Err(ChatError::invalid_state("bootstrap cancelled"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{CallKind, InMemoryChatServer};
    use std::time::Instant;

    #[test]
    fn test_ready_after_three_pending_checks() {
        let server = InMemoryChatServer::new();
        server.set_pending_ready_checks(3);
        let gate = BootstrapGate::new(Duration::from_millis(20));

        let started = Instant::now();
        let attempts = gate.await_ready(&server, &StopSignal::new()).unwrap();

        assert_eq!(attempts, 4);
        assert_eq!(server.call_count(&CallKind::ChatsLoaded), 4);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_ready_immediately_does_not_sleep() {
        let server = InMemoryChatServer::new();
        let gate = BootstrapGate::new(Duration::from_secs(30));

        let started = Instant::now();
        assert_eq!(gate.await_ready(&server, &StopSignal::new()).unwrap(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_transport_failure_is_not_retried() {
        let server = InMemoryChatServer::new();
        server.set_pending_ready_checks(1);
        server.fail_next(CallKind::ChatsLoaded, ChatError::status(503, "GET /api/chats_loaded"));
        let gate = BootstrapGate::new(Duration::from_millis(1));

        let err = gate.await_ready(&server, &StopSignal::new()).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(server.call_count(&CallKind::ChatsLoaded), 1);
    }

    #[test]
    fn test_failure_after_pending_checks() {
        let server = InMemoryChatServer::new();
        server.set_pending_ready_checks(5);
        let gate = BootstrapGate::new(Duration::from_millis(1));
        let stop = StopSignal::new();

        // Two pending answers, then the third call fails
        assert!(!server.chats_loaded().unwrap());
        assert!(!server.chats_loaded().unwrap());
        server.fail_next(CallKind::ChatsLoaded, ChatError::transport("connection reset"));
        let err = gate.await_ready(&server, &stop).unwrap_err();
        assert_eq!(err, ChatError::transport("connection reset"));
    }

    #[test]
    fn test_cancelled_by_stop_signal() {
        let server = InMemoryChatServer::new();
        server.set_pending_ready_checks(u32::MAX);
        let gate = BootstrapGate::new(Duration::from_secs(60));
        let stop = StopSignal::new();

        let canceller = stop.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            canceller.stop();
        });

        let err = gate.await_ready(&server, &stop).unwrap_err();
        assert!(matches!(err, ChatError::InvalidState { .. }));
    }
}
