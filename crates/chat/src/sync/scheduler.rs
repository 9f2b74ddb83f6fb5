//! Background polling loops
//!
//! The message loop and the discovery loop each run on their own thread.
//! Both check a shared [`StopSignal`] before every pass and sleep on it
//! between passes, so `stop()` wakes them immediately.

use log::{debug, info, warn};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::timing::{missed_ticks, next_tick_delay};

/// Statistics from a single polling pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Number of conversations fetched in a message pass
    pub conversations_polled: usize,
    /// Number of messages returned by fetches, before stale trimming
    pub messages_received: usize,
    /// Number of partners added by a discovery pass
    pub conversations_discovered: usize,
    /// Number of failed fetches (logged and skipped)
    pub errors: usize,
    pub duration_ms: u64,
}

/// Cooperative cancellation shared by the loops and the session
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let (stopped, cvar) = &*self.inner;
        *stopped.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap()
    }

    /// Sleep for up to `timeout`. Returns true if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (stopped, cvar) = &*self.inner;
        let guard = stopped.lock().unwrap();
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap();
        *guard
    }
}

/// The two passes the scheduler drives
pub trait SyncPasses: Send + Sync + 'static {
    /// Fetch new messages for every known conversation, in directory order
    fn message_pass(&self, stop: &StopSignal) -> SyncStats;

    /// Pull the new-conversations feed into the directory
    fn discovery_pass(&self, stop: &StopSignal) -> SyncStats;
}

/// Owner of the two polling threads
pub struct SyncScheduler {
    stop: StopSignal,
    handles: Vec<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Start both loops. The first pass of each runs immediately.
    pub fn start(
        passes: Arc<dyn SyncPasses>,
        stop: StopSignal,
        message_period: Duration,
        discovery_period: Duration,
    ) -> std::io::Result<Self> {
        let mut scheduler = Self {
            stop,
            handles: Vec::with_capacity(2),
        };

        let message_passes = passes.clone();
        scheduler.spawn_loop("message-poll", message_period, move |stop| {
            message_passes.message_pass(stop)
        })?;
        scheduler.spawn_loop("discovery-poll", discovery_period, move |stop| {
            passes.discovery_pass(stop)
        })?;

        info!(
            "Sync scheduler started (messages every {:?}, discovery every {:?})",
            message_period, discovery_period
        );
        Ok(scheduler)
    }

    fn spawn_loop<F>(&mut self, name: &str, period: Duration, pass: F) -> std::io::Result<()>
    where
        F: Fn(&StopSignal) -> SyncStats + Send + 'static,
    {
        let stop = self.stop.clone();
        let loop_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(&loop_name, period, &stop, pass));

        match handle {
            Ok(handle) => {
                self.handles.push(handle);
                Ok(())
            }
            Err(e) => {
                // Don't leave a half-started scheduler behind
                self.stop();
                Err(e)
            }
        }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Signal both loops and wait for them to finish their current pass
    pub fn stop(&mut self) {
        self.stop.stop();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("Polling thread panicked");
            }
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<F>(name: &str, period: Duration, stop: &StopSignal, pass: F)
where
    F: Fn(&StopSignal) -> SyncStats,
{
    debug!("{} loop running", name);
    while !stop.is_stopped() {
        let started = Instant::now();
        let stats = pass(stop);
        let elapsed = started.elapsed();

        debug!("{} pass: {:?}", name, stats);
        let skipped = missed_ticks(elapsed, period);
        if skipped > 0 {
            debug!("{} pass took {:?}, skipping {} tick(s)", name, elapsed, skipped);
        }

        if stop.wait_timeout(next_tick_delay(elapsed, period)) {
            break;
        }
    }
    debug!("{} loop stopped", name);
}
