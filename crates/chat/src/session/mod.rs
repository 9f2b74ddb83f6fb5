//! Session lifecycle
//!
//! This module provides:
//! - The `Session` facade driving login, bootstrap, polling and close
//! - Lifecycle phases
//! - Observer hooks for rendering surfaces

mod lifecycle;
mod observer;
mod phase;
mod state;

pub use lifecycle::Session;
pub use observer::{ChannelObserver, NoopObserver, SessionEvent, SessionObserver, dispatch};
pub use phase::SessionPhase;
