//! Synchronization engine
//!
//! This module provides:
//! - The bootstrap readiness gate
//! - The conversation directory and per-conversation cursors
//! - The two background polling loops

mod bootstrap;
mod cursor;
mod directory;
mod scheduler;
mod timing;

pub use bootstrap::BootstrapGate;
pub use cursor::CursorStore;
pub use directory::ConversationDirectory;
pub use scheduler::{StopSignal, SyncPasses, SyncScheduler, SyncStats};
pub use timing::{missed_ticks, next_tick_delay};
