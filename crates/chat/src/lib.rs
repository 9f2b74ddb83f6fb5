//! Chat crate - Polling synchronization engine for two-party conversations
//!
//! This crate provides platform-independent chat functionality including:
//! - Domain models (Message, Conversation, UserId)
//! - The session backend client (HTTP) and an in-memory stand-in
//! - Bootstrap readiness gate, conversation directory and cursor store
//! - Two background polling loops (messages and conversation discovery)
//! - Timeline merging into render plans (date dividers, bubbles, unread flags)
//! - Session lifecycle from login to close
//! - Registration over the account socket
//!
//! This crate has zero UI dependencies; rendering surfaces subscribe through
//! [`SessionObserver`].

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod session;
pub mod storage;
pub mod sync;
pub mod timeline;

pub use auth::{RegistrationClient, hash_password, validate_login, validate_registration};
pub use crate::config::ClientSettings;
pub use error::{ChatError, ChatResult};
pub use models::{Conversation, Direction, Message, UserId};
pub use remote::{ChatBackend, HttpChatBackend, InMemoryChatServer};
pub use session::{
    ChannelObserver, NoopObserver, Session, SessionEvent, SessionObserver, SessionPhase,
};
pub use storage::{BucketStore, InMemoryBucketStore, SqliteBucketStore};
pub use sync::{
    BootstrapGate, ConversationDirectory, CursorStore, StopSignal, SyncScheduler, SyncStats,
};
pub use timeline::{MergeView, RenderOp, RenderPlan, bucket_label};
