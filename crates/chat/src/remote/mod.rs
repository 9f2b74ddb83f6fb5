//! Message store integration
//!
//! This module provides:
//! - The `ChatBackend` trait covering every session-backend endpoint
//! - An HTTP implementation over ureq
//! - An in-memory server used by tests and the offline demo

mod client;
mod memory;
mod traits;

pub use client::HttpChatBackend;
pub use memory::{Call, CallKind, InMemoryChatServer};
pub use traits::ChatBackend;

/// Session backend request/response bodies
pub mod api {
    use serde::{Deserialize, Serialize};

    use crate::models::UserId;

    /// Status the backend answers `add_chat` with for unknown or self targets
    pub const INVALID_USER_STATUS: &str = "invalid_user_id";

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoginRequest {
        pub user_id: UserId,
        /// SHA-256 hex digest of the password
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ChatsLoadedResponse {
        pub loaded: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AddChatRequest {
        pub user_id: UserId,
        pub target_user_id: UserId,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AddChatResponse {
        #[serde(default)]
        pub status: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SendMessageRequest {
        pub user_id: UserId,
        pub target_user_id: UserId,
        pub text: String,
        /// RFC 3339 UTC timestamp chosen by the client
        pub timestamp: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NewChatsResponse {
        #[serde(default)]
        pub new_chats: Vec<UserId>,
    }
}
