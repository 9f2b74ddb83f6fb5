//! Conversation snapshot handed to rendering surfaces

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// A one-to-one conversation between the local user and a partner.
///
/// Assembled from the conversation directory (unread flag) and the cursor
/// store (cursor and last rendered date bucket).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub partner_id: UserId,
    /// Timestamp of the newest message retrieved so far
    pub cursor: Option<DateTime<Utc>>,
    /// Label of the last date divider rendered for this conversation
    pub last_rendered_bucket: Option<String>,
    pub unread: bool,
}

impl Conversation {
    pub fn new(partner_id: UserId) -> Self {
        Self {
            partner_id,
            cursor: None,
            last_rendered_bucket: None,
            unread: false,
        }
    }

    /// Whether the conversation has ever delivered a message
    pub fn has_history(&self) -> bool {
        self.cursor.is_some()
    }
}
