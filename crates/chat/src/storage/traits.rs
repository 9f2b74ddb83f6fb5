//! Storage trait definitions

use anyhow::Result;
use std::collections::HashMap;

use crate::models::UserId;

/// Persists the last rendered date-bucket label per (session user, partner).
pub trait BucketStore: Send + Sync {
    /// All labels stored for `user`, keyed by partner
    fn load_all(&self, user: &UserId) -> Result<HashMap<UserId, String>>;

    /// Label stored for one conversation
    fn get(&self, user: &UserId, partner: &UserId) -> Result<Option<String>>;

    /// Insert or replace the label for one conversation
    fn put(&self, user: &UserId, partner: &UserId, label: &str) -> Result<()>;

    /// Remove every label stored for `user`
    fn clear_user(&self, user: &UserId) -> Result<()>;
}
