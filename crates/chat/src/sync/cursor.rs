//! Per-conversation cursors and rendered date buckets
//!
//! Cursors live in memory only. Date buckets are mirrored into a
//! [`BucketStore`] keyed by (session user, partner) so divider continuity
//! survives a restart within the same day.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::UserId;
use crate::storage::BucketStore;

/// Watermarks and date buckets for every tracked conversation
pub struct CursorStore {
    user: Option<UserId>,
    cursors: HashMap<UserId, DateTime<Utc>>,
    buckets: HashMap<UserId, String>,
    durable: Arc<dyn BucketStore>,
}

impl CursorStore {
    pub fn new(durable: Arc<dyn BucketStore>) -> Self {
        Self {
            user: None,
            cursors: HashMap::new(),
            buckets: HashMap::new(),
            durable,
        }
    }

    /// Bind the store to a session user and load that user's persisted buckets.
    ///
    /// Any state from a previous session is dropped. Returns how many buckets
    /// were restored; a storage failure leaves the store empty but usable.
    pub fn bind(&mut self, user: &UserId) -> usize {
        self.cursors.clear();
        self.buckets.clear();
        self.user = Some(user.clone());

        match self.durable.load_all(user) {
            Ok(buckets) => {
                self.buckets = buckets;
                self.buckets.len()
            }
            Err(e) => {
                warn!("Failed to load date buckets for {}: {:#}", user, e);
                0
            }
        }
    }

    /// Forget the session user and all in-memory state
    pub fn unbind(&mut self) {
        self.user = None;
        self.cursors.clear();
        self.buckets.clear();
    }

    /// Timestamp of the newest message retrieved for `partner`
    pub fn get(&self, partner: &UserId) -> Option<DateTime<Utc>> {
        self.cursors.get(partner).copied()
    }

    /// Move the cursor for `partner` forward to `timestamp`.
    ///
    /// Never regresses: an earlier timestamp than the stored one is ignored.
    /// Returns whether the cursor moved.
    pub fn advance(&mut self, partner: &UserId, timestamp: DateTime<Utc>) -> bool {
        match self.cursors.get(partner) {
            Some(current) if *current >= timestamp => {
                if *current > timestamp {
                    debug!(
                        "Ignoring cursor regression for {}: {} < {}",
                        partner, timestamp, current
                    );
                }
                false
            }
            _ => {
                self.cursors.insert(partner.clone(), timestamp);
                true
            }
        }
    }

    /// Label of the last divider rendered for `partner`
    pub fn date_bucket(&self, partner: &UserId) -> Option<&str> {
        self.buckets.get(partner).map(String::as_str)
    }

    /// Record the last rendered bucket and mirror it to durable storage
    pub fn set_date_bucket(&mut self, partner: &UserId, label: &str) {
        if self.date_bucket(partner) == Some(label) {
            return;
        }
        self.buckets.insert(partner.clone(), label.to_string());

        let Some(user) = &self.user else {
            return;
        };
        if let Err(e) = self.durable.put(user, partner, label) {
            warn!("Failed to persist date bucket for {}: {:#}", partner, e);
        }
    }

    /// Forget the in-memory bucket for a timeline that is about to be re-rendered.
    ///
    /// Durable storage keeps the old label until the next render replaces it.
    pub fn reset_date_bucket(&mut self, partner: &UserId) {
        self.buckets.remove(partner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBucketStore;
    use chrono::Duration;

    fn store() -> (CursorStore, Arc<InMemoryBucketStore>) {
        let durable = Arc::new(InMemoryBucketStore::new());
        let mut cursors = CursorStore::new(durable.clone());
        cursors.bind(&UserId::new("alice"));
        (cursors, durable)
    }

    #[test]
    fn test_advance_is_monotonic() {
        let (mut cursors, _) = store();
        let bob = UserId::new("bob");
        let t1 = Utc::now();
        let t0 = t1 - Duration::seconds(30);

        assert!(cursors.get(&bob).is_none());
        assert!(cursors.advance(&bob, t1));
        assert!(!cursors.advance(&bob, t0));
        assert_eq!(cursors.get(&bob), Some(t1));
        assert!(!cursors.advance(&bob, t1));
        assert!(cursors.advance(&bob, t1 + Duration::seconds(1)));
    }

    #[test]
    fn test_bucket_is_mirrored_to_durable_store() {
        let (mut cursors, durable) = store();
        let bob = UserId::new("bob");

        cursors.set_date_bucket(&bob, "Today");
        assert_eq!(cursors.date_bucket(&bob), Some("Today"));
        assert_eq!(
            durable.get(&UserId::new("alice"), &bob).unwrap().as_deref(),
            Some("Today")
        );
    }

    #[test]
    fn test_bind_restores_buckets_but_not_cursors() {
        let (mut cursors, durable) = store();
        let bob = UserId::new("bob");
        cursors.advance(&bob, Utc::now());
        cursors.set_date_bucket(&bob, "Today");

        let mut reloaded = CursorStore::new(durable);
        assert_eq!(reloaded.bind(&UserId::new("alice")), 1);
        assert_eq!(reloaded.date_bucket(&bob), Some("Today"));
        assert!(reloaded.get(&bob).is_none());
    }

    #[test]
    fn test_reset_keeps_durable_copy() {
        let (mut cursors, durable) = store();
        let bob = UserId::new("bob");
        cursors.set_date_bucket(&bob, "Yesterday");
        cursors.reset_date_bucket(&bob);

        assert!(cursors.date_bucket(&bob).is_none());
        assert_eq!(
            durable.get(&UserId::new("alice"), &bob).unwrap().as_deref(),
            Some("Yesterday")
        );
    }

    #[test]
    fn test_unbound_store_stays_in_memory() {
        let durable = Arc::new(InMemoryBucketStore::new());
        let mut cursors = CursorStore::new(durable.clone());
        let bob = UserId::new("bob");

        cursors.set_date_bucket(&bob, "Today");
        assert_eq!(cursors.date_bucket(&bob), Some("Today"));
        assert!(durable.load_all(&UserId::new("alice")).unwrap().is_empty());
    }
}
