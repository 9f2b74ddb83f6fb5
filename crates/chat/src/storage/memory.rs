//! In-memory bucket store

use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

use super::BucketStore;
use crate::models::UserId;

/// Bucket labels kept in a map, lost on exit
#[derive(Default)]
pub struct InMemoryBucketStore {
    labels: RwLock<HashMap<(UserId, UserId), String>>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BucketStore for InMemoryBucketStore {
    fn load_all(&self, user: &UserId) -> Result<HashMap<UserId, String>> {
        let labels = self.labels.read().unwrap();
        Ok(labels
            .iter()
            .filter(|((owner, _), _)| owner == user)
            .map(|((_, partner), label)| (partner.clone(), label.clone()))
            .collect())
    }

    fn get(&self, user: &UserId, partner: &UserId) -> Result<Option<String>> {
        let labels = self.labels.read().unwrap();
        Ok(labels.get(&(user.clone(), partner.clone())).cloned())
    }

    fn put(&self, user: &UserId, partner: &UserId, label: &str) -> Result<()> {
        let mut labels = self.labels.write().unwrap();
        labels.insert((user.clone(), partner.clone()), label.to_string());
        Ok(())
    }

    fn clear_user(&self, user: &UserId) -> Result<()> {
        let mut labels = self.labels.write().unwrap();
        labels.retain(|(owner, _), _| owner != user);
        Ok(())
    }
}
