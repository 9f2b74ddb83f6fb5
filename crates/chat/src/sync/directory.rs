//! The set of known conversation partners

use std::collections::HashSet;

use crate::models::UserId;

/// Authoritative list of conversations for the session.
///
/// Keeps discovery order. Keys are compared by exact string equality.
#[derive(Debug, Default)]
pub struct ConversationDirectory {
    order: Vec<UserId>,
    unread: HashSet<UserId>,
}

impl ConversationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known partners in the order they were added
    pub fn list_known(&self) -> &[UserId] {
        &self.order
    }

    pub fn contains(&self, partner: &UserId) -> bool {
        self.order.contains(partner)
    }

    /// Add a partner. Returns false (and changes nothing) if already present.
    pub fn add(&mut self, partner: UserId) -> bool {
        if self.contains(&partner) {
            return false;
        }
        self.order.push(partner);
        true
    }

    /// Merge a discovery result, returning only the partners that were new
    pub fn merge_discovered(&mut self, partners: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
        partners
            .into_iter()
            .filter(|partner| self.add(partner.clone()))
            .collect()
    }

    /// Set or clear the unread flag. Returns whether it changed.
    pub fn set_unread(&mut self, partner: &UserId, unread: bool) -> bool {
        if !self.contains(partner) {
            return false;
        }
        if unread {
            self.unread.insert(partner.clone())
        } else {
            self.unread.remove(partner)
        }
    }

    pub fn is_unread(&self, partner: &UserId) -> bool {
        self.unread.contains(partner)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
