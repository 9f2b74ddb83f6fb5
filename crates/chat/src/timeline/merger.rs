//! Turn fetched message batches into render operations
//!
//! The merger never touches a rendering surface. It reads and updates the
//! [`CursorStore`] and returns a [`RenderPlan`] the caller applies.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use super::bucket::bucket_label;
use crate::models::{Direction, Message, UserId};
use crate::sync::CursorStore;

/// One step of a render plan, applied in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderOp {
    /// Drop everything rendered for the conversation
    ResetTimeline,
    ClearUnread,
    InsertDivider { label: String },
    AppendBubble {
        direction: Direction,
        text: String,
        timestamp: DateTime<Utc>,
    },
    MarkUnread,
}

/// Render operations for one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderPlan {
    pub partner: UserId,
    pub ops: Vec<RenderOp>,
}

impl RenderPlan {
    pub fn new(partner: UserId) -> Self {
        Self {
            partner,
            ops: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn dividers(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                RenderOp::InsertDivider { label } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn bubble_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, RenderOp::AppendBubble { .. }))
            .count()
    }

    pub fn marks_unread(&self) -> bool {
        self.ops.contains(&RenderOp::MarkUnread)
    }
}

/// What the session knows about the conversation being merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeView {
    /// The conversation is the one currently on screen
    pub is_open: bool,
    /// The post-bootstrap directory population has finished
    pub initial_load_complete: bool,
}

/// Merge a fetched batch for `partner` into a render plan.
///
/// Messages at or before the current cursor are dropped first, so a batch
/// that overlaps an optimistic local send never renders it twice. For the
/// open conversation every remaining message gets a bubble, preceded by a
/// divider whenever its bucket differs from the last one rendered. For any
/// other conversation the plan is at most a single `MarkUnread`, emitted only
/// for incremental batches after the initial load. The cursor and the date
/// bucket are updated either way.
pub fn merge_batch<Tz: TimeZone>(
    cursors: &mut CursorStore,
    local_user: &UserId,
    partner: &UserId,
    messages: &[Message],
    view: MergeView,
    now: &DateTime<Tz>,
) -> RenderPlan {
    let mut plan = RenderPlan::new(partner.clone());
    let prior = cursors.get(partner);

    let fresh: Vec<&Message> = messages
        .iter()
        .filter(|m| prior.is_none_or(|cursor| m.timestamp > cursor))
        .collect();
    let Some(last) = fresh.last() else {
        return plan;
    };

    if view.is_open {
        for message in &fresh {
            append_message(cursors, local_user, partner, message, now, &mut plan);
        }
    } else {
        if prior.is_some() && view.initial_load_complete {
            plan.ops.push(RenderOp::MarkUnread);
        }
        cursors.set_date_bucket(partner, &bucket_label(&last.timestamp, now));
    }

    if let Some(newest) = fresh.iter().map(|m| m.timestamp).max() {
        cursors.advance(partner, newest);
    }
    plan
}

/// Render a full history into a freshly reset timeline.
///
/// The date bucket is forgotten first, so the first message always gets a
/// divider. Every message is rendered regardless of the current cursor.
pub fn render_history<Tz: TimeZone>(
    cursors: &mut CursorStore,
    local_user: &UserId,
    partner: &UserId,
    messages: &[Message],
    now: &DateTime<Tz>,
) -> RenderPlan {
    let mut plan = RenderPlan::new(partner.clone());
    plan.ops.push(RenderOp::ResetTimeline);
    plan.ops.push(RenderOp::ClearUnread);
    cursors.reset_date_bucket(partner);

    for message in messages {
        append_message(cursors, local_user, partner, message, now, &mut plan);
    }
    if let Some(newest) = messages.iter().map(|m| m.timestamp).max() {
        cursors.advance(partner, newest);
    }
    plan
}

/// One-message plan for a message the local user just sent
pub fn merge_local<Tz: TimeZone>(
    cursors: &mut CursorStore,
    local_user: &UserId,
    partner: &UserId,
    text: &str,
    timestamp: DateTime<Utc>,
    now: &DateTime<Tz>,
) -> RenderPlan {
    let message = Message::new(local_user.as_str(), text, timestamp);
    let mut plan = RenderPlan::new(partner.clone());
    append_message(cursors, local_user, partner, &message, now, &mut plan);
    cursors.advance(partner, timestamp);
    plan
}

fn append_message<Tz: TimeZone>(
    cursors: &mut CursorStore,
    local_user: &UserId,
    partner: &UserId,
    message: &Message,
    now: &DateTime<Tz>,
    plan: &mut RenderPlan,
) {
    let label = bucket_label(&message.timestamp, now);
    if cursors.date_bucket(partner) != Some(label.as_str()) {
        cursors.set_date_bucket(partner, &label);
        plan.ops.push(RenderOp::InsertDivider { label });
    }
    plan.ops.push(RenderOp::AppendBubble {
        direction: message.direction(local_user),
        text: message.text.clone(),
        timestamp: message.timestamp,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBucketStore;
    use chrono::Duration;
    use std::sync::Arc;

    const OPEN: MergeView = MergeView {
        is_open: true,
        initial_load_complete: true,
    };
    const CLOSED: MergeView = MergeView {
        is_open: false,
        initial_load_complete: true,
    };

    fn setup() -> (CursorStore, UserId, UserId) {
        let mut cursors = CursorStore::new(Arc::new(InMemoryBucketStore::new()));
        let alice = UserId::new("alice");
        cursors.bind(&alice);
        (cursors, alice, UserId::new("bob"))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 18, 0, 0).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_first_batch_gets_single_divider() {
        let (mut cursors, alice, bob) = setup();
        let batch = vec![
            Message::new("you", "hey", at(15, 9)),
            Message::new("me", "hi", at(15, 10)),
        ];

        let plan = merge_batch(&mut cursors, &alice, &bob, &batch, OPEN, &now());

        assert_eq!(plan.dividers(), vec!["Today"]);
        assert_eq!(plan.ops[0], RenderOp::InsertDivider { label: "Today".into() });
        assert_eq!(plan.bubble_count(), 2);
        assert_eq!(cursors.get(&bob), Some(at(15, 10)));
    }

    #[test]
    fn test_divider_per_day_change() {
        let (mut cursors, alice, bob) = setup();
        let batch = vec![
            Message::new("you", "a", at(13, 9)),
            Message::new("you", "b", at(14, 9)),
            Message::new("you", "c", at(14, 10)),
            Message::new("you", "d", at(15, 9)),
        ];

        let plan = merge_batch(&mut cursors, &alice, &bob, &batch, OPEN, &now());
        assert_eq!(plan.dividers(), vec!["Mar 13, 2024", "Yesterday", "Today"]);
        assert_eq!(cursors.date_bucket(&bob), Some("Today"));
    }

    #[test]
    fn test_same_day_across_batches_has_no_new_divider() {
        let (mut cursors, alice, bob) = setup();
        merge_batch(
            &mut cursors,
            &alice,
            &bob,
            &[Message::new("you", "a", at(15, 9))],
            OPEN,
            &now(),
        );

        let plan = merge_batch(
            &mut cursors,
            &alice,
            &bob,
            &[Message::new("you", "b", at(15, 11))],
            OPEN,
            &now(),
        );
        assert!(plan.dividers().is_empty());
        assert_eq!(plan.bubble_count(), 1);
    }

    #[test]
    fn test_stale_messages_are_trimmed() {
        let (mut cursors, alice, bob) = setup();
        merge_local(&mut cursors, &alice, &bob, "hi", at(15, 10), &now());

        let batch = vec![
            Message::new("me", "hi", at(15, 10)),
            Message::new("you", "yo", at(15, 11)),
        ];
        let plan = merge_batch(&mut cursors, &alice, &bob, &batch, OPEN, &now());

        assert_eq!(plan.bubble_count(), 1);
        assert!(matches!(
            &plan.ops[0],
            RenderOp::AppendBubble { direction: Direction::Received, text, .. } if text == "yo"
        ));
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let (mut cursors, alice, bob) = setup();
        let plan = merge_batch(&mut cursors, &alice, &bob, &[], OPEN, &now());
        assert!(plan.is_empty());
        assert!(cursors.get(&bob).is_none());
        assert!(cursors.date_bucket(&bob).is_none());
    }

    #[test]
    fn test_unread_only_for_incremental_batches() {
        let (mut cursors, alice, bob) = setup();
        let first = [Message::new("you", "a", at(15, 9))];
        let plan = merge_batch(&mut cursors, &alice, &bob, &first, CLOSED, &now());
        assert!(plan.is_empty());
        assert_eq!(cursors.get(&bob), Some(at(15, 9)));

        let second = [Message::new("you", "b", at(15, 10))];
        let plan = merge_batch(&mut cursors, &alice, &bob, &second, CLOSED, &now());
        assert_eq!(plan.ops, vec![RenderOp::MarkUnread]);
        assert_eq!(cursors.get(&bob), Some(at(15, 10)));
    }

    #[test]
    fn test_no_unread_before_initial_load() {
        let (mut cursors, alice, bob) = setup();
        cursors.advance(&bob, at(15, 8));
        let view = MergeView {
            is_open: false,
            initial_load_complete: false,
        };

        let batch = [Message::new("you", "a", at(15, 9))];
        let plan = merge_batch(&mut cursors, &alice, &bob, &batch, view, &now());
        assert!(!plan.marks_unread());
        assert_eq!(cursors.get(&bob), Some(at(15, 9)));
    }

    #[test]
    fn test_out_of_order_batch_does_not_regress_cursor() {
        let (mut cursors, alice, bob) = setup();
        let batch = vec![
            Message::new("you", "late", at(15, 12)),
            Message::new("you", "early", at(15, 9)),
        ];
        merge_batch(&mut cursors, &alice, &bob, &batch, OPEN, &now());
        assert_eq!(cursors.get(&bob), Some(at(15, 12)));
    }

    #[test]
    fn test_history_resets_bucket() {
        let (mut cursors, alice, bob) = setup();
        cursors.set_date_bucket(&bob, "Today");
        cursors.advance(&bob, at(15, 12));

        let history = vec![
            Message::new("you", "a", at(15, 9)),
            Message::new("alice", "b", at(15, 12)),
        ];
        let plan = render_history(&mut cursors, &alice, &bob, &history, &now());

        assert_eq!(plan.ops[0], RenderOp::ResetTimeline);
        assert_eq!(plan.ops[1], RenderOp::ClearUnread);
        assert_eq!(plan.dividers(), vec!["Today"]);
        assert_eq!(plan.bubble_count(), 2);
    }

    #[test]
    fn test_empty_history_renders_nothing_but_reset() {
        let (mut cursors, alice, bob) = setup();
        let plan = render_history(&mut cursors, &alice, &bob, &[], &now());
        assert_eq!(plan.ops, vec![RenderOp::ResetTimeline, RenderOp::ClearUnread]);
        assert!(cursors.get(&bob).is_none());
    }

    #[test]
    fn test_local_send_then_reply_next_day() {
        let (mut cursors, alice, bob) = setup();
        let now = now();
        let t1 = now - Duration::days(1);

        let plan = merge_local(&mut cursors, &alice, &bob, "hi", t1, &now);
        assert_eq!(plan.dividers(), vec!["Yesterday"]);
        assert!(matches!(
            plan.ops[1],
            RenderOp::AppendBubble { direction: Direction::Sent, .. }
        ));
        assert_eq!(cursors.get(&bob), Some(t1));

        let reply = [Message::new("you", "hello", now - Duration::hours(1))];
        let plan = merge_batch(&mut cursors, &alice, &bob, &reply, OPEN, &now);
        assert_eq!(plan.dividers(), vec!["Today"]);
    }
}
