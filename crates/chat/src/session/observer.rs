//! Session change notifications
//!
//! Rendering surfaces subscribe here instead of inspecting session state.
//! Callbacks run on whichever thread produced the change (a polling thread
//! or the caller of a session method) and never while session state is locked.

use std::sync::mpsc::Sender;

use super::SessionPhase;
use crate::error::ChatError;
use crate::models::UserId;
use crate::timeline::RenderPlan;

/// Something a rendering surface may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(SessionPhase),
    ConversationAdded(UserId),
    Render(RenderPlan),
    UnreadChanged { partner: UserId, unread: bool },
    /// A polling fetch failed; `partner` is None for the discovery feed
    PollFailed {
        partner: Option<UserId>,
        error: ChatError,
    },
}

/// Receiver of session changes. Every method defaults to doing nothing.
pub trait SessionObserver: Send + Sync {
    fn on_phase_changed(&self, _phase: SessionPhase) {}

    fn on_conversation_added(&self, _partner: &UserId) {}

    fn on_render(&self, _plan: &RenderPlan) {}

    fn on_unread_changed(&self, _partner: &UserId, _unread: bool) {}

    fn on_poll_error(&self, _partner: Option<&UserId>, _error: &ChatError) {}
}

/// Route an event to the matching observer method
pub fn dispatch(observer: &dyn SessionObserver, event: &SessionEvent) {
    match event {
        SessionEvent::PhaseChanged(phase) => observer.on_phase_changed(*phase),
        SessionEvent::ConversationAdded(partner) => observer.on_conversation_added(partner),
        SessionEvent::Render(plan) => observer.on_render(plan),
        SessionEvent::UnreadChanged { partner, unread } => {
            observer.on_unread_changed(partner, *unread)
        }
        SessionEvent::PollFailed { partner, error } => {
            observer.on_poll_error(partner.as_ref(), error)
        }
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Observer that forwards every change into a channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new(sender: Sender<SessionEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: SessionEvent) {
        // The receiver going away just means nobody is listening anymore
        let _ = self.sender.send(event);
    }
}

impl SessionObserver for ChannelObserver {
    fn on_phase_changed(&self, phase: SessionPhase) {
        self.send(SessionEvent::PhaseChanged(phase));
    }

    fn on_conversation_added(&self, partner: &UserId) {
        self.send(SessionEvent::ConversationAdded(partner.clone()));
    }

    fn on_render(&self, plan: &RenderPlan) {
        self.send(SessionEvent::Render(plan.clone()));
    }

    fn on_unread_changed(&self, partner: &UserId, unread: bool) {
        self.send(SessionEvent::UnreadChanged {
            partner: partner.clone(),
            unread,
        });
    }

    fn on_poll_error(&self, partner: Option<&UserId>, error: &ChatError) {
        self.send(SessionEvent::PollFailed {
            partner: partner.cloned(),
            error: error.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_channel_observer_forwards_dispatched_events() {
        let (tx, rx) = mpsc::channel();
        let observer = ChannelObserver::new(tx);

        let events = vec![
            SessionEvent::PhaseChanged(SessionPhase::Active),
            SessionEvent::ConversationAdded(UserId::new("bob")),
            SessionEvent::UnreadChanged {
                partner: UserId::new("bob"),
                unread: true,
            },
            SessionEvent::PollFailed {
                partner: None,
                error: ChatError::transport("offline"),
            },
        ];
        for event in &events {
            dispatch(&observer, event);
        }

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), events);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        ChannelObserver::new(tx).on_phase_changed(SessionPhase::Closed);
    }
}
