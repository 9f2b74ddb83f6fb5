//! Terminal rendering of session events

use chat::{
    ChatError, Direction, RenderOp, RenderPlan, SessionEvent, SessionObserver, SessionPhase,
    UserId,
};
use tokio::sync::mpsc::UnboundedSender;

/// Forwards session events to the terminal task
pub struct TerminalObserver {
    events: UnboundedSender<SessionEvent>,
}

impl TerminalObserver {
    pub fn new(events: UnboundedSender<SessionEvent>) -> Self {
        Self { events }
    }

    fn forward(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

impl SessionObserver for TerminalObserver {
    fn on_phase_changed(&self, phase: SessionPhase) {
        self.forward(SessionEvent::PhaseChanged(phase));
    }

    fn on_conversation_added(&self, partner: &UserId) {
        self.forward(SessionEvent::ConversationAdded(partner.clone()));
    }

    fn on_render(&self, plan: &RenderPlan) {
        self.forward(SessionEvent::Render(plan.clone()));
    }

    fn on_unread_changed(&self, partner: &UserId, unread: bool) {
        self.forward(SessionEvent::UnreadChanged {
            partner: partner.clone(),
            unread,
        });
    }

    fn on_poll_error(&self, partner: Option<&UserId>, error: &ChatError) {
        self.forward(SessionEvent::PollFailed {
            partner: partner.cloned(),
            error: error.clone(),
        });
    }
}

/// Lines to print for one event. Poll failures are left to the log.
pub fn describe(event: &SessionEvent) -> Vec<String> {
    match event {
        SessionEvent::PhaseChanged(phase) => vec![format!("* session {}", phase)],
        SessionEvent::ConversationAdded(partner) => vec![format!("+ conversation with {}", partner)],
        SessionEvent::UnreadChanged { partner, unread: true } => {
            vec![format!("! new messages from {}", partner)]
        }
        SessionEvent::UnreadChanged { .. } | SessionEvent::PollFailed { .. } => Vec::new(),
        SessionEvent::Render(plan) => describe_plan(plan),
    }
}

fn describe_plan(plan: &RenderPlan) -> Vec<String> {
    plan.ops
        .iter()
        .filter_map(|op| match op {
            RenderOp::ResetTimeline => Some(format!("=== {} ===", plan.partner)),
            RenderOp::InsertDivider { label } => Some(format!("--- {} ---", label)),
            RenderOp::AppendBubble {
                direction,
                text,
                timestamp,
            } => {
                let time = timestamp.with_timezone(&chrono::Local).format("%H:%M");
                let who = match direction {
                    Direction::Sent => "you".to_string(),
                    Direction::Received => plan.partner.to_string(),
                };
                Some(format!("[{}] {}: {}", time, who, text))
            }
            RenderOp::ClearUnread | RenderOp::MarkUnread => None,
        })
        .collect()
}

/// A line typed at the prompt
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Open(String),
    New(String),
    List,
    Close,
    Help,
    Send(String),
    Empty,
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if !line.starts_with('/') {
        return Command::Send(line.to_string());
    }

    let (name, arg) = match line.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };
    match name {
        "/open" => Command::Open(arg.to_string()),
        "/new" => Command::New(arg.to_string()),
        "/list" => Command::List,
        "/close" | "/quit" => Command::Close,
        _ => Command::Help,
    }
}

pub const HELP: &str = "commands: /open <user>, /new <user>, /list, /close; anything else is sent";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/open bob"), Command::Open("bob".into()));
        assert_eq!(parse_command("/new  carol "), Command::New("carol".into()));
        assert_eq!(parse_command("/quit"), Command::Close);
        assert_eq!(parse_command("/wat"), Command::Help);
        assert_eq!(parse_command("  hello there "), Command::Send("hello there".into()));
        assert_eq!(parse_command("   "), Command::Empty);
    }

    #[test]
    fn test_describe_plan() {
        let plan = RenderPlan {
            partner: UserId::new("bob"),
            ops: vec![
                RenderOp::ResetTimeline,
                RenderOp::ClearUnread,
                RenderOp::InsertDivider {
                    label: "Today".into(),
                },
                RenderOp::AppendBubble {
                    direction: Direction::Received,
                    text: "hi".into(),
                    timestamp: Utc::now(),
                },
            ],
        };

        let lines = describe(&SessionEvent::Render(plan));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "=== bob ===");
        assert_eq!(lines[1], "--- Today ---");
        assert!(lines[2].ends_with("bob: hi"));
    }
}
