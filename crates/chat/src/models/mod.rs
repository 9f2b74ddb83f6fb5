//! Domain models for chat entities

mod conversation;
mod message;

pub use conversation::Conversation;
pub use message::{
    Direction, Message, OUTGOING_SENDER_MARKER, UserId, format_timestamp, parse_timestamp,
};
