//! Error taxonomy shared by the remote client, the session and the
//! registration exchange.

/// Errors surfaced by chat operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Network failure or a non-OK HTTP/socket response
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    /// The remote answered with a payload we could not understand
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Input rejected on the client before any request was sent
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// The remote rejected the identity we asked about
    #[error("Rejected by server: {message}")]
    Conflict { message: String },

    /// Operation attempted in the wrong session phase
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Local durable storage failed
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl ChatError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    pub fn status(status: u16, context: &str) -> Self {
        Self::Transport {
            message: format!("{} returned HTTP {}", context, status),
            status: Some(status),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Whether the error happened on the wire (as opposed to local input or state)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl From<anyhow::Error> for ChatError {
    fn from(e: anyhow::Error) -> Self {
        ChatError::Storage {
            message: format!("{:#}", e),
        }
    }
}

/// Result alias for chat operations
pub type ChatResult<T> = std::result::Result<T, ChatError>;
