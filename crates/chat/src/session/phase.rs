use serde::Serialize;
use std::fmt;

/// Where a session is in its lifecycle.
///
/// `Anonymous -> Authenticating -> Bootstrapping -> Active -> Closing -> Closed`.
/// A failed login or bootstrap returns to `Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Anonymous,
    /// Login request in flight
    Authenticating,
    /// Waiting for the backend readiness check and the initial directory
    Bootstrapping,
    /// Both polling loops running
    Active,
    Closing,
    Closed,
}

impl SessionPhase {
    /// Whether a login may start from this phase
    pub fn can_login(self) -> bool {
        matches!(self, Self::Anonymous | Self::Closed)
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Bootstrapping => "bootstrapping",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
