use std::fmt;

/// Lifecycle of the realtime connection.
///
/// ```text
/// Disconnected → Connecting → Open → Closing → Disconnected
///                    │                              ↑
///                    └──────── (attempt failed) ────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal lifecycle step.
    ///
    /// Any state may drop straight to `Disconnected` (explicit disconnect).
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Open)
                | (Connecting, Closing)
                | (Open, Closing)
                | (_, Disconnected)
        )
    }

    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        };
        write!(f, "{}", name)
    }
}
