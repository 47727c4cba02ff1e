//! Error types for the power source and the notification collaborators.

/// Why a power reading could not be obtained.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("meter unreachable: {0}")]
    Transport(String),

    #[error("meter answered with status {0}")]
    Status(u16),

    #[error("malformed meter payload: {0}")]
    Payload(String),
}

/// Failure of a best-effort collaborator call (chat, lights, telemetry).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("{collaborator} unreachable: {reason}")]
    Transport {
        collaborator: &'static str,
        reason: String,
    },

    #[error("{collaborator} rejected the call: {reason}")]
    Rejected {
        collaborator: &'static str,
        reason: String,
    },

    #[error("{collaborator} queue is full")]
    QueueFull { collaborator: &'static str },
}

impl ChannelError {
    pub fn collaborator(&self) -> &'static str {
        match self {
            Self::Transport { collaborator, .. }
            | Self::Rejected { collaborator, .. }
            | Self::QueueFull { collaborator } => collaborator,
        }
    }
}
