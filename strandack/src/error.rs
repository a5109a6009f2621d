use thiserror::Error;

/// All errors produced by the StrandAck client.
#[derive(Debug, Error)]
pub enum StrandAckError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("frame {0} is already pending")]
    DuplicateFrame(u64),

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("client task has stopped")]
    ClientStopped,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StrandAckError {
    fn from(err: serde_json::Error) -> Self {
        StrandAckError::MalformedMessage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StrandAckError>;
