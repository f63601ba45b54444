//! Error types and handling
//!
//! Every variant is recoverable at the request level: a failed signaling
//! message or combine run is logged and reported, never fatal to the process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request-level error taxonomy
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Session {0} was not found")]
    SessionNotFound(String),

    #[error("Session {0} already exists")]
    DuplicateSession(String),

    #[error("Transport {0} was not found")]
    TransportNotFound(String),

    #[error("Port pool {min}-{max} is exhausted")]
    PoolExhausted { min: u16, max: u16 },

    #[error("RTP publish failed: {0}")]
    BridgeFailed(String),

    #[error("Session {0} is already recording")]
    AlreadyRecording(String),

    #[error("Session {0} is not recording")]
    NotRecording(String),

    #[error("Recording start for {0} was cancelled")]
    StartCancelled(String),

    #[error("Message for session {got} arrived on the connection of {expected}")]
    SessionMismatch { expected: String, got: String },

    #[error("No layout available for {0} inputs")]
    LayoutUnavailable(usize),

    #[error("Action {0} already has a pending callback")]
    DuplicatePending(String),

    #[error("Action {0} has no pending callback")]
    NoPendingAction(String),

    #[error("{tool} failed ({status}): {stderr}")]
    ExternalToolFailure {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Invalid signaling message: {0}")]
    InvalidMessage(String),

    /// Error reply received from the signaling server
    #[error("Server rejected {action} ({code}): {message}")]
    Rejected {
        action: String,
        code: String,
        message: String,
    },

    #[error("Signaling channel closed")]
    ChannelClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordError {
    /// Stable code sent to clients alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            RecordError::DuplicateSession(_) => "DUPLICATE_SESSION",
            RecordError::TransportNotFound(_) => "TRANSPORT_NOT_FOUND",
            RecordError::PoolExhausted { .. } => "POOL_EXHAUSTED",
            RecordError::BridgeFailed(_) => "BRIDGE_FAILED",
            RecordError::AlreadyRecording(_) => "ALREADY_RECORDING",
            RecordError::NotRecording(_) => "NOT_RECORDING",
            RecordError::StartCancelled(_) => "START_CANCELLED",
            RecordError::SessionMismatch { .. } => "SESSION_MISMATCH",
            RecordError::LayoutUnavailable(_) => "LAYOUT_UNAVAILABLE",
            RecordError::DuplicatePending(_) => "DUPLICATE_PENDING",
            RecordError::NoPendingAction(_) => "NO_PENDING_ACTION",
            RecordError::ExternalToolFailure { .. } => "EXTERNAL_TOOL_FAILURE",
            RecordError::InvalidMessage(_) => "INVALID_MESSAGE",
            RecordError::Rejected { .. } => "REJECTED",
            RecordError::ChannelClosed => "CHANNEL_CLOSED",
            RecordError::Io(_) => "IO_ERROR",
        }
    }
}

/// Error body returned over HTTP
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<RecordError> for ErrorResponse {
    fn from(error: RecordError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using RecordError
pub type RecordResult<T> = Result<T, RecordError>;
