//! Error types for the quiz client.

use thiserror::Error;

use crate::stage::Stage;

/// Errors that can occur while joining or playing a quiz game.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The HTTP request could not be completed (connection refused, reset, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status code.
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// A response did not have the shape the protocol requires
    /// (e.g. no `clientId` in the handshake response).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server reported `successful: false` for a request.
    #[error("{stage} rejected by server")]
    ServerRejected {
        /// The request that was rejected.
        stage: Stage,
        /// The raw response body, kept for diagnosis.
        body: String,
    },

    /// The game pin could not be resolved to a session token.
    #[error("could not resolve game pin {pin}: {reason}")]
    Resolution {
        /// The game pin that failed to resolve.
        pin: u32,
        /// Why resolution failed.
        reason: String,
    },

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation requires an active session.
    #[error("session is not active")]
    NotActive,

    /// Answers were submitted by hand while the client picks them itself.
    #[error("answers are chosen automatically in auto-answer mode")]
    NotInteractive,

    /// An answer slot outside the current question's answer map.
    #[error("answer slot {slot} is out of range for a question with {count} answers")]
    InvalidAnswer {
        /// The requested slot.
        slot: usize,
        /// Number of answers the question offers.
        count: usize,
    },

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,
}

impl QuizError {
    /// Returns `true` for failures of the HTTP exchange itself, which the poll
    /// loop retries according to its [`RetryPolicy`](crate::RetryPolicy).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            QuizError::Transport(_) | QuizError::HttpStatus { .. } | QuizError::Timeout
        )
    }
}

/// A specialized [`Result`] type for quiz client operations.
pub type Result<T> = std::result::Result<T, QuizError>;
