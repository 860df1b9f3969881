//! Error types.
//!
//! Library code returns these typed errors; the binary wraps them in
//! `anyhow` at the top level.

use thiserror::Error;

/// Fallback shown when the server gives no usable message for a failed write.
pub const GENERIC_MUTATION_MESSAGE: &str = "An unexpected error occurred.";

/// Message set on the store when the bulk fetch fails.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to load analyses. Please try again later.";

/// Failures of a single REST call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not authenticated: no access token available")]
    Unauthenticated,

    #[error("server returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// Message suitable for showing to a user after a failed write.
    ///
    /// Server-provided messages are passed through; everything else collapses
    /// to the generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Unauthenticated => "You need to log in first.".to_string(),
            _ => GENERIC_MUTATION_MESSAGE.to_string(),
        }
    }

    /// Returns true when the server rejected the credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthenticated
                | ApiError::Http { status: 401, .. }
                | ApiError::Http { status: 422, .. }
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else if e.is_timeout() {
            ApiError::Transport(format!("request timed out: {}", e))
        } else if e.is_connect() {
            ApiError::Transport(format!("cannot connect to server: {}", e))
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Failures surfaced by the analysis collection store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A read failed; the collection keeps its last-known-good contents.
    #[error("{message}")]
    Fetch {
        message: String,
        #[source]
        source: ApiError,
    },

    /// A write failed; the optimistic change has been rolled back.
    #[error("{message}")]
    Mutation {
        message: String,
        #[source]
        source: ApiError,
    },

    #[error("no analysis with id {0}")]
    UnknownRecord(String),
}

impl StoreError {
    pub fn fetch(source: ApiError) -> Self {
        StoreError::Fetch {
            message: FETCH_FAILED_MESSAGE.to_string(),
            source,
        }
    }

    pub fn mutation(source: ApiError) -> Self {
        StoreError::Mutation {
            message: source.user_message(),
            source,
        }
    }
}

/// Failures of the push-event channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("event stream connection failed: {0}")]
    Connect(String),

    #[error("event stream closed unexpectedly: {0}")]
    Stream(String),
}

/// Failures reading or writing the persisted session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt session file: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("no data directory available for session storage")]
    NoDataDir,
}
