use thiserror::Error;

/// Errors surfaced by the API client and the broadcasting adapter.
#[derive(Error, Debug)]
pub enum Error {
    /// The incoming authorization request carries no authenticated user.
    #[error("request is not authenticated")]
    Unauthorized,

    /// An access guard rejected a channel. Converted to a 403 entry by
    /// [`authorize`](crate::broadcast::Broadcaster::authorize), never
    /// returned from the public API.
    #[error("access to channel denied")]
    AccessDenied,

    /// A required configuration value is missing or unusable.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The server stayed unreachable after all configured attempts.
    #[error("transport failure calling {method}: {message}")]
    Transport { method: String, message: String },

    /// The server reported an error for a broadcast.
    #[error("broadcast rejected: {0}")]
    Broadcast(String),

    /// Payload serialization failed.
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
