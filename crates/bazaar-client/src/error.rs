use thiserror::Error;

use bazaar_shared::{QueryError, ValidationError};
use bazaar_store::StoreError;

/// Errors surfaced by the client's remote calls and flows.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Realtime websocket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// The backend answered 2xx with a body we could not use.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Form input rejected before any remote call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Realtime subscription closed")]
    SubscriptionClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether this error came from form validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
