//! Broker error types.

/// Errors that can occur during broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("order error: {0}")]
    Order(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("not connected")]
    NotConnected,

    #[error("{0}")]
    Other(String),
}
