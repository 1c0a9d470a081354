//! Error types for the hub layer.

use std::error::Error as StdError;

/// Errors returned by hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// `try_dispatch` found the dispatch queue at capacity.
    #[error("dispatch queue is full")]
    DispatchFull,

    /// The routing loop has stopped; nothing will be routed any more.
    #[error("hub is shut down")]
    Closed,
}

/// An error returned by game logic from one of its hooks.
///
/// The hub logs these with the game and player ids and moves on: a failing
/// hook aborts only the event that triggered it.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl CallbackError {
    /// Creates an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying error, keeping it as the source.
    pub fn new(source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<gamerelay_protocol::ProtocolError> for CallbackError {
    fn from(err: gamerelay_protocol::ProtocolError) -> Self {
        Self::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_error_msg_has_no_source() {
        let err = CallbackError::msg("bad move");
        assert_eq!(err.to_string(), "bad move");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_callback_error_keeps_source() {
        let io = std::io::Error::other("disk on fire");
        let err = CallbackError::new(io);
        assert_eq!(err.message(), "disk on fire");
        assert!(err.source().is_some());
    }
}
