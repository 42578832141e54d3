use shared::error::ApiException;
use thiserror::Error;

use crate::types::Operation;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed before a response was received: {0}")]
    Network(String),
    #[error("failed to decode response body: {0}")]
    Decode(String),
    #[error(transparent)]
    Api(#[from] ApiException),
}

impl TransportError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TransportError::Api(exception) if exception.is_unauthorized())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Api(exception) => Some(exception.status),
            _ => None,
        }
    }

    /// Message supplied by the server, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            TransportError::Api(exception) => exception.message.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0} ignored: another operation is still in progress")]
    Busy(Operation),
    #[error("{0} requires a session; redirected to login")]
    NotAuthenticated(Operation),
    #[error("{0} rejected: the session token was refused; logged out")]
    SessionExpired(Operation),
    #[error("{operation} failed with status {status}: {message}")]
    Rejected {
        operation: Operation,
        status: u16,
        message: String,
    },
    #[error("{operation} failed: {error}")]
    Transport {
        operation: Operation,
        error: TransportError,
    },
    #[error("{operation} failed: token store error: {error:#}")]
    Storage {
        operation: Operation,
        error: anyhow::Error,
    },
}

impl SessionError {
    /// True when the failure sent the view back to the login screen.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            SessionError::NotAuthenticated(_) | SessionError::SessionExpired(_)
        )
    }
}
