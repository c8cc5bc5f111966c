//! Customer error types.

use saga::{SagaError, StepError};
use thiserror::Error;

use crate::client::ResourceKind;

/// Failure reported by the downstream customer-management service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The request conflicts with existing data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The referenced resource does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: i64 },

    /// The service rejected the request body.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The service could not be reached or answered with a server error.
    #[error("Customer service unavailable: {0}")]
    Unavailable(String),

    /// Anything else.
    #[error("Customer service error: {0}")]
    Internal(String),
}

impl From<ClientError> for StepError {
    fn from(e: ClientError) -> Self {
        let message = e.to_string();
        match e {
            ClientError::Conflict(_) => StepError::conflict(message),
            ClientError::NotFound { .. } => StepError::not_found(message),
            ClientError::InvalidRequest(_) => StepError::invalid_input(message),
            ClientError::Unavailable(_) => StepError::unavailable(message),
            ClientError::Internal(_) => StepError::internal(message),
        }
    }
}

/// Errors raised by [`CustomerCommandService`](crate::CustomerCommandService)
/// before a saga runs.
#[derive(Debug, Error)]
pub enum CustomerError {
    /// The saga could not be started.
    #[error(transparent)]
    Saga(#[from] SagaError),

    /// The command is unusable as given.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

/// Convenience type alias for customer service results.
pub type Result<T> = std::result::Result<T, CustomerError>;
