//! Error types for the response correlator

use modbus_types::{ExceptionResponse, TransactionId};
use thiserror::Error;

/// Failures surfaced to callers waiting on a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelatorError {
    /// No frame matched the transaction before the deadline.
    #[error("No response to transaction {transaction_id} within {timeout_ms} ms")]
    NoResponse {
        transaction_id: TransactionId,
        timeout_ms: u64,
    },

    /// A frame matched but the server answered with an exception.
    #[error("Transaction {transaction_id} answered with exception: {exception}")]
    ProtocolError {
        transaction_id: TransactionId,
        exception: ExceptionResponse,
    },

    /// The id is still in flight.
    #[error("Transaction {transaction_id} is already pending")]
    AlreadyPending { transaction_id: TransactionId },

    /// The id timed out recently and is held back so a late frame is not
    /// mistaken for an answer to a new request.
    #[error("Transaction {transaction_id} is reserved after a timeout")]
    TransactionIdReserved { transaction_id: TransactionId },

    #[error("Transaction {transaction_id} is outside the id space of {space_size}")]
    TransactionIdOutOfRange {
        transaction_id: TransactionId,
        space_size: u32,
    },

    #[error("All {space_size} transaction ids are in use")]
    IdSpaceExhausted { space_size: u32 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl CorrelatorError {
    /// Whether retrying with a fresh transaction id can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoResponse { .. } | Self::Transport(_) | Self::IdSpaceExhausted { .. }
        )
    }

    /// Misuse of the transaction id space by the caller.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyPending { .. }
                | Self::TransactionIdReserved { .. }
                | Self::TransactionIdOutOfRange { .. }
        )
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            Self::NoResponse { transaction_id, .. }
            | Self::ProtocolError { transaction_id, .. }
            | Self::AlreadyPending { transaction_id }
            | Self::TransactionIdReserved { transaction_id }
            | Self::TransactionIdOutOfRange { transaction_id, .. } => Some(*transaction_id),
            Self::IdSpaceExhausted { .. } | Self::Transport(_) => None,
        }
    }
}

/// Errors reported by the connection owner
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Response timeout must be greater than zero")]
    ZeroResponseTimeout,

    #[error("Response timeout of {timeout_ms} ms exceeds the maximum of {max_ms} ms")]
    ResponseTimeoutTooLarge { timeout_ms: u64, max_ms: u64 },

    #[error("Transaction id space must be between 1 and {max}, got {size}")]
    InvalidIdSpace { size: u32, max: u32 },

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use modbus_types::ExceptionCode;

    #[test]
    fn test_retryable_classification() {
        let timeout = CorrelatorError::NoResponse {
            transaction_id: TransactionId::new(1),
            timeout_ms: 50,
        };
        assert!(timeout.is_retryable());
        assert!(!timeout.is_usage_error());

        let pending = CorrelatorError::AlreadyPending {
            transaction_id: TransactionId::new(1),
        };
        assert!(!pending.is_retryable());
        assert!(pending.is_usage_error());

        let exception = CorrelatorError::ProtocolError {
            transaction_id: TransactionId::new(2),
            exception: ExceptionResponse::new(0x03, ExceptionCode::IllegalDataValue),
        };
        assert!(!exception.is_retryable());
        assert_eq!(exception.transaction_id(), Some(TransactionId::new(2)));
    }

    #[test]
    fn test_transport_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: CorrelatorError = TransportError::from(io).into();
        assert!(matches!(err, CorrelatorError::Transport(TransportError::Io(_))));
        assert_eq!(err.transaction_id(), None);
    }
}
