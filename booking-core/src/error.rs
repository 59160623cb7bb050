//! Error types for the booking core

use serde::Serialize;
use thiserror::Error;

/// Result type for booking operations
pub type Result<T> = std::result::Result<T, Error>;

/// Booking core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Train specification violates a creation constraint
    #[error("Invalid train spec: {0}")]
    InvalidSpec(String),

    /// Malformed or constraint-violating request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unique name already taken (train name or username)
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Not enough seats left to satisfy the request
    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats {
        /// Seats asked for
        requested: u32,
        /// Seats left on the train when the request was decided
        available: u32,
    },

    /// Caller lacks the role required for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Atomic commit failed; nothing was applied
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// The user has no bookings
    #[error("No bookings found for user {0}")]
    NoBookings(String),

    /// Inventory counter disagrees with the ledger
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Coarse status class reported to the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// Caller must change the request
    ClientError,
    /// Infrastructure fault
    ServerError,
}

impl Error {
    /// Status class for this error
    pub fn status(&self) -> StatusCategory {
        if self.http_status() >= 500 {
            StatusCategory::ServerError
        } else {
            StatusCategory::ClientError
        }
    }

    /// HTTP status code a transport should respond with
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidSpec(_) => 400,
            Error::InvalidRequest(_) => 400,
            Error::InsufficientSeats { .. } => 400,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::NoBookings(_) => 404,
            Error::DuplicateName(_) => 409,
            Error::TransactionFailed(_) => 500,
            Error::InvariantViolation(_) => 500,
            Error::Storage(_) => 500,
            Error::Serialization(_) => 500,
            Error::Config(_) => 500,
            Error::Io(_) => 500,
        }
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidSpec(_) => "invalid_spec",
            Error::InvalidRequest(_) => "invalid_request",
            Error::DuplicateName(_) => "duplicate_name",
            Error::NotFound(_) => "not_found",
            Error::InsufficientSeats { .. } => "insufficient_seats",
            Error::Forbidden(_) => "forbidden",
            Error::TransactionFailed(_) => "transaction_failed",
            Error::NoBookings(_) => "no_bookings",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Storage(_) => "storage_error",
            Error::Serialization(_) => "serialization_error",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
        }
    }

    /// Whether the caller may safely retry the same call
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransactionFailed(_))
    }

    /// Collapse infrastructure faults raised inside an atomic unit
    pub(crate) fn into_transaction_failure(self) -> Self {
        match self {
            Error::Storage(msg) => Error::TransactionFailed(msg),
            Error::Serialization(e) => Error::TransactionFailed(e.to_string()),
            Error::Io(e) => Error::TransactionFailed(e.to_string()),
            other => other,
        }
    }
}
