//! Error types for the ledger

use crate::grain::Grain;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every command-level variant is recoverable: the ledger is left exactly as
/// it was before the failing call. Only `Parse` raised while loading an event
/// log is fatal to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Grain parse or arithmetic failure
    #[error("grain error: {0}")]
    Grain(String),

    /// Name does not match `[A-Za-z0-9-]+`
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// Malformed input (ids, addresses, currencies, timestamps)
    #[error("{0}")]
    Validation(String),

    /// Input collides with existing ledger state
    #[error("{0}")]
    Conflict(String),

    /// Identity, allocation or distribution not found
    #[error("{0}")]
    NotFound(String),

    /// Transfer exceeds the sender's balance
    #[error("insufficient balance for transfer: {amount} > {balance}")]
    InsufficientBalance {
        /// Requested amount
        amount: Grain,
        /// Sender's balance at the time of the transfer
        balance: Grain,
    },

    /// Negative or overflowing grain amount in a command
    #[error("{0}")]
    Economic(String),

    /// Grain sent to or from an inactive account
    #[error("{0}")]
    Inactive(String),

    /// Event timestamp does not follow the latest processed event
    #[error("out-of-order timestamp: {timestamp} (latest: {latest})")]
    OutOfOrder {
        /// Timestamp of the rejected event
        timestamp: i64,
        /// Timestamp of the latest processed event
        latest: i64,
    },

    /// Invalid allocation policy or policy input
    #[error("policy error: {0}")]
    Policy(String),

    /// Corrupt or schema-incompatible event log
    #[error("parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl Error {
    /// Prefix the message with the command that raised it.
    ///
    /// Structured variants are returned unchanged so their display strings
    /// stay stable.
    pub(crate) fn in_command(self, command: &str) -> Self {
        match self {
            Error::Validation(msg) => Error::Validation(format!("{command}: {msg}")),
            Error::Conflict(msg) => Error::Conflict(format!("{command}: {msg}")),
            Error::NotFound(msg) => Error::NotFound(format!("{command}: {msg}")),
            Error::Economic(msg) => Error::Economic(format!("{command}: {msg}")),
            Error::Inactive(msg) => Error::Inactive(format!("{command}: {msg}")),
            other => other,
        }
    }
}
