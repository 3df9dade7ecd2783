//! Error types for the cursor layer
//!
//! This module defines all error types that can occur while navigating or
//! mutating a cursor, from caller usage errors to protocol failures and
//! key consistency violations.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the cursor layer
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Usage Errors
    // =========================================================================
    /// Operation on a closed fetcher
    #[error("result set is already closed")]
    FetcherClosed,

    /// Operation on a closed row updater
    #[error("corresponding result set is closed")]
    UpdaterClosed,

    /// Mutation requested while not positioned on a row
    #[error("result set is not positioned on a row")]
    NotOnRow,

    /// Non-insert mutation requested while positioned on the insert row
    #[error("only insert_row() is allowed when result set is positioned on insert row")]
    InsertRowOnly,

    /// Requested a row buffer that does not match the current row mode
    #[error("cannot return {expected} row, currently positioned on {actual} row")]
    WrongRow {
        expected: &'static str,
        actual: &'static str,
    },

    /// Scrolling requested on a forward-only result set
    #[error("operation not allowed on a forward-only result set")]
    ForwardOnly,

    /// Update requested without any modified column
    #[error("no columns were updated")]
    NoColumnsUpdated,

    /// Field index outside the row descriptor
    #[error("invalid field index: {0}")]
    InvalidFieldIndex(usize),

    /// Feature not supported
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // =========================================================================
    // Updatability Errors
    // =========================================================================
    /// The result set cannot be updated
    #[error("result set is not updatable: {0}")]
    NotUpdatable(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// General protocol error
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Buffer underflow - not enough data to read
    #[error("buffer underflow: need {needed} bytes but only {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    /// Database error with error code
    #[error("database error {code}: {message}")]
    Database { code: i32, message: String },

    // =========================================================================
    // Consistency Errors
    // =========================================================================
    /// A refresh by key matched zero or several rows
    #[error("refresh matched {rows} rows; key columns do not identify a single row")]
    RefreshMismatch { rows: usize },
}

impl Error {
    /// Create a new database error
    pub fn database(code: i32, message: impl Into<String>) -> Self {
        Error::Database {
            code,
            message: message.into(),
        }
    }

    /// Create a new non-updatable error
    pub fn not_updatable(reason: impl Into<String>) -> Self {
        Error::NotUpdatable(reason.into())
    }

    /// Check if this error was caused by the caller using the cursor incorrectly
    ///
    /// Usage errors leave the cursor state untouched.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Error::FetcherClosed
                | Error::UpdaterClosed
                | Error::NotOnRow
                | Error::InsertRowOnly
                | Error::WrongRow { .. }
                | Error::ForwardOnly
                | Error::NoColumnsUpdated
                | Error::InvalidFieldIndex(_)
                | Error::FeatureNotSupported(_)
                | Error::InvalidConfig(_)
        )
    }

    /// Check if this error reports a result set that can never be updated
    pub fn is_not_updatable(&self) -> bool {
        matches!(self, Error::NotUpdatable(_))
    }

    /// Check if this is a connection or protocol error
    ///
    /// After such an error the cursor's cached state is unreliable and the
    /// cursor should be closed.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_)
                | Error::BufferUnderflow { .. }
                | Error::Database { .. }
        )
    }

    /// Check if this error means the derived key did not identify a single row
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, Error::RefreshMismatch { .. })
    }
}
