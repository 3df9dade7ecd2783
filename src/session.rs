//! Statement session interface
//!
//! The cursor layer never talks to the wire directly. Everything it needs
//! from the protocol and statement layer goes through the [`Session`] trait:
//! scroll fetches, cursor info, statement preparation and execution,
//! transactions and table metadata.
//!
//! A session is shared between the fetcher and the row updater of a cursor
//! (and between all cursors of a connection) as a [`SharedSession`]. Holding
//! its lock is what makes an operation exclusive.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::constants::FetchType;
use crate::error::Result;
use crate::row::RowValue;

/// A session shared behind the connection's exclusive lock
pub type SharedSession<S> = Arc<Mutex<S>>;

/// Wrap a session for sharing
pub fn shared<S: Session>(session: S) -> SharedSession<S> {
    Arc::new(Mutex::new(session))
}

/// Handle of a statement allocated on the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle(pub u32);

/// Handle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionHandle(pub u32);

/// Rows returned by one remote fetch, with the cursor boundary flags
///
/// Rows of a `PRIOR` fetch are in delivery order, that is from the highest
/// position to the lowest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchBatch {
    /// Rows in delivery order
    pub rows: Vec<RowValue>,
    /// The server cursor ended up before the first row
    pub before_first: bool,
    /// The server cursor ended up after the last row
    pub after_last: bool,
}

impl FetchBatch {
    /// Create a batch without boundary flags
    pub fn new(rows: Vec<RowValue>) -> Self {
        Self {
            rows,
            before_first: false,
            after_last: false,
        }
    }

    /// Set the before-first flag
    pub fn with_before_first(mut self, before_first: bool) -> Self {
        self.before_first = before_first;
        self
    }

    /// Set the after-last flag
    pub fn with_after_last(mut self, after_last: bool) -> Self {
        self.after_last = after_last;
        self
    }

    /// Number of rows received
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no rows were received
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Why a fetcher is being closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionReason {
    /// Explicit close by the caller
    #[default]
    Other,
    /// The owning statement completed
    StatementCompleted,
    /// The owning transaction ended
    TransactionEnd,
}

impl CompletionReason {
    /// Whether the remote cursor should be released fully
    pub fn releases_cursor(self) -> bool {
        matches!(
            self,
            CompletionReason::StatementCompleted | CompletionReason::TransactionEnd
        )
    }
}

/// Statement and protocol operations consumed by the cursor layer
#[async_trait::async_trait]
pub trait Session: Send {
    /// Fetch using a scroll fetch type
    ///
    /// `position` is the absolute or relative target for `Absolute` and
    /// `Relative`, ignored otherwise. `fetch_size` is the batch size for
    /// `Next` and `Prior`.
    async fn fetch_scroll(
        &mut self,
        stmt: StatementHandle,
        fetch_type: FetchType,
        fetch_size: u32,
        position: i64,
    ) -> Result<FetchBatch>;

    /// Fetch the next batch of a forward-only cursor
    async fn fetch_rows(&mut self, stmt: StatementHandle, fetch_size: u32) -> Result<FetchBatch>;

    /// Request cursor information items, returning the raw info response
    async fn cursor_info(
        &mut self,
        stmt: StatementHandle,
        items: &[u8],
        max_length: usize,
    ) -> Result<Bytes>;

    /// Whether any fetch has been performed on the statement's cursor
    fn has_fetched(&self, stmt: StatementHandle) -> bool;

    /// Whether the server supports scroll fetches
    fn supports_fetch_scroll(&self) -> bool;

    /// Close the statement's open cursor
    async fn close_cursor(&mut self, stmt: StatementHandle, release_fully: bool) -> Result<()>;

    /// Allocate a new statement
    async fn allocate_statement(&mut self) -> Result<StatementHandle>;

    /// Prepare SQL text on a statement
    async fn prepare(&mut self, stmt: StatementHandle, sql: &str) -> Result<()>;

    /// Execute a prepared statement with positional parameters
    async fn execute(&mut self, stmt: StatementHandle, params: &RowValue) -> Result<()>;

    /// Free a statement
    async fn free_statement(&mut self, stmt: StatementHandle) -> Result<()>;

    /// The transaction statements should currently run in
    fn current_transaction(&self) -> Result<TransactionHandle>;

    /// Associate a statement with a transaction
    async fn set_transaction(&mut self, stmt: StatementHandle, tx: TransactionHandle) -> Result<()>;

    /// Columns of the best row identifier of a table, in metadata order
    async fn best_row_identifier(&mut self, table: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_reason_release() {
        assert!(!CompletionReason::Other.releases_cursor());
        assert!(CompletionReason::StatementCompleted.releases_cursor());
        assert!(CompletionReason::TransactionEnd.releases_cursor());
    }

    #[test]
    fn test_fetch_batch_flags() {
        let batch = FetchBatch::new(vec![RowValue::new(1)]).with_after_last(true);
        assert_eq!(batch.len(), 1);
        assert!(batch.after_last);
        assert!(!batch.before_first);
        assert!(FetchBatch::default().is_empty());
    }
}
