//! Updatable scrollable cursors
//!
//! A [`Cursor`] ties together the fetcher chosen for the statement, the
//! update-tracking decorator and, for updatable cursors, the row updater.
//! Navigation goes through the decorator; every row it lands on is handed
//! to the updater as the row to mutate. Mutations run their statements
//! through the updater first and are then recorded in the decorator's
//! overlay, so the cursor shows the changed rows without re-executing the
//! query.
//!
//! # Example
//!
//! ```rust,ignore
//! use rowcursor::{Concurrency, Cursor, FetchConfig, QuoteStrategy, ResultSetType};
//!
//! let config = FetchConfig::new()
//!     .with_result_set_type(ResultSetType::ScrollInsensitive)
//!     .with_concurrency(Concurrency::Updatable);
//! let mut cursor = Cursor::open(session, stmt, descriptor, config, QuoteStrategy::DoubleQuotes).await?;
//!
//! cursor.last().await?;
//! cursor.update_field(1, Some("new name".into()))?;
//! cursor.update_row().await?;
//!
//! cursor.move_to_insert_row()?;
//! cursor.update_field(0, Some("42".into()))?;
//! cursor.insert_row().await?;
//! cursor.move_to_current_row()?;
//! ```

use std::sync::Arc;

use bytes::Bytes;

use crate::config::{FetchConfig, QuoteStrategy};
use crate::constants::FetchDirection;
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, FetcherListener, StatementFetcher, UpdatableFetcher};
use crate::row::RowValue;
use crate::session::{CompletionReason, Session, SharedSession, StatementHandle};
use crate::statement::RowDescriptor;
use crate::updater::RowUpdater;

/// A positioned cursor over the rows of an executed statement
#[derive(Debug)]
pub struct Cursor<S> {
    descriptor: Arc<RowDescriptor>,
    fetcher: UpdatableFetcher<StatementFetcher<S>>,
    /// The updater, or why the rows cannot be updated
    updater: std::result::Result<RowUpdater<S>, String>,
}

impl<S: Session + 'static> Cursor<S> {
    /// Open a cursor over the rows of an executed statement
    ///
    /// When `config` asks for updatable concurrency but the rows cannot be
    /// updated, the cursor is still opened; every mutation then reports
    /// the reason.
    pub async fn open(
        session: SharedSession<S>,
        stmt: StatementHandle,
        descriptor: Arc<RowDescriptor>,
        config: FetchConfig,
        quote: QuoteStrategy,
    ) -> Result<Self> {
        let fetcher = StatementFetcher::open(Arc::clone(&session), stmt, config).await?;
        tracing::debug!(stmt = stmt.0, kind = fetcher.kind(), "Cursor opened");

        let updater = if config.is_updatable() {
            match RowUpdater::new(session, Arc::clone(&descriptor), quote).await {
                Ok(updater) => Ok(updater),
                Err(Error::NotUpdatable(reason)) => {
                    tracing::debug!(stmt = stmt.0, reason = reason.as_str(), "Cursor is not updatable");
                    Err(reason)
                }
                Err(e) => return Err(e),
            }
        } else {
            Err("result set concurrency is read-only".to_string())
        };

        Ok(Self {
            fetcher: UpdatableFetcher::new(fetcher, descriptor.deleted_row_marker()),
            descriptor,
            updater,
        })
    }

    /// Descriptor of the cursor's rows
    pub fn descriptor(&self) -> &Arc<RowDescriptor> {
        &self.descriptor
    }

    /// Check if rows can be mutated through this cursor
    pub fn is_updatable(&self) -> bool {
        self.updater.is_ok()
    }

    /// The underlying decorated fetcher
    pub fn fetcher(&self) -> &UpdatableFetcher<StatementFetcher<S>> {
        &self.fetcher
    }

    fn updater_mut(&mut self) -> Result<&mut RowUpdater<S>> {
        match &mut self.updater {
            Ok(updater) => Ok(updater),
            Err(reason) => Err(Error::not_updatable(reason.clone())),
        }
    }

    fn updater_ref(&self) -> Result<&RowUpdater<S>> {
        match &self.updater {
            Ok(updater) => Ok(updater),
            Err(reason) => Err(Error::not_updatable(reason.clone())),
        }
    }

    /// Hand the row the fetcher is on to the updater
    fn sync_row(&mut self, on_row: bool) -> bool {
        if let Ok(updater) = &mut self.updater {
            updater.set_row(self.fetcher.current_row().cloned());
        }
        on_row
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Move to the first row
    pub async fn first(&mut self) -> Result<bool> {
        let on_row = self.fetcher.first().await?;
        Ok(self.sync_row(on_row))
    }

    /// Move to the last row
    pub async fn last(&mut self) -> Result<bool> {
        let on_row = self.fetcher.last().await?;
        Ok(self.sync_row(on_row))
    }

    /// Move to the next row
    pub async fn next(&mut self) -> Result<bool> {
        let on_row = self.fetcher.next().await?;
        Ok(self.sync_row(on_row))
    }

    /// Move to the previous row
    pub async fn previous(&mut self) -> Result<bool> {
        let on_row = self.fetcher.previous().await?;
        Ok(self.sync_row(on_row))
    }

    /// Move to an absolute row; negative rows count from the end
    pub async fn absolute(&mut self, row: i64) -> Result<bool> {
        let on_row = self.fetcher.absolute(row).await?;
        Ok(self.sync_row(on_row))
    }

    /// Move by a number of rows
    pub async fn relative(&mut self, rows: i64) -> Result<bool> {
        let on_row = self.fetcher.relative(rows).await?;
        Ok(self.sync_row(on_row))
    }

    /// Move before the first row
    pub async fn before_first(&mut self) -> Result<()> {
        self.fetcher.before_first().await?;
        self.sync_row(false);
        Ok(())
    }

    /// Move after the last row
    pub async fn after_last(&mut self) -> Result<()> {
        self.fetcher.after_last().await?;
        self.sync_row(false);
        Ok(())
    }

    /// Number of rows, including rows inserted through this cursor
    pub async fn size(&mut self) -> Result<i64> {
        self.fetcher.size().await
    }

    /// Current 1-based position, 0 before the first row
    pub fn current_position(&self) -> i64 {
        self.fetcher.current_position()
    }

    /// Current row number, 0 when not on a row
    pub async fn row_num(&mut self) -> Result<i64> {
        self.fetcher.row_num().await
    }

    /// Check if the cursor has no rows
    pub async fn is_empty(&mut self) -> Result<bool> {
        self.fetcher.is_empty().await
    }

    /// Check if positioned before the first row
    pub async fn is_before_first(&mut self) -> Result<bool> {
        self.fetcher.is_before_first().await
    }

    /// Check if positioned on the first row
    pub async fn is_first(&mut self) -> Result<bool> {
        self.fetcher.is_first().await
    }

    /// Check if positioned on the last row
    pub async fn is_last(&mut self) -> Result<bool> {
        self.fetcher.is_last().await
    }

    /// Check if positioned after the last row
    pub async fn is_after_last(&mut self) -> Result<bool> {
        self.fetcher.is_after_last().await
    }

    /// Fetch size hint
    pub fn fetch_size(&self) -> u32 {
        self.fetcher.fetch_size()
    }

    /// Change the fetch size hint for later remote fetches
    pub fn set_fetch_size(&mut self, fetch_size: u32) {
        self.fetcher.set_fetch_size(fetch_size);
    }

    /// Fetch direction hint
    pub fn fetch_direction(&self) -> FetchDirection {
        self.fetcher.fetch_direction()
    }

    /// Change the fetch direction hint
    pub fn set_fetch_direction(&mut self, direction: FetchDirection) {
        self.fetcher.set_fetch_direction(direction);
    }

    /// Register a listener for the rows the cursor moves to
    pub fn set_listener(&mut self, listener: Box<dyn FetcherListener>) {
        self.fetcher.set_listener(listener);
    }

    // =========================================================================
    // Row access
    // =========================================================================

    /// The row at the current position, with local modifications applied
    pub fn row(&self) -> Option<&RowValue> {
        self.fetcher.current_row()
    }

    /// Value of a field of the current row or the insert row
    ///
    /// Pending field updates are visible before the row is written.
    pub fn field(&self, index: usize) -> Result<Option<Bytes>> {
        if index >= self.descriptor.count() {
            return Err(Error::InvalidFieldIndex(index));
        }
        if let Ok(updater) = &self.updater {
            return updater.field_value(index).map(|value| value.cloned());
        }
        let row = self.fetcher.current_row().ok_or(Error::NotOnRow)?;
        Ok(row.field(index).cloned())
    }

    /// Check if the current row was updated through this cursor
    pub fn row_updated(&self) -> bool {
        self.fetcher.row_updated()
    }

    /// Check if the current row was deleted through this cursor
    pub fn row_deleted(&self) -> bool {
        self.fetcher.row_deleted()
    }

    /// Check if the current row was inserted through this cursor
    pub async fn row_inserted(&mut self) -> Result<bool> {
        self.fetcher.row_inserted().await
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Set a field of the current row or of the insert row
    pub fn update_field(&mut self, index: usize, value: Option<Bytes>) -> Result<()> {
        self.updater_mut()?.set_field(index, value)
    }

    /// Write the updated fields of the current row to the table
    pub async fn update_row(&mut self) -> Result<()> {
        let row = self.updater_mut()?.update_row().await?;
        self.fetcher.update_row(row).await
    }

    /// Delete the current row from the table
    pub async fn delete_row(&mut self) -> Result<()> {
        self.updater_mut()?.delete_row().await?;
        self.fetcher.delete_row().await?;
        self.sync_row(true);
        Ok(())
    }

    /// Insert the insert row into the table and append it to the cursor
    ///
    /// The cursor stays on the insert row.
    pub async fn insert_row(&mut self) -> Result<()> {
        let row = self.updater_mut()?.insert_row().await?;
        self.fetcher.insert_row(row).await
    }

    /// Read the current row again from the table
    pub async fn refresh_row(&mut self) -> Result<()> {
        let row = self.updater_mut()?.refresh_row().await?;
        self.fetcher.update_row(row).await
    }

    /// Discard the field updates of the current row
    pub fn cancel_row_updates(&mut self) -> Result<()> {
        self.updater_mut()?.cancel_row_updates()
    }

    /// Move to the insert row
    pub fn move_to_insert_row(&mut self) -> Result<()> {
        self.fetcher.check_open()?;
        self.updater_mut()?.move_to_insert_row()
    }

    /// Leave the insert row, back to the row the cursor was on
    pub fn move_to_current_row(&mut self) -> Result<()> {
        self.fetcher.check_open()?;
        self.updater_mut()?.move_to_current_row()
    }

    /// Check if positioned on the insert row
    pub fn is_in_insert_row(&self) -> bool {
        self.updater_ref()
            .map(RowUpdater::is_in_insert_row)
            .unwrap_or(false)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Check if the cursor has been closed
    pub fn is_closed(&self) -> bool {
        self.fetcher.is_closed()
    }

    /// Close the fetcher and free the updater's statements
    ///
    /// Closing twice is a no-op. The updater is closed even if closing the
    /// fetcher fails; the fetcher's error is returned first.
    pub async fn close(&mut self, reason: CompletionReason) -> Result<()> {
        let fetcher_result = self.fetcher.close(reason).await;
        let updater_result = match &mut self.updater {
            Ok(updater) => updater.close().await,
            Err(_) => Ok(()),
        };
        fetcher_result.and(updater_result)
    }
}
