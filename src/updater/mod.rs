//! Row mutation planner
//!
//! [`RowUpdater`] turns changes made to the rows of a cursor into separately
//! executed statements against the underlying table. The rows are addressed
//! by key columns derived once at construction (see [`key`]); the statement
//! text is generated from the fields the caller touched (see [`sql`]).
//!
//! The updater keeps two row buffers:
//!
//! - the current row, as last reported by the fetcher
//! - the new row, holding the fields set since the last mutation
//!
//! While positioned on the insert row only [`RowUpdater::insert_row`] is
//! allowed; the new row buffer is the row being composed.

pub mod key;
pub mod sql;

pub use sql::{StatementGenerator, StatementKind};

use std::sync::Arc;

use bytes::Bytes;

use crate::config::QuoteStrategy;
use crate::constants::REFRESH_FETCH_ROWS;
use crate::error::{Error, Result};
use crate::row::{FieldSet, RowValue};
use crate::session::{Session, SharedSession, StatementHandle};
use crate::statement::{FieldDescriptor, RowDescriptor};
use crate::statement_cache::StatementCache;

/// Executes row mutations of a single-table cursor
#[derive(Debug)]
pub struct RowUpdater<S> {
    session: SharedSession<S>,
    descriptor: Arc<RowDescriptor>,
    generator: StatementGenerator,
    statements: StatementCache,
    /// Row the cursor is positioned on
    old_row: Option<RowValue>,
    /// Fields set since the last mutation, or the insert row
    new_row: RowValue,
    in_insert_row: bool,
    closed: bool,
}

impl<S: Session + 'static> RowUpdater<S> {
    /// Create an updater for rows described by `descriptor`
    ///
    /// Fails with [`Error::NotUpdatable`] if the rows do not come from a
    /// single table or no key columns are projected.
    pub async fn new(
        session: SharedSession<S>,
        descriptor: Arc<RowDescriptor>,
        quote: QuoteStrategy,
    ) -> Result<Self> {
        let table = key::require_single_table(&descriptor)?;
        let best_row_identifier = {
            let mut s = session.lock().await;
            s.best_row_identifier(&table).await?
        };
        let key_columns = key::derive_key_columns(&descriptor, &best_row_identifier)?;
        tracing::debug!(
            table = table.as_str(),
            keys = ?key_columns.iter().map(|k| k.field_name.as_str()).collect::<Vec<_>>(),
            "Derived key columns"
        );

        let generator =
            StatementGenerator::new(table, Arc::clone(&descriptor), key_columns, quote);
        Ok(Self {
            session,
            new_row: descriptor.create_default_field_values(),
            descriptor,
            generator,
            statements: StatementCache::new(),
            old_row: None,
            in_insert_row: false,
            closed: false,
        })
    }

    /// The table rows are written to
    pub fn table(&self) -> &str {
        self.generator.table()
    }

    /// The key columns addressing a row
    pub fn key_columns(&self) -> &[FieldDescriptor] {
        self.generator.key_columns()
    }

    /// Check if the updater has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::UpdaterClosed)
        } else {
            Ok(())
        }
    }

    fn check_not_insert_row(&self) -> Result<()> {
        if self.in_insert_row {
            Err(Error::InsertRowOnly)
        } else {
            Ok(())
        }
    }

    fn require_current_row(&self) -> Result<&RowValue> {
        self.old_row
            .as_ref()
            .filter(|row| !row.is_deleted_marker())
            .ok_or(Error::NotOnRow)
    }

    fn reset_new_row(&mut self) {
        self.new_row = self.descriptor.create_default_field_values();
    }

    // =========================================================================
    // Row state
    // =========================================================================

    /// Set the row the cursor is positioned on, discarding pending changes
    pub fn set_row(&mut self, row: Option<RowValue>) {
        self.old_row = row;
        self.in_insert_row = false;
        self.reset_new_row();
    }

    /// Discard the fields set since the last mutation
    pub fn cancel_row_updates(&mut self) -> Result<()> {
        self.check_open()?;
        self.check_not_insert_row()?;
        self.reset_new_row();
        Ok(())
    }

    /// Set a field of the new row, or of the insert row
    pub fn set_field(&mut self, index: usize, value: Option<Bytes>) -> Result<()> {
        self.check_open()?;
        if index >= self.descriptor.count() {
            return Err(Error::InvalidFieldIndex(index));
        }
        self.new_row.set_field(index, value)
    }

    /// Current value of a field, with pending changes applied
    pub fn field_value(&self, index: usize) -> Result<Option<&Bytes>> {
        self.check_open()?;
        if index >= self.descriptor.count() {
            return Err(Error::InvalidFieldIndex(index));
        }
        if self.in_insert_row || self.new_row.is_initialized(index) {
            return Ok(self.new_row.field(index));
        }
        Ok(self.require_current_row()?.field(index))
    }

    /// The current row with pending changes applied
    pub fn new_row(&self) -> Result<RowValue> {
        if self.in_insert_row {
            return Err(Error::WrongRow {
                expected: "new",
                actual: "insert",
            });
        }
        let mut row = self
            .old_row
            .clone()
            .unwrap_or_else(|| self.descriptor.create_default_field_values());
        for index in self.new_row.initialized_fields().iter() {
            row.set_field(index, self.new_row.field(index).cloned())?;
        }
        row.initialize_fields();
        Ok(row)
    }

    /// The insert row being composed
    pub fn insert_row_value(&self) -> Result<RowValue> {
        if !self.in_insert_row {
            return Err(Error::WrongRow {
                expected: "insert",
                actual: "current",
            });
        }
        let mut row = self.new_row.clone();
        row.initialize_fields();
        Ok(row)
    }

    /// The row the cursor is positioned on
    pub fn old_row(&self) -> Option<&RowValue> {
        self.old_row.as_ref()
    }

    /// Fields set since the last mutation
    pub fn touched_fields(&self) -> &FieldSet {
        self.new_row.initialized_fields()
    }

    /// Start composing a row to insert
    pub fn move_to_insert_row(&mut self) -> Result<()> {
        self.check_open()?;
        self.in_insert_row = true;
        self.reset_new_row();
        Ok(())
    }

    /// Leave the insert row, discarding it
    pub fn move_to_current_row(&mut self) -> Result<()> {
        self.check_open()?;
        self.in_insert_row = false;
        self.reset_new_row();
        Ok(())
    }

    /// Check if positioned on the insert row
    pub fn is_in_insert_row(&self) -> bool {
        self.in_insert_row
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Write the touched fields of the current row, returning the new row
    pub async fn update_row(&mut self) -> Result<RowValue> {
        self.check_open()?;
        self.check_not_insert_row()?;
        let current = self.require_current_row()?;
        let sql = self.generator.update_sql(self.new_row.initialized_fields())?;
        let params = self
            .generator
            .parameters(StatementKind::Update, &self.new_row, Some(current))?;

        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.execute_locked(&mut s, StatementKind::Update, &sql, &params)
            .await?;

        let updated = self.new_row()?;
        self.old_row = Some(updated.clone());
        self.reset_new_row();
        Ok(updated)
    }

    /// Delete the current row
    pub async fn delete_row(&mut self) -> Result<()> {
        self.check_open()?;
        self.check_not_insert_row()?;
        let current = self.require_current_row()?;
        let sql = self.generator.delete_sql();
        let params = self
            .generator
            .parameters(StatementKind::Delete, &self.new_row, Some(current))?;

        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.execute_locked(&mut s, StatementKind::Delete, &sql, &params)
            .await?;

        self.old_row = Some(self.descriptor.deleted_row_marker());
        self.reset_new_row();
        Ok(())
    }

    /// Insert the insert row, returning the inserted values
    ///
    /// The insert row is cleared; the updater stays positioned on it.
    pub async fn insert_row(&mut self) -> Result<RowValue> {
        self.check_open()?;
        let inserted = self.insert_row_value()?;
        let sql = self.generator.insert_sql(self.new_row.initialized_fields());
        let params = self
            .generator
            .parameters(StatementKind::Insert, &self.new_row, None)?;

        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.execute_locked(&mut s, StatementKind::Insert, &sql, &params)
            .await?;

        self.reset_new_row();
        Ok(inserted)
    }

    /// Read the current row again from the table by its key
    pub async fn refresh_row(&mut self) -> Result<RowValue> {
        self.check_open()?;
        self.check_not_insert_row()?;
        let current = self.require_current_row()?;
        let sql = self.generator.select_sql();
        let params = self
            .generator
            .parameters(StatementKind::Select, &self.new_row, Some(current))?;

        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        let handle = self
            .execute_locked(&mut s, StatementKind::Select, &sql, &params)
            .await?;
        let fetched = s.fetch_rows(handle, REFRESH_FETCH_ROWS).await;
        let closed = s.close_cursor(handle, false).await;
        let mut batch = fetched?;
        closed?;

        if batch.len() != 1 {
            tracing::warn!(
                table = self.generator.table(),
                rows = batch.len(),
                "Refresh by key did not match a single row"
            );
            return Err(Error::RefreshMismatch { rows: batch.len() });
        }
        let mut row = batch.rows.remove(0);
        row.initialize_fields();
        self.old_row = Some(row.clone());
        self.reset_new_row();
        Ok(row)
    }

    /// Free the cached statements
    ///
    /// Closing twice is a no-op. All statements are freed even if one
    /// fails; the first failure is returned.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.old_row = None;
        self.reset_new_row();

        let handles = self.statements.drain();
        if handles.is_empty() {
            return Ok(());
        }
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        let mut result = Ok(());
        for handle in handles {
            if let Err(e) = s.free_statement(handle).await {
                tracing::warn!(stmt = handle.0, error = %e, "Failed to free row statement");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Execute a row statement, allocating and preparing it when needed
    ///
    /// The statement is bound to the session's current transaction on
    /// every use.
    async fn execute_locked(
        &mut self,
        s: &mut S,
        kind: StatementKind,
        sql: &str,
        params: &RowValue,
    ) -> Result<StatementHandle> {
        let handle = match self.statements.get(kind) {
            Some(handle) => handle,
            None => {
                let handle = s.allocate_statement().await?;
                self.statements.put(kind, handle);
                handle
            }
        };

        let tx = s.current_transaction()?;
        s.set_transaction(handle, tx).await?;

        if self.statements.needs_prepare(kind, sql) {
            if let Err(e) = s.prepare(handle, sql).await {
                self.statements.invalidate(kind);
                return Err(e);
            }
            self.statements.mark_prepared(kind, sql);
        }

        tracing::debug!(
            kind = %kind,
            stmt = handle.0,
            params = params.count(),
            sql,
            "Executing row statement"
        );
        s.execute(handle, params).await?;
        Ok(handle)
    }
}
