//! Fully materialized fetcher
//!
//! Reads every row of the cursor up front and serves all navigation
//! locally. Used for holdable cursors, for scrollable cursors when the
//! server cursor is unavailable, and for forward-only cursors that need to
//! survive row mutation.

use crate::config::FetchConfig;
use crate::constants::FetchDirection;
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, FetcherListener, ListenerSlot};
use crate::row::RowValue;
use crate::session::{CompletionReason, Session, SharedSession, StatementHandle};

/// Fetcher over locally held rows
#[derive(Debug)]
pub struct CachedFetcher {
    rows: Vec<RowValue>,
    position: i64,
    forward_only: bool,
    fetch_size: u32,
    direction: FetchDirection,
    listener: ListenerSlot,
    closed: bool,
}

impl CachedFetcher {
    /// Create a fetcher over rows that were already fetched
    pub fn from_rows(rows: Vec<RowValue>, forward_only: bool) -> Self {
        Self {
            rows,
            position: 0,
            forward_only,
            fetch_size: 0,
            direction: FetchDirection::Forward,
            listener: ListenerSlot::default(),
            closed: false,
        }
    }

    /// Read all rows of the statement's cursor, honouring `max_rows`
    ///
    /// The remote cursor is closed once all rows are read.
    pub async fn load<S: Session>(
        session: &SharedSession<S>,
        stmt: StatementHandle,
        config: FetchConfig,
        forward_only: bool,
    ) -> Result<Self> {
        let mut s = session.lock().await;
        let fetch_size = config.actual_fetch_size();
        let max_rows = config.max_rows as usize;
        let mut rows = Vec::new();

        loop {
            let request = if max_rows == 0 {
                fetch_size
            } else {
                let remaining = max_rows.saturating_sub(rows.len());
                if remaining == 0 {
                    break;
                }
                fetch_size.min(remaining as u32)
            };
            let batch = s.fetch_rows(stmt, request).await?;
            let exhausted = batch.after_last || batch.is_empty();
            rows.extend(batch.rows);
            if exhausted {
                break;
            }
        }
        if max_rows != 0 {
            rows.truncate(max_rows);
        }
        s.close_cursor(stmt, false).await?;
        tracing::debug!(stmt = stmt.0, rows = rows.len(), "Materialized cursor rows");

        let mut fetcher = Self::from_rows(rows, forward_only);
        fetcher.fetch_size = config.fetch_size;
        fetcher.direction = config.direction;
        Ok(fetcher)
    }

    fn len(&self) -> i64 {
        self.rows.len() as i64
    }

    fn check_scrollable(&self) -> Result<()> {
        self.check_open()?;
        if self.forward_only {
            Err(Error::ForwardOnly)
        } else {
            Ok(())
        }
    }

    fn on_row(&self) -> bool {
        self.position >= 1 && self.position <= self.len()
    }

    fn notify_row_change(&mut self, position: i64) -> bool {
        self.position = position.clamp(0, self.len() + 1);
        let row = if self.on_row() {
            self.rows.get((self.position - 1) as usize)
        } else {
            None
        };
        self.listener.row_changed(row);
        row.is_some()
    }
}

#[async_trait::async_trait]
impl Fetcher for CachedFetcher {
    async fn first(&mut self) -> Result<bool> {
        self.check_scrollable()?;
        Ok(self.notify_row_change(1))
    }

    async fn last(&mut self) -> Result<bool> {
        self.check_scrollable()?;
        let last = self.len().max(1);
        Ok(self.notify_row_change(last))
    }

    async fn next(&mut self) -> Result<bool> {
        self.check_open()?;
        let position = self.position + 1;
        Ok(self.notify_row_change(position))
    }

    async fn previous(&mut self) -> Result<bool> {
        self.check_scrollable()?;
        let position = self.position.min(self.len() + 1) - 1;
        Ok(self.notify_row_change(position))
    }

    async fn absolute(&mut self, row: i64) -> Result<bool> {
        self.check_scrollable()?;
        let position = if row >= 0 {
            row
        } else {
            (self.len() + 1 + row).max(0)
        };
        Ok(self.notify_row_change(position))
    }

    async fn relative(&mut self, rows: i64) -> Result<bool> {
        self.check_scrollable()?;
        let position = self.position.saturating_add(rows);
        Ok(self.notify_row_change(position))
    }

    async fn before_first(&mut self) -> Result<()> {
        self.check_open()?;
        if self.forward_only && self.position != 0 {
            return Err(Error::ForwardOnly);
        }
        self.notify_row_change(0);
        Ok(())
    }

    async fn after_last(&mut self) -> Result<()> {
        self.check_open()?;
        let position = self.len() + 1;
        self.notify_row_change(position);
        Ok(())
    }

    async fn close(&mut self, _reason: CompletionReason) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.rows.clear();
        self.listener.fetcher_closed();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn current_position(&self) -> i64 {
        self.position
    }

    async fn size(&mut self) -> Result<i64> {
        self.check_open()?;
        Ok(self.len())
    }

    fn is_forward_only(&self) -> bool {
        self.forward_only
    }

    fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    fn set_fetch_size(&mut self, fetch_size: u32) {
        self.fetch_size = fetch_size;
    }

    fn fetch_direction(&self) -> FetchDirection {
        self.direction
    }

    fn set_fetch_direction(&mut self, direction: FetchDirection) {
        self.direction = direction;
    }

    fn set_listener(&mut self, listener: Box<dyn FetcherListener>) {
        self.listener.set(listener);
    }

    async fn insert_row(&mut self, row: RowValue) -> Result<()> {
        self.check_open()?;
        self.rows.push(row);
        let position = self.position;
        self.notify_row_change(position);
        Ok(())
    }

    async fn update_row(&mut self, row: RowValue) -> Result<()> {
        self.check_open()?;
        if !self.on_row() {
            return Err(Error::NotOnRow);
        }
        self.rows[(self.position - 1) as usize] = row;
        let position = self.position;
        self.notify_row_change(position);
        Ok(())
    }

    async fn delete_row(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.on_row() {
            return Err(Error::NotOnRow);
        }
        self.rows.remove((self.position - 1) as usize);
        let position = self.position;
        self.notify_row_change(position);
        Ok(())
    }
}
