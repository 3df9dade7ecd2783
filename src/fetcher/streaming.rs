//! Forward-only batch fetcher
//!
//! Reads the cursor in batches of the fetch size and hands out rows in
//! order. Only `next()` moves; nothing is kept once a row has been passed.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::FetchConfig;
use crate::constants::{FetchDirection, DEFAULT_FETCH_ROWS};
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, FetcherListener, ListenerSlot};
use crate::row::RowValue;
use crate::session::{CompletionReason, Session, SharedSession, StatementHandle};

/// Forward-only fetcher over the statement's cursor
#[derive(Debug)]
pub struct StreamingFetcher<S> {
    session: SharedSession<S>,
    stmt: StatementHandle,
    max_rows: u32,
    fetch_size: u32,
    direction: FetchDirection,
    listener: ListenerSlot,
    closed: bool,
    buffer: VecDeque<RowValue>,
    /// Rows received from the server so far
    fetched: i64,
    all_fetched: bool,
    after_last: bool,
    position: i64,
}

impl<S: Session + 'static> StreamingFetcher<S> {
    /// Create a fetcher for an executed statement
    pub fn new(session: SharedSession<S>, stmt: StatementHandle, config: FetchConfig) -> Self {
        Self {
            session,
            stmt,
            max_rows: config.max_rows,
            fetch_size: config.fetch_size,
            direction: config.direction,
            listener: ListenerSlot::default(),
            closed: false,
            buffer: VecDeque::new(),
            fetched: 0,
            all_fetched: false,
            after_last: false,
            position: 0,
        }
    }

    async fn fill_buffer(&mut self, s: &mut S) -> Result<()> {
        if !self.buffer.is_empty() || self.all_fetched {
            return Ok(());
        }
        let mut fetch_size = if self.fetch_size > 0 {
            self.fetch_size
        } else {
            DEFAULT_FETCH_ROWS
        };
        if self.max_rows != 0 {
            let remaining = (self.max_rows as i64 - self.fetched).max(0);
            if remaining == 0 {
                self.all_fetched = true;
                return Ok(());
            }
            fetch_size = fetch_size.min(remaining as u32);
        }

        let batch = s.fetch_rows(self.stmt, fetch_size).await?;
        tracing::debug!(
            stmt = self.stmt.0,
            fetch_size,
            rows = batch.len(),
            after_last = batch.after_last,
            "Fetched batch"
        );
        self.fetched += batch.len() as i64;
        if batch.after_last || batch.is_empty() {
            self.all_fetched = true;
        }
        self.buffer.extend(batch.rows);
        Ok(())
    }

    fn forward_only<T>(&self) -> Result<T> {
        self.check_open()?;
        Err(Error::ForwardOnly)
    }
}

#[async_trait::async_trait]
impl<S: Session + 'static> Fetcher for StreamingFetcher<S> {
    async fn first(&mut self) -> Result<bool> {
        self.forward_only()
    }

    async fn last(&mut self) -> Result<bool> {
        self.forward_only()
    }

    async fn next(&mut self) -> Result<bool> {
        self.check_open()?;
        if self.after_last {
            self.listener.row_changed(None);
            return Ok(false);
        }
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.fill_buffer(&mut s).await?;

        self.position += 1;
        match self.buffer.pop_front() {
            Some(row) => {
                self.listener.row_changed(Some(&row));
                Ok(true)
            }
            None => {
                self.after_last = true;
                self.listener.row_changed(None);
                Ok(false)
            }
        }
    }

    async fn previous(&mut self) -> Result<bool> {
        self.forward_only()
    }

    async fn absolute(&mut self, _row: i64) -> Result<bool> {
        self.forward_only()
    }

    async fn relative(&mut self, _rows: i64) -> Result<bool> {
        self.forward_only()
    }

    async fn before_first(&mut self) -> Result<()> {
        self.check_open()?;
        if self.position != 0 {
            return Err(Error::ForwardOnly);
        }
        self.listener.row_changed(None);
        Ok(())
    }

    async fn after_last(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.after_last {
            return Err(Error::ForwardOnly);
        }
        self.listener.row_changed(None);
        Ok(())
    }

    async fn close(&mut self, reason: CompletionReason) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffer.clear();
        let session = Arc::clone(&self.session);
        let result = {
            let mut s = session.lock().await;
            s.close_cursor(self.stmt, reason.releases_cursor()).await
        };
        self.listener.fetcher_closed();
        result
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn current_position(&self) -> i64 {
        self.position
    }

    async fn size(&mut self) -> Result<i64> {
        self.check_open()?;
        if self.after_last {
            return Ok(self.position - 1);
        }
        Err(Error::FeatureNotSupported(
            "size of a forward-only cursor before reading all rows".to_string(),
        ))
    }

    async fn row_num(&mut self) -> Result<i64> {
        self.check_open()?;
        Ok(if self.after_last { 0 } else { self.position })
    }

    async fn is_empty(&mut self) -> Result<bool> {
        self.check_open()?;
        if self.position > 0 {
            return Ok(self.position == 1 && self.after_last);
        }
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.fill_buffer(&mut s).await?;
        Ok(self.buffer.is_empty())
    }

    async fn is_before_first(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(self.position == 0)
    }

    async fn is_first(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(self.position == 1 && !self.after_last)
    }

    async fn is_last(&mut self) -> Result<bool> {
        self.check_open()?;
        if self.position == 0 || self.after_last {
            return Ok(false);
        }
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.fill_buffer(&mut s).await?;
        Ok(self.buffer.is_empty())
    }

    async fn is_after_last(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(self.after_last)
    }

    fn is_forward_only(&self) -> bool {
        true
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

    async fn insert_row(&mut self, _row: RowValue) -> Result<()> {
        Err(Error::FeatureNotSupported(
            "forward-only read-only cursor".to_string(),
        ))
    }

    async fn update_row(&mut self, _row: RowValue) -> Result<()> {
        Err(Error::FeatureNotSupported(
            "forward-only read-only cursor".to_string(),
        ))
    }

    async fn delete_row(&mut self) -> Result<()> {
        Err(Error::FeatureNotSupported(
            "forward-only read-only cursor".to_string(),
        ))
    }
}
