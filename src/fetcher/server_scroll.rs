//! Window fetcher over a server-side scrollable cursor
//!
//! The protocol offers only directional scroll fetches (`FIRST`, `LAST`,
//! `NEXT`, `PRIOR`, `ABSOLUTE`, `RELATIVE`) that return a batch of rows and
//! two boundary flags. This fetcher keeps the last received batch as a
//! window of consecutive rows and serves navigation from it when it can.
//!
//! Two positions are tracked. The local position is what the caller last
//! navigated to; the server position is where the remote cursor actually
//! is. Serving from the window moves only the local position, so before any
//! fetch relative to the remote cursor the server is repositioned with an
//! `ABSOLUTE` fetch when the two have drifted apart.
//!
//! The cursor size is resolved lazily. Asking the server for it forces the
//! server to materialize the whole cursor, so it is only requested when an
//! operation cannot do without it, and boundary flags are used to learn it
//! for free where possible.

use std::sync::Arc;

use crate::buffer::parse_record_count;
use crate::config::FetchConfig;
use crate::constants::{info, FetchDirection, FetchType};
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, FetcherListener, ListenerSlot};
use crate::row::RowValue;
use crate::session::{CompletionReason, FetchBatch, Session, SharedSession, StatementHandle};

/// Consecutive rows received by the last remote fetch
#[derive(Debug, Default)]
struct Window {
    /// Rows in ascending position order
    rows: Vec<RowValue>,
    /// Position of `rows[0]`, 0 iff empty
    offset: i64,
}

impl Window {
    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn contains(&self, position: i64) -> bool {
        self.offset != 0
            && position >= self.offset
            && position < self.offset + self.rows.len() as i64
    }

    fn row(&self, position: i64) -> Option<&RowValue> {
        if self.contains(position) {
            self.rows.get((position - self.offset) as usize)
        } else {
            None
        }
    }

    fn replace(&mut self, rows: Vec<RowValue>, offset: i64) {
        if rows.is_empty() {
            self.clear();
        } else {
            self.rows = rows;
            self.offset = offset;
        }
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.offset = 0;
    }
}

/// Fetcher over a server-side scrollable cursor.
///
/// Row positions are 1-based. Position 0 is before the first row and
/// `size + 1` is after the last row, where `size` is capped by the
/// configured maximum row count.
#[derive(Debug)]
pub struct ServerWindowFetcher<S> {
    session: SharedSession<S>,
    stmt: StatementHandle,
    max_rows: u32,
    fetch_size: u32,
    direction: FetchDirection,
    listener: ListenerSlot,
    closed: bool,
    /// Size capped by `max_rows`
    cursor_size: Option<i64>,
    /// Size of the cursor on the server
    server_cursor_size: Option<i64>,
    server_position: i64,
    local_position: i64,
    window: Window,
}

impl<S: Session + 'static> ServerWindowFetcher<S> {
    /// Create a fetcher for an executed statement with a scrollable cursor
    pub fn new(session: SharedSession<S>, stmt: StatementHandle, config: FetchConfig) -> Self {
        Self {
            session,
            stmt,
            max_rows: config.max_rows,
            fetch_size: config.fetch_size,
            direction: config.direction,
            listener: ListenerSlot::default(),
            closed: false,
            cursor_size: None,
            server_cursor_size: None,
            server_position: 0,
            local_position: 0,
            window: Window::default(),
        }
    }

    /// Position of the remote cursor as last known
    pub fn server_position(&self) -> i64 {
        self.server_position
    }

    fn actual_fetch_size(&self) -> u32 {
        if self.fetch_size > 0 {
            self.fetch_size
        } else {
            crate::constants::DEFAULT_FETCH_ROWS
        }
    }

    fn in_window(&self, position: i64) -> bool {
        if self.window.is_empty() {
            return false;
        }
        // every windowed row exists, so only the max_rows cap can exclude it
        if self.max_rows != 0 && position > self.max_rows as i64 {
            return false;
        }
        self.window.contains(position)
    }

    fn notify_row_change(&mut self, position: i64) -> bool {
        self.local_position = position;
        let row = if self.in_window(position) {
            self.window.row(position)
        } else {
            None
        };
        self.listener.row_changed(row);
        row.is_some()
    }

    fn cap(&self, server_cursor_size: i64) -> i64 {
        if self.max_rows == 0 {
            server_cursor_size
        } else {
            server_cursor_size.min(self.max_rows as i64)
        }
    }

    fn set_server_cursor_size(&mut self, server_cursor_size: i64) {
        self.server_cursor_size = Some(server_cursor_size);
        self.cursor_size = Some(self.cap(server_cursor_size));
        tracing::debug!(
            stmt = self.stmt.0,
            server_cursor_size,
            "Cursor size resolved from boundary"
        );
    }

    async fn fetch(
        &mut self,
        s: &mut S,
        fetch_type: FetchType,
        fetch_size: u32,
        position: i64,
    ) -> Result<FetchBatch> {
        // positioned fetches return a single row
        let fetch_size = if fetch_type.supports_batch() {
            fetch_size
        } else {
            1
        };
        tracing::debug!(
            stmt = self.stmt.0,
            fetch_type = ?fetch_type,
            fetch_size,
            position,
            "Scroll fetch"
        );
        s.fetch_scroll(self.stmt, fetch_type, fetch_size, position).await
    }

    /// Rebuild the window from a batch; `server_position` must already be
    /// updated for the fetch.
    fn update_window(&mut self, batch: FetchBatch, direction: FetchDirection) {
        let count = batch.rows.len() as i64;
        let mut rows = batch.rows;
        let offset = match direction {
            FetchDirection::Reverse => {
                // delivered high to low
                rows.reverse();
                if batch.before_first {
                    1
                } else {
                    self.server_position
                }
            }
            _ => self.server_position - count + if batch.after_last { 0 } else { 1 },
        };
        self.window.replace(rows, offset);
        tracing::trace!(
            stmt = self.stmt.0,
            offset = self.window.offset,
            rows = self.window.rows.len(),
            "Window rebuilt"
        );
    }

    async fn synchronize_server_position(&mut self, s: &mut S, expected: i64) -> Result<()> {
        if self.server_position != expected {
            tracing::trace!(
                stmt = self.stmt.0,
                server_position = self.server_position,
                expected,
                "Repositioning server cursor"
            );
            self.fetch(s, FetchType::Absolute, 1, expected).await?;
            self.server_position = expected;
        }
        Ok(())
    }

    async fn require_server_cursor_size(&mut self, s: &mut S) -> Result<i64> {
        if let Some(size) = self.server_cursor_size {
            return Ok(size);
        }
        if !s.has_fetched(self.stmt) {
            // cursor info is only available after a fetch; this one does not move
            self.fetch(s, FetchType::Relative, 1, 0).await?;
        }
        let response = s
            .cursor_info(
                self.stmt,
                &[info::INF_RECORD_COUNT, info::ISC_INFO_END],
                info::RECORD_COUNT_BUFFER_LENGTH,
            )
            .await?;
        let size = parse_record_count(response)?;
        tracing::debug!(stmt = self.stmt.0, server_cursor_size = size, "Cursor size retrieved");
        self.server_cursor_size = Some(size);
        Ok(size)
    }

    async fn require_cursor_size(&mut self, s: &mut S) -> Result<i64> {
        self.check_open()?;
        if let Some(size) = self.cursor_size {
            return Ok(size);
        }
        let server_cursor_size = self.require_server_cursor_size(s).await?;
        let size = self.cap(server_cursor_size);
        self.cursor_size = Some(size);
        Ok(size)
    }

    /// Known upper bound of positions, resolving it when `max_rows` applies
    async fn size_bound(&mut self, s: &mut S) -> Result<Option<i64>> {
        if self.max_rows != 0 {
            Ok(Some(self.require_cursor_size(s).await?))
        } else {
            Ok(self.cursor_size)
        }
    }

    async fn before_first_locked(&mut self, s: &mut S) -> Result<()> {
        if self.server_position != 0 {
            self.fetch(s, FetchType::Absolute, 1, 0).await?;
            self.server_position = 0;
        }
        self.notify_row_change(0);
        Ok(())
    }

    async fn after_last_locked(&mut self, s: &mut S) -> Result<()> {
        let after_last = self.require_cursor_size(s).await? + 1;
        if self.server_position != after_last {
            self.fetch(s, FetchType::Absolute, 1, after_last).await?;
            self.server_position = after_last;
        }
        self.notify_row_change(after_last);
        Ok(())
    }

    /// Server and local position after a single-row fetch that hit a boundary
    async fn boundary_position(
        &mut self,
        s: &mut S,
        batch: &FetchBatch,
    ) -> Result<Option<(i64, i64)>> {
        if batch.before_first {
            Ok(Some((0, 0)))
        } else if batch.after_last {
            let server = self.require_server_cursor_size(s).await? + 1;
            let local = self.require_cursor_size(s).await? + 1;
            Ok(Some((server, local)))
        } else {
            Ok(None)
        }
    }

    async fn first_locked(&mut self, s: &mut S) -> Result<bool> {
        if !self.in_window(1) && self.cursor_size != Some(0) {
            let batch = self.fetch(s, FetchType::First, 1, 0).await?;
            let empty = batch.after_last;
            self.server_position = 1;
            self.update_window(batch, FetchDirection::Unknown);
            if empty {
                self.set_server_cursor_size(0);
            }
        }
        Ok(self.notify_row_change(1))
    }

    async fn last_locked(&mut self, s: &mut S) -> Result<bool> {
        let cursor_size = self.cursor_size;
        let position = match cursor_size {
            Some(0) => 1,
            Some(size) if self.in_window(size) => size,
            _ => {
                let batch = if self.max_rows != 0
                    && self.require_cursor_size(s).await? < self.require_server_cursor_size(s).await?
                {
                    let size = self.require_cursor_size(s).await?;
                    self.fetch(s, FetchType::Absolute, 1, size).await?
                } else {
                    self.fetch(s, FetchType::Last, 1, 0).await?
                };
                if batch.is_empty() {
                    self.set_server_cursor_size(0);
                    self.server_position = 1;
                } else {
                    self.server_position = self.require_cursor_size(s).await?;
                }
                self.update_window(batch, FetchDirection::Unknown);
                self.server_position
            }
        };
        Ok(self.notify_row_change(position))
    }

    async fn next_locked(&mut self, s: &mut S) -> Result<bool> {
        let old = self.local_position;
        let bound = if self.max_rows != 0 && old != 0 {
            Some(self.require_cursor_size(s).await?)
        } else {
            self.cursor_size
        };
        let position = match bound {
            Some(size) => old.min(size) + 1,
            None => old + 1,
        };
        if let Some(size) = bound {
            if position > size {
                self.after_last_locked(s).await?;
                return Ok(false);
            }
        }

        if !self.in_window(position) {
            let mut fetch_size = self.actual_fetch_size() as i64;
            if self.max_rows != 0 {
                fetch_size = match bound {
                    None => fetch_size.min(self.max_rows as i64),
                    Some(size) => fetch_size.min(size - old),
                };
            }
            self.synchronize_server_position(s, old).await?;
            let batch = self.fetch(s, FetchType::Next, fetch_size as u32, 0).await?;
            let count = batch.len() as i64;
            if batch.after_last {
                self.set_server_cursor_size(old + count);
                self.server_position = old + count + 1;
            } else {
                self.server_position = old + count;
            }
            self.update_window(batch, FetchType::Next.direction());
        }
        Ok(self.notify_row_change(position))
    }

    async fn previous_locked(&mut self, s: &mut S) -> Result<bool> {
        let old = self.local_position;
        let position = old.max(1) - 1;
        if position == 0 {
            self.before_first_locked(s).await?;
            return Ok(false);
        }
        if !self.in_window(position) {
            self.synchronize_server_position(s, old).await?;
            let fetch_size = self.actual_fetch_size();
            let batch = self.fetch(s, FetchType::Prior, fetch_size, 0).await?;
            self.server_position = if batch.before_first {
                0
            } else {
                old - batch.len() as i64
            };
            self.update_window(batch, FetchType::Prior.direction());
        }
        Ok(self.notify_row_change(position))
    }

    async fn absolute_locked(&mut self, s: &mut S, row: i64) -> Result<bool> {
        let position = if row >= 0 {
            row
        } else {
            (self.require_cursor_size(s).await? + 1 + row).max(0)
        };
        if position == 0 {
            self.before_first_locked(s).await?;
            return Ok(false);
        }
        if self.in_window(position) {
            return Ok(self.notify_row_change(position));
        }
        if let Some(size) = self.size_bound(s).await? {
            if position > size {
                self.after_last_locked(s).await?;
                return Ok(false);
            }
        }

        let batch = self.fetch(s, FetchType::Absolute, 1, position).await?;
        let local = match self.boundary_position(s, &batch).await? {
            Some((server, local)) => {
                self.server_position = server;
                local
            }
            None => {
                self.server_position = position;
                position
            }
        };
        let direction = if row < 0 {
            FetchDirection::Reverse
        } else {
            FetchDirection::Forward
        };
        self.update_single(batch, direction);
        Ok(self.notify_row_change(local))
    }

    async fn relative_locked(&mut self, s: &mut S, rows: i64) -> Result<bool> {
        let old = self.local_position;
        if rows == 0 {
            return Ok(self.notify_row_change(old));
        }
        let position = old.saturating_add(rows).max(0);
        if position == 0 {
            self.before_first_locked(s).await?;
            return Ok(false);
        }
        if self.in_window(position) {
            return Ok(self.notify_row_change(position));
        }
        if let Some(size) = self.size_bound(s).await? {
            if position > size {
                self.after_last_locked(s).await?;
                return Ok(false);
            }
        }

        self.synchronize_server_position(s, old).await?;
        let batch = self.fetch(s, FetchType::Relative, 1, rows).await?;
        let local = match self.boundary_position(s, &batch).await? {
            Some((server, local)) => {
                self.server_position = server;
                local
            }
            None => {
                self.server_position = old + rows;
                position
            }
        };
        let direction = if rows < 0 {
            FetchDirection::Reverse
        } else {
            FetchDirection::Forward
        };
        self.update_single(batch, direction);
        Ok(self.notify_row_change(local))
    }

    /// Window update for a single-row positioned fetch
    fn update_single(&mut self, batch: FetchBatch, direction: FetchDirection) {
        if batch.before_first || batch.after_last {
            self.window.clear();
        } else {
            self.update_window(batch, direction);
        }
    }
}

#[async_trait::async_trait]
impl<S: Session + 'static> Fetcher for ServerWindowFetcher<S> {
    async fn first(&mut self) -> Result<bool> {
        self.check_open()?;
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.first_locked(&mut s).await
    }

    async fn last(&mut self) -> Result<bool> {
        self.check_open()?;
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.last_locked(&mut s).await
    }

    async fn next(&mut self) -> Result<bool> {
        self.check_open()?;
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.next_locked(&mut s).await
    }

    async fn previous(&mut self) -> Result<bool> {
        self.check_open()?;
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.previous_locked(&mut s).await
    }

    async fn absolute(&mut self, row: i64) -> Result<bool> {
        self.check_open()?;
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.absolute_locked(&mut s, row).await
    }

    async fn relative(&mut self, rows: i64) -> Result<bool> {
        self.check_open()?;
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.relative_locked(&mut s, rows).await
    }

    async fn before_first(&mut self) -> Result<()> {
        self.check_open()?;
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.before_first_locked(&mut s).await
    }

    async fn after_last(&mut self) -> Result<()> {
        self.check_open()?;
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.after_last_locked(&mut s).await
    }

    async fn close(&mut self, reason: CompletionReason) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let session = Arc::clone(&self.session);
        let result = {
            let mut s = session.lock().await;
            s.close_cursor(self.stmt, reason.releases_cursor()).await
        };
        self.window = Window::default();
        self.listener.fetcher_closed();
        tracing::debug!(stmt = self.stmt.0, reason = ?reason, "Server scroll fetcher closed");
        result
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn current_position(&self) -> i64 {
        self.local_position
    }

    async fn size(&mut self) -> Result<i64> {
        let session = Arc::clone(&self.session);
        let mut s = session.lock().await;
        self.require_cursor_size(&mut s).await
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
            "server scroll fetcher must be decorated to insert rows".to_string(),
        ))
    }

    async fn update_row(&mut self, _row: RowValue) -> Result<()> {
        Err(Error::FeatureNotSupported(
            "server scroll fetcher must be decorated to update rows".to_string(),
        ))
    }

    async fn delete_row(&mut self) -> Result<()> {
        Err(Error::FeatureNotSupported(
            "server scroll fetcher must be decorated to delete rows".to_string(),
        ))
    }
}
