//! Positioned row fetchers
//!
//! A [`Fetcher`] moves a logical position over the rows of a query and
//! notifies a [`FetcherListener`] with the row at the resolved position.
//! Positions are 1-based; 0 is before the first row and `size() + 1` is
//! after the last row.
//!
//! The fetcher variants form a closed set, [`StatementFetcher`]:
//!
//! - [`CachedFetcher`]: all rows materialized locally
//! - [`ServerWindowFetcher`]: a window over a server-side scrollable cursor
//! - [`StreamingFetcher`]: forward-only batches from the server
//!
//! [`UpdatableFetcher`] decorates any fetcher with locally recorded row
//! modifications.

pub mod cached;
pub mod server_scroll;
pub mod streaming;
pub mod updatable;

pub use cached::CachedFetcher;
pub use server_scroll::ServerWindowFetcher;
pub use streaming::StreamingFetcher;
pub use updatable::{RowModification, UpdatableFetcher};

use std::fmt;

use crate::config::{FetchConfig, ResultSetType};
use crate::constants::FetchDirection;
use crate::error::Result;
use crate::row::RowValue;
use crate::session::{CompletionReason, Session, SharedSession, StatementHandle};

/// Receives row and lifecycle notifications from a fetcher
pub trait FetcherListener: Send {
    /// The current row changed; `None` when not positioned on a row
    fn row_changed(&mut self, row: Option<&RowValue>);

    /// The fetcher was closed
    fn fetcher_closed(&mut self) {}
}

/// Holder for the optional registered listener
#[derive(Default)]
pub(crate) struct ListenerSlot {
    listener: Option<Box<dyn FetcherListener>>,
}

impl ListenerSlot {
    pub(crate) fn set(&mut self, listener: Box<dyn FetcherListener>) {
        self.listener = Some(listener);
    }

    pub(crate) fn row_changed(&mut self, row: Option<&RowValue>) {
        if let Some(listener) = self.listener.as_mut() {
            listener.row_changed(row);
        }
    }

    pub(crate) fn fetcher_closed(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener.fetcher_closed();
        }
    }
}

impl fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSlot")
            .field("registered", &self.listener.is_some())
            .finish()
    }
}

/// Uniform positioned iteration over query rows.
///
/// Every navigation method notifies the listener exactly once, with the row
/// at the new position or `None`, and returns whether the new position is
/// on a row. After [`close`](Fetcher::close) navigation fails with
/// [`Error::FetcherClosed`](crate::Error::FetcherClosed).
#[async_trait::async_trait]
pub trait Fetcher: Send {
    /// Move to the first row
    async fn first(&mut self) -> Result<bool>;

    /// Move to the last row
    async fn last(&mut self) -> Result<bool>;

    /// Move to the next row
    async fn next(&mut self) -> Result<bool>;

    /// Move to the previous row
    async fn previous(&mut self) -> Result<bool>;

    /// Move to an absolute position; negative values count from the end
    async fn absolute(&mut self, row: i64) -> Result<bool>;

    /// Move relative to the current position
    async fn relative(&mut self, rows: i64) -> Result<bool>;

    /// Move before the first row
    async fn before_first(&mut self) -> Result<()>;

    /// Move after the last row
    async fn after_last(&mut self) -> Result<()>;

    /// Close the fetcher and release its buffers; closing twice is a no-op
    async fn close(&mut self, reason: CompletionReason) -> Result<()>;

    /// Check if the fetcher has been closed
    fn is_closed(&self) -> bool;

    /// The last resolved position (0 = before first)
    fn current_position(&self) -> i64;

    /// Number of rows, capped by the maximum row count
    async fn size(&mut self) -> Result<i64>;

    /// The current row number, 0 when not on a row
    async fn row_num(&mut self) -> Result<i64> {
        if self.is_after_last().await? {
            Ok(0)
        } else {
            Ok(self.current_position())
        }
    }

    /// Check if there are no rows
    async fn is_empty(&mut self) -> Result<bool> {
        Ok(self.size().await? == 0)
    }

    /// Check if positioned before the first row
    async fn is_before_first(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(self.current_position() == 0)
    }

    /// Check if positioned on the first row
    async fn is_first(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(self.current_position() == 1 && self.size().await? > 0)
    }

    /// Check if positioned on the last row
    async fn is_last(&mut self) -> Result<bool> {
        let size = self.size().await?;
        Ok(size > 0 && self.current_position() == size)
    }

    /// Check if positioned after the last row
    async fn is_after_last(&mut self) -> Result<bool> {
        self.check_open()?;
        let position = self.current_position();
        if position == 0 {
            return Ok(false);
        }
        Ok(position > self.size().await?)
    }

    /// Fail with `FetcherClosed` if closed
    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(crate::error::Error::FetcherClosed)
        } else {
            Ok(())
        }
    }

    /// Check if only forward movement is allowed
    fn is_forward_only(&self) -> bool {
        false
    }

    /// Configured fetch size (0 = default)
    fn fetch_size(&self) -> u32;

    /// Change the fetch size hint; an already buffered window is kept
    fn set_fetch_size(&mut self, fetch_size: u32);

    /// Configured fetch direction hint
    fn fetch_direction(&self) -> FetchDirection;

    /// Change the fetch direction hint
    fn set_fetch_direction(&mut self, direction: FetchDirection);

    /// Register the listener, replacing any previous one
    fn set_listener(&mut self, listener: Box<dyn FetcherListener>);

    /// Append an inserted row
    async fn insert_row(&mut self, row: RowValue) -> Result<()>;

    /// Replace the current row
    async fn update_row(&mut self, row: RowValue) -> Result<()>;

    /// Delete the current row
    async fn delete_row(&mut self) -> Result<()>;
}

/// The closed set of statement fetchers
#[derive(Debug)]
pub enum StatementFetcher<S> {
    /// All rows held locally
    Cached(CachedFetcher),
    /// Window over a server-side scrollable cursor
    ServerScroll(ServerWindowFetcher<S>),
    /// Forward-only batches
    Streaming(StreamingFetcher<S>),
}

impl<S: Session + 'static> StatementFetcher<S> {
    /// Open the fetcher fitting the configuration for an executed statement
    ///
    /// - forward-only read-only cursors stream
    /// - forward-only cursors that are updatable or holdable are materialized
    /// - holdable scrollable cursors are materialized
    /// - scrollable cursors use the server cursor when supported and allowed
    ///
    /// A scroll-sensitive request is served as scroll-insensitive.
    pub async fn open(
        session: SharedSession<S>,
        stmt: StatementHandle,
        config: FetchConfig,
    ) -> Result<Self> {
        let mut config = config;
        if config.result_set_type == ResultSetType::ScrollSensitive {
            tracing::warn!("Scroll sensitive cursors are not supported, using scroll insensitive");
            config = config.with_result_set_type(ResultSetType::ScrollInsensitive);
        }

        if config.result_set_type == ResultSetType::ForwardOnly {
            if !config.is_updatable() && !config.holdable {
                tracing::debug!(stmt = stmt.0, "Opening streaming fetcher");
                return Ok(StatementFetcher::Streaming(StreamingFetcher::new(
                    session, stmt, config,
                )));
            }
            tracing::debug!(stmt = stmt.0, "Opening forward-only cached fetcher");
            let fetcher = CachedFetcher::load(&session, stmt, config, true).await?;
            return Ok(StatementFetcher::Cached(fetcher));
        }

        let supports_scroll = session.lock().await.supports_fetch_scroll();
        if !config.holdable && config.use_server_cursor && supports_scroll {
            tracing::debug!(stmt = stmt.0, "Opening server scroll fetcher");
            return Ok(StatementFetcher::ServerScroll(ServerWindowFetcher::new(
                session, stmt, config,
            )));
        }

        tracing::debug!(stmt = stmt.0, "Opening cached fetcher");
        let fetcher = CachedFetcher::load(&session, stmt, config, false).await?;
        Ok(StatementFetcher::Cached(fetcher))
    }

    /// Name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            StatementFetcher::Cached(_) => "cached",
            StatementFetcher::ServerScroll(_) => "server_scroll",
            StatementFetcher::Streaming(_) => "streaming",
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $fetcher:ident => $call:expr) => {
        match $self {
            StatementFetcher::Cached($fetcher) => $call,
            StatementFetcher::ServerScroll($fetcher) => $call,
            StatementFetcher::Streaming($fetcher) => $call,
        }
    };
}

#[async_trait::async_trait]
impl<S: Session + 'static> Fetcher for StatementFetcher<S> {
    async fn first(&mut self) -> Result<bool> {
        dispatch!(self, f => f.first().await)
    }

    async fn last(&mut self) -> Result<bool> {
        dispatch!(self, f => f.last().await)
    }

    async fn next(&mut self) -> Result<bool> {
        dispatch!(self, f => f.next().await)
    }

    async fn previous(&mut self) -> Result<bool> {
        dispatch!(self, f => f.previous().await)
    }

    async fn absolute(&mut self, row: i64) -> Result<bool> {
        dispatch!(self, f => f.absolute(row).await)
    }

    async fn relative(&mut self, rows: i64) -> Result<bool> {
        dispatch!(self, f => f.relative(rows).await)
    }

    async fn before_first(&mut self) -> Result<()> {
        dispatch!(self, f => f.before_first().await)
    }

    async fn after_last(&mut self) -> Result<()> {
        dispatch!(self, f => f.after_last().await)
    }

    async fn close(&mut self, reason: CompletionReason) -> Result<()> {
        dispatch!(self, f => f.close(reason).await)
    }

    fn is_closed(&self) -> bool {
        dispatch!(self, f => f.is_closed())
    }

    fn current_position(&self) -> i64 {
        dispatch!(self, f => f.current_position())
    }

    async fn size(&mut self) -> Result<i64> {
        dispatch!(self, f => f.size().await)
    }

    async fn row_num(&mut self) -> Result<i64> {
        dispatch!(self, f => f.row_num().await)
    }

    async fn is_empty(&mut self) -> Result<bool> {
        dispatch!(self, f => f.is_empty().await)
    }

    async fn is_before_first(&mut self) -> Result<bool> {
        dispatch!(self, f => f.is_before_first().await)
    }

    async fn is_first(&mut self) -> Result<bool> {
        dispatch!(self, f => f.is_first().await)
    }

    async fn is_last(&mut self) -> Result<bool> {
        dispatch!(self, f => f.is_last().await)
    }

    async fn is_after_last(&mut self) -> Result<bool> {
        dispatch!(self, f => f.is_after_last().await)
    }

    fn is_forward_only(&self) -> bool {
        dispatch!(self, f => f.is_forward_only())
    }

    fn fetch_size(&self) -> u32 {
        dispatch!(self, f => f.fetch_size())
    }

    fn set_fetch_size(&mut self, fetch_size: u32) {
        dispatch!(self, f => f.set_fetch_size(fetch_size))
    }

    fn fetch_direction(&self) -> FetchDirection {
        dispatch!(self, f => f.fetch_direction())
    }

    fn set_fetch_direction(&mut self, direction: FetchDirection) {
        dispatch!(self, f => f.set_fetch_direction(direction))
    }

    fn set_listener(&mut self, listener: Box<dyn FetcherListener>) {
        dispatch!(self, f => f.set_listener(listener))
    }

    async fn insert_row(&mut self, row: RowValue) -> Result<()> {
        dispatch!(self, f => f.insert_row(row).await)
    }

    async fn update_row(&mut self, row: RowValue) -> Result<()> {
        dispatch!(self, f => f.update_row(row).await)
    }

    async fn delete_row(&mut self) -> Result<()> {
        dispatch!(self, f => f.delete_row().await)
    }
}
