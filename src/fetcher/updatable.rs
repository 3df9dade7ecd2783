//! Update-tracking fetcher decorator
//!
//! [`UpdatableFetcher`] wraps another fetcher and overlays rows that were
//! modified through the cursor: updated values and deletion markers keyed by
//! position, and inserted rows appended after the last row of the wrapped
//! fetcher. The wrapped fetcher itself is never modified.
//!
//! While no rows are inserted, every navigation is delegated as-is. Once
//! rows are inserted, positions `1..=inner_size` belong to the wrapped
//! fetcher and `inner_size + 1..=inner_size + inserted` to the inserted rows.
//! While the decorator is positioned on an inserted row the wrapped fetcher
//! is parked after its last row.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::constants::FetchDirection;
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, FetcherListener, ListenerSlot};
use crate::row::RowValue;
use crate::session::CompletionReason;

/// A locally recorded modification of a row
#[derive(Debug, Clone, PartialEq)]
pub enum RowModification {
    /// The row was updated to this value
    Updated(RowValue),
    /// The row was deleted
    Deleted,
}

type CapturedRow = Arc<Mutex<Option<RowValue>>>;

/// Listener installed on the wrapped fetcher, keeping its latest row
struct CapturingListener {
    captured: CapturedRow,
}

impl FetcherListener for CapturingListener {
    fn row_changed(&mut self, row: Option<&RowValue>) {
        let mut captured = self.captured.lock().unwrap_or_else(PoisonError::into_inner);
        *captured = row.cloned();
    }
}

#[derive(Debug, Clone, Copy)]
enum Navigation {
    First,
    Last,
    Next,
    Previous,
    Absolute(i64),
    Relative(i64),
    BeforeFirst,
    AfterLast,
}

impl Navigation {
    /// Target position given the current position and the total row count
    fn target(self, position: i64, total: i64) -> i64 {
        let after_last = total + 1;
        match self {
            Navigation::First => 1,
            Navigation::Last => total,
            Navigation::Next => position.min(total) + 1,
            Navigation::Previous => position.min(after_last).max(1) - 1,
            Navigation::Absolute(row) if row >= 0 => row.min(after_last),
            Navigation::Absolute(row) => (after_last + row).max(0),
            Navigation::Relative(rows) => position.saturating_add(rows).clamp(0, after_last),
            Navigation::BeforeFirst => 0,
            Navigation::AfterLast => after_last,
        }
    }
}

/// Fetcher decorator recording row modifications locally
#[derive(Debug)]
pub struct UpdatableFetcher<F> {
    inner: F,
    captured: CapturedRow,
    listener: ListenerSlot,
    modifications: HashMap<i64, RowModification>,
    inserted: Vec<RowValue>,
    deleted_marker: RowValue,
    position: i64,
    /// Row at `position` before applying the overlay
    base_row: Option<RowValue>,
    /// Row at `position` as last notified
    current_row: Option<RowValue>,
}

impl<F: Fetcher> UpdatableFetcher<F> {
    /// Wrap `inner`, reporting deleted rows as `deleted_marker`
    ///
    /// The listener of `inner` is replaced.
    pub fn new(mut inner: F, deleted_marker: RowValue) -> Self {
        let captured = CapturedRow::default();
        inner.set_listener(Box::new(CapturingListener {
            captured: Arc::clone(&captured),
        }));
        Self {
            position: inner.current_position(),
            inner,
            captured,
            listener: ListenerSlot::default(),
            modifications: HashMap::new(),
            inserted: Vec::new(),
            deleted_marker,
            base_row: None,
            current_row: None,
        }
    }

    /// The wrapped fetcher
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// The row at the current position, with modifications applied
    pub fn current_row(&self) -> Option<&RowValue> {
        self.current_row.as_ref()
    }

    /// Check if the current row was updated through this fetcher
    pub fn row_updated(&self) -> bool {
        matches!(
            self.modifications.get(&self.position),
            Some(RowModification::Updated(_))
        )
    }

    /// Check if the current row was deleted through this fetcher
    pub fn row_deleted(&self) -> bool {
        matches!(
            self.modifications.get(&self.position),
            Some(RowModification::Deleted)
        )
    }

    /// Check if the current row was inserted through this fetcher
    pub async fn row_inserted(&mut self) -> Result<bool> {
        self.inner.check_open()?;
        if self.inserted.is_empty() {
            return Ok(false);
        }
        let inner_size = self.inner.size().await?;
        Ok(self.position > inner_size && self.position <= inner_size + self.inserted.len() as i64)
    }

    /// Number of rows inserted through this fetcher
    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }

    fn take_captured(&self) -> Option<RowValue> {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn notify_position(&mut self, base: Option<RowValue>) -> bool {
        let resolved = match self.modifications.get(&self.position) {
            Some(RowModification::Updated(row)) => Some(row.clone()),
            Some(RowModification::Deleted) => Some(self.deleted_marker.clone()),
            None => base.clone(),
        };
        self.base_row = base;
        self.listener.row_changed(resolved.as_ref());
        let on_row = resolved.is_some();
        self.current_row = resolved;
        on_row
    }

    /// Reject backward and positioned movement over a forward-only fetcher
    fn check_movement(&self, navigation: Navigation) -> Result<()> {
        if !self.inner.is_forward_only() {
            return Ok(());
        }
        match navigation {
            Navigation::Next | Navigation::AfterLast => Ok(()),
            Navigation::BeforeFirst if self.position == 0 => Ok(()),
            _ => Err(Error::ForwardOnly),
        }
    }

    fn renotify(&mut self) {
        let base = self.base_row.take();
        self.notify_position(base);
    }

    async fn apply(&mut self, navigation: Navigation) -> Result<()> {
        match navigation {
            Navigation::First => self.inner.first().await.map(drop),
            Navigation::Last => self.inner.last().await.map(drop),
            Navigation::Next => self.inner.next().await.map(drop),
            Navigation::Previous => self.inner.previous().await.map(drop),
            Navigation::Absolute(row) => self.inner.absolute(row).await.map(drop),
            Navigation::Relative(rows) => self.inner.relative(rows).await.map(drop),
            Navigation::BeforeFirst => self.inner.before_first().await,
            Navigation::AfterLast => self.inner.after_last().await,
        }
    }

    async fn navigate(&mut self, navigation: Navigation) -> Result<bool> {
        self.inner.check_open()?;
        if self.inserted.is_empty() {
            self.apply(navigation).await?;
            self.position = self.inner.current_position();
            let base = self.take_captured();
            return Ok(self.notify_position(base));
        }

        // inserted rows are served locally, out of reach of the inner guard
        self.check_movement(navigation)?;
        let inner_size = self.inner.size().await?;
        let total = inner_size + self.inserted.len() as i64;
        let target = navigation.target(self.position, total);

        if target <= 0 {
            self.inner.before_first().await?;
            self.take_captured();
            self.position = 0;
            return Ok(self.notify_position(None));
        }

        if target <= inner_size {
            if self.position <= inner_size {
                let navigation = match navigation {
                    Navigation::Absolute(_) => Navigation::Absolute(target),
                    other => other,
                };
                self.apply(navigation).await?;
            } else {
                // re-entering from the inserted rows
                self.inner.absolute(target).await?;
            }
            self.position = target;
            let base = self.take_captured();
            return Ok(self.notify_position(base));
        }

        if self.inner.current_position() <= inner_size {
            self.inner.after_last().await?;
            self.take_captured();
        }
        let base = if target <= total {
            self.position = target;
            self.inserted.get((target - inner_size - 1) as usize).cloned()
        } else {
            self.position = total + 1;
            None
        };
        Ok(self.notify_position(base))
    }

    fn check_on_row(&self) -> Result<()> {
        if self.current_row.is_some() {
            Ok(())
        } else {
            Err(Error::NotOnRow)
        }
    }
}

#[async_trait::async_trait]
impl<F: Fetcher> Fetcher for UpdatableFetcher<F> {
    async fn first(&mut self) -> Result<bool> {
        self.navigate(Navigation::First).await
    }

    async fn last(&mut self) -> Result<bool> {
        self.navigate(Navigation::Last).await
    }

    async fn next(&mut self) -> Result<bool> {
        self.navigate(Navigation::Next).await
    }

    async fn previous(&mut self) -> Result<bool> {
        self.navigate(Navigation::Previous).await
    }

    async fn absolute(&mut self, row: i64) -> Result<bool> {
        self.navigate(Navigation::Absolute(row)).await
    }

    async fn relative(&mut self, rows: i64) -> Result<bool> {
        self.navigate(Navigation::Relative(rows)).await
    }

    async fn before_first(&mut self) -> Result<()> {
        self.navigate(Navigation::BeforeFirst).await.map(drop)
    }

    async fn after_last(&mut self) -> Result<()> {
        self.navigate(Navigation::AfterLast).await.map(drop)
    }

    async fn close(&mut self, reason: CompletionReason) -> Result<()> {
        if self.inner.is_closed() {
            return Ok(());
        }
        let result = self.inner.close(reason).await;
        self.modifications.clear();
        self.inserted.clear();
        self.base_row = None;
        self.current_row = None;
        self.listener.fetcher_closed();
        result
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn current_position(&self) -> i64 {
        self.position
    }

    async fn size(&mut self) -> Result<i64> {
        Ok(self.inner.size().await? + self.inserted.len() as i64)
    }

    fn fetch_size(&self) -> u32 {
        self.inner.fetch_size()
    }

    fn is_forward_only(&self) -> bool {
        self.inner.is_forward_only()
    }

    fn set_fetch_size(&mut self, fetch_size: u32) {
        self.inner.set_fetch_size(fetch_size);
    }

    fn fetch_direction(&self) -> FetchDirection {
        self.inner.fetch_direction()
    }

    fn set_fetch_direction(&mut self, direction: FetchDirection) {
        self.inner.set_fetch_direction(direction);
    }

    fn set_listener(&mut self, listener: Box<dyn FetcherListener>) {
        self.listener.set(listener);
    }

    async fn insert_row(&mut self, row: RowValue) -> Result<()> {
        self.inner.check_open()?;
        let total = self.size().await?;
        let after_last = self.position > total;
        self.inserted.push(row);
        if after_last {
            self.position = total + 2;
        }
        self.renotify();
        Ok(())
    }

    async fn update_row(&mut self, row: RowValue) -> Result<()> {
        self.inner.check_open()?;
        self.check_on_row()?;
        let inner_size = if self.inserted.is_empty() {
            None
        } else {
            Some(self.inner.size().await?)
        };
        match inner_size {
            Some(inner_size) if self.position > inner_size => {
                let index = (self.position - inner_size - 1) as usize;
                if let Some(slot) = self.inserted.get_mut(index) {
                    *slot = row.clone();
                }
                self.modifications.remove(&self.position);
                self.base_row = Some(row);
            }
            _ => {
                self.modifications
                    .insert(self.position, RowModification::Updated(row));
            }
        }
        self.renotify();
        Ok(())
    }

    async fn delete_row(&mut self) -> Result<()> {
        self.inner.check_open()?;
        self.check_on_row()?;
        self.modifications
            .insert(self.position, RowModification::Deleted);
        self.renotify();
        Ok(())
    }
}
