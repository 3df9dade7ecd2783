//! Statement caching for row mutation
//!
//! The row updater keeps one server statement per [`StatementKind`]. A
//! statement is allocated the first time its kind is used and reused after
//! that. Its text is re-prepared only when the generated SQL differs from
//! what was prepared last, which happens for UPDATE and INSERT when a
//! different set of fields is touched.

use indexmap::IndexMap;

use crate::session::StatementHandle;
use crate::updater::StatementKind;

/// A cached statement with its prepared text
#[derive(Debug)]
struct CachedStatement {
    handle: StatementHandle,
    /// SQL text currently prepared on the statement
    prepared_sql: Option<String>,
    /// Number of times the statement was handed out
    uses: u64,
}

impl CachedStatement {
    fn new(handle: StatementHandle) -> Self {
        Self {
            handle,
            prepared_sql: None,
            uses: 0,
        }
    }
}

/// Cache of statement handles per statement kind
///
/// # Example
///
/// ```rust
/// use rowcursor::{StatementCache, StatementHandle, StatementKind};
///
/// let mut cache = StatementCache::new();
/// assert!(cache.get(StatementKind::Delete).is_none());
///
/// cache.put(StatementKind::Delete, StatementHandle(7));
/// assert!(cache.needs_prepare(StatementKind::Delete, "delete from T\nwhere ID=?"));
/// cache.mark_prepared(StatementKind::Delete, "delete from T\nwhere ID=?");
/// assert!(!cache.needs_prepare(StatementKind::Delete, "delete from T\nwhere ID=?"));
/// ```
#[derive(Debug, Default)]
pub struct StatementCache {
    cache: IndexMap<StatementKind, CachedStatement>,
}

impl StatementCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the statement of a kind, if allocated
    pub fn get(&mut self, kind: StatementKind) -> Option<StatementHandle> {
        match self.cache.get_mut(&kind) {
            Some(cached) => {
                cached.uses += 1;
                tracing::trace!(
                    kind = %kind,
                    handle = cached.handle.0,
                    uses = cached.uses,
                    "Statement cache hit"
                );
                Some(cached.handle)
            }
            None => {
                tracing::trace!(kind = %kind, "Statement cache miss");
                None
            }
        }
    }

    /// Add a newly allocated statement, returning a replaced one
    pub fn put(&mut self, kind: StatementKind, handle: StatementHandle) -> Option<StatementHandle> {
        let mut cached = CachedStatement::new(handle);
        cached.uses = 1;
        self.cache
            .insert(kind, cached)
            .map(|previous| previous.handle)
    }

    /// Check whether `sql` must be prepared before executing the statement
    pub fn needs_prepare(&self, kind: StatementKind, sql: &str) -> bool {
        self.cache
            .get(&kind)
            .map_or(true, |cached| cached.prepared_sql.as_deref() != Some(sql))
    }

    /// Record that `sql` is now prepared on the statement
    pub fn mark_prepared(&mut self, kind: StatementKind, sql: impl Into<String>) {
        if let Some(cached) = self.cache.get_mut(&kind) {
            let sql = sql.into();
            tracing::trace!(kind = %kind, sql = sql.as_str(), "Statement prepared");
            cached.prepared_sql = Some(sql);
        }
    }

    /// Forget the prepared text, forcing the next use to prepare again
    pub fn invalidate(&mut self, kind: StatementKind) {
        if let Some(cached) = self.cache.get_mut(&kind) {
            cached.prepared_sql = None;
        }
    }

    /// Remove all statements, returning their handles for freeing
    pub fn drain(&mut self) -> Vec<StatementHandle> {
        let handles: Vec<_> = self.cache.drain(..).map(|(_, cached)| cached.handle).collect();
        tracing::debug!(statements = handles.len(), "Statement cache cleared");
        handles
    }

    /// Number of cached statements
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
