//! In-memory session emulating a server-side scrollable cursor
//!
//! The main cursor is statement handle 1. Its rows are held locally and
//! scroll fetches follow the server's boundary rules: a batch that runs
//! past either end of the cursor reports the boundary flag and leaves the
//! cursor on the before-first or after-last position. Every call is
//! recorded so tests can assert the exact remote traffic.
//!
//! Statements allocated by the row updater get handles from 100 upwards.
//! Executing a `select` statement opens the next queued refresh result.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};

use bytes::Bytes;

use rowcursor::buffer::encode_record_count;
use rowcursor::constants::sql_type;
use rowcursor::{
    Error, FetchBatch, FetchType, FieldDescriptor, Result, RowDescriptor, RowValue, Session,
    SharedSession, StatementHandle, TransactionHandle,
};
use std::sync::Arc;

/// Handle of the cursor statement
pub const CURSOR: StatementHandle = StatementHandle(1);

/// A recorded session call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchScroll {
        fetch_type: FetchType,
        fetch_size: u32,
        position: i64,
    },
    FetchRows {
        stmt: u32,
        fetch_size: u32,
    },
    CursorInfo,
    CloseCursor {
        stmt: u32,
        release_fully: bool,
    },
    Allocate(u32),
    Prepare {
        stmt: u32,
        sql: String,
    },
    Execute {
        stmt: u32,
        params: Vec<Option<Bytes>>,
    },
    Free(u32),
    SetTransaction {
        stmt: u32,
        tx: u32,
    },
    BestRowIdentifier(String),
}

impl Call {
    /// Whether this call moved or read the main cursor remotely
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            Call::FetchScroll { .. } | Call::FetchRows { stmt: 1, .. } | Call::CursorInfo
        )
    }
}

#[derive(Debug)]
pub struct MockSession {
    rows: Vec<RowValue>,
    /// 0 before first, `rows.len() + 1` after last
    position: i64,
    fetched: HashSet<StatementHandle>,
    scroll_supported: bool,
    pub calls: Vec<Call>,
    next_handle: u32,
    prepared: HashMap<StatementHandle, String>,
    open_results: HashMap<StatementHandle, VecDeque<RowValue>>,
    pub refresh_results: VecDeque<Vec<RowValue>>,
    pub identifiers: HashMap<String, Vec<String>>,
    pub transaction: u32,
    /// Fail the next execute with a database error
    pub fail_next_execute: bool,
    /// Plain fetches of the cursor return at least this many rows
    pub batch_floor: u32,
}

impl MockSession {
    pub fn new(rows: Vec<RowValue>) -> Self {
        Self {
            rows,
            position: 0,
            fetched: HashSet::new(),
            scroll_supported: true,
            calls: Vec::new(),
            next_handle: 100,
            prepared: HashMap::new(),
            open_results: HashMap::new(),
            refresh_results: VecDeque::new(),
            identifiers: HashMap::new(),
            transaction: 1,
            fail_next_execute: false,
            batch_floor: 0,
        }
    }

    pub fn without_scroll(mut self) -> Self {
        self.scroll_supported = false;
        self
    }

    pub fn with_identifier(mut self, table: &str, columns: &[&str]) -> Self {
        self.identifiers.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn fetch_calls(&self) -> Vec<Call> {
        self.calls.iter().filter(|c| c.is_fetch()).cloned().collect()
    }

    pub fn server_position(&self) -> i64 {
        self.position
    }

    fn len(&self) -> i64 {
        self.rows.len() as i64
    }

    fn next_batch(&mut self, fetch_size: u32) -> FetchBatch {
        let start = self.position.clamp(0, self.len());
        let available = (self.len() - start) as usize;
        let count = available.min(fetch_size as usize);
        let rows = self.rows[start as usize..start as usize + count].to_vec();
        if count < fetch_size as usize {
            self.position = self.len() + 1;
            FetchBatch::new(rows).with_after_last(true)
        } else {
            self.position = start + count as i64;
            FetchBatch::new(rows)
        }
    }

    fn prior_batch(&mut self, fetch_size: u32) -> FetchBatch {
        let end = self.position.clamp(1, self.len() + 1) - 1;
        let count = (end as usize).min(fetch_size as usize);
        let rows: Vec<_> = self.rows[end as usize - count..end as usize]
            .iter()
            .rev()
            .cloned()
            .collect();
        if count < fetch_size as usize {
            self.position = 0;
            FetchBatch::new(rows).with_before_first(true)
        } else {
            self.position = end - count as i64 + 1;
            FetchBatch::new(rows)
        }
    }

    fn positioned(&mut self, target: i64) -> FetchBatch {
        if target <= 0 {
            self.position = 0;
            FetchBatch::default().with_before_first(true)
        } else if target > self.len() {
            self.position = self.len() + 1;
            FetchBatch::default().with_after_last(true)
        } else {
            self.position = target;
            FetchBatch::new(vec![self.rows[target as usize - 1].clone()])
        }
    }
}

#[async_trait::async_trait]
impl Session for MockSession {
    async fn fetch_scroll(
        &mut self,
        stmt: StatementHandle,
        fetch_type: FetchType,
        fetch_size: u32,
        position: i64,
    ) -> Result<FetchBatch> {
        assert_eq!(stmt, CURSOR);
        self.calls.push(Call::FetchScroll {
            fetch_type,
            fetch_size,
            position,
        });
        self.fetched.insert(stmt);
        let batch = match fetch_type {
            FetchType::Next => self.next_batch(fetch_size),
            FetchType::Prior => self.prior_batch(fetch_size),
            FetchType::First => {
                self.position = 0;
                self.next_batch(1)
            }
            FetchType::Last => {
                if self.rows.is_empty() {
                    self.position = 1;
                    FetchBatch::default().with_after_last(true)
                } else {
                    self.positioned(self.len())
                }
            }
            FetchType::Absolute => {
                let target = if position < 0 {
                    self.len() + 1 + position
                } else {
                    position
                };
                self.positioned(target)
            }
            FetchType::Relative if position == 0 => {
                if self.position >= 1 && self.position <= self.len() {
                    FetchBatch::new(vec![self.rows[self.position as usize - 1].clone()])
                } else {
                    FetchBatch::default()
                }
            }
            FetchType::Relative => self.positioned(self.position + position),
        };
        Ok(batch)
    }

    async fn fetch_rows(&mut self, stmt: StatementHandle, fetch_size: u32) -> Result<FetchBatch> {
        self.calls.push(Call::FetchRows {
            stmt: stmt.0,
            fetch_size,
        });
        self.fetched.insert(stmt);
        if stmt == CURSOR {
            return Ok(self.next_batch(fetch_size.max(self.batch_floor)));
        }
        let open = self
            .open_results
            .get_mut(&stmt)
            .ok_or_else(|| Error::Protocol("no open cursor".to_string()))?;
        let count = open.len().min(fetch_size as usize);
        let rows: Vec<_> = open.drain(..count).collect();
        let after_last = open.is_empty();
        Ok(FetchBatch::new(rows).with_after_last(after_last))
    }

    async fn cursor_info(
        &mut self,
        stmt: StatementHandle,
        items: &[u8],
        max_length: usize,
    ) -> Result<Bytes> {
        self.calls.push(Call::CursorInfo);
        assert_eq!(items, &[10, 1]);
        assert_eq!(max_length, 10);
        if !self.fetched.contains(&stmt) {
            return Err(Error::database(335544569, "cursor info requested before fetch"));
        }
        Ok(encode_record_count(self.rows.len() as i32))
    }

    fn has_fetched(&self, stmt: StatementHandle) -> bool {
        self.fetched.contains(&stmt)
    }

    fn supports_fetch_scroll(&self) -> bool {
        self.scroll_supported
    }

    async fn close_cursor(&mut self, stmt: StatementHandle, release_fully: bool) -> Result<()> {
        self.calls.push(Call::CloseCursor {
            stmt: stmt.0,
            release_fully,
        });
        self.open_results.remove(&stmt);
        Ok(())
    }

    async fn allocate_statement(&mut self) -> Result<StatementHandle> {
        let handle = StatementHandle(self.next_handle);
        self.next_handle += 1;
        self.calls.push(Call::Allocate(handle.0));
        Ok(handle)
    }

    async fn prepare(&mut self, stmt: StatementHandle, sql: &str) -> Result<()> {
        self.calls.push(Call::Prepare {
            stmt: stmt.0,
            sql: sql.to_string(),
        });
        self.prepared.insert(stmt, sql.to_string());
        Ok(())
    }

    async fn execute(&mut self, stmt: StatementHandle, params: &RowValue) -> Result<()> {
        self.calls.push(Call::Execute {
            stmt: stmt.0,
            params: params.iter().map(|v| v.cloned()).collect(),
        });
        if self.fail_next_execute {
            self.fail_next_execute = false;
            return Err(Error::database(335544665, "violation of PRIMARY or UNIQUE KEY constraint"));
        }
        let is_select = self
            .prepared
            .get(&stmt)
            .map_or(false, |sql| sql.starts_with("select"));
        if is_select {
            let rows = self.refresh_results.pop_front().unwrap_or_default();
            self.open_results.insert(stmt, rows.into());
        }
        Ok(())
    }

    async fn free_statement(&mut self, stmt: StatementHandle) -> Result<()> {
        self.calls.push(Call::Free(stmt.0));
        self.prepared.remove(&stmt);
        Ok(())
    }

    fn current_transaction(&self) -> Result<TransactionHandle> {
        Ok(TransactionHandle(self.transaction))
    }

    async fn set_transaction(&mut self, stmt: StatementHandle, tx: TransactionHandle) -> Result<()> {
        self.calls.push(Call::SetTransaction {
            stmt: stmt.0,
            tx: tx.0,
        });
        Ok(())
    }

    async fn best_row_identifier(&mut self, table: &str) -> Result<Vec<String>> {
        self.calls.push(Call::BestRowIdentifier(table.to_string()));
        Ok(self.identifiers.get(table).cloned().unwrap_or_default())
    }
}

/// Encoded text value
pub fn text(value: &str) -> Option<Bytes> {
    Some(Bytes::copy_from_slice(value.as_bytes()))
}

/// Row of text values
pub fn row(values: &[&str]) -> RowValue {
    RowValue::of(values.iter().map(|v| text(v)).collect())
}

/// Single-column rows "1" to "n"
pub fn numbered_rows(n: usize) -> Vec<RowValue> {
    (1..=n).map(|i| row(&[&i.to_string()])).collect()
}

/// First field of a row as text
pub fn first_field(row: Option<&RowValue>) -> Option<String> {
    row.and_then(|r| r.field(0))
        .map(|b| String::from_utf8_lossy(b).into_owned())
}

/// `EMP (ID, NAME)` projection
pub fn emp_descriptor() -> Arc<RowDescriptor> {
    RowDescriptor::builder()
        .field(FieldDescriptor::column("EMP", "ID", sql_type::SQL_LONG))
        .field(FieldDescriptor::column("EMP", "NAME", sql_type::SQL_VARYING))
        .build()
}

/// Rows `[id, name]` for the given names, ids counting from 1
pub fn emp_rows(names: &[&str]) -> Vec<RowValue> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| row(&[&(i + 1).to_string(), name]))
        .collect()
}

pub async fn take_calls(session: &SharedSession<MockSession>) -> Vec<Call> {
    session.lock().await.take_calls()
}

/// Listener recording the first field of every notified row
#[derive(Clone, Default)]
pub struct RecordingListener {
    pub rows: Arc<std::sync::Mutex<Vec<Option<String>>>>,
    pub closed: Arc<std::sync::Mutex<bool>>,
}

impl RecordingListener {
    pub fn notified(&self) -> Vec<Option<String>> {
        self.rows.lock().unwrap().clone()
    }
}

impl rowcursor::FetcherListener for RecordingListener {
    fn row_changed(&mut self, row: Option<&RowValue>) {
        self.rows.lock().unwrap().push(first_field(row));
    }

    fn fetcher_closed(&mut self) {
        *self.closed.lock().unwrap() = true;
    }
}
