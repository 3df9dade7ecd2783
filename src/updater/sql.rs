//! Statement text and parameters for row mutation
//!
//! Statements address exactly one row through the key columns. Only the
//! fields the caller touched (the initialized fields of the new row) are
//! written by UPDATE and INSERT.

use std::fmt;
use std::sync::Arc;

use crate::config::QuoteStrategy;
use crate::constants::DB_KEY_SQL_NAME;
use crate::error::{Error, Result};
use crate::row::{FieldSet, RowValue};
use crate::statement::{FieldDescriptor, RowDescriptor};

/// Kind of a generated row statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `update ... set ... where <key>`
    Update,
    /// `delete from ... where <key>`
    Delete,
    /// `insert into ... values ...`
    Insert,
    /// `select ... where <key>`, used to refresh a row
    Select,
}

impl StatementKind {
    /// Whether the statement filters by the key columns
    pub fn uses_key(self) -> bool {
        self != StatementKind::Insert
    }

    /// Whether the statement writes the touched fields
    pub fn writes_fields(self) -> bool {
        matches!(self, StatementKind::Update | StatementKind::Insert)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Insert => "insert",
            StatementKind::Select => "select",
        };
        f.write_str(name)
    }
}

/// Generates row statements for one table and key
#[derive(Debug, Clone)]
pub struct StatementGenerator {
    table: String,
    descriptor: Arc<RowDescriptor>,
    key_columns: Vec<FieldDescriptor>,
    quote: QuoteStrategy,
}

impl StatementGenerator {
    /// Create a generator for `table` with the derived key columns
    pub fn new(
        table: impl Into<String>,
        descriptor: Arc<RowDescriptor>,
        key_columns: Vec<FieldDescriptor>,
        quote: QuoteStrategy,
    ) -> Self {
        Self {
            table: table.into(),
            descriptor,
            key_columns,
            quote,
        }
    }

    /// The table rows are written to
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The key columns addressing a row
    pub fn key_columns(&self) -> &[FieldDescriptor] {
        &self.key_columns
    }

    fn append_column(&self, field: &FieldDescriptor, sql: &mut String) {
        if field.is_db_key() {
            sql.push_str(DB_KEY_SQL_NAME);
        } else {
            self.quote
                .append_quoted(field.original_name.as_deref().unwrap_or_default(), sql);
        }
    }

    fn append_where_clause(&self, sql: &mut String) {
        sql.push_str("\nwhere ");
        for (i, key) in self.key_columns.iter().enumerate() {
            if i > 0 {
                sql.push_str("\nand ");
            }
            self.append_column(key, sql);
            sql.push_str("=?");
        }
    }

    /// Fields written by UPDATE or INSERT, in column order
    fn written_fields<'a>(
        &'a self,
        touched: &'a FieldSet,
    ) -> impl Iterator<Item = &'a FieldDescriptor> + 'a {
        self.descriptor
            .iter()
            .filter(move |field| touched.contains(field.position) && !field.is_db_key())
    }

    /// UPDATE of the touched fields
    pub fn update_sql(&self, touched: &FieldSet) -> Result<String> {
        let mut sql = String::from("update ");
        self.quote.append_quoted(&self.table, &mut sql);
        sql.push_str(" set ");
        let mut written = 0;
        for field in self.written_fields(touched) {
            if written > 0 {
                sql.push_str(",\n\t");
            }
            self.append_column(field, &mut sql);
            sql.push_str("=?");
            written += 1;
        }
        if written == 0 {
            return Err(Error::NoColumnsUpdated);
        }
        self.append_where_clause(&mut sql);
        Ok(sql)
    }

    /// DELETE of the keyed row
    pub fn delete_sql(&self) -> String {
        let mut sql = String::from("delete from ");
        self.quote.append_quoted(&self.table, &mut sql);
        self.append_where_clause(&mut sql);
        sql
    }

    /// INSERT of the touched fields
    pub fn insert_sql(&self, touched: &FieldSet) -> String {
        let mut sql = String::from("insert into ");
        self.quote.append_quoted(&self.table, &mut sql);

        let mut columns = String::new();
        let mut placeholders = String::new();
        for field in self.written_fields(touched) {
            if !columns.is_empty() {
                columns.push(',');
                placeholders.push(',');
            }
            self.append_column(field, &mut columns);
            placeholders.push('?');
        }

        if columns.is_empty() {
            sql.push_str(" default values");
        } else {
            sql.push_str(" (");
            sql.push_str(&columns);
            sql.push_str(") values (");
            sql.push_str(&placeholders);
            sql.push(')');
        }
        sql
    }

    /// SELECT of all projected columns of the keyed row
    pub fn select_sql(&self) -> String {
        let mut sql = String::from("select ");
        for (i, field) in self.descriptor.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            self.append_column(field, &mut sql);
        }
        sql.push_str("\nfrom ");
        self.quote.append_quoted(&self.table, &mut sql);
        self.append_where_clause(&mut sql);
        sql
    }

    /// Positional parameters of `kind`
    ///
    /// Touched values of `new_row` come first (UPDATE and INSERT), followed
    /// by the key values of `current_row` (all kinds except INSERT).
    pub fn parameters(
        &self,
        kind: StatementKind,
        new_row: &RowValue,
        current_row: Option<&RowValue>,
    ) -> Result<RowValue> {
        let mut values = Vec::new();
        if kind.writes_fields() {
            for field in self.written_fields(new_row.initialized_fields()) {
                values.push(new_row.field(field.position).cloned());
            }
        }
        if kind.uses_key() {
            let current_row = current_row.ok_or(Error::NotOnRow)?;
            for key in &self.key_columns {
                values.push(current_row.field(key.position).cloned());
            }
        }
        Ok(RowValue::of(values))
    }
}
