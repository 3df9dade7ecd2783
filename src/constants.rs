//! Protocol constants
//!
//! Fetch types, SQL type codes, info items and defaults shared by the
//! fetchers and the row updater.

// =============================================================================
// Fetch Types (for scrollable cursors)
// =============================================================================

/// Fetch type of a scroll fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FetchType {
    /// Fetch the next row(s) (default)
    #[default]
    Next = 0,
    /// Fetch the previous row(s)
    Prior = 1,
    /// Fetch the first row
    First = 2,
    /// Fetch the last row
    Last = 3,
    /// Fetch the row at an absolute position
    Absolute = 4,
    /// Fetch the row relative to the current server position
    Relative = 5,
}

impl FetchType {
    /// Whether this fetch type can return more than one row per request
    pub fn supports_batch(self) -> bool {
        matches!(self, FetchType::Next | FetchType::Prior)
    }

    /// Direction in which rows of this fetch type are delivered
    pub fn direction(self) -> FetchDirection {
        match self {
            FetchType::Next => FetchDirection::Forward,
            FetchType::Prior => FetchDirection::Reverse,
            _ => FetchDirection::Unknown,
        }
    }
}

/// Fetch direction hint and the order in which a batch is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchDirection {
    /// Rows are processed first to last (default)
    #[default]
    Forward,
    /// Rows are processed last to first
    Reverse,
    /// Processing order is unknown
    Unknown,
}

// =============================================================================
// SQL Types
// =============================================================================

/// SQL type codes as reported in field descriptors
#[allow(missing_docs)]
pub mod sql_type {
    pub const SQL_TEXT: i32 = 452;
    pub const SQL_VARYING: i32 = 448;
    pub const SQL_SHORT: i32 = 500;
    pub const SQL_LONG: i32 = 496;
    pub const SQL_FLOAT: i32 = 482;
    pub const SQL_DOUBLE: i32 = 480;
    pub const SQL_TIMESTAMP: i32 = 510;
    pub const SQL_BLOB: i32 = 520;
    pub const SQL_TYPE_TIME: i32 = 560;
    pub const SQL_TYPE_DATE: i32 = 570;
    pub const SQL_INT64: i32 = 580;
    pub const SQL_BOOLEAN: i32 = 32764;
    pub const SQL_NULL: i32 = 32766;
}

/// Character set ids used as sub type of text fields
#[allow(missing_docs)]
pub mod charset {
    pub const NONE: i32 = 0;
    pub const OCTETS: i32 = 1;
    pub const UTF8: i32 = 4;
}

// =============================================================================
// Info Items
// =============================================================================

/// Info request and response items
#[allow(missing_docs)]
pub mod info {
    pub const ISC_INFO_END: u8 = 1;
    pub const ISC_INFO_TRUNCATED: u8 = 2;
    pub const INF_RECORD_COUNT: u8 = 10;
    /// Response buffer size requested for the record count
    pub const RECORD_COUNT_BUFFER_LENGTH: usize = 10;
}

// =============================================================================
// Row Identity
// =============================================================================

/// Name of the row-identity pseudo column in SQL text
pub const DB_KEY_SQL_NAME: &str = "RDB$DB_KEY";

/// Name under which metadata reports the row-identity pseudo column
pub const DB_KEY_COLUMN_NAME: &str = "DB_KEY";

/// Length in bytes of a row-identity value for a single table
pub const DB_KEY_LENGTH: i32 = 8;

// =============================================================================
// Dialects & Defaults
// =============================================================================

/// SQL dialect 1 (no delimited identifiers)
pub const DIALECT_1: u8 = 1;

/// SQL dialect 3 (double-quoted delimited identifiers)
pub const DIALECT_3: u8 = 3;

/// Number of rows fetched per request when no fetch size was configured
pub const DEFAULT_FETCH_ROWS: u32 = 400;

/// Number of rows requested when refreshing a row by key
pub const REFRESH_FETCH_ROWS: u32 = 10;
