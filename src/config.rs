//! Fetch configuration and configuration string parsing
//!
//! A [`FetchConfig`] can be built in code or parsed from a `key=value` list
//! separated by semicolons:
//!
//! - `fetch_size=100;max_rows=1000`
//! - `type=scroll_insensitive;concurrency=updatable;holdable=true`
//!
//! Recognized keys: `fetch_size`, `max_rows`, `direction`, `type`,
//! `concurrency`, `holdable` and `server_cursor`.

use std::fmt;
use std::str::FromStr;

use crate::constants::{FetchDirection, DEFAULT_FETCH_ROWS, DIALECT_1};
use crate::error::{Error, Result};

/// Scrollability of a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultSetType {
    /// Only `next()` is allowed (default)
    #[default]
    ForwardOnly,
    /// Scrollable, not sensitive to concurrent changes
    ScrollInsensitive,
    /// Scrollable and sensitive to concurrent changes (downgraded to insensitive)
    ScrollSensitive,
}

impl ResultSetType {
    /// Check if this type allows moving backwards or jumping
    pub fn is_scrollable(self) -> bool {
        self != ResultSetType::ForwardOnly
    }
}

/// Whether rows of a result set can be modified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// Rows cannot be modified (default)
    #[default]
    ReadOnly,
    /// Rows can be modified through the cursor
    Updatable,
}

/// Fetch configuration of a cursor.
///
/// The configuration is an immutable value: every `with_*` method returns a
/// new value and callers replace the whole configuration on change.
///
/// # Examples
///
/// ```rust
/// use rowcursor::{Concurrency, FetchConfig, ResultSetType};
///
/// let config = FetchConfig::new()
///     .with_fetch_size(50)
///     .with_result_set_type(ResultSetType::ScrollInsensitive)
///     .with_concurrency(Concurrency::Updatable);
/// assert_eq!(config.actual_fetch_size(), 50);
///
/// let parsed: FetchConfig = "fetch_size=50;type=scroll_insensitive;concurrency=updatable"
///     .parse()
///     .unwrap();
/// assert_eq!(parsed, config);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Rows per remote fetch (0 = default)
    pub fetch_size: u32,
    /// Maximum number of rows visible through the cursor (0 = unbounded)
    pub max_rows: u32,
    /// Direction hint
    pub direction: FetchDirection,
    /// Scrollability
    pub result_set_type: ResultSetType,
    /// Read-only or updatable
    pub concurrency: Concurrency,
    /// Whether the cursor stays open across transaction commit
    pub holdable: bool,
    /// Whether a server-side scrollable cursor may be used
    pub use_server_cursor: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            fetch_size: 0,
            max_rows: 0,
            direction: FetchDirection::Forward,
            result_set_type: ResultSetType::ForwardOnly,
            concurrency: Concurrency::ReadOnly,
            holdable: false,
            use_server_cursor: true,
        }
    }
}

impl FetchConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fetch size (0 = default)
    pub fn with_fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    /// Set the maximum number of rows (0 = unbounded)
    pub fn with_max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Set the direction hint
    pub fn with_direction(mut self, direction: FetchDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Set the result set type
    pub fn with_result_set_type(mut self, result_set_type: ResultSetType) -> Self {
        self.result_set_type = result_set_type;
        self
    }

    /// Set the concurrency
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set holdability
    pub fn with_holdable(mut self, holdable: bool) -> Self {
        self.holdable = holdable;
        self
    }

    /// Allow or disallow the server-side scrollable cursor
    pub fn with_server_cursor(mut self, use_server_cursor: bool) -> Self {
        self.use_server_cursor = use_server_cursor;
        self
    }

    /// Fetch size to request, substituting the default for 0
    pub fn actual_fetch_size(&self) -> u32 {
        if self.fetch_size == 0 {
            DEFAULT_FETCH_ROWS
        } else {
            self.fetch_size
        }
    }

    /// Check if the configuration asks for an updatable cursor
    pub fn is_updatable(&self) -> bool {
        self.concurrency == Concurrency::Updatable
    }

    /// Check if `max_rows` limits the cursor
    pub fn has_max_rows(&self) -> bool {
        self.max_rows != 0
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(Error::InvalidConfig(format!(
            "invalid boolean for {}: {}",
            key, value
        ))),
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid number for {}: {}", key, value)))
}

impl FromStr for FetchConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut config = FetchConfig::default();

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::InvalidConfig(format!("expected key=value: {}", part)))?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "fetch_size" => config.fetch_size = parse_u32(&key, value)?,
                "max_rows" => config.max_rows = parse_u32(&key, value)?,
                "direction" => {
                    config.direction = match value.to_ascii_lowercase().as_str() {
                        "forward" => FetchDirection::Forward,
                        "reverse" => FetchDirection::Reverse,
                        "unknown" => FetchDirection::Unknown,
                        _ => {
                            return Err(Error::InvalidConfig(format!(
                                "invalid direction: {}",
                                value
                            )))
                        }
                    }
                }
                "type" => {
                    config.result_set_type = match value.to_ascii_lowercase().as_str() {
                        "forward_only" => ResultSetType::ForwardOnly,
                        "scroll_insensitive" => ResultSetType::ScrollInsensitive,
                        "scroll_sensitive" => ResultSetType::ScrollSensitive,
                        _ => {
                            return Err(Error::InvalidConfig(format!(
                                "invalid result set type: {}",
                                value
                            )))
                        }
                    }
                }
                "concurrency" => {
                    config.concurrency = match value.to_ascii_lowercase().as_str() {
                        "read_only" => Concurrency::ReadOnly,
                        "updatable" => Concurrency::Updatable,
                        _ => {
                            return Err(Error::InvalidConfig(format!(
                                "invalid concurrency: {}",
                                value
                            )))
                        }
                    }
                }
                "holdable" => config.holdable = parse_bool(&key, value)?,
                "server_cursor" => config.use_server_cursor = parse_bool(&key, value)?,
                _ => return Err(Error::InvalidConfig(format!("unknown key: {}", key))),
            }
        }

        Ok(config)
    }
}

impl fmt::Display for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            FetchDirection::Forward => "forward",
            FetchDirection::Reverse => "reverse",
            FetchDirection::Unknown => "unknown",
        };
        let result_set_type = match self.result_set_type {
            ResultSetType::ForwardOnly => "forward_only",
            ResultSetType::ScrollInsensitive => "scroll_insensitive",
            ResultSetType::ScrollSensitive => "scroll_sensitive",
        };
        let concurrency = match self.concurrency {
            Concurrency::ReadOnly => "read_only",
            Concurrency::Updatable => "updatable",
        };
        write!(
            f,
            "fetch_size={};max_rows={};direction={};type={};concurrency={};holdable={};server_cursor={}",
            self.fetch_size,
            self.max_rows,
            direction,
            result_set_type,
            concurrency,
            self.holdable,
            self.use_server_cursor
        )
    }
}

/// Identifier quoting for generated statement text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStrategy {
    /// Identifiers are written as-is (dialect 1)
    NoQuotes,
    /// Identifiers are double-quoted, embedded quotes doubled (dialect 3)
    #[default]
    DoubleQuotes,
}

impl QuoteStrategy {
    /// Pick the strategy for a connection dialect
    pub fn for_dialect(dialect: u8) -> Self {
        if dialect == DIALECT_1 {
            QuoteStrategy::NoQuotes
        } else {
            QuoteStrategy::DoubleQuotes
        }
    }

    /// Append `name` to `sql`, quoted as required
    pub fn append_quoted(self, name: &str, sql: &mut String) {
        match self {
            QuoteStrategy::NoQuotes => sql.push_str(name),
            QuoteStrategy::DoubleQuotes => {
                sql.push('"');
                sql.push_str(&name.replace('"', "\"\""));
                sql.push('"');
            }
        }
    }

    /// Return `name` quoted as required
    pub fn quote(self, name: &str) -> String {
        let mut sql = String::with_capacity(name.len() + 2);
        self.append_quoted(name, &mut sql);
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DIALECT_3;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.actual_fetch_size(), DEFAULT_FETCH_ROWS);
        assert!(!config.has_max_rows());
        assert!(!config.is_updatable());
        assert!(config.use_server_cursor);
        assert_eq!(config.result_set_type, ResultSetType::ForwardOnly);
    }

    #[test]
    fn test_parse_full() {
        let config: FetchConfig = "fetch_size=10; max_rows=5;direction=reverse;type=scroll_sensitive;concurrency=updatable;holdable=yes;server_cursor=false"
            .parse()
            .unwrap();
        assert_eq!(config.fetch_size, 10);
        assert_eq!(config.max_rows, 5);
        assert_eq!(config.direction, FetchDirection::Reverse);
        assert_eq!(config.result_set_type, ResultSetType::ScrollSensitive);
        assert_eq!(config.concurrency, Concurrency::Updatable);
        assert!(config.holdable);
        assert!(!config.use_server_cursor);
    }

    #[test]
    fn test_parse_empty_is_default() {
        let config: FetchConfig = "".parse().unwrap();
        assert_eq!(config, FetchConfig::default());
    }

    #[test]
    fn test_parse_errors() {
        assert!("fetch_size=abc".parse::<FetchConfig>().is_err());
        assert!("holdable=maybe".parse::<FetchConfig>().is_err());
        assert!("colour=blue".parse::<FetchConfig>().is_err());
        assert!("fetch_size".parse::<FetchConfig>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        let config = FetchConfig::new()
            .with_max_rows(3)
            .with_direction(FetchDirection::Unknown)
            .with_holdable(true);
        let parsed: FetchConfig = config.to_string().parse().unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_quote_strategy() {
        let quote = QuoteStrategy::for_dialect(DIALECT_3);
        assert_eq!(quote.quote("NAME"), "\"NAME\"");
        assert_eq!(quote.quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(QuoteStrategy::for_dialect(DIALECT_1).quote("NAME"), "NAME");
    }
}
