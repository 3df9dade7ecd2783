#![warn(missing_docs)]

//! # rowcursor
//!
//! Scrollable and updatable cursors over a database protocol that only
//! offers directional fetches.
//!
//! The protocol can fetch the first, last, next or previous batch of rows,
//! or jump to an absolute or relative position, and reports whether the
//! server cursor ended up before the first or after the last row. This
//! crate builds random-access, positionable and mutable result sets on top
//! of that.
//!
//! ## Features
//!
//! - **Server window** - keeps a local window of rows in sync with a
//!   server-side scrollable cursor and resolves the cursor size lazily
//! - **Cached and streaming fetchers** - fully materialized and
//!   forward-only result sets behind the same [`Fetcher`] trait
//! - **Emulated updates** - row updates, deletes, inserts and refreshes are
//!   executed as separate statements addressed by a derived key
//! - **Local overlay** - changed rows show up in the cursor without
//!   re-executing the query
//!
//! ## Quick Start
//!
//! The protocol and statement layer is supplied by implementing
//! [`Session`]. A [`Cursor`] is opened over an executed statement:
//!
//! ```rust,ignore
//! use rowcursor::{shared, Concurrency, Cursor, FetchConfig, QuoteStrategy, ResultSetType};
//!
//! # async fn example(session: impl rowcursor::Session + 'static) -> rowcursor::Result<()> {
//! let session = shared(session);
//! let config: FetchConfig = "type=scroll_insensitive;concurrency=updatable;fetch_size=50".parse()?;
//!
//! let mut cursor = Cursor::open(session, stmt, descriptor, config, QuoteStrategy::for_dialect(3)).await?;
//! while cursor.next().await? {
//!     println!("{:?}", cursor.row());
//! }
//! cursor.close(Default::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use rowcursor::{Concurrency, FetchConfig, ResultSetType};
//!
//! let config = FetchConfig::new()
//!     .with_result_set_type(ResultSetType::ScrollInsensitive)
//!     .with_concurrency(Concurrency::Updatable)
//!     .with_max_rows(1000);
//! assert!(config.is_updatable());
//! assert_eq!(config.actual_fetch_size(), 400);
//! ```
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]. No subscriber is installed; remote
//! fetches and generated statements are logged at `debug` level, window
//! and statement cache activity at `trace` level.

pub mod buffer;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod fetcher;
pub mod row;
pub mod session;
pub mod statement;
pub mod statement_cache;
pub mod updater;

// Re-export commonly used types
pub use config::{Concurrency, FetchConfig, QuoteStrategy, ResultSetType};
pub use constants::{FetchDirection, FetchType};
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use fetcher::{
    CachedFetcher, Fetcher, FetcherListener, RowModification, ServerWindowFetcher,
    StatementFetcher, StreamingFetcher, UpdatableFetcher,
};
pub use row::{FieldSet, RowValue};
pub use session::{
    shared, CompletionReason, FetchBatch, Session, SharedSession, StatementHandle,
    TransactionHandle,
};
pub use statement::{FieldDescriptor, RowDescriptor, RowDescriptorBuilder};
pub use statement_cache::StatementCache;
pub use updater::{RowUpdater, StatementGenerator, StatementKind};
