//! bgdb-store - SQLite persistence for bgdb
//!
//! One database file holds the position corpus, the filter library and the
//! search history. [`SqliteStore`] implements all three storage traits:
//!
//! - [`PositionStore`]: positions with analysis, comments and tags, plus the
//!   index-assisted [`positions_matching`](PositionStore::positions_matching)
//! - [`FilterLibrary`]: named filters keyed by generated UUIDs
//! - [`SearchHistory`]: append-only log with strictly increasing timestamps
//!
//! Opening a database written by an older version migrates it in place; see
//! [`schema`].

pub mod error;
pub mod schema;
mod sql;
pub mod sqlite_store;
pub mod store;

pub use error::{Result, StoreError};
pub use schema::SCHEMA_VERSION;
pub use sqlite_store::SqliteStore;
pub use store::{
    FilterDraft, FilterLibrary, HistoryEntry, PositionStore, SavedFilter, SearchHistory,
};
