//! Storage traits and the records they exchange.

use bgdb_domain::{Position, PositionId, PositionRecord};
use bgdb_query::{Criterion, Prefilter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// The position corpus.
pub trait PositionStore: Send + Sync {
    /// Store a record. A record with `id <= 0` gets a fresh id; otherwise the
    /// given id is used. Returns the stored id.
    fn insert_position(&self, record: &PositionRecord) -> Result<PositionId>;

    /// Store several records atomically.
    fn insert_positions(&self, records: &[PositionRecord]) -> Result<Vec<PositionId>>;

    fn get_position(&self, id: PositionId) -> Result<Option<PositionRecord>>;

    /// Every stored record, in no particular order.
    fn all_positions(&self) -> Result<Vec<PositionRecord>>;

    /// Records admitted by `prefilter`. A superset of what the full query
    /// will match, never a subset.
    fn positions_matching(&self, prefilter: &Prefilter) -> Result<Vec<PositionRecord>>;

    fn position_count(&self) -> Result<usize>;

    /// Replace a position's tags.
    fn set_tags(&self, id: PositionId, tags: &[String]) -> Result<()>;

    /// Replace or remove a position's comment.
    fn set_comment(&self, id: PositionId, comment: Option<&str>) -> Result<()>;
}

/// A filter as submitted for saving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDraft {
    pub name: String,
    /// Command text as typed
    pub command: String,
    /// Validated form of `command`
    pub criteria: Vec<Criterion>,
    /// Anchor position for `cp`, if the filter uses it
    #[serde(default)]
    pub anchor: Option<Position>,
}

impl FilterDraft {
    pub fn new(name: impl Into<String>, command: impl Into<String>, criteria: Vec<Criterion>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            criteria,
            anchor: None,
        }
    }

    pub fn with_anchor(mut self, anchor: Option<Position>) -> Self {
        self.anchor = anchor;
        self
    }
}

/// A named, persisted filter. Identity is the id; names may repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFilter {
    pub id: Uuid,
    pub name: String,
    pub command: String,
    pub criteria: Vec<Criterion>,
    #[serde(default)]
    pub anchor: Option<Position>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Named filters.
pub trait FilterLibrary: Send + Sync {
    fn create_filter(&self, draft: FilterDraft) -> Result<SavedFilter>;

    /// All filters, oldest first.
    fn list_filters(&self) -> Result<Vec<SavedFilter>>;

    fn get_filter(&self, id: Uuid) -> Result<Option<SavedFilter>>;

    /// Replace name, command, criteria and anchor in one step. Fails with
    /// `NotFound` for an unknown id.
    fn update_filter(&self, id: Uuid, draft: FilterDraft) -> Result<SavedFilter>;

    /// Remove a filter. Removing an absent id succeeds.
    fn delete_filter(&self, id: Uuid) -> Result<()>;
}

/// One executed search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub command: String,
    /// Position that was current when the search ran
    pub position: Option<Position>,
    /// Milliseconds since the epoch, strictly increasing across entries
    pub timestamp_ms: i64,
}

impl HistoryEntry {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

/// Append-only search log.
pub trait SearchHistory: Send + Sync {
    fn append_history(&self, command: &str, position: Option<&Position>) -> Result<HistoryEntry>;

    /// Entries, most recent first.
    fn list_history(&self) -> Result<Vec<HistoryEntry>>;

    fn get_history(&self, id: i64) -> Result<Option<HistoryEntry>>;

    fn clear_history(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgdb_query::parse_command;

    #[test]
    fn saved_filter_serde_round_trip() {
        let criteria = parse_command("sc>60 tp2>50 b3").unwrap().criteria;
        let filter = SavedFilter {
            id: Uuid::new_v4(),
            name: "cube tests".into(),
            command: "sc>60 tp2>50 b3".into(),
            criteria,
            anchor: Some(Position::default()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&filter).unwrap();
        let back: SavedFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(filter, back);
    }

    #[test]
    fn history_timestamp() {
        let entry = HistoryEntry {
            id: 1,
            command: "cv2".into(),
            position: None,
            timestamp_ms: 1_700_000_000_000,
        };
        assert_eq!(entry.timestamp().map(|t| t.timestamp()), Some(1_700_000_000));
    }
}
