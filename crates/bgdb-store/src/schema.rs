//! SQLite schema for the bgdb database

/// Schema version for migrations
pub const SCHEMA_VERSION: u32 = 3;

/// SQLite schema definition
pub struct Schema;

impl Schema {
    /// Get the complete schema SQL
    pub fn create_tables() -> &'static str {
        r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Position corpus: JSON state plus the columns the prefilter uses
CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY,
    state TEXT NOT NULL,
    decision_type TEXT NOT NULL,
    cube_value INTEGER NOT NULL,
    away1 INTEGER NOT NULL,
    away2 INTEGER NOT NULL,
    match_id INTEGER,
    game INTEGER,
    move_number INTEGER,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_positions_decision ON positions(decision_type);
CREATE INDEX IF NOT EXISTS idx_positions_cube ON positions(cube_value);
CREATE INDEX IF NOT EXISTS idx_positions_score ON positions(away1, away2);
CREATE INDEX IF NOT EXISTS idx_positions_match ON positions(match_id, game, move_number);

CREATE TABLE IF NOT EXISTS analysis (
    position_id INTEGER PRIMARY KEY REFERENCES positions(id) ON DELETE CASCADE,
    payload TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    position_id INTEGER PRIMARY KEY REFERENCES positions(id) ON DELETE CASCADE,
    body TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS position_tags (
    position_id INTEGER NOT NULL REFERENCES positions(id) ON DELETE CASCADE,
    tag_path TEXT NOT NULL,
    PRIMARY KEY (position_id, tag_path)
);

CREATE INDEX IF NOT EXISTS idx_position_tags_path ON position_tags(tag_path);

-- Named filters
CREATE TABLE IF NOT EXISTS filter_library (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    command TEXT NOT NULL,
    criteria TEXT,
    anchor TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_filter_library_created ON filter_library(created_at);

-- Search history (append-only)
CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    command TEXT NOT NULL,
    position TEXT,
    timestamp_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_search_history_timestamp ON search_history(timestamp_ms);
"#
    }

    /// Get migration SQL for a specific version
    pub fn migration(from_version: u32, to_version: u32) -> Option<&'static str> {
        match (from_version, to_version) {
            (1, 2) => Some(
                r#"
CREATE TABLE IF NOT EXISTS filter_library (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    command TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_filter_library_created ON filter_library(created_at);

CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    command TEXT NOT NULL,
    position TEXT,
    timestamp_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_search_history_timestamp ON search_history(timestamp_ms);
"#,
            ),
            (2, 3) => Some(
                r#"
CREATE TABLE IF NOT EXISTS position_tags (
    position_id INTEGER NOT NULL REFERENCES positions(id) ON DELETE CASCADE,
    tag_path TEXT NOT NULL,
    PRIMARY KEY (position_id, tag_path)
);

CREATE INDEX IF NOT EXISTS idx_position_tags_path ON position_tags(tag_path);

ALTER TABLE filter_library ADD COLUMN criteria TEXT;
ALTER TABLE filter_library ADD COLUMN anchor TEXT;
"#,
            ),
            _ => None,
        }
    }
}
