use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use bgdb_domain::{Analysis, MatchRef, Position, PositionId, PositionRecord};
use bgdb_query::{parse_command, Criterion, Prefilter};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::schema::{Schema, SCHEMA_VERSION};
use crate::sql::compile_prefilter;
use crate::store::{
    FilterDraft, FilterLibrary, HistoryEntry, PositionStore, SavedFilter, SearchHistory,
};

const POSITION_COLUMNS: &str = "p.id, p.state, p.created_at, p.match_id, p.game, p.move_number,
     a.payload, c.body
     FROM positions p
     LEFT JOIN analysis a ON a.position_id = p.id
     LEFT JOIN comments c ON c.position_id = p.id";

const FILTER_COLUMNS: &str =
    "id, name, command, criteria, anchor, created_at, updated_at FROM filter_library";

/// SQLite-backed corpus, filter library and search history.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    history_retention: Option<usize>,
}

impl SqliteStore {
    /// Open (or create) a database at the given path, migrating older schemas.
    pub fn open(path: &Path) -> Result<Self> {
        let conn =
            Connection::open(path).map_err(|e| StoreError::Storage(format!("open: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Storage(format!("open_in_memory: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Keep only the newest `retention` history entries. `None` keeps all.
    pub fn with_history_retention(mut self, retention: Option<usize>) -> Self {
        self.history_retention = retention;
        self
    }

    fn init_with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            ",
        )
        .map_err(|e| StoreError::Storage(format!("pragma: {}", e)))?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            history_retention: None,
        })
    }

    fn initialize(conn: &Connection) -> Result<()> {
        let current = Self::schema_version(conn)?;
        if current > SCHEMA_VERSION {
            return Err(StoreError::Validation(format!(
                "database schema version {} is newer than supported version {}",
                current, SCHEMA_VERSION
            )));
        }
        if current == SCHEMA_VERSION {
            return Ok(());
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Storage(format!("begin tx: {}", e)))?;
        if current == 0 {
            tx.execute_batch(Schema::create_tables())
                .map_err(|e| StoreError::Storage(format!("init_schema: {}", e)))?;
        } else {
            for version in current..SCHEMA_VERSION {
                if let Some(migration) = Schema::migration(version, version + 1) {
                    info!("Migrating database schema {} -> {}", version, version + 1);
                    tx.execute_batch(migration).map_err(|e| {
                        StoreError::Storage(format!("migrate {}: {}", version + 1, e))
                    })?;
                }
            }
        }
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [SCHEMA_VERSION],
        )?;
        tx.commit()
            .map_err(|e| StoreError::Storage(format!("commit: {}", e)))?;
        Ok(())
    }

    /// Highest recorded schema version, 0 for a fresh database.
    fn schema_version(conn: &Connection) -> Result<u32> {
        let has_table: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        if !has_table {
            return Ok(0);
        }
        let version: Option<u32> =
            conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
        Ok(version.unwrap_or(0))
    }

    /// Schema version of the open database
    pub fn current_schema_version(&self) -> Result<u32> {
        let conn = self.conn()?;
        Self::schema_version(&conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    // ==================== Positions ====================

    fn insert_record(conn: &Connection, record: &PositionRecord) -> Result<PositionId> {
        let position = &record.position;
        let state = serde_json::to_string(position)?;
        let (match_id, game, move_number) = match record.match_ref {
            Some(m) => (Some(m.match_id), Some(m.game), Some(m.move_number)),
            None => (None, None, None),
        };
        let id = (record.id > 0).then_some(record.id);

        conn.execute(
            "INSERT INTO positions (id, state, decision_type, cube_value, away1, away2, match_id, game, move_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                state,
                position.decision_type.as_str(),
                position.cube.value,
                position.score.away[0],
                position.score.away[1],
                match_id,
                game,
                move_number,
                record.created_at.timestamp_millis(),
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.code == rusqlite::ErrorCode::ConstraintViolation {
                    return StoreError::Validation(format!("position {} already exists", record.id));
                }
            }
            StoreError::Storage(format!("insert position: {}", e))
        })?;
        let id = conn.last_insert_rowid();

        if let Some(analysis) = &record.analysis {
            conn.execute(
                "INSERT INTO analysis (position_id, payload) VALUES (?1, ?2)",
                params![id, serde_json::to_string(analysis)?],
            )?;
        }
        if let Some(comment) = &record.comment {
            conn.execute(
                "INSERT INTO comments (position_id, body) VALUES (?1, ?2)",
                params![id, comment],
            )?;
        }
        Self::write_tags(conn, id, &record.tags)?;
        Ok(id)
    }

    fn write_tags(conn: &Connection, id: PositionId, tags: &[String]) -> Result<()> {
        conn.execute("DELETE FROM position_tags WHERE position_id = ?1", [id])?;
        for tag in tags {
            conn.execute(
                "INSERT OR IGNORE INTO position_tags (position_id, tag_path) VALUES (?1, ?2)",
                params![id, tag],
            )?;
        }
        Ok(())
    }

    fn position_exists(conn: &Connection, id: PositionId) -> Result<bool> {
        let exists = conn
            .query_row("SELECT 1 FROM positions WHERE id = ?1", [id], |_| Ok(()))
            .optional()?
            .is_some();
        Ok(exists)
    }

    fn load_tags(conn: &Connection, id: PositionId) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT tag_path FROM position_tags WHERE position_id = ?1 ORDER BY tag_path")?;
        let tags = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(tags)
    }

    /// Tags of the positions selected by `where_clause`, keyed by position.
    fn load_tags_where(
        conn: &Connection,
        where_clause: &str,
        params: &[rusqlite::types::Value],
    ) -> Result<HashMap<PositionId, Vec<String>>> {
        let sql = format!(
            "SELECT t.position_id, t.tag_path FROM position_tags t
             JOIN positions p ON p.id = t.position_id
             LEFT JOIN analysis a ON a.position_id = p.id
             LEFT JOIN comments c ON c.position_id = p.id
             {} ORDER BY t.position_id, t.tag_path",
            where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut tags: HashMap<PositionId, Vec<String>> = HashMap::new();
        for (id, tag) in rows {
            tags.entry(id).or_default().push(tag);
        }
        Ok(tags)
    }

    /// Load rows for a query built on [`POSITION_COLUMNS`]. Rows whose state
    /// no longer decodes are skipped with a warning.
    fn load_records(
        conn: &Connection,
        where_clause: &str,
        params: Vec<rusqlite::types::Value>,
    ) -> Result<Vec<PositionRecord>> {
        let sql = format!("SELECT {} {}", POSITION_COLUMNS, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), PositionRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut tags = Self::load_tags_where(conn, where_clause, &params)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.decode(tags.remove(&id).unwrap_or_default()) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Failed to load position {}: {}", id, e),
            }
        }
        Ok(records)
    }
}

/// Raw columns of one position row
struct PositionRow {
    id: PositionId,
    state: String,
    created_ms: i64,
    match_id: Option<i64>,
    game: Option<u32>,
    move_number: Option<u32>,
    analysis: Option<String>,
    comment: Option<String>,
}

impl PositionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            state: row.get(1)?,
            created_ms: row.get(2)?,
            match_id: row.get(3)?,
            game: row.get(4)?,
            move_number: row.get(5)?,
            analysis: row.get(6)?,
            comment: row.get(7)?,
        })
    }

    fn decode(self, tags: Vec<String>) -> Result<PositionRecord> {
        let position: Position = serde_json::from_str(&self.state)?;
        let analysis: Option<Analysis> = self
            .analysis
            .map(|payload| serde_json::from_str(&payload))
            .transpose()?;
        let match_ref = match (self.match_id, self.game, self.move_number) {
            (Some(match_id), Some(game), Some(move_number)) => Some(MatchRef {
                match_id,
                game,
                move_number,
            }),
            _ => None,
        };
        Ok(PositionRecord {
            id: self.id,
            position,
            analysis,
            comment: self.comment,
            tags,
            created_at: from_millis(self.created_ms)?,
            match_ref,
        })
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Serialization(format!("timestamp out of range: {}", ms)))
}

impl PositionStore for SqliteStore {
    fn insert_position(&self, record: &PositionRecord) -> Result<PositionId> {
        let conn = self.conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Storage(format!("begin tx: {}", e)))?;
        let id = Self::insert_record(&tx, record)?;
        tx.commit()
            .map_err(|e| StoreError::Storage(format!("commit: {}", e)))?;
        Ok(id)
    }

    fn insert_positions(&self, records: &[PositionRecord]) -> Result<Vec<PositionId>> {
        let conn = self.conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Storage(format!("begin tx: {}", e)))?;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(Self::insert_record(&tx, record)?);
        }
        tx.commit()
            .map_err(|e| StoreError::Storage(format!("commit: {}", e)))?;
        info!(count = ids.len(), "Imported positions");
        Ok(ids)
    }

    fn get_position(&self, id: PositionId) -> Result<Option<PositionRecord>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} WHERE p.id = ?1", POSITION_COLUMNS);
        let row = conn
            .query_row(&sql, [id], PositionRow::from_row)
            .optional()?;
        match row {
            Some(row) => {
                let tags = Self::load_tags(&conn, id)?;
                row.decode(tags).map(Some)
            }
            None => Ok(None),
        }
    }

    fn all_positions(&self) -> Result<Vec<PositionRecord>> {
        let conn = self.conn()?;
        Self::load_records(&conn, "", Vec::new())
    }

    fn positions_matching(&self, prefilter: &Prefilter) -> Result<Vec<PositionRecord>> {
        let conn = self.conn()?;
        let sql = compile_prefilter(prefilter);
        debug!(clause = %sql.where_clause, "prefilter");
        Self::load_records(&conn, &sql.where_clause, sql.params)
    }

    fn position_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM positions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn set_tags(&self, id: PositionId, tags: &[String]) -> Result<()> {
        let conn = self.conn()?;
        if !Self::position_exists(&conn, id)? {
            return Err(StoreError::NotFound(format!("position {}", id)));
        }
        let tx = conn.unchecked_transaction()?;
        Self::write_tags(&tx, id, tags)?;
        tx.commit()?;
        Ok(())
    }

    fn set_comment(&self, id: PositionId, comment: Option<&str>) -> Result<()> {
        let conn = self.conn()?;
        if !Self::position_exists(&conn, id)? {
            return Err(StoreError::NotFound(format!("position {}", id)));
        }
        match comment {
            Some(body) => conn.execute(
                "INSERT OR REPLACE INTO comments (position_id, body) VALUES (?1, ?2)",
                params![id, body],
            )?,
            None => conn.execute("DELETE FROM comments WHERE position_id = ?1", [id])?,
        };
        Ok(())
    }
}

// ==================== Filter library ====================

/// Raw columns of one filter row
struct FilterRow {
    id: String,
    name: String,
    command: String,
    criteria: Option<String>,
    anchor: Option<String>,
    created_ms: i64,
    updated_ms: i64,
}

impl FilterRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            command: row.get(2)?,
            criteria: row.get(3)?,
            anchor: row.get(4)?,
            created_ms: row.get(5)?,
            updated_ms: row.get(6)?,
        })
    }

    fn decode(self) -> Result<SavedFilter> {
        let id = Uuid::parse_str(&self.id).map_err(|e| StoreError::Serialization(e.to_string()))?;
        // Filters saved before criteria were stored only have their command.
        let criteria: Vec<Criterion> = match self.criteria {
            Some(json) => serde_json::from_str(&json)?,
            None => parse_command(&self.command)
                .map_err(|e| StoreError::Validation(format!("filter {}: {}", id, e)))?
                .criteria,
        };
        let anchor: Option<Position> = self
            .anchor
            .map(|json| serde_json::from_str(&json))
            .transpose()?;
        Ok(SavedFilter {
            id,
            name: self.name,
            command: self.command,
            criteria,
            anchor,
            created_at: from_millis(self.created_ms)?,
            updated_at: from_millis(self.updated_ms)?,
        })
    }
}

impl FilterLibrary for SqliteStore {
    fn create_filter(&self, draft: FilterDraft) -> Result<SavedFilter> {
        let now = Utc::now();
        let filter = SavedFilter {
            id: Uuid::new_v4(),
            name: draft.name,
            command: draft.command,
            criteria: draft.criteria,
            anchor: draft.anchor,
            created_at: now,
            updated_at: now,
        };
        let anchor = filter.anchor.as_ref().map(serde_json::to_string).transpose()?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO filter_library (id, name, command, criteria, anchor, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                filter.id.to_string(),
                filter.name,
                filter.command,
                serde_json::to_string(&filter.criteria)?,
                anchor,
                filter.created_at.timestamp_millis(),
                filter.updated_at.timestamp_millis(),
            ],
        )
        .map_err(|e| StoreError::Storage(format!("insert filter: {}", e)))?;
        info!(id = %filter.id, name = %filter.name, "Saved filter");
        Ok(filter)
    }

    fn list_filters(&self) -> Result<Vec<SavedFilter>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} ORDER BY created_at, rowid", FILTER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], FilterRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut filters = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row.decode() {
                Ok(filter) => filters.push(filter),
                Err(e) => warn!("Failed to load filter {}: {}", id, e),
            }
        }
        Ok(filters)
    }

    fn get_filter(&self, id: Uuid) -> Result<Option<SavedFilter>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} WHERE id = ?1", FILTER_COLUMNS);
        conn.query_row(&sql, [id.to_string()], FilterRow::from_row)
            .optional()?
            .map(FilterRow::decode)
            .transpose()
    }

    fn update_filter(&self, id: Uuid, draft: FilterDraft) -> Result<SavedFilter> {
        let conn = self.conn()?;
        // Only the creation time survives, so a row that no longer decodes
        // can still be replaced.
        let created_ms: i64 = conn
            .query_row(
                "SELECT created_at FROM filter_library WHERE id = ?1",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("filter {}", id)))?;
        let filter = SavedFilter {
            id,
            name: draft.name,
            command: draft.command,
            criteria: draft.criteria,
            anchor: draft.anchor,
            created_at: from_millis(created_ms)?,
            updated_at: Utc::now(),
        };
        let anchor = filter.anchor.as_ref().map(serde_json::to_string).transpose()?;

        let changed = conn.execute(
            "UPDATE filter_library
             SET name = ?2, command = ?3, criteria = ?4, anchor = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                id.to_string(),
                filter.name,
                filter.command,
                serde_json::to_string(&filter.criteria)?,
                anchor,
                filter.updated_at.timestamp_millis(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("filter {}", id)));
        }
        info!(id = %id, name = %filter.name, "Updated filter");
        Ok(filter)
    }

    fn delete_filter(&self, id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM filter_library WHERE id = ?1", [id.to_string()])?;
        debug!(id = %id, removed, "delete filter");
        Ok(())
    }
}

// ==================== Search history ====================

fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, Option<String>, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_history(
    (id, command, position, timestamp_ms): (i64, String, Option<String>, i64),
) -> Result<HistoryEntry> {
    let position = position
        .map(|json| serde_json::from_str(&json))
        .transpose()?;
    Ok(HistoryEntry {
        id,
        command,
        position,
        timestamp_ms,
    })
}

impl SearchHistory for SqliteStore {
    fn append_history(&self, command: &str, position: Option<&Position>) -> Result<HistoryEntry> {
        let snapshot = position.map(serde_json::to_string).transpose()?;
        let conn = self.conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Storage(format!("begin tx: {}", e)))?;

        let last: Option<i64> =
            tx.query_row("SELECT MAX(timestamp_ms) FROM search_history", [], |row| row.get(0))?;
        let now = Utc::now().timestamp_millis();
        let timestamp_ms = match last {
            Some(last) if last >= now => last + 1,
            _ => now,
        };

        tx.execute(
            "INSERT INTO search_history (command, position, timestamp_ms) VALUES (?1, ?2, ?3)",
            params![command, snapshot, timestamp_ms],
        )?;
        let id = tx.last_insert_rowid();

        if let Some(keep) = self.history_retention {
            let pruned = tx.execute(
                "DELETE FROM search_history WHERE id NOT IN (
                     SELECT id FROM search_history ORDER BY timestamp_ms DESC, id DESC LIMIT ?1
                 )",
                [keep as i64],
            )?;
            if pruned > 0 {
                debug!(pruned, "pruned search history");
            }
        }
        tx.commit()
            .map_err(|e| StoreError::Storage(format!("commit: {}", e)))?;

        Ok(HistoryEntry {
            id,
            command: command.to_string(),
            position: position.cloned(),
            timestamp_ms,
        })
    }

    fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, command, position, timestamp_ms FROM search_history
             ORDER BY timestamp_ms DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([], row_to_history)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_history).collect()
    }

    fn get_history(&self, id: i64) -> Result<Option<HistoryEntry>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, command, position, timestamp_ms FROM search_history WHERE id = ?1",
            [id],
            row_to_history,
        )
        .optional()?
        .map(decode_history)
        .transpose()
    }

    fn clear_history(&self) -> Result<()> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM search_history", [])?;
        info!(removed, "Cleared search history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgdb_domain::{Cube, DecisionType, Score, Side};

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn fresh_database_has_current_schema() {
        assert_eq!(store().current_schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn insert_assigns_ids() {
        let store = store();
        let a = store
            .insert_position(&PositionRecord::new(0, Position::default()))
            .unwrap();
        let b = store
            .insert_position(&PositionRecord::new(0, Position::default()))
            .unwrap();
        assert!(b > a);
        let explicit = store
            .insert_position(&PositionRecord::new(100, Position::default()))
            .unwrap();
        assert_eq!(explicit, 100);
        assert_eq!(store.position_count().unwrap(), 3);
    }

    #[test]
    fn duplicate_id_rejected() {
        let store = store();
        store
            .insert_position(&PositionRecord::new(5, Position::default()))
            .unwrap();
        let err = store
            .insert_position(&PositionRecord::new(5, Position::default()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn position_round_trip() {
        let store = store();
        let record = PositionRecord::new(
            7,
            Position {
                cube: Cube::owned_by(Side::Player2, 4),
                score: Score::away(3, 5),
                decision_type: DecisionType::Cube,
                ..Position::default()
            },
        )
        .with_comment("prime vs prime")
        .with_tags(["opening/split", "blitz"])
        .with_match_ref(MatchRef {
            match_id: 3,
            game: 2,
            move_number: 14,
        });
        store.insert_position(&record).unwrap();

        let loaded = store.get_position(7).unwrap().unwrap();
        assert_eq!(loaded.position, record.position);
        assert_eq!(loaded.comment, record.comment);
        assert_eq!(loaded.tags, vec!["blitz".to_string(), "opening/split".to_string()]);
        assert_eq!(loaded.match_ref, record.match_ref);
        assert_eq!(
            loaded.created_at.timestamp_millis(),
            record.created_at.timestamp_millis()
        );
        assert!(store.get_position(8).unwrap().is_none());
    }

    #[test]
    fn tags_and_comments_replace() {
        let store = store();
        let id = store
            .insert_position(&PositionRecord::new(0, Position::default()).with_tags(["a"]))
            .unwrap();
        store.set_tags(id, &["b".to_string(), "c".to_string()]).unwrap();
        store.set_comment(id, Some("note")).unwrap();
        let loaded = store.get_position(id).unwrap().unwrap();
        assert_eq!(loaded.tags, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(loaded.comment.as_deref(), Some("note"));

        store.set_comment(id, None).unwrap();
        assert!(store.get_position(id).unwrap().unwrap().comment.is_none());
        assert!(store.set_tags(999, &[]).unwrap_err().is_not_found());
    }

    #[test]
    fn undecodable_rows_are_skipped() {
        let store = store();
        store
            .insert_position(&PositionRecord::new(1, Position::default()))
            .unwrap();
        {
            let conn = store.conn().unwrap();
            conn.execute(
                "INSERT INTO positions (id, state, decision_type, cube_value, away1, away2, created_at)
                 VALUES (2, '{broken', 'checker', 1, -1, -1, 0)",
                [],
            )
            .unwrap();
        }
        let all = store.all_positions().unwrap();
        assert_eq!(all.len(), 1);
        assert!(store.get_position(2).is_err());
    }

    #[test]
    fn corrupt_timestamp_is_a_decode_error() {
        let store = store();
        store
            .insert_positions(&[
                PositionRecord::new(1, Position::default()),
                PositionRecord::new(2, Position::default()),
            ])
            .unwrap();
        {
            let conn = store.conn().unwrap();
            conn.execute("UPDATE positions SET created_at = ?1 WHERE id = 2", [i64::MAX])
                .unwrap();
        }
        let err = store.get_position(2).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        let ids: Vec<PositionId> = store.all_positions().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn history_timestamps_strictly_increase() {
        let store = store();
        let entries: Vec<HistoryEntry> = (0..5)
            .map(|i| store.append_history(&format!("cv{}", i), None).unwrap())
            .collect();
        for pair in entries.windows(2) {
            assert!(pair[1].timestamp_ms > pair[0].timestamp_ms);
        }
    }
}
