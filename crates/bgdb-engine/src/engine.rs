//! Search engine: the single entry point front ends talk to.

use std::sync::{Arc, Mutex};

use bgdb_domain::{MatchEquityTable, Position, PositionRecord};
use bgdb_query::{
    compile, parse_command, CompileOptions, CompiledQuery, Criterion, Evaluator, Filter,
    Perspective, ResultOrder,
};
use bgdb_store::{
    FilterDraft, FilterLibrary, HistoryEntry, PositionStore, SavedFilter, SearchHistory,
    SqliteStore,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::session::{SearchSession, SearchTicket};

/// One search as issued by a front end.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Literal command text, recorded in history as typed
    pub command: String,
    /// Position on screen when the search was launched
    pub current: Option<Position>,
    /// Overrides the configured perspective
    pub perspective: Option<Perspective>,
    /// Overrides the configured order
    pub order: Option<ResultOrder>,
}

impl SearchRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn with_current(mut self, current: Option<Position>) -> Self {
        self.current = current;
        self
    }

    pub fn with_perspective(mut self, perspective: Perspective) -> Self {
        self.perspective = Some(perspective);
        self
    }

    pub fn with_order(mut self, order: ResultOrder) -> Self {
        self.order = Some(order);
        self
    }
}

/// Outcome of a completed search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub command: String,
    pub records: Vec<PositionRecord>,
    /// History entry recorded for this search
    pub history_id: i64,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.id).collect()
    }
}

/// Parses, compiles and evaluates searches against a store, and keeps the
/// filter library and search history.
pub struct SearchEngine<S> {
    store: S,
    config: EngineConfig,
    match_equity: Arc<MatchEquityTable>,
    session: SearchSession,
    /// Results of the last successful search
    last_results: Mutex<Option<SearchResults>>,
}

impl SearchEngine<SqliteStore> {
    /// Open the configured database, creating it if needed.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let path = config.database_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                bgdb_store::StoreError::Storage(format!("create {}: {}", parent.display(), e))
            })?;
        }
        let store = SqliteStore::open(&path)?.with_history_retention(Some(config.history.retention));
        info!(path = %path.display(), "Opened position database");
        Ok(Self::new(store, config))
    }
}

impl<S> SearchEngine<S>
where
    S: PositionStore + FilterLibrary + SearchHistory,
{
    /// Wrap an already opened store.
    ///
    /// History retention is the store's own setting; [`SearchEngine::open`]
    /// applies the configured one.
    pub fn new(store: S, config: EngineConfig) -> Self {
        let match_equity = Arc::new(config.match_equity.table());
        Self {
            store,
            config,
            match_equity,
            session: SearchSession::new(),
            last_results: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    /// Results of the last search that completed, if any.
    ///
    /// Failed and superseded searches leave this untouched.
    pub fn last_results(&self) -> Option<SearchResults> {
        self.last_results.lock().ok().and_then(|last| last.clone())
    }

    // ==================== Searching ====================

    /// Parse a command without running it.
    pub fn parse(&self, command: &str) -> Result<Filter> {
        Ok(parse_command(command)?)
    }

    /// Run a search as the newest request of the session.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let ticket = self.session.begin();
        self.search_as(&ticket, request)
    }

    /// Run a search under a ticket obtained from [`SearchSession::begin`].
    ///
    /// Returns [`EngineError::Superseded`] if a newer search begins before this
    /// one commits. Only a search that commits records history.
    pub fn search_as(&self, ticket: &SearchTicket, request: &SearchRequest) -> Result<SearchResults> {
        let filter = parse_command(&request.command)?;
        self.execute(
            ticket,
            &request.command,
            &filter.criteria,
            request.current.as_ref(),
            request.current.clone(),
            request.perspective,
            request.order,
        )
    }

    /// Run a saved filter.
    ///
    /// The stored criteria are compiled as saved. The filter's own anchor takes
    /// precedence over `current` for `cp`.
    pub fn run_filter(&self, id: Uuid, current: Option<&Position>) -> Result<SearchResults> {
        let filter = self
            .store
            .get_filter(id)?
            .ok_or_else(|| EngineError::NotFound(format!("filter {}", id)))?;
        let anchor = filter.anchor.clone().or_else(|| current.cloned());
        let ticket = self.session.begin();
        self.execute(
            &ticket,
            &filter.command,
            &filter.criteria,
            current,
            anchor,
            None,
            None,
        )
    }

    /// Re-run a history entry with its recorded position as the anchor.
    pub fn replay(&self, history_id: i64) -> Result<SearchResults> {
        let entry = self
            .store
            .get_history(history_id)?
            .ok_or_else(|| EngineError::NotFound(format!("history entry {}", history_id)))?;
        let request = SearchRequest::new(entry.command).with_current(entry.position);
        self.search(&request)
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        ticket: &SearchTicket,
        command: &str,
        criteria: &[Criterion],
        snapshot: Option<&Position>,
        anchor: Option<Position>,
        perspective: Option<Perspective>,
        order: Option<ResultOrder>,
    ) -> Result<SearchResults> {
        let options = CompileOptions::new()
            .with_perspective(perspective.unwrap_or(self.config.search.perspective))
            .with_order(order.unwrap_or(self.config.search.order))
            .with_anchor(anchor)
            .with_match_equity(Arc::clone(&self.match_equity));
        let query = compile(criteria, &options)?;

        let corpus = self.load_corpus(&query)?;
        let scanned = corpus.len();
        let records = Evaluator::new(&query)
            .evaluate_cancellable(corpus, || !self.session.is_current(ticket))?;
        debug!(command, scanned, matched = records.len(), "Evaluated search");

        let results = self.session.commit(ticket, || {
            let entry = self.store.append_history(command, snapshot)?;
            let results = SearchResults {
                command: command.to_string(),
                records,
                history_id: entry.id,
            };
            let mut last = self
                .last_results
                .lock()
                .map_err(|e| EngineError::Internal(e.to_string()))?;
            *last = Some(results.clone());
            Ok(results)
        })?;

        info!(
            command,
            matched = results.len(),
            history_id = results.history_id,
            "Search completed"
        );
        Ok(results)
    }

    fn load_corpus(&self, query: &CompiledQuery) -> Result<Vec<PositionRecord>> {
        let prefilter = query.prefilter();
        if self.config.search.use_prefilter && !prefilter.is_empty() {
            Ok(self.store.positions_matching(prefilter)?)
        } else {
            Ok(self.store.all_positions()?)
        }
    }

    // ==================== Filter Library ====================

    /// Validate `command` and save it under `name`.
    pub fn save_filter(
        &self,
        name: &str,
        command: &str,
        anchor: Option<Position>,
    ) -> Result<SavedFilter> {
        let filter = parse_command(command)?;
        check_compiles(&filter.criteria, anchor.as_ref())?;
        let saved = self
            .store
            .create_filter(FilterDraft::new(name, command, filter.criteria).with_anchor(anchor))?;
        Ok(saved)
    }

    /// Replace name, command and anchor of a saved filter.
    pub fn update_filter(
        &self,
        id: Uuid,
        name: &str,
        command: &str,
        anchor: Option<Position>,
    ) -> Result<SavedFilter> {
        let filter = parse_command(command)?;
        check_compiles(&filter.criteria, anchor.as_ref())?;
        let saved = self
            .store
            .update_filter(id, FilterDraft::new(name, command, filter.criteria).with_anchor(anchor))?;
        Ok(saved)
    }

    /// Remove a saved filter. Unknown ids are not an error.
    pub fn delete_filter(&self, id: Uuid) -> Result<()> {
        Ok(self.store.delete_filter(id)?)
    }

    pub fn get_filter(&self, id: Uuid) -> Result<Option<SavedFilter>> {
        Ok(self.store.get_filter(id)?)
    }

    pub fn list_filters(&self) -> Result<Vec<SavedFilter>> {
        Ok(self.store.list_filters()?)
    }

    // ==================== Search History ====================

    /// History entries, most recent first.
    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.store.list_history()?)
    }

    pub fn clear_history(&self) -> Result<()> {
        Ok(self.store.clear_history()?)
    }

    // ==================== Corpus ====================

    /// Add positions to the corpus. Records with id 0 get a fresh id.
    pub fn import_positions(&self, records: &[PositionRecord]) -> Result<Vec<i64>> {
        Ok(self.store.insert_positions(records)?)
    }

    pub fn position_count(&self) -> Result<usize> {
        Ok(self.store.position_count()?)
    }
}

/// Reject criteria that could never run.
///
/// `cp` without an anchor is allowed here since a later run may supply the
/// current position.
fn check_compiles(criteria: &[Criterion], anchor: Option<&Position>) -> Result<()> {
    let anchor = anchor.cloned().or_else(|| {
        criteria
            .iter()
            .any(|c| c.field == bgdb_query::Field::AnchorCheckers)
            .then(Position::default)
    });
    compile(criteria, &CompileOptions::new().with_anchor(anchor))?;
    Ok(())
}
