//! Filter evaluator: run a compiled query over a corpus.

use std::cmp::Ordering;

use bgdb_domain::PositionRecord;
use tracing::debug;

use crate::compiler::{CompiledQuery, SortKey};
use crate::error::EvalError;

/// Rows between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Applies a compiled query to a sequence of records
pub struct Evaluator<'q> {
    query: &'q CompiledQuery,
}

impl<'q> Evaluator<'q> {
    pub fn new(query: &'q CompiledQuery) -> Self {
        Self { query }
    }

    /// Matching records in the query's order. The corpus may come in any order.
    pub fn evaluate<I>(&self, corpus: I) -> Vec<PositionRecord>
    where
        I: IntoIterator<Item = PositionRecord>,
    {
        let mut matches: Vec<PositionRecord> = corpus
            .into_iter()
            .filter(|r| self.query.matches(r))
            .collect();
        sort_records(&mut matches, self.query.sort_keys());
        matches
    }

    /// Like [`evaluate`](Self::evaluate), giving up once `is_cancelled`
    /// returns true. Nothing partial is returned.
    pub fn evaluate_cancellable<I, C>(
        &self,
        corpus: I,
        is_cancelled: C,
    ) -> Result<Vec<PositionRecord>, EvalError>
    where
        I: IntoIterator<Item = PositionRecord>,
        C: Fn() -> bool,
    {
        let mut matches = Vec::new();
        let mut scanned = 0usize;
        for record in corpus {
            if scanned % CANCEL_CHECK_INTERVAL == 0 && is_cancelled() {
                debug!(scanned, "evaluation cancelled");
                return Err(EvalError::Cancelled);
            }
            scanned += 1;
            if self.query.matches(&record) {
                matches.push(record);
            }
        }
        if is_cancelled() {
            return Err(EvalError::Cancelled);
        }
        debug!(scanned, matched = matches.len(), "evaluated query");
        sort_records(&mut matches, self.query.sort_keys());
        Ok(matches)
    }

    /// Number of matching records
    pub fn count<'a, I>(&self, corpus: I) -> usize
    where
        I: IntoIterator<Item = &'a PositionRecord>,
    {
        corpus.into_iter().filter(|r| self.query.matches(r)).count()
    }
}

/// Sort records by `keys`. Records without a match reference sort after
/// those with one for the match keys.
pub fn sort_records(records: &mut [PositionRecord], keys: &[SortKey]) {
    records.sort_by(|a, b| {
        keys.iter()
            .fold(Ordering::Equal, |acc, key| acc.then_with(|| compare(key, a, b)))
    });
}

fn compare(key: &SortKey, a: &PositionRecord, b: &PositionRecord) -> Ordering {
    let by_match = |pick: fn(&bgdb_domain::MatchRef) -> i64| {
        let rank = |r: &PositionRecord| (r.match_ref.is_none(), r.match_ref.as_ref().map(pick));
        rank(a).cmp(&rank(b))
    };
    match key {
        SortKey::MatchId => by_match(|m| m.match_id),
        SortKey::Game => by_match(|m| m.game as i64),
        SortKey::MoveNumber => by_match(|m| m.move_number as i64),
        SortKey::Id => a.id.cmp(&b.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, CompileOptions, ResultOrder};
    use crate::parser::parse_command;
    use bgdb_domain::{Board, Cube, MatchRef, Position, Side};
    use std::cell::Cell;

    fn compiled(command: &str, order: ResultOrder) -> CompiledQuery {
        let filter = parse_command(command).unwrap();
        compile(&filter.criteria, &CompileOptions::default().with_order(order)).unwrap()
    }

    fn cube_at(id: i64, value: u32) -> PositionRecord {
        PositionRecord::new(
            id,
            Position {
                cube: Cube::owned_by(Side::Player1, value),
                ..Position::default()
            },
        )
    }

    fn corpus() -> Vec<PositionRecord> {
        vec![
            cube_at(7, 2),
            cube_at(3, 4),
            cube_at(9, 2).with_match_ref(MatchRef {
                match_id: 1,
                game: 2,
                move_number: 5,
            }),
            cube_at(1, 2).with_match_ref(MatchRef {
                match_id: 1,
                game: 2,
                move_number: 1,
            }),
            cube_at(4, 2).with_match_ref(MatchRef {
                match_id: 1,
                game: 1,
                move_number: 9,
            }),
        ]
    }

    fn ids(records: &[PositionRecord]) -> Vec<i64> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn ascending_id_by_default() {
        let query = compiled("cv2", ResultOrder::Id);
        let result = Evaluator::new(&query).evaluate(corpus());
        assert_eq!(ids(&result), vec![1, 4, 7, 9]);
    }

    #[test]
    fn match_chronological_order() {
        let query = compiled("cv2", ResultOrder::MatchChronological);
        let result = Evaluator::new(&query).evaluate(corpus());
        assert_eq!(ids(&result), vec![4, 1, 9, 7]);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let query = compiled("cv>=2", ResultOrder::Id);
        let evaluator = Evaluator::new(&query);
        let first = evaluator.evaluate(corpus());
        let mut reversed = corpus();
        reversed.reverse();
        let second = evaluator.evaluate(reversed);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn empty_corpus_and_no_match_are_empty() {
        let query = compiled("cv64", ResultOrder::Id);
        let evaluator = Evaluator::new(&query);
        assert!(evaluator.evaluate(Vec::new()).is_empty());
        assert!(evaluator.evaluate(corpus()).is_empty());
        assert_eq!(evaluator.count(&corpus()), 0);
    }

    #[test]
    fn cancellation_returns_nothing() {
        let query = compiled("cv2", ResultOrder::Id);
        let evaluator = Evaluator::new(&query);
        assert_eq!(
            evaluator.evaluate_cancellable(corpus(), || true),
            Err(EvalError::Cancelled)
        );
        let ok = evaluator.evaluate_cancellable(corpus(), || false).unwrap();
        assert_eq!(ids(&ok), vec![1, 4, 7, 9]);
    }

    #[test]
    fn cancellation_checked_during_scan() {
        let query = compiled("nc", ResultOrder::Id);
        let evaluator = Evaluator::new(&query);
        let polls = Cell::new(0);
        let large = (0..1000).map(|id| PositionRecord::new(id, Position::with_board(Board::starting())));
        let result = evaluator.evaluate_cancellable(large, || {
            polls.set(polls.get() + 1);
            polls.get() > 2
        });
        assert_eq!(result, Err(EvalError::Cancelled));
    }
}
