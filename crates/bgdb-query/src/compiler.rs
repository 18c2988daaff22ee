//! Query compiler
//!
//! Each criterion compiles on its own into a matcher; a record matches when
//! every matcher accepts it. Board patterns compile into matchers that take
//! the queried side as a parameter, so one compiled query can be asked from
//! the player on roll only or from either side of the board.

use std::fmt;
use std::sync::Arc;

use bgdb_domain::{tag_matches, Chances, Dice, MatchEquityTable, Position, PositionRecord, Side};
use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::criteria::{
    BoardPattern, Criterion, DateBound, Field, Operator, PatternTarget, Value,
};
use crate::error::CompileError;
use crate::prefilter::Prefilter;

/// Which side board patterns are asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    /// The player on roll
    #[default]
    OnRoll,
    /// The player on roll, or failing that the other side
    Either,
}

/// Result ordering requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    /// Ascending position id
    #[default]
    Id,
    /// Match, game and move order; positions outside a match follow by id
    MatchChronological,
}

/// One tie-break key of the result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    MatchId,
    Game,
    MoveNumber,
    Id,
}

impl ResultOrder {
    /// Sort keys applied in order; always ends with [`SortKey::Id`].
    pub fn sort_keys(&self) -> &'static [SortKey] {
        match self {
            ResultOrder::Id => &[SortKey::Id],
            ResultOrder::MatchChronological => &[
                SortKey::MatchId,
                SortKey::Game,
                SortKey::MoveNumber,
                SortKey::Id,
            ],
        }
    }
}

/// Context a query is compiled in
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub perspective: Perspective,
    pub order: ResultOrder,
    /// Position `cp` compares against, usually the one on screen
    pub anchor: Option<Position>,
    pub match_equity: Arc<MatchEquityTable>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            perspective: Perspective::default(),
            order: ResultOrder::default(),
            anchor: None,
            match_equity: Arc::new(MatchEquityTable::default()),
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_perspective(mut self, perspective: Perspective) -> Self {
        self.perspective = perspective;
        self
    }

    pub fn with_order(mut self, order: ResultOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_anchor(mut self, anchor: Option<Position>) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_match_equity(mut self, table: Arc<MatchEquityTable>) -> Self {
        self.match_equity = table;
        self
    }
}

/// Test on a whole record
pub type Matcher = Box<dyn Fn(&PositionRecord) -> bool + Send + Sync>;

/// Test on a position as seen by the given side
pub type BoardMatcher = Box<dyn Fn(&Position, Side) -> bool + Send + Sync>;

type Source = Box<dyn Fn(&PositionRecord) -> Option<f64> + Send + Sync>;

/// An executable conjunction of criteria
pub struct CompiledQuery {
    matchers: Vec<Matcher>,
    board_matchers: Vec<BoardMatcher>,
    perspective: Perspective,
    sort_keys: &'static [SortKey],
    prefilter: Prefilter,
}

impl CompiledQuery {
    /// True when every criterion accepts the record.
    pub fn matches(&self, record: &PositionRecord) -> bool {
        if !self.matchers.iter().all(|m| m(record)) {
            return false;
        }
        if self.board_matchers.is_empty() {
            return true;
        }
        let position = &record.position;
        self.queried_sides(position)
            .any(|side| self.board_matchers.iter().all(|m| m(position, side)))
    }

    fn queried_sides(&self, position: &Position) -> impl Iterator<Item = Side> {
        let on_roll = position.player_on_roll;
        let other = match self.perspective {
            Perspective::OnRoll => None,
            Perspective::Either => Some(on_roll.opponent()),
        };
        std::iter::once(on_roll).chain(other)
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    pub fn sort_keys(&self) -> &'static [SortKey] {
        self.sort_keys
    }

    pub fn prefilter(&self) -> &Prefilter {
        &self.prefilter
    }

    /// Number of compiled matchers
    pub fn len(&self) -> usize {
        self.matchers.len() + self.board_matchers.len()
    }

    /// True for the empty filter, which matches every record
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("matchers", &self.matchers.len())
            .field("board_matchers", &self.board_matchers.len())
            .field("perspective", &self.perspective)
            .field("sort_keys", &self.sort_keys)
            .field("prefilter", &self.prefilter)
            .finish()
    }
}

/// Compile a criteria list into a query.
pub fn compile(
    criteria: &[Criterion],
    options: &CompileOptions,
) -> Result<CompiledQuery, CompileError> {
    let mut matchers: Vec<Matcher> = Vec::new();
    let mut board_matchers: Vec<BoardMatcher> = Vec::new();

    for criterion in criteria {
        if !criterion.is_well_formed() {
            return Err(CompileError::Malformed(criterion.to_string()));
        }
        match criterion.field {
            Field::AnchorCheckers => board_matchers.push(anchor_matcher(criterion, options)?),
            field if field.zone().is_some() || field == Field::Point => {
                board_matchers.push(pattern_matcher(criterion)?)
            }
            _ => matchers.push(record_matcher(criterion, options)?),
        }
    }

    debug!(
        criteria = criteria.len(),
        board = board_matchers.len(),
        perspective = ?options.perspective,
        "compiled query"
    );

    Ok(CompiledQuery {
        matchers,
        board_matchers,
        perspective: options.perspective,
        sort_keys: options.order.sort_keys(),
        prefilter: Prefilter::from_criteria(criteria),
    })
}

fn malformed(criterion: &Criterion) -> CompileError {
    CompileError::Malformed(criterion.to_string())
}

fn record_matcher(
    criterion: &Criterion,
    options: &CompileOptions,
) -> Result<Matcher, CompileError> {
    let field = criterion.field;
    if field.value_type().is_numeric() {
        let test = NumericTest::from_criterion(criterion)?;
        let source = numeric_source(field, Arc::clone(&options.match_equity));
        return Ok(Box::new(move |record: &PositionRecord| {
            source(record).map_or(false, |actual| test.accepts(actual))
        }));
    }

    match field {
        Field::Date => {
            let test = DateTest::from_criterion(criterion)?;
            Ok(Box::new(move |record: &PositionRecord| {
                test.accepts(record.created_at.date_naive())
            }))
        }
        Field::DecisionType => {
            let wanted = collect(criterion, |v| match v {
                Value::Decision(d) => Some(*d),
                _ => None,
            })?;
            Ok(Box::new(move |record: &PositionRecord| {
                wanted.contains(&record.position.decision_type)
            }))
        }
        Field::CubeOwner => {
            let wanted = collect(criterion, |v| match v {
                Value::CubeOwner(owner) => Some(*owner),
                _ => None,
            })?;
            Ok(Box::new(move |record: &PositionRecord| {
                wanted.contains(&record.position.cube.owner)
            }))
        }
        Field::Dice => {
            let wanted: Vec<Dice> = collect(criterion, |v| match v {
                Value::Dice(d) => Some(*d),
                _ => None,
            })?;
            Ok(Box::new(move |record: &PositionRecord| {
                wanted.iter().any(|d| d.same_roll(&record.position.dice))
            }))
        }
        Field::Comment => {
            let pattern = text_pattern(criterion, true)?;
            Ok(Box::new(move |record: &PositionRecord| {
                record
                    .comment
                    .as_deref()
                    .map_or(false, |c| pattern.is_match(c))
            }))
        }
        Field::MovePattern => {
            let pattern = text_pattern(criterion, false)?;
            Ok(Box::new(move |record: &PositionRecord| {
                record.analysis.as_ref().map_or(false, |a| {
                    a.move_texts().iter().any(|m| pattern.is_match(m))
                })
            }))
        }
        Field::Tag => {
            let wanted: Vec<String> = collect(criterion, |v| match v {
                Value::Text(t) => Some(t.clone()),
                _ => None,
            })?;
            Ok(Box::new(move |record: &PositionRecord| {
                wanted.iter().any(|t| tag_matches(&record.tags, t))
            }))
        }
        Field::NoContact => Ok(Box::new(|record: &PositionRecord| {
            !record.position.board.has_contact()
        })),
        _ => Err(malformed(criterion)),
    }
}

/// Values of a single-value or set criterion, extracted with `pick`.
fn collect<T, F>(criterion: &Criterion, pick: F) -> Result<Vec<T>, CompileError>
where
    F: Fn(&Value) -> Option<T>,
{
    let values: Vec<&Value> = match &criterion.value {
        Value::Set(items) => items.iter().collect(),
        single => vec![single],
    };
    values
        .into_iter()
        .map(|v| pick(v).ok_or_else(|| malformed(criterion)))
        .collect()
}

fn source<F>(f: F) -> Source
where
    F: Fn(&PositionRecord) -> Option<f64> + Send + Sync + 'static,
{
    Box::new(f)
}

fn chance(side: Side, pick: fn(&Chances) -> f64) -> Source {
    source(move |r| r.analysis.as_ref()?.chances(side).map(|c| pick(&c)))
}

fn takepoint(taker: Side, met: Arc<MatchEquityTable>) -> Source {
    source(move |r| {
        let position = &r.position;
        r.analysis
            .as_ref()?
            .takepoint(taker, &position.score, position.cube.value, &met)
    })
}

/// Where a numeric field reads its value from. `None` means the record
/// carries no such quantity and cannot match.
fn numeric_source(field: Field, met: Arc<MatchEquityTable>) -> Source {
    use Side::{Player1, Player2};

    match field {
        Field::PipDifference => source(|r| Some(r.position.pip_difference() as f64)),
        Field::Pips1 => source(|r| Some(r.position.pip_count(Player1) as f64)),
        Field::Pips2 => source(|r| Some(r.position.pip_count(Player2) as f64)),
        Field::CubeValue => source(|r| Some(r.position.cube.value as f64)),
        Field::Away1 => source(|r| r.position.score.away_for(Player1).map(f64::from)),
        Field::Away2 => source(|r| r.position.score.away_for(Player2).map(f64::from)),
        Field::MatchWinningChance => {
            source(move |r| met.winning_chance(&r.position.score, Player1))
        }
        Field::Takepoint1 => takepoint(Player1, met),
        Field::Takepoint2 => takepoint(Player2, met),
        Field::Win1 => chance(Player1, |c| c.win),
        Field::Win2 => chance(Player2, |c| c.win),
        Field::Gammon1 => chance(Player1, |c| c.gammon),
        Field::Gammon2 => chance(Player2, |c| c.gammon),
        Field::Backgammon1 => chance(Player1, |c| c.backgammon),
        Field::Backgammon2 => chance(Player2, |c| c.backgammon),
        Field::Equity => source(|r| r.analysis.as_ref()?.best_equity().map(|e| e as f64)),
        Field::MoveError => source(|r| r.analysis.as_ref()?.played_error().map(|e| e as f64)),
        Field::OutfieldBlots1 => source(|r| Some(r.position.board.blots(Player1, 7..=18) as f64)),
        Field::OutfieldBlots2 => source(|r| Some(r.position.board.blots(Player2, 7..=18) as f64)),
        Field::HomeBlots1 => source(|r| Some(r.position.board.blots(Player1, 1..=6) as f64)),
        Field::HomeBlots2 => source(|r| Some(r.position.board.blots(Player2, 1..=6) as f64)),
        Field::PositionId => source(|r| Some(r.id as f64)),
        _ => source(|_| None),
    }
}

/// Comparison of a derived quantity against an integer threshold.
///
/// Percentages are continuous, so `=` and ranges compare the rounded value.
#[derive(Debug, Clone, Copy)]
struct NumericTest {
    op: Operator,
    lo: i64,
    hi: i64,
}

impl NumericTest {
    fn from_criterion(criterion: &Criterion) -> Result<Self, CompileError> {
        match (&criterion.value, criterion.op) {
            (Value::Range(lo, hi), Operator::Range) => Ok(Self::range(*lo, *hi)),
            (Value::Integer(n), op) => Ok(Self::compare(op, *n)),
            _ => Err(malformed(criterion)),
        }
    }

    fn compare(op: Operator, n: i64) -> Self {
        Self { op, lo: n, hi: n }
    }

    fn range(lo: i64, hi: i64) -> Self {
        Self {
            op: Operator::Range,
            lo,
            hi,
        }
    }

    fn accepts(&self, actual: f64) -> bool {
        match self.op {
            Operator::Range => {
                let rounded = actual.round();
                rounded >= self.lo as f64 && rounded <= self.hi as f64
            }
            Operator::Eq => actual.round() == self.lo as f64,
            op => op.compare(actual, self.lo as f64),
        }
    }
}

/// Date comparison against whole calendar periods.
///
/// `da=2024/03` covers all of March; `da>2024/03` starts in April.
#[derive(Debug, Clone, Copy)]
struct DateTest {
    op: Operator,
    first: NaiveDate,
    last: NaiveDate,
}

impl DateTest {
    fn from_criterion(criterion: &Criterion) -> Result<Self, CompileError> {
        let span = |from: &DateBound, to: &DateBound| -> Option<(NaiveDate, NaiveDate)> {
            Some((from.first_day()?, to.last_day()?))
        };
        let (first, last) = match &criterion.value {
            Value::Date(d) => span(d, d),
            Value::DateRange(a, b) => span(a, b),
            _ => None,
        }
        .ok_or_else(|| malformed(criterion))?;
        Ok(Self {
            op: criterion.op,
            first,
            last,
        })
    }

    fn accepts(&self, date: NaiveDate) -> bool {
        match self.op {
            Operator::Eq | Operator::Range => date >= self.first && date <= self.last,
            Operator::Gt => date > self.last,
            Operator::Ge => date >= self.first,
            Operator::Lt => date < self.first,
            Operator::Le => date <= self.last,
            _ => false,
        }
    }
}

/// Case-insensitive substring match; `*` matches any run of characters.
///
/// With `alternatives`, `;` separates terms and a hit on any one of them
/// matches. Empty terms are ignored.
fn text_pattern(criterion: &Criterion, alternatives: bool) -> Result<Regex, CompileError> {
    let text = match &criterion.value {
        Value::Text(t) => t,
        _ => return Err(malformed(criterion)),
    };
    let mut terms: Vec<&str> = if alternatives {
        text.split(';').filter(|term| !term.is_empty()).collect()
    } else {
        Vec::new()
    };
    if terms.is_empty() {
        terms.push(text.as_str());
    }
    let pattern = terms
        .iter()
        .map(|term| {
            let parts: Vec<String> = term.split('*').map(regex::escape).collect();
            format!("(?:{})", parts.join(".*"))
        })
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| CompileError::TextPattern {
            pattern: text.clone(),
            reason: e.to_string(),
        })
}

fn pattern_matcher(criterion: &Criterion) -> Result<BoardMatcher, CompileError> {
    let pattern: BoardPattern = match &criterion.value {
        Value::Pattern(p) => *p,
        _ => return Err(malformed(criterion)),
    };
    let test = match (criterion.op, pattern.upper) {
        (Operator::Range, Some(hi)) => NumericTest::range(pattern.count, hi),
        (op, _) => NumericTest::compare(op, pattern.count),
    };

    Ok(Box::new(move |position: &Position, queried: Side| {
        let board = &position.board;
        let owner = pattern.owner.resolve(queried);
        // Point numbers are the queried side's; the count is the owner's checkers there.
        let on_point = |n: usize| board.points[queried.board_index(n)].held_by(owner) as f64;
        match pattern.target {
            PatternTarget::Zone(zone) => test.accepts(board.zone_count(owner, zone) as f64),
            PatternTarget::Point(n) => test.accepts(on_point(n)),
            PatternTarget::Points(a, b) => test.accepts((a..=b).map(on_point).sum()),
            PatternTarget::AnyPoint => (1..=24).any(|n| test.accepts(on_point(n))),
        }
    }))
}

fn anchor_matcher(
    criterion: &Criterion,
    options: &CompileOptions,
) -> Result<BoardMatcher, CompileError> {
    let anchor = options
        .anchor
        .as_ref()
        .ok_or_else(|| CompileError::MissingAnchor(criterion.to_string()))?
        .normalized()
        .board;

    Ok(Box::new(move |position: &Position, queried: Side| match queried {
        Side::Player1 => position.board.contains(&anchor),
        Side::Player2 => position.board.mirrored().contains(&anchor),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_command;
    use bgdb_domain::{
        Analysis, Board, CheckerAnalysis, CheckerMove, Cube, CubeAnalysis, DecisionType, Score,
    };
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn query(command: &str) -> CompiledQuery {
        query_with(command, &CompileOptions::default())
    }

    fn query_with(command: &str, options: &CompileOptions) -> CompiledQuery {
        let filter = parse_command(command).unwrap();
        compile(&filter.criteria, options).unwrap()
    }

    fn record(position: Position) -> PositionRecord {
        PositionRecord::new(1, position)
    }

    fn bar_record(on_bar: u8) -> PositionRecord {
        let board = Board::empty()
            .with(Side::Player1, 25, on_bar)
            .unwrap()
            .with(Side::Player1, 6, 15 - on_bar)
            .unwrap()
            .with(Side::Player2, 6, 15)
            .unwrap();
        record(Position::with_board(board))
    }

    fn cube_record(away: Score, doubler: Chances, taker: Chances) -> PositionRecord {
        let analysis = Analysis {
            cube: Some(CubeAnalysis {
                player1: doubler,
                player2: taker,
                no_double: 400,
                double_take: 600,
                double_pass: 1000,
            }),
            ..Analysis::default()
        };
        let position = Position {
            score: away,
            decision_type: DecisionType::Cube,
            ..Position::default()
        };
        record(position).with_analysis(analysis)
    }

    #[rstest]
    #[case(2, false)]
    #[case(3, true)]
    #[case(4, false)]
    fn bar_count_is_exact(#[case] on_bar: u8, #[case] expected: bool) {
        assert_eq!(query("b3").matches(&bar_record(on_bar)), expected);
    }

    #[test]
    fn match_score_and_takepoint() {
        let doubler = Chances::new(70.0, 60.0, 20.0);
        let taker = Chances::new(30.0, 0.0, 0.0);
        let leading = cube_record(Score::away(2, 5), doubler, taker);
        let trailing = cube_record(Score::away(5, 2), doubler, taker);

        let q = query("sc>60 tp2<20");
        assert!(q.matches(&leading));
        assert!(!q.matches(&trailing));
    }

    #[test]
    fn takepoint_depends_on_the_score() {
        let doubler = Chances::new(70.0, 60.0, 20.0);
        let taker = Chances::new(30.0, 0.0, 0.0);
        let money = cube_record(Score::money(), doubler, taker);
        let trailing_taker = cube_record(Score::away(2, 5), doubler, taker);

        // Money: gammons push the take to about 52%.
        assert!(query("tp2=52").matches(&money));
        // 5-away facing 2-away: the take needs about 17%.
        assert!(query("tp2=17").matches(&trailing_taker));
        assert!(!query("tp2>50").matches(&trailing_taker));

        let mut redoubled = trailing_taker.clone();
        redoubled.position.cube.value = 2;
        assert!(!query("tp2=17").matches(&redoubled));
    }

    #[test]
    fn analysis_fields_need_analysis() {
        let plain = record(Position::default());
        assert!(!query("w1>0").matches(&plain));
        assert!(!query("tp2>=0").matches(&plain));
        assert!(!query("eq>-5000").matches(&plain));
    }

    #[test]
    fn money_play_has_no_away_score() {
        let money = record(Position::default());
        assert!(!query("s1<30").matches(&money));
        assert!(!query("sc>=0").matches(&money));
    }

    #[rstest]
    #[case("pd=0", true)]
    #[case("pip1=167", true)]
    #[case("pip2>167", false)]
    #[case("pd-5,5", true)]
    #[case("cv1", true)]
    #[case("cv>1", false)]
    #[case("co=center", true)]
    #[case("co:p1,p2", false)]
    #[case("dt=checker", true)]
    #[case("dt=cube", false)]
    #[case("bh1=0", true)]
    #[case("nc", false)]
    fn starting_position(#[case] command: &str, #[case] expected: bool) {
        let start = record(Position::default());
        assert_eq!(query(command).matches(&start), expected, "{command}");
    }

    #[test]
    fn percent_equality_rounds() {
        let rec = cube_record(
            Score::money(),
            Chances::new(59.6, 10.0, 0.0),
            Chances::new(40.4, 5.0, 0.0),
        );
        assert!(query("w1=60").matches(&rec));
        assert!(query("w1>59").matches(&rec));
        assert!(!query("w1>=60").matches(&rec));
    }

    #[rstest]
    #[case("w1=60", true)]
    #[case("w160,60", true)]
    #[case("w1=60,61", true)]
    #[case("w155,59", false)]
    #[case("w1=61,70", false)]
    fn percent_ranges_round_like_equality(#[case] command: &str, #[case] expected: bool) {
        let rec = cube_record(
            Score::money(),
            Chances::new(59.6, 10.0, 0.0),
            Chances::new(40.4, 5.0, 0.0),
        );
        assert_eq!(query(command).matches(&rec), expected, "{command}");
    }

    #[test]
    fn dice_match_either_order() {
        let rec = record(Position {
            dice: Dice(3, 1),
            ..Position::default()
        });
        assert!(query("di13").matches(&rec));
        assert!(query("di:42,31").matches(&rec));
        assert!(!query("di64").matches(&rec));
    }

    #[test]
    fn cube_owner_sets() {
        let rec = record(Position {
            cube: Cube::owned_by(Side::Player2, 2),
            ..Position::default()
        });
        assert!(query("co:center,p2").matches(&rec));
        assert!(!query("co=p1").matches(&rec));
    }

    #[test]
    fn text_is_case_insensitive_with_wildcards() {
        let rec = record(Position::default()).with_comment("Classic Prime vs Prime battle");
        assert!(query("t:prime").matches(&rec));
        assert!(query("t:classic*battle").matches(&rec));
        assert!(query("t:prime t:battle").matches(&rec));
        assert!(!query("t:prime t:blitz").matches(&rec));
        assert!(!query("t:prime").matches(&record(Position::default())));
        assert!(query("t:\"vs prime\"").matches(&rec));
    }

    #[test]
    fn comment_alternatives_match_any_term() {
        let prime = record(Position::default()).with_comment("Classic Prime vs Prime battle");
        let blitz = record(Position::default()).with_comment("failed BLITZ");
        let race = record(Position::default()).with_comment("pure race");

        let q = query("t:prime;blitz");
        assert!(q.matches(&prime));
        assert!(q.matches(&blitz));
        assert!(!q.matches(&race));

        assert!(query("t:classic*battle;nothing").matches(&prime));
        assert!(query("t:race;").matches(&race));
        assert!(!query("t:prime;blitz t:race").matches(&blitz));
    }

    #[test]
    fn text_metacharacters_are_literal() {
        let rec = record(Position::default()).with_comment("cube (2) at 3x5");
        assert!(query("t:\"(2)\"").matches(&rec));
        assert!(!query("t:3.5").matches(&rec));
    }

    #[test]
    fn move_pattern_searches_best_and_played() {
        let analysis = Analysis {
            checker: Some(CheckerAnalysis {
                moves: vec![
                    CheckerMove {
                        notation: "8/5 6/5".into(),
                        equity: 150,
                        ..CheckerMove::default()
                    },
                    CheckerMove {
                        notation: "24/21 13/11".into(),
                        equity: 20,
                        ..CheckerMove::default()
                    },
                ],
            }),
            played_move: Some("24/21 13/11".into()),
            ..Analysis::default()
        };
        let rec = record(Position::default()).with_analysis(analysis);
        assert!(query("mv:8/5").matches(&rec));
        assert!(query("mv:24/21*").matches(&rec));
        assert!(!query("mv:13/7").matches(&rec));
        assert!(query("err>=130").matches(&rec));
        assert!(query("eq=150").matches(&rec));
    }

    #[test]
    fn tags_and_inheritance() {
        let rec = record(Position::default()).with_tags(["opening/split", "blitz"]);
        assert!(query("tag:opening").matches(&rec));
        assert!(query("tag:opening tag:blitz").matches(&rec));
        assert!(!query("tag:opening tag:prime").matches(&rec));
        assert!(query("tag:prime,blitz").matches(&rec));
    }

    #[rstest]
    #[case("da2024", true)]
    #[case("da2024/03", true)]
    #[case("da2024/04", false)]
    #[case("da>2024/02", true)]
    #[case("da>2024/03", false)]
    #[case("da>=2024/03/15", true)]
    #[case("da<2024/03/16", true)]
    #[case("da<2024/03/15", false)]
    #[case("da<=2024", true)]
    #[case("da2023/12,2024/03/01", false)]
    #[case("da2023/12,2024/03/15", true)]
    fn date_periods(#[case] command: &str, #[case] expected: bool) {
        let rec = record(Position::default())
            .with_created_at(Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap());
        assert_eq!(query(command).matches(&rec), expected, "{command}");
    }

    fn racing_board() -> Board {
        Board::empty()
            .with(Side::Player1, 6, 8)
            .unwrap()
            .with(Side::Player1, 5, 7)
            .unwrap()
            .with(Side::Player2, 6, 15)
            .unwrap()
    }

    #[test]
    fn no_contact() {
        let rec = record(Position::with_board(racing_board()));
        assert!(query("nc").matches(&rec));
    }

    #[test]
    fn point_patterns_are_relative_to_queried_side() {
        // Player 2 on roll holding its own 20 point.
        let board = Board::empty()
            .with(Side::Player2, 20, 3)
            .unwrap()
            .with(Side::Player1, 20, 2)
            .unwrap();
        let rec = record(Position {
            board,
            player_on_roll: Side::Player2,
            ..Position::default()
        });
        assert!(query("pt20=3").matches(&rec));
        // Player 1's 20 point is player 2's 5 point.
        assert!(query("pt5=2o").matches(&rec));
        assert!(query("pt1-6=2o").matches(&rec));
        assert!(query("pt*>=3").matches(&rec));
        assert!(!query("pt*>=4").matches(&rec));
    }

    #[test]
    fn either_perspective_tries_both_sides() {
        let board = Board::empty()
            .with(Side::Player1, 6, 15)
            .unwrap()
            .with(Side::Player2, 25, 2)
            .unwrap()
            .with(Side::Player2, 1, 13)
            .unwrap();
        let rec = record(Position::with_board(board));

        assert!(!query("b2").matches(&rec));
        let either = CompileOptions::default().with_perspective(Perspective::Either);
        assert!(query_with("b2", &either).matches(&rec));
        // Both patterns must hold for the same side.
        assert!(!query_with("b2 hb15", &either).matches(&rec));
        assert!(query_with("b2 b0o", &either).matches(&rec));
    }

    #[test]
    fn anchor_requires_position() {
        let filter = parse_command("cp").unwrap();
        let err = compile(&filter.criteria, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::MissingAnchor(_)));
    }

    #[test]
    fn anchor_checkers_contained() {
        let anchor = Position::with_board(
            Board::empty()
                .with(Side::Player1, 6, 3)
                .unwrap()
                .with(Side::Player2, 24, 2)
                .unwrap(),
        );
        let options = CompileOptions::default().with_anchor(Some(anchor));
        let q = query_with("cp", &options);
        assert!(q.matches(&record(Position::default())));
        assert!(!q.matches(&record(Position::with_board(racing_board()))));

        // Same structure with player 2 on roll.
        let flipped = Position::default().mirrored();
        assert_eq!(flipped.player_on_roll, Side::Player2);
        assert!(q.matches(&record(flipped)));
    }

    #[test]
    fn conjunction_rejects_any_failing_clause() {
        let q = query("cv1 pd=0 b0");
        assert!(q.matches(&record(Position::default())));
        let doubled = record(Position {
            cube: Cube::owned_by(Side::Player1, 2),
            ..Position::default()
        });
        assert!(!q.matches(&doubled));
    }

    #[test]
    fn malformed_criterion_rejected() {
        let bad = Criterion::new(Field::Comment, Operator::Gt, Value::Text("x".into()));
        assert!(matches!(
            compile(&[bad], &CompileOptions::default()),
            Err(CompileError::Malformed(_))
        ));
    }

    #[test]
    fn empty_query_matches_everything() {
        let q = compile(&[], &CompileOptions::default()).unwrap();
        assert!(q.is_empty());
        assert!(q.matches(&record(Position::default())));
    }

    #[test]
    fn sort_keys_follow_order() {
        assert_eq!(query("cv1").sort_keys(), &[SortKey::Id]);
        let options = CompileOptions::default().with_order(ResultOrder::MatchChronological);
        assert_eq!(query_with("cv1", &options).sort_keys().last(), Some(&SortKey::Id));
    }
}
