//! Criteria model: fields, operators, values and filters.
//!
//! A [`Criterion`] is one field, one operator and one value. A [`Filter`] is
//! an ordered list of criteria combined with AND. Both serialize with serde so
//! the filter library can persist the validated form next to the command text.

use std::fmt;

use bgdb_domain::{DecisionType, Dice, Side, Zone};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Every searchable dimension of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PipDifference,
    Pips1,
    Pips2,
    CubeValue,
    CubeOwner,
    Away1,
    Away2,
    MatchWinningChance,
    Takepoint1,
    Takepoint2,
    DecisionType,
    Dice,
    Win1,
    Win2,
    Gammon1,
    Gammon2,
    Backgammon1,
    Backgammon2,
    Equity,
    MoveError,
    OutfieldBlots1,
    OutfieldBlots2,
    HomeBlots1,
    HomeBlots2,
    Date,
    Comment,
    MovePattern,
    Tag,
    PositionId,
    NoContact,
    AnchorCheckers,
    Bar,
    HomeBoard,
    Outfield,
    OpponentHome,
    BorneOff,
    Point,
}

/// Field codes as typed on the command line.
const FIELD_CODES: &[(&str, Field)] = &[
    ("pd", Field::PipDifference),
    ("pip1", Field::Pips1),
    ("pip2", Field::Pips2),
    ("cv", Field::CubeValue),
    ("co", Field::CubeOwner),
    ("s1", Field::Away1),
    ("s2", Field::Away2),
    ("sc", Field::MatchWinningChance),
    ("tp1", Field::Takepoint1),
    ("tp2", Field::Takepoint2),
    ("dt", Field::DecisionType),
    ("di", Field::Dice),
    ("w1", Field::Win1),
    ("w2", Field::Win2),
    ("g1", Field::Gammon1),
    ("g2", Field::Gammon2),
    ("bg1", Field::Backgammon1),
    ("bg2", Field::Backgammon2),
    ("eq", Field::Equity),
    ("err", Field::MoveError),
    ("bo1", Field::OutfieldBlots1),
    ("bo2", Field::OutfieldBlots2),
    ("bh1", Field::HomeBlots1),
    ("bh2", Field::HomeBlots2),
    ("da", Field::Date),
    ("t", Field::Comment),
    ("mv", Field::MovePattern),
    ("tag", Field::Tag),
    ("id", Field::PositionId),
    ("nc", Field::NoContact),
    ("cp", Field::AnchorCheckers),
    ("b", Field::Bar),
    ("hb", Field::HomeBoard),
    ("of", Field::Outfield),
    ("ob", Field::OpponentHome),
    ("off", Field::BorneOff),
    ("pt", Field::Point),
];

/// Longest field code, in bytes
pub(crate) const MAX_CODE_LEN: usize = 4;

impl Field {
    /// Look up a field by its command-line code (case-insensitive)
    pub fn from_code(code: &str) -> Option<Field> {
        let code = code.to_ascii_lowercase();
        FIELD_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, f)| *f)
    }

    pub fn code(&self) -> &'static str {
        FIELD_CODES
            .iter()
            .find(|(_, f)| f == self)
            .map(|(c, _)| *c)
            .unwrap_or("?")
    }

    /// All fields with their codes, in grammar order
    pub fn all() -> impl Iterator<Item = (&'static str, Field)> {
        FIELD_CODES.iter().copied()
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Field::PipDifference | Field::Equity => ValueType::SignedInteger,
            Field::Pips1
            | Field::Pips2
            | Field::CubeValue
            | Field::Away1
            | Field::Away2
            | Field::MoveError
            | Field::OutfieldBlots1
            | Field::OutfieldBlots2
            | Field::HomeBlots1
            | Field::HomeBlots2
            | Field::PositionId => ValueType::Integer,
            Field::MatchWinningChance
            | Field::Takepoint1
            | Field::Takepoint2
            | Field::Win1
            | Field::Win2
            | Field::Gammon1
            | Field::Gammon2
            | Field::Backgammon1
            | Field::Backgammon2 => ValueType::Percent,
            Field::CubeOwner => ValueType::CubeOwner,
            Field::DecisionType => ValueType::DecisionType,
            Field::Dice => ValueType::Dice,
            Field::Date => ValueType::Date,
            Field::Comment | Field::MovePattern => ValueType::Text,
            Field::Tag => ValueType::Tag,
            Field::NoContact | Field::AnchorCheckers => ValueType::Flag,
            Field::Bar
            | Field::HomeBoard
            | Field::Outfield
            | Field::OpponentHome
            | Field::BorneOff
            | Field::Point => ValueType::Pattern,
        }
    }

    /// Zone for the named-zone pattern fields
    pub fn zone(&self) -> Option<Zone> {
        match self {
            Field::Bar => Some(Zone::Bar),
            Field::HomeBoard => Some(Zone::HomeBoard),
            Field::Outfield => Some(Zone::Outfield),
            Field::OpponentHome => Some(Zone::OpponentHome),
            Field::BorneOff => Some(Zone::BorneOff),
            _ => None,
        }
    }

    /// Repeated clauses on these fields are ANDed instead of replacing each other.
    pub fn accumulates(&self) -> bool {
        matches!(self, Field::Comment | Field::MovePattern | Field::Tag)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Value type a field is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    SignedInteger,
    Percent,
    Date,
    DecisionType,
    CubeOwner,
    Dice,
    Text,
    Tag,
    Flag,
    Pattern,
}

impl ValueType {
    pub fn legal_operators(&self) -> &'static [Operator] {
        use Operator::*;
        match self {
            ValueType::Integer
            | ValueType::SignedInteger
            | ValueType::Percent
            | ValueType::Date
            | ValueType::Pattern => &[Eq, Gt, Lt, Ge, Le, Range],
            ValueType::DecisionType | ValueType::CubeOwner | ValueType::Dice => &[Eq, In],
            ValueType::Text => &[Contains],
            ValueType::Tag => &[Contains, In],
            ValueType::Flag => &[],
        }
    }

    pub fn allows(&self, op: Operator) -> bool {
        self.legal_operators().contains(&op)
    }

    /// Operator substituted when a clause gives none
    pub fn default_operator(&self) -> Option<Operator> {
        match self {
            ValueType::Text | ValueType::Tag => Some(Operator::Contains),
            ValueType::Flag => None,
            _ => Some(Operator::Eq),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Integer | ValueType::SignedInteger | ValueType::Percent
        )
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
    /// Inclusive `lo,hi`
    Range,
    /// Substring for text, "has tag" for tags
    Contains,
    /// Any of a comma-separated set
    In,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Range => ",",
            Operator::Contains => ":",
            Operator::In => ":",
        }
    }

    /// Apply an ordering operator to two comparable values.
    pub fn compare<T: PartialOrd>(&self, actual: T, expected: T) -> bool {
        match self {
            Operator::Eq => actual == expected,
            Operator::Gt => actual > expected,
            Operator::Lt => actual < expected,
            Operator::Ge => actual >= expected,
            Operator::Le => actual <= expected,
            _ => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A date given as `yyyy`, `yyyy/mm` or `yyyy/mm/dd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateBound {
    pub year: i32,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub day: Option<u32>,
}

impl DateBound {
    /// Build a bound, checking that the calendar date exists.
    pub fn new(year: i32, month: Option<u32>, day: Option<u32>) -> Option<Self> {
        let bound = Self { year, month, day };
        if day.is_some() && month.is_none() {
            return None;
        }
        bound.first_day()?;
        bound.last_day()?;
        Some(bound)
    }

    /// First calendar day covered by the bound
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }

    /// Last calendar day covered by the bound
    pub fn last_day(&self) -> Option<NaiveDate> {
        match (self.month, self.day) {
            (Some(m), Some(d)) => NaiveDate::from_ymd_opt(self.year, m, d),
            (Some(m), None) => {
                let (y, next) = if m == 12 { (self.year + 1, 1) } else { (self.year, m + 1) };
                NaiveDate::from_ymd_opt(y, next, 1)?.pred_opt()
            }
            _ => NaiveDate::from_ymd_opt(self.year, 12, 31),
        }
    }

    /// The bound covering exactly `date`
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: Some(date.month()),
            day: Some(date.day()),
        }
    }
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(m) = self.month {
            write!(f, "/{:02}", m)?;
        }
        if let Some(d) = self.day {
            write!(f, "/{:02}", d)?;
        }
        Ok(())
    }
}

/// Whose checkers a board pattern counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    /// The side being queried
    #[default]
    Player,
    /// The queried side's opponent
    Opponent,
}

impl Owner {
    pub fn resolve(&self, queried: Side) -> Side {
        match self {
            Owner::Player => queried,
            Owner::Opponent => queried.opponent(),
        }
    }
}

/// What part of the board a pattern looks at.
///
/// Zones are seen from the owner of the counted checkers; point numbers are
/// seen from the queried side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTarget {
    Zone(Zone),
    Point(usize),
    /// Inclusive span, summed
    Points(usize, usize),
    /// Any single point satisfies the count test
    AnyPoint,
}

/// A checker-distribution test. The criterion's operator applies to `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardPattern {
    pub target: PatternTarget,
    #[serde(default)]
    pub owner: Owner,
    pub count: i64,
    /// Upper bound for range comparisons
    #[serde(default)]
    pub upper: Option<i64>,
}

/// Typed criterion value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Value {
    Integer(i64),
    /// Inclusive, `lo <= hi`
    Range(i64, i64),
    Date(DateBound),
    /// Inclusive, earlier bound first
    DateRange(DateBound, DateBound),
    Decision(DecisionType),
    /// `None` is a centered cube
    CubeOwner(Option<Side>),
    Dice(Dice),
    Text(String),
    Set(Vec<Value>),
    Pattern(BoardPattern),
    Flag,
}

/// One field + operator + value search condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: Field,
    pub op: Operator,
    pub value: Value,
}

impl Criterion {
    pub fn new(field: Field, op: Operator, value: Value) -> Self {
        Self { field, op, value }
    }

    /// Shorthand for a flag criterion such as `nc`
    pub fn flag(field: Field) -> Self {
        Self::new(field, Operator::Eq, Value::Flag)
    }

    /// True when the operator is legal for the field and the value has the
    /// field's type.
    pub fn is_well_formed(&self) -> bool {
        let ty = self.field.value_type();
        if ty == ValueType::Flag {
            return self.value == Value::Flag;
        }
        if !ty.allows(self.op) {
            return false;
        }
        match (&self.value, self.op) {
            (Value::Set(items), Operator::In) => {
                !items.is_empty() && items.iter().all(|v| value_fits(ty, v))
            }
            (Value::Set(_), _) | (_, Operator::In) => false,
            (Value::Range(lo, hi), Operator::Range) => ty.is_numeric() && lo <= hi,
            (Value::DateRange(a, b), Operator::Range) => {
                ty == ValueType::Date && a.first_day() <= b.first_day()
            }
            (Value::Pattern(p), op) => {
                let target_ok = match self.field.zone() {
                    Some(zone) => p.target == PatternTarget::Zone(zone),
                    None => !matches!(p.target, PatternTarget::Zone(_)),
                };
                ty == ValueType::Pattern && target_ok && (op == Operator::Range) == p.upper.is_some()
            }
            (_, Operator::Range) => false,
            (v, _) => value_fits(ty, v),
        }
    }

    /// Criteria that replace each other when repeated share this key.
    pub(crate) fn dedup_key(&self) -> (Field, Operator, Option<(PatternTarget, Owner)>) {
        let target = match &self.value {
            Value::Pattern(p) => Some((p.target, p.owner)),
            _ => None,
        };
        (self.field, self.op, target)
    }
}

fn value_fits(ty: ValueType, value: &Value) -> bool {
    matches!(
        (ty, value),
        (ValueType::Integer, Value::Integer(_))
            | (ValueType::SignedInteger, Value::Integer(_))
            | (ValueType::Percent, Value::Integer(_))
            | (ValueType::Date, Value::Date(_))
            | (ValueType::DecisionType, Value::Decision(_))
            | (ValueType::CubeOwner, Value::CubeOwner(_))
            | (ValueType::Dice, Value::Dice(_))
            | (ValueType::Text, Value::Text(_))
            | (ValueType::Tag, Value::Text(_))
    )
}

impl fmt::Display for Criterion {
    /// Canonical command text; parsing it yields the same criterion.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.field.code();
        match (&self.value, self.op) {
            (Value::Flag, _) => write!(f, "{}", code),
            (Value::Pattern(p), op) => {
                write!(f, "{}", code)?;
                match p.target {
                    PatternTarget::Zone(_) => {}
                    PatternTarget::Point(n) => write!(f, "{}", n)?,
                    PatternTarget::Points(a, b) => write!(f, "{}-{}", a, b)?,
                    PatternTarget::AnyPoint => write!(f, "*")?,
                }
                match (op, p.upper) {
                    (Operator::Range, Some(hi)) => write!(f, "={},{}", p.count, hi)?,
                    _ => write!(f, "{}{}", op, p.count)?,
                }
                if p.owner == Owner::Opponent {
                    write!(f, "o")?;
                }
                Ok(())
            }
            (Value::Range(lo, hi), _) => write!(f, "{}{},{}", code, lo, hi),
            (Value::DateRange(a, b), _) => write!(f, "{}{},{}", code, a, b),
            (value, op) => write!(f, "{}{}{}", code, op, ValueText(value)),
        }
    }
}

/// Renders a scalar or set value the way the parser reads it back.
struct ValueText<'a>(&'a Value);

impl fmt::Display for ValueText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Range(lo, hi) => write!(f, "{},{}", lo, hi),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateRange(a, b) => write!(f, "{},{}", a, b),
            Value::Decision(d) => f.write_str(d.as_str()),
            Value::CubeOwner(None) => f.write_str("center"),
            Value::CubeOwner(Some(side)) => f.write_str(side.label()),
            Value::Dice(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", quote_if_needed(s)),
            Value::Set(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", ValueText(item))?;
                }
                Ok(())
            }
            Value::Pattern(_) | Value::Flag => Ok(()),
        }
    }
}

fn quote_if_needed(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| !c.is_whitespace() && c != '"' && c != '\\' && c != ',');
    if plain {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// An ordered list of criteria combined with AND.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Filter {
    pub criteria: Vec<Criterion>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_criteria(criteria: Vec<Criterion>) -> Self {
        let mut filter = Self::new();
        for criterion in criteria {
            filter.push(criterion);
        }
        filter
    }

    /// Append a criterion. A repeat of the same field and operator (and
    /// pattern target) drops the earlier one, except on fields that accumulate.
    pub fn push(&mut self, criterion: Criterion) {
        if !criterion.field.accumulates() {
            let key = criterion.dedup_key();
            self.criteria.retain(|c| c.dedup_key() != key);
        }
        self.criteria.push(criterion);
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.iter()
    }

    /// Canonical command text for the whole filter
    pub fn to_command(&self) -> String {
        self.criteria
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<Vec<Criterion>> for Filter {
    fn from(criteria: Vec<Criterion>) -> Self {
        Self::from_criteria(criteria)
    }
}
