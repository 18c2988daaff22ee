//! Command grammar parser
//!
//! Grammar:
//! ```text
//! command  := clause (ws+ clause)*
//! clause   := code [target] [op] value
//! code     := longest known field code (case-insensitive), not followed
//!             by a letter unless that letter is quoted or an owner suffix
//! target   := point | point '-' point | '*'              (pt only)
//! op       := '>=' | '<=' | '>' | '<' | '=' | ':'
//! value    := int | int ',' int                          (numeric)
//!           | date | date ',' date                       (da)
//!           | token (',' token)*                         (dt, co, di, tag)
//!           | text                                       (t, mv)
//!           | [count | count ',' count] ['p' | 'o']      (patterns)
//!           | <empty>                                    (flags)
//! date     := yyyy | yyyy/mm | yyyy/mm/dd
//! ```
//!
//! Whitespace separates clauses. Double quotes group a value containing
//! spaces; a backslash escapes the next character inside or outside quotes.

use bgdb_domain::{normalize_tag, DecisionType, Dice, Side};
use lazy_static::lazy_static;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    sequence::{pair, preceded, separated_pair},
    IResult,
};
use regex::Regex;

use crate::criteria::{
    BoardPattern, Criterion, DateBound, Field, Filter, Operator, Owner, PatternTarget, Value,
    ValueType, MAX_CODE_LEN,
};
use crate::error::{ParseError, ParseErrorKind};

lazy_static! {
    static ref DATE_PATTERN: Regex =
        Regex::new(r"^(\d{4})(?:/(\d{1,2})(?:/(\d{1,2}))?)?$").unwrap();
}

/// Parse a command line into a filter.
///
/// Either every clause is valid and the whole filter is returned, or the first
/// failing clause (left to right) is reported. An empty command is an empty
/// filter.
///
/// # Examples
/// ```
/// use bgdb_query::{parse_command, Field};
/// let filter = parse_command("sc>60 tp2>50").unwrap();
/// assert_eq!(filter.criteria[0].field, Field::MatchWinningChance);
/// assert_eq!(filter.criteria[1].field, Field::Takepoint2);
/// assert!(parse_command("zz>3").is_err());
/// ```
pub fn parse_command(input: &str) -> Result<Filter, ParseError> {
    let mut filter = Filter::new();
    for clause in split_clauses(input) {
        filter.push(parse_clause(input, &clause)?);
    }
    Ok(filter)
}

/// One whitespace-delimited clause after quote and escape processing
#[derive(Debug)]
struct RawClause {
    text: String,
    start: usize,
    end: usize,
    /// Quotes or escapes were used; commas are then literal
    literal: bool,
    /// Length of `text` when the first quote or escape was met
    literal_at: Option<usize>,
    /// Byte offset of a quote that was never closed
    open_quote: Option<usize>,
}

impl RawClause {
    fn new(start: usize) -> Self {
        Self {
            text: String::new(),
            start,
            end: start,
            literal: false,
            literal_at: None,
            open_quote: None,
        }
    }
}

fn split_clauses(input: &str) -> Vec<RawClause> {
    let mut clauses = Vec::new();
    let mut current: Option<RawClause> = None;
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        let in_quotes = current.as_ref().map_or(false, |cl| cl.open_quote.is_some());
        if c.is_whitespace() && !in_quotes {
            if let Some(done) = current.take() {
                clauses.push(done);
            }
            continue;
        }

        let clause = current.get_or_insert_with(|| RawClause::new(i));
        clause.end = i + c.len_utf8();
        match c {
            '\\' => {
                clause.literal = true;
                clause.literal_at.get_or_insert(clause.text.len());
                match chars.next() {
                    Some((j, escaped)) => {
                        clause.text.push(escaped);
                        clause.end = j + escaped.len_utf8();
                    }
                    None => clause.text.push('\\'),
                }
            }
            '"' => {
                clause.literal = true;
                clause.literal_at.get_or_insert(clause.text.len());
                clause.open_quote = match clause.open_quote {
                    Some(_) => None,
                    None => Some(i),
                };
            }
            _ => clause.text.push(c),
        }
    }

    if let Some(done) = current {
        clauses.push(done);
    }
    clauses
}

fn parse_clause(input: &str, clause: &RawClause) -> Result<Criterion, ParseError> {
    let raw = &input[clause.start..clause.end];
    let fail = |kind: ParseErrorKind| ParseError::new(kind, raw, clause.start);

    if let Some(quote) = clause.open_quote {
        return Err(ParseError::new(
            ParseErrorKind::UnterminatedQuote,
            &input[quote..clause.end],
            quote,
        ));
    }

    let unknown = || {
        let word: String = clause
            .text
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        let token = if word.is_empty() { raw.to_string() } else { word };
        ParseError::new(ParseErrorKind::UnknownField, token, clause.start)
    };

    // Quoted or escaped characters never belong to the code.
    let code_end = clause.literal_at.unwrap_or(clause.text.len());
    let (field, code_len) = split_code(&clause.text[..code_end]).ok_or_else(unknown)?;
    let rest = &clause.text[code_len..];
    if !ends_code(field, rest, clause.literal_at == Some(code_len)) {
        return Err(unknown());
    }

    let ty = field.value_type();
    let (rest, target) = if field == Field::Point {
        match point_target(rest) {
            Ok((rest, target)) => (rest, Some(target)),
            Err(_) => return Err(fail(ParseErrorKind::InvalidPattern)),
        }
    } else {
        (rest, None)
    };

    let (rest, op) = match opt(operator)(rest) {
        Ok(parsed) => parsed,
        Err(_) => (rest, None),
    };
    if let Some(op) = op {
        if !accepts_written_operator(ty, op) {
            return Err(fail(ParseErrorKind::IllegalOperator {
                field: field.code().to_string(),
                op: op.as_str().to_string(),
            }));
        }
    }

    let (op, value) = match ty {
        ValueType::Flag => {
            if !rest.is_empty() {
                return Err(fail(ParseErrorKind::UnexpectedValue(field.code().to_string())));
            }
            Ok((Operator::Eq, Value::Flag))
        }
        ValueType::Integer | ValueType::Percent => numeric_value(field, rest, op, false),
        ValueType::SignedInteger => numeric_value(field, rest, op, true),
        ValueType::Date => date_value(field, rest, op),
        ValueType::DecisionType => {
            token_set(field, rest, clause.literal, |t| decision_token(t).map(Value::Decision))
        }
        ValueType::CubeOwner => {
            token_set(field, rest, clause.literal, |t| owner_token(t).map(Value::CubeOwner))
        }
        ValueType::Dice => token_set(field, rest, clause.literal, |t| {
            t.parse::<Dice>()
                .map(Value::Dice)
                .map_err(|_| ParseErrorKind::InvalidDice)
        }),
        ValueType::Text => {
            if rest.is_empty() {
                Err(ParseErrorKind::MissingValue)
            } else {
                Ok((Operator::Contains, Value::Text(rest.to_string())))
            }
        }
        ValueType::Tag => tag_value(field, rest, clause.literal),
        ValueType::Pattern => {
            let target = match (target, field.zone()) {
                (Some(target), _) => target,
                (None, Some(zone)) => PatternTarget::Zone(zone),
                (None, None) => return Err(fail(ParseErrorKind::InvalidPattern)),
            };
            pattern_value(target, rest, op)
        }
    }
    .map_err(fail)?;

    Ok(Criterion::new(field, op, value))
}

/// Longest known code at the start of `text`, with its byte length.
fn split_code(text: &str) -> Option<(Field, usize)> {
    let longest = text.len().min(MAX_CODE_LEN);
    (1..=longest)
        .rev()
        .filter(|&n| text.is_char_boundary(n))
        .find_map(|n| Field::from_code(&text[..n]).map(|field| (field, n)))
}

/// A letter right after a code makes the word a longer code, which is
/// unknown. Pattern owner suffixes and quoted values are the exceptions.
fn ends_code(field: Field, rest: &str, quoted: bool) -> bool {
    match rest.chars().next() {
        Some(c) if c.is_alphabetic() => {
            quoted
                || (field.value_type() == ValueType::Pattern
                    && (rest.eq_ignore_ascii_case("p") || rest.eq_ignore_ascii_case("o")))
        }
        _ => true,
    }
}

/// Operators as written; `:` doubles as set membership for token fields.
fn accepts_written_operator(ty: ValueType, op: Operator) -> bool {
    match ty {
        ValueType::DecisionType | ValueType::CubeOwner | ValueType::Dice => {
            matches!(op, Operator::Eq | Operator::Contains)
        }
        ValueType::Flag => false,
        _ => ty.allows(op),
    }
}

/// Parse a comparison operator
fn operator(input: &str) -> IResult<&str, Operator> {
    alt((
        value(Operator::Ge, tag(">=")),
        value(Operator::Le, tag("<=")),
        value(Operator::Gt, tag(">")),
        value(Operator::Lt, tag("<")),
        value(Operator::Eq, tag("=")),
        value(Operator::Contains, tag(":")),
    ))(input)
}

/// Parse an optionally negative integer
fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i64>()
    })(input)
}

/// Parse a non-negative integer
fn unsigned(input: &str) -> IResult<&str, i64> {
    map_res(digit1, |s: &str| s.parse::<i64>())(input)
}

/// Parse a side-relative point number
fn point_number(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

/// Parse a point target: `*`, `n-m` or `n`
fn point_target(input: &str) -> IResult<&str, PatternTarget> {
    let (rest, target) = alt((
        value(PatternTarget::AnyPoint, char('*')),
        map(separated_pair(point_number, char('-'), point_number), |(a, b)| {
            if a == b {
                PatternTarget::Point(a)
            } else {
                PatternTarget::Points(a.min(b), a.max(b))
            }
        }),
        map(point_number, PatternTarget::Point),
    ))(input)?;

    let valid = |n: usize| (1..=24).contains(&n);
    let ok = match target {
        PatternTarget::Point(n) => valid(n),
        PatternTarget::Points(a, b) => valid(a) && valid(b),
        _ => true,
    };
    if !ok {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    Ok((rest, target))
}

/// Parse the count part of a pattern: optional count or range, optional owner
fn pattern_count(input: &str) -> IResult<&str, (Option<(i64, Option<i64>)>, Owner)> {
    pair(
        opt(pair(unsigned, opt(preceded(char(','), unsigned)))),
        map(opt(one_of("poPO")), |c| match c {
            Some('o') | Some('O') => Owner::Opponent,
            _ => Owner::Player,
        }),
    )(input)
}

fn numeric_value(
    field: Field,
    rest: &str,
    op: Option<Operator>,
    signed: bool,
) -> Result<(Operator, Value), ParseErrorKind> {
    if rest.is_empty() {
        return Err(ParseErrorKind::MissingValue);
    }
    let number: fn(&str) -> IResult<&str, i64> = if signed { integer } else { unsigned };

    if rest.contains(',') {
        if op.map_or(false, |op| op != Operator::Eq) {
            return Err(ParseErrorKind::InvalidValue(field.code().to_string()));
        }
        let (_, (a, b)) = all_consuming(separated_pair(number, char(','), number))(rest)
            .map_err(|_| ParseErrorKind::InvalidNumber)?;
        return Ok((Operator::Range, Value::Range(a.min(b), a.max(b))));
    }

    let (_, n) = all_consuming(number)(rest).map_err(|_| ParseErrorKind::InvalidNumber)?;
    Ok((op.unwrap_or(Operator::Eq), Value::Integer(n)))
}

fn parse_date(text: &str) -> Result<DateBound, ParseErrorKind> {
    let caps = DATE_PATTERN
        .captures(text)
        .ok_or(ParseErrorKind::InvalidDate)?;
    let part = |i: usize| -> Result<Option<u32>, ParseErrorKind> {
        caps.get(i)
            .map(|m| m.as_str().parse::<u32>().map_err(|_| ParseErrorKind::InvalidDate))
            .transpose()
    };
    let year = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .ok_or(ParseErrorKind::InvalidDate)?;
    DateBound::new(year, part(2)?, part(3)?).ok_or(ParseErrorKind::InvalidDate)
}

fn date_value(
    field: Field,
    rest: &str,
    op: Option<Operator>,
) -> Result<(Operator, Value), ParseErrorKind> {
    if rest.is_empty() {
        return Err(ParseErrorKind::MissingValue);
    }
    if let Some((a, b)) = rest.split_once(',') {
        if op.map_or(false, |op| op != Operator::Eq) {
            return Err(ParseErrorKind::InvalidValue(field.code().to_string()));
        }
        let (a, b) = (parse_date(a)?, parse_date(b)?);
        let (lo, hi) = if b.first_day() < a.first_day() { (b, a) } else { (a, b) };
        return Ok((Operator::Range, Value::DateRange(lo, hi)));
    }
    Ok((op.unwrap_or(Operator::Eq), Value::Date(parse_date(rest)?)))
}

fn decision_token(token: &str) -> Result<DecisionType, ParseErrorKind> {
    match token.to_ascii_lowercase().as_str() {
        "checker" | "chequer" | "c" => Ok(DecisionType::Checker),
        "cube" | "double" | "d" => Ok(DecisionType::Cube),
        _ => Err(ParseErrorKind::InvalidValue(Field::DecisionType.code().to_string())),
    }
}

fn owner_token(token: &str) -> Result<Option<Side>, ParseErrorKind> {
    match token.to_ascii_lowercase().as_str() {
        "center" | "centre" | "none" | "c" | "0" => Ok(None),
        "p1" | "1" => Ok(Some(Side::Player1)),
        "p2" | "2" => Ok(Some(Side::Player2)),
        _ => Err(ParseErrorKind::InvalidValue(Field::CubeOwner.code().to_string())),
    }
}

/// One token gives `=`, several comma-separated tokens give set membership.
fn token_set<F>(
    field: Field,
    rest: &str,
    literal: bool,
    parse: F,
) -> Result<(Operator, Value), ParseErrorKind>
where
    F: Fn(&str) -> Result<Value, ParseErrorKind>,
{
    if rest.is_empty() {
        return Err(ParseErrorKind::MissingValue);
    }
    let tokens: Vec<&str> = if literal {
        vec![rest]
    } else {
        rest.split(',').collect()
    };
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(ParseErrorKind::InvalidValue(field.code().to_string()));
    }
    let mut values = tokens.into_iter().map(parse).collect::<Result<Vec<_>, _>>()?;
    if values.len() == 1 {
        return Ok((Operator::Eq, values.remove(0)));
    }
    Ok((Operator::In, Value::Set(values)))
}

fn tag_value(field: Field, rest: &str, literal: bool) -> Result<(Operator, Value), ParseErrorKind> {
    let (op, value) = token_set(field, rest, literal, |t| {
        normalize_tag(t)
            .map(Value::Text)
            .ok_or_else(|| ParseErrorKind::InvalidValue(field.code().to_string()))
    })?;
    let op = if op == Operator::Eq { Operator::Contains } else { op };
    Ok((op, value))
}

fn pattern_value(
    target: PatternTarget,
    rest: &str,
    op: Option<Operator>,
) -> Result<(Operator, Value), ParseErrorKind> {
    let (_, (count, owner)) =
        all_consuming(pattern_count)(rest).map_err(|_| ParseErrorKind::InvalidPattern)?;

    let (op, count, upper) = match (count, op) {
        (None, Some(_)) => return Err(ParseErrorKind::MissingValue),
        (None, None) => (Operator::Ge, 1, None),
        (Some((n, None)), op) => (op.unwrap_or(Operator::Eq), n, None),
        (Some((a, Some(b))), None) | (Some((a, Some(b))), Some(Operator::Eq)) => {
            (Operator::Range, a.min(b), Some(a.max(b)))
        }
        (Some((_, Some(_))), Some(_)) => return Err(ParseErrorKind::InvalidPattern),
    };

    Ok((
        op,
        Value::Pattern(BoardPattern {
            target,
            owner,
            count,
            upper,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgdb_domain::Zone;
    use rstest::rstest;

    fn single(input: &str) -> Criterion {
        let filter = parse_command(input).unwrap();
        assert_eq!(filter.len(), 1, "{input}");
        filter.criteria.into_iter().next().unwrap()
    }

    fn error(input: &str) -> ParseError {
        parse_command(input).unwrap_err()
    }

    #[test]
    fn empty_command_is_empty_filter() {
        assert!(parse_command("").unwrap().is_empty());
        assert!(parse_command("   \t ").unwrap().is_empty());
    }

    #[rstest]
    #[case("sc>60", Field::MatchWinningChance, Operator::Gt, Value::Integer(60))]
    #[case("tp2>=50", Field::Takepoint2, Operator::Ge, Value::Integer(50))]
    #[case("cv4", Field::CubeValue, Operator::Eq, Value::Integer(4))]
    #[case("cv=4", Field::CubeValue, Operator::Eq, Value::Integer(4))]
    #[case("pd-12", Field::PipDifference, Operator::Eq, Value::Integer(-12))]
    #[case("pd<-12", Field::PipDifference, Operator::Lt, Value::Integer(-12))]
    #[case("pd20,-5", Field::PipDifference, Operator::Range, Value::Range(-5, 20))]
    #[case("pip1<=80", Field::Pips1, Operator::Le, Value::Integer(80))]
    #[case("W1>60", Field::Win1, Operator::Gt, Value::Integer(60))]
    #[case("eq>-250", Field::Equity, Operator::Gt, Value::Integer(-250))]
    #[case("err>=80", Field::MoveError, Operator::Ge, Value::Integer(80))]
    #[case("s12", Field::Away1, Operator::Eq, Value::Integer(2))]
    #[case("bo1>1", Field::OutfieldBlots1, Operator::Gt, Value::Integer(1))]
    fn numeric_clauses(
        #[case] input: &str,
        #[case] field: Field,
        #[case] op: Operator,
        #[case] value: Value,
    ) {
        assert_eq!(single(input), Criterion::new(field, op, value));
    }

    #[test]
    fn bar_count_clause() {
        let c = single("b3");
        assert_eq!(c.field, Field::Bar);
        assert_eq!(c.op, Operator::Eq);
        assert_eq!(
            c.value,
            Value::Pattern(BoardPattern {
                target: PatternTarget::Zone(Zone::Bar),
                owner: Owner::Player,
                count: 3,
                upper: None,
            })
        );
    }

    #[rstest]
    #[case("b", Operator::Ge, PatternTarget::Zone(Zone::Bar), 1, None, Owner::Player)]
    #[case("bo", Operator::Ge, PatternTarget::Zone(Zone::Bar), 1, None, Owner::Opponent)]
    #[case("hb>=4", Operator::Ge, PatternTarget::Zone(Zone::HomeBoard), 4, None, Owner::Player)]
    #[case("of2,4o", Operator::Range, PatternTarget::Zone(Zone::Outfield), 2, Some(4), Owner::Opponent)]
    #[case("off<3", Operator::Lt, PatternTarget::Zone(Zone::BorneOff), 3, None, Owner::Player)]
    #[case("pt6", Operator::Ge, PatternTarget::Point(6), 1, None, Owner::Player)]
    #[case("pt20=2o", Operator::Eq, PatternTarget::Point(20), 2, None, Owner::Opponent)]
    #[case("pt24-19>=4", Operator::Ge, PatternTarget::Points(19, 24), 4, None, Owner::Player)]
    #[case("pt*>=6", Operator::Ge, PatternTarget::AnyPoint, 6, None, Owner::Player)]
    fn pattern_clauses(
        #[case] input: &str,
        #[case] op: Operator,
        #[case] target: PatternTarget,
        #[case] count: i64,
        #[case] upper: Option<i64>,
        #[case] owner: Owner,
    ) {
        let c = single(input);
        assert_eq!(c.op, op, "{input}");
        assert_eq!(
            c.value,
            Value::Pattern(BoardPattern {
                target,
                owner,
                count,
                upper,
            })
        );
        assert!(c.is_well_formed());
    }

    #[test]
    fn enumerated_clauses() {
        assert_eq!(
            single("dt=cube"),
            Criterion::new(Field::DecisionType, Operator::Eq, Value::Decision(DecisionType::Cube))
        );
        assert_eq!(
            single("dt=checker").value,
            Value::Decision(DecisionType::Checker)
        );
        assert_eq!(
            single("co:p1,center"),
            Criterion::new(
                Field::CubeOwner,
                Operator::In,
                Value::Set(vec![
                    Value::CubeOwner(Some(Side::Player1)),
                    Value::CubeOwner(None)
                ])
            )
        );
        assert_eq!(single("di13").value, Value::Dice(Dice(1, 3)));
        assert_eq!(single("di:31,42").op, Operator::In);
    }

    #[test]
    fn text_clauses() {
        assert_eq!(
            single("t:\"prime vs prime\""),
            Criterion::new(Field::Comment, Operator::Contains, Value::Text("prime vs prime".into()))
        );
        assert_eq!(single("t:back\\ game").value, Value::Text("back game".into()));
        assert_eq!(single("t:blitz").value, Value::Text("blitz".into()));
        assert_eq!(single("t\"blitz\"").value, Value::Text("blitz".into()));
        assert_eq!(single("t\\blitz").value, Value::Text("blitz".into()));
        assert_eq!(
            single("t\"ag x\""),
            Criterion::new(Field::Comment, Operator::Contains, Value::Text("ag x".into()))
        );
        assert_eq!(single("mv:13/7").field, Field::MovePattern);
    }

    #[test]
    fn tag_clauses() {
        assert_eq!(
            single("tag:Opening/Split"),
            Criterion::new(Field::Tag, Operator::Contains, Value::Text("opening/split".into()))
        );
        assert_eq!(single("tag:a,b").op, Operator::In);
        assert_eq!(
            single("tag:\"a,b\"").value,
            Value::Text("a,b".into())
        );
    }

    #[test]
    fn date_clauses() {
        let c = single("da>=2024");
        assert_eq!(c.op, Operator::Ge);
        assert_eq!(c.value, Value::Date(DateBound::new(2024, None, None).unwrap()));

        let c = single("da2024/06/30,2023");
        assert_eq!(c.op, Operator::Range);
        assert_eq!(
            c.value,
            Value::DateRange(
                DateBound::new(2023, None, None).unwrap(),
                DateBound::new(2024, Some(6), Some(30)).unwrap()
            )
        );
    }

    #[test]
    fn flag_clauses() {
        assert_eq!(single("nc"), Criterion::flag(Field::NoContact));
        assert_eq!(single("CP"), Criterion::flag(Field::AnchorCheckers));
    }

    #[test]
    fn juxtaposition_is_conjunction() {
        let filter = parse_command("sc>60  tp2>50\tb3").unwrap();
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn duplicate_field_last_wins() {
        let filter = parse_command("cv2 pd>10 cv4").unwrap();
        assert_eq!(filter.len(), 2);
        assert_eq!(filter.criteria[0].field, Field::PipDifference);
        assert_eq!(filter.criteria[1].value, Value::Integer(4));
    }

    #[test]
    fn repeated_text_and_tags_accumulate() {
        let filter = parse_command("t:prime t:blitz tag:a tag:b").unwrap();
        assert_eq!(filter.len(), 4);
    }

    #[test]
    fn unknown_field() {
        let err = error("cv2 zz>3");
        assert_eq!(err.kind, ParseErrorKind::UnknownField);
        assert_eq!(err.token, "zz");
        assert_eq!(err.position, 4);
        assert!(!err.is_semantic());
    }

    #[rstest]
    #[case("tp>50", "tp")]
    #[case("tp3>50", "tp3")]
    #[case("tx=4", "tx")]
    #[case("bogus", "bogus")]
    #[case("cvx", "cvx")]
    #[case("tblitz", "tblitz")]
    #[case("dtchecker", "dtchecker")]
    fn letters_after_a_code_are_unknown(#[case] input: &str, #[case] token: &str) {
        let err = error(input);
        assert_eq!(err.kind, ParseErrorKind::UnknownField, "{input}");
        assert_eq!(err.token, token);
    }

    #[rstest]
    #[case("da24", ParseErrorKind::InvalidDate)]
    #[case("da2024/13", ParseErrorKind::InvalidDate)]
    #[case("da2024-01-01", ParseErrorKind::InvalidDate)]
    #[case("cv", ParseErrorKind::MissingValue)]
    #[case("cv2x", ParseErrorKind::InvalidNumber)]
    #[case("cv-2", ParseErrorKind::InvalidNumber)]
    #[case("pd99999999999999999999", ParseErrorKind::InvalidNumber)]
    #[case("di77", ParseErrorKind::InvalidDice)]
    #[case("pt25", ParseErrorKind::InvalidPattern)]
    #[case("pt>=2", ParseErrorKind::InvalidPattern)]
    #[case("b3x", ParseErrorKind::InvalidPattern)]
    #[case("hb>=", ParseErrorKind::MissingValue)]
    #[case("nc3", ParseErrorKind::UnexpectedValue("nc".into()))]
    #[case("t:", ParseErrorKind::MissingValue)]
    #[case("t:\"open", ParseErrorKind::UnterminatedQuote)]
    #[case("dt=both", ParseErrorKind::InvalidValue("dt".into()))]
    #[case("pd>1,5", ParseErrorKind::InvalidValue("pd".into()))]
    fn syntax_errors(#[case] input: &str, #[case] kind: ParseErrorKind) {
        assert_eq!(error(input).kind, kind, "{input}");
    }

    #[rstest]
    #[case("t>blitz", "t", ">")]
    #[case("tag>=x", "tag", ">=")]
    #[case("cv:2", "cv", ":")]
    #[case("dt>cube", "dt", ">")]
    #[case("nc=1", "nc", "=")]
    fn semantic_errors(#[case] input: &str, #[case] field: &str, #[case] op: &str) {
        let err = error(input);
        assert!(err.is_semantic(), "{input}");
        assert_eq!(
            err.kind,
            ParseErrorKind::IllegalOperator {
                field: field.into(),
                op: op.into()
            }
        );
    }

    #[test]
    fn first_failure_is_reported() {
        let err = error("cv2 zz da24 t:\"x");
        assert_eq!(err.kind, ParseErrorKind::UnknownField);
        assert_eq!(err.position, 4);

        let err = error("cv2 t:\"never closed");
        assert_eq!(err.kind, ParseErrorKind::UnterminatedQuote);
        assert_eq!(err.position, 6);
    }

    #[test]
    fn error_position_is_byte_offset_of_clause() {
        let err = error("t:\"é x\" cv>x");
        assert_eq!(err.token, "cv>x");
        assert_eq!(err.position, 9);
    }

    #[rstest]
    #[case("pt6=2,3", "pt6=2,3")]
    #[case("pt24-19=4,2o", "pt19-24=2,4o")]
    #[case("of1,3", "of=1,3")]
    fn pattern_ranges_render_with_separator(#[case] input: &str, #[case] rendered: &str) {
        assert_eq!(single(input).to_string(), rendered);
    }

    #[test]
    fn canonical_text_parses_back() {
        let inputs = [
            "sc>60 tp2>50 b3 pt19-24>=2o of1,3 dt=cube co:p1,center di:31,42",
            "t:\"prime vs prime\" tag:opening/split da2023/01,2024 nc pd-10,20 eq<=-100",
            "pt6=2,3 pt19-24=2,4o pt*=1,2 hb3,5",
        ];
        for input in inputs {
            let filter = parse_command(input).unwrap();
            let again = parse_command(&filter.to_command()).unwrap();
            assert_eq!(filter, again, "{}", filter.to_command());
        }
    }
}
