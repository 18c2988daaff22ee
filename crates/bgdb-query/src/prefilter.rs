//! Index-friendly subset of a filter.
//!
//! A [`Prefilter`] keeps only the criteria that map onto indexed storage
//! columns. Storage may use it to skip rows early; the compiled query is still
//! applied to every row returned, so the prefilter only has to admit a
//! superset of the matches.

use bgdb_domain::{DecisionType, PositionRecord, Side};
use serde::{Deserialize, Serialize};

use crate::criteria::{Criterion, Field, Operator, Value};

/// Inclusive integer bounds; `None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl Bounds {
    fn from_criterion(op: Operator, value: &Value) -> Option<Self> {
        let bounds = match (op, value) {
            (Operator::Eq, Value::Integer(n)) => Self {
                min: Some(*n),
                max: Some(*n),
            },
            (Operator::Gt, Value::Integer(n)) => Self {
                min: Some(n.saturating_add(1)),
                max: None,
            },
            (Operator::Ge, Value::Integer(n)) => Self {
                min: Some(*n),
                max: None,
            },
            (Operator::Lt, Value::Integer(n)) => Self {
                min: None,
                max: Some(n.saturating_sub(1)),
            },
            (Operator::Le, Value::Integer(n)) => Self {
                min: None,
                max: Some(*n),
            },
            (Operator::Range, Value::Range(lo, hi)) => Self {
                min: Some(*lo),
                max: Some(*hi),
            },
            _ => return None,
        };
        Some(bounds)
    }

    fn intersect(self, other: Bounds) -> Bounds {
        let min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Bounds { min, max }
    }

    pub fn contains(&self, n: i64) -> bool {
        self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max)
    }
}

/// Criteria the storage layer can answer from indexed columns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Prefilter {
    pub decision_type: Option<DecisionType>,
    pub cube_value: Option<Bounds>,
    pub away1: Option<Bounds>,
    pub away2: Option<Bounds>,
    pub id: Option<Bounds>,
}

impl Prefilter {
    pub fn from_criteria<'a, I>(criteria: I) -> Self
    where
        I: IntoIterator<Item = &'a Criterion>,
    {
        let mut prefilter = Prefilter::default();
        for criterion in criteria {
            if let (Field::DecisionType, Operator::Eq, Value::Decision(d)) =
                (criterion.field, criterion.op, &criterion.value)
            {
                prefilter.decision_type = Some(*d);
                continue;
            }
            let slot = match criterion.field {
                Field::CubeValue => &mut prefilter.cube_value,
                Field::Away1 => &mut prefilter.away1,
                Field::Away2 => &mut prefilter.away2,
                Field::PositionId => &mut prefilter.id,
                _ => continue,
            };
            if let Some(bounds) = Bounds::from_criterion(criterion.op, &criterion.value) {
                *slot = Some(match slot.take() {
                    Some(existing) => existing.intersect(bounds),
                    None => bounds,
                });
            }
        }
        prefilter
    }

    pub fn is_empty(&self) -> bool {
        *self == Prefilter::default()
    }

    /// In-memory form of the check storage performs.
    pub fn admits(&self, record: &PositionRecord) -> bool {
        let position = &record.position;
        let within = |bounds: &Option<Bounds>, n: i64| bounds.map_or(true, |b| b.contains(n));
        self.decision_type
            .map_or(true, |d| position.decision_type == d)
            && within(&self.cube_value, position.cube.value as i64)
            && within(&self.away1, position.score.away[Side::Player1.index()] as i64)
            && within(&self.away2, position.score.away[Side::Player2.index()] as i64)
            && within(&self.id, record.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_command;

    #[test]
    fn collects_indexed_fields_only() {
        let filter = parse_command("dt=cube cv>=2 cv<16 s1<=3 id5,9 b3 t:x").unwrap();
        let prefilter = Prefilter::from_criteria(&filter.criteria);
        assert_eq!(prefilter.decision_type, Some(DecisionType::Cube));
        assert_eq!(
            prefilter.cube_value,
            Some(Bounds {
                min: Some(2),
                max: Some(15)
            })
        );
        assert_eq!(
            prefilter.away1,
            Some(Bounds {
                min: None,
                max: Some(3)
            })
        );
        assert_eq!(prefilter.away2, None);
        assert_eq!(
            prefilter.id,
            Some(Bounds {
                min: Some(5),
                max: Some(9)
            })
        );
    }

    #[test]
    fn empty_for_unindexed_filters() {
        let filter = parse_command("t:blitz pd>10 dt:cube,checker").unwrap();
        assert!(Prefilter::from_criteria(&filter.criteria).is_empty());
    }
}
