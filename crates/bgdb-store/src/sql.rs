use bgdb_query::{Bounds, Prefilter};
use rusqlite::types::Value as SqlValue;

/// WHERE fragment with bound parameters.
pub(crate) struct PrefilterSql {
    pub where_clause: String,
    pub params: Vec<SqlValue>,
}

/// Translate a prefilter into SQL over the `positions` table (aliased `p`).
pub(crate) fn compile_prefilter(prefilter: &Prefilter) -> PrefilterSql {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(decision) = prefilter.decision_type {
        conditions.push("p.decision_type = ?".to_string());
        params.push(SqlValue::Text(decision.as_str().to_string()));
    }
    let columns = [
        ("p.cube_value", &prefilter.cube_value),
        ("p.away1", &prefilter.away1),
        ("p.away2", &prefilter.away2),
        ("p.id", &prefilter.id),
    ];
    for (column, bounds) in columns {
        if let Some(bounds) = bounds {
            push_bounds(column, bounds, &mut conditions, &mut params);
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    PrefilterSql {
        where_clause,
        params,
    }
}

fn push_bounds(
    column: &str,
    bounds: &Bounds,
    conditions: &mut Vec<String>,
    params: &mut Vec<SqlValue>,
) {
    if let Some(min) = bounds.min {
        conditions.push(format!("{} >= ?", column));
        params.push(SqlValue::Integer(min));
    }
    if let Some(max) = bounds.max {
        conditions.push(format!("{} <= ?", column));
        params.push(SqlValue::Integer(max));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgdb_query::parse_command;

    fn sql_for(command: &str) -> PrefilterSql {
        let filter = parse_command(command).unwrap();
        compile_prefilter(&Prefilter::from_criteria(&filter.criteria))
    }

    #[test]
    fn empty_prefilter_has_no_where() {
        let sql = sql_for("t:prime b3");
        assert!(sql.where_clause.is_empty());
        assert!(sql.params.is_empty());
    }

    #[test]
    fn bounds_become_comparisons() {
        let sql = sql_for("dt=cube cv>=2 s2<5");
        assert_eq!(
            sql.where_clause,
            "WHERE p.decision_type = ? AND p.cube_value >= ? AND p.away2 <= ?"
        );
        assert_eq!(
            sql.params,
            vec![
                SqlValue::Text("cube".into()),
                SqlValue::Integer(2),
                SqlValue::Integer(4)
            ]
        );
    }

    #[test]
    fn ranges_use_both_ends() {
        let sql = sql_for("id10,20");
        assert_eq!(sql.where_clause, "WHERE p.id >= ? AND p.id <= ?");
        assert_eq!(sql.params.len(), 2);
    }
}
