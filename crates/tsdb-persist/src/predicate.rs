//! Compiled predicate IR consumed by `loadSubset`'s `where` option: a small
//! closed expression tree over a field path and a JSON literal, lowered to
//! SQL at the call site rather than accepting caller SQL text directly.

use serde_json::Value as JsonValue;
use tsdb_driver::SqlValue;
use tsdb_errors::{Result, TsdbError};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, JsonValue),
    Ne(String, JsonValue),
    Gt(String, JsonValue),
    Gte(String, JsonValue),
    Lt(String, JsonValue),
    Lte(String, JsonValue),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

pub(crate) struct CompiledSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

pub(crate) fn compile(predicate: &Predicate) -> Result<CompiledSql> {
    let mut params = Vec::new();
    let sql = lower(predicate, &mut params)?;
    Ok(CompiledSql { sql, params })
}

fn lower(predicate: &Predicate, params: &mut Vec<SqlValue>) -> Result<String> {
    match predicate {
        Predicate::Eq(field, value) => compare(field, "=", value, params),
        Predicate::Ne(field, value) => compare(field, "!=", value, params),
        Predicate::Gt(field, value) => compare(field, ">", value, params),
        Predicate::Gte(field, value) => compare(field, ">=", value, params),
        Predicate::Lt(field, value) => compare(field, "<", value, params),
        Predicate::Lte(field, value) => compare(field, "<=", value, params),
        Predicate::And(items) => combine(items, "AND", params),
        Predicate::Or(items) => combine(items, "OR", params),
        Predicate::Not(inner) => {
            let inner_sql = lower(inner, params)?;
            Ok(format!("NOT ({inner_sql})"))
        }
    }
}

fn combine(items: &[Predicate], joiner: &str, params: &mut Vec<SqlValue>) -> Result<String> {
    if items.is_empty() {
        return Ok(if joiner == "AND" { "1=1".to_string() } else { "1=0".to_string() });
    }
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(format!("({})", lower(item, params)?));
    }
    Ok(parts.join(&format!(" {joiner} ")))
}

fn compare(field: &str, op: &str, value: &JsonValue, params: &mut Vec<SqlValue>) -> Result<String> {
    let column = field_sql(field)?;
    params.push(json_literal_to_sql(value)?);
    Ok(format!("{column} {op} ?"))
}

/// `key` and `rowVersion` map straight to their physical columns; every
/// other field path is unsupported by the fixed schema and falls back to
/// `json_extract` on the opaque `value` payload, per explicit
/// fallback rule. Field paths are interpolated into SQL text (not bound as
/// parameters), so only a conservative character set is allowed.
pub(crate) fn field_sql(field: &str) -> Result<String> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.'));
    if !valid {
        return Err(TsdbError::InvalidPredicateField(field.to_string()));
    }
    Ok(match field {
        "key" => "key".to_string(),
        "rowVersion" => "row_version".to_string(),
        other => format!("json_extract(value, '$.{other}')"),
    })
}

fn json_literal_to_sql(value: &JsonValue) -> Result<SqlValue> {
    Ok(match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                return Err(TsdbError::InvalidPredicateField(format!(
                    "unrepresentable number literal: {n}"
                )));
            }
        }
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        other => {
            return Err(TsdbError::InvalidPredicateField(format!(
                "unsupported literal: {other}"
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_field_paths_with_sql_metacharacters() {
        let predicate = Predicate::Eq("id; DROP TABLE c_x".to_string(), JsonValue::from(1));
        assert!(compile(&predicate).is_err());
    }

    #[test]
    fn and_of_two_comparisons_binds_both_params_in_order() {
        let predicate = Predicate::And(vec![
            Predicate::Eq("status".to_string(), JsonValue::from("open")),
            Predicate::Gte("score".to_string(), JsonValue::from(10)),
        ]);
        let compiled = compile(&predicate).unwrap();
        assert_eq!(compiled.params.len(), 2);
        assert!(compiled.sql.contains("AND"));
    }
}
