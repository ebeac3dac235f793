//! Document-native queries.
//!
//! A [`Query`] is a Mongo-style filter document: keys are dotted paths into
//! the stored document (or `$and` / `$or`), values are either a literal to
//! compare against or an operator object such as `{"$in": [..]}`.
//!
//! Stores with no query engine of their own run [`Query::matches`] against
//! each candidate document instead.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const AND: &str = "$and";
const OR: &str = "$or";

/// A Mongo-style filter document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(Map<String, Value>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set the condition for `path`, replacing any earlier one.
    pub fn insert(&mut self, path: impl Into<String>, condition: Value) {
        self.0.insert(path.into(), condition);
    }

    /// Append a clause to the top-level `$and`, creating it on first use.
    pub fn push_and(&mut self, clause: Value) {
        match self.0.get_mut(AND) {
            Some(Value::Array(clauses)) => clauses.push(clause),
            _ => {
                self.0.insert(AND.to_string(), Value::Array(vec![clause]));
            },
        }
    }

    /// Merge every condition of `other` into this query. Conflicting paths are
    /// combined under `$and` rather than overwritten.
    pub fn merge(&mut self, other: Query) {
        for (key, value) in other.0 {
            if key == AND
                && let Value::Array(clauses) = value
            {
                for clause in clauses {
                    self.push_and(clause);
                }
            } else if self.0.contains_key(&key) {
                self.push_and(Value::Object(Map::from_iter([(key, value)])));
            } else {
                self.0.insert(key, value);
            }
        }
    }

    /// Re-anchor every path under `prefix`, descending into `$and` / `$or`.
    ///
    /// ```
    /// use recordbase_query::Query;
    /// use serde_json::json;
    ///
    /// let query: Query = serde_json::from_value(json!({
    ///     "faq.question": {"$regex": "why"},
    ///     "$and": [{"faq.answer": {"$regex": "because"}}],
    /// })).unwrap();
    /// let prefixed = query.prefixed("content");
    /// assert!(prefixed.get("content.faq.question").is_some());
    /// assert_eq!(prefixed.get("$and"), Some(&json!([{"content.faq.answer": {"$regex": "because"}}])));
    /// ```
    pub fn prefixed(&self, prefix: &str) -> Query {
        Query(prefix_map(&self.0, prefix))
    }

    /// Whether `document` satisfies every condition.
    pub fn matches(&self, document: &Value) -> Result<bool> {
        for (key, condition) in &self.0 {
            let satisfied = match key.as_str() {
                AND => {
                    let mut all = true;
                    for clause in clauses(key, condition)? {
                        if !Query::from_clause(clause)?.matches(document)? {
                            all = false;
                            break;
                        }
                    }
                    all
                },
                OR => {
                    let mut any = false;
                    for clause in clauses(key, condition)? {
                        if Query::from_clause(clause)?.matches(document)? {
                            any = true;
                            break;
                        }
                    }
                    any
                },
                op if op.starts_with('$') => {
                    exn::bail!(ErrorKind::MalformedQuery(format!("unsupported top-level operator `{op}`")))
                },
                path => condition_holds(&resolve(document, path), condition)?,
            };
            if !satisfied {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn from_clause(clause: &Value) -> Result<Query> {
        match clause {
            Value::Object(map) => Ok(Query(map.clone())),
            other => exn::bail!(ErrorKind::MalformedQuery(format!("expected a sub-query object, found `{other}`"))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Query {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

fn prefix_map(map: &Map<String, Value>, prefix: &str) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| match key.as_str() {
            AND | OR => {
                let value = match value {
                    Value::Array(items) => Value::Array(
                        items
                            .iter()
                            .map(|item| match item {
                                Value::Object(inner) => Value::Object(prefix_map(inner, prefix)),
                                other => other.clone(),
                            })
                            .collect(),
                    ),
                    other => other.clone(),
                };
                (key.clone(), value)
            },
            op if op.starts_with('$') => (key.clone(), value.clone()),
            path => (format!("{prefix}.{path}"), value.clone()),
        })
        .collect()
}

fn clauses<'a>(key: &str, condition: &'a Value) -> Result<&'a Vec<Value>> {
    match condition {
        Value::Array(items) => Ok(items),
        _ => exn::bail!(ErrorKind::MalformedQuery(format!("`{key}` requires an array of sub-queries"))),
    }
}

/// Values reachable at a dotted path.
///
/// Arrays met part-way are traversed element-wise, so `a.b` over
/// `{"a": [{"b": 1}, {"b": 2}]}` yields both `1` and `2`.
fn resolve<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![document];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            step(value, segment, &mut next);
        }
        current = next;
    }
    current
}

fn step<'a>(value: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(segment) {
                out.push(child);
            }
        },
        Value::Array(items) => {
            if let Ok(index) = segment.parse::<usize>()
                && let Some(item) = items.get(index)
            {
                out.push(item);
                return;
            }
            for item in items {
                if let Value::Object(map) = item
                    && let Some(child) = map.get(segment)
                {
                    out.push(child);
                }
            }
        },
        _ => {},
    }
}

/// Leaf values expanded for comparison: an array matches both as a whole and
/// through each of its elements.
fn candidates<'a>(resolved: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for value in resolved {
        out.push(*value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

fn condition_holds(resolved: &[&Value], condition: &Value) -> Result<bool> {
    let operators = match condition {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
        literal => return Ok(equals_any(resolved, literal)),
    };
    for (op, operand) in operators {
        let holds = match op.as_str() {
            "$eq" => equals_any(resolved, operand),
            "$ne" => !equals_any(resolved, operand),
            "$in" => operand_list(op, operand)?.iter().any(|v| equals_any(resolved, v)),
            "$nin" => !operand_list(op, operand)?.iter().any(|v| equals_any(resolved, v)),
            "$all" => {
                let wanted = operand_list(op, operand)?;
                !wanted.is_empty() && wanted.iter().all(|v| equals_any(resolved, v))
            },
            "$exists" => operand.as_bool().unwrap_or(true) == !resolved.is_empty(),
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_raise(|| ErrorKind::MalformedQuery("`$regex` requires a string".to_string()))?;
                let regex = Regex::new(pattern).or_raise(|| ErrorKind::InvalidPattern(pattern.to_string()))?;
                candidates(resolved).iter().any(|v| v.as_str().is_some_and(|s| regex.is_match(s)))
            },
            other => exn::bail!(ErrorKind::MalformedQuery(format!("unsupported operator `{other}`"))),
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

fn operand_list<'a>(op: &str, operand: &'a Value) -> Result<&'a Vec<Value>> {
    match operand {
        Value::Array(items) => Ok(items),
        _ => exn::bail!(ErrorKind::MalformedQuery(format!("`{op}` requires an array"))),
    }
}

/// Equality as document stores see it: a missing path equals `null`.
fn equals_any(resolved: &[&Value], wanted: &Value) -> bool {
    if resolved.is_empty() {
        return wanted.is_null();
    }
    candidates(resolved).iter().any(|v| same(v, wanted))
}

/// Value equality with numbers compared by magnitude, so `5` equals `5.0`.
pub(crate) fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn query(value: Value) -> Query {
        serde_json::from_value(value).unwrap()
    }

    fn doc() -> Value {
        json!({
            "name": "w1",
            "content": {
                "widget": {
                    "label": "sprocket",
                    "count": 3,
                    "tags": ["red", "round"],
                    "part": [{"kind": "gear"}, {"kind": "axle"}],
                }
            }
        })
    }

    #[rstest]
    #[case(json!({}), true)]
    #[case(json!({"name": "w1"}), true)]
    #[case(json!({"name": "w2"}), false)]
    #[case(json!({"content.widget.count": {"$in": [1, 3]}}), true)]
    #[case(json!({"content.widget.count": {"$in": [3.0]}}), true)]
    #[case(json!({"content.widget.count": {"$in": []}}), false)]
    #[case(json!({"content.widget.tags": "red"}), true)]
    #[case(json!({"content.widget.tags": {"$all": ["red", "round"]}}), true)]
    #[case(json!({"content.widget.tags": {"$all": ["red", "blue"]}}), false)]
    #[case(json!({"content.widget.part.kind": {"$in": ["axle"]}}), true)]
    #[case(json!({"content.widget.part.kind": {"$in": ["cog"]}}), false)]
    #[case(json!({"content.widget.part.0.kind": "gear"}), true)]
    #[case(json!({"content.widget.label": {"$regex": "rock"}}), true)]
    #[case(json!({"content.widget.missing": {"$exists": false}}), true)]
    #[case(json!({"content.widget.missing": null}), true)]
    #[case(json!({"$or": [{"name": "x"}, {"name": "w1"}]}), true)]
    #[case(json!({"$and": [{"name": "w1"}, {"content.widget.count": 4}]}), false)]
    fn test_matches(#[case] q: Value, #[case] expected: bool) {
        assert_eq!(query(q).matches(&doc()).unwrap(), expected);
    }

    #[test]
    fn test_bad_operator_is_an_error() {
        let err = query(json!({"name": {"$near": 1}})).matches(&doc()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MalformedQuery(_)));
        let err = query(json!({"name": {"$regex": "("}})).matches(&doc()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPattern(_)));
    }

    #[test]
    fn test_push_and_accumulates() {
        let mut q = Query::new();
        q.push_and(json!({"a": 1}));
        q.push_and(json!({"b": 2}));
        assert_eq!(q.get("$and"), Some(&json!([{"a": 1}, {"b": 2}])));
    }

    #[test]
    fn test_merge_combines_conflicts() {
        let mut q = query(json!({"a": 1}));
        q.merge(query(json!({"a": 2, "b": 3})));
        assert_eq!(q.get("b"), Some(&json!(3)));
        assert_eq!(q.get("$and"), Some(&json!([{"a": 2}])));
    }
}
