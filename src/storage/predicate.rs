use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{QfapError, Result};

/// A predicate document compiled for repeated evaluation.
///
/// Supports the subset of the MongoDB query language the compiler emits:
/// field equality, `$regex`, `$and` and `$or`. Against an array field both
/// equality and `$regex` match when any element does.
#[derive(Debug, Clone)]
pub enum Predicate {
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Equals { path: Vec<String>, value: Value },
    Regex { path: Vec<String>, regex: Regex },
}

impl Predicate {
    pub fn compile(doc: &Value) -> Result<Self> {
        let map = doc
            .as_object()
            .ok_or_else(|| QfapError::InvalidQuery(format!("predicate must be an object: {doc}")))?;

        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            clauses.push(match key.as_str() {
                "$and" => Predicate::All(Self::compile_list(key, value)?),
                "$or" => Predicate::Any(Self::compile_list(key, value)?),
                op if op.starts_with('$') => {
                    return Err(QfapError::InvalidQuery(format!("unsupported operator {op}")))
                }
                field => Self::compile_field(field, value)?,
            });
        }

        Ok(if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Predicate::All(clauses)
        })
    }

    fn compile_list(key: &str, value: &Value) -> Result<Vec<Predicate>> {
        value
            .as_array()
            .ok_or_else(|| QfapError::InvalidQuery(format!("{key} expects an array")))?
            .iter()
            .map(Self::compile)
            .collect()
    }

    fn compile_field(field: &str, value: &Value) -> Result<Predicate> {
        let path = field.split('.').map(str::to_string).collect();
        match value.get("$regex") {
            Some(Value::String(pattern)) => {
                let regex = Regex::new(pattern)
                    .map_err(|e| QfapError::InvalidQuery(format!("bad $regex on {field}: {e}")))?;
                Ok(Predicate::Regex { path, regex })
            }
            Some(other) => Err(QfapError::InvalidQuery(format!(
                "$regex on {field} expects a string, got {other}"
            ))),
            None => Ok(Predicate::Equals {
                path,
                value: value.clone(),
            }),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Predicate::All(clauses) => clauses.iter().all(|clause| clause.matches(doc)),
            Predicate::Any(clauses) => clauses.iter().any(|clause| clause.matches(doc)),
            Predicate::Equals { path, value } => {
                leaf_matches(resolve(doc, path), |found| values_equal(found, value))
            }
            Predicate::Regex { path, regex } => leaf_matches(resolve(doc, path), |found| {
                found.as_str().map_or(false, |s| regex.is_match(s))
            }),
        }
    }
}

fn resolve<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |current, key| current.get(key))
}

fn leaf_matches(found: Option<&Value>, test: impl Fn(&Value) -> bool) -> bool {
    match found {
        None => false,
        Some(Value::Array(items)) => items.iter().any(&test),
        Some(value) => test(value),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Keep only the dotted `paths` of `doc`.
pub fn project(doc: &Value, paths: &[String]) -> Value {
    let mut projected = Map::new();
    for path in paths {
        let keys: Vec<&str> = path.split('.').collect();
        if let Some(found) = keys.iter().try_fold(doc, |current, key| current.get(*key)) {
            insert_path(&mut projected, &keys, found.clone());
        }
    }
    Value::Object(projected)
}

fn insert_path(target: &mut Map<String, Value>, keys: &[&str], value: Value) {
    match keys {
        [] => {}
        [last] => {
            target.insert(last.to_string(), value);
        }
        [first, rest @ ..] => {
            let child = target
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                insert_path(child, rest, value);
            }
        }
    }
}
