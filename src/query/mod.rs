//! Typed predicate tree and its document form.
//!
//! A [`Query`] is what a [`Filter`] compiles to. Storage only ever sees the
//! document form produced by [`Query::to_document`], which uses the
//! MongoDB-style operators `$and`, `$or` and `$regex` over dotted field paths.

pub mod filter;

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::error::{QfapError, Result};

pub use filter::{BoolOperator, Filter, FilterBuilder, PriceType};

/// Path of a canonical event field inside a stored document.
pub fn field_path(field: &str) -> String {
    format!("fields.{field}")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Matches every document.
    MatchAll,
    Equals { field: String, value: Value },
    /// Case-sensitive, unanchored regular expression match.
    Regex { field: String, pattern: String },
    And(Vec<Query>),
    Or(Vec<Query>),
}

impl Query {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Query::Regex {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn to_document(&self) -> Value {
        match self {
            Query::MatchAll => Value::Object(Map::new()),
            Query::Equals { field, value } => {
                let mut doc = Map::new();
                doc.insert(field.clone(), value.clone());
                Value::Object(doc)
            }
            Query::Regex { field, pattern } => {
                let mut doc = Map::new();
                doc.insert(field.clone(), json!({ "$regex": pattern }));
                Value::Object(doc)
            }
            Query::And(clauses) => json!({ "$and": clauses.iter().map(Query::to_document).collect::<Vec<_>>() }),
            Query::Or(clauses) => json!({ "$or": clauses.iter().map(Query::to_document).collect::<Vec<_>>() }),
        }
    }

    /// Parse a predicate document back into a tree.
    ///
    /// A document with several keys is read as an implicit `$and` of one
    /// clause per key, in key order.
    pub fn from_document(doc: &Value) -> Result<Self> {
        let map = doc
            .as_object()
            .ok_or_else(|| QfapError::InvalidQuery(format!("expected an object, got {doc}")))?;

        let mut clauses = map
            .iter()
            .map(|(key, value)| Self::clause_from_entry(key, value))
            .collect::<Result<Vec<_>>>()?;

        Ok(match clauses.len() {
            0 => Query::MatchAll,
            1 => clauses.remove(0),
            _ => Query::And(clauses),
        })
    }

    fn clause_from_entry(key: &str, value: &Value) -> Result<Self> {
        match key {
            "$and" | "$or" => {
                let items = value.as_array().ok_or_else(|| {
                    QfapError::InvalidQuery(format!("{key} expects an array, got {value}"))
                })?;
                let clauses = items
                    .iter()
                    .map(Self::from_document)
                    .collect::<Result<Vec<_>>>()?;
                Ok(if key == "$and" {
                    Query::And(clauses)
                } else {
                    Query::Or(clauses)
                })
            }
            op if op.starts_with('$') => Err(QfapError::InvalidQuery(format!(
                "unsupported operator {op}"
            ))),
            field => match value.get("$regex") {
                Some(Value::String(pattern)) => Ok(Query::regex(field, pattern.clone())),
                Some(other) => Err(QfapError::InvalidQuery(format!(
                    "$regex on {field} expects a string, got {other}"
                ))),
                None => Ok(Query::equals(field, value.clone())),
            },
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_document())
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let doc = Value::deserialize(deserializer)?;
        Query::from_document(&doc).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_all_is_empty_document() {
        assert_eq!(Query::MatchAll.to_document(), json!({}));
        assert_eq!(Query::from_document(&json!({})).unwrap(), Query::MatchAll);
    }

    #[test]
    fn test_document_shape() {
        let query = Query::Or(vec![
            Query::regex("fields.title", "jazz"),
            Query::And(vec![
                Query::equals("fields.pmr", 1),
                Query::equals("fields.category", "Concerts -> Jazz"),
            ]),
        ]);
        assert_eq!(
            query.to_document(),
            json!({"$or": [
                {"fields.title": {"$regex": "jazz"}},
                {"$and": [
                    {"fields.pmr": 1},
                    {"fields.category": "Concerts -> Jazz"}
                ]}
            ]})
        );
    }

    #[test]
    fn test_round_trip_through_json_text() {
        let query = Query::And(vec![
            Query::Or(vec![
                Query::regex("fields.title", "a\"b"),
                Query::regex("fields.description", "a\"b"),
            ]),
            Query::equals("fields.price_type", "gratuit"),
            Query::And(vec![]),
        ]);
        let text = serde_json::to_string(&query).unwrap();
        let back: Query = serde_json::from_str(&text).unwrap();
        assert_eq!(back, query);
    }

    #[test]
    fn test_multi_key_document_is_implicit_and() {
        let query = Query::from_document(&json!({"fields.blind": 1, "fields.deaf": 1})).unwrap();
        assert_eq!(
            query,
            Query::And(vec![
                Query::equals("fields.blind", 1),
                Query::equals("fields.deaf", 1),
            ])
        );
    }

    #[test]
    fn test_invalid_documents() {
        assert!(Query::from_document(&json!([])).is_err());
        assert!(Query::from_document(&json!({"$nor": []})).is_err());
        assert!(Query::from_document(&json!({"$and": {}})).is_err());
        assert!(Query::from_document(&json!({"fields.title": {"$regex": 3}})).is_err());
    }
}
