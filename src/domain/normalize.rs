use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::schema::{FieldKind, Schema, EVENT_SCHEMA};

/// A recoverable mismatch between a stored record and the canonical schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaWarning {
    /// A value of the wrong type was replaced or converted.
    Coerced {
        field: String,
        expected: &'static str,
        found: Value,
    },
    /// Keys present in the record but unknown to the schema.
    LeftoverFields {
        record: String,
        fields: BTreeSet<String>,
    },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::Coerced {
                field,
                expected,
                found,
            } => write!(f, "couldn't cast {field:?} to {expected}: {found}"),
            SchemaWarning::LeftoverFields { record, fields } => {
                write!(f, "leftover fields in {record}: {fields:?}")
            }
        }
    }
}

/// Outcome of reconciling a raw record with the schema.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub record: Value,
    pub warnings: Vec<SchemaWarning>,
}

/// Reconcile a raw event record with [`EVENT_SCHEMA`].
///
/// Missing fields are filled with their zero value, mistyped values are
/// coerced (or zeroed) with a warning, and unknown keys are reported. A value
/// that is not a mapping at all is logged and handed back untouched.
pub fn normalize(raw: Value) -> Normalized {
    normalize_with(raw, &EVENT_SCHEMA)
}

pub fn normalize_with(raw: Value, schema: &Schema) -> Normalized {
    let mut warnings = Vec::new();
    let record = match raw {
        Value::Object(map) => Value::Object(reconcile(map, schema, None, &mut warnings)),
        other => {
            error!("Record needs to be a mapping, got: {}", other);
            other
        }
    };
    Normalized { record, warnings }
}

fn reconcile(
    mut record: Map<String, Value>,
    schema: &Schema,
    parent: Option<&str>,
    warnings: &mut Vec<SchemaWarning>,
) -> Map<String, Value> {
    for (name, kind) in schema.fields() {
        let path = match parent {
            Some(parent) => format!("{parent}.{name}"),
            None => name.to_string(),
        };
        let value = match record.remove(name) {
            None | Some(Value::Null) => kind.default_value(),
            Some(value) => match kind {
                FieldKind::Record(nested) => match value {
                    Value::Object(map) => Value::Object(reconcile(map, nested, Some(&path), warnings)),
                    other => {
                        push_warning(warnings, &path, kind, other);
                        kind.default_value()
                    }
                },
                _ => match coerce(value, kind) {
                    Coercion::Clean(value) => value,
                    Coercion::Converted { value, found } => {
                        push_warning(warnings, &path, kind, found);
                        value
                    }
                    Coercion::Rejected(found) => {
                        push_warning(warnings, &path, kind, found);
                        kind.default_value()
                    }
                },
            },
        };
        record.insert(name.to_string(), value);
    }

    if record.len() != schema.len() {
        let leftovers: BTreeSet<String> = record
            .keys()
            .filter(|key| !schema.contains(key))
            .cloned()
            .collect();
        let record_name = parent.unwrap_or("event").to_string();
        warn!("Leftover fields in {}: {:?}", record_name, leftovers);
        for key in &leftovers {
            debug!("{}={}", key, record[key]);
        }
        warnings.push(SchemaWarning::LeftoverFields {
            record: record_name,
            fields: leftovers,
        });
    }

    record
}

fn push_warning(warnings: &mut Vec<SchemaWarning>, path: &str, kind: &FieldKind, found: Value) {
    warn!("Couldn't cast to {} {:?}: {}", kind.name(), path, found);
    warnings.push(SchemaWarning::Coerced {
        field: path.to_string(),
        expected: kind.name(),
        found,
    });
}

enum Coercion {
    Clean(Value),
    Converted { value: Value, found: Value },
    Rejected(Value),
}

/// Convert `value` to `kind`.
///
/// Lossless conversions (numeric strings, 0/1 booleans, `;`-joined lists)
/// are clean. Scalars stored in a text field keep their string form but are
/// still reported.
fn coerce(value: Value, kind: &FieldKind) -> Coercion {
    use Coercion::*;

    match (kind, value) {
        (FieldKind::Text, Value::String(s)) => Clean(Value::String(s)),
        (FieldKind::Text, found @ (Value::Number(_) | Value::Bool(_))) => Converted {
            value: Value::String(found.to_string()),
            found,
        },
        (FieldKind::Text, other) => Rejected(other),

        (FieldKind::Integer, Value::Number(n)) => match n.as_i64() {
            Some(i) => Clean(Value::from(i)),
            None => match n.as_f64() {
                Some(f) if f.is_finite() => Clean(Value::from(f.trunc() as i64)),
                _ => Rejected(Value::Number(n)),
            },
        },
        (FieldKind::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Clean(Value::from(i)),
            Err(_) => Rejected(Value::String(s)),
        },
        (FieldKind::Integer, Value::Bool(b)) => Clean(Value::from(b as i64)),
        (FieldKind::Integer, other) => Rejected(other),

        (FieldKind::Bool, Value::Bool(b)) => Clean(Value::Bool(b)),
        (FieldKind::Bool, Value::Number(n)) => match n.as_i64() {
            Some(0) => Clean(Value::Bool(false)),
            Some(1) => Clean(Value::Bool(true)),
            _ => Rejected(Value::Number(n)),
        },
        (FieldKind::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Clean(Value::Bool(true)),
            "false" | "0" => Clean(Value::Bool(false)),
            _ => Rejected(Value::String(s)),
        },
        (FieldKind::Bool, other) => Rejected(other),

        (FieldKind::List, Value::Array(items)) => Clean(Value::Array(items)),
        (FieldKind::List, Value::String(s)) => Clean(Value::Array(
            s.split(';')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        )),
        (FieldKind::List, other) => Rejected(other),

        (FieldKind::Record(_), other) => Rejected(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::COVER_SCHEMA;
    use serde_json::json;

    #[test]
    fn test_empty_mapping_is_fully_defaulted() {
        let normalized = normalize(json!({}));
        assert!(normalized.warnings.is_empty());
        let record = normalized.record.as_object().unwrap();
        assert_eq!(record.len(), EVENT_SCHEMA.len());
        assert_eq!(record["title"], json!(""));
        assert_eq!(record["pmr"], json!(0));
        assert_eq!(record["tags"], json!([]));
        assert_eq!(
            record["cover"],
            Value::Object(COVER_SCHEMA.default_record())
        );
    }

    #[test]
    fn test_unparseable_integer_is_zeroed_with_warning() {
        let normalized = normalize(json!({"pmr": "abc", "deaf": "1", "blind": 1.0}));
        let record = &normalized.record;
        assert_eq!(record["pmr"], json!(0));
        assert_eq!(record["deaf"], json!(1));
        assert_eq!(record["blind"], json!(1));
        assert_eq!(
            normalized.warnings,
            vec![SchemaWarning::Coerced {
                field: "pmr".to_string(),
                expected: "integer",
                found: json!("abc"),
            }]
        );
    }

    #[test]
    fn test_nested_cover_is_reconciled() {
        let normalized = normalize(json!({
            "cover": {"id": "c1", "width": "wide", "height": 480, "extra": true}
        }));
        let cover = &normalized.record["cover"];
        assert_eq!(cover["id"], json!("c1"));
        assert_eq!(cover["width"], json!(0));
        assert_eq!(cover["height"], json!(480));
        assert_eq!(cover["mimetype"], json!(""));
        assert!(normalized.warnings.contains(&SchemaWarning::Coerced {
            field: "cover.width".to_string(),
            expected: "integer",
            found: json!("wide"),
        }));
        assert!(normalized.warnings.contains(&SchemaWarning::LeftoverFields {
            record: "cover".to_string(),
            fields: ["extra".to_string()].into_iter().collect(),
        }));
    }

    #[test]
    fn test_cover_that_is_not_a_mapping_is_replaced() {
        let normalized = normalize(json!({"cover": "nope"}));
        assert_eq!(
            normalized.record["cover"],
            Value::Object(COVER_SCHEMA.default_record())
        );
        assert_eq!(normalized.warnings.len(), 1);
    }

    #[test]
    fn test_leftover_fields_warn_but_are_kept() {
        let normalized = normalize(json!({"title": "Jazz", "recordid": "abc"}));
        assert_eq!(normalized.record["title"], json!("Jazz"));
        assert_eq!(normalized.record["recordid"], json!("abc"));
        assert!(matches!(
            &normalized.warnings[..],
            [SchemaWarning::LeftoverFields { record, fields }]
                if record == "event" && fields.contains("recordid")
        ));
    }

    #[test]
    fn test_well_typed_values_are_preserved() {
        let normalized = normalize(json!({
            "id": "42",
            "title": "Concert",
            "lat_lon": [48.85, 2.35],
            "tags": "Concert;Jazz",
            "pmr": 1
        }));
        assert!(normalized.warnings.is_empty());
        assert_eq!(normalized.record["id"], json!("42"));
        assert_eq!(normalized.record["lat_lon"], json!([48.85, 2.35]));
        assert_eq!(normalized.record["tags"], json!(["Concert", "Jazz"]));
        assert_eq!(normalized.record["pmr"], json!(1));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let normalized = normalize(json!({"title": null, "cover": null}));
        assert!(normalized.warnings.is_empty());
        assert_eq!(normalized.record["title"], json!(""));
        assert_eq!(normalized.record["cover"]["thumbnail"], json!(false));
    }

    #[test]
    fn test_non_string_text_is_reported() {
        let normalized = normalize(json!({"address_zipcode": 75001, "title": ["x"]}));
        assert_eq!(normalized.record["address_zipcode"], json!("75001"));
        assert_eq!(normalized.record["title"], json!(""));
        assert_eq!(normalized.warnings.len(), 2);
    }

    #[test]
    fn test_non_mapping_is_returned_unchanged() {
        let normalized = normalize(json!(["not", "a", "record"]));
        assert_eq!(normalized.record, json!(["not", "a", "record"]));
        assert!(normalized.warnings.is_empty());
    }
}
