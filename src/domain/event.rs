use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use super::normalize::normalize;
use crate::error::{QfapError, Result};
use crate::time::iso8601_to_timestamp;

/// Cover image metadata attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cover {
    pub id: String,
    pub mimetype: String,
    pub format: String,
    #[serde(deserialize_with = "string_list")]
    pub color_summary: Vec<String>,
    pub filename: String,
    pub width: i64,
    pub height: i64,
    pub thumbnail: bool,
}

/// A public event listing, materialized from a stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub lead_text: String,
    pub description: String,
    #[serde(deserialize_with = "string_list")]
    pub tags: Vec<String>,
    pub date_start: String,
    pub date_end: String,
    pub updated_at: String,
    pub date_description: String,
    /// `"Main -> Sub"`
    pub category: String,
    pub occurrences: String,
    pub programs: String,
    pub contact_name: String,
    pub price_detail: String,
    pub price_type: String,
    pub address_name: String,
    pub address_street: String,
    pub address_city: String,
    pub address_zipcode: String,
    #[serde(deserialize_with = "number_list")]
    pub lat_lon: Vec<f64>,
    pub access_type: String,
    pub access_phone: String,
    pub access_mail: String,
    pub access_link: String,
    pub contact_url: String,
    pub contact_phone: String,
    pub contact_mail: String,
    pub contact_facebook: String,
    pub contact_twitter: String,
    pub cover_url: String,
    pub cover: Cover,
    pub cover_alt: String,
    pub cover_credit: String,
    pub url: String,
    pub transport: String,
    /// Accessible to people with reduced mobility (0/1)
    pub pmr: i64,
    pub deaf: i64,
    pub blind: i64,
}

impl Event {
    /// Normalize a raw stored record and materialize it.
    ///
    /// Schema mismatches are logged and defaulted. Only a record that is not
    /// a mapping fails, with [`QfapError::InvalidRecord`].
    pub fn from_record(raw: Value) -> Result<Self> {
        let normalized = normalize(raw);
        serde_json::from_value(normalized.record)
            .map_err(|e| QfapError::InvalidRecord(e.to_string()))
    }

    pub fn tags(&self) -> BTreeSet<String> {
        self.tags.iter().cloned().collect()
    }

    pub fn start_timestamp(&self) -> Result<i64> {
        iso8601_to_timestamp(&self.date_start)
    }

    pub fn end_timestamp(&self) -> Result<i64> {
        iso8601_to_timestamp(&self.date_end)
    }

    /// Epoch seconds of every occurrence.
    ///
    /// Occurrences are stored as `start_end` pairs joined by `;`. Parts that
    /// don't parse are logged and skipped.
    pub fn occurrence_timestamps(&self) -> BTreeSet<i64> {
        self.occurrences
            .split(|c| c == '_' || c == ';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(|part| match iso8601_to_timestamp(part) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    warn!("Skipping occurrence of event {}: {}", self.id, e);
                    None
                }
            })
            .collect()
    }

    /// Lead text cut down to `limit` characters, ending with `...` when cut.
    ///
    /// Below 3 characters there is no room for the ellipsis and the text is
    /// cut bare.
    pub fn lead_text_snippet(&self, limit: usize) -> String {
        if self.lead_text.chars().count() <= limit {
            return self.lead_text.clone();
        }
        if limit < 3 {
            return self.lead_text.chars().take(limit).collect();
        }
        let head: String = self
            .lead_text
            .chars()
            .take(limit.saturating_sub(3))
            .collect();
        format!("{}...", head.trim())
    }

    pub fn main_category(&self) -> Option<&str> {
        self.category
            .split_once('>')
            .map(|(main, _)| main.trim().trim_matches('-').trim())
    }

    pub fn sub_category(&self) -> Option<&str> {
        self.category.split_once('>').map(|(_, sub)| sub.trim())
    }
}

fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<Value>::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect())
}

fn number_list<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<Value>::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": "100",
            "title": "Jazz au parc",
            "lead_text": "Un après-midi de jazz en plein air dans le plus beau parc de la ville, avec buvette et transats.",
            "tags": "Concert;Jazz;Plein air",
            "date_start": "2021-02-02T20:00:00+01:00",
            "date_end": "2021-02-02T22:00:00+01:00",
            "category": "Concerts -> Jazz",
            "occurrences": "2021-02-02T20:00:00+01:00_2021-02-02T22:00:00+01:00;2021-02-09T20:00:00+01:00_2021-02-09T22:00:00+01:00",
            "lat_lon": [48.85, "2.35"],
            "pmr": "1",
            "cover": {"id": "c1", "width": 800, "height": 600, "thumbnail": false}
        })
    }

    #[test]
    fn test_empty_record_materializes_zero_event() {
        let event = Event::from_record(json!({})).unwrap();
        assert_eq!(event, Event::default());
        assert_eq!(event.cover, Cover::default());
    }

    #[test]
    fn test_from_record_keeps_values() {
        let event = Event::from_record(sample()).unwrap();
        assert_eq!(event.id, "100");
        assert_eq!(event.pmr, 1);
        assert_eq!(event.lat_lon, vec![48.85, 2.35]);
        assert_eq!(event.cover.width, 800);
        assert_eq!(event.cover.mimetype, "");
        assert_eq!(
            event.tags(),
            ["Concert", "Jazz", "Plein air"]
                .iter()
                .map(|t| t.to_string())
                .collect()
        );
    }

    #[test]
    fn test_non_mapping_record_is_invalid() {
        assert!(matches!(
            Event::from_record(json!("garbage")),
            Err(QfapError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_occurrence_timestamps() {
        let event = Event::from_record(sample()).unwrap();
        let occurrences = event.occurrence_timestamps();
        assert_eq!(occurrences.len(), 4);
        assert!(occurrences.contains(&1612292400));
        assert!(occurrences.contains(&(1612292400 + 7 * 86400)));
    }

    #[test]
    fn test_occurrences_skip_garbage() {
        let event = Event {
            occurrences: "2021-02-02T20:00:00+01:00_soon".to_string(),
            ..Event::default()
        };
        assert_eq!(event.occurrence_timestamps().len(), 1);
        assert!(Event::default().occurrence_timestamps().is_empty());
    }

    #[test]
    fn test_lead_text_snippet() {
        let event = Event::from_record(sample()).unwrap();
        let snippet = event.lead_text_snippet(20);
        assert!(snippet.ends_with("..."));
        assert!(snippet.chars().count() <= 20);

        let short = Event {
            lead_text: "Court".to_string(),
            ..Event::default()
        };
        assert_eq!(short.lead_text_snippet(95), "Court");
    }

    #[test]
    fn test_lead_text_snippet_never_exceeds_limit() {
        let event = Event {
            lead_text: "Concert".to_string(),
            ..Event::default()
        };
        assert_eq!(event.lead_text_snippet(0), "");
        assert_eq!(event.lead_text_snippet(2), "Co");
        assert_eq!(event.lead_text_snippet(3), "...");
        assert_eq!(event.lead_text_snippet(5), "Co...");
        for limit in 0..10 {
            assert!(event.lead_text_snippet(limit).chars().count() <= limit);
        }
    }

    #[test]
    fn test_category_halves() {
        let event = Event::from_record(sample()).unwrap();
        assert_eq!(event.main_category(), Some("Concerts"));
        assert_eq!(event.sub_category(), Some("Jazz"));
        assert_eq!(Event::default().main_category(), None);
    }

    #[test]
    fn test_start_timestamp() {
        let event = Event::from_record(sample()).unwrap();
        assert_eq!(event.start_timestamp().unwrap(), 1612292400);
        assert!(Event::default().start_timestamp().is_err());
    }
}
