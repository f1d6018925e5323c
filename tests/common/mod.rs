#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use qfap::repository::{EventRepository, RepositoryCaches};
use qfap::storage::InMemoryCollection;
use serde_json::{json, Value};

/// Three events in 2099 and one long past, as stored in the dataset.
pub fn events() -> Vec<Value> {
    vec![
        json!({"fields": {
            "id": "1",
            "title": "Jazz au parc",
            "description": "Concert gratuit en plein air",
            "category": "Concerts -> Jazz",
            "tags": ["Musique", "Plein air"],
            "price_type": "gratuit",
            "date_start": "2099-06-21T20:00:00+02:00",
            "occurrences": "2099-06-21T20:00:00+02:00_2099-06-21T23:00:00+02:00;2099-06-22T20:00:00+02:00_2099-06-22T23:00:00+02:00",
            "pmr": 1
        }}),
        json!({"fields": {
            "id": "2",
            "title": "Atelier C++",
            "description": "Apprendre à coder",
            "category": "Ateliers -> Informatique",
            "tags": ["Numérique"],
            "price_type": "payant",
            "date_start": "2099-03-01T14:00:00+01:00",
            "deaf": 1
        }}),
        json!({"fields": {
            "id": "3",
            "title": "Rock en Seine",
            "description": "Festival de rock, un peu de jazz",
            "category": "Concerts -> Rock",
            "tags": ["Musique", "Festival"],
            "price_type": "payant",
            "date_start": "2099-08-25T18:00:00+02:00"
        }}),
        json!({"fields": {
            "id": "4",
            "title": "Expo passée",
            "category": "Expositions -> Peinture",
            "tags": ["Art"],
            "price_type": "gratuit",
            "date_start": "2001-01-01T10:00:00+01:00",
            "blind": 1
        }}),
    ]
}

pub fn repository(cache_dir: &Path) -> EventRepository {
    let caches = RepositoryCaches::open(cache_dir).unwrap();
    let store = Arc::new(InMemoryCollection::new("dataset", events()));
    EventRepository::new(store, caches)
}

pub fn ids(events: &[qfap::domain::Event]) -> Vec<&str> {
    events.iter().map(|event| event.id.as_str()).collect()
}
