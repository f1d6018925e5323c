use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::predicate::{project, Predicate};
use super::{DocumentStore, FindOptions};
use crate::error::Result;

/// A read-only collection held in memory, for datasets loaded from disk and for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollection {
    name: String,
    documents: Vec<Value>,
}

impl InMemoryCollection {
    pub fn new(name: impl Into<String>, documents: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            documents,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryCollection {
    async fn find(&self, predicate: &Value, options: FindOptions) -> Result<Vec<Value>> {
        let predicate = Predicate::compile(predicate)?;
        let limit = options.limit.filter(|&n| n > 0).unwrap_or(usize::MAX);

        let found: Vec<Value> = self
            .documents
            .iter()
            .filter(|doc| predicate.matches(doc))
            .take(limit)
            .map(|doc| match &options.projection {
                Some(paths) => project(doc, paths),
                None => doc.clone(),
            })
            .collect();

        debug!("{}: {} of {} documents matched", self.name, found.len(), self.documents.len());
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection() -> InMemoryCollection {
        InMemoryCollection::new(
            "dataset",
            vec![
                json!({"fields": {"id": "1", "category": "Concerts -> Jazz", "pmr": 1}}),
                json!({"fields": {"id": "2", "category": "Concerts -> Rock", "pmr": 0}}),
                json!({"fields": {"id": "3", "category": "Concerts -> Jazz", "pmr": 0}}),
            ],
        )
    }

    #[tokio::test]
    async fn test_find_keeps_storage_order() {
        let found = collection()
            .find(&json!({"fields.category": "Concerts -> Jazz"}), FindOptions::default())
            .await
            .unwrap();
        let ids: Vec<&str> = found
            .iter()
            .map(|doc| doc["fields"]["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_limit_zero_is_unlimited() {
        let store = collection();
        assert_eq!(store.find(&json!({}), FindOptions::default().limit(0)).await.unwrap().len(), 3);
        assert_eq!(store.find(&json!({}), FindOptions::default().limit(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_find_one() {
        let store = collection();
        let doc = store.find_one(&json!({"fields.pmr": 0})).await.unwrap().unwrap();
        assert_eq!(doc["fields"]["id"], json!("2"));
        assert!(store.find_one(&json!({"fields.id": "9"})).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_projection() {
        let found = collection()
            .find(&json!({}), FindOptions::default().project(["fields.category"]))
            .await
            .unwrap();
        assert_eq!(found[1], json!({"fields": {"category": "Concerts -> Rock"}}));
    }

    #[tokio::test]
    async fn test_bad_predicate_is_an_error() {
        assert!(collection()
            .find(&json!({"$nor": []}), FindOptions::default())
            .await
            .is_err());
    }
}
