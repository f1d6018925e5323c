// Document storage the repository reads events from

pub mod dataset;
pub mod in_memory;
pub mod predicate;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use dataset::{DatasetClient, Database};
pub use in_memory::InMemoryCollection;
pub use predicate::Predicate;

/// Options for [`DocumentStore::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Dotted paths to keep in each returned document. `None` keeps everything.
    pub projection: Option<Vec<String>>,
    /// Maximum number of documents. `None` or `Some(0)` means no limit.
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn project<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(paths.into_iter().map(Into::into).collect());
        self
    }
}

/// Read access to a collection of `{ "fields": { ... } }` documents.
///
/// Predicates use the document form of [`crate::query::Query`]. Errors from
/// the backing store surface as [`crate::error::QfapError::Unavailable`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, predicate: &Value, options: FindOptions) -> Result<Vec<Value>>;

    async fn find_one(&self, predicate: &Value) -> Result<Option<Value>> {
        let mut found = self.find(predicate, FindOptions::default().limit(1)).await?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }
}
