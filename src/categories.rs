use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::LocalCache;
use crate::error::{QfapError, Result};

/// Split `"Main -> Sub"` into its main and sub category.
///
/// Splits on the first `>`. The main part loses surrounding whitespace and
/// the hyphens of the `->` arrow; the sub part loses surrounding whitespace.
/// A category without `>` is malformed: stored categories are expected to
/// always carry one.
pub fn split_category(category: &str) -> Result<(String, String)> {
    let (main, sub) = category.split_once('>').ok_or_else(|| {
        QfapError::MalformedData(format!("category {category:?} has no '>' separator"))
    })?;
    let main = main.trim().trim_matches('-').trim();
    Ok((main.to_string(), sub.trim().to_string()))
}

/// Main category → its sub-categories, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CategoryIndex {
    categories: BTreeMap<String, Vec<String>>,
}

impl CategoryIndex {
    /// Index every category string. Fails on the first malformed one.
    pub fn build<I, S>(categories: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for category in categories {
            index.insert(category.as_ref())?;
        }
        Ok(index)
    }

    /// Add one category. Returns whether its sub-category was new.
    pub fn insert(&mut self, category: &str) -> Result<bool> {
        let (main, sub) = split_category(category)?;
        let subs = self.categories.entry(main).or_default();
        if subs.contains(&sub) {
            return Ok(false);
        }
        subs.push(sub);
        Ok(true)
    }

    pub fn get_all(&self) -> &BTreeMap<String, Vec<String>> {
        &self.categories
    }

    pub fn sub_categories(&self, main: &str) -> Option<&[String]> {
        self.categories.get(main).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn load(cache: &LocalCache) -> Self {
        Self {
            categories: cache.entries(),
        }
    }

    pub fn persist(&self, cache: &LocalCache) -> Result<()> {
        cache.replace_all(self.categories.clone())
    }
}
