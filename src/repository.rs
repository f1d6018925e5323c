use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::cache::LocalCache;
use crate::categories::{split_category, CategoryIndex};
use crate::domain::Event;
use crate::error::{QfapError, Result};
use crate::query::{field_path, Filter, Query};
use crate::storage::{DocumentStore, FindOptions};
use crate::time::now_timestamp;

/// Source of "now" for the future-events policy.
pub trait Clock: Send + Sync {
    /// Current time as epoch seconds.
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        now_timestamp()
    }
}

/// The category and occurrence caches the repository maintains.
pub struct RepositoryCaches {
    pub categories: Arc<LocalCache>,
    pub occurrences: Arc<LocalCache>,
}

impl RepositoryCaches {
    /// Open `categories.json` and `occurrences.json` under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(Self {
            categories: Arc::new(LocalCache::open(dir.join("categories.json"))?),
            occurrences: Arc::new(LocalCache::open(dir.join("occurrences.json"))?),
        })
    }
}

/// Read access to events, always handed out normalized.
pub struct EventRepository {
    store: Arc<dyn DocumentStore>,
    caches: RepositoryCaches,
    clock: Arc<dyn Clock>,
}

impl EventRepository {
    pub fn new(store: Arc<dyn DocumentStore>, caches: RepositoryCaches) -> Self {
        Self {
            store,
            caches,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: &str) -> Result<Event> {
        let predicate = Query::equals(field_path("id"), id).to_document();
        match self.store.find_one(&predicate).await? {
            Some(doc) => materialize(doc),
            None => Err(QfapError::NotFound(id.to_string())),
        }
    }

    /// The next `n` events starting after now, soonest first.
    #[instrument(skip(self))]
    pub async fn get_upcoming(&self, n: usize) -> Result<Vec<Event>> {
        self.upcoming(&Query::MatchAll, n).await
    }

    #[instrument(skip(self))]
    pub async fn get_upcoming_by_category(&self, n: usize, category: &str) -> Result<Vec<Event>> {
        self.upcoming(&Query::equals(field_path("category"), category), n)
            .await
    }

    /// `n` future events of `category`, picked pseudo-randomly from `seed`.
    ///
    /// The same seed over the same data always gives the same events in the
    /// same order.
    #[instrument(skip(self))]
    pub async fn get_random_by_category(
        &self,
        n: usize,
        category: &str,
        seed: u64,
    ) -> Result<Vec<Event>> {
        let query = Query::equals(field_path("category"), category);
        let mut candidates = self.future_events(&query).await?;
        candidates.sort_by(|(a_start, a), (b_start, b)| {
            a_start.cmp(b_start).then_with(|| a.id.cmp(&b.id))
        });

        let mut rng = StdRng::seed_from_u64(seed);
        candidates.shuffle(&mut rng);
        candidates.truncate(n);
        Ok(candidates.into_iter().map(|(_, event)| event).collect())
    }

    /// Events matching `filter`, in storage order. A `limit` of 0 means no limit.
    #[instrument(skip(self, filter))]
    pub async fn search(&self, filter: &Filter, limit: usize) -> Result<Vec<Event>> {
        let query = filter.compile();
        let docs = self
            .store
            .find(&query.to_document(), FindOptions::default().limit(limit))
            .await?;
        let events = materialize_all(docs);
        debug!("Search returned {} events", events.len());
        Ok(events)
    }

    /// Epoch seconds of every occurrence of event `id`.
    #[instrument(skip(self))]
    pub async fn get_occurrences(&self, id: &str) -> Result<BTreeSet<i64>> {
        if let Some(cached) = self.caches.occurrences.get(id) {
            return Ok(cached.iter().filter_map(|ts| ts.parse().ok()).collect());
        }
        let occurrences = self.get_by_id(id).await?.occurrence_timestamps();

        // The cache rewrites its file on every write
        let cache = Arc::clone(&self.caches.occurrences);
        let key = id.to_string();
        let values = occurrences.iter().map(i64::to_string).collect();
        tokio::task::spawn_blocking(move || cache.set(key, values))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
        Ok(occurrences)
    }

    /// Clear the caches and index the categories of every stored event.
    pub async fn rebuild_caches(&self) -> Result<CategoryIndex> {
        self.caches.occurrences.clear()?;
        self.rebuild_category_index().await
    }

    #[instrument(skip(self))]
    pub async fn rebuild_category_index(&self) -> Result<CategoryIndex> {
        self.caches.categories.clear()?;
        let category_field = field_path("category");
        let docs = self
            .store
            .find(
                &Query::MatchAll.to_document(),
                FindOptions::default().project([category_field.clone()]),
            )
            .await?;

        let mut categories = Vec::with_capacity(docs.len());
        for doc in &docs {
            let category = doc
                .pointer("/fields/category")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    QfapError::MalformedData(format!("document without {category_field}: {doc}"))
                })?;
            categories.push(category);
        }

        let index = CategoryIndex::build(categories)?;
        index.persist(&self.caches.categories)?;
        info!("Indexed {} main categories from {} events", index.len(), docs.len());
        Ok(index)
    }

    pub fn get_all_categories(&self) -> CategoryIndex {
        CategoryIndex::load(&self.caches.categories)
    }

    /// Add the category of a newly seen event to the index.
    pub fn record_category(&self, category: &str) -> Result<bool> {
        let (main, sub) = split_category(category)?;
        self.caches.categories.push_unique(&main, &sub)
    }

    async fn upcoming(&self, query: &Query, n: usize) -> Result<Vec<Event>> {
        let mut events = self.future_events(query).await?;
        events.sort_by_key(|(start, _)| *start);
        events.truncate(n);
        Ok(events.into_iter().map(|(_, event)| event).collect())
    }

    /// Events matching `query` that start strictly after now, with their start time.
    async fn future_events(&self, query: &Query) -> Result<Vec<(i64, Event)>> {
        let now = self.clock.now();
        let docs = self
            .store
            .find(&query.to_document(), FindOptions::default())
            .await?;

        Ok(materialize_all(docs)
            .into_iter()
            .filter_map(|event| match event.start_timestamp() {
                Ok(start) => Some((start, event)),
                Err(e) => {
                    warn!("Skipping event {} without a usable start: {}", event.id, e);
                    None
                }
            })
            .filter(|(start, _)| *start > now)
            .collect())
    }
}

fn materialize(mut doc: Value) -> Result<Event> {
    let fields = doc
        .as_object_mut()
        .and_then(|map| map.remove("fields"))
        .unwrap_or(Value::Null);
    Event::from_record(fields)
}

fn materialize_all(docs: Vec<Value>) -> Vec<Event> {
    docs.into_iter()
        .filter_map(|doc| match materialize(doc) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Skipping unreadable record: {}", e);
                None
            }
        })
        .collect()
}
