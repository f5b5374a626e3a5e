//! Bases: named document collections
//!
//! Every mutation runs in one transaction that carries the primary write and
//! the auxiliary index writes together. In-memory index state is updated only
//! after that transaction commits.

mod keys;

pub use keys::{generate_key, take_key, KEY_ALPHABET, KEY_FIELD};

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::OakConfig;
use crate::embed::Embedder;
use crate::errors::{OakError, OakResult};
use crate::filter::Filter;
use crate::index::{EnableOutcome, IndexManager, Metric, CONF_TABLE};
use crate::query::{QueryExecutor, QueryLimits, QuerySource, SimilarQuery, Window};
use crate::response::{
    AddResponse, AddsResponse, DeleteResponse, DeletesResponse, GetResponse, ItemsResponse,
};
use crate::store::{decode_item, ItemRecord, Store};
use crate::value::format_timestamp;

/// Checks that `name` can be used as a base name.
///
/// Names are ASCII alphanumerics and `_`, and must not collide with derived
/// table names.
pub fn validate_base_name(name: &str) -> OakResult<()> {
    if name.is_empty() {
        return Err(OakError::invalid("base name must not be empty"));
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(OakError::invalid(format!(
            "base name '{}' may only contain ASCII letters, digits and '_'",
            name
        )));
    }
    if name.ends_with("_fts") || name.ends_with("_vec") || name == CONF_TABLE {
        return Err(OakError::invalid(format!(
            "base name '{}' is reserved for internal tables",
            name
        )));
    }
    Ok(())
}

/// A named collection of items inside an Oak instance
pub struct Base {
    name: String,
    store: Arc<Mutex<Store>>,
    indexes: IndexManager,
    embedder: Option<Arc<dyn Embedder>>,
    limits: QueryLimits,
    key_length: usize,
}

impl Base {
    /// Attaches to (or creates) the primary table of `name` and reloads its
    /// enabled indexes.
    pub(crate) fn open(
        name: &str,
        store: Arc<Mutex<Store>>,
        embedder: Option<Arc<dyn Embedder>>,
        config: &OakConfig,
    ) -> OakResult<Self> {
        validate_base_name(name)?;

        let indexes = {
            let mut guard = store.lock();
            if !guard.has_table(name) {
                let mut tx = guard.begin();
                tx.create_table(name)?;
                tx.commit()?;
            }
            IndexManager::load(name, &guard)?
        };

        info!(
            target: "oakdb::base",
            event = "BASE_OPENED",
            base = name,
            search_enabled = indexes.search_enabled(),
            vector_enabled = indexes.vector_enabled(),
            "base opened"
        );

        Ok(Self {
            name: name.to_string(),
            store,
            indexes,
            embedder,
            limits: config.limits(),
            key_length: config.key_length,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn search_enabled(&self) -> bool {
        self.indexes.search_enabled()
    }

    pub fn vector_enabled(&self) -> bool {
        self.indexes.vector_enabled()
    }

    /// Number of items in the base
    pub fn len(&self) -> usize {
        self.store.lock().row_count(&self.name)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn set_embedder(&mut self, embedder: Option<Arc<dyn Embedder>>) {
        self.embedder = embedder;
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds one item.
    ///
    /// Without `override_existing` an existing key fails with `KeyConflict`.
    /// With it the value is replaced, `created` is kept and `updated` moves
    /// forward.
    pub fn add(
        &mut self,
        mut value: Value,
        key: Option<&str>,
        override_existing: bool,
    ) -> OakResult<AddResponse> {
        let key = take_key(&mut value, key)?;

        let mut store = self.store.lock();
        let key = match key {
            Some(key) => key,
            None => generate_key(&store, &self.name, &BTreeSet::new(), self.key_length),
        };

        let existing = decode_item(&store, &self.name, &key)?;
        if existing.is_some() && !override_existing {
            return Err(OakError::KeyConflict { key });
        }

        let mut tx = store.begin();
        let now = format_timestamp(tx.timestamp());
        let created = existing.map_or_else(|| now.clone(), |record| record.created);
        let record = ItemRecord::new(value, created, now);

        tx.put(&self.name, &key, record.encode()?)?;
        let items = [(key.clone(), record.value.clone())];
        let delta = self
            .indexes
            .on_add(&mut tx, &items, self.embedder.as_deref())?;
        tx.commit()?;
        drop(store);
        self.indexes.apply(delta);

        debug!(target: "oakdb::base", event = "ITEM_ADDED", base = %self.name, key = %key);

        Ok(AddResponse {
            key,
            data: Some(record.value),
            created: Some(record.created),
            updated: Some(record.updated),
            error: None,
        })
    }

    /// Adds a batch of items, all or nothing.
    ///
    /// Without `override_existing`, a key already stored or repeated within
    /// the batch fails the whole batch.
    pub fn adds(&mut self, values: Vec<Value>, override_existing: bool) -> OakResult<AddsResponse> {
        if values.is_empty() {
            return Err(OakError::invalid("adds requires at least one item"));
        }

        let mut prepared = Vec::with_capacity(values.len());
        for mut value in values {
            let key = take_key(&mut value, None)?;
            prepared.push((key, value));
        }

        let mut store = self.store.lock();

        let mut seen = BTreeSet::new();
        for key in prepared.iter().filter_map(|(key, _)| key.as_ref()) {
            let repeated = !seen.insert(key.clone());
            if !override_existing && (repeated || store.contains(&self.name, key)) {
                return Err(OakError::KeyConflict { key: key.clone() });
            }
        }

        let mut items = Vec::with_capacity(prepared.len());
        for (key, value) in prepared {
            let key = match key {
                Some(key) => key,
                None => {
                    let key = generate_key(&store, &self.name, &seen, self.key_length);
                    seen.insert(key.clone());
                    key
                }
            };
            items.push((key, value));
        }

        let mut tx = store.begin();
        let now = format_timestamp(tx.timestamp());
        for (key, value) in &items {
            let created = decode_item(tx.store(), &self.name, key)?
                .map_or_else(|| now.clone(), |record| record.created);
            let record = ItemRecord::new(value.clone(), created, now.clone());
            tx.put(&self.name, key, record.encode()?)?;
        }
        let delta = self
            .indexes
            .on_add(&mut tx, &items, self.embedder.as_deref())?;
        tx.commit()?;
        drop(store);
        self.indexes.apply(delta);

        debug!(target: "oakdb::base", event = "ITEMS_ADDED", base = %self.name, count = items.len());

        Ok(AddsResponse {
            keys: items.into_iter().map(|(key, _)| key).collect(),
            success: true,
            error: None,
        })
    }

    /// Returns the item under `key`, or a not-found envelope.
    pub fn get(&self, key: &str) -> OakResult<GetResponse> {
        if key.is_empty() {
            return Err(OakError::invalid("key must not be empty"));
        }
        let store = self.store.lock();
        Ok(match decode_item(&store, &self.name, key)? {
            Some(record) => GetResponse {
                key: key.to_string(),
                data: Some(record.value),
                created: Some(record.created),
                updated: Some(record.updated),
                error: None,
            },
            None => GetResponse::not_found(key),
        })
    }

    /// Deletes one item. An absent key reports `deleted = false`.
    pub fn delete(&mut self, key: &str) -> OakResult<DeleteResponse> {
        if key.is_empty() {
            return Err(OakError::invalid("key must not be empty"));
        }
        let deleted = self.delete_keys(&[key.to_string()])?;
        Ok(DeleteResponse {
            key: key.to_string(),
            deleted: deleted == 1,
            error: None,
        })
    }

    /// Deletes several items in one transaction. Absent keys are listed in
    /// `missing` and excluded from the count.
    pub fn deletes(&mut self, keys: &[&str]) -> OakResult<DeletesResponse> {
        if keys.is_empty() {
            return Err(OakError::invalid("deletes requires at least one key"));
        }
        if keys.iter().any(|key| key.is_empty()) {
            return Err(OakError::invalid("key must not be empty"));
        }

        let mut unique = Vec::new();
        let mut seen = BTreeSet::new();
        for key in keys {
            if seen.insert(*key) {
                unique.push(key.to_string());
            }
        }

        let missing: Vec<String> = {
            let store = self.store.lock();
            unique
                .iter()
                .filter(|key| !store.contains(&self.name, key))
                .cloned()
                .collect()
        };
        let deletes = self.delete_keys(&unique)?;

        Ok(DeletesResponse {
            deletes,
            missing,
            error: None,
        })
    }

    fn delete_keys(&mut self, keys: &[String]) -> OakResult<usize> {
        let mut store = self.store.lock();
        let present: Vec<String> = keys
            .iter()
            .filter(|key| store.contains(&self.name, key))
            .cloned()
            .collect();
        if present.is_empty() {
            return Ok(0);
        }

        let mut tx = store.begin();
        for key in &present {
            tx.delete(&self.name, key)?;
        }
        let delta = self.indexes.on_delete(&mut tx, &present)?;
        tx.commit()?;
        drop(store);
        self.indexes.apply(delta);

        debug!(target: "oakdb::base", event = "ITEMS_DELETED", base = %self.name, count = present.len());
        Ok(present.len())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Items matching `filter`. Default order `created__desc`.
    pub fn fetch(&self, filter: &Value, order: Option<&str>, window: Window) -> OakResult<ItemsResponse> {
        self.run(QuerySource::All, filter, order, window)
    }

    /// Items containing every term of `query`, ranked by relevance.
    /// Default order `rank__desc`.
    pub fn search(
        &self,
        query: &str,
        filter: &Value,
        order: Option<&str>,
        window: Window,
    ) -> OakResult<ItemsResponse> {
        self.run(QuerySource::Text(query), filter, order, window)
    }

    /// Items scored by vector distance to the embedded `query`.
    /// Default order `distance__desc`.
    pub fn similar(
        &self,
        query: &str,
        filter: &Value,
        metric: Metric,
        order: Option<&str>,
        window: Window,
    ) -> OakResult<ItemsResponse> {
        let source = QuerySource::Similar {
            query: SimilarQuery::Text(query),
            metric,
        };
        self.run(source, filter, order, window)
    }

    /// Like [`Base::similar`] with a precomputed query vector.
    pub fn similar_vector(
        &self,
        vector: &[f32],
        filter: &Value,
        metric: Metric,
        order: Option<&str>,
        window: Window,
    ) -> OakResult<ItemsResponse> {
        let source = QuerySource::Similar {
            query: SimilarQuery::Vector(vector),
            metric,
        };
        self.run(source, filter, order, window)
    }

    fn run(
        &self,
        source: QuerySource<'_>,
        filter: &Value,
        order: Option<&str>,
        window: Window,
    ) -> OakResult<ItemsResponse> {
        let filter = Filter::parse(filter)?;
        let store = self.store.lock();
        QueryExecutor::new(
            &self.name,
            &store,
            &self.indexes,
            self.embedder.as_deref(),
            self.limits,
        )
        .execute(source, &filter, order, window)
    }

    // =========================================================================
    // Index lifecycle
    // =========================================================================

    pub fn enable_search(&mut self) -> OakResult<EnableOutcome> {
        let mut store = self.store.lock();
        self.indexes.enable_search(&mut store)
    }

    pub fn disable_search(&mut self, erase: bool) -> OakResult<()> {
        let mut store = self.store.lock();
        self.indexes.disable_search(&mut store, erase)
    }

    pub fn enable_vector(&mut self) -> OakResult<EnableOutcome> {
        let mut store = self.store.lock();
        self.indexes
            .enable_vector(&mut store, self.embedder.as_deref())
    }

    pub fn disable_vector(&mut self, erase: bool) -> OakResult<()> {
        let mut store = self.store.lock();
        self.indexes.disable_vector(&mut store, erase)
    }
}
