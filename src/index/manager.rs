//! Index lifecycle and mutation hooks for one Base
//!
//! Enabling an index backfills it from the primary table inside a single
//! transaction together with its flag, so a failed backfill never leaves the
//! flag set. Mutation hooks stage auxiliary writes into the caller's
//! transaction and hand back an [`IndexDelta`] to apply once it commits.

use serde_json::Value;
use tracing::{info, warn};

use super::text::TextIndex;
use super::vector::{decode_vector, encode_vector, VectorIndex};
use super::IndexKind;
use crate::embed::Embedder;
use crate::errors::{OakError, OakResult};
use crate::storage::{StorageError, StorageResult};
use crate::store::{decode_items, Store, Transaction};
use crate::value::{document_text, searchable_text};

/// Shared configuration table
pub const CONF_TABLE: &str = "oak_conf";

const FLAG_ON: &[u8] = b"1";
const FLAG_OFF: &[u8] = b"0";

/// Text index table for a base
pub fn fts_table(base: &str) -> String {
    format!("{}_fts", base)
}

/// Vector index table for a base
pub fn vec_table(base: &str) -> String {
    format!("{}_vec", base)
}

/// Configuration key holding a base's enabled flag for `kind`
pub fn conf_flag_key(base: &str, kind: IndexKind) -> String {
    format!("{}_{}", base, kind.as_str())
}

/// Result of an enable call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    /// The index was (re)built from the primary table
    Enabled { indexed: usize },
    /// The index was enabled and non-empty; nothing was done
    AlreadyEnabled,
}

/// In-memory changes to apply after a mutation commits
#[derive(Debug, Clone, Default)]
pub struct IndexDelta {
    text_upserts: Vec<(String, String)>,
    vector_upserts: Vec<(String, Vec<f32>)>,
    removals: Vec<String>,
}

impl IndexDelta {
    pub fn is_empty(&self) -> bool {
        self.text_upserts.is_empty() && self.vector_upserts.is_empty() && self.removals.is_empty()
    }
}

/// Owns the auxiliary indexes of one base.
///
/// In-memory structures exist only while the matching index is enabled.
pub struct IndexManager {
    base: String,
    text: Option<TextIndex>,
    vectors: Option<VectorIndex>,
}

impl IndexManager {
    /// Reads the flags of `base` and rebuilds the enabled in-memory indexes
    /// from their tables.
    pub fn load(base: &str, store: &Store) -> StorageResult<Self> {
        let mut manager = Self {
            base: base.to_string(),
            text: None,
            vectors: None,
        };

        if flag_set(store, &conf_flag_key(base, IndexKind::Search)) {
            let table = fts_table(base);
            let mut index = TextIndex::new();
            if let Some(rows) = store.table(&table) {
                for (key, bytes) in rows {
                    let text = std::str::from_utf8(bytes).map_err(|e| {
                        StorageError::corruption_in_row(&table, key, e.to_string())
                    })?;
                    index.upsert(key, text);
                }
            }
            manager.text = Some(index);
        }

        if flag_set(store, &conf_flag_key(base, IndexKind::Vector)) {
            let table = vec_table(base);
            let mut index = VectorIndex::new();
            if let Some(rows) = store.table(&table) {
                for (key, bytes) in rows {
                    index.upsert(key, decode_vector(bytes)?);
                }
            }
            manager.vectors = Some(index);
        }

        Ok(manager)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn search_enabled(&self) -> bool {
        self.text.is_some()
    }

    pub fn vector_enabled(&self) -> bool {
        self.vectors.is_some()
    }

    /// The text index, if enabled
    pub fn text(&self) -> Option<&TextIndex> {
        self.text.as_ref()
    }

    /// The vector index, if enabled
    pub fn vectors(&self) -> Option<&VectorIndex> {
        self.vectors.as_ref()
    }

    pub fn require(&self, kind: IndexKind) -> OakResult<()> {
        let enabled = match kind {
            IndexKind::Search => self.search_enabled(),
            IndexKind::Vector => self.vector_enabled(),
        };
        if enabled {
            Ok(())
        } else {
            Err(OakError::IndexNotEnabled {
                base: self.base.clone(),
                index: kind,
            })
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Enables full-text search, backfilling from the primary table.
    pub fn enable_search(&mut self, store: &mut Store) -> OakResult<EnableOutcome> {
        if self.text.as_ref().is_some_and(|t| !t.is_empty()) {
            return Ok(EnableOutcome::AlreadyEnabled);
        }

        let table = fts_table(&self.base);
        let rows: Vec<(String, String)> = decode_items(store, &self.base)?
            .into_iter()
            .map(|(key, record)| (key, searchable_text(&record.value)))
            .collect();

        let mut tx = store.begin();
        tx.create_table(CONF_TABLE)?;
        tx.create_table(&table)?;
        tx.clear_table(&table)?;
        for (key, text) in &rows {
            tx.put(&table, key, text.as_bytes().to_vec())?;
        }
        tx.put(
            CONF_TABLE,
            &conf_flag_key(&self.base, IndexKind::Search),
            FLAG_ON.to_vec(),
        )?;
        tx.commit()?;

        self.text = Some(TextIndex::from_rows(
            rows.iter().map(|(k, t)| (k.as_str(), t.as_str())),
        ));

        info!(
            target: "oakdb::index",
            event = "SEARCH_ENABLED",
            base = %self.base,
            indexed = rows.len(),
            "text index built"
        );
        Ok(EnableOutcome::Enabled {
            indexed: rows.len(),
        })
    }

    /// Disables full-text search. With `erase` the `{base}_fts` table is dropped.
    pub fn disable_search(&mut self, store: &mut Store, erase: bool) -> OakResult<()> {
        self.disable(store, IndexKind::Search, erase)?;
        self.text = None;
        Ok(())
    }

    /// Enables vector search. Every document is embedded before the
    /// transaction opens; a provider failure writes nothing.
    pub fn enable_vector(
        &mut self,
        store: &mut Store,
        embedder: Option<&dyn Embedder>,
    ) -> OakResult<EnableOutcome> {
        let embedder = embedder.ok_or_else(|| {
            OakError::embedding("no embedding provider is configured for this Oak instance")
        })?;

        if self.vectors.as_ref().is_some_and(|v| !v.is_empty()) {
            return Ok(EnableOutcome::AlreadyEnabled);
        }

        let table = vec_table(&self.base);
        let (keys, texts): (Vec<String>, Vec<String>) = decode_items(store, &self.base)?
            .into_iter()
            .map(|(key, record)| (key, document_text(&record.value)))
            .unzip();

        let vectors = match embed_all(embedder, &texts) {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(
                    target: "oakdb::index",
                    event = "VECTOR_BACKFILL_FAILED",
                    base = %self.base,
                    error = %e,
                    "embedding provider failed during backfill"
                );
                return Err(e);
            }
        };

        let mut tx = store.begin();
        tx.create_table(CONF_TABLE)?;
        tx.create_table(&table)?;
        tx.clear_table(&table)?;
        for (key, vector) in keys.iter().zip(&vectors) {
            tx.put(&table, key, encode_vector(vector))?;
        }
        tx.put(
            CONF_TABLE,
            &conf_flag_key(&self.base, IndexKind::Vector),
            FLAG_ON.to_vec(),
        )?;
        tx.commit()?;

        let mut index = VectorIndex::new();
        for (key, vector) in keys.iter().zip(vectors) {
            index.upsert(key, vector);
        }
        self.vectors = Some(index);

        info!(
            target: "oakdb::index",
            event = "VECTOR_ENABLED",
            base = %self.base,
            indexed = keys.len(),
            provider = embedder.name(),
            "vector index built"
        );
        Ok(EnableOutcome::Enabled {
            indexed: keys.len(),
        })
    }

    /// Disables vector search. With `erase` the `{base}_vec` table is dropped.
    pub fn disable_vector(&mut self, store: &mut Store, erase: bool) -> OakResult<()> {
        self.disable(store, IndexKind::Vector, erase)?;
        self.vectors = None;
        Ok(())
    }

    fn disable(&self, store: &mut Store, kind: IndexKind, erase: bool) -> OakResult<()> {
        let mut tx = store.begin();
        tx.create_table(CONF_TABLE)?;
        tx.put(CONF_TABLE, &conf_flag_key(&self.base, kind), FLAG_OFF.to_vec())?;
        if erase {
            let table = match kind {
                IndexKind::Search => fts_table(&self.base),
                IndexKind::Vector => vec_table(&self.base),
            };
            tx.drop_table(&table)?;
        }
        tx.commit()?;

        info!(
            target: "oakdb::index",
            event = "INDEX_DISABLED",
            base = %self.base,
            index = %kind,
            erase,
            "auxiliary index disabled"
        );
        Ok(())
    }

    // =========================================================================
    // Mutation hooks
    // =========================================================================

    /// Stages auxiliary rows for added or replaced items.
    ///
    /// Embeds all documents with one provider call when vector search is on.
    pub fn on_add(
        &self,
        tx: &mut Transaction<'_>,
        items: &[(String, Value)],
        embedder: Option<&dyn Embedder>,
    ) -> OakResult<IndexDelta> {
        let mut delta = IndexDelta::default();

        if self.search_enabled() {
            let table = fts_table(&self.base);
            for (key, value) in items {
                let text = searchable_text(value);
                tx.put(&table, key, text.as_bytes().to_vec())?;
                delta.text_upserts.push((key.clone(), text));
            }
        }

        if self.vector_enabled() && !items.is_empty() {
            let embedder = embedder.ok_or_else(|| {
                OakError::embedding("vector index is enabled but no embedding provider is configured")
            })?;
            let texts: Vec<String> = items.iter().map(|(_, value)| document_text(value)).collect();
            let vectors = embed_all(embedder, &texts)?;
            if let (Some(dims), Some(first)) = (
                self.vectors.as_ref().and_then(VectorIndex::dims),
                vectors.first(),
            ) {
                if first.len() != dims {
                    return Err(OakError::embedding(format!(
                        "provider returned {} dimensions, index has {}",
                        first.len(),
                        dims
                    )));
                }
            }
            let table = vec_table(&self.base);
            for ((key, _), vector) in items.iter().zip(vectors) {
                tx.put(&table, key, encode_vector(&vector))?;
                delta.vector_upserts.push((key.clone(), vector));
            }
        }

        Ok(delta)
    }

    /// Stages removal of auxiliary rows for deleted keys.
    pub fn on_delete(&self, tx: &mut Transaction<'_>, keys: &[String]) -> OakResult<IndexDelta> {
        let mut delta = IndexDelta::default();
        if self.search_enabled() {
            let table = fts_table(&self.base);
            for key in keys {
                tx.delete(&table, key)?;
            }
        }
        if self.vector_enabled() {
            let table = vec_table(&self.base);
            for key in keys {
                tx.delete(&table, key)?;
            }
        }
        if self.search_enabled() || self.vector_enabled() {
            delta.removals.extend(keys.iter().cloned());
        }
        Ok(delta)
    }

    /// Applies a committed delta to the in-memory indexes.
    pub fn apply(&mut self, delta: IndexDelta) {
        if let Some(text) = self.text.as_mut() {
            for key in &delta.removals {
                text.remove(key);
            }
            for (key, body) in &delta.text_upserts {
                text.upsert(key, body);
            }
        }
        if let Some(vectors) = self.vectors.as_mut() {
            for key in &delta.removals {
                vectors.remove(key);
            }
            for (key, vector) in delta.vector_upserts {
                vectors.upsert(&key, vector);
            }
        }
    }
}

fn flag_set(store: &Store, key: &str) -> bool {
    store.get(CONF_TABLE, key) == Some(FLAG_ON)
}

fn embed_all(embedder: &dyn Embedder, texts: &[String]) -> OakResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let vectors = embedder
        .embed_documents(texts)
        .map_err(|e| OakError::embedding(e.to_string()))?;
    if vectors.len() != texts.len() {
        return Err(OakError::embedding(format!(
            "provider returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        )));
    }
    if let Some(first) = vectors.first() {
        if vectors.iter().any(|v| v.len() != first.len()) {
            return Err(OakError::embedding("provider returned vectors of mixed dimensions"));
        }
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{EmbedError, HashingEmbedder};
    use crate::store::ItemRecord;
    use serde_json::json;

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::new("provider offline"))
        }

        fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::new("provider offline"))
        }
    }

    fn seeded_store() -> Store {
        let mut store = Store::in_memory();
        let mut tx = store.begin();
        tx.create_table("notes").unwrap();
        for (key, text) in [("a", "rust storage"), ("b", "python scripts")] {
            let record = ItemRecord::new(json!({"body": text}), "t".into(), "t".into());
            tx.put("notes", key, record.encode().unwrap()).unwrap();
        }
        tx.commit().unwrap();
        store
    }

    #[test]
    fn test_enable_search_backfills_and_sets_flag() {
        let mut store = seeded_store();
        let mut manager = IndexManager::load("notes", &store).unwrap();
        assert!(!manager.search_enabled());

        let outcome = manager.enable_search(&mut store).unwrap();
        assert_eq!(outcome, EnableOutcome::Enabled { indexed: 2 });
        assert_eq!(store.row_count("notes_fts"), 2);
        assert_eq!(store.get(CONF_TABLE, "notes_search"), Some(FLAG_ON));
        assert_eq!(manager.text().unwrap().search("rust").len(), 1);

        assert_eq!(
            manager.enable_search(&mut store).unwrap(),
            EnableOutcome::AlreadyEnabled
        );
    }

    #[test]
    fn test_disable_without_erase_retains_table() {
        let mut store = seeded_store();
        let mut manager = IndexManager::load("notes", &store).unwrap();
        manager.enable_search(&mut store).unwrap();

        manager.disable_search(&mut store, false).unwrap();
        assert!(!manager.search_enabled());
        assert!(store.has_table("notes_fts"));
        assert_eq!(store.get(CONF_TABLE, "notes_search"), Some(FLAG_OFF));

        manager.disable_search(&mut store, true).unwrap();
        assert!(!store.has_table("notes_fts"));
    }

    #[test]
    fn test_enable_vector_requires_provider() {
        let mut store = seeded_store();
        let mut manager = IndexManager::load("notes", &store).unwrap();
        let err = manager.enable_vector(&mut store, None).unwrap_err();
        assert_eq!(err.code(), "OAK_EMBEDDING_FAILURE");
    }

    #[test]
    fn test_failed_backfill_leaves_flag_unset() {
        let mut store = seeded_store();
        let mut manager = IndexManager::load("notes", &store).unwrap();
        let seq = store.last_seq();

        let err = manager
            .enable_vector(&mut store, Some(&FailingEmbedder))
            .unwrap_err();
        assert_eq!(err.code(), "OAK_EMBEDDING_FAILURE");
        assert!(!manager.vector_enabled());
        assert!(!store.has_table("notes_vec"));
        assert_eq!(store.last_seq(), seq);
    }

    #[test]
    fn test_load_restores_enabled_indexes() {
        let mut store = seeded_store();
        let embedder = HashingEmbedder::new(16).unwrap();
        {
            let mut manager = IndexManager::load("notes", &store).unwrap();
            manager.enable_search(&mut store).unwrap();
            manager.enable_vector(&mut store, Some(&embedder)).unwrap();
        }

        let manager = IndexManager::load("notes", &store).unwrap();
        assert!(manager.search_enabled());
        assert_eq!(manager.vectors().unwrap().len(), 2);
        assert_eq!(manager.vectors().unwrap().dims(), Some(16));
    }

    #[test]
    fn test_hooks_stage_into_caller_transaction() {
        let mut store = seeded_store();
        let mut manager = IndexManager::load("notes", &store).unwrap();
        manager.enable_search(&mut store).unwrap();

        let items = vec![("c".to_string(), json!({"body": "rust compilers"}))];
        let mut tx = store.begin();
        let delta = manager.on_add(&mut tx, &items, None).unwrap();
        assert_eq!(tx.op_count(), 1);
        drop(tx);
        assert_eq!(store.row_count("notes_fts"), 2);

        let mut tx = store.begin();
        let delta_again = manager.on_add(&mut tx, &items, None).unwrap();
        tx.commit().unwrap();
        manager.apply(delta_again);
        assert!(!delta.is_empty());
        assert_eq!(manager.text().unwrap().search("rust").len(), 2);

        let mut tx = store.begin();
        let removal = manager.on_delete(&mut tx, &["a".to_string()]).unwrap();
        tx.commit().unwrap();
        manager.apply(removal);
        assert_eq!(manager.text().unwrap().search("rust").len(), 1);
        assert_eq!(store.row_count("notes_fts"), 2);
    }
}
