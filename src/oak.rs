//! Oak instance: one file, one store, one embedding provider, many bases

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::base::{validate_base_name, Base};
use crate::config::OakConfig;
use crate::embed::{EmbedError, Embedder, HashingEmbedder};
use crate::errors::{OakError, OakResult};
use crate::index::{conf_flag_key, fts_table, vec_table, IndexKind, CONF_TABLE};
use crate::store::Store;

/// An open database
pub struct Oak {
    config: OakConfig,
    store: Arc<Mutex<Store>>,
    embedder: Option<Arc<dyn Embedder>>,
    bases: BTreeMap<String, Base>,
}

impl Oak {
    /// Opens the database file at `path` with default settings.
    pub fn open(path: &str) -> OakResult<Self> {
        Self::open_with_config(OakConfig::new(path))
    }

    /// Opens a volatile database.
    pub fn in_memory() -> OakResult<Self> {
        Self::open_with_config(OakConfig::in_memory())
    }

    pub fn open_with_config(config: OakConfig) -> OakResult<Self> {
        config.validate()?;

        let embedder = match config.hashing_embedder_dims {
            Some(dims) => {
                let hashing = HashingEmbedder::new(dims)
                    .map_err(|e: EmbedError| OakError::Config(e.to_string()))?;
                Some(Arc::new(hashing) as Arc<dyn Embedder>)
            }
            None => None,
        };

        let store = Store::open(&config.path, config.sync_on_commit)?;

        info!(
            target: "oakdb::base",
            event = "OAK_OPENED",
            path = %config.path,
            embedder = embedder.as_ref().map_or("none", |e| e.name()),
            "oak opened"
        );

        Ok(Self {
            config,
            store: Arc::new(Mutex::new(store)),
            embedder,
            bases: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &OakConfig {
        &self.config
    }

    /// Installs the embedding provider used by every base of this instance.
    ///
    /// Vectors already stored are not re-embedded; use one provider per file.
    pub fn set_embedder(&mut self, embedder: Arc<dyn Embedder>) {
        for base in self.bases.values_mut() {
            base.set_embedder(Some(Arc::clone(&embedder)));
        }
        self.embedder = Some(embedder);
    }

    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }

    /// Returns the base called `name`, creating its table on first use.
    pub fn base(&mut self, name: &str) -> OakResult<&mut Base> {
        match self.bases.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let base = Base::open(
                    name,
                    Arc::clone(&self.store),
                    self.embedder.clone(),
                    &self.config,
                )?;
                Ok(entry.insert(base))
            }
        }
    }

    /// Names of every base stored in the file
    pub fn base_names(&self) -> Vec<String> {
        let store = self.store.lock();
        store
            .table_names()
            .filter(|name| validate_base_name(name).is_ok())
            .map(str::to_string)
            .collect()
    }

    /// Removes a base: its primary table, both auxiliary tables and its
    /// configuration flags, in one transaction. With `main_only` the auxiliary
    /// tables and flags stay. Returns false if the primary table did not exist.
    pub fn drop_base(&mut self, name: &str, main_only: bool) -> OakResult<bool> {
        validate_base_name(name)?;

        let mut store = self.store.lock();
        if !store.has_table(name) {
            return Ok(false);
        }

        let mut tx = store.begin();
        tx.drop_table(name)?;
        if !main_only {
            tx.drop_table(&fts_table(name))?;
            tx.drop_table(&vec_table(name))?;
        }
        if !main_only && tx.table_exists(CONF_TABLE) {
            for kind in [IndexKind::Search, IndexKind::Vector] {
                tx.delete(CONF_TABLE, &conf_flag_key(name, kind))?;
            }
        }
        tx.commit()?;
        drop(store);

        self.bases.remove(name);
        info!(target: "oakdb::base", event = "BASE_DROPPED", base = name, main_only, "base dropped");
        Ok(true)
    }
}
