//! Query execution
//!
//! One executor call runs a fetch, search or similar query over a consistent
//! view of the store: the caller holds the store lock for its duration.

use tracing::debug;

use super::order::OrderSpec;
use super::sorter::{Hit, ResultSorter};
use crate::embed::Embedder;
use crate::errors::{OakError, OakResult};
use crate::filter::{BackendPredicate, Filter, QueryKind};
use crate::index::{tokenize, IndexKind, IndexManager, Metric};
use crate::path::RowView;
use crate::response::{ItemRow, ItemsResponse};
use crate::store::{decode_item, decode_items, ItemRecord, Store};

/// Default page sizes per query kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub fetch: usize,
    pub search: usize,
    pub similar: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            fetch: 1000,
            search: 10,
            similar: 3,
        }
    }
}

impl QueryLimits {
    pub fn for_kind(&self, kind: QueryKind) -> usize {
        match kind {
            QueryKind::Fetch => self.fetch,
            QueryKind::Search => self.search,
            QueryKind::Similar => self.similar,
        }
    }
}

/// Query input for a similar query
#[derive(Debug, Clone, Copy)]
pub enum SimilarQuery<'q> {
    /// Embedded with the provider's `embed_query`
    Text(&'q str),
    /// Used as is
    Vector(&'q [f32]),
}

/// What a query runs against
#[derive(Debug, Clone, Copy)]
pub enum QuerySource<'q> {
    All,
    Text(&'q str),
    Similar {
        query: SimilarQuery<'q>,
        metric: Metric,
    },
}

impl QuerySource<'_> {
    pub fn kind(&self) -> QueryKind {
        match self {
            QuerySource::All => QueryKind::Fetch,
            QuerySource::Text(_) => QueryKind::Search,
            QuerySource::Similar { .. } => QueryKind::Similar,
        }
    }
}

/// Pagination window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub limit: Option<usize>,
    pub page: Option<usize>,
}

impl Window {
    pub fn new(limit: usize, page: usize) -> Self {
        Self {
            limit: Some(limit),
            page: Some(page),
        }
    }
}

/// Executes queries for one base
pub struct QueryExecutor<'a> {
    base: &'a str,
    store: &'a Store,
    indexes: &'a IndexManager,
    embedder: Option<&'a dyn Embedder>,
    limits: QueryLimits,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(
        base: &'a str,
        store: &'a Store,
        indexes: &'a IndexManager,
        embedder: Option<&'a dyn Embedder>,
        limits: QueryLimits,
    ) -> Self {
        Self {
            base,
            store,
            indexes,
            embedder,
            limits,
        }
    }

    /// Runs a query and returns one page of results.
    ///
    /// `total` and `pages` cover the full filtered set. A page past the end
    /// yields no items.
    pub fn execute(
        &self,
        source: QuerySource<'_>,
        filter: &Filter,
        order: Option<&str>,
        window: Window,
    ) -> OakResult<ItemsResponse> {
        let kind = source.kind();
        let predicate = filter.to_backend(kind)?;
        let order = OrderSpec::parse(order, kind)?;
        let limit = window.limit.unwrap_or(self.limits.for_kind(kind)).max(1);
        let page = window.page.unwrap_or(1).max(1);

        let mut hits = match source {
            QuerySource::All => self.fetch_hits(&predicate)?,
            QuerySource::Text(query) => self.search_hits(query, &predicate)?,
            QuerySource::Similar { query, metric } => {
                self.similar_hits(query, metric, &predicate)?
            }
        };

        ResultSorter::sort(&mut hits, &order);

        let total = hits.len();
        let pages = total.div_ceil(limit);
        let start = (page - 1).saturating_mul(limit);
        let items = hits
            .into_iter()
            .skip(start)
            .take(limit)
            .map(|hit| ItemRow {
                key: hit.key,
                data: hit.record.value,
                created: hit.record.created,
                updated: hit.record.updated,
                rank: hit.rank,
                distance: hit.distance,
            })
            .collect::<Vec<_>>();

        debug!(
            target: "oakdb::query",
            base = self.base,
            kind = %kind,
            total,
            page,
            limit,
            returned = items.len(),
            "query executed"
        );

        Ok(ItemsResponse {
            page,
            pages,
            total,
            limit,
            items,
            error: None,
        })
    }

    fn fetch_hits(&self, predicate: &BackendPredicate) -> OakResult<Vec<Hit>> {
        Ok(decode_items(self.store, self.base)?
            .into_iter()
            .filter(|(key, record)| predicate.matches(&row_view(key, record)))
            .map(|(key, record)| Hit {
                key,
                record,
                rank: None,
                distance: None,
            })
            .collect())
    }

    fn search_hits(&self, query: &str, predicate: &BackendPredicate) -> OakResult<Vec<Hit>> {
        self.indexes.require(IndexKind::Search)?;
        if tokenize(query).is_empty() {
            return Err(OakError::invalid("search query has no terms"));
        }
        let Some(text) = self.indexes.text() else {
            return Ok(Vec::new());
        };

        let candidates = text.search(query);
        self.join(candidates, predicate, |hit, rank| hit.rank = Some(rank))
    }

    fn similar_hits(
        &self,
        query: SimilarQuery<'_>,
        metric: Metric,
        predicate: &BackendPredicate,
    ) -> OakResult<Vec<Hit>> {
        self.indexes.require(IndexKind::Vector)?;
        let Some(vectors) = self.indexes.vectors() else {
            return Ok(Vec::new());
        };

        let embedded;
        let query_vector: &[f32] = match query {
            SimilarQuery::Vector(vector) => vector,
            SimilarQuery::Text(text) => {
                if text.trim().is_empty() {
                    return Err(OakError::invalid("similar query must not be empty"));
                }
                let embedder = self.embedder.ok_or_else(|| {
                    OakError::embedding("no embedding provider is configured for this Oak instance")
                })?;
                embedded = embedder
                    .embed_query(text)
                    .map_err(|e| OakError::embedding(e.to_string()))?;
                &embedded
            }
        };

        let candidates = vectors.distances(query_vector, metric)?;
        self.join(candidates, predicate, |hit, distance| {
            hit.distance = Some(distance)
        })
    }

    /// Joins candidate keys with their primary rows and applies the predicate.
    fn join(
        &self,
        candidates: Vec<(String, f64)>,
        predicate: &BackendPredicate,
        set_metric: impl Fn(&mut Hit, f64),
    ) -> OakResult<Vec<Hit>> {
        let mut hits = Vec::with_capacity(candidates.len());
        for (key, metric) in candidates {
            let Some(record) = decode_item(self.store, self.base, &key)? else {
                continue;
            };
            if !predicate.matches(&row_view(&key, &record)) {
                continue;
            }
            let mut hit = Hit {
                key,
                record,
                rank: None,
                distance: None,
            };
            set_metric(&mut hit, metric);
            hits.push(hit);
        }
        Ok(hits)
    }
}

fn row_view<'r>(key: &'r str, record: &'r ItemRecord) -> RowView<'r> {
    RowView {
        key,
        value: &record.value,
        created: &record.created,
        updated: &record.updated,
    }
}
