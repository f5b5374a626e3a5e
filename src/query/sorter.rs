//! Result sorting for query execution
//!
//! Sorts by the requested field, then by key ascending so that pagination
//! is deterministic over an unchanged data set.

use std::cmp::Ordering;

use super::order::{Direction, OrderField, OrderSpec};
use crate::store::ItemRecord;
use crate::value::compare_values;

/// A matched row with its per-query metrics
#[derive(Debug, Clone)]
pub struct Hit {
    pub key: String,
    pub record: ItemRecord,
    pub rank: Option<f64>,
    pub distance: Option<f64>,
}

/// Sorts hits
pub struct ResultSorter;

impl ResultSorter {
    pub fn sort(hits: &mut [Hit], spec: &OrderSpec) {
        hits.sort_by(|a, b| {
            let ordering = Self::compare_field(a, b, spec.field);
            let ordering = match spec.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            ordering.then_with(|| a.key.cmp(&b.key))
        });
    }

    fn compare_field(a: &Hit, b: &Hit, field: OrderField) -> Ordering {
        match field {
            OrderField::Key => a.key.cmp(&b.key),
            OrderField::Data => compare_values(&a.record.value, &b.record.value),
            OrderField::Created => a.record.created.cmp(&b.record.created),
            OrderField::Updated => a.record.updated.cmp(&b.record.updated),
            OrderField::Rank => compare_metric(a.rank, b.rank),
            OrderField::Distance => compare_metric(a.distance, b.distance),
        }
    }
}

fn compare_metric(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}
