//! Order specification: `field__direction`
//!
//! Field vocabulary depends on the query kind: fetch orders by `key`, `data`,
//! `created` or `updated`; search adds `rank`; similar adds `distance`.

use crate::errors::{OakError, OakResult};
use crate::filter::QueryKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Key,
    Data,
    Created,
    Updated,
    Rank,
    Distance,
}

impl OrderField {
    fn from_token(token: &str, kind: QueryKind) -> Option<Self> {
        match (token, kind) {
            ("key", _) => Some(OrderField::Key),
            ("data", _) => Some(OrderField::Data),
            ("created", _) => Some(OrderField::Created),
            ("updated", _) => Some(OrderField::Updated),
            ("rank", QueryKind::Search) => Some(OrderField::Rank),
            ("distance", QueryKind::Similar) => Some(OrderField::Distance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSpec {
    pub field: OrderField,
    pub direction: Direction,
}

impl OrderSpec {
    pub fn new(field: OrderField, direction: Direction) -> Self {
        Self { field, direction }
    }

    /// `created__desc` for fetch, `rank__desc` for search, `distance__desc`
    /// for similar (farthest first).
    pub fn default_for(kind: QueryKind) -> Self {
        match kind {
            QueryKind::Fetch => Self::new(OrderField::Created, Direction::Desc),
            QueryKind::Search => Self::new(OrderField::Rank, Direction::Desc),
            QueryKind::Similar => Self::new(OrderField::Distance, Direction::Desc),
        }
    }

    /// Parses an order token for `kind`; `None` selects the default.
    pub fn parse(order: Option<&str>, kind: QueryKind) -> OakResult<Self> {
        let Some(order) = order else {
            return Ok(Self::default_for(kind));
        };

        let invalid = || {
            OakError::invalid(format!(
                "invalid order '{}' for {} queries, expected field__asc or field__desc",
                order, kind
            ))
        };

        let (field, direction) = order.split_once("__").ok_or_else(invalid)?;
        let field = OrderField::from_token(field, kind).ok_or_else(invalid)?;
        let direction = Direction::from_token(direction).ok_or_else(invalid)?;
        Ok(Self::new(field, direction))
    }
}
