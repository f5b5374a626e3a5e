//! Normalized predicate tree
//!
//! A filter is an OR of condition groups; a group is an AND of conditions.
//! An empty filter matches every row.

use std::fmt;

use serde_json::Value;

use crate::path::FieldRef;

/// Filter operators, written after `__` in a condition key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Starts,
    Ends,
    Contains,
    NotContains,
    Range,
    In,
    NotIn,
}

impl Operator {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(Operator::Eq),
            "ne" => Some(Operator::Ne),
            "lt" => Some(Operator::Lt),
            "gt" => Some(Operator::Gt),
            "lte" => Some(Operator::Lte),
            "gte" => Some(Operator::Gte),
            "starts" => Some(Operator::Starts),
            "ends" => Some(Operator::Ends),
            "contains" => Some(Operator::Contains),
            "!contains" => Some(Operator::NotContains),
            "range" => Some(Operator::Range),
            "in" => Some(Operator::In),
            "!in" => Some(Operator::NotIn),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Gt => "gt",
            Operator::Lte => "lte",
            Operator::Gte => "gte",
            Operator::Starts => "starts",
            Operator::Ends => "ends",
            Operator::Contains => "contains",
            Operator::NotContains => "!contains",
            Operator::Range => "range",
            Operator::In => "in",
            Operator::NotIn => "!in",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Operand, already checked against the operator's expected shape
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(Value),
    Pair(Value, Value),
    List(Vec<Value>),
}

/// A single `(field, operator, operand)` triple
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// The field reference as written by the caller
    pub reference: String,
    pub field: FieldRef,
    pub op: Operator,
    pub operand: Operand,
}

/// Conditions ANDed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionGroup {
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Condition groups ORed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub groups: Vec<ConditionGroup>,
}

impl Filter {
    /// The filter that matches every row
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches_all(&self) -> bool {
        self.groups.is_empty() || self.groups.iter().any(ConditionGroup::is_empty)
    }

    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.groups.iter().flat_map(|g| g.conditions.iter())
    }
}
