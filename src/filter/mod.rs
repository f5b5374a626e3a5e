//! Filter compiler for oakdb
//!
//! Parses filter expressions into an OR-of-ANDs predicate tree and compiles
//! it into a predicate for a query kind.
//!
//! # Operators
//!
//! `eq ne lt gt lte gte starts ends contains !contains range in !in`
//!
//! Negated operators (`ne`, `!contains`, `!in`) match rows where the field is
//! absent; every other operator requires the field to resolve.

mod ast;
mod compile;
mod eval;
mod parser;

pub use ast::{Condition, ConditionGroup, Filter, Operand, Operator};
pub use compile::{BackendPredicate, QueryKind, RESERVED_METRICS};
pub use eval::evaluate;
