//! Operator semantics over resolved field values
//!
//! No loose coercion: numbers never equal strings or booleans, and ordering
//! operators only compare number with number or string with string.
//! Substring operators are ASCII case-insensitive.

use std::cmp::Ordering;

use serde_json::Value;

use super::ast::{Condition, Operand, Operator};
use crate::path::{resolve, RowView};
use crate::value::{coerce_string, compare_scalars, values_equal};

/// Evaluates one condition against a row.
pub fn evaluate(condition: &Condition, row: &RowView<'_>) -> bool {
    let resolved = resolve(&condition.field, row);
    let field = resolved.as_deref();

    match (&condition.op, &condition.operand) {
        (Operator::Eq, Operand::Scalar(Value::Null)) => field.map_or(true, Value::is_null),
        (Operator::Ne, Operand::Scalar(Value::Null)) => field.is_some_and(|v| !v.is_null()),
        (Operator::Eq, Operand::Scalar(expected)) => field.is_some_and(|v| values_equal(v, expected)),
        (Operator::Ne, Operand::Scalar(expected)) => field.map_or(true, |v| !values_equal(v, expected)),

        (Operator::Lt, Operand::Scalar(bound)) => ordered(field, bound, |o| o == Ordering::Less),
        (Operator::Gt, Operand::Scalar(bound)) => ordered(field, bound, |o| o == Ordering::Greater),
        (Operator::Lte, Operand::Scalar(bound)) => ordered(field, bound, |o| o != Ordering::Greater),
        (Operator::Gte, Operand::Scalar(bound)) => ordered(field, bound, |o| o != Ordering::Less),

        (Operator::Starts, Operand::Scalar(needle)) => {
            substring(field, needle, |hay, needle| hay.starts_with(needle))
        }
        (Operator::Ends, Operand::Scalar(needle)) => {
            substring(field, needle, |hay, needle| hay.ends_with(needle))
        }
        (Operator::Contains, Operand::Scalar(needle)) => {
            substring(field, needle, |hay, needle| hay.contains(needle))
        }
        (Operator::NotContains, Operand::Scalar(needle)) => {
            !substring(field, needle, |hay, needle| hay.contains(needle))
        }

        (Operator::Range, Operand::Pair(lo, hi)) => field.is_some_and(|v| {
            matches!(
                compare_scalars(v, lo),
                Some(Ordering::Greater | Ordering::Equal)
            ) && matches!(compare_scalars(v, hi), Some(Ordering::Less | Ordering::Equal))
        }),

        (Operator::In, Operand::List(options)) => {
            field.is_some_and(|v| options.iter().any(|o| values_equal(v, o)))
        }
        (Operator::NotIn, Operand::List(options)) => {
            field.map_or(true, |v| !options.iter().any(|o| values_equal(v, o)))
        }

        // The parser never pairs an operator with another operand shape
        _ => false,
    }
}

fn ordered(field: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    field
        .and_then(|v| compare_scalars(v, bound))
        .is_some_and(accept)
}

fn substring(field: Option<&Value>, needle: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    let Some(hay) = field.and_then(coerce_string) else {
        return false;
    };
    let Some(needle) = coerce_string(needle) else {
        return false;
    };
    test(&hay.to_ascii_lowercase(), &needle.to_ascii_lowercase())
}
