//! Filter expression parser
//!
//! Grammar:
//! - `null`, `{}` or `[]` match every row
//! - a mapping is one condition group
//! - a sequence of mappings is an OR of condition groups
//!
//! A condition key is `field` (implicit `eq`) or `field__operator`.

use serde_json::{Map, Value};

use super::ast::{Condition, ConditionGroup, Filter, Operand, Operator};
use crate::errors::{OakError, OakResult};
use crate::path::FieldRef;

const SEPARATOR: &str = "__";

impl Filter {
    /// Parses a filter expression into a normalized predicate tree.
    pub fn parse(expression: &Value) -> OakResult<Self> {
        match expression {
            Value::Null => Ok(Filter::all()),
            Value::Object(map) => Ok(Filter {
                groups: vec![parse_group(map)?],
            }),
            Value::Array(items) => {
                let groups = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => parse_group(map),
                        other => Err(OakError::malformed(
                            "",
                            format!("OR set entries must be mappings, got {}", kind_name(other)),
                        )),
                    })
                    .collect::<OakResult<Vec<_>>>()?;
                Ok(Filter { groups })
            }
            other => Err(OakError::malformed(
                "",
                format!(
                    "filter must be a mapping or a sequence of mappings, got {}",
                    kind_name(other)
                ),
            )),
        }
    }
}

fn parse_group(map: &Map<String, Value>) -> OakResult<ConditionGroup> {
    let conditions = map
        .iter()
        .map(|(key, operand)| parse_condition(key, operand))
        .collect::<OakResult<Vec<_>>>()?;
    Ok(ConditionGroup { conditions })
}

fn parse_condition(key: &str, operand: &Value) -> OakResult<Condition> {
    let parts: Vec<&str> = key.split(SEPARATOR).collect();
    let (reference, op) = match parts.as_slice() {
        [reference] => (*reference, Operator::Eq),
        [reference, token] => {
            let op = Operator::from_token(token).ok_or_else(|| {
                OakError::malformed(*reference, format!("unknown operator '{}'", token))
            })?;
            (*reference, op)
        }
        _ => {
            return Err(OakError::malformed(
                key,
                format!("more than one '{}' separator", SEPARATOR),
            ))
        }
    };

    let field = FieldRef::parse(reference)?;
    let operand = parse_operand(reference, op, operand)?;

    Ok(Condition {
        reference: reference.to_string(),
        field,
        op,
        operand,
    })
}

fn parse_operand(reference: &str, op: Operator, operand: &Value) -> OakResult<Operand> {
    match op {
        Operator::Eq | Operator::Ne => Ok(Operand::Scalar(operand.clone())),
        Operator::Lt | Operator::Gt | Operator::Lte | Operator::Gte => match operand {
            Value::Number(_) | Value::String(_) => Ok(Operand::Scalar(operand.clone())),
            other => Err(shape_error(reference, op, "a number or string", other)),
        },
        Operator::Starts | Operator::Ends | Operator::Contains | Operator::NotContains => {
            match operand {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    Ok(Operand::Scalar(operand.clone()))
                }
                other => Err(shape_error(reference, op, "a string, number or boolean", other)),
            }
        }
        Operator::Range => match operand {
            Value::Array(bounds) if bounds.len() == 2 => match (&bounds[0], &bounds[1]) {
                (lo @ Value::Number(_), hi @ Value::Number(_))
                | (lo @ Value::String(_), hi @ Value::String(_)) => {
                    Ok(Operand::Pair(lo.clone(), hi.clone()))
                }
                _ => Err(OakError::malformed(
                    reference,
                    "range bounds must both be numbers or both be strings",
                )),
            },
            other => Err(shape_error(reference, op, "a 2-element sequence", other)),
        },
        Operator::In | Operator::NotIn => match operand {
            Value::Array(items) => Ok(Operand::List(items.clone())),
            other => Err(shape_error(reference, op, "a sequence", other)),
        },
    }
}

fn shape_error(reference: &str, op: Operator, expected: &str, got: &Value) -> OakError {
    OakError::malformed(
        reference,
        format!("'{}' expects {}, got {}", op, expected, kind_name(got)),
    )
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
