//! Comparison operators shared by `$cond`, visibility and watcher conditions

use crate::{Value, ValueMap};
use std::cmp::Ordering;

/// A single comparison against a literal operand
///
/// A condition object may carry several operator keys; only the first one in
/// the order `eq, not, gt, gte, lt, lte` is honoured.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Eq(Value),
    Not(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
}

impl Comparison {
    /// Operator keys in priority order
    pub const KEYS: [&'static str; 6] = ["eq", "not", "gt", "gte", "lt", "lte"];

    /// Pick the comparison out of a condition object, if it has one
    pub fn from_map(map: &ValueMap) -> Option<Comparison> {
        Self::KEYS.iter().find_map(|key| {
            let operand = map.get(*key)?.clone();
            Some(match *key {
                "eq" => Comparison::Eq(operand),
                "not" => Comparison::Not(operand),
                "gt" => Comparison::Gt(operand),
                "gte" => Comparison::Gte(operand),
                "lt" => Comparison::Lt(operand),
                _ => Comparison::Lte(operand),
            })
        })
    }

    /// Apply the comparison to a possibly undefined subject
    pub fn holds(&self, subject: Option<&Value>) -> bool {
        match self {
            Comparison::Eq(operand) => subject.map(|s| s.strict_eq(operand)).unwrap_or(false),
            Comparison::Not(operand) => !subject.map(|s| s.strict_eq(operand)).unwrap_or(false),
            Comparison::Gt(operand) => relate(subject, operand, |o| o == Ordering::Greater),
            Comparison::Gte(operand) => relate(subject, operand, |o| o != Ordering::Less),
            Comparison::Lt(operand) => relate(subject, operand, |o| o == Ordering::Less),
            Comparison::Lte(operand) => relate(subject, operand, |o| o != Ordering::Greater),
        }
    }
}

/// Check a subject against an optional comparison
///
/// Without a comparison the subject is coerced to a boolean (undefined is false).
pub fn check(subject: Option<&Value>, comparison: Option<&Comparison>) -> bool {
    match comparison {
        Some(cmp) => cmp.holds(subject),
        None => subject.map(Value::is_truthy).unwrap_or(false),
    }
}

/// Loose relational ordering: strings order lexicographically against
/// strings, everything else is coerced to a number first
fn relate(subject: Option<&Value>, operand: &Value, accept: fn(Ordering) -> bool) -> bool {
    let Some(subject) = subject else {
        return false;
    };
    let ordering = match (subject, operand) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (subject.to_number(), operand.to_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    ordering.map(accept).unwrap_or(false)
}
