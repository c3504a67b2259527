//! Conditional rendering of component nodes
//!
//! A node may declare `visible` (all conditions must hold) and `hidden` (any
//! condition excludes the node). Each declaration is a single condition or a
//! list of them:
//!
//! ```json
//! "visible": [
//!   { "$state": "/user/loggedIn", "eq": true },
//!   { "$state": "/app/showFeature", "not": false }
//! ]
//! ```

use crate::compare::{self, Comparison};
use crate::{EvalContext, Evaluator, Value};
use std::borrow::Borrow;
use std::sync::Arc;

/// Decides whether nodes are eligible for rendering
#[derive(Debug, Clone)]
pub struct VisibilityChecker {
    evaluator: Arc<Evaluator>,
}

impl VisibilityChecker {
    pub fn new(evaluator: Arc<Evaluator>) -> Self {
        Self { evaluator }
    }

    /// True when every `visible` condition holds (or none is declared)
    pub fn is_visible(&self, node: &Value, ctx: &EvalContext) -> bool {
        match declared(node, "visible") {
            None => true,
            Some(conditions) => conditions.iter().all(|c| self.check_condition(c, ctx)),
        }
    }

    /// True when any `hidden` condition holds
    pub fn is_hidden(&self, node: &Value, ctx: &EvalContext) -> bool {
        match declared(node, "hidden") {
            None => false,
            Some(conditions) => conditions.iter().any(|c| self.check_condition(c, ctx)),
        }
    }

    /// Final eligibility: visible and not hidden
    pub fn check_visibility(&self, node: &Value, ctx: &EvalContext) -> bool {
        self.is_visible(node, ctx) && !self.is_hidden(node, ctx)
    }

    /// Keep only eligible items, in their original order
    pub fn filter_visible<'i, T: Borrow<Value>>(&self, items: &'i [T], ctx: &EvalContext) -> Vec<&'i T> {
        items
            .iter()
            .filter(|item| self.check_visibility((*item).borrow(), ctx))
            .collect()
    }

    /// Check a single condition
    ///
    /// With a `$state` key the path is resolved and compared with the
    /// condition's operator. An expression (`$cond`, `$template`, ...) has
    /// already consumed its operator, so its result is only coerced to a
    /// boolean. Anything else is evaluated and compared.
    pub fn check_condition(&self, condition: &Value, ctx: &EvalContext) -> bool {
        let comparison = condition.as_map().and_then(Comparison::from_map);
        let subject = match condition.get("$state") {
            Some(Value::String(p)) => self.evaluator.resolve(ctx, p).cloned(),
            Some(other) => {
                log::warn!("visibility $state must be a string, got {}", other.type_name());
                None
            }
            None if is_expression(condition) => {
                let result = self.evaluator.evaluate(condition, ctx);
                return compare::check(result.as_ref(), None);
            }
            None => self.evaluator.evaluate(condition, ctx),
        };
        compare::check(subject.as_ref(), comparison.as_ref())
    }
}

const EXPRESSION_TAGS: [&str; 4] = ["$cond", "$template", "$computed", "$bindState"];

fn is_expression(condition: &Value) -> bool {
    condition
        .as_map()
        .is_some_and(|map| EXPRESSION_TAGS.iter().any(|tag| map.contains_key(*tag)))
}

/// The conditions under `key`, normalised to a slice; `None` when absent or null
fn declared<'v>(node: &'v Value, key: &str) -> Option<&'v [Value]> {
    match node.get(key)? {
        Value::Null => None,
        Value::List(list) => Some(list),
        single => Some(std::slice::from_ref(single)),
    }
}
