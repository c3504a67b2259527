//! Expression engine for dynamic properties
//!
//! Expressions are plain JSON values. A literal evaluates to itself; an object
//! carrying one of the recognised tags is interpreted:
//!
//! - `{"$state": "/path"}` reads the state tree
//! - `{"$cond": expr, "eq": v, "$then": a, "$else": b}` picks a branch
//! - `{"$template": "Hello ${/user/name}"}` interpolates paths
//! - `{"$computed": "name", "$args": {...}}` calls a computed function
//! - `{"$bindState": "/path"}` marks a two-way bound path
//!
//! Tags are checked in that order. Any other object is evaluated key by key.

use crate::compare::{self, Comparison};
use crate::computed::{ComputedFn, ComputedRegistry};
use crate::{path, Result, Value, ValueMap};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

/// A parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Returned as-is
    Literal(Value),
    /// Path lookup (the raw operand, expected to be a string)
    State(Value),
    /// Conditional with an optional comparison
    Cond {
        condition: Box<Expr>,
        comparison: Option<Comparison>,
        then: Option<Box<Expr>>,
        otherwise: Option<Box<Expr>>,
    },
    /// String interpolation of `${path}` tokens
    Template(Value),
    /// Named function call with positional arguments
    Computed { name: Value, args: Vec<Expr> },
    /// Two-way binding marker, evaluates to its path
    BindState(Value),
    /// Plain object, evaluated per key
    Object(IndexMap<String, Expr>),
    /// Sequence, evaluated per element
    List(Vec<Expr>),
}

/// Context for evaluating expressions
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// The state tree paths resolve against
    pub state: &'a Value,
    /// Extra computed functions, consulted before the evaluator's own
    pub functions: Option<&'a ComputedRegistry>,
}

impl<'a> EvalContext<'a> {
    /// Create a new evaluation context
    pub fn new(state: &'a Value) -> Self {
        Self { state, functions: None }
    }

    /// Attach call-site computed functions
    pub fn with_functions(mut self, functions: &'a ComputedRegistry) -> Self {
        self.functions = Some(functions);
        self
    }
}

impl Expr {
    /// Interpret a JSON value as an expression
    ///
    /// Never fails: anything unrecognised is a literal or a plain object.
    pub fn parse(value: &Value) -> Expr {
        match value {
            Value::Map(map) => Self::parse_map(map),
            Value::List(items) => Expr::List(items.iter().map(Expr::parse).collect()),
            other => Expr::Literal(other.clone()),
        }
    }

    fn parse_map(map: &ValueMap) -> Expr {
        if let Some(path) = map.get("$state") {
            return Expr::State(path.clone());
        }
        if let Some(condition) = map.get("$cond") {
            return Expr::Cond {
                condition: Box::new(Expr::parse(condition)),
                comparison: Comparison::from_map(map),
                then: map.get("$then").map(|v| Box::new(Expr::parse(v))),
                otherwise: map.get("$else").map(|v| Box::new(Expr::parse(v))),
            };
        }
        if let Some(template) = map.get("$template") {
            return Expr::Template(template.clone());
        }
        if let Some(name) = map.get("$computed") {
            let args = match map.get("$args").or_else(|| map.get("args")) {
                Some(Value::Map(args)) => args.values().map(Expr::parse).collect(),
                Some(Value::List(args)) => args.iter().map(Expr::parse).collect(),
                Some(single) => vec![Expr::parse(single)],
                None => Vec::new(),
            };
            return Expr::Computed { name: name.clone(), args };
        }
        if let Some(path) = map.get("$bindState") {
            return Expr::BindState(path.clone());
        }
        Expr::Object(map.iter().map(|(k, v)| (k.clone(), Expr::parse(v))).collect())
    }

    /// Evaluate the expression
    ///
    /// `None` is "undefined": an unresolved path, a missing `$else` branch or
    /// a failed computed call.
    pub fn eval(&self, evaluator: &Evaluator, ctx: &EvalContext) -> Option<Value> {
        match self {
            Expr::Literal(v) => Some(v.clone()),

            Expr::State(raw) => match raw.as_str() {
                Some(p) => evaluator.resolve(ctx, p).cloned(),
                None => {
                    log::warn!("$state path must be a string, got {}", raw.type_name());
                    None
                }
            },

            Expr::Cond {
                condition,
                comparison,
                then,
                otherwise,
            } => {
                let subject = condition.eval(evaluator, ctx);
                let branch = if compare::check(subject.as_ref(), comparison.as_ref()) {
                    then
                } else {
                    otherwise
                };
                branch.as_ref().and_then(|e| e.eval(evaluator, ctx))
            }

            Expr::Template(raw) => match raw.as_str() {
                Some(template) => Some(Value::String(evaluator.render_template(template, ctx))),
                None => {
                    log::warn!("$template must be a string, got {}", raw.type_name());
                    Some(Value::String(String::new()))
                }
            },

            Expr::Computed { name, args } => {
                let values: Vec<Value> = args
                    .iter()
                    .map(|a| a.eval(evaluator, ctx).unwrap_or(Value::Null))
                    .collect();
                let name = name.to_string();
                let Some(f) = evaluator.lookup(&name, ctx) else {
                    log::warn!("Computed function not found: {}", name);
                    return None;
                };
                match f(&values) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        log::warn!("Error executing computed function {}: {}", name, e);
                        None
                    }
                }
            }

            Expr::BindState(raw) => match raw.as_str() {
                Some(p) => Some(Value::String(p.to_string())),
                None => {
                    log::warn!("$bindState path must be a string, got {}", raw.type_name());
                    Some(Value::String(String::new()))
                }
            },

            Expr::Object(fields) => {
                let mut out = ValueMap::with_capacity(fields.len());
                for (key, expr) in fields {
                    if let Some(v) = expr.eval(evaluator, ctx) {
                        out.insert(key.clone(), v);
                    }
                }
                Some(Value::Map(out))
            }

            Expr::List(items) => Some(Value::List(
                items
                    .iter()
                    .map(|e| e.eval(evaluator, ctx).unwrap_or(Value::Null))
                    .collect(),
            )),
        }
    }

    /// Helper: create a literal expression
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Helper: create a state lookup
    pub fn state(path: impl Into<String>) -> Self {
        Expr::State(Value::String(path.into()))
    }
}

fn template_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").ok())
        .as_ref()
}

/// Evaluates expressions against a state tree
///
/// Holds the computed-function registry, pre-populated with the built-in
/// formatting functions.
#[derive(Debug, Clone)]
pub struct Evaluator {
    functions: ComputedRegistry,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Create an evaluator with the default computed functions
    pub fn new() -> Self {
        Self {
            functions: ComputedRegistry::with_defaults(),
        }
    }

    /// Create an evaluator with the defaults plus (overridden by) `functions`
    pub fn with_functions(functions: &ComputedRegistry) -> Self {
        let mut evaluator = Self::new();
        evaluator.functions.extend(functions);
        evaluator
    }

    /// Register or override a computed function
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.register(name, f);
    }

    pub fn functions(&self) -> &ComputedRegistry {
        &self.functions
    }

    /// Evaluate a raw JSON expression
    pub fn evaluate(&self, expr: &Value, ctx: &EvalContext) -> Option<Value> {
        match expr {
            Value::Map(_) | Value::List(_) => Expr::parse(expr).eval(self, ctx),
            literal => Some(literal.clone()),
        }
    }

    /// Resolve a slash path against the context state (empty path is undefined)
    pub fn resolve<'s>(&self, ctx: &EvalContext<'s>, p: &str) -> Option<&'s Value> {
        if p.is_empty() {
            return None;
        }
        path::resolve(ctx.state, p)
    }

    /// Render a `$template` string
    pub fn render_template(&self, template: &str, ctx: &EvalContext) -> String {
        let Some(pattern) = template_pattern() else {
            return template.to_string();
        };
        pattern
            .replace_all(template, |caps: &regex::Captures<'_>| {
                self.resolve(ctx, caps[1].trim())
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .into_owned()
    }

    fn lookup<'s>(&'s self, name: &str, ctx: &EvalContext<'s>) -> Option<&'s ComputedFn> {
        ctx.functions
            .and_then(|f| f.get(name))
            .or_else(|| self.functions.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    fn state() -> Value {
        json(r#"{
            "user": {"name": "Ada", "age": 36, "tags": ["x", "y"], "premium": true},
            "cart": {"total": 1234.5, "count": 0},
            "empty": null
        }"#)
    }

    fn eval(expr: &str) -> Option<Value> {
        let s = state();
        Evaluator::new().evaluate(&json(expr), &EvalContext::new(&s))
    }

    #[test]
    fn test_literals_pass_through() {
        assert_eq!(eval("42"), Some(Value::Int(42)));
        assert_eq!(eval(r#""text""#), Some(Value::from("text")));
        assert_eq!(eval("null"), Some(Value::Null));
    }

    #[test]
    fn test_state_lookup_matches_manual_walk() {
        assert_eq!(eval(r#"{"$state": "/user/name"}"#), Some(Value::from("Ada")));
        assert_eq!(eval(r#"{"$state": "user/age"}"#), Some(Value::Int(36)));
        assert_eq!(eval(r#"{"$state": "/user/tags/1"}"#), Some(Value::from("y")));
        assert_eq!(eval(r#"{"$state": "/user/missing"}"#), None);
        assert_eq!(eval(r#"{"$state": "/empty/deeper"}"#), None);
        assert_eq!(eval(r#"{"$state": ""}"#), None);
        assert_eq!(eval(r#"{"$state": 5}"#), None);
    }

    #[test]
    fn test_cond_branches() {
        let picked = eval(r#"{"$cond": {"$state": "/user/age"}, "eq": 36, "$then": "A", "$else": "B"}"#);
        assert_eq!(picked, Some(Value::from("A")));
        let other = eval(r#"{"$cond": {"$state": "/user/age"}, "eq": 35, "$then": "A", "$else": "B"}"#);
        assert_eq!(other, Some(Value::from("B")));
        let no_else = eval(r#"{"$cond": {"$state": "/cart/count"}, "$then": "A"}"#);
        assert_eq!(no_else, None);
        let gt = eval(r#"{"$cond": {"$state": "/cart/total"}, "gt": 1000, "$then": {"$state": "/user/name"}}"#);
        assert_eq!(gt, Some(Value::from("Ada")));
    }

    #[test]
    fn test_template_interpolation() {
        assert_eq!(
            eval(r#"{"$template": "Hi ${/user/name}, ${ /user/age } (${/nope})"}"#),
            Some(Value::from("Hi Ada, 36 ()"))
        );
        assert_eq!(eval(r#"{"$template": 1}"#), Some(Value::from("")));
    }

    #[test]
    fn test_computed_calls() {
        assert_eq!(
            eval(r#"{"$computed": "formatCurrency", "$args": {"value": {"$state": "/cart/total"}}}"#),
            Some(Value::from("¥1,234.50"))
        );
        assert_eq!(
            eval(r#"{"$computed": "join", "args": [{"$state": "/user/tags"}, "+"]}"#),
            Some(Value::from("x+y"))
        );
        assert_eq!(eval(r#"{"$computed": "nope"}"#), None);
        assert_eq!(eval(r#"{"$computed": "truncate", "$args": {"t": 5}}"#), None);
        assert_eq!(eval(r#"{"$computed": "formatNumber", "$args": [1.5, 1e12]}"#), None);
    }

    #[test]
    fn test_context_functions_take_precedence() {
        let s = state();
        let mut extra = ComputedRegistry::new();
        extra.register("join", |_args: &[Value]| Ok(Value::from("mine")));
        let ctx = EvalContext::new(&s).with_functions(&extra);
        let out = Evaluator::new().evaluate(&json(r#"{"$computed": "join", "$args": [[1,2]]}"#), &ctx);
        assert_eq!(out, Some(Value::from("mine")));
    }

    #[test]
    fn test_bind_state_returns_path() {
        assert_eq!(eval(r#"{"$bindState": "/form/email"}"#), Some(Value::from("/form/email")));
        assert_eq!(eval(r#"{"$bindState": {}}"#), Some(Value::from("")));
    }

    #[test]
    fn test_tag_priority() {
        assert_eq!(
            eval(r#"{"$template": "t", "$state": "/user/name"}"#),
            Some(Value::from("Ada"))
        );
    }

    #[test]
    fn test_plain_objects_and_lists_recurse() {
        let out = eval(
            r#"{"title": {"$state": "/user/name"}, "gone": {"$state": "/x"}, "list": [{"$state": "/x"}, 1]}"#,
        )
        .unwrap();
        assert_eq!(out.get("title"), Some(&Value::from("Ada")));
        assert!(out.get("gone").is_none(), "undefined keys are dropped");
        assert_eq!(out.get("list"), Some(&json("[null, 1]")));
    }
}
