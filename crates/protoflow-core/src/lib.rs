//! ProtoFlow Core - expression and visibility engine for declarative app documents
//!
//! This crate provides the synchronous, side-effect-free building blocks of the
//! ProtoFlow runtime:
//! - Dynamic value tree (`Value`, `ValueMap`) with JSON round-tripping
//! - Slash-path addressing into the state tree (`path`)
//! - Comparison operators shared by conditions (`Comparison`)
//! - Expression engine (`Expr`, `Evaluator`, `EvalContext`)
//! - Named computed functions (`ComputedRegistry`)
//! - Render eligibility of component nodes (`VisibilityChecker`)
//!
//! ## Undefined and null
//!
//! Expression results are `Option<Value>`: `None` is an absent value (an
//! unresolved path, a failed computed call), `Some(Value::Null)` is an explicit
//! null.

pub mod compare;
pub mod computed;
mod error;
mod expr;
pub mod path;
mod value;
mod visibility;

pub use compare::Comparison;
pub use computed::{ComputedFn, ComputedRegistry};
pub use error::{Error, Result};
pub use expr::{EvalContext, Evaluator, Expr};
pub use value::{Value, ValueMap};
pub use visibility::VisibilityChecker;
