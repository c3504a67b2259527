//! ProtoFlow Stream - incremental compilation of streamed app documents
//!
//! - `SpecStreamCompiler` accumulates string chunks until they form a complete
//!   JSON document and reports what changed since the previous one
//! - `compute_patches` / `apply_patches` diff and patch `Value` trees with
//!   `add`, `remove`, `replace`, `move`, `copy` and `test` operations

mod compiler;
mod error;
pub mod patch;

pub use compiler::{SpecStreamCompiler, StreamUpdate};
pub use error::{Error, Result};
pub use patch::{apply_patches, compute_patches, Patch, PatchOp};
