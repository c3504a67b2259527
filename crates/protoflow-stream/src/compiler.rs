//! Incremental compiler for documents arriving as string chunks
//!
//! Every chunk is appended to a buffer and the buffer is re-parsed. While the
//! document is incomplete the buffer is kept and the parse error reported; once
//! it parses, the new document is diffed against the previous one, becomes the
//! new baseline and the buffer is cleared.

use crate::patch::{compute_patches, Patch};
use crate::{Error, Result};
use protoflow_core::Value;

/// Outcome of a single [`SpecStreamCompiler::push`]
#[derive(Debug)]
pub struct StreamUpdate {
    /// Latest complete document, if any has been parsed so far
    pub result: Option<Value>,
    /// Patches from the previous baseline to the document completed by this push
    pub new_patches: Vec<Patch>,
    /// Whether this push completed a document
    pub is_complete: bool,
    /// Why the buffer did not parse (expected while a document is incomplete)
    pub error: Option<Error>,
}

/// Streaming document compiler
#[derive(Debug, Default)]
pub struct SpecStreamCompiler {
    buffer: String,
    result: Option<Value>,
    history: Vec<Patch>,
}

impl SpecStreamCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and try to complete the document
    pub fn push(&mut self, chunk: &str) -> StreamUpdate {
        self.buffer.push_str(chunk);

        match self.try_parse() {
            Ok(doc) => {
                let new_patches = compute_patches(self.result.as_ref(), &doc);
                log::debug!(
                    "stream document complete ({} bytes, {} patches)",
                    self.buffer.len(),
                    new_patches.len()
                );
                self.history.extend(new_patches.iter().cloned());
                self.result = Some(doc);
                self.buffer.clear();
                StreamUpdate {
                    result: self.result.clone(),
                    new_patches,
                    is_complete: true,
                    error: None,
                }
            }
            Err(e) => {
                if !e.is_incomplete() {
                    log::warn!("stream buffer is not valid JSON: {}", e);
                }
                StreamUpdate {
                    result: self.result.clone(),
                    new_patches: Vec::new(),
                    is_complete: false,
                    error: Some(e),
                }
            }
        }
    }

    fn try_parse(&self) -> Result<Value> {
        let doc: Value = serde_json::from_str(&self.buffer)?;
        if doc.is_container() {
            Ok(doc)
        } else {
            Err(Error::NotADocument(doc.type_name()))
        }
    }

    /// Drop the buffer, the baseline and the patch history
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.result = None;
        self.history.clear();
    }

    /// Latest complete document
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Whether at least one document has been completed since the last reset
    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }

    /// Every patch emitted since the last reset
    pub fn patches(&self) -> &[Patch] {
        &self.history
    }

    /// Bytes waiting for the rest of the document
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::apply_patches;

    const APP: &str = r#"{"id":"demo","pages":[{"id":"home","componentTree":{"type":"view","children":[{"type":"text","props":{"content":"Hi"}}]}}],"state":{"count":0,"tags":["a","b"]}}"#;

    fn chunks(text: &str, size: usize) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars.chunks(size).map(|c| c.iter().collect()).collect()
    }

    #[test]
    fn test_chunked_document_completes_exactly_once() {
        let expected: Value = serde_json::from_str(APP).unwrap();
        for size in [1, 3, 7, 64, APP.len()] {
            let mut compiler = SpecStreamCompiler::new();
            let parts = chunks(APP, size);
            let last = parts.len() - 1;
            for (i, part) in parts.iter().enumerate() {
                let update = compiler.push(part);
                if i < last {
                    assert!(!update.is_complete, "chunk {} of size {} completed early", i, size);
                    assert!(update.new_patches.is_empty());
                    assert!(update.error.is_some());
                    assert!(update.result.is_none());
                } else {
                    assert!(update.is_complete);
                    assert!(update.error.is_none());
                    assert_eq!(update.result.as_ref(), Some(&expected));
                    assert_eq!(update.new_patches, vec![Patch::replace("", expected.clone())]);
                }
            }
            assert_eq!(compiler.buffer_len(), 0);
            assert!(compiler.is_complete());
        }
    }

    #[test]
    fn test_second_document_is_diffed_against_first() {
        let mut compiler = SpecStreamCompiler::new();
        let first = compiler.push(r#"{"state":{"count":0},"title":"a"}"#);
        assert!(first.is_complete);

        let partial = compiler.push(r#"{"state":{"count":1},"#);
        assert!(!partial.is_complete);
        assert_eq!(partial.result, first.result, "previous document stays current");

        let second = compiler.push(r#""title":"a","extra":true}"#);
        assert!(second.is_complete);
        let rebuilt = apply_patches(first.result.as_ref().unwrap(), &second.new_patches).unwrap();
        assert_eq!(Some(rebuilt), second.result);
        assert_eq!(compiler.patches().len(), 1 + second.new_patches.len());
    }

    #[test]
    fn test_scalar_buffer_is_not_a_document() {
        let mut compiler = SpecStreamCompiler::new();
        let update = compiler.push("42");
        assert!(!update.is_complete);
        assert!(matches!(update.error, Some(Error::NotADocument("int"))));
        assert_eq!(compiler.buffer_len(), 2);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut compiler = SpecStreamCompiler::new();
        compiler.push("[1,2]");
        compiler.push("[");
        compiler.reset();
        assert!(!compiler.is_complete());
        assert!(compiler.result().is_none());
        assert!(compiler.patches().is_empty());
        assert_eq!(compiler.buffer_len(), 0);
    }
}
