//! Purpose: Multi-document parsing over one buffer (NDJSON and other whitespace-separated values).
//! Exports: `DocumentStream`, `next_document`.
//! Role: Splits the input at top-level value boundaries and parses each slice with the owning parser.
//! Invariants: Documents are yielded in source order; the stream is fused after the first error.
//! Invariants: A document longer than the batch size fails with `Capacity` and ends the stream.
//! Notes: Boundary scanning tracks only strings and bracket depth; validation is left to the engine.
use std::borrow::Cow;
use std::iter::FusedIterator;
use std::ops::Range;

use crate::core::document::Element;
use crate::core::error::{Error, ErrorCode};
use crate::core::parser::Parser;

pub struct DocumentStream<'p, 'i> {
    parser: &'p mut Parser,
    input: Cow<'i, [u8]>,
    batch_size: usize,
    position: usize,
    delivered: usize,
    pending: Option<Error>,
    finished: bool,
}

impl<'p, 'i> DocumentStream<'p, 'i> {
    pub(crate) fn new(parser: &'p mut Parser, input: Cow<'i, [u8]>, batch_size: usize) -> Self {
        Self {
            parser,
            input,
            batch_size,
            position: 0,
            delivered: 0,
            pending: None,
            finished: false,
        }
    }

    /// Replaces the stream's contents with a single failure.
    pub(crate) fn fail(mut self, err: Error) -> Self {
        self.pending = Some(err);
        self
    }

    /// Documents parsed successfully so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Iterator for DocumentStream<'_, '_> {
    type Item = Result<Element, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(err) = self.pending.take() {
            self.finished = true;
            tracing::debug!(code = ?err.code(), "document stream failed before first document");
            return Some(Err(err));
        }
        let Some(range) = next_document(&self.input, self.position) else {
            self.finished = true;
            tracing::trace!(documents = self.delivered, "document stream exhausted");
            return None;
        };
        self.position = range.end;
        let offset = range.start as u64;
        let result = if range.len() > self.batch_size {
            Err(Error::new(ErrorCode::Capacity).with_message(format!(
                "document of {} bytes exceeds batch size {}",
                range.len(),
                self.batch_size
            )))
        } else {
            self.parser.parse(&self.input[range])
        };
        match result {
            Ok(element) => {
                self.delivered += 1;
                Some(Ok(element))
            }
            Err(err) => {
                self.finished = true;
                tracing::debug!(
                    offset,
                    documents = self.delivered,
                    code = ?err.code(),
                    "document stream stopped on error"
                );
                Some(Err(err.with_offset(offset)))
            }
        }
    }
}

impl FusedIterator for DocumentStream<'_, '_> {}

/// Byte range of the next top-level value at or after `from`, or `None` when only whitespace
/// remains. Unbalanced containers extend to the end of the input.
pub fn next_document(input: &[u8], from: usize) -> Option<Range<usize>> {
    let rest = input.get(from..)?;
    let begin = from + rest.iter().position(|b| !is_whitespace(*b))?;
    let end = match input[begin] {
        b'{' | b'[' => scan_container(input, begin),
        b'"' => scan_string(input, begin + 1),
        b if is_structural(b) => begin + 1,
        _ => scan_atom(input, begin),
    };
    Some(begin..end)
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_structural(b: u8) -> bool {
    matches!(b, b'{' | b'}' | b'[' | b']' | b'"' | b',' | b':')
}

fn scan_container(input: &[u8], begin: usize) -> usize {
    let mut depth = 0usize;
    let mut i = begin;
    while i < input.len() {
        match input[i] {
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            b'"' => {
                i = scan_string(input, i + 1);
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    input.len()
}

/// Index just past the closing quote of a string whose body starts at `from`.
fn scan_string(input: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < input.len() {
        match input[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    input.len()
}

fn scan_atom(input: &[u8], begin: usize) -> usize {
    let len = input[begin + 1..]
        .iter()
        .position(|b| is_whitespace(*b) || is_structural(*b))
        .map_or(input.len() - begin, |n| n + 1);
    begin + len
}
