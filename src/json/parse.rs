//! Purpose: Turn simd-json's tape into the flat document tape and map its failures onto stable codes.
//! Exports: `build_document`, `from_slice`, `categorize_error`, `Scratch`.
//! Role: Single seam where the SIMD engine is touched; the rest of the crate sees tapes and codes.
//! Invariants: The engine tape is copied with an explicit stack, so nesting depth never grows the call stack.
//! Invariants: Integers fitting `i64` are stored as `Int64`; only larger positives become `Uint64`.
//! Invariants: Input buffers are mutated in place by simd-json; callers hand over scratch copies.
//! Notes: Categories come from `simd_json::ErrorType`; stage-one `Syntax` errors are refined by a string scan.
use serde::de::DeserializeOwned;
use simd_json::{Buffers, ErrorType, Node as TapeNode, StaticNode};

use crate::core::document::{Document, Node};
use crate::core::error::{Error, ErrorCode};

/// Engine scratch space kept on a parser between documents.
pub(crate) type Scratch = Buffers;

/// Parses `input` into `doc`, replacing whatever it held. `buffers` are the engine's scratch
/// space and are reused across calls.
pub(crate) fn build_document(
    input: &mut [u8],
    buffers: &mut Buffers,
    doc: &mut Document,
    max_depth: usize,
) -> Result<(), Error> {
    doc.clear();
    let tape = match simd_json::to_tape_with_buffers(&mut *input, buffers) {
        Ok(tape) => tape,
        Err(err) => return Err(engine_error(err, input)),
    };
    copy_tape(&tape.0, doc, max_depth)
}

/// Typed decode used for configuration payloads.
pub(crate) fn from_slice<T: DeserializeOwned>(input: &[u8]) -> Result<T, Error> {
    let mut bytes = input.to_vec();
    simd_json::serde::from_slice(&mut bytes).map_err(|err| engine_error(err, input))
}

fn engine_error(err: simd_json::Error, input: &[u8]) -> Error {
    Error::new(categorize_error(&err, input))
        .with_message("json parse failed")
        .with_source(err)
}

/// Maps an engine error onto the code table. `input` must be the bytes the engine saw; it is
/// only inspected for stage-one failures, which happen before any in-place rewriting.
pub(crate) fn categorize_error(err: &simd_json::Error, input: &[u8]) -> ErrorCode {
    match err.error() {
        ErrorType::InvalidUtf8 => ErrorCode::Utf8Error,
        ErrorType::ExpectedTrue => ErrorCode::TAtomError,
        ErrorType::ExpectedFalse => ErrorCode::FAtomError,
        ErrorType::ExpectedNull => ErrorCode::NAtomError,
        ErrorType::InvalidNumber | ErrorType::InvalidExponent | ErrorType::Overflow => {
            ErrorCode::NumberError
        }
        ErrorType::InvalidEscape
        | ErrorType::InvalidUnicodeEscape
        | ErrorType::InvalidUnicodeCodepoint => ErrorCode::StringError,
        ErrorType::UnterminatedString => ErrorCode::UnclosedString,
        ErrorType::UnexpectedCharacter => ErrorCode::UnescapedChars,
        ErrorType::TrailingData => ErrorCode::TrailingContent,
        ErrorType::InternalError(_) if closes_root(err, input) => ErrorCode::TrailingContent,
        ErrorType::Eof => ErrorCode::Empty,
        ErrorType::InputTooLarge => ErrorCode::Capacity,
        ErrorType::Io(_) => ErrorCode::IoError,
        ErrorType::SimdUnsupported => ErrorCode::UnexpectedError,
        // Stage one reports without a character; stage two ran out of structurals.
        ErrorType::Syntax if err.character().is_none() => scan_strings(input),
        ErrorType::Syntax => ErrorCode::IncompleteArrayOrObject,
        ErrorType::Serde(_)
        | ErrorType::Unexpected(..)
        | ErrorType::ExpectedArray
        | ErrorType::ExpectedMap
        | ErrorType::ExpectedString
        | ErrorType::ExpectedBoolean
        | ErrorType::ExpectedInteger
        | ErrorType::ExpectedFloat
        | ErrorType::ExpectedNumber
        | ErrorType::ExpectedSigned
        | ErrorType::ExpectedUnsigned
        | ErrorType::ExpectedEnum => ErrorCode::IncorrectType,
        _ => ErrorCode::TapeError,
    }
}

/// A container root followed by more input fails at the root's closing bracket.
fn closes_root(err: &simd_json::Error, input: &[u8]) -> bool {
    let is_space = |b: &u8| matches!(b, b' ' | b'\t' | b'\n' | b'\r');
    let opener = match err.character() {
        Some(']') => b'[',
        Some('}') => b'{',
        _ => return false,
    };
    let at = err.index();
    let (Some(before), Some(after)) = (input.get(..at), input.get(at + 1..)) else {
        return false;
    };
    let first = input.iter().find(|&b| !is_space(b));
    let prev = before.iter().rev().find(|&b| !is_space(b));
    first == Some(&opener)
        && !matches!(prev, Some(b',' | b':' | b'[' | b'{'))
        && after.iter().any(|b| !is_space(b))
}

/// Distinguishes the string faults stage one folds into `Syntax`.
fn scan_strings(input: &[u8]) -> ErrorCode {
    let mut in_string = false;
    let mut escaped = false;
    for &b in input {
        if !in_string {
            in_string = b == b'"';
            continue;
        }
        if b < 0x20 {
            return ErrorCode::UnescapedChars;
        }
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'"' => in_string = false,
            _ => {}
        }
    }
    if in_string {
        ErrorCode::UnclosedString
    } else {
        ErrorCode::TapeError
    }
}

struct Open {
    index: usize,
    len: usize,
    remaining: usize,
    object: bool,
}

/// Copies the engine tape (keys as separate string nodes) into the document tape (keys stored
/// on their value's slot), enforcing `max_depth` along the way.
fn copy_tape(nodes: &[TapeNode<'_>], doc: &mut Document, max_depth: usize) -> Result<(), Error> {
    let mut stack: Vec<Open> = Vec::new();
    let mut nodes = nodes.iter();
    while let Some(mut node) = nodes.next() {
        let mut key = None;
        if stack.last().is_some_and(|open| open.object) {
            let TapeNode::String(name) = *node else {
                return Err(malformed_tape("object key is not a string"));
            };
            key = Some(doc.push_str(name));
            node = nodes
                .next()
                .ok_or_else(|| malformed_tape("object key without a value"))?;
        }
        match *node {
            TapeNode::Object { len, .. } | TapeNode::Array { len, .. } => {
                if stack.len() >= max_depth {
                    return Err(Error::new(ErrorCode::DepthError)
                        .with_message(format!("nesting exceeds max depth {max_depth}")));
                }
                let object = matches!(node, TapeNode::Object { .. });
                let shell = if object {
                    Node::Object { len: 0, end: 0 }
                } else {
                    Node::Array { len: 0, end: 0 }
                };
                let index = doc.push(key, shell);
                if len > 0 {
                    stack.push(Open {
                        index,
                        len,
                        remaining: len,
                        object,
                    });
                    continue;
                }
                doc.close(index, 0);
            }
            TapeNode::String(text) => {
                let text = doc.push_str(text);
                doc.push(key, Node::String(text));
            }
            TapeNode::Static(value) => {
                doc.push(key, scalar(value)?);
            }
        }
        // A value just completed; seal every container it filled.
        while let Some(open) = stack.last_mut() {
            open.remaining -= 1;
            if open.remaining > 0 {
                break;
            }
            let (index, len) = (open.index, open.len);
            stack.pop();
            doc.close(index, len);
        }
    }
    if !stack.is_empty() {
        return Err(malformed_tape("container left open"));
    }
    Ok(())
}

#[allow(unreachable_patterns)]
fn scalar(value: StaticNode) -> Result<Node, Error> {
    match value {
        StaticNode::I64(value) => Ok(Node::Int64(value)),
        StaticNode::U64(value) => Ok(i64::try_from(value).map_or(Node::Uint64(value), Node::Int64)),
        StaticNode::F64(value) => Ok(Node::Double(value)),
        StaticNode::Bool(value) => Ok(Node::Bool(value)),
        StaticNode::Null => Ok(Node::Null),
        _ => Err(Error::new(ErrorCode::NumberOutOfRange)
            .with_message("integer wider than 64 bits")),
    }
}

fn malformed_tape(detail: &str) -> Error {
    Error::new(ErrorCode::UnexpectedError).with_message(format!("engine tape malformed: {detail}"))
}
