//! Purpose: Project a SIMD-parsed JSON DOM into a flat, manually managed, C-callable form.
//! Exports: `core` (document tape, parser, streaming, errors) and `abi` (the C surface).
//! Role: Rust callers use `core` directly; foreign callers link the cdylib/staticlib and use `abi`.
//! Invariants: Every handle or buffer handed across the ABI has exactly one matching free call.
//! Invariants: Core APIs return `Result`; only the ABI layer collapses failures into codes and NULLs.
pub mod abi;
pub mod core;
mod json;

pub use crate::core::document::{Element, ElementRef, ElementType, Entries, Entry, JsonStr, Value};
pub use crate::core::error::{Error, ErrorCode};
pub use crate::core::parser::{Parser, ParserOptions};
pub use crate::core::stream::DocumentStream;
