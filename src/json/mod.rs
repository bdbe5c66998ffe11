//! Purpose: Internal JSON parsing boundary shared by the parser and configuration decode.
//! Exports: `parse` module with tape building and engine error categorisation.
//! Role: Single seam for the SIMD engine so callers never touch simd-json directly.
//! Invariants: All engine decoding goes through this module.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;
