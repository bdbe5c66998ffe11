// Core modules: document model, parser lifecycle, streaming, errors, and engine selection.
pub mod document;
pub mod error;
pub mod implementation;
pub mod parser;
pub mod stream;
