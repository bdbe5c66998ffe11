//! Purpose: Reusable parser handle: provisioned input buffer, limits, and the last parsed document.
//! Exports: `Parser`, `ParserOptions`, `DEFAULT_MAX_DEPTH`, `DEFAULT_BATCH_SIZE`, `MAX_CAPACITY`.
//! Role: Owns parse-time resources; single-document and streaming entry points start here.
//! Invariants: Inputs larger than `max_capacity` fail with `Capacity` before any copy.
//! Invariants: Capacity grows lazily on parse; `allocate` re-provisions explicitly.
//! Invariants: The document tape is recycled only when no element still references it.
//! Notes: Every parse takes `&mut self`; one parse in flight per parser.
//! Notes: The engine's scratch buffers live on the parser and are reused between documents.
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::core::document::{Document, Element};
use crate::core::error::{Error, ErrorCode};
use crate::core::stream::DocumentStream;
use crate::json::parse::{self, Scratch};

pub const DEFAULT_MAX_DEPTH: usize = 1024;
pub const DEFAULT_BATCH_SIZE: usize = 1_000_000;
/// Largest document any parser accepts (4 GiB - 1).
pub const MAX_CAPACITY: usize = 0xFFFF_FFFF;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserOptions {
    pub max_capacity: usize,
    pub max_depth: usize,
    pub batch_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_capacity: MAX_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Decodes options from JSON bytes; absent fields keep their defaults.
    pub fn from_json(bytes: &[u8]) -> Result<Self, Error> {
        let options: Self = parse::from_slice(bytes)?;
        if options.max_depth == 0 {
            return Err(Error::new(ErrorCode::DepthError).with_message("max_depth must be > 0"));
        }
        Ok(options)
    }
}

pub struct Parser {
    max_capacity: usize,
    capacity: usize,
    max_depth: usize,
    batch_size: usize,
    buffer: Vec<u8>,
    scratch: Scratch,
    doc: Arc<Document>,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("max_capacity", &self.max_capacity)
            .field("capacity", &self.capacity)
            .field("max_depth", &self.max_depth)
            .field("batch_size", &self.batch_size)
            .field("nodes", &self.doc.node_count())
            .finish_non_exhaustive()
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    /// Parser that refuses documents larger than `max_capacity` bytes.
    pub fn with_max_capacity(max_capacity: usize) -> Self {
        Self::with_options(ParserOptions::default().with_max_capacity(max_capacity))
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Self {
            max_capacity: options.max_capacity,
            capacity: 0,
            max_depth: options.max_depth,
            batch_size: options.batch_size,
            buffer: Vec::new(),
            scratch: Scratch::default(),
            doc: Arc::new(Document::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Re-provisions the input buffer for documents up to `capacity` bytes nested at most
    /// `max_depth` levels. Existing buffer contents are discarded.
    pub fn allocate(&mut self, capacity: usize, max_depth: usize) -> Result<(), Error> {
        if capacity > self.max_capacity {
            return Err(Error::new(ErrorCode::Capacity).with_message(format!(
                "requested capacity {capacity} exceeds max capacity {}",
                self.max_capacity
            )));
        }
        if max_depth == 0 {
            return Err(Error::new(ErrorCode::DepthError).with_message("max_depth must be > 0"));
        }
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(capacity).map_err(|err| {
            Error::new(ErrorCode::MemAlloc)
                .with_message(format!("failed to reserve {capacity} bytes"))
                .with_source(err)
        })?;
        self.buffer = buffer;
        self.capacity = capacity;
        self.max_depth = max_depth;
        tracing::debug!(capacity, max_depth, "parser buffers provisioned");
        Ok(())
    }

    fn ensure_capacity(&mut self, len: usize) -> Result<(), Error> {
        if len <= self.capacity {
            return Ok(());
        }
        if len > self.max_capacity {
            return Err(Error::new(ErrorCode::Capacity).with_message(format!(
                "document of {len} bytes exceeds max capacity {}",
                self.max_capacity
            )));
        }
        self.allocate(len, self.max_depth)
    }

    /// Parses one document from memory. The input is copied; it need not outlive the call.
    pub fn parse(&mut self, input: &[u8]) -> Result<Element, Error> {
        self.ensure_capacity(input.len())?;
        self.buffer.clear();
        self.buffer.extend_from_slice(input);
        self.parse_buffer()
    }

    /// Reads and parses one document from `path`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<Element, Error> {
        let path = path.as_ref();
        self.read_file(path)?;
        self.parse_buffer().map_err(|err| err.with_path(path))
    }

    /// Iterates over the whitespace-separated documents in `input`, stopping at the first
    /// failure.
    pub fn parse_many<'p, 'i>(&'p mut self, input: &'i [u8]) -> DocumentStream<'p, 'i> {
        let batch_size = self.batch_size;
        self.parse_many_with_batch(input, batch_size)
    }

    pub fn parse_many_with_batch<'p, 'i>(
        &'p mut self,
        input: &'i [u8],
        batch_size: usize,
    ) -> DocumentStream<'p, 'i> {
        let max_capacity = self.max_capacity;
        let stream = DocumentStream::new(self, input.into(), batch_size);
        if batch_size == 0 || batch_size > max_capacity {
            return stream.fail(Error::new(ErrorCode::Capacity).with_message(format!(
                "batch size {batch_size} outside 1..={max_capacity}"
            )));
        }
        stream
    }

    /// Like `parse_many`, sourcing the bytes from `path`. Read failures surface as the
    /// stream's first item.
    pub fn load_many(&mut self, path: impl AsRef<Path>) -> DocumentStream<'_, 'static> {
        let path = path.as_ref();
        let batch_size = self.batch_size;
        let contents = std::fs::read(path).map_err(|err| {
            Error::new(ErrorCode::IoError)
                .with_message("failed to read input")
                .with_path(path)
                .with_source(err)
        });
        match contents {
            Ok(bytes) => DocumentStream::new(self, bytes.into(), batch_size),
            Err(err) => DocumentStream::new(self, Vec::<u8>::new().into(), batch_size).fail(err),
        }
    }

    fn read_file(&mut self, path: &Path) -> Result<(), Error> {
        let io_error = |err: std::io::Error| {
            Error::new(ErrorCode::IoError)
                .with_message("failed to read input")
                .with_path(path)
                .with_source(err)
        };
        let mut file = File::open(path).map_err(io_error)?;
        let len = file.metadata().map_err(io_error)?.len();
        let len = usize::try_from(len).map_err(|err| {
            Error::new(ErrorCode::Capacity)
                .with_message("file size exceeds address space")
                .with_path(path)
                .with_source(err)
        })?;
        self.ensure_capacity(len).map_err(|err| err.with_path(path))?;
        self.buffer.clear();
        file.read_to_end(&mut self.buffer).map_err(io_error)?;
        if self.buffer.len() > self.max_capacity {
            return Err(Error::new(ErrorCode::Capacity)
                .with_message("file grew past max capacity while reading")
                .with_path(path));
        }
        Ok(())
    }

    fn parse_buffer(&mut self) -> Result<Element, Error> {
        if self.buffer.iter().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
            return Err(Error::new(ErrorCode::Empty));
        }
        if Arc::get_mut(&mut self.doc).is_none() {
            // Elements from an earlier parse still hold the old tape; start a fresh one.
            self.doc = Arc::new(Document::default());
        }
        let doc = Arc::make_mut(&mut self.doc);
        let len = self.buffer.len();
        match parse::build_document(&mut self.buffer, &mut self.scratch, doc, self.max_depth) {
            Ok(()) => {
                tracing::trace!(len, nodes = doc.node_count(), "document parsed");
                Ok(Element::root(Arc::clone(&self.doc)))
            }
            Err(err) => {
                doc.clear();
                tracing::debug!(len, code = ?err.code(), "document rejected");
                Err(err)
            }
        }
    }
}
