//! Purpose: Immutable flat tape for one parsed JSON document plus element views over it.
//! Exports: `Document`, `Element`, `ElementRef`, `ElementType`, `Value`, `JsonStr`, `Entries`.
//! Role: Safe core behind the C ABI; every tree walk and typed read happens here.
//! Invariants: Tape slots are in document order; a container's `end` is one past its last descendant.
//! Invariants: Every string in the arena is immediately followed by a NUL byte.
//! Invariants: Object children keep source order, duplicates included; key lookup returns the first match.
use std::borrow::Cow;
use std::ffi::{CStr, c_char};
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use crate::core::error::{Error, ErrorCode};

#[repr(i32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ElementType {
    Object = 0,
    Array = 1,
    String = 2,
    Int64 = 3,
    Uint64 = 4,
    Double = 5,
    Bool = 6,
    Null = 7,
}

impl ElementType {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_container(self) -> bool {
        matches!(self, ElementType::Object | ElementType::Array)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct StrRef {
    start: usize,
    len: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Node {
    Object { len: usize, end: usize },
    Array { len: usize, end: usize },
    String(StrRef),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    Bool(bool),
    Null,
}

impl Node {
    fn element_type(&self) -> ElementType {
        match self {
            Node::Object { .. } => ElementType::Object,
            Node::Array { .. } => ElementType::Array,
            Node::String(_) => ElementType::String,
            Node::Int64(_) => ElementType::Int64,
            Node::Uint64(_) => ElementType::Uint64,
            Node::Double(_) => ElementType::Double,
            Node::Bool(_) => ElementType::Bool,
            Node::Null => ElementType::Null,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Slot {
    key: Option<StrRef>,
    node: Node,
}

/// One parsed document: the node tape and the string arena it points into.
#[derive(Clone, Debug, Default)]
pub struct Document {
    tape: Vec<Slot>,
    strings: String,
}

impl Document {
    pub(crate) fn clear(&mut self) {
        self.tape.clear();
        self.strings.clear();
    }

    pub(crate) fn push_str(&mut self, text: &str) -> StrRef {
        let start = self.strings.len();
        self.strings.push_str(text);
        self.strings.push('\0');
        StrRef {
            start,
            len: text.len(),
        }
    }

    pub(crate) fn push(&mut self, key: Option<StrRef>, node: Node) -> usize {
        let index = self.tape.len();
        self.tape.push(Slot { key, node });
        index
    }

    /// Seals a container opened with `push`: records its child count and extent.
    pub(crate) fn close(&mut self, index: usize, count: usize) {
        let tape_end = self.tape.len();
        if let Some(slot) = self.tape.get_mut(index) {
            match &mut slot.node {
                Node::Object { len, end } | Node::Array { len, end } => {
                    *len = count;
                    *end = tape_end;
                }
                _ => {}
            }
        }
    }

    /// Number of nodes on the tape.
    pub fn node_count(&self) -> usize {
        self.tape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tape.is_empty()
    }

    fn slot(&self, index: usize) -> &Slot {
        &self.tape[index]
    }

    fn str_at(&self, reference: StrRef) -> JsonStr<'_> {
        JsonStr(&self.strings[reference.start..=reference.start + reference.len])
    }

    fn next_sibling(&self, index: usize) -> usize {
        match self.tape[index].node {
            Node::Object { end, .. } | Node::Array { end, .. } => end,
            _ => index + 1,
        }
    }
}

/// A string borrowed from the document arena. The backing slice keeps its NUL terminator,
/// so the pointer form is a valid C string for as long as the document lives.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct JsonStr<'a>(&'a str);

impl<'a> JsonStr<'a> {
    pub fn as_str(&self) -> &'a str {
        &self.0[..self.0.len() - 1]
    }

    pub fn as_c_str(&self) -> &'a CStr {
        CStr::from_bytes_until_nul(self.0.as_bytes()).unwrap_or(c"")
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.0.as_ptr().cast()
    }

    pub fn len(&self) -> usize {
        self.0.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for JsonStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl PartialEq<str> for JsonStr<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for JsonStr<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Tagged view of one node. Containers stay navigable views; they are never expanded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value<'a> {
    Object(ElementRef<'a>),
    Array(ElementRef<'a>),
    String(JsonStr<'a>),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    Bool(bool),
    Null,
}

impl Value<'_> {
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Object(_) => ElementType::Object,
            Value::Array(_) => ElementType::Array,
            Value::String(_) => ElementType::String,
            Value::Int64(_) => ElementType::Int64,
            Value::Uint64(_) => ElementType::Uint64,
            Value::Double(_) => ElementType::Double,
            Value::Bool(_) => ElementType::Bool,
            Value::Null => ElementType::Null,
        }
    }
}

/// Borrowed view of one node inside a shared document.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    doc: &'a Arc<Document>,
    index: usize,
}

impl PartialEq for ElementRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.doc, other.doc) && self.index == other.index
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("index", &self.index)
            .field("type", &self.element_type())
            .finish()
    }
}

impl<'a> ElementRef<'a> {
    fn document(&self) -> &'a Document {
        self.doc
    }

    fn node(&self) -> Node {
        self.doc.slot(self.index).node
    }

    pub fn element_type(&self) -> ElementType {
        self.node().element_type()
    }

    pub fn to_element(&self) -> Element {
        Element {
            doc: Arc::clone(self.doc),
            index: self.index,
        }
    }

    pub fn value(&self) -> Value<'a> {
        match self.node() {
            Node::Object { .. } => Value::Object(*self),
            Node::Array { .. } => Value::Array(*self),
            Node::String(reference) => Value::String(self.document().str_at(reference)),
            Node::Int64(value) => Value::Int64(value),
            Node::Uint64(value) => Value::Uint64(value),
            Node::Double(value) => Value::Double(value),
            Node::Bool(value) => Value::Bool(value),
            Node::Null => Value::Null,
        }
    }

    pub fn get_str(&self) -> Result<JsonStr<'a>, Error> {
        match self.node() {
            Node::String(reference) => Ok(self.document().str_at(reference)),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn get_i64(&self) -> Result<i64, Error> {
        match self.node() {
            Node::Int64(value) => Ok(value),
            Node::Uint64(_) => Err(Error::new(ErrorCode::NumberOutOfRange)
                .with_message("unsigned value exceeds int64 range")),
            _ => Err(self.mismatch("int64")),
        }
    }

    pub fn get_u64(&self) -> Result<u64, Error> {
        match self.node() {
            Node::Uint64(value) => Ok(value),
            Node::Int64(value) => u64::try_from(value).map_err(|err| {
                Error::new(ErrorCode::NumberOutOfRange)
                    .with_message("negative value cannot be read as uint64")
                    .with_source(err)
            }),
            _ => Err(self.mismatch("uint64")),
        }
    }

    pub fn get_f64(&self) -> Result<f64, Error> {
        match self.node() {
            Node::Double(value) => Ok(value),
            Node::Int64(value) => Ok(value as f64),
            Node::Uint64(value) => Ok(value as f64),
            _ => Err(self.mismatch("double")),
        }
    }

    pub fn get_bool(&self) -> Result<bool, Error> {
        match self.node() {
            Node::Bool(value) => Ok(value),
            _ => Err(self.mismatch("bool")),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.node(), Node::Null)
    }

    /// Child count for containers, 0 for scalars.
    pub fn size(&self) -> usize {
        match self.node() {
            Node::Object { len, .. } | Node::Array { len, .. } => len,
            _ => 0,
        }
    }

    /// Children in source order. Scalars yield nothing.
    pub fn entries(&self) -> Entries<'a> {
        Entries {
            doc: self.doc,
            next: self.index + 1,
            remaining: self.size(),
        }
    }

    pub fn at_key(&self, key: &str) -> Result<ElementRef<'a>, Error> {
        if !matches!(self.node(), Node::Object { .. }) {
            return Err(self.mismatch("object"));
        }
        self.entries()
            .find(|entry| entry.key.is_some_and(|candidate| candidate == key))
            .map(|entry| entry.value)
            .ok_or_else(|| Error::new(ErrorCode::NoSuchField).with_message(format!("no field {key:?}")))
    }

    /// Positional lookup: array items, or object values by ordinal.
    pub fn at(&self, index: usize) -> Result<ElementRef<'a>, Error> {
        if !self.element_type().is_container() {
            return Err(self.mismatch("array or object"));
        }
        self.entries()
            .nth(index)
            .map(|entry| entry.value)
            .ok_or_else(|| {
                Error::new(ErrorCode::IndexOutOfBounds)
                    .with_message(format!("index {index} >= size {}", self.size()))
            })
    }

    /// RFC 6901 navigation. The empty pointer addresses the element itself.
    pub fn at_pointer(&self, pointer: &str) -> Result<ElementRef<'a>, Error> {
        if pointer.is_empty() {
            return Ok(*self);
        }
        let Some(rest) = pointer.strip_prefix('/') else {
            return Err(Error::new(ErrorCode::InvalidJsonPointer)
                .with_message("pointer must start with '/'"));
        };
        let mut current = *self;
        for token in rest.split('/') {
            let token = unescape_token(token)?;
            current = match current.node() {
                Node::Object { .. } => current.at_key(&token)?,
                Node::Array { .. } => current.at(parse_index(&token)?)?,
                _ => return Err(current.mismatch("array or object")),
            };
        }
        Ok(current)
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::new(ErrorCode::IncorrectType)
            .with_message(format!("expected {expected}, found {:?}", self.element_type()))
    }
}

fn unescape_token(token: &str) -> Result<Cow<'_, str>, Error> {
    if !token.contains('~') {
        return Ok(Cow::Borrowed(token));
    }
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(Error::new(ErrorCode::InvalidJsonPointer)
                    .with_message("'~' must be followed by '0' or '1'"));
            }
        }
    }
    Ok(Cow::Owned(out))
}

fn parse_index(token: &str) -> Result<usize, Error> {
    let canonical = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !canonical {
        return Err(Error::new(ErrorCode::InvalidJsonPointer)
            .with_message(format!("{token:?} is not an array index")));
    }
    token.parse::<usize>().map_err(|err| {
        Error::new(ErrorCode::IndexOutOfBounds)
            .with_message("array index overflows")
            .with_source(err)
    })
}

/// One child of a container; `key` is set for object fields only.
#[derive(Clone, Copy, Debug)]
pub struct Entry<'a> {
    pub key: Option<JsonStr<'a>>,
    pub value: ElementRef<'a>,
}

pub struct Entries<'a> {
    doc: &'a Arc<Document>,
    next: usize,
    remaining: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let doc: &'a Arc<Document> = self.doc;
        let index = self.next;
        self.next = doc.next_sibling(index);
        self.remaining -= 1;
        let arena: &'a Document = doc;
        let key = arena.slot(index).key.map(|key| arena.str_at(key));
        Some(Entry {
            key,
            value: ElementRef { doc, index },
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Entries<'_> {}

impl FusedIterator for Entries<'_> {}

/// Owned element handle. It pins the document it came from; cloning yields an independent
/// handle onto the same node.
#[derive(Clone)]
pub struct Element {
    doc: Arc<Document>,
    index: usize,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("index", &self.index)
            .field("type", &self.element_type())
            .finish()
    }
}

impl Element {
    pub(crate) fn root(doc: Arc<Document>) -> Self {
        Self { doc, index: 0 }
    }

    pub fn view(&self) -> ElementRef<'_> {
        ElementRef {
            doc: &self.doc,
            index: self.index,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.view().element_type()
    }

    pub fn value(&self) -> Value<'_> {
        self.view().value()
    }

    pub fn get_str(&self) -> Result<JsonStr<'_>, Error> {
        self.view().get_str()
    }

    pub fn get_i64(&self) -> Result<i64, Error> {
        self.view().get_i64()
    }

    pub fn get_u64(&self) -> Result<u64, Error> {
        self.view().get_u64()
    }

    pub fn get_f64(&self) -> Result<f64, Error> {
        self.view().get_f64()
    }

    pub fn get_bool(&self) -> Result<bool, Error> {
        self.view().get_bool()
    }

    pub fn is_null(&self) -> bool {
        self.view().is_null()
    }

    pub fn size(&self) -> usize {
        self.view().size()
    }

    pub fn entries(&self) -> Entries<'_> {
        self.view().entries()
    }

    pub fn at_key(&self, key: &str) -> Result<Element, Error> {
        self.view().at_key(key).map(|child| child.to_element())
    }

    pub fn at(&self, index: usize) -> Result<Element, Error> {
        self.view().at(index).map(|child| child.to_element())
    }

    pub fn at_pointer(&self, pointer: &str) -> Result<Element, Error> {
        self.view().at_pointer(pointer).map(|child| child.to_element())
    }

    /// True when both handles address the same node of the same document snapshot.
    pub fn same_node(&self, other: &Element) -> bool {
        self.view() == other.view()
    }
}
