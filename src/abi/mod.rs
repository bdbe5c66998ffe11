//! Purpose: C ABI bridge for foreign callers (libflatdom).
//! Exports: Parser lifecycle, single and streaming parse, element accessors/navigation, frees.
//! Role: Stable flat surface; converts core `Result`s into NULL returns and integer codes.
//! Invariants: Every returned handle is Box-allocated and released only by its matching free call.
//! Invariants: Null handles never crash: NULL / 0 results, `Uninitialized` where a code slot exists.
//! Invariants: Unchecked scalar accessors return 0/false on mismatch and never signal it.
//! Notes: Element handles pin their document snapshot; reparsing a parser does not free it.
#![allow(non_camel_case_types)]

pub mod flat;

use std::ffi::{CStr, c_char, c_int, c_void};
use std::path::PathBuf;
use std::ptr;

use crate::core::document::Element;
use crate::core::error::{Error, ErrorCode, message_for};
use crate::core::implementation;
use crate::core::parser::{Parser, ParserOptions};
use crate::core::stream::DocumentStream;

pub struct dom_parser {
    parser: Parser,
}

pub struct dom_element {
    element: Element,
}

/// `callback(userdata, element_or_null, error_code)`; the element is only valid during the call.
pub type dom_document_callback =
    Option<unsafe extern "C" fn(userdata: *mut c_void, element: *const dom_element, error: c_int)>;

#[unsafe(no_mangle)]
pub extern "C" fn flatdom_errstr(code: c_int) -> *const c_char {
    message_for(code).as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_new() -> *mut dom_parser {
    into_parser(Parser::new())
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_new_size(size: usize) -> *mut dom_parser {
    into_parser(Parser::with_max_capacity(size))
}

/// Options arrive as JSON (`{"max_capacity":..,"max_depth":..,"batch_size":..}`).
#[unsafe(no_mangle)]
pub extern "C" fn parser_new_with_options(
    options_json: *const u8,
    options_len: usize,
    err: *mut c_int,
) -> *mut dom_parser {
    let options = if options_json.is_null() {
        Ok(ParserOptions::default())
    } else {
        ParserOptions::from_json(input_slice(options_json, options_len))
    };
    match options {
        Ok(options) => {
            write_code(err, ErrorCode::Success);
            into_parser(Parser::with_options(options))
        }
        Err(error) => {
            write_code(err, error.code());
            ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_allocate(
    parser: *mut dom_parser,
    size: usize,
    max_depth: usize,
    err: *mut c_int,
) -> c_int {
    let code = match borrow_parser(parser) {
        Ok(handle) => match handle.parser.allocate(size, max_depth) {
            Ok(()) => ErrorCode::Success,
            Err(error) => error.code(),
        },
        Err(error) => error.code(),
    };
    write_code(err, code);
    code.as_i32()
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_capacity(parser: *mut dom_parser) -> usize {
    borrow_parser(parser).map_or(0, |handle| handle.parser.capacity())
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_max_capacity(parser: *mut dom_parser) -> usize {
    borrow_parser(parser).map_or(0, |handle| handle.parser.max_capacity())
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_max_depth(parser: *mut dom_parser) -> usize {
    borrow_parser(parser).map_or(0, |handle| handle.parser.max_depth())
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_load(
    parser: *mut dom_parser,
    path: *const c_char,
    err: *mut c_int,
) -> *mut dom_element {
    let result = borrow_parser(parser)
        .and_then(|handle| Ok((handle, parse_path(path)?)))
        .and_then(|(handle, path)| handle.parser.load(path));
    finish(result, err)
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_parse(
    parser: *mut dom_parser,
    bytes: *const c_char,
    length: usize,
    err: *mut c_int,
) -> *mut dom_element {
    let result = borrow_parser(parser)
        .and_then(|handle| handle.parser.parse(input_slice(bytes.cast(), length)));
    finish(result, err)
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_parsemany(
    parser: *mut dom_parser,
    bytes: *const u8,
    length: usize,
    userdata: *mut c_void,
    callback: dom_document_callback,
) {
    let Some(callback) = callback else {
        return;
    };
    match borrow_parser(parser) {
        Ok(handle) => drive(handle.parser.parse_many(input_slice(bytes, length)), userdata, callback),
        Err(error) => deliver_failure(error, userdata, callback),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_parsemany_batch(
    parser: *mut dom_parser,
    bytes: *const u8,
    length: usize,
    batch_size: usize,
    userdata: *mut c_void,
    callback: dom_document_callback,
) {
    let Some(callback) = callback else {
        return;
    };
    match borrow_parser(parser) {
        Ok(handle) => drive(
            handle
                .parser
                .parse_many_with_batch(input_slice(bytes, length), batch_size),
            userdata,
            callback,
        ),
        Err(error) => deliver_failure(error, userdata, callback),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_loadmany(
    parser: *mut dom_parser,
    path: *const c_char,
    userdata: *mut c_void,
    callback: dom_document_callback,
) {
    let Some(callback) = callback else {
        return;
    };
    let target = borrow_parser(parser).and_then(|handle| Ok((handle, parse_path(path)?)));
    match target {
        Ok((handle, path)) => drive(handle.parser.load_many(path), userdata, callback),
        Err(error) => deliver_failure(error, userdata, callback),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn parser_free(parser: *mut dom_parser) {
    if parser.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(parser));
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn implementation_name() -> *const c_char {
    implementation::active().name().as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn implementation_description() -> *const c_char {
    implementation::active().description().as_ptr()
}

/// Discriminant 0..=7 (object, array, string, int64, uint64, double, bool, null).
/// A null handle reports null.
#[unsafe(no_mangle)]
pub extern "C" fn element_type(element: *const dom_element) -> c_int {
    borrow_element(element).map_or(crate::ElementType::Null.as_i32(), |element| {
        element.element_type().as_i32()
    })
}

/// NUL-terminated string borrowed from the document, or NULL when the element is not a string.
#[unsafe(no_mangle)]
pub extern "C" fn element_string(element: *const dom_element) -> *const c_char {
    borrow_element(element)
        .and_then(|element| element.get_str().ok().map(|text| text.as_ptr()))
        .unwrap_or(ptr::null())
}

#[unsafe(no_mangle)]
pub extern "C" fn element_int(element: *const dom_element) -> i64 {
    borrow_element(element)
        .and_then(|element| element.get_i64().ok())
        .unwrap_or_default()
}

#[unsafe(no_mangle)]
pub extern "C" fn element_uint(element: *const dom_element) -> u64 {
    borrow_element(element)
        .and_then(|element| element.get_u64().ok())
        .unwrap_or_default()
}

#[unsafe(no_mangle)]
pub extern "C" fn element_double(element: *const dom_element) -> f64 {
    borrow_element(element)
        .and_then(|element| element.get_f64().ok())
        .unwrap_or_default()
}

#[unsafe(no_mangle)]
pub extern "C" fn element_bool(element: *const dom_element) -> bool {
    borrow_element(element)
        .and_then(|element| element.get_bool().ok())
        .unwrap_or_default()
}

#[unsafe(no_mangle)]
pub extern "C" fn element_get_string(
    element: *const dom_element,
    out: *mut *const c_char,
) -> c_int {
    read_checked(element, out, |element| {
        element.get_str().map(|text| text.as_ptr())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn element_get_int(element: *const dom_element, out: *mut i64) -> c_int {
    read_checked(element, out, Element::get_i64)
}

#[unsafe(no_mangle)]
pub extern "C" fn element_get_uint(element: *const dom_element, out: *mut u64) -> c_int {
    read_checked(element, out, Element::get_u64)
}

#[unsafe(no_mangle)]
pub extern "C" fn element_get_double(element: *const dom_element, out: *mut f64) -> c_int {
    read_checked(element, out, Element::get_f64)
}

#[unsafe(no_mangle)]
pub extern "C" fn element_get_bool(element: *const dom_element, out: *mut bool) -> c_int {
    read_checked(element, out, Element::get_bool)
}

#[unsafe(no_mangle)]
pub extern "C" fn element_at_key(element: *const dom_element, key: *const c_char) -> *mut dom_element {
    let Some(element) = borrow_element(element) else {
        return ptr::null_mut();
    };
    if key.is_null() {
        return ptr::null_mut();
    }
    let Ok(key) = unsafe { CStr::from_ptr(key) }.to_str() else {
        return ptr::null_mut();
    };
    element
        .at_key(key)
        .map_or(ptr::null_mut(), into_element)
}

#[unsafe(no_mangle)]
pub extern "C" fn element_at(element: *const dom_element, index: usize) -> *mut dom_element {
    borrow_element(element)
        .and_then(|element| element.at(index).ok())
        .map_or(ptr::null_mut(), into_element)
}

#[unsafe(no_mangle)]
pub extern "C" fn element_at_pointer(
    element: *const dom_element,
    pointer: *const c_char,
    err: *mut c_int,
) -> *mut dom_element {
    let result = borrow_element(element)
        .ok_or_else(|| Error::new(ErrorCode::Uninitialized).with_message("element is null"))
        .and_then(|element| {
            let pointer = c_str_arg(pointer, "pointer")?.to_str().map_err(|err| {
                Error::new(ErrorCode::InvalidJsonPointer)
                    .with_message("pointer is not valid UTF-8")
                    .with_source(err)
            })?;
            element.at_pointer(pointer)
        });
    finish(result, err)
}

/// Child count for objects and arrays, 0 for scalars and null handles.
#[unsafe(no_mangle)]
pub extern "C" fn element_size(element: *const dom_element) -> usize {
    borrow_element(element).map_or(0, Element::size)
}

#[unsafe(no_mangle)]
pub extern "C" fn element_free(element: *mut dom_element) {
    if element.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(element));
    }
}

fn drive(
    stream: DocumentStream<'_, '_>,
    userdata: *mut c_void,
    callback: unsafe extern "C" fn(*mut c_void, *const dom_element, c_int),
) {
    for item in stream {
        match item {
            Ok(element) => {
                let view = dom_element { element };
                unsafe { callback(userdata, &view, ErrorCode::Success.as_i32()) };
            }
            Err(error) => {
                unsafe { callback(userdata, ptr::null(), error.code().as_i32()) };
                break;
            }
        }
    }
    unsafe { callback(userdata, ptr::null(), ErrorCode::Success.as_i32()) };
}

fn deliver_failure(
    error: Error,
    userdata: *mut c_void,
    callback: unsafe extern "C" fn(*mut c_void, *const dom_element, c_int),
) {
    unsafe {
        callback(userdata, ptr::null(), error.code().as_i32());
        callback(userdata, ptr::null(), ErrorCode::Success.as_i32());
    }
}

fn read_checked<T>(
    element: *const dom_element,
    out: *mut T,
    read: impl FnOnce(&Element) -> Result<T, Error>,
) -> c_int {
    let Some(element) = borrow_element(element) else {
        return ErrorCode::Uninitialized.as_i32();
    };
    if out.is_null() {
        return ErrorCode::Uninitialized.as_i32();
    }
    match read(element) {
        Ok(value) => {
            unsafe { out.write(value) };
            ErrorCode::Success.as_i32()
        }
        Err(error) => error.code().as_i32(),
    }
}

fn finish(result: Result<Element, Error>, err: *mut c_int) -> *mut dom_element {
    match result {
        Ok(element) => {
            write_code(err, ErrorCode::Success);
            into_element(element)
        }
        Err(error) => {
            write_code(err, error.code());
            ptr::null_mut()
        }
    }
}

fn into_parser(parser: Parser) -> *mut dom_parser {
    Box::into_raw(Box::new(dom_parser { parser }))
}

pub(crate) fn into_element(element: Element) -> *mut dom_element {
    Box::into_raw(Box::new(dom_element { element }))
}

fn borrow_parser<'a>(parser: *mut dom_parser) -> Result<&'a mut dom_parser, Error> {
    if parser.is_null() {
        return Err(Error::new(ErrorCode::Uninitialized).with_message("parser is null"));
    }
    unsafe { Ok(&mut *parser) }
}

pub(crate) fn borrow_element<'a>(element: *const dom_element) -> Option<&'a Element> {
    unsafe { element.as_ref() }.map(|handle| &handle.element)
}

fn write_code(err: *mut c_int, code: ErrorCode) {
    if err.is_null() {
        return;
    }
    unsafe {
        *err = code.as_i32();
    }
}

fn input_slice<'a>(bytes: *const u8, len: usize) -> &'a [u8] {
    if bytes.is_null() || len == 0 {
        return &[];
    }
    unsafe { std::slice::from_raw_parts(bytes, len) }
}

fn c_str_arg<'a>(input: *const c_char, name: &str) -> Result<&'a CStr, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorCode::Uninitialized).with_message(format!("{name} is null")));
    }
    Ok(unsafe { CStr::from_ptr(input) })
}

fn parse_path(path: *const c_char) -> Result<PathBuf, Error> {
    path_from_c(c_str_arg(path, "path")?)
}

#[cfg(unix)]
fn path_from_c(raw: &CStr) -> Result<PathBuf, Error> {
    use std::os::unix::ffi::OsStrExt;
    Ok(PathBuf::from(std::ffi::OsStr::from_bytes(raw.to_bytes())))
}

#[cfg(not(unix))]
fn path_from_c(raw: &CStr) -> Result<PathBuf, Error> {
    raw.to_str().map(PathBuf::from).map_err(|err| {
        Error::new(ErrorCode::IoError)
            .with_message("path is not valid UTF-8")
            .with_source(err)
    })
}
