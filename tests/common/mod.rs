// Shared helpers: drive the C ABI the way a foreign caller would.
#![allow(dead_code)]

use std::ffi::{CStr, c_int};
use std::ptr;

use flatdom::abi::flat::{
    arraycontent, arraycontent_free, element_array, element_object, element_union,
    objectcontent, objectcontent_free,
};
use flatdom::abi::{
    dom_element, dom_parser, element_bool, element_double, element_free, element_int,
    element_string, element_type, element_uint, parser_parse,
};

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Parses `input` and returns the owned root handle, panicking with the error message on failure.
pub fn parse(parser: *mut dom_parser, input: &str) -> *mut dom_element {
    let mut err: c_int = -1;
    let element = parser_parse(parser, input.as_ptr().cast(), input.len(), &mut err);
    assert_eq!(err, 0, "parse failed: {}", errstr(err));
    assert!(!element.is_null());
    element
}

pub fn errstr(code: c_int) -> String {
    let message = flatdom::abi::flatdom_errstr(code);
    unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
}

/// Renders an element as compact JSON using only type queries, accessors and flattening.
/// Nested container handles produced by flattening are freed here, one by one.
pub fn render(element: *const dom_element) -> String {
    match element_type(element) {
        0 => {
            let buffer = element_object(element);
            assert!(!buffer.is_null());
            let entries: &[objectcontent] = unsafe {
                let count = (*buffer).elem.i as usize;
                std::slice::from_raw_parts(buffer, count + 1)
            };
            let parts: Vec<String> = entries[1..]
                .iter()
                .map(|entry| {
                    let key = unsafe { CStr::from_ptr(entry.key) }.to_str().unwrap();
                    format!("{}:{}", quote(key), render_slot(entry.kind, entry.elem))
                })
                .collect();
            objectcontent_free(buffer);
            format!("{{{}}}", parts.join(","))
        }
        1 => {
            let buffer = element_array(element);
            assert!(!buffer.is_null());
            let entries: &[arraycontent] = unsafe {
                let count = (*buffer).elem.i as usize;
                std::slice::from_raw_parts(buffer, count + 1)
            };
            let parts: Vec<String> = entries[1..]
                .iter()
                .map(|entry| render_slot(entry.kind, entry.elem))
                .collect();
            arraycontent_free(buffer);
            format!("[{}]", parts.join(","))
        }
        2 => {
            let text = unsafe { CStr::from_ptr(element_string(element)) };
            quote(text.to_str().unwrap())
        }
        3 => element_int(element).to_string(),
        4 => element_uint(element).to_string(),
        5 => element_double(element).to_string(),
        6 => element_bool(element).to_string(),
        _ => "null".to_string(),
    }
}

fn render_slot(kind: c_int, elem: element_union) -> String {
    unsafe {
        match kind {
            0 | 1 => {
                let child = elem.e;
                let out = render(child);
                element_free(child);
                out
            }
            2 => quote(CStr::from_ptr(elem.s).to_str().unwrap()),
            3 => elem.i.to_string(),
            4 => elem.u.to_string(),
            5 => elem.d.to_string(),
            6 => elem.b.to_string(),
            _ => "null".to_string(),
        }
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap()
}

pub fn null_element() -> *const dom_element {
    ptr::null()
}
