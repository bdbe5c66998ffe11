//! ABI contract: scalar reads, flattening layout, navigation, ownership and null handling.
mod common;

use std::ffi::{CStr, c_int};
use std::ptr;

use common::{errstr, parse, render};
use flatdom::abi::flat::{
    COUNT_SLOT, arraycontent, arraycontent_free, element_array, element_object, objectcontent,
    objectcontent_free,
};
use flatdom::abi::{
    element_at, element_at_key, element_at_pointer, element_bool, element_double, element_free,
    element_get_bool, element_get_double, element_get_int, element_get_string, element_get_uint,
    element_int, element_size, element_string, element_type, element_uint, implementation_description,
    implementation_name, parser_allocate, parser_capacity, parser_free, parser_load,
    parser_max_capacity, parser_max_depth, parser_new, parser_new_size, parser_new_with_options,
    parser_parse,
};
use flatdom::{ElementType, ErrorCode};

const OBJECT: c_int = 0;
const ARRAY: c_int = 1;
const STRING: c_int = 2;
const INT64: c_int = 3;
const UINT64: c_int = 4;
const DOUBLE: c_int = 5;
const BOOL: c_int = 6;
const NULL: c_int = 7;

#[test]
fn type_discriminants_are_stable() {
    let expected = [
        (ElementType::Object, OBJECT),
        (ElementType::Array, ARRAY),
        (ElementType::String, STRING),
        (ElementType::Int64, INT64),
        (ElementType::Uint64, UINT64),
        (ElementType::Double, DOUBLE),
        (ElementType::Bool, BOOL),
        (ElementType::Null, NULL),
    ];
    for (kind, value) in expected {
        assert_eq!(kind.as_i32(), value, "{kind:?}");
    }
}

#[test]
fn scalar_documents_round_trip() {
    let parser = parser_new();

    let root = parse(parser, "42");
    assert_eq!(element_type(root), INT64);
    assert_eq!(element_int(root), 42);
    element_free(root);

    let root = parse(parser, "-7");
    assert_eq!(element_type(root), INT64);
    assert_eq!(element_int(root), -7);
    element_free(root);

    let root = parse(parser, "3.5");
    assert_eq!(element_type(root), DOUBLE);
    assert_eq!(element_double(root), 3.5);
    element_free(root);

    let root = parse(parser, "18446744073709551615");
    assert_eq!(element_type(root), UINT64);
    assert_eq!(element_uint(root), u64::MAX);
    element_free(root);

    let root = parse(parser, r#""héllo\n""#);
    assert_eq!(element_type(root), STRING);
    let text = unsafe { CStr::from_ptr(element_string(root)) };
    assert_eq!(text.to_str().unwrap(), "héllo\n");
    element_free(root);

    let root = parse(parser, "true");
    assert_eq!(element_type(root), BOOL);
    assert!(element_bool(root));
    element_free(root);

    let root = parse(parser, " null ");
    assert_eq!(element_type(root), NULL);
    assert_eq!(element_size(root), 0);
    element_free(root);

    parser_free(parser);
}

#[test]
fn object_flattening_keeps_source_order() {
    let parser = parser_new();
    let root = parse(parser, r#"{"a":1,"b":"x"}"#);
    assert_eq!(element_size(root), 2);

    let buffer = element_object(root);
    assert!(!buffer.is_null());
    unsafe {
        let entries: &[objectcontent] = std::slice::from_raw_parts(buffer, 3);
        assert_eq!(entries[0].kind, COUNT_SLOT);
        assert_eq!(entries[0].elem.i, 2);

        assert_eq!(CStr::from_ptr(entries[1].key).to_str().unwrap(), "a");
        assert_eq!(entries[1].kind, INT64);
        assert_eq!(entries[1].elem.i, 1);

        assert_eq!(CStr::from_ptr(entries[2].key).to_str().unwrap(), "b");
        assert_eq!(entries[2].kind, STRING);
        assert_eq!(CStr::from_ptr(entries[2].elem.s).to_str().unwrap(), "x");
    }
    objectcontent_free(buffer);
    element_free(root);
    parser_free(parser);
}

#[test]
fn duplicate_keys_survive_flattening() {
    let parser = parser_new();
    let root = parse(parser, r#"{"k":1,"k":2}"#);
    assert_eq!(render(root), r#"{"k":1,"k":2}"#);
    element_free(root);
    parser_free(parser);
}

#[test]
fn nested_container_handles_outlive_their_buffer() {
    let parser = parser_new();
    let root = parse(parser, r#"[{"inner":[1,2]},"tail"]"#);
    let buffer = element_array(root);
    let child = unsafe {
        let entries: &[arraycontent] = std::slice::from_raw_parts(buffer, 3);
        assert_eq!(entries[1].kind, OBJECT);
        assert_eq!(entries[2].kind, STRING);
        entries[1].elem.e
    };
    arraycontent_free(buffer);

    assert_eq!(element_type(child), OBJECT);
    assert_eq!(render(child), r#"{"inner":[1,2]}"#);
    element_free(child);
    element_free(root);
    parser_free(parser);
}

/// Reads an array buffer into `(kind, text)` pairs, releasing nested handles and the buffer.
fn drain_array(element: *mut flatdom::abi::dom_element) -> Vec<(c_int, String)> {
    let buffer = element_array(element);
    assert!(!buffer.is_null());
    let drained = unsafe {
        let count = (*buffer).elem.i as usize;
        let entries: &[arraycontent] = std::slice::from_raw_parts(buffer, count + 1);
        entries[1..]
            .iter()
            .map(|entry| {
                let text = match entry.kind {
                    OBJECT | ARRAY => {
                        let nested = entry.elem.e;
                        let text = render(nested);
                        element_free(nested);
                        text
                    }
                    STRING => CStr::from_ptr(entry.elem.s).to_string_lossy().into_owned(),
                    INT64 => entry.elem.i.to_string(),
                    other => panic!("unexpected kind {other}"),
                };
                (entry.kind, text)
            })
            .collect()
    };
    arraycontent_free(buffer);
    drained
}

#[test]
fn source_element_is_intact_after_its_buffer_is_freed() {
    let parser = parser_new();
    let root = parse(parser, r#"[1,"two",[3]]"#);
    let expected = vec![
        (INT64, "1".to_string()),
        (STRING, "two".to_string()),
        (ARRAY, "[3]".to_string()),
    ];
    assert_eq!(drain_array(root), expected);

    assert_eq!(element_type(root), ARRAY);
    assert_eq!(element_size(root), 3);
    let first = element_at(root, 0);
    assert_eq!(element_int(first), 1);
    element_free(first);
    assert_eq!(drain_array(root), expected);
    assert_eq!(render(root), r#"[1,"two",[3]]"#);

    element_free(root);
    parser_free(parser);
}

#[test]
fn render_walks_a_mixed_document() {
    let parser = parser_new();
    let input = r#"{"id":7,"tags":["a","b"],"ratio":0.25,"ok":false,"none":null,"big":18446744073709551615,"nested":{"deep":[[],{}]}}"#;
    let root = parse(parser, input);
    assert_eq!(render(root), input);
    element_free(root);
    parser_free(parser);
}

#[test]
fn navigation_reports_misses_with_null() {
    let parser = parser_new();
    let root = parse(parser, r#"{"list":[10,20,30],"name":"n"}"#);

    let list = element_at_key(root, c"list".as_ptr());
    assert_eq!(element_type(list), ARRAY);
    assert_eq!(element_size(list), 3);
    let second = element_at(list, 1);
    assert_eq!(element_int(second), 20);
    assert!(element_at(list, 3).is_null());
    assert!(element_at_key(list, c"x".as_ptr()).is_null());
    assert!(element_at_key(root, c"missing".as_ptr()).is_null());
    assert!(element_at_key(root, ptr::null()).is_null());

    let by_ordinal = element_at(root, 1);
    assert_eq!(element_type(by_ordinal), STRING);

    let name = element_at_key(root, c"name".as_ptr());
    assert!(element_at(name, 0).is_null());
    assert!(element_array(name).is_null());
    assert!(element_object(name).is_null());

    for handle in [list, second, by_ordinal, name] {
        element_free(handle);
    }
    element_free(root);
    parser_free(parser);
}

#[test]
fn json_pointer_navigation() {
    let parser = parser_new();
    let root = parse(parser, r#"{"a/b":{"m~n":[true,{"x":"y"}]}}"#);
    let mut err: c_int = -1;

    let hit = element_at_pointer(root, c"/a~1b/m~0n/1/x".as_ptr(), &mut err);
    assert_eq!(err, 0);
    let text = unsafe { CStr::from_ptr(element_string(hit)) };
    assert_eq!(text.to_str().unwrap(), "y");
    element_free(hit);

    let same = element_at_pointer(root, c"".as_ptr(), &mut err);
    assert_eq!(err, 0);
    assert_eq!(element_type(same), OBJECT);
    element_free(same);

    let cases = [
        (c"no-slash", ErrorCode::InvalidJsonPointer),
        (c"/a~1b/m~0n/01", ErrorCode::InvalidJsonPointer),
        (c"/a~1b/m~0n/9", ErrorCode::IndexOutOfBounds),
        (c"/missing", ErrorCode::NoSuchField),
        (c"/a~1b/m~0n/0/deeper", ErrorCode::IncorrectType),
    ];
    for (pointer, code) in cases {
        let miss = element_at_pointer(root, pointer.as_ptr(), &mut err);
        assert!(miss.is_null(), "{pointer:?}");
        assert_eq!(err, code.as_i32(), "{pointer:?}");
    }

    element_free(root);
    parser_free(parser);
}

#[test]
fn unchecked_accessors_return_zero_on_mismatch() {
    let parser = parser_new();
    let root = parse(parser, r#""not a number""#);
    assert_eq!(element_int(root), 0);
    assert_eq!(element_uint(root), 0);
    assert_eq!(element_double(root), 0.0);
    assert!(!element_bool(root));
    element_free(root);

    // A genuine zero looks the same; only the checked variants tell them apart.
    let zero = parse(parser, "0");
    assert_eq!(element_int(zero), 0);
    assert!(element_string(zero).is_null());
    element_free(zero);
    parser_free(parser);
}

#[test]
fn checked_accessors_report_codes() {
    let parser = parser_new();
    let root = parse(parser, r#"[-1,2,"s",true,1.5]"#);
    let items: Vec<_> = (0..5).map(|i| element_at(root, i)).collect();

    let mut int = 0i64;
    assert_eq!(element_get_int(items[0], &mut int), 0);
    assert_eq!(int, -1);

    let mut uint = 0u64;
    assert_eq!(
        element_get_uint(items[0], &mut uint),
        ErrorCode::NumberOutOfRange.as_i32()
    );
    assert_eq!(element_get_uint(items[1], &mut uint), 0);
    assert_eq!(uint, 2);

    let mut text = ptr::null();
    assert_eq!(element_get_string(items[2], &mut text), 0);
    assert_eq!(unsafe { CStr::from_ptr(text) }.to_str().unwrap(), "s");
    assert_eq!(
        element_get_int(items[2], &mut int),
        ErrorCode::IncorrectType.as_i32()
    );

    let mut flag = false;
    assert_eq!(element_get_bool(items[3], &mut flag), 0);
    assert!(flag);

    let mut double = 0.0f64;
    assert_eq!(element_get_double(items[4], &mut double), 0);
    assert_eq!(double, 1.5);
    assert_eq!(element_get_double(items[1], &mut double), 0);
    assert_eq!(double, 2.0);

    assert_eq!(
        element_get_int(items[0], ptr::null_mut()),
        ErrorCode::Uninitialized.as_i32()
    );

    for item in items {
        element_free(item);
    }
    element_free(root);
    parser_free(parser);
}

#[test]
fn elements_are_freed_before_the_parser_is_reused() {
    // Precondition for callers: a reparse ends the validity of earlier elements, so every
    // handle from one parse is released before the next parse on the same parser.
    let parser = parser_new();
    let first = parse(parser, r#"{"round":1}"#);
    let round = element_at_key(first, c"round".as_ptr());
    assert_eq!(element_int(round), 1);
    element_free(round);
    element_free(first);

    let second = parse(parser, r#"{"round":2}"#);
    assert_eq!(render(second), r#"{"round":2}"#);
    element_free(second);
    parser_free(parser);
}

#[test]
fn null_handles_are_tolerated() {
    let null = common::null_element();
    assert_eq!(element_type(null), NULL);
    assert_eq!(element_int(null), 0);
    assert!(element_string(null).is_null());
    assert_eq!(element_size(null), 0);
    assert!(element_at(null, 0).is_null());
    assert!(element_at_key(null, c"k".as_ptr()).is_null());
    assert!(element_array(null).is_null());
    let mut out = 0i64;
    assert_eq!(element_get_int(null, &mut out), ErrorCode::Uninitialized.as_i32());

    let mut err: c_int = -1;
    let input = "1";
    assert!(parser_parse(ptr::null_mut(), input.as_ptr().cast(), 1, &mut err).is_null());
    assert_eq!(err, ErrorCode::Uninitialized.as_i32());
    assert_eq!(parser_capacity(ptr::null_mut()), 0);

    element_free(ptr::null_mut());
    parser_free(ptr::null_mut());
    arraycontent_free(ptr::null_mut());
    objectcontent_free(ptr::null_mut());
}

#[test]
fn parse_failures_set_codes() {
    let parser = parser_new();
    let mut err: c_int = -1;
    for input in ["", "   "] {
        assert!(parser_parse(parser, input.as_ptr().cast(), input.len(), &mut err).is_null());
        assert_eq!(err, ErrorCode::Empty.as_i32(), "{input:?}");
    }
    let cases = [
        ("[1,2", ErrorCode::IncompleteArrayOrObject),
        ("\"open", ErrorCode::UnclosedString),
        ("[\"\t\"]", ErrorCode::UnescapedChars),
        ("tru", ErrorCode::TAtomError),
        ("[false,fals]", ErrorCode::FAtomError),
        ("{\"a\":nul}", ErrorCode::NAtomError),
        ("[1e]", ErrorCode::NumberError),
        ("[\"\\q\"]", ErrorCode::StringError),
        ("{} {}", ErrorCode::TrailingContent),
        ("{\"a\" 1}", ErrorCode::TapeError),
        ("[1,]", ErrorCode::TapeError),
    ];
    for (input, code) in cases {
        err = -1;
        let root = parser_parse(parser, input.as_ptr().cast(), input.len(), &mut err);
        assert!(root.is_null(), "{input:?}");
        assert_eq!(err, code.as_i32(), "{input:?}");
        assert_ne!(errstr(err), "Unknown error code", "{input:?}");
    }

    // The code slot is optional.
    let root = parser_parse(parser, "{}".as_ptr().cast(), 2, ptr::null_mut());
    assert!(!root.is_null());
    element_free(root);
    parser_free(parser);
}

#[test]
fn parser_limits_and_allocation() {
    let parser = parser_new_size(16);
    assert_eq!(parser_max_capacity(parser), 16);
    assert_eq!(parser_capacity(parser), 0);
    assert_eq!(parser_max_depth(parser), 1024);

    let mut err: c_int = -1;
    let input = "[1,2,3,4,5,6,7,8,9]";
    assert!(parser_parse(parser, input.as_ptr().cast(), input.len(), &mut err).is_null());
    assert_eq!(err, ErrorCode::Capacity.as_i32());

    assert_eq!(
        parser_allocate(parser, 32, 8, &mut err),
        ErrorCode::Capacity.as_i32()
    );
    assert_eq!(err, ErrorCode::Capacity.as_i32());
    assert_eq!(
        parser_allocate(parser, 8, 0, &mut err),
        ErrorCode::DepthError.as_i32()
    );
    assert_eq!(parser_allocate(parser, 16, 2, &mut err), 0);
    assert_eq!(err, 0);
    assert_eq!(parser_capacity(parser), 16);
    assert_eq!(parser_max_depth(parser), 2);

    let deep = "[[[1]]]";
    assert!(parser_parse(parser, deep.as_ptr().cast(), deep.len(), &mut err).is_null());
    assert_eq!(err, ErrorCode::DepthError.as_i32());
    parser_free(parser);
}

#[test]
fn options_json_configures_parsers() {
    let mut err: c_int = -1;
    let options = br#"{"max_depth":1,"batch_size":64}"#;
    let parser = parser_new_with_options(options.as_ptr(), options.len(), &mut err);
    assert_eq!(err, 0);
    assert_eq!(parser_max_depth(parser), 1);

    let flat = parse(parser, "[1,2]");
    element_free(flat);
    let nested = "[[1]]";
    assert!(parser_parse(parser, nested.as_ptr().cast(), nested.len(), &mut err).is_null());
    assert_eq!(err, ErrorCode::DepthError.as_i32());
    parser_free(parser);

    let defaults = parser_new_with_options(ptr::null(), 0, &mut err);
    assert_eq!(err, 0);
    assert_eq!(parser_max_depth(defaults), 1024);
    parser_free(defaults);

    let unknown = br#"{"depth":3}"#;
    assert!(parser_new_with_options(unknown.as_ptr(), unknown.len(), &mut err).is_null());
    assert_ne!(err, 0);
}

#[test]
fn load_reads_files_and_reports_io_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("doc.json");
    std::fs::write(&file, br#"{"from":"disk"}"#).expect("write");
    let path = std::ffi::CString::new(file.to_str().unwrap()).unwrap();

    let parser = parser_new();
    let mut err: c_int = -1;
    let root = parser_load(parser, path.as_ptr(), &mut err);
    assert_eq!(err, 0);
    assert_eq!(render(root), r#"{"from":"disk"}"#);
    element_free(root);

    let missing = std::ffi::CString::new(dir.path().join("nope.json").to_str().unwrap()).unwrap();
    assert!(parser_load(parser, missing.as_ptr(), &mut err).is_null());
    assert_eq!(err, ErrorCode::IoError.as_i32());

    assert!(parser_load(parser, ptr::null(), &mut err).is_null());
    assert_eq!(err, ErrorCode::Uninitialized.as_i32());
    parser_free(parser);
}

#[test]
fn error_strings_cover_every_code() {
    assert_eq!(errstr(0), "No error");
    for code in 1..flatdom::core::error::NUM_ERROR_CODES as c_int {
        let message = errstr(code);
        assert!(!message.is_empty(), "code {code}");
        assert_ne!(message, "Unknown error code", "code {code}");
    }
    assert_eq!(errstr(-3), "Unknown error code");
    assert_eq!(errstr(10_000), "Unknown error code");
}

#[test]
fn implementation_is_reported() {
    let name = unsafe { CStr::from_ptr(implementation_name()) };
    let description = unsafe { CStr::from_ptr(implementation_description()) };
    let known = ["avx2", "sse4.2", "neon", "simd128", "fallback"];
    assert!(known.contains(&name.to_str().unwrap()));
    assert!(!description.to_bytes().is_empty());
    assert_eq!(name.as_ptr(), implementation_name());
}
