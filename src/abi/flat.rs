//! Purpose: One-level flattening of arrays and objects into caller-owned C buffers.
//! Exports: `element_union`, `arraycontent`, `objectcontent`, `element_array`, `element_object`,
//! `arraycontent_free`, `objectcontent_free`, `COUNT_SLOT`.
//! Role: The only place the tagged core `Value` is lowered to the foreign tagged-union layout.
//! Invariants: Buffers hold `count + 1` entries; slot 0 carries `count` in `elem.i`, kind `COUNT_SLOT`.
//! Invariants: Container children get a fresh element handle each; the buffer free never releases them.
//! Invariants: String and key pointers are borrowed from the document; the buffer does not own them.
use std::ffi::{c_char, c_int};
use std::ptr;

use super::{borrow_element, dom_element, into_element};
use crate::core::document::{ElementRef, ElementType, Value};

/// Discriminant stored in slot 0; never a real element type.
pub const COUNT_SLOT: c_int = -1;

#[repr(C)]
#[derive(Clone, Copy)]
pub union element_union {
    pub e: *mut dom_element,
    pub s: *const c_char,
    pub i: i64,
    pub u: u64,
    pub d: f64,
    pub b: bool,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct arraycontent {
    pub kind: c_int,
    pub elem: element_union,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct objectcontent {
    pub kind: c_int,
    pub key: *const c_char,
    pub elem: element_union,
}

impl element_union {
    fn zeroed() -> Self {
        element_union { u: 0 }
    }

    fn count(count: usize) -> Self {
        element_union { i: count as i64 }
    }

    /// Lowers one child. Containers become new owned handles; scalars are copied in place.
    fn store(child: ElementRef<'_>) -> Self {
        let mut slot = Self::zeroed();
        match child.value() {
            Value::Object(container) | Value::Array(container) => {
                slot.e = into_element(container.to_element());
            }
            Value::String(text) => slot.s = text.as_ptr(),
            Value::Int64(value) => slot.i = value,
            Value::Uint64(value) => slot.u = value,
            Value::Double(value) => slot.d = value,
            Value::Bool(value) => slot.b = value,
            Value::Null => {}
        }
        slot
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn element_array(element: *const dom_element) -> *mut arraycontent {
    let Some(element) = borrow_element(element) else {
        return ptr::null_mut();
    };
    let view = element.view();
    if view.element_type() != ElementType::Array {
        return ptr::null_mut();
    }
    let count = view.size();
    let mut entries = Vec::new();
    if entries.try_reserve_exact(count + 1).is_err() {
        tracing::debug!(count, "array flattening allocation failed");
        return ptr::null_mut();
    }
    entries.push(arraycontent {
        kind: COUNT_SLOT,
        elem: element_union::count(count),
    });
    entries.extend(view.entries().map(|entry| arraycontent {
        kind: entry.value.element_type().as_i32(),
        elem: element_union::store(entry.value),
    }));
    Box::into_raw(entries.into_boxed_slice()).cast::<arraycontent>()
}

#[unsafe(no_mangle)]
pub extern "C" fn element_object(element: *const dom_element) -> *mut objectcontent {
    let Some(element) = borrow_element(element) else {
        return ptr::null_mut();
    };
    let view = element.view();
    if view.element_type() != ElementType::Object {
        return ptr::null_mut();
    }
    let count = view.size();
    let mut entries = Vec::new();
    if entries.try_reserve_exact(count + 1).is_err() {
        tracing::debug!(count, "object flattening allocation failed");
        return ptr::null_mut();
    }
    entries.push(objectcontent {
        kind: COUNT_SLOT,
        key: ptr::null(),
        elem: element_union::count(count),
    });
    entries.extend(view.entries().map(|entry| objectcontent {
        kind: entry.value.element_type().as_i32(),
        key: entry.key.map_or(ptr::null(), |key| key.as_ptr()),
        elem: element_union::store(entry.value),
    }));
    Box::into_raw(entries.into_boxed_slice()).cast::<objectcontent>()
}

/// Releases the buffer only. Nested container handles must be freed with `element_free` first.
#[unsafe(no_mangle)]
pub extern "C" fn arraycontent_free(content: *mut arraycontent) {
    if content.is_null() {
        return;
    }
    unsafe {
        let len = (*content).elem.i as usize + 1;
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(content, len)));
    }
}

/// Releases the buffer only. Nested container handles must be freed with `element_free` first.
#[unsafe(no_mangle)]
pub extern "C" fn objectcontent_free(content: *mut objectcontent) {
    if content.is_null() {
        return;
    }
    unsafe {
        let len = (*content).elem.i as usize + 1;
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(content, len)));
    }
}
