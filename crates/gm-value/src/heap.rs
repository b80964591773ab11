//! The handle-addressed object heap.
//!
//! `Heap` is deliberately mechanical: it stores object bodies and GC headers
//! indexed by [`Handle`], and exposes the handful of constructors the
//! collector needs. Budget accounting and colour-list membership are a
//! collector concern (`gm-gc::Collector` wraps a `Heap`); this type only
//! guarantees that handles stay stable and that string interning is
//! consistent.

use crate::handle::{Handle, HandleAllocator};
use crate::object::{Color, FunctionObject, NativeFunction, Object, ObjectHeader, UserObject};
use crate::variant::UserKind;
use gm_collections::{LinkAccess, Links};
use std::collections::HashMap;
use std::sync::Arc;

struct Slot {
    header: ObjectHeader,
    object: Object,
}

/// Storage for every live heap object, keyed by handle.
#[derive(Default)]
pub struct Heap {
    slots: HashMap<Handle, Slot>,
    handles: HandleAllocator,
    interned: HashMap<Box<[u8]>, Handle>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, object: Object, color: Color) -> Handle {
        let handle = self.handles.allocate();
        self.slots.insert(
            handle,
            Slot {
                header: ObjectHeader::new(color),
                object,
            },
        );
        handle
    }

    /// Allocates a new, non-interned string object.
    pub fn alloc_string(&mut self, bytes: impl Into<Arc<[u8]>>, color: Color) -> Handle {
        self.insert(Object::String(crate::object::StringObject { bytes: bytes.into() }), color)
    }

    /// Returns the handle for `bytes`, allocating and interning a new string
    /// object only if one doesn't already exist. `intern(s1) == intern(s2)`
    /// iff the bytes are equal.
    pub fn intern_string(&mut self, bytes: &[u8], color: Color) -> Handle {
        if let Some(&handle) = self.interned.get(bytes) {
            return handle;
        }
        let handle = self.alloc_string(bytes.to_vec(), color);
        self.interned.insert(bytes.to_vec().into_boxed_slice(), handle);
        handle
    }

    pub fn alloc_table(&mut self, color: Color) -> Handle {
        self.insert(Object::Table(crate::object::TableObject::default()), color)
    }

    pub fn alloc_function_script(&mut self, func: crate::object::ScriptFunction, color: Color) -> Handle {
        self.insert(Object::Function(FunctionObject::Script(func)), color)
    }

    pub fn alloc_function_native(&mut self, name: impl Into<Arc<str>>, func: crate::object::NativeFn, color: Color) -> Handle {
        self.insert(
            Object::Function(FunctionObject::Native(NativeFunction {
                name: name.into(),
                func,
            })),
            color,
        )
    }

    pub fn alloc_user(&mut self, kind: UserKind, data: Arc<dyn std::any::Any + Send + Sync>, color: Color) -> Handle {
        self.insert(Object::User(Arc::new(UserObject { kind, data })), color)
    }

    pub fn get(&self, handle: Handle) -> Option<&Object> {
        self.slots.get(&handle).map(|s| &s.object)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Object> {
        self.slots.get_mut(&handle).map(|s| &mut s.object)
    }

    pub fn header(&self, handle: Handle) -> Option<&ObjectHeader> {
        self.slots.get(&handle).map(|s| &s.header)
    }

    pub fn header_mut(&mut self, handle: Handle) -> Option<&mut ObjectHeader> {
        self.slots.get_mut(&handle).map(|s| &mut s.header)
    }

    pub fn color(&self, handle: Handle) -> Option<Color> {
        self.header(handle).map(|h| h.color)
    }

    pub fn set_color(&mut self, handle: Handle, color: Color) {
        if let Some(header) = self.header_mut(handle) {
            header.color = color;
        }
    }

    /// Removes `handle` from the heap and hands its index back to the
    /// allocator. Callers (the collector's sweep phase) are responsible for
    /// only doing this once nothing can still reference the handle.
    pub fn free(&mut self, handle: Handle) -> Option<Object> {
        let slot = self.slots.remove(&handle)?;
        if let Object::String(s) = &slot.object {
            if self.interned.get(s.bytes.as_ref()) == Some(&handle) {
                self.interned.remove(s.bytes.as_ref());
            }
        }
        self.handles.recycle(handle);
        Some(slot.object)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.slots.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every live handle, in no particular order. Used by the sweep phase to
    /// find objects of a given colour.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots.keys().copied()
    }

    pub fn approx_size(&self, handle: Handle) -> usize {
        self.get(handle).map(Object::approx_size).unwrap_or(0)
    }
}

impl LinkAccess<Handle> for Heap {
    fn links(&self, handle: Handle) -> Links<Handle> {
        self.header(handle).map(|h| h.links).unwrap_or_default()
    }

    fn set_links(&mut self, handle: Handle, links: Links<Handle>) {
        if let Some(header) = self.header_mut(handle) {
            header.links = links;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_bytes_returns_the_same_handle() {
        let mut heap = Heap::new();
        let a = heap.intern_string(b"hello", Color::White0);
        let b = heap.intern_string(b"hello", Color::White0);
        assert_eq!(a, b);
    }

    #[test]
    fn interning_different_bytes_returns_different_handles() {
        let mut heap = Heap::new();
        let a = heap.intern_string(b"hello", Color::White0);
        let b = heap.intern_string(b"world", Color::White0);
        assert_ne!(a, b);
    }

    #[test]
    fn non_interned_allocations_are_independent() {
        let mut heap = Heap::new();
        let a = heap.alloc_string(b"hi".to_vec(), Color::White0);
        let b = heap.alloc_string(b"hi".to_vec(), Color::White0);
        assert_ne!(a, b);
    }

    #[test]
    fn freeing_recycles_the_handle() {
        let mut heap = Heap::new();
        let a = heap.alloc_table(Color::White0);
        heap.free(a);
        let b = heap.alloc_table(Color::White0);
        assert_eq!(a, b);
        assert!(heap.contains(b));
    }

    #[test]
    fn freeing_an_interned_string_lets_it_be_interned_again_under_a_fresh_handle() {
        let mut heap = Heap::new();
        let a = heap.intern_string(b"hello", Color::White0);
        heap.free(a);

        let b = heap.intern_string(b"hello", Color::White0);

        assert!(heap.contains(b));
        assert!(heap.get(b).is_some());
    }

    #[test]
    fn freeing_a_non_interned_copy_does_not_evict_the_interned_entry() {
        let mut heap = Heap::new();
        let interned = heap.intern_string(b"hello", Color::White0);
        let plain = heap.alloc_string(b"hello".to_vec(), Color::White0);

        heap.free(plain);

        assert_eq!(heap.intern_string(b"hello", Color::White0), interned);
    }
}
