//! Heap object bodies and the per-object header the garbage collector uses.

use crate::handle::Handle;
use crate::variant::{UserKind, Variant, VariantKey};
use gm_collections::{Links, OrderedTable};
use std::sync::Arc;

/// An object's colour in the tri-colour mark-sweep scheme. Two whites
/// alternate across cycles so objects allocated mid-cycle aren't swept as
/// if they belonged to the cycle that started before they existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White0,
    White1,
    Grey,
    Black,
}

/// Per-object bookkeeping the collector needs, stored alongside every
/// object's payload rather than in a side table so colour-list membership
/// changes never need a second lookup.
#[derive(Debug, Clone, Copy)]
pub struct ObjectHeader {
    pub color: Color,
    pub persistent: bool,
    pub links: Links<Handle>,
}

impl ObjectHeader {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            persistent: false,
            links: Links::default(),
        }
    }
}

/// An immutable byte sequence. GameMonkey strings are UTF-8-oblivious; this
/// stores raw bytes and only exposes UTF-8 views where the caller expects
/// text (source code, symbol names).
#[derive(Debug, Clone)]
pub struct StringObject {
    pub bytes: Arc<[u8]>,
}

impl StringObject {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// An ordered mapping from non-null variant keys to variant values. Arrays
/// are represented by the same object; the runtime enforces the
/// dense-integer-key discipline at construction time rather than at the
/// representation level.
#[derive(Debug, Clone, Default)]
pub struct TableObject {
    pub entries: OrderedTable<VariantKey, Variant>,
}

/// Per-line source mapping used by the debugger to translate an instruction
/// address into a source line.
#[derive(Debug, Clone, Copy)]
pub struct LineEntry {
    pub address: u32,
    pub line: u32,
}

/// Bytecode and metadata for a function defined in script.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    pub bytecode: Arc<[u8]>,
    pub num_params: u32,
    pub num_locals: u32,
    pub max_stack: u32,
    pub source_id: u32,
    pub is_root: bool,
    pub debug_name: Option<Handle>,
    pub lines: Arc<[LineEntry]>,
    /// Handles of the string objects naming each param then each local, in
    /// declaration order; present only when debug info was loaded.
    pub symbols: Arc<[Handle]>,
}

/// A function pointer into host code, invoked with the call's argument
/// slice and returning either a value or a request to suspend the thread.
pub type NativeFn = Arc<dyn Fn(&[Variant]) -> crate::NativeOutcome + Send + Sync>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: Arc<str>,
    pub func: NativeFn,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub enum FunctionObject {
    Script(ScriptFunction),
    Native(NativeFunction),
}

/// An opaque host value tagged with a registered user-type kind. The owning
/// type's trace/destructor/operator callbacks live in the type registry
/// (`gm-vm`), looked up by `kind`; the heap only stores the pointer.
pub struct UserObject {
    pub kind: UserKind,
    pub data: Arc<dyn std::any::Any + Send + Sync>,
}

impl std::fmt::Debug for UserObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserObject").field("kind", &self.kind).finish()
    }
}

/// The payload of a heap object, tagged by the same shape as [`Variant`]'s
/// reference types.
#[derive(Debug, Clone)]
pub enum Object {
    String(StringObject),
    Table(TableObject),
    Function(FunctionObject),
    User(Arc<UserObject>),
}

impl Object {
    pub fn as_string(&self) -> Option<&StringObject> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableObject> {
        match self {
            Object::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableObject> {
        match self {
            Object::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionObject> {
        match self {
            Object::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&Arc<UserObject>> {
        match self {
            Object::User(u) => Some(u),
            _ => None,
        }
    }

    /// Approximate byte size charged against the GC budget. Containers
    /// charge only their own overhead; element costs were already charged
    /// when those elements were allocated.
    pub fn approx_size(&self) -> usize {
        match self {
            Object::String(s) => s.bytes.len() + 16,
            Object::Table(t) => t.entries.len() * 32 + 24,
            Object::Function(FunctionObject::Script(f)) => f.bytecode.len() + f.lines.len() * 8 + 48,
            Object::Function(FunctionObject::Native(_)) => 32,
            Object::User(_) => 32,
        }
    }
}
