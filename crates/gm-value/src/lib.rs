//! Tagged values and the object heap shared by the rest of the runtime.
//!
//! [`Variant`] is the value type scripts and native bindings exchange;
//! [`Heap`] stores the reference types a `Variant` can point at, addressed by
//! stable [`Handle`]s rather than raw pointers so the collector can move
//! objects between colour lists without invalidating anything holding a
//! handle.

mod handle;
mod object;
mod op_code;
mod variant;

pub mod heap;

pub use handle::{Handle, HandleAllocator};
pub use heap::Heap;
pub use object::{
    Color, FunctionObject, LineEntry, NativeFn, NativeFunction, Object, ObjectHeader, ScriptFunction,
    StringObject, TableObject, UserObject,
};
pub use op_code::OpCode;
pub use variant::{UserKind, Variant, VariantKey, VariantType, USER_KIND_BASE};

/// What a native function call produced: either a value to leave on the
/// stack, or a request that the calling thread suspend before the call is
/// considered complete.
#[derive(Debug, Clone)]
pub enum NativeOutcome {
    Return(Variant),
    Yield(YieldReason),
}

/// Why a native call is asking its thread to suspend. Mirrors the
/// suspension points a `YIELD` opcode can also trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldReason {
    Sleep { wake_time_ms: u64 },
    Block { signal: u32 },
}
