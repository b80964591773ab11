//! The scoped script-call helper. `Machine::begin_global`/`begin_member`
//! hand out a [`CallBuilder`] that exclusively borrows the machine until
//! `end()` consumes it, so two outstanding calls can never be built at
//! once — the borrow checker enforces that, not a runtime flag.

use crate::error::RuntimeResult;
use crate::machine::Machine;
use gm_sched::ThreadId;
use gm_value::{Handle, UserKind, Variant};

pub struct CallBuilder<'m> {
    pub(crate) machine: &'m mut Machine,
    pub(crate) target: RuntimeResult<Handle>,
    pub(crate) this_value: Variant,
    pub(crate) args: Vec<Variant>,
}

impl<'m> CallBuilder<'m> {
    pub fn add_param_null(mut self) -> Self {
        self.args.push(Variant::Null);
        self
    }

    pub fn add_param_int(mut self, value: i32) -> Self {
        self.args.push(Variant::Int(value));
        self
    }

    pub fn add_param_float(mut self, value: f32) -> Self {
        self.args.push(Variant::Float(value));
        self
    }

    pub fn add_param_string(mut self, value: &str) -> Self {
        let handle = self.machine.intern_string(value);
        self.args.push(Variant::String(handle));
        self
    }

    pub fn add_param_user(mut self, kind: UserKind, handle: Handle) -> Self {
        self.args.push(Variant::User(kind, handle));
        self
    }

    /// Spawns a new thread at the resolved callee with the accumulated
    /// arguments, placing it on the running queue. Cooperative scheduling
    /// means there's no synchronous return value to hand back here; read the
    /// result with [`Machine::get_int`] and friends once the thread has run
    /// to completion.
    pub fn end(self) -> RuntimeResult<ThreadId> {
        let callee = self.target?;
        self.machine.spawn_call(callee, self.this_value, &self.args)
    }
}
