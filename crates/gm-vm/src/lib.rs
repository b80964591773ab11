//! The stack-based bytecode VM: opcode set, instruction decoding, per-thread
//! execution state, and the table-driven dispatch loop.

mod engine;
mod error;
mod frame;
mod instruction;
mod jump_table;
mod ops;
mod registry;
mod thread;

pub use engine::{run_thread, run_thread_with_hook, DebugHook, ExecState, Flow, RunOutcome};
pub use error::{VmError, VmResult};
pub use frame::CallFrame;
pub use gm_value::OpCode;
pub use instruction::{decode_at, next_address, DecodeError, Instruction};
pub use jump_table::{InstructionHandler, JumpTable};
pub use registry::{BinaryOverload, OperatorRegistry, UnaryOverload};
pub use thread::{Thread, ThreadState};
