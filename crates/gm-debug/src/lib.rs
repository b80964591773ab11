//! The remote debug protocol: packed four-char-tag messages over a
//! user-supplied transport, breakpoints keyed by (source, line), and
//! per-thread stepping state kept in a side table rather than on
//! `gm_vm::Thread` itself.

mod breakpoint;
mod error;
mod protocol;
mod session;
mod step_state;

pub use breakpoint::{Breakpoint, BreakpointTable};
pub use error::{DebugError, DebugResult};
pub use protocol::{decode_command, decode_reply, encode_command, encode_reply, Command, Reply, ThreadInfoState};
pub use session::{Session, SourceProvider};
pub use step_state::{StepState, StepTable};
