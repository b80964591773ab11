//! The cooperative scheduler layered over `gm-vm`'s single-thread stepping
//! loop: running/sleeping/blocked queues, signals, and thread-slot pooling.

mod error;
mod scheduler;
mod sleep_entry;

pub use error::{SchedError, SchedResult};
pub use scheduler::{DestroyHook, DestroyReason, Scheduler, Signal, StepReport, ThreadId, UNLIMITED_BUDGET};
