//! The debug session: owns breakpoints and per-thread stepping state, talks
//! to a user-supplied transport, and implements [`gm_vm::DebugHook`] so the
//! scheduler's run loop can consult it one instruction at a time.

use crate::breakpoint::{Breakpoint, BreakpointTable};
use crate::protocol::{decode_command, encode_reply, Command, Reply, ThreadInfoState};
use crate::step_state::StepTable;
use gm_gc::Collector;
use gm_value::{FunctionObject, Handle, Object};
use gm_vm::DebugHook;

/// Supplies embedded source text by id; implemented by the embedding crate,
/// which is the one that actually keeps loaded sources around.
pub trait SourceProvider {
    fn source(&self, id: u32) -> Option<(&str, &str)>;
}

fn line_for(gc: &Collector, function: Handle, address: u32) -> Option<(u32, u32)> {
    match gc.heap().get(function) {
        Some(Object::Function(FunctionObject::Script(f))) => {
            let line = f.lines.iter().rev().find(|e| e.address <= address).map(|e| e.line).unwrap_or(0);
            Some((f.source_id, line))
        }
        _ => None,
    }
}

fn function_name(gc: &Collector, function: Handle) -> String {
    let debug_name = match gc.heap().get(function) {
        Some(Object::Function(FunctionObject::Script(f))) => f.debug_name,
        _ => None,
    };
    debug_name
        .and_then(|h| gc.heap().get(h).and_then(|o| o.as_string().and_then(|s| s.as_str().map(str::to_owned))))
        .unwrap_or_default()
}

/// Frame `n` counting from the innermost (currently executing) frame, and
/// the address that frame is paused at — `thread.ip` for the innermost
/// frame, otherwise the return address recorded by the frame above it.
fn frame_at(thread: &gm_vm::Thread, frame: u32) -> Option<(gm_vm::CallFrame, u32)> {
    let depth = thread.frames.len();
    let frame = frame as usize;
    if frame >= depth {
        return None;
    }
    let idx = depth - 1 - frame;
    let address = if idx + 1 == depth { thread.ip } else { thread.frames[idx + 1].return_address };
    Some((thread.frames[idx], address))
}

pub struct Session {
    pump: Box<dyn FnMut() -> Option<Vec<u8>> + Send>,
    sender: Box<dyn FnMut(Vec<u8>) + Send>,
    steps: StepTable,
    breakpoints: BreakpointTable,
}

impl Session {
    pub fn new(
        pump: impl FnMut() -> Option<Vec<u8>> + Send + 'static,
        sender: impl FnMut(Vec<u8>) + Send + 'static,
    ) -> Self {
        Self {
            pump: Box::new(pump),
            sender: Box::new(sender),
            steps: StepTable::new(),
            breakpoints: BreakpointTable::new(),
        }
    }

    fn send(&mut self, reply: Reply) {
        (self.sender)(encode_reply(&reply));
    }

    /// Drains and dispatches every command currently waiting on the pump.
    pub fn poll(&mut self, scheduler: &mut gm_sched::Scheduler, gc: &Collector, sources: &dyn SourceProvider) {
        while let Some(bytes) = (self.pump)() {
            match decode_command(&bytes) {
                Ok(command) => self.dispatch(command, scheduler, gc, sources),
                Err(err) => {
                    log::warn!("debug session received a malformed command: {err}");
                    self.send(Reply::Error { message: err.to_string() });
                }
            }
        }
    }

    fn dispatch(&mut self, command: Command, scheduler: &mut gm_sched::Scheduler, gc: &Collector, sources: &dyn SourceProvider) {
        log::debug!("debug session dispatching {command:?}");
        match command {
            Command::Run => {
                let parked: Vec<_> = scheduler.threads().map(|(id, _)| id).filter(|&id| self.steps.get(id).at_break).collect();
                for id in parked {
                    self.steps.resume(id);
                    scheduler.resume(id);
                }
                self.send(Reply::Running);
            }
            Command::StepInto { thread } => self.arm_step(scheduler, thread, StepTable::step_into),
            Command::StepOver { thread } => self.arm_step(scheduler, thread, StepTable::step_over),
            Command::StepOut { thread } => self.arm_step(scheduler, thread, StepTable::step_out),
            Command::GetCallTrace { thread, frame } => {
                match scheduler.thread(thread).and_then(|t| frame_at(t, frame)) {
                    Some((f, address)) => {
                        let (source, line) = line_for(gc, f.function, address).unwrap_or((0, 0));
                        self.send(Reply::ContextFrame { frame, source, line, function_name: function_name(gc, f.function) });
                    }
                    None => self.send(Reply::Error { message: format!("thread {thread} has no frame {frame}") }),
                }
                self.send(Reply::Done);
            }
            Command::GetSource { source } => match sources.source(source) {
                Some((name, text)) => self.send(Reply::Source { source, name: name.to_owned(), text: text.to_owned() }),
                None => self.send(Reply::Error { message: format!("no source {source}") }),
            },
            // Stubs: source-info/variable-info reply with an empty group
            // rather than guessed data.
            Command::GetSourceInfo | Command::GetVariableInfo { .. } => self.send(Reply::Done),
            Command::GetThreadInfo => {
                let entries: Vec<_> = scheduler.threads().map(|(id, t)| (id, ThreadInfoState::from(t.state))).collect();
                for (thread, state) in entries {
                    self.send(Reply::ThreadInfo { thread, state });
                }
                self.send(Reply::Done);
            }
            Command::SetBreakpoint { rid, source, line, thread, enabled } => {
                self.breakpoints.set(Breakpoint { rid, source, line, thread, enabled });
                self.send(Reply::Ack);
            }
            Command::Break { thread } => {
                self.steps.entry(thread).pending_break = true;
                self.send(Reply::Ack);
            }
            Command::End => self.send(Reply::End),
        }
    }

    fn arm_step(&mut self, scheduler: &mut gm_sched::Scheduler, thread: u32, arm: fn(&mut StepTable, u32, usize)) {
        let depth = scheduler.thread(thread).map(gm_vm::Thread::depth).unwrap_or(0);
        let was_parked = self.steps.get(thread).at_break;
        arm(&mut self.steps, thread, depth);
        if was_parked {
            scheduler.resume(thread);
        }
        self.send(Reply::Stepped { thread });
    }
}

impl DebugHook for Session {
    fn should_break(&mut self, gc: &Collector, thread_id: u32, depth: usize, address: u32, function: Handle) -> bool {
        let state = self.steps.get(thread_id);
        let loc = line_for(gc, function, address);
        let hit = state.pending_break
            || (state.step_over && depth <= state.base_depth)
            || loc.map_or(false, |(source, line)| self.breakpoints.matches(source, line, thread_id));

        if hit {
            let s = self.steps.entry(thread_id);
            s.pending_break = false;
            s.at_break = true;
            let (source, line) = loc.unwrap_or((0, 0));
            self.send(Reply::Broke { thread: thread_id, source, line });
        }
        hit
    }

    fn on_call(&mut self, thread_id: u32, _depth: usize) {
        if self.steps.get(thread_id).step_into {
            self.steps.entry(thread_id).pending_break = true;
        }
    }

    fn on_return(&mut self, thread_id: u32, depth: usize) {
        let state = self.steps.get(thread_id);
        if (state.step_out || state.step_over) && depth <= state.base_depth {
            self.steps.entry(thread_id).pending_break = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_gc::GcConfig;
    use gm_value::{ScriptFunction, Variant};
    use std::sync::{Arc, Mutex};

    struct NoSources;
    impl SourceProvider for NoSources {
        fn source(&self, _id: u32) -> Option<(&str, &str)> {
            None
        }
    }

    fn make_session() -> (Session, Arc<Mutex<Vec<Vec<u8>>>>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let outgoing = Arc::new(Mutex::new(Vec::new()));
        let incoming = Arc::new(Mutex::new(Vec::new()));
        let incoming_for_pump = incoming.clone();
        let outgoing_for_send = outgoing.clone();
        let session = Session::new(
            move || incoming_for_pump.lock().unwrap().pop(),
            move |bytes| outgoing_for_send.lock().unwrap().push(bytes),
        );
        (session, outgoing, incoming)
    }

    fn script_thread(gc: &mut Collector) -> (gm_sched::Scheduler, gm_sched::ThreadId) {
        let func = gc.alloc_function_script(ScriptFunction {
            bytecode: Arc::from(vec![4u8, 17u8]), // PUSH_NULL, RETURN
            num_params: 0,
            num_locals: 0,
            max_stack: 4,
            source_id: 0,
            is_root: true,
            debug_name: None,
            lines: Arc::from(Vec::new()),
            symbols: Arc::from(Vec::new()),
        });
        let mut sched = gm_sched::Scheduler::new();
        let id = sched.spawn(gc, func, Variant::Null, &[], 256, 4096).unwrap();
        (sched, id)
    }

    #[test]
    fn run_command_acknowledges_even_with_no_parked_threads() {
        let (mut session, outgoing, incoming) = make_session();
        let mut gc = Collector::new(GcConfig::default());
        let (mut sched, _id) = script_thread(&mut gc);
        incoming.lock().unwrap().push(crate::protocol::encode_command(&Command::Run));
        session.poll(&mut sched, &gc, &NoSources);
        let sent = outgoing.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(crate::protocol::decode_reply(&sent[0]).unwrap(), Reply::Running);
    }

    #[test]
    fn step_into_arms_pending_break_on_next_call() {
        let (mut session, _outgoing, _incoming) = make_session();
        let mut gc = Collector::new(GcConfig::default());
        let (mut sched, id) = script_thread(&mut gc);
        session.arm_step(&mut sched, id, StepTable::step_into);
        session.on_call(id, 1);
        assert!(session.steps.get(id).pending_break);
    }

    #[test]
    fn unscoped_breakpoint_triggers_should_break() {
        let (mut session, _outgoing, _incoming) = make_session();
        let mut gc = Collector::new(GcConfig::default());
        let func = gc.alloc_function_script(ScriptFunction {
            bytecode: Arc::from(vec![4u8, 17u8]),
            num_params: 0,
            num_locals: 0,
            max_stack: 4,
            source_id: 7,
            is_root: true,
            debug_name: None,
            lines: Arc::from(vec![gm_value::LineEntry { address: 0, line: 42 }]),
            symbols: Arc::from(Vec::new()),
        });
        session.breakpoints.set(Breakpoint { rid: 1, source: 7, line: 42, thread: None, enabled: true });
        assert!(session.should_break(&gc, 1, 1, 0, func));
        assert!(session.steps.get(1).at_break);
    }
}
