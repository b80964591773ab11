//! [`Machine`]: the embedding facade wiring the object heap, collector,
//! operator registry, scheduler and (optionally) a debug session into one
//! type with the surface an embedder actually calls.

use crate::call_builder::CallBuilder;
use crate::config::GmConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::library;
use gm_debug::{Session, SourceProvider};
use gm_format::{CompiledLibrary, FormatResult};
use gm_frontend::CompileError;
use gm_gc::Collector;
use gm_io::Endian;
use gm_sched::{Scheduler, Signal, StepReport, ThreadId};
use gm_value::{FunctionObject, Handle, NativeFn, Object, UserKind, Variant, VariantKey, USER_KIND_BASE};
use gm_vm::{CallFrame, JumpTable, OperatorRegistry, Thread};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Per-user-type hooks supplied at [`Machine::register_user_type`]. Operator
/// overloads are registered separately, directly on [`Machine::operators_mut`],
/// since they're already a clean `(UserKind, Op)`-keyed registry on their own.
#[derive(Default, Clone)]
pub struct UserTypeCallbacks {
    /// Looks up the handles a value of this kind refers to, so the collector
    /// can trace through host-owned data it doesn't otherwise understand.
    pub trace: Option<gm_gc::UserTracer>,
}

/// Read-only view over loaded source text, borrowing only the field it
/// needs so it can be built without taking `self` and colliding with the
/// scheduler/collector borrows `execute` also needs live.
struct SourceTable<'a> {
    sources: &'a HashMap<u32, (String, String)>,
}

impl SourceProvider for SourceTable<'_> {
    fn source(&self, id: u32) -> Option<(&str, &str)> {
        self.sources.get(&id).map(|(name, text)| (name.as_str(), text.as_str()))
    }
}

pub struct Machine {
    gc: Collector,
    scheduler: Scheduler,
    operators: OperatorRegistry,
    table: JumpTable,
    globals: Handle,
    config: GmConfig,
    debug_enabled: bool,
    debug_session: Option<Session>,
    sources: HashMap<u32, (String, String)>,
    next_source_id: u32,
    log: Vec<String>,
    next_user_kind: UserKind,
    user_tracers: Arc<Mutex<HashMap<UserKind, gm_gc::UserTracer>>>,
    current_time_ms: Arc<AtomicU64>,
    pending_signals: Arc<Mutex<Vec<Signal>>>,
}

impl Machine {
    pub fn new(config: GmConfig) -> Self {
        let mut gc = Collector::new(config.gc);
        let globals = gc.alloc_table();
        gc.add_persistent(globals);

        let user_tracers: Arc<Mutex<HashMap<UserKind, gm_gc::UserTracer>>> = Arc::new(Mutex::new(HashMap::new()));
        let dispatch = {
            let user_tracers = Arc::clone(&user_tracers);
            move |user: &gm_value::UserObject| -> Vec<Handle> {
                match user_tracers.lock().expect("user tracer map poisoned").get(&user.kind) {
                    Some(tracer) => tracer(user),
                    None => Vec::new(),
                }
            }
        };
        gc.set_user_tracer(Arc::new(dispatch));

        let mut machine = Self {
            gc,
            scheduler: Scheduler::with_dead_pool_cap(config.killed_thread_pool_size),
            operators: OperatorRegistry::new(),
            table: JumpTable::with_default_handlers(),
            globals,
            config,
            debug_enabled: false,
            debug_session: None,
            sources: HashMap::new(),
            next_source_id: 0,
            log: Vec::new(),
            next_user_kind: USER_KIND_BASE,
            user_tracers,
            current_time_ms: Arc::new(AtomicU64::new(0)),
            pending_signals: Arc::new(Mutex::new(Vec::new())),
        };
        machine.register_default_library();
        machine
    }

    fn register_default_library(&mut self) {
        let sleep = library::sleep_fn(Arc::clone(&self.current_time_ms));
        let block = library::block_fn();
        let signal = library::signal_fn(Arc::clone(&self.pending_signals));
        self.register_library(&[("sleep", sleep), ("block", block), ("signal", signal)]);
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug_enabled = enabled;
    }

    pub fn is_debug(&self) -> bool {
        self.debug_enabled
    }

    /// Attaches a remote-debug session; every subsequent `execute` polls its
    /// transport and consults it as a breakpoint hook.
    pub fn attach_debug_session(&mut self, session: Session) {
        self.debug_session = Some(session);
    }

    pub fn detach_debug_session(&mut self) -> Option<Session> {
        self.debug_session.take()
    }

    pub fn operators_mut(&mut self) -> &mut OperatorRegistry {
        &mut self.operators
    }

    /// Allocates a fresh [`UserKind`] and records its trace callback, if any,
    /// in the dispatch table installed on the collector at construction.
    pub fn register_user_type(&mut self, callbacks: UserTypeCallbacks) -> UserKind {
        let kind = self.next_user_kind;
        self.next_user_kind += 1;
        if let Some(trace) = callbacks.trace {
            self.user_tracers.lock().expect("user tracer map poisoned").insert(kind, trace);
        }
        kind
    }

    /// Registers each `(name, function)` pair as a global native function.
    pub fn register_library(&mut self, entries: &[(&str, NativeFn)]) {
        for (name, func) in entries {
            let handle = self.gc.alloc_function_native(*name, Arc::clone(func));
            self.set_global(name, Variant::Function(handle));
        }
    }

    /// Interns a string and charges it against the GC budget, for use as a
    /// table/global key or an argument value.
    pub fn intern_string(&mut self, text: &str) -> Handle {
        self.gc.intern_string(text.as_bytes())
    }

    pub fn set_global(&mut self, name: &str, value: Variant) {
        let key = self.intern_string(name);
        if let Some(h) = value.handle() {
            self.gc.write_barrier(self.globals, h);
        }
        if let Some(Object::Table(t)) = self.gc.heap_mut().get_mut(self.globals) {
            t.entries.set(VariantKey(Variant::String(key)), value);
        }
    }

    fn lookup_global(&self, name: &str) -> Option<Variant> {
        let bytes = name.as_bytes();
        let table = match self.gc.heap().get(self.globals) {
            Some(Object::Table(t)) => t,
            _ => return None,
        };
        table
            .entries
            .iter()
            .find(|(k, _)| match k.0 {
                Variant::String(h) => self.gc.heap().get(h).and_then(Object::as_string).map(|s| s.as_bytes() == bytes).unwrap_or(false),
                _ => false,
            })
            .map(|(_, v)| *v)
    }

    fn resolve_global(&self, name: &str) -> RuntimeResult<Handle> {
        match self.lookup_global(name) {
            Some(Variant::Function(h)) => Ok(h),
            Some(_) => Err(RuntimeError::NotCallable(name.to_string())),
            None => Err(RuntimeError::UnknownGlobalFunction(name.to_string())),
        }
    }

    fn resolve_member(&self, table: Handle, key: &str) -> RuntimeResult<Handle> {
        let bytes = key.as_bytes();
        let entries = match self.gc.heap().get(table) {
            Some(Object::Table(t)) => t,
            _ => return Err(RuntimeError::NotCallable(key.to_string())),
        };
        let found = entries.entries.iter().find(|(k, _)| match k.0 {
            Variant::String(h) => self.gc.heap().get(h).and_then(Object::as_string).map(|s| s.as_bytes() == bytes).unwrap_or(false),
            _ => false,
        });
        match found.map(|(_, v)| *v) {
            Some(Variant::Function(h)) => Ok(h),
            Some(_) => Err(RuntimeError::NotCallable(key.to_string())),
            None => Err(RuntimeError::UnknownGlobalFunction(key.to_string())),
        }
    }

    pub fn begin_global(&mut self, name: &str) -> CallBuilder<'_> {
        let target = self.resolve_global(name);
        CallBuilder { machine: self, target, this_value: Variant::Null, args: Vec::new() }
    }

    pub fn begin_member(&mut self, table: Handle, key: &str) -> CallBuilder<'_> {
        let target = self.resolve_member(table, key);
        CallBuilder { machine: self, target, this_value: Variant::Table(table), args: Vec::new() }
    }

    /// Spawns a thread running `function` (typically a loaded library's root
    /// function) with no arguments and a null `this`.
    pub fn spawn_root(&mut self, function: Handle) -> RuntimeResult<ThreadId> {
        self.spawn_call(function, Variant::Null, &[])
    }

    pub(crate) fn spawn_call(&mut self, callee: Handle, this_value: Variant, args: &[Variant]) -> RuntimeResult<ThreadId> {
        let id = self.scheduler.spawn(
            &self.gc,
            callee,
            this_value,
            args,
            self.config.initial_thread_stack_bytes,
            self.config.max_thread_stack_bytes,
        )?;
        Ok(id)
    }

    /// Compiles `text` with the bundled minimal frontend and encodes it as a
    /// little-endian `gml0` library.
    pub fn compile_source(&self, text: &str) -> Result<Vec<u8>, Vec<CompileError>> {
        let lib: CompiledLibrary = gm_frontend::compile(text, Endian::Little)?;
        Ok(gm_format::encode(&lib, Endian::Little))
    }

    /// Decodes and fixes up a `gml0` library, returning its root function's
    /// handle. Embedded source, if present, is kept so [`Machine::get_source`]
    /// can answer for every function this load produced.
    pub fn load_lib(&mut self, bytes: &[u8], filename: Option<&str>) -> FormatResult<Handle> {
        let decoded = gm_format::decode(bytes)?;
        let source_id = self.next_source_id;
        let loaded = gm_format::load(&decoded, &mut self.gc, source_id)?;
        if let Some(src) = &decoded.source {
            self.next_source_id += 1;
            let text = String::from_utf8_lossy(src).into_owned();
            let name = filename.unwrap_or("<unknown>").to_string();
            self.sources.insert(source_id, (name, text));
        }
        // Every function the library defines persists for the machine's
        // lifetime, not just the ones reachable from a thread stack or a
        // global at this instant.
        for function in &loaded.functions {
            self.gc.add_persistent(*function);
        }
        loaded.root.ok_or_else(|| {
            gm_format::FormatError::Malformed("library has no root-flagged function".to_string())
        })
    }

    pub fn push_null(&mut self, thread: ThreadId) -> Option<()> {
        self.thread_mut(thread)?.push(Variant::Null).ok()
    }

    pub fn push_int(&mut self, thread: ThreadId, value: i32) -> Option<()> {
        self.thread_mut(thread)?.push(Variant::Int(value)).ok()
    }

    pub fn push_float(&mut self, thread: ThreadId, value: f32) -> Option<()> {
        self.thread_mut(thread)?.push(Variant::Float(value)).ok()
    }

    pub fn push_string(&mut self, thread: ThreadId, value: &str) -> Option<()> {
        let handle = self.intern_string(value);
        self.thread_mut(thread)?.push(Variant::String(handle)).ok()
    }

    pub fn push_function(&mut self, thread: ThreadId, function: Handle) -> Option<()> {
        self.thread_mut(thread)?.push(Variant::Function(function)).ok()
    }

    pub fn push_user(&mut self, thread: ThreadId, kind: UserKind, handle: Handle) -> Option<()> {
        self.thread_mut(thread)?.push(Variant::User(kind, handle)).ok()
    }

    pub fn get_int(&self, thread: ThreadId, stack_index: usize) -> Option<i32> {
        match self.scheduler.thread(thread)?.get(stack_index).ok()? {
            Variant::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_float(&self, thread: ThreadId, stack_index: usize) -> Option<f32> {
        match self.scheduler.thread(thread)?.get(stack_index).ok()? {
            Variant::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_string(&self, thread: ThreadId, stack_index: usize) -> Option<String> {
        match self.scheduler.thread(thread)?.get(stack_index).ok()? {
            Variant::String(h) => self.gc.heap().get(h).and_then(Object::as_string).map(|s| String::from_utf8_lossy(s.as_bytes()).into_owned()),
            _ => None,
        }
    }

    pub fn get_user(&self, thread: ThreadId, stack_index: usize) -> Option<(UserKind, Arc<dyn std::any::Any + Send + Sync>)> {
        match self.scheduler.thread(thread)?.get(stack_index).ok()? {
            Variant::User(kind, h) => self.gc.heap().get(h).and_then(Object::as_user).map(|u| (kind, Arc::clone(&u.data))),
            _ => None,
        }
    }

    fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.scheduler.thread_mut(id)
    }

    /// Every handle a live thread's stack or call frames reference, so the
    /// collector can root through threads it otherwise has no view into.
    fn live_thread_roots(&self) -> Vec<Handle> {
        let mut roots = Vec::new();
        for (_, thread) in self.scheduler.threads() {
            for i in 0..thread.stack_len() {
                if let Ok(v) = thread.get(i) {
                    if let Some(h) = v.handle() {
                        roots.push(h);
                    }
                }
            }
            for frame in &thread.frames {
                roots.push(frame.function);
                if let Some(h) = frame.this_value.handle() {
                    roots.push(h);
                }
            }
        }
        roots
    }

    fn drain_signals(&mut self) {
        let pending: Vec<Signal> = std::mem::take(&mut *self.pending_signals.lock().expect("pending signal queue poisoned"));
        for key in pending {
            self.scheduler.signal(key);
        }
    }

    /// Advances the scheduler by one tick at `now_ms`, services any attached
    /// debug session, drains signals queued by the `signal` native this tick,
    /// and runs a bounded GC slice.
    pub fn execute(&mut self, now_ms: u64) -> StepReport {
        self.current_time_ms.store(now_ms, Ordering::Relaxed);

        let report = if let Some(mut session) = self.debug_session.take() {
            let sources = SourceTable { sources: &self.sources };
            session.poll(&mut self.scheduler, &self.gc, &sources);
            let report = self.scheduler.step_with_hook(
                &mut self.gc,
                self.globals,
                &self.operators,
                &self.table,
                now_ms,
                self.config.opcode_budget,
                Some(&mut session),
            );
            self.debug_session = Some(session);
            report
        } else {
            self.scheduler.step(&mut self.gc, self.globals, &self.operators, &self.table, now_ms, self.config.opcode_budget)
        };

        for (id, reason) in &report.destroyed {
            if *reason == gm_sched::DestroyReason::Exception {
                self.log.push(format!("thread {id} raised an exception"));
            }
        }

        self.drain_signals();

        let roots = self.live_thread_roots();
        self.gc.collect_slice(&roots, 64);

        report
    }

    pub fn signal(&mut self, key: Signal) -> Vec<ThreadId> {
        self.scheduler.signal(key)
    }

    pub fn kill(&mut self, thread: ThreadId) {
        self.scheduler.kill(thread);
    }

    pub fn collect_full(&mut self) {
        let roots = self.live_thread_roots();
        self.gc.collect_full(&roots);
    }

    pub fn enable_gc(&mut self, enabled: bool) {
        if enabled {
            self.gc.enable();
        } else {
            self.gc.disable();
        }
    }

    pub fn get_log(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    pub fn get_source(&self, source_id: u32) -> Option<(&str, &str)> {
        self.sources.get(&source_id).map(|(name, text)| (name.as_str(), text.as_str()))
    }

    pub fn globals(&self) -> Handle {
        self.globals
    }

    pub fn gc(&self) -> &Collector {
        &self.gc
    }

    /// The function a loaded thread is running, if it's a script function —
    /// used by callers that want a thread's debug name without reaching into
    /// `gm-vm` directly.
    pub fn thread_function_name(&self, thread: ThreadId) -> Option<String> {
        let t = self.scheduler.thread(thread)?;
        let frame: &CallFrame = t.frames.last()?;
        match self.gc.heap().get(frame.function) {
            Some(Object::Function(FunctionObject::Script(f))) => f
                .debug_name
                .and_then(|h| self.gc.heap().get(h))
                .and_then(Object::as_string)
                .and_then(|s| s.as_str().map(str::to_owned)),
            _ => None,
        }
    }
}
