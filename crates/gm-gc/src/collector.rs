//! Tri-colour incremental mark-sweep collector.
//!
//! Colour transitions are O(1) unlink/relink operations on four
//! [`IntrusiveList`]s threaded through the heap's own object headers. A cycle
//! moves through `Idle -> Mark -> Sweep -> Idle`; `collect_slice` does bounded
//! work and can be called repeatedly (e.g. once per scheduler `step`) or
//! driven to completion by `collect_full`.

use crate::config::GcConfig;
use gm_collections::IntrusiveList;
use gm_value::{Color, Handle, Heap, Object, OpCode, UserObject};
use std::sync::Arc;

/// Where the collector is in the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Marking,
    Sweeping,
}

/// Looks up the handles a user object refers to, for types the heap itself
/// doesn't understand. Registered by the embedding layer per user kind.
pub type UserTracer = Arc<dyn Fn(&UserObject) -> Vec<Handle> + Send + Sync>;

pub struct Collector {
    heap: Heap,
    config: GcConfig,

    white0: IntrusiveList<Handle>,
    white1: IntrusiveList<Handle>,
    grey: IntrusiveList<Handle>,
    black: IntrusiveList<Handle>,

    current_white: Color,
    phase: Phase,
    three_pass_pending: bool,

    allocated: usize,
    soft_limit: usize,
    hard_limit: usize,
    disabled: u32,

    persistent: Vec<Handle>,
    user_tracer: Option<UserTracer>,
}

impl Collector {
    pub fn new(config: GcConfig) -> Self {
        Self {
            heap: Heap::new(),
            soft_limit: config.initial_soft_limit(),
            hard_limit: config.initial_hard_limit,
            config,
            white0: IntrusiveList::new(),
            white1: IntrusiveList::new(),
            grey: IntrusiveList::new(),
            black: IntrusiveList::new(),
            current_white: Color::White0,
            phase: Phase::Idle,
            three_pass_pending: false,
            allocated: 0,
            disabled: 0,
            persistent: Vec::new(),
            user_tracer: None,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn soft_limit(&self) -> usize {
        self.soft_limit
    }

    pub fn hard_limit(&self) -> usize {
        self.hard_limit
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled > 0
    }

    /// Disables the collector; allocations still succeed but no slice work
    /// runs until a matching `enable`. Nests: two `disable` calls need two
    /// `enable` calls. Prefer [`crate::DisableGuard`] over calling this
    /// directly.
    pub fn disable(&mut self) {
        self.disabled += 1;
    }

    pub fn enable(&mut self) {
        self.disabled = self.disabled.saturating_sub(1);
    }

    pub fn set_user_tracer(&mut self, tracer: UserTracer) {
        self.user_tracer = Some(tracer);
    }

    /// Marks `handle` as a GC root that survives every cycle (e.g. the
    /// globals table). Persistent objects are re-rooted at the start of
    /// every mark phase.
    pub fn add_persistent(&mut self, handle: Handle) {
        if let Some(header) = self.heap.header_mut(handle) {
            header.persistent = true;
        }
        self.persistent.push(handle);
    }

    fn list_mut(&mut self, color: Color) -> &mut IntrusiveList<Handle> {
        match color {
            Color::White0 => &mut self.white0,
            Color::White1 => &mut self.white1,
            Color::Grey => &mut self.grey,
            Color::Black => &mut self.black,
        }
    }

    fn other_white(&self) -> Color {
        match self.current_white {
            Color::White0 => Color::White1,
            Color::White1 => Color::White0,
            other => other,
        }
    }

    /// Moves `handle` from whichever list its header says it's on to `to`'s
    /// list, updating the header to match.
    fn recolor(&mut self, handle: Handle, to: Color) {
        let from = match self.heap.color(handle) {
            Some(c) => c,
            None => return,
        };
        if from == to {
            return;
        }
        macro_rules! do_move {
            ($from_field:ident, $to_field:ident) => {
                self.$from_field.move_to(&mut self.$to_field, &mut self.heap, handle)
            };
        }
        match (from, to) {
            (Color::White0, Color::White1) => do_move!(white0, white1),
            (Color::White0, Color::Grey) => do_move!(white0, grey),
            (Color::White0, Color::Black) => do_move!(white0, black),
            (Color::White1, Color::White0) => do_move!(white1, white0),
            (Color::White1, Color::Grey) => do_move!(white1, grey),
            (Color::White1, Color::Black) => do_move!(white1, black),
            (Color::Grey, Color::White0) => do_move!(grey, white0),
            (Color::Grey, Color::White1) => do_move!(grey, white1),
            (Color::Grey, Color::Black) => do_move!(grey, black),
            (Color::Black, Color::White0) => do_move!(black, white0),
            (Color::Black, Color::White1) => do_move!(black, white1),
            (Color::Black, Color::Grey) => do_move!(black, grey),
            _ => {}
        }
        self.heap.set_color(handle, to);
    }

    /// Allocates via `alloc` (which must return a handle from `self.heap`)
    /// tagged with the current white, lists it, and charges its size.
    fn track_new(&mut self, handle: Handle) {
        let color = self.current_white;
        self.list_mut(color).push_back(&mut self.heap, handle);
        self.allocated += self.heap.approx_size(handle);
    }

    pub fn alloc_string(&mut self, bytes: impl Into<Arc<[u8]>>) -> Handle {
        let handle = self.heap.alloc_string(bytes, self.current_white);
        self.track_new(handle);
        self.after_alloc();
        handle
    }

    /// `Heap::intern_string` already dedupes by bytes; only a freshly
    /// created handle needs listing on a colour and charging against the
    /// budget.
    pub fn intern_string(&mut self, bytes: &[u8]) -> Handle {
        let before = self.heap.len();
        let handle = self.heap.intern_string(bytes, self.current_white);
        if self.heap.len() != before {
            self.track_new(handle);
            self.after_alloc();
        }
        handle
    }

    pub fn alloc_table(&mut self) -> Handle {
        let handle = self.heap.alloc_table(self.current_white);
        self.track_new(handle);
        self.after_alloc();
        handle
    }

    pub fn alloc_function_script(&mut self, func: gm_value::ScriptFunction) -> Handle {
        let handle = self.heap.alloc_function_script(func, self.current_white);
        self.track_new(handle);
        self.after_alloc();
        handle
    }

    pub fn alloc_function_native(&mut self, name: impl Into<Arc<str>>, func: gm_value::NativeFn) -> Handle {
        let handle = self.heap.alloc_function_native(name, func, self.current_white);
        self.track_new(handle);
        self.after_alloc();
        handle
    }

    pub fn alloc_user(&mut self, kind: gm_value::UserKind, data: Arc<dyn std::any::Any + Send + Sync>) -> Handle {
        let handle = self.heap.alloc_user(kind, data, self.current_white);
        self.track_new(handle);
        self.after_alloc();
        handle
    }

    /// Crosses the soft limit: request a slice. Crosses the hard limit: force
    /// a full collection before returning, same as the budgeting rule.
    fn after_alloc(&mut self) {
        if self.disabled > 0 {
            return;
        }
        if self.allocated >= self.hard_limit {
            self.collect_full(&[]);
        }
    }

    pub fn wants_slice(&self) -> bool {
        self.disabled == 0 && self.allocated >= self.soft_limit
    }

    /// The handles an object directly references, used to grey its children
    /// during mark.
    fn children_of(&self, object: &Object) -> Vec<Handle> {
        match object {
            Object::String(_) => Vec::new(),
            Object::Table(t) => t
                .entries
                .iter()
                .flat_map(|(k, v)| {
                    let mut out = Vec::new();
                    if let Some(h) = k.0.handle() {
                        out.push(h);
                    }
                    if let Some(h) = v.handle() {
                        out.push(h);
                    }
                    out
                })
                .collect(),
            Object::Function(gm_value::FunctionObject::Script(f)) => {
                let mut out: Vec<Handle> = f.symbols.to_vec();
                if let Some(name) = f.debug_name {
                    out.push(name);
                }
                out.extend(bytecode_handles(&f.bytecode));
                out
            }
            Object::Function(gm_value::FunctionObject::Native(_)) => Vec::new(),
            Object::User(user) => self
                .user_tracer
                .as_ref()
                .map(|tracer| tracer(user))
                .unwrap_or_default(),
        }
    }

    /// Begins a new cycle: flips the current white, turns the previous white
    /// into this cycle's sweep candidates, and greys every root.
    fn begin_cycle(&mut self, extra_roots: &[Handle]) {
        self.current_white = self.other_white();
        self.phase = Phase::Marking;
        self.three_pass_pending = self.config.three_pass_gc;

        let persistent = self.persistent.clone();
        for root in persistent.into_iter().chain(extra_roots.iter().copied()) {
            self.recolor(root, Color::Grey);
        }
    }

    /// Pops one grey object, blackens it, and greys its children. Returns
    /// `false` once the grey set is empty (mark phase complete for this
    /// pass).
    fn mark_one(&mut self) -> bool {
        let Some(handle) = self.grey.head() else {
            return false;
        };
        self.recolor(handle, Color::Black);
        let children = self
            .heap
            .get(handle)
            .map(|obj| self.children_of(obj))
            .unwrap_or_default();
        for child in children {
            if self.heap.color(child) == Some(self.other_white()) {
                self.recolor(child, Color::Grey);
            }
        }
        true
    }

    /// Frees one object from the sweep list. Returns `false` once the sweep
    /// list is empty (cycle complete).
    fn sweep_one(&mut self) -> bool {
        let sweep_color = self.other_white();
        let Some(handle) = self.list_mut(sweep_color).head() else {
            self.finish_cycle();
            return false;
        };
        let is_persistent = self.heap.header(handle).map(|h| h.persistent).unwrap_or(false);
        if is_persistent {
            // A persistent object that never got marked indicates a root
            // that was removed from the persistent set; drop the flag and
            // recolor it to survive into next cycle instead of freeing it
            // out from under whoever still holds the handle.
            if let Some(header) = self.heap.header_mut(handle) {
                header.persistent = false;
            }
            self.persistent.retain(|h| *h != handle);
            self.recolor(handle, self.current_white);
        } else {
            let size = self.heap.approx_size(handle);
            self.list_mut(sweep_color).remove(&mut self.heap, handle);
            self.heap.free(handle);
            self.allocated = self.allocated.saturating_sub(size);
        }
        true
    }

    fn finish_cycle(&mut self) {
        // Every survivor is currently Black; flip them to the new current
        // white so the next cycle starts from a uniform colour.
        let survivors: Vec<Handle> = self.black.iter(&self.heap).collect();
        for handle in survivors {
            self.recolor(handle, self.current_white);
        }
        self.phase = Phase::Idle;
        self.soft_limit = (self.allocated as f32 * self.config.auto_mem_multiply) as usize;
        self.hard_limit = self.soft_limit * 10 / 9;
    }

    /// Runs a bounded amount of collector work. `work_budget` is the number
    /// of mark/sweep steps to perform; a step visits one object.
    pub fn collect_slice(&mut self, extra_roots: &[Handle], work_budget: usize) {
        if self.disabled > 0 {
            return;
        }
        if self.phase == Phase::Idle {
            if !self.wants_slice() {
                return;
            }
            self.begin_cycle(extra_roots);
        }

        let mut remaining = work_budget;
        while remaining > 0 {
            match self.phase {
                Phase::Marking => {
                    if !self.mark_one() {
                        if self.three_pass_pending {
                            self.three_pass_pending = false;
                            let persistent = self.persistent.clone();
                            for root in persistent {
                                self.recolor(root, Color::Grey);
                            }
                        } else {
                            self.phase = Phase::Sweeping;
                        }
                    }
                }
                Phase::Sweeping => {
                    if !self.sweep_one() {
                        break;
                    }
                }
                Phase::Idle => break,
            }
            remaining -= 1;
        }
    }

    /// Drives the current (or a freshly started) cycle to completion
    /// synchronously. Used when the hard limit is crossed.
    pub fn collect_full(&mut self, extra_roots: &[Handle]) {
        if self.disabled > 0 {
            return;
        }
        if self.phase == Phase::Idle {
            self.begin_cycle(extra_roots);
        }
        while self.phase != Phase::Idle {
            self.collect_slice(extra_roots, 256);
        }
    }

    /// The incremental-update write barrier: called whenever a mutator
    /// stores `referent` into `holder`. If `holder` is already black and
    /// `referent` is white, `holder` is re-greyed so its new child still
    /// gets traced this cycle.
    pub fn write_barrier(&mut self, holder: Handle, referent: Handle) {
        if self.heap.color(holder) == Some(Color::Black) && self.heap.color(referent) == Some(self.other_white()) {
            self.recolor(holder, Color::Grey);
        }
    }
}

/// Walks a script function's bytecode instruction by instruction and collects
/// the handles embedded in string and `PUSH_FN` operands. These were raw
/// string-table/function-table offsets before `gm_format::fixup` rewrote them
/// into live heap handle indices at load time (always little-endian, per
/// `fix_up_bytecode`), so decoding here mirrors that same per-opcode walk.
fn bytecode_handles(bytecode: &[u8]) -> Vec<Handle> {
    let mut out = Vec::new();
    let mut ip = 0usize;
    while ip < bytecode.len() {
        let Some(op) = OpCode::from_u8(bytecode[ip]) else { break };
        ip += 1;
        let size = op.operand_size();
        if size == 0 {
            continue;
        }
        if ip + size > bytecode.len() {
            break;
        }
        if op.operand_is_handle() {
            let raw = u32::from_le_bytes(bytecode[ip..ip + 4].try_into().unwrap());
            out.push(Handle::from_raw(raw));
        }
        ip += size;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> GcConfig {
        GcConfig {
            initial_hard_limit: usize::MAX,
            auto_mem_multiply: 2.5,
            three_pass_gc: false,
        }
    }

    #[test]
    fn unreachable_object_is_collected() {
        let mut gc = Collector::new(tiny_config());
        let orphan = gc.alloc_table();
        assert!(gc.heap().contains(orphan));

        gc.collect_full(&[]);

        assert!(!gc.heap().contains(orphan));
    }

    #[test]
    fn rooted_object_survives_a_cycle() {
        let mut gc = Collector::new(tiny_config());
        let root = gc.alloc_table();
        gc.add_persistent(root);

        gc.collect_full(&[]);

        assert!(gc.heap().contains(root));
    }

    #[test]
    fn reachable_through_root_table_survives() {
        let mut gc = Collector::new(tiny_config());
        let root = gc.alloc_table();
        gc.add_persistent(root);
        let child = gc.alloc_string(b"hi".to_vec());

        gc.heap_mut()
            .get_mut(root)
            .unwrap()
            .as_table_mut()
            .unwrap()
            .entries
            .set(
                gm_value::VariantKey(gm_value::Variant::Int(0)),
                gm_value::Variant::String(child),
            );

        gc.collect_full(&[]);

        assert!(gc.heap().contains(root));
        assert!(gc.heap().contains(child));
    }

    #[test]
    fn allocations_made_mid_cycle_are_not_swept() {
        let mut gc = Collector::new(tiny_config());
        let root = gc.alloc_table();
        gc.add_persistent(root);

        gc.begin_cycle(&[]); // root is now grey
        let fresh = gc.alloc_table(); // gets the new current_white
        gc.collect_full(&[]);

        assert!(gc.heap().contains(fresh));
    }

    #[test]
    fn write_barrier_saves_a_newly_linked_object_from_sweep() {
        let mut gc = Collector::new(tiny_config());
        let root = gc.alloc_table();
        gc.add_persistent(root);
        // Allocated before the cycle starts, so it becomes this cycle's
        // other_white: unreferenced, it would be swept as garbage.
        let orphan = gc.alloc_table();

        gc.begin_cycle(&[]); // roots root -> Grey
        assert!(gc.mark_one()); // root -> Black, no children yet
        assert!(!gc.mark_one()); // grey empty, mark phase done

        // Mutator links orphan into the now-black root.
        gc.write_barrier(root, orphan);
        gc.heap_mut()
            .get_mut(root)
            .unwrap()
            .as_table_mut()
            .unwrap()
            .entries
            .set(gm_value::VariantKey(gm_value::Variant::Int(0)), gm_value::Variant::Table(orphan));

        // Root was re-greyed by the barrier, so it gets retraced, which
        // greys (and then blackens) orphan before sweep ever sees it.
        while gc.mark_one() {}
        gc.phase = Phase::Sweeping;
        while gc.sweep_one() {}

        assert!(gc.heap().contains(orphan));
    }

    #[test]
    fn without_the_barrier_a_newly_linked_object_would_be_swept() {
        let mut gc = Collector::new(tiny_config());
        let root = gc.alloc_table();
        gc.add_persistent(root);
        let orphan = gc.alloc_table();

        gc.begin_cycle(&[]);
        assert!(gc.mark_one());
        assert!(!gc.mark_one());

        // Link orphan in without going through write_barrier.
        gc.heap_mut()
            .get_mut(root)
            .unwrap()
            .as_table_mut()
            .unwrap()
            .entries
            .set(gm_value::VariantKey(gm_value::Variant::Int(0)), gm_value::Variant::Table(orphan));

        gc.phase = Phase::Sweeping;
        while gc.sweep_one() {}

        assert!(!gc.heap().contains(orphan));
    }

    #[test]
    fn script_function_keeps_its_bytecode_string_and_callee_alive() {
        let mut gc = Collector::new(tiny_config());
        let root = gc.alloc_table();
        gc.add_persistent(root);

        let message = gc.alloc_string(b"msg".to_vec());
        let callee = gc.alloc_function_script(gm_value::ScriptFunction {
            bytecode: Arc::from([]),
            num_params: 0,
            num_locals: 0,
            max_stack: 0,
            source_id: 0,
            is_root: false,
            debug_name: None,
            lines: Arc::from([]),
            symbols: Arc::from([]),
        });

        let mut bytecode = Vec::new();
        bytecode.push(OpCode::PushStr as u8);
        bytecode.extend_from_slice(&message.index().to_le_bytes());
        bytecode.push(OpCode::PushFn as u8);
        bytecode.extend_from_slice(&callee.index().to_le_bytes());
        bytecode.push(OpCode::Call as u8);
        bytecode.extend_from_slice(&1u32.to_le_bytes());

        let caller = gc.alloc_function_script(gm_value::ScriptFunction {
            bytecode: Arc::from(bytecode),
            num_params: 0,
            num_locals: 0,
            max_stack: 0,
            source_id: 0,
            is_root: true,
            debug_name: None,
            lines: Arc::from([]),
            symbols: Arc::from([]),
        });

        gc.heap_mut()
            .get_mut(root)
            .unwrap()
            .as_table_mut()
            .unwrap()
            .entries
            .set(gm_value::VariantKey(gm_value::Variant::Int(0)), gm_value::Variant::Function(caller));

        gc.collect_full(&[]);

        assert!(gc.heap().contains(caller));
        assert!(gc.heap().contains(message));
        assert!(gc.heap().contains(callee));
    }
}
