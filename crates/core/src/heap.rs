//! The mark-sweep collector (§4.1).
//!
//! Values live in a flat, indexed arena rather than individually
//! `malloc`'d nodes linked into a chain — the same lesson the teacher's
//! `tagged_stack`/`pool` modules draw ("contiguous array instead of
//! linked-list nodes"). Sweep is just a scan over occupied, tracked slots;
//! there is no explicit intrusive chain to maintain.

use crate::handle::Handle;
use crate::object::{Flags, NullKind, Object, ObjectData, SentinelKind};
use crate::operation::{CollOp, ConditionalLink, ExpressionList, Literal, Operation};
use crate::stack::Stack;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// The handle's generation doesn't match the slot's current
    /// generation — it refers to a slot that has since been reclaimed and
    /// reused.
    Stale(Handle),
    DoubleTrack(Handle),
}

impl std::fmt::Display for HeapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeapError::Stale(h) => write!(f, "stale handle: {h:?}"),
            HeapError::DoubleTrack(h) => write!(f, "object already tracked: {h:?}"),
        }
    }
}

impl std::error::Error for HeapError {}

type Result<T> = std::result::Result<T, HeapError>;

enum SlotState {
    Occupied(ObjectData, Flags),
    Free,
}

struct Slot {
    generation: u32,
    state: SlotState,
}

/// The value arena plus the small set of shared, permanently-pinned
/// singletons the parser and evaluator reuse (§3's "literal numeric values
/// in -1024..1024 are shared pinned singletons").
pub struct Heap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live_tracked: usize,
    pub gc_threshold: usize,
    pub gc_disabled: bool,
    small_ints: HashMap<i64, Object>,
    nulls: HashMap<NullKindKey, Object>,
    sentinels: HashMap<SentinelKind, Object>,
    symbols: HashMap<String, Object>,
    true_obj: Object,
    false_obj: Object,
}

// `NullKind` doesn't derive Hash; key on its discriminant name instead.
type NullKindKey = &'static str;

fn null_kind_key(kind: NullKind) -> NullKindKey {
    match kind {
        NullKind::Int => "int",
        NullKind::Float => "float",
        NullKind::Bool => "bool",
        NullKind::Char => "char",
        NullKind::String => "string",
        NullKind::Pair => "pair",
        NullKind::Array => "array",
        NullKind::MapOrSet => "map_or_set",
        NullKind::Function => "function",
        NullKind::Pointer => "pointer",
    }
}

impl Heap {
    pub fn new() -> Self {
        let mut heap = Heap {
            slots: Vec::new(),
            free_list: Vec::new(),
            live_tracked: 0,
            gc_threshold: 4096,
            gc_disabled: false,
            small_ints: HashMap::new(),
            nulls: HashMap::new(),
            sentinels: HashMap::new(),
            symbols: HashMap::new(),
            true_obj: Object(Handle::new(0, 0)),
            false_obj: Object(Handle::new(0, 0)),
        };
        heap.true_obj = heap.alloc_pinned(ObjectData::Bool(true));
        heap.false_obj = heap.alloc_pinned(ObjectData::Bool(false));
        for kind in [
            NullKind::Int,
            NullKind::Float,
            NullKind::Bool,
            NullKind::Char,
            NullKind::String,
            NullKind::Pair,
            NullKind::Array,
            NullKind::MapOrSet,
            NullKind::Function,
            NullKind::Pointer,
        ] {
            let obj = heap.alloc_pinned(ObjectData::Null(kind));
            heap.nulls.insert(null_kind_key(kind), obj);
        }
        for kind in [
            SentinelKind::ExitScope,
            SentinelKind::Repeat,
            SentinelKind::RepeatIfTrue,
            SentinelKind::RepeatIfFalse,
            SentinelKind::TailcallRequest,
            SentinelKind::ExitRequest,
            SentinelKind::RaiseRequest,
            SentinelKind::ErrorLabel,
        ] {
            // Each sentinel is allocated individually even though their
            // payloads are identical, so that repeat/repeat-if-true/
            // repeat-if-false never accidentally coalesce into one
            // object (§9's open question).
            let obj = heap.alloc_pinned(ObjectData::Sentinel(kind));
            heap.sentinels.insert(kind, obj);
        }
        for n in -1024i64..=1024 {
            let obj = heap.alloc_pinned(ObjectData::Int(rug::Integer::from(n)));
            heap.small_ints.insert(n, obj);
        }
        heap
    }

    fn alloc_slot(&mut self, data: ObjectData, flags: Flags) -> Object {
        let data_is_tracked = flags.tracked;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.state = SlotState::Occupied(data, flags);
            if data_is_tracked {
                self.live_tracked += 1;
            }
            Object(Handle::new(index, slot.generation))
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                state: SlotState::Occupied(data, flags),
            });
            if data_is_tracked {
                self.live_tracked += 1;
            }
            Object(Handle::new(index, 0))
        }
    }

    /// Allocate a pinned, untracked singleton (never swept).
    fn alloc_pinned(&mut self, data: ObjectData) -> Object {
        let mut flags = Flags::default();
        flags.pinned = true;
        self.alloc_slot(data, flags)
    }

    /// Construction always yields a pinned (collector-immune) value (§4.1);
    /// callers that want GC participation must call [`Heap::track`].
    pub fn alloc(&mut self, data: ObjectData) -> Object {
        let mut flags = Flags::default();
        flags.pinned = true;
        self.alloc_slot(data, flags)
    }

    /// Transition a value from pinned-on-construction to tracked, linking
    /// it into the sweepable population. A value must be tracked exactly
    /// once.
    pub fn track(&mut self, obj: Object) -> Result<()> {
        let slot = self.slot_mut(obj.0)?;
        match slot {
            SlotState::Occupied(_, flags) => {
                if flags.tracked {
                    return Err(HeapError::DoubleTrack(obj.0));
                }
                flags.tracked = true;
                flags.pinned = false;
                self.live_tracked += 1;
                Ok(())
            }
            SlotState::Free => Err(HeapError::Stale(obj.0)),
        }
    }

    pub fn pin(&mut self, obj: Object) -> Result<()> {
        self.flags_mut(obj)?.pinned = true;
        Ok(())
    }

    pub fn unpin(&mut self, obj: Object) -> Result<()> {
        self.flags_mut(obj)?.pinned = false;
        Ok(())
    }

    pub fn is_pinned(&self, obj: Object) -> bool {
        self.flags(obj).map(|f| f.pinned).unwrap_or(false)
    }

    pub fn live_tracked(&self) -> usize {
        self.live_tracked
    }

    fn slot(&self, handle: Handle) -> Result<&SlotState> {
        let slot = self
            .slots
            .get(handle.index())
            .ok_or(HeapError::Stale(handle))?;
        if slot.generation != handle.generation {
            return Err(HeapError::Stale(handle));
        }
        Ok(&slot.state)
    }

    fn slot_mut(&mut self, handle: Handle) -> Result<&mut SlotState> {
        let gen_matches = self
            .slots
            .get(handle.index())
            .map(|s| s.generation == handle.generation)
            .unwrap_or(false);
        if !gen_matches {
            return Err(HeapError::Stale(handle));
        }
        Ok(&mut self.slots[handle.index()].state)
    }

    pub fn get(&self, obj: Object) -> Result<&ObjectData> {
        match self.slot(obj.0)? {
            SlotState::Occupied(data, _) => Ok(data),
            SlotState::Free => Err(HeapError::Stale(obj.0)),
        }
    }

    pub fn get_mut(&mut self, obj: Object) -> Result<&mut ObjectData> {
        match self.slot_mut(obj.0)? {
            SlotState::Occupied(data, _) => Ok(data),
            SlotState::Free => Err(HeapError::Stale(obj.0)),
        }
    }

    pub fn flags(&self, obj: Object) -> Result<&Flags> {
        match self.slot(obj.0)? {
            SlotState::Occupied(_, flags) => Ok(flags),
            SlotState::Free => Err(HeapError::Stale(obj.0)),
        }
    }

    pub fn flags_mut(&mut self, obj: Object) -> Result<&mut Flags> {
        match self.slot_mut(obj.0)? {
            SlotState::Occupied(_, flags) => Ok(flags),
            SlotState::Free => Err(HeapError::Stale(obj.0)),
        }
    }

    // --- singletons ---

    pub fn true_value(&self) -> Object {
        self.true_obj
    }

    pub fn false_value(&self) -> Object {
        self.false_obj
    }

    pub fn bool_value(&self, b: bool) -> Object {
        if b { self.true_obj } else { self.false_obj }
    }

    pub fn null_value(&self, kind: NullKind) -> Object {
        self.nulls[null_kind_key(kind)]
    }

    pub fn sentinel(&self, kind: SentinelKind) -> Object {
        self.sentinels[&kind]
    }

    /// Construct (or reuse the shared singleton for) an integer literal.
    /// Values in -1024..1024 always resolve to the same `Object` (§3, §8).
    pub fn make_int(&mut self, value: rug::Integer) -> Object {
        if let Some(small) = value.to_i64() {
            if (-1024..=1024).contains(&small) {
                return self.small_ints[&small];
            }
        }
        self.alloc(ObjectData::Int(value))
    }

    pub fn intern_symbol(&mut self, name: &str) -> Object {
        if let Some(obj) = self.symbols.get(name) {
            return *obj;
        }
        let obj = self.alloc_pinned(ObjectData::Symbol(name.to_string()));
        self.symbols.insert(name.to_string(), obj);
        obj
    }

    // --- mark / sweep ---

    /// Run a full mark-sweep cycle rooted at `root` plus every live stack
    /// in `stacks` (the active stack-of-stacks for every live VM sharing
    /// this heap).
    pub fn collect(&mut self, root: Object, stacks: &[&Stack]) {
        if self.gc_disabled {
            return;
        }
        let before = self.live_tracked;
        self.mark(root);
        for stack in stacks {
            for value in stack.iter() {
                self.mark(value);
            }
        }
        let reclaimed = self.sweep();
        trace!(before, reclaimed, after = self.live_tracked, "gc cycle");
    }

    fn mark(&mut self, obj: Object) {
        let Ok(flags) = self.flags(obj) else {
            return;
        };
        // Visiting a pinned or already-reachable value terminates the
        // branch (§4.1).
        if flags.pinned || flags.reachable {
            return;
        }
        if let Ok(flags) = self.flags_mut(obj) {
            flags.reachable = true;
        }
        self.mark_children(obj);
    }

    fn mark_children(&mut self, obj: Object) {
        // Clone out anything we need to recurse into up front so we don't
        // hold a borrow of `self` across the recursive `mark` calls.
        enum Children {
            None,
            One(Object),
            Two(Object, Object),
            Many(Vec<Object>),
            Function {
                creator: Option<Object>,
                args: Vec<Object>,
                locals: Vec<Object>,
                body_refs: Vec<Object>,
                own_stack: Option<Vec<Object>>,
            },
        }

        let children = match self.get(obj) {
            Ok(ObjectData::Pair(a, b)) => Children::Two(*a, *b),
            Ok(ObjectData::Array(items)) => Children::Many(items.clone()),
            Ok(ObjectData::UnorderedMap(entries)) => {
                let mut refs = Vec::with_capacity(entries.len() * 2);
                for (k, v) in entries {
                    refs.push(*k);
                    refs.push(*v);
                }
                Children::Many(refs)
            }
            Ok(ObjectData::UnorderedSet(items)) => Children::Many(items.clone()),
            Ok(ObjectData::Projection(p)) => Children::One(p.target),
            Ok(ObjectData::Function(f)) => {
                let mut body_refs = Vec::new();
                mark_expr_list_refs(&f.body, &mut body_refs);
                Children::Function {
                    creator: f.creator,
                    args: f.args.clone(),
                    locals: f.locals.clone(),
                    body_refs,
                    own_stack: f.own_stack_value.as_ref().map(|s| s.iter().collect()),
                }
            }
            _ => Children::None,
        };

        match children {
            Children::None => {}
            Children::One(a) => self.mark(a),
            Children::Two(a, b) => {
                self.mark(a);
                self.mark(b);
            }
            Children::Many(items) => {
                for item in items {
                    self.mark(item);
                }
            }
            Children::Function {
                creator,
                args,
                locals,
                body_refs,
                own_stack,
            } => {
                if let Some(c) = creator {
                    self.mark(c);
                }
                for a in args {
                    self.mark(a);
                }
                for l in locals {
                    self.mark(l);
                }
                for r in body_refs {
                    self.mark(r);
                }
                if let Some(values) = own_stack {
                    for v in values {
                        self.mark(v);
                    }
                }
            }
        }
    }

    fn sweep(&mut self) -> usize {
        let mut reclaimed = 0;
        for index in 0..self.slots.len() {
            let should_reclaim = match &mut self.slots[index].state {
                SlotState::Occupied(_, flags) if flags.tracked => {
                    if flags.reachable {
                        flags.reachable = false;
                        false
                    } else if flags.pinned {
                        // tracked-and-pinned is the transient invocation
                        // case (§3); leave it alone.
                        false
                    } else {
                        true
                    }
                }
                _ => false,
            };
            if should_reclaim {
                self.slots[index].state = SlotState::Free;
                self.slots[index].generation = self.slots[index].generation.wrapping_add(1);
                self.free_list.push(index as u32);
                self.live_tracked -= 1;
                reclaimed += 1;
            }
        }
        reclaimed
    }

    pub fn should_collect(&self) -> bool {
        !self.gc_disabled && self.live_tracked >= self.gc_threshold
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Stack;

    /// An array rooted only by the GC root is kept; one no longer reachable
    /// from anywhere is reclaimed on the next `collect` (§4.1, §8's "GC
    /// reclaims unreachable tracked values" property).
    #[test]
    fn collect_reclaims_only_unreachable_tracked_values() {
        let mut heap = Heap::new();
        let root = heap.alloc(ObjectData::Array(vec![]));
        heap.track(root).unwrap();

        let kept = heap.alloc(ObjectData::Int(rug::Integer::from(99)));
        heap.track(kept).unwrap();
        match heap.get_mut(root).unwrap() {
            ObjectData::Array(items) => items.push(kept),
            _ => unreachable!(),
        }

        let garbage = heap.alloc(ObjectData::Int(rug::Integer::from(7)));
        heap.track(garbage).unwrap();

        let before = heap.live_tracked();
        heap.collect(root, &[]);
        let after = heap.live_tracked();

        assert_eq!(before - after, 1, "exactly the unreachable value should be reclaimed");
        assert!(heap.get(kept).is_ok(), "rooted value must survive collection");
        assert!(heap.get(garbage).is_err(), "unreachable value must be swept");
    }

    /// A value reachable only through a live stack (not the root) survives.
    #[test]
    fn collect_marks_through_live_stacks() {
        let mut heap = Heap::new();
        let root = heap.alloc(ObjectData::Null(NullKind::Pointer));

        let on_stack = heap.alloc(ObjectData::Int(rug::Integer::from(42)));
        heap.track(on_stack).unwrap();
        let mut stack = Stack::default();
        stack.push(on_stack);

        heap.collect(root, &[&stack]);
        assert!(heap.get(on_stack).is_ok());
    }

    #[test]
    fn gc_disabled_skips_sweep_entirely() {
        let mut heap = Heap::new();
        let root = heap.alloc(ObjectData::Null(NullKind::Pointer));
        let garbage = heap.alloc(ObjectData::Int(rug::Integer::from(1)));
        heap.track(garbage).unwrap();
        heap.gc_disabled = true;

        heap.collect(root, &[]);
        assert!(heap.get(garbage).is_ok(), "collect must no-op while disabled");
    }
}

/// Collect every `Object` reference embedded directly in an expression
/// list's opcode tree (resolved `push define`s, nested function literals'
/// own embedded references, foreach bodies, conditional branches, ...).
fn mark_expr_list_refs(list: &ExpressionList, out: &mut Vec<Object>) {
    for op in &list.ops {
        mark_operation_refs(op, out);
    }
}

fn mark_operation_refs(op: &Operation, out: &mut Vec<Object>) {
    match op {
        Operation::Push(_, literal) => mark_literal_refs(literal, out),
        Operation::Define(_, _, literal) => mark_literal_refs(literal, out),
        Operation::Coll(CollOp::Foreach(body)) => mark_expr_list_refs(body, out),
        Operation::If(links) => {
            for ConditionalLink { guard, body } in links {
                if let Some(guard) = guard {
                    mark_expr_list_refs(guard, out);
                }
                mark_expr_list_refs(body, out);
            }
        }
        Operation::Dump(Some(inner)) => mark_operation_refs(inner, out),
        _ => {}
    }
}

fn mark_literal_refs(literal: &Literal, out: &mut Vec<Object>) {
    match literal {
        Literal::Define(obj) => out.push(*obj),
        Literal::Function(func_lit) => mark_expr_list_refs(&func_lit.body, out),
        _ => {}
    }
}
