//! The tree-walking evaluator: a frame stack addressed by the symbol-table
//! builder's own tag offsets, a propagator cache consulted before each
//! dispatch, and the central `eval` match over every unit/clause
//! [`crate::node::Attribute`] the parser can produce.

pub mod assign;
pub mod call;
pub mod control;
pub mod coerce_rt;
pub mod formula;
pub mod jump;
pub mod slice;

use std::time::{Duration, Instant};

use fnv::FnvHashMap;

use crate::gc::{colour, compact, Heap};
use crate::moid::{ModeTable, StandardKind};
use crate::node::{Attribute, NodeArena, NodeId, Propagator};
use crate::options::Options;
use crate::symtab::{SymbolTables, TagId};
use crate::value::{A68Ref, FrameId, Location, ProcValue, Scope, StackValue};

use jump::{Eval, RuntimeError, Unwind};

/// One activation record. `slots` is addressed by the `offset` the
/// symbol-table builder assigned each tag at parse time; this
/// implementation has no byte-precise frame memory, so "offset" is simply
/// that tag's index into `slots` rather than a byte count, and `declare`
/// is the single place that allocates one.
#[derive(Debug)]
pub struct Frame {
    pub static_link: Option<FrameId>,
    pub dynamic_link: Option<FrameId>,
    pub scope: Scope,
    pub node: NodeId,
    slots: Vec<StackValue>,
}

impl Frame {
    fn new(node: NodeId, scope: Scope, static_link: Option<FrameId>, dynamic_link: Option<FrameId>) -> Self {
        Frame { static_link, dynamic_link, scope, node, slots: Vec::new() }
    }

    /// Reserves a new slot and returns its offset.
    fn declare(&mut self, value: StackValue) -> usize {
        self.slots.push(value);
        self.slots.len() - 1
    }
}

/// Holds every piece of state one evaluation run threads through: the tree
/// and mode table it interprets (read-only once parsing finished), the
/// symbol table (read-only, except for `used`/`youngest_environ` already
/// settled by the parser), the live frame stack, and the heap.
pub struct Interpreter<'a> {
    pub(crate) arena: &'a NodeArena,
    pub(crate) modes: &'a ModeTable,
    pub(crate) symtab: &'a SymbolTables,
    pub(crate) opts: &'a Options,
    pub(crate) heap: Heap,
    pub(crate) frames: Vec<Frame>,
    pub(crate) next_scope: u32,
    deadline: Option<Instant>,
    /// Tag -> (frame, offset) for every identifier currently in scope,
    /// rebuilt incrementally as frames push/pop (a direct map rather than a
    /// per-frame linear scan up `static_link`, since tags are already
    /// globally unique integers).
    bindings: FnvHashMap<TagId, (FrameId, usize)>,
}

impl<'a> Interpreter<'a> {
    pub fn new(arena: &'a NodeArena, modes: &'a ModeTable, symtab: &'a SymbolTables, opts: &'a Options) -> Self {
        let deadline = if opts.time_limit > 0 {
            Some(Instant::now() + Duration::from_secs(opts.time_limit))
        } else {
            None
        };
        Interpreter {
            arena,
            modes,
            symtab,
            opts,
            heap: Heap::new(opts.heap_size.max(1)),
            frames: Vec::new(),
            next_scope: 1,
            deadline,
            bindings: FnvHashMap::default(),
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    fn current_frame_id(&self) -> FrameId {
        FrameId((self.frames.len() - 1) as u32)
    }

    fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id.0 as usize]
    }

    fn frame_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id.0 as usize]
    }

    /// Opens a new frame whose static link is the nearest enclosing frame
    /// lexically containing `node` (the caller picks it; `None` at program
    /// top level), pushes it, and returns its id. Fails with a
    /// `StackOverflow` runtime error once the frame count exceeds the
    /// configured limit.
    pub(crate) fn push_frame(&mut self, node: NodeId, static_link: Option<FrameId>) -> Result<FrameId, Unwind> {
        let max_frames = (self.opts.stack_size / 256).max(64);
        if self.frames.len() >= max_frames {
            return Err(Unwind::Error(RuntimeError::StackOverflow));
        }
        let dynamic_link = if self.frames.is_empty() { None } else { Some(self.current_frame_id()) };
        let scope = Scope(self.next_scope);
        self.next_scope += 1;
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(Frame::new(node, scope, static_link, dynamic_link));
        Ok(id)
    }

    /// Closes the innermost frame, forgetting every binding it introduced.
    /// Frame ids are never reused within a run, so comparing against the
    /// popped frame's own id is enough to find exactly its bindings.
    pub(crate) fn pop_frame(&mut self) {
        if !self.frames.is_empty() {
            let popped = FrameId((self.frames.len() - 1) as u32);
            self.frames.pop();
            self.bindings.retain(|_, &mut (f, _)| f != popped);
        }
    }

    /// Declares `tag` in the current frame with its default/initial value
    /// and records the binding, returning an `A68Ref` naming the new slot.
    /// Identity/variable declarations generate their initial value through
    /// exactly this path.
    pub(crate) fn declare(&mut self, tag: TagId, value: StackValue) -> A68Ref {
        let frame_id = self.current_frame_id();
        let scope = self.frame(frame_id).scope;
        let offset = self.frame_mut(frame_id).declare(value);
        self.bindings.insert(tag, (frame_id, offset));
        A68Ref { location: Location::Frame(frame_id), offset, scope }
    }

    /// Builds a ref to an already-bound tag (an applied identifier use).
    pub(crate) fn ref_to(&self, tag: TagId) -> Option<A68Ref> {
        let (frame_id, offset) = *self.bindings.get(&tag)?;
        let scope = self.frame(frame_id).scope;
        Some(A68Ref { location: Location::Frame(frame_id), offset, scope })
    }

    /// Reserves a frame slot with no owning tag, for generators evaluated
    /// as plain units (`loc int` used directly in an expression, not bound
    /// by a declaration).
    pub(crate) fn declare_anon(&mut self, value: StackValue) -> A68Ref {
        let frame_id = self.current_frame_id();
        let scope = self.frame(frame_id).scope;
        let offset = self.frame_mut(frame_id).declare(value);
        A68Ref { location: Location::Frame(frame_id), offset, scope }
    }

    pub(crate) fn frame_local(&self, frame: FrameId, offset: usize) -> Eval {
        Ok(self.frame(frame).slots[offset].clone())
    }

    pub(crate) fn set_frame_local(&mut self, frame: FrameId, offset: usize, value: StackValue) {
        self.frame_mut(frame).slots[offset] = value;
    }

    /// Reads through a heap-located ref. A `Struct` stored at `handle` is
    /// always treated as an indexable block (a ROW's element block, or a
    /// STRUCT's field list) rather than a single opaque value, since that is
    /// the shape every heap-backed composite this interpreter allocates
    /// (`generate_row`, `row_up`, `string_denotation`) actually uses;
    /// dereferencing a whole `HEAP`-generated STRUCT value directly (rather
    /// than through a later field selection) is the one case this doesn't
    /// cover.
    pub(crate) fn heap_local(&self, handle: crate::value::HandleId, offset: usize) -> Eval {
        match &self.heap.get(handle).value {
            StackValue::Struct(fields) => fields
                .get(offset)
                .cloned()
                .ok_or(Unwind::Error(RuntimeError::IndexOutOfBounds)),
            whole => Ok(whole.clone()),
        }
    }

    pub(crate) fn set_heap_local(&mut self, handle: crate::value::HandleId, offset: usize, value: StackValue) -> Result<(), Unwind> {
        match &mut self.heap.get_mut(handle).value {
            StackValue::Struct(fields) => {
                let slot = fields.get_mut(offset).ok_or(Unwind::Error(RuntimeError::IndexOutOfBounds))?;
                *slot = value;
                Ok(())
            }
            whole => {
                *whole = value;
                Ok(())
            }
        }
    }

    fn check_deadline(&self) -> Result<(), Unwind> {
        if let Some(d) = self.deadline {
            if Instant::now() >= d {
                return Err(Unwind::Error(RuntimeError::TimeLimitExceeded));
            }
        }
        Ok(())
    }

    /// Runs one colour-and-sweep collection cycle over every value
    /// currently reachable from the live frame stack.
    pub fn collect(&mut self) {
        for frame in &self.frames {
            for value in &frame.slots {
                colour::colour_value(&mut self.heap, self.modes, value);
            }
        }
        compact::sweep(&mut self.heap);
    }

    /// Entry point: evaluates `root` (a `ParticularProgram`), opening its
    /// top-level frame first.
    pub fn run(&mut self, root: NodeId) -> Eval {
        let frame = self.push_frame(root, None)?;
        let _ = frame;
        let result = self.eval(root);
        self.pop_frame();
        result
    }

    /// The central dispatch. Consults `node.propagator` first for the few
    /// hot-path shapes that skip the general match; falls through to the
    /// full match otherwise.
    pub(crate) fn eval(&mut self, id: NodeId) -> Eval {
        self.check_deadline()?;
        let node = self.arena.get(id);
        match node.propagator {
            Propagator::ConstantUnit => {
                if let Some(v) = &node.genie_info.constant {
                    return Ok(v.clone());
                }
            }
            Propagator::DerefLocIdentifier => {
                if let Some(tag) = node.tag {
                    if let Some(r) = self.ref_to(tag) {
                        return self.deref(&StackValue::Ref(r));
                    }
                }
            }
            _ => {}
        }
        self.eval_generic(id)
    }

    fn eval_generic(&mut self, id: NodeId) -> Eval {
        use Attribute::*;
        let attribute = self.arena.get(id).attribute;
        match attribute {
            Voiding | Dereferencing | Widening | Rowing | Uniting | Deproceduring | Proceduring => {
                let child = self.only_child(id);
                let inner = self.eval(child)?;
                self.apply_coercion(id, inner)
            }

            IntDenotation => Ok(StackValue::Int(parse_int(self.symbol(id)))),
            RealDenotation => Ok(StackValue::Real(parse_real(self.symbol(id)))),
            BoolDenotation => Ok(StackValue::Bool(self.symbol(id).trim() == "true" || self.symbol(id) == "T")),
            CharDenotation => Ok(StackValue::Char(self.symbol(id).chars().next().unwrap_or('\0'))),
            StringDenotation => self.string_denotation(id),
            Nihil | Nihilism => Ok(StackValue::Ref(A68Ref::nil(self.current_scope()))),
            Skip => Ok(StackValue::Void),

            Identifier => self.eval_identifier(id),
            Indicant | Label => Ok(StackValue::Void),

            Identity | IdentityDeclaration | VariableDeclaration | ProcedureDeclaration | ProcedureVariableDeclaration | ModeDeclaration => {
                self.eval_declaration(id)
            }

            Assignation => self.eval_assignation(id),
            Call => self.eval_call(id),
            Slice => self.eval_slice(id),
            FieldSelection => self.eval_field_selection(id),
            Generator | LocGenerator | HeapGenerator => self.eval_generator(id),

            Formula | MonadicFormula => self.eval_formula(id),
            Cast => {
                let child = self.last_child(id).ok_or(Unwind::Error(RuntimeError::EmptyValue))?;
                self.eval(child)
            }

            Enclosed | ClosedClause | Series => self.eval_series(id),
            CollateralClause => self.eval_collateral(id),
            ConditionalClause => self.eval_conditional(id),
            CaseClause | UnitedCaseClause => self.eval_case(id),
            LoopClause => self.eval_loop(id),

            RoutineText => self.eval_routine_text(id),

            Goto | GotoSymbol => {
                let node = self.arena.get(id);
                let tag = node.tag.ok_or(Unwind::Error(RuntimeError::ValueError("goto to an unresolved label".into())))?;
                Err(Unwind::Jump(tag))
            }

            AssertionClause => self.eval_assertion(id),

            ParticularProgram | StandardPrelude => self.eval_series(id),

            _ => {
                if let Some(child) = self.last_child(id) {
                    self.eval(child)
                } else {
                    Ok(StackValue::Void)
                }
            }
        }
    }

    fn only_child(&self, id: NodeId) -> NodeId {
        self.arena.get(id).sub.expect("coercion node always wraps exactly one unit")
    }

    fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.arena.children(id).last()
    }

    fn symbol(&self, id: NodeId) -> &str {
        self.arena.get(id).symbol.as_deref().unwrap_or("")
    }

    fn current_scope(&self) -> Scope {
        self.frames.last().map(|f| f.scope).unwrap_or(Scope::PRIMAL)
    }

    fn string_denotation(&mut self, id: NodeId) -> Eval {
        let text = self.symbol(id).to_string();
        let elem = self.modes.void();
        let values: Vec<StackValue> = text.chars().map(StackValue::Char).collect();
        let len = values.len() as i64;
        let size = std::mem::size_of::<StackValue>() * values.len();
        let handle = self
            .heap
            .try_allocate(elem, StackValue::Struct(values), size)
            .map_err(|_| Unwind::Error(RuntimeError::HeapExhaustion))?;
        Ok(StackValue::Row(crate::value::ArrayDescriptor {
            elem_mode: elem,
            slice_offset: 0,
            field_offset: 0,
            elements: Some(handle),
            tuples: vec![crate::value::DimTuple { lower: 1, upper: len.max(1), shift: 1, span: 1 }],
        }))
    }

    fn eval_identifier(&mut self, id: NodeId) -> Eval {
        let node = self.arena.get(id);
        let tag = node.tag.ok_or(Unwind::Error(RuntimeError::ValueError("unresolved identifier".into())))?;
        if self.symtab.tag(tag).stand_env_proc {
            return self.eval_stand_env_proc(tag);
        }
        match self.ref_to(tag) {
            Some(r) => Ok(StackValue::Ref(r)),
            None => Err(Unwind::Error(RuntimeError::ValueError(format!("{} used before its declaration ran", self.symtab.tag(tag).name.clone().unwrap_or_default())))),
        }
    }

    /// A standard-environment primitive named directly (`print`, `upb`,
    /// ...) used as a value rather than called: wraps it as a niladic,
    /// localeless `PROC` value that [`call::eval_call`] recognises by name.
    fn eval_stand_env_proc(&mut self, tag: TagId) -> Eval {
        let mode = self.symtab.tag(tag).mode.unwrap_or(self.modes.void());
        Ok(StackValue::Proc(ProcValue { mode, body: None, environ: None, locale: None }))
    }

    /// One declared name: `node.tag`/`node.mode` name the binding, and the
    /// node's single child (if any) is the initialiser unit — see
    /// `bottom_up.rs`'s `parse_identity_or_variable_declaration`, which
    /// allocates exactly this: zero children for a bare
    /// `VariableDeclaration`, one child (the initial-value unit) otherwise.
    fn eval_declaration(&mut self, id: NodeId) -> Eval {
        let node = self.arena.get(id);
        let Some(tag) = node.tag else {
            // A wrapper (`IdentityDeclaration`/`ModeDeclaration` with
            // several entries as children): run each entry in turn.
            let mut last = StackValue::Void;
            for child in self.arena.children(id) {
                last = self.eval(child)?;
            }
            return Ok(last);
        };
        let mode = self.symtab.tag(tag).mode.unwrap_or(self.modes.void());
        let value = match self.arena.get(id).sub {
            Some(init) => self.eval(init)?,
            None => crate::gc::generator::default_value(self.modes, mode),
        };
        self.declare(tag, value);
        Ok(StackValue::Void)
    }

    fn eval_series(&mut self, id: NodeId) -> Eval {
        let mut last = StackValue::Void;
        for child in self.arena.children(id) {
            last = self.eval(child)?;
        }
        Ok(last)
    }

    fn eval_collateral(&mut self, id: NodeId) -> Eval {
        let mut values = Vec::new();
        for child in self.arena.children(id) {
            values.push(self.eval(child)?);
        }
        Ok(StackValue::Struct(values))
    }

    fn eval_generator(&mut self, id: NodeId) -> Eval {
        let node = self.arena.get(id);
        let mode = node.mode.unwrap_or(self.modes.void());
        let sub = self.modes.get(mode).sub.unwrap_or(mode);
        let value = crate::gc::generator::default_value(self.modes, sub);
        if node.attribute == Attribute::HeapGenerator {
            let size = std::mem::size_of::<StackValue>();
            let r = crate::gc::generator::heap_generator(&mut self.heap, self.modes, sub, value, size)
                .map_err(|_| Unwind::Error(RuntimeError::HeapExhaustion))?;
            Ok(StackValue::Ref(r))
        } else {
            Ok(StackValue::Ref(self.declare_anon(value)))
        }
    }

    fn eval_assertion(&mut self, id: NodeId) -> Eval {
        let child = self.only_child(id);
        let value = self.eval(child)?;
        match value {
            StackValue::Bool(true) => Ok(StackValue::Void),
            StackValue::Bool(false) => Err(Unwind::Error(RuntimeError::AssertionFailure)),
            _ => Ok(StackValue::Void),
        }
    }

    fn eval_routine_text(&mut self, id: NodeId) -> Eval {
        let node = self.arena.get(id);
        let mode = node.mode.unwrap_or(self.modes.void());
        let environ = if self.frames.is_empty() { None } else { Some(self.current_frame_id()) };
        Ok(StackValue::Proc(ProcValue {
            mode,
            body: Some(id),
            environ,
            locale: None,
        }))
    }

    /// Dispatches a 0-arity `PROC` value, used by `Deproceduring` and by the
    /// niladic standard-environment procs evaluated as bare identifiers.
    pub(crate) fn call_niladic(&mut self, proc: ProcValue) -> Eval {
        call::invoke(self, proc, Vec::new())
    }
}

fn parse_int(text: &str) -> i64 {
    text.chars().filter(|c| !c.is_whitespace()).collect::<String>().parse().unwrap_or(0)
}

fn parse_real(text: &str) -> f64 {
    text.chars().filter(|c| !c.is_whitespace()).collect::<String>().replace('e', "E").parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::node::Node;

    fn blank_options() -> Options {
        Options::default()
    }

    #[test]
    fn int_denotation_evaluates_to_its_value() {
        let mut arena = NodeArena::new();
        let modes = ModeTable::new();
        let symtab = SymbolTables::new();
        let span = crate::diag::SourceSpan::default();
        let id = arena.alloc(Node::new(Attribute::IntDenotation, span).with_symbol("42"));
        let opts = blank_options();
        let mut interp = Interpreter::new(&arena, &modes, &symtab, &opts);
        interp.push_frame(id, None).unwrap();
        assert_eq!(interp.eval(id), Ok(StackValue::Int(42)));
    }

    #[test]
    fn declare_then_lookup_round_trips_through_a_ref() {
        let arena = NodeArena::new();
        let mut modes = ModeTable::new();
        let mut diags = Diagnostics::new();
        let symtab = SymbolTables::new();
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let opts = blank_options();
        let mut interp = Interpreter::new(&arena, &modes, &symtab, &opts);
        interp.push_frame(NodeId(0), None).unwrap();
        let r = interp.declare(TagId(0), StackValue::Int(7));
        let _ = int;
        assert_eq!(interp.deref(&StackValue::Ref(r)), Ok(StackValue::Int(7)));
    }
}
