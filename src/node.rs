//! The syntax tree: [`Node`], the closed set of grammar/token [`Attribute`]s,
//! and the [`NodeArena`] that owns every node for the lifetime of a run.
//!
//! Nodes are addressed by [`NodeId`] rather than by reference, so that later
//! phases can stash annotations (`mode`, `tag`, `propagator`, `mask`, ...)
//! into a node that other phases are simultaneously walking past, without
//! fighting the borrow checker over a self-referential tree, unlike the
//! teacher's `typed-arena`-backed arena, where references are borrowed for
//! the arena's lifetime rather than addressed by index.

use crate::diag::SourceSpan;
use crate::moid::MoidId;
use crate::symtab::{SymbolTableId, TagId};

/// Opaque index into a [`NodeArena`]. Never reused within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// The closed set of grammar productions and leaf-token kinds a node can
/// carry: a variant tag drawn from a large closed set, not exhaustive of
/// every production in the full Algol 68 grammar but covering every
/// construct the front end actually produces (mode declarers, units,
/// calls, denotations, clauses, declarations, jumps) plus enough
/// structural glue (SERIES, LIST) to assemble them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    // Leaves / tokens
    Identifier,
    Indicant,
    IntDenotation,
    RealDenotation,
    BoolDenotation,
    CharDenotation,
    StringDenotation,
    Operator,
    Label,
    Nihil,
    Skip,

    // Declarers
    VoidSymbol,
    StandardDeclarer,
    LongetyDeclarer,
    ShortetyDeclarer,
    ReferenceToDeclarer,
    FlexDeclarer,
    BoundsList,
    Bound,
    StructDeclarer,
    StructuredFieldList,
    StructuredField,
    UnionDeclarer,
    UnionDeclarerList,
    ProcedureDeclarer,
    FormalDeclarerList,
    FormalDeclarer,

    // Declarations
    IdentityDeclaration,
    VariableDeclaration,
    ProcedureDeclaration,
    ProcedureVariableDeclaration,
    ModeDeclaration,
    OperatorDeclaration,
    PriorityDeclaration,
    BracketedMode,

    // Units / clauses
    Unit,
    Assignation,
    Identity,
    Call,
    Slice,
    Trimmer,
    FieldSelection,
    Generator,
    LocGenerator,
    HeapGenerator,
    Nihilism,
    Formula,
    MonadicFormula,
    Cast,
    Enclosed,
    ClosedClause,
    CollateralClause,
    ConditionalClause,
    IfPart,
    ThenPart,
    ElifPart,
    ElsePart,
    CaseClause,
    InCasePart,
    OutCasePart,
    LoopClause,
    ForPart,
    FromPart,
    ByPart,
    ToPart,
    WhilePart,
    DoPart,
    UntilPart,
    RoutineText,
    UnitedCaseClause,
    AssertionClause,

    // Structural glue
    Series,
    ParameterPack,
    ArgumentList,
    GenericArgumentList,
    Declaration,
    Voiding,
    Uniting,
    Widening,
    Rowing,
    Dereferencing,
    Deproceduring,
    Proceduring,

    // Jumps
    Goto,
    GotoSymbol,

    // Top level
    ParticularProgram,
    StandardPrelude,
}

/// Frame-local interpreter scratch, filled in only for nodes the interpreter
/// actually visits.
#[derive(Debug, Clone, Default)]
pub struct GenieInfo {
    /// Total byte size of a CALL's evaluated argument list, used to size the
    /// expression-stack push/pop without re-walking the argument list.
    pub argsize: usize,
    /// Whether this node's evaluation implies a pending coercion (the
    /// coercion inserter sets this; the interpreter's dispatch consults it to
    /// avoid a second attribute match).
    pub whether_coercion: bool,
    /// Folded compile-time constant, if the mode checker/coercion inserter
    /// proved this subtree has one (e.g. `3 + 4` inside a bound).
    pub constant: Option<crate::value::StackValue>,
}

/// Bitset of booleans carried per node. Stored as a plain
/// `u16` bitmask rather than a crate like `bitflags` because the set is
/// small, fixed, and entirely internal (no public wire format to keep
/// stable) — `bitflags` would buy nothing `Mask::bit()` doesn't already give.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mask(pub u16);

impl Mask {
    pub const ASSERT: u16 = 1 << 0;
    pub const BREAKPOINT: u16 = 1 << 1;
    pub const TRACE: u16 = 1 << 2;
    pub const SERIAL: u16 = 1 << 3;
    pub const OPTIMAL: u16 = 1 << 4;
    pub const CROSS_REFERENCE: u16 = 1 << 5;
    pub const SOURCE: u16 = 1 << 6;
    pub const TREE: u16 = 1 << 7;
    pub const CODE: u16 = 1 << 8;
    pub const MODULAR: u16 = 1 << 9;

    pub fn has(&self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    pub fn set(&mut self, bit: u16) {
        self.0 |= bit;
    }

    pub fn clear(&mut self, bit: u16) {
        self.0 &= !bit;
    }
}

/// The cached specialised evaluator selected for a node on its first visit:
/// a closed enum rather than a raw function pointer, so the interpreter's
/// dispatch stays exhaustively matchable and never carries an unsafe
/// `fn`-pointer cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagator {
    #[default]
    Generic,
    DerefLocIdentifier,
    SliceNameQuick,
    VoidingAssignation,
    ConstantUnit,
}

/// One node of the syntax tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub attribute: Attribute,
    /// Raw token text, set for leaves (identifiers, denotations, operators).
    pub symbol: Option<String>,
    pub span: SourceSpan,

    pub parent: Option<NodeId>,
    pub sub: Option<NodeId>,
    pub next: Option<NodeId>,

    /// Filled in by the mode checker.
    pub mode: Option<MoidId>,
    /// Filled in by symbol binding for identifier/indicant/operator/label
    /// leaves.
    pub tag: Option<TagId>,
    /// The symbol table in effect at this node (set while building tables).
    pub symbol_table: Option<SymbolTableId>,

    pub propagator: Propagator,
    pub mask: Mask,
    /// Successor in the linearised fast path built by a later parser
    /// phase; `None` until that phase runs.
    pub sequence: Option<NodeId>,
    pub genie_info: GenieInfo,
}

impl Node {
    pub fn new(attribute: Attribute, span: SourceSpan) -> Self {
        Node {
            attribute,
            symbol: None,
            span,
            parent: None,
            sub: None,
            next: None,
            mode: None,
            tag: None,
            symbol_table: None,
            propagator: Propagator::default(),
            mask: Mask::default(),
            sequence: None,
            genie_info: GenieInfo::default(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }
}

/// Owns every [`Node`] allocated during one run. Append-only: nodes are
/// never individually freed; their lifetime is the whole program's.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        NodeArena { nodes: Vec::new() }
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate the immediate children of `id` by following `sub`/`next`.
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        ChildIter {
            arena: self,
            next: self.get(id).sub,
        }
    }

    /// Attach `child` as a new last sibling under `parent`'s child chain,
    /// used by the top-down and bottom-up parser phases while assembling
    /// productions.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.get_mut(child).parent = Some(parent);
        match self.get(parent).sub {
            None => self.get_mut(parent).sub = Some(child),
            Some(first) => {
                let mut cur = first;
                loop {
                    match self.get(cur).next {
                        Some(n) => cur = n,
                        None => break,
                    }
                }
                self.get_mut(cur).next = Some(child);
            }
        }
    }
}

pub struct ChildIter<'a> {
    arena: &'a NodeArena,
    next: Option<NodeId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.arena.get(cur).next;
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> SourceSpan {
        SourceSpan::default()
    }

    #[test]
    fn append_child_builds_sibling_chain() {
        let mut arena = NodeArena::new();
        let parent = arena.alloc(Node::new(Attribute::Series, span()));
        let a = arena.alloc(Node::new(Attribute::Unit, span()));
        let b = arena.alloc(Node::new(Attribute::Unit, span()));
        arena.append_child(parent, a);
        arena.append_child(parent, b);
        let kids: Vec<_> = arena.children(parent).collect();
        assert_eq!(kids, vec![a, b]);
        assert_eq!(arena.get(a).parent, Some(parent));
        assert_eq!(arena.get(b).parent, Some(parent));
    }

    #[test]
    fn mask_bits_are_independent() {
        let mut m = Mask::default();
        m.set(Mask::TRACE);
        m.set(Mask::ASSERT);
        assert!(m.has(Mask::TRACE));
        assert!(m.has(Mask::ASSERT));
        assert!(!m.has(Mask::BREAKPOINT));
        m.clear(Mask::TRACE);
        assert!(!m.has(Mask::TRACE));
        assert!(m.has(Mask::ASSERT));
    }
}
