//! Runtime value representations: the tagged expression-stack value
//! ([`StackValue`]), the fat reference ([`A68Ref`]), the array descriptor,
//! and heap handles.
//!
//! Unlike a byte-precise C implementation, composite values are represented
//! as a small owned tree (`Vec<StackValue>` for STRUCT fields and ROW
//! elements) rather than a raw byte blob. This gets Algol 68's STOWED value
//! copy semantics "for free" from `Clone`, while the [`Handle`] table still
//! tracks a `size` for heap accounting and compaction ordering, so those
//! invariants remain checkable.

use crate::moid::MoidId;

/// Frame-pointer depth at which a name became valid. Compared against a
/// limit by [`crate::runtime_api::dns`] to enforce that every reachable
/// REF has a scope no deeper than the current frame pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scope(pub u32);

impl Scope {
    /// The scope of values that outlive every frame: standard-environment
    /// constants and the program's outermost frame.
    pub const PRIMAL: Scope = Scope(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

/// Where an [`A68Ref`]'s storage physically lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Heap(HandleId),
    Frame(FrameId),
    /// The `NIL` constant: no storage at all.
    Nil,
}

/// A fat reference: where its storage lives, a sub-offset into it, and
/// the scope it was created at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct A68Ref {
    pub location: Location,
    /// Sub-offset within the referenced composite (field/element index),
    /// used when the REF was produced by a field selection or a subscript
    /// on a REF STRUCT/REF ROW.
    pub offset: usize,
    pub scope: Scope,
}

impl A68Ref {
    pub fn nil(scope: Scope) -> Self {
        A68Ref {
            location: Location::Nil,
            offset: 0,
            scope,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.location, Location::Nil)
    }
}

/// One dimension of an array descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimTuple {
    pub lower: i64,
    pub upper: i64,
    /// `lower`, kept separately so a trim can change it without touching
    /// `lower`.
    pub shift: i64,
    /// Stride: number of elements to skip to advance this dimension by one.
    pub span: i64,
}

impl DimTuple {
    pub fn len(&self) -> i64 {
        (self.upper - self.lower + 1).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.upper < self.lower
    }
}

/// Bounds and backing storage for a ROW value: one [`DimTuple`] per
/// dimension plus the offsets needed to address a field- or slice-derived
/// view onto a shared element block.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDescriptor {
    pub elem_mode: MoidId,
    pub slice_offset: i64,
    pub field_offset: i64,
    /// Backing storage for the elements. `None` only for a descriptor that
    /// has been built (bounds known) but not yet had its element block
    /// generated — an intermediate state during generator recursion.
    pub elements: Option<HandleId>,
    pub tuples: Vec<DimTuple>,
}

impl ArrayDescriptor {
    pub fn dim(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.iter().any(DimTuple::is_empty)
    }

    /// Flat element index for a multi-dimensional subscript: base plus the
    /// field and slice offsets plus each dimension's `span * (index - shift)`.
    pub fn flat_index(&self, indices: &[i64]) -> Option<i64> {
        if indices.len() != self.tuples.len() {
            return None;
        }
        let mut addr = self.field_offset + self.slice_offset;
        for (idx, tup) in indices.iter().zip(&self.tuples) {
            if *idx < tup.lower || *idx > tup.upper {
                return None;
            }
            addr += tup.span * (idx - tup.shift);
        }
        Some(addr)
    }
}

/// Partial-call environment: one slot per formal parameter, filled in
/// left-to-right as arguments are supplied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Locale {
    pub slots: Vec<Option<StackValue>>,
}

impl Locale {
    pub fn new(arity: usize) -> Self {
        Locale {
            slots: vec![None; arity],
        }
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn fill_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// A procedure value: either a plain closure over its defining frame, or one
/// partially applied with a [`Locale`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcValue {
    pub mode: MoidId,
    /// The `ROUTINE TEXT` node this procedure's body is rooted at; `None`
    /// for standard-environment primitives, which are dispatched by tag
    /// instead (`Tag::stand_env_proc`).
    pub body: Option<crate::node::NodeId>,
    /// Static link: the frame active when this procedure value was formed,
    /// enabling non-local access without a display.
    pub environ: Option<FrameId>,
    pub locale: Option<Box<Locale>>,
}

/// A value on the expression stack.
#[derive(Debug, Clone, PartialEq)]
pub enum StackValue {
    Void,
    Int(i64),
    Real(f64),
    Bool(bool),
    Char(char),
    Bits(u64),
    Ref(A68Ref),
    /// STRUCT value, fields in declaration order. Cloning this clones every
    /// field, which is exactly Algol 68's STRUCT value-copy semantics.
    Struct(Vec<StackValue>),
    /// UNION value: active member's mode plus its payload.
    Union(MoidId, Box<StackValue>),
    /// A STOWED row value carried directly on the stack (as opposed to a
    /// `Ref` pointing at one) — the descriptor plus its own private copy of
    /// the elements.
    Row(ArrayDescriptor),
    Proc(ProcValue),
}

impl StackValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StackValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StackValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Option<&A68Ref> {
        match self {
            StackValue::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// True when a deep copy is required on assignment. Checks the
    /// *value's* own shape rather than re-deriving it from the mode, since
    /// by the time a value reaches here it has already been evaluated.
    pub fn is_stowed(&self) -> bool {
        matches!(self, StackValue::Struct(_) | StackValue::Row(_) | StackValue::Union(_, _))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim_tuple_flat_index_respects_shift_and_span() {
        let tup = DimTuple {
            lower: 1,
            upper: 10,
            shift: 1,
            span: 1,
        };
        let desc = ArrayDescriptor {
            elem_mode: MoidId(0),
            slice_offset: 0,
            field_offset: 0,
            elements: None,
            tuples: vec![tup],
        };
        assert_eq!(desc.flat_index(&[1]), Some(0));
        assert_eq!(desc.flat_index(&[10]), Some(9));
        assert_eq!(desc.flat_index(&[0]), None);
        assert_eq!(desc.flat_index(&[11]), None);
    }

    #[test]
    fn empty_row_has_lower_greater_than_upper() {
        let tup = DimTuple {
            lower: 1,
            upper: 0,
            shift: 1,
            span: 1,
        };
        assert!(tup.is_empty());
        assert_eq!(tup.len(), 0);
    }

    #[test]
    fn struct_clone_is_a_deep_copy() {
        let a = StackValue::Struct(vec![StackValue::Int(1), StackValue::Int(2)]);
        let mut b = a.clone();
        if let StackValue::Struct(fields) = &mut b {
            fields[0] = StackValue::Int(99);
        }
        assert_eq!(a, StackValue::Struct(vec![StackValue::Int(1), StackValue::Int(2)]));
    }

    #[test]
    fn locale_completion_tracks_fill_count() {
        let mut l = Locale::new(2);
        assert!(!l.is_complete());
        l.slots[0] = Some(StackValue::Int(1));
        assert_eq!(l.fill_count(), 1);
        l.slots[1] = Some(StackValue::Int(2));
        assert!(l.is_complete());
    }
}
