//! Allocation: turns a mode and (for rows) a set of bounds into an
//! initialised value, either on the heap (`HEAP` generator) or as a bare
//! value the caller places directly into a frame slot (`LOC` generator,
//! which never touches the heap at all).
//!
//! Bounds are known by the time this is called (the interpreter evaluates
//! the declarer's bound units left to right before generating), so there is
//! no separate bound-stack pass here — the caller passes the already-evaluated
//! bounds.

use crate::gc::{Heap, OutOfCore};
use crate::moid::{ModeTable, MoidAttribute};
use crate::value::{A68Ref, ArrayDescriptor, DimTuple, Location, Scope, StackValue};

/// A fresh, "undefined" value for `mode`, used both to seed a LOC
/// generator's frame slot and to fill a freshly allocated row's elements.
/// Scalars get their zero value (Algol 68 leaves a LOC's initial content
/// genuinely undefined; zero is as good a deterministic choice as any and
/// keeps `print` on an un-assigned variable from reading uninitialised Rust
/// memory).
pub fn default_value(modes: &ModeTable, mode: crate::moid::MoidId) -> StackValue {
    use crate::moid::StandardKind::*;
    match modes.get(mode).attribute {
        MoidAttribute::Void => StackValue::Void,
        MoidAttribute::Standard(Int) | MoidAttribute::Standard(Bits) => StackValue::Int(0),
        MoidAttribute::Standard(Real) | MoidAttribute::Standard(Complex) => StackValue::Real(0.0),
        MoidAttribute::Standard(Bool) => StackValue::Bool(false),
        MoidAttribute::Standard(Char) => StackValue::Char('\0'),
        MoidAttribute::Standard(Bytes) | MoidAttribute::Standard(String) => StackValue::Row(empty_row(mode)),
        MoidAttribute::Ref => StackValue::Ref(A68Ref::nil(Scope::PRIMAL)),
        MoidAttribute::Struct => {
            let fields = modes
                .get(mode)
                .pack
                .as_ref()
                .map(|p| p.iter().map(|e| default_value(modes, e.moid)).collect())
                .unwrap_or_default();
            StackValue::Struct(fields)
        }
        MoidAttribute::Union => {
            let first = modes.get(mode).pack.as_ref().and_then(|p| p.iter().next()).map(|e| e.moid).unwrap_or(mode);
            StackValue::Union(first, Box::new(default_value(modes, first)))
        }
        MoidAttribute::Row | MoidAttribute::Flex => StackValue::Row(empty_row(mode)),
        MoidAttribute::Proc => StackValue::Proc(crate::value::ProcValue {
            mode,
            body: None,
            environ: None,
            locale: None,
        }),
        MoidAttribute::Format | MoidAttribute::Indicant | MoidAttribute::Series => StackValue::Void,
    }
}

fn empty_row(elem_mode: crate::moid::MoidId) -> ArrayDescriptor {
    ArrayDescriptor {
        elem_mode,
        slice_offset: 0,
        field_offset: 0,
        elements: None,
        tuples: vec![],
    }
}

/// Builds the row descriptor for `bounds` (one `(lower, upper)` pair per
/// dimension, row-major strides) and allocates its element block on the
/// heap, filled with `elem_mode`'s default value.
pub fn generate_row(heap: &mut Heap, modes: &ModeTable, elem_mode: crate::moid::MoidId, bounds: &[(i64, i64)]) -> Result<ArrayDescriptor, OutOfCore> {
    let mut tuples = Vec::with_capacity(bounds.len());
    let mut span = 1i64;
    for &(lower, upper) in bounds.iter().rev() {
        let len = (upper - lower + 1).max(0);
        tuples.push(DimTuple { lower, upper, shift: lower, span });
        span *= len;
    }
    tuples.reverse();
    let total = tuples.first().map(|t| t.span * t.len()).unwrap_or(0).max(0) as usize;
    let default = default_value(modes, elem_mode);
    let elements = vec![default; total];
    let size = total * std::mem::size_of::<StackValue>();
    let handle = heap.try_allocate(elem_mode, StackValue::Struct(elements), size)?;
    Ok(ArrayDescriptor {
        elem_mode,
        slice_offset: 0,
        field_offset: 0,
        elements: Some(handle),
        tuples,
    })
}

/// `heap_generator(mode, bytes)`: allocates a heap block for `mode` and
/// returns a fresh `A68_REF` naming it.
pub fn heap_generator(heap: &mut Heap, modes: &ModeTable, mode: crate::moid::MoidId, value: StackValue, size: usize) -> Result<A68Ref, OutOfCore> {
    let handle = heap.try_allocate(mode, value, size)?;
    Ok(A68Ref {
        location: Location::Heap(handle),
        offset: 0,
        scope: Scope::PRIMAL,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::moid::{ModeTable, StandardKind};

    #[test]
    fn default_int_is_zero() {
        let mut modes = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        assert_eq!(default_value(&modes, int), StackValue::Int(0));
    }

    #[test]
    fn generate_row_allocates_the_right_element_count() {
        let mut modes = ModeTable::new();
        let mut diags = Diagnostics::new();
        let mut heap = Heap::new(1 << 20);
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let desc = generate_row(&mut heap, &modes, int, &[(1, 10)]).unwrap();
        assert_eq!(desc.dim(), 1);
        let handle = desc.elements.unwrap();
        match &heap.get(handle).value {
            StackValue::Struct(elems) => assert_eq!(elems.len(), 10),
            _ => panic!("expected a flat element block"),
        }
    }

    #[test]
    fn heap_generator_returns_a_ref_into_the_heap() {
        let mut modes = ModeTable::new();
        let mut diags = Diagnostics::new();
        let mut heap = Heap::new(1 << 20);
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let r = heap_generator(&mut heap, &modes, int, StackValue::Int(5), 8).unwrap();
        assert!(matches!(r.location, Location::Heap(_)));
        assert!(!r.is_nil());
    }
}
