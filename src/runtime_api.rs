//! The narrow contract surface the interpreter exposes to collaborators
//! outside itself — chiefly the transput library, which this crate does
//! not implement but whose hooks still need a stable boundary to call
//! through.
//!
//! Unlike a byte-precise implementation, this interpreter has no literal
//! expression stack to push values onto and pop them off of —
//! `StackValue`s already flow as ordinary Rust return values through
//! `eval` — so a push/pop/increment-sp style API has no counterpart here;
//! there is nothing to wrap. What remains, and is genuinely shared across
//! more than one caller, is gathered here: the `NIL` constant,
//! array-descriptor subscripting, and the dynamic scope assertion every
//! REF-yielding point needs to run.

use crate::interpreter::jump::RuntimeError;
use crate::value::{A68Ref, ArrayDescriptor, Scope, StackValue};

/// The `NIL` constant at a given scope.
pub fn nil(scope: Scope) -> StackValue {
    StackValue::Ref(A68Ref::nil(scope))
}

/// Dynamic-scope check: a REF that outlives the frame it names is a scope
/// violation. Recurses into a STOWED value's fields/elements since a
/// STRUCT field or ROW element can itself carry a REF that needs the same
/// check — a call's return step runs this on the whole returned value,
/// not just a bare REF.
pub fn dns(value: &StackValue, limit: Scope) -> Result<(), RuntimeError> {
    match value {
        StackValue::Ref(r) => {
            if !r.is_nil() && r.scope > limit {
                return Err(RuntimeError::ScopeError);
            }
            Ok(())
        }
        StackValue::Struct(fields) => fields.iter().try_for_each(|f| dns(f, limit)),
        StackValue::Union(_, inner) => dns(inner, limit),
        _ => Ok(()),
    }
}

/// Row element access by flat subscript, split out of `ArrayDescriptor`
/// itself so an out-of-bounds index becomes the `RuntimeError` callers
/// already thread rather than an `Option` they'd have to re-derive one
/// into.
pub fn subscript(desc: &ArrayDescriptor, indices: &[i64]) -> Result<i64, RuntimeError> {
    desc.flat_index(indices).ok_or(RuntimeError::IndexOutOfBounds)
}

/// True when `value` needs a structured (deep) copy rather than a flat
/// one on assignment.
pub fn has_rows(value: &StackValue) -> bool {
    value.is_stowed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Location;

    #[test]
    fn nil_is_never_a_scope_violation() {
        assert_eq!(dns(&nil(Scope(5)), Scope(0)), Ok(()));
    }

    #[test]
    fn a_ref_outliving_its_limit_is_a_scope_error() {
        let inner = StackValue::Ref(A68Ref { location: Location::Frame(crate::value::FrameId(3)), offset: 0, scope: Scope(9) });
        assert_eq!(dns(&inner, Scope(1)), Err(RuntimeError::ScopeError));
    }

    #[test]
    fn a_ref_nested_in_a_struct_is_still_checked() {
        let inner = StackValue::Ref(A68Ref { location: Location::Frame(crate::value::FrameId(3)), offset: 0, scope: Scope(9) });
        let wrapped = StackValue::Struct(vec![StackValue::Int(1), inner]);
        assert_eq!(dns(&wrapped, Scope(1)), Err(RuntimeError::ScopeError));
    }
}
