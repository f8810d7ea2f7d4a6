//! Colouring: marks every heap handle reachable from a set of root values
//! (frame locals, anonymous generator/protect-from-sweep slots) so
//! [`super::compact::sweep`] knows what to keep.
//!
//! Colouring walks, for each frame from the current FP up the dynamic
//! chain, every identifier tag and calls colour on its frame slot and mode.
//! The frame walk itself lives in the interpreter (it owns the frame
//! stack); given the root *values* to colour, this module does the
//! recursive handle-marking.

use crate::gc::{Heap, HandleStatus};
use crate::moid::{ModeTable, MoidAttribute};
use crate::value::{A68Ref, Location, StackValue};

/// Colours every handle reachable from `value`, recursing through
/// STRUCT/UNION/ROW payloads and REF targets. COOKIE gates cycles: a handle
/// already mid-colouring is not re-entered.
pub fn colour_value(heap: &mut Heap, modes: &ModeTable, value: &StackValue) {
    match value {
        StackValue::Ref(r) => colour_ref(heap, modes, r),
        StackValue::Struct(fields) => {
            for f in fields {
                colour_value(heap, modes, f);
            }
        }
        StackValue::Union(_, payload) => colour_value(heap, modes, payload),
        StackValue::Row(desc) => {
            if let Some(elements) = desc.elements {
                colour_handle(heap, modes, elements);
            }
        }
        StackValue::Proc(proc) => {
            if let Some(locale) = &proc.locale {
                for slot in &locale.slots {
                    if let Some(v) = slot {
                        colour_value(heap, modes, v);
                    }
                }
            }
        }
        StackValue::Void | StackValue::Int(_) | StackValue::Real(_) | StackValue::Bool(_) | StackValue::Char(_) | StackValue::Bits(_) => {}
    }
}

fn colour_ref(heap: &mut Heap, modes: &ModeTable, r: &A68Ref) {
    if let Location::Heap(handle) = r.location {
        colour_handle(heap, modes, handle);
    }
}

fn colour_handle(heap: &mut Heap, modes: &ModeTable, handle: crate::value::HandleId) {
    {
        let h = heap.get_mut(handle);
        if h.status.has(HandleStatus::COOKIE) {
            return;
        }
        h.status.set(HandleStatus::COOKIE);
        h.status.set(HandleStatus::COLOUR);
    }
    let mode = heap.get(handle).mode;
    let has_rows_or_ref = matches!(
        modes.get(mode).attribute,
        MoidAttribute::Ref | MoidAttribute::Row | MoidAttribute::Flex | MoidAttribute::Struct | MoidAttribute::Union | MoidAttribute::Proc
    );
    if has_rows_or_ref {
        let value = heap.get(handle).value.clone();
        colour_value(heap, modes, &value);
    }
    heap.get_mut(handle).status.clear(HandleStatus::COOKIE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::moid::{ModeTable, StandardKind};
    use crate::value::{A68Ref, Location, Scope};

    #[test]
    fn colouring_a_ref_marks_its_handle() {
        let mut heap = Heap::new(1024);
        let mut modes = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let handle = heap.try_allocate(int, StackValue::Int(7), 8).unwrap();
        let r = A68Ref {
            location: Location::Heap(handle),
            offset: 0,
            scope: Scope::PRIMAL,
        };
        colour_value(&mut heap, &modes, &StackValue::Ref(r));
        assert!(heap.get(handle).status.has(HandleStatus::COLOUR));
        assert!(!heap.get(handle).status.has(HandleStatus::COOKIE));
    }

    #[test]
    fn colouring_ignores_scalars() {
        let mut heap = Heap::new(1024);
        let modes = ModeTable::new();
        colour_value(&mut heap, &modes, &StackValue::Int(3));
        assert_eq!(heap.busy_handles().len(), 0);
    }
}
