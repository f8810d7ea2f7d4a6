//! `Assignation` evaluation. Right-hand side before left-hand side is
//! *not* required by the language; this evaluates destination first, then
//! source, so a dynamic-scope check on the source can be run against the
//! destination's own scope as its upper bound (`dns`). The already-evaluated
//! source is deep-copied into the destination whenever the value is
//! stowed (`source.has_rows`), so two variables never end up aliasing the
//! same heap-backed row or struct field after `a := b`.
//!
//! `FieldSelection` is the one destination shape that can't be reduced to
//! a plain `A68Ref`: a `STRUCT`'s fields live inline in whichever frame or
//! heap slot the whole value occupies, not at storage locations of their
//! own, so `s OF x := v` reads the struct through, rewrites one field in a
//! private copy, and writes the whole value back.

use crate::interpreter::jump::{Eval, RuntimeError, Unwind};
use crate::interpreter::Interpreter;
use crate::node::{Attribute, NodeId};
use crate::runtime_api::{dns, has_rows};
use crate::value::{Location, StackValue};

impl<'a> Interpreter<'a> {
    pub(super) fn eval_assignation(&mut self, id: NodeId) -> Eval {
        let mut children = self.arena.children(id);
        let dest = children.next().ok_or(Unwind::Error(RuntimeError::EmptyValue))?;
        let source = children.next().ok_or(Unwind::Error(RuntimeError::EmptyValue))?;

        if self.arena.get(dest).attribute == Attribute::FieldSelection {
            return self.assign_field(dest, source);
        }

        let dest_value = self.eval(dest)?;
        let r = match dest_value {
            StackValue::Ref(r) => r,
            other => return Err(Unwind::Error(RuntimeError::ValueError(format!("assignment destination is not a REF ({:?})", other)))),
        };
        if r.is_nil() {
            return Err(Unwind::Error(RuntimeError::NilDereference));
        }

        let raw = self.eval(source)?;
        dns(&raw, r.scope)?;
        let value = if has_rows(&raw) { self.deep_copy(&raw)? } else { raw };

        match r.location {
            Location::Frame(frame) => self.set_frame_local(frame, r.offset, value.clone()),
            Location::Heap(handle) => self.set_heap_local(handle, r.offset, value.clone())?,
            Location::Nil => unreachable!("checked above"),
        }
        Ok(value)
    }

    fn assign_field(&mut self, dest: NodeId, source: NodeId) -> Eval {
        let node = self.arena.get(dest);
        let field_name = node.symbol.clone().unwrap_or_default();
        let operand = self.only_child(dest);
        let struct_mode = self.arena.get(operand).mode;

        let base = self.eval(operand)?;
        let r = match base {
            StackValue::Ref(r) if !r.is_nil() => r,
            StackValue::Ref(_) => return Err(Unwind::Error(RuntimeError::NilDereference)),
            other => return Err(Unwind::Error(RuntimeError::ValueError(format!("{} of a non-name value ({:?})", field_name, other)))),
        };

        let raw = self.eval(source)?;
        dns(&raw, r.scope)?;
        let value = if has_rows(&raw) { self.deep_copy(&raw)? } else { raw };

        let mut fields = match self.deref(&StackValue::Ref(r))? {
            StackValue::Struct(fields) => fields,
            other => return Err(Unwind::Error(RuntimeError::ValueError(format!("{} applied to a non-STRUCT value ({:?})", field_name, other)))),
        };
        let index = struct_mode
            .and_then(|m| self.field_index(m, &field_name))
            .ok_or(Unwind::Error(RuntimeError::ValueError(format!("no field named {}", field_name))))?;
        if index >= fields.len() {
            return Err(Unwind::Error(RuntimeError::IndexOutOfBounds));
        }
        fields[index] = value.clone();
        let whole = StackValue::Struct(fields);
        match r.location {
            Location::Frame(frame) => self.set_frame_local(frame, r.offset, whole),
            Location::Heap(handle) => self.set_heap_local(handle, r.offset, whole)?,
            Location::Nil => unreachable!("checked above"),
        }
        Ok(value)
    }

    /// Clones a stowed value (`STRUCT`/`ROW`/`UNION`), allocating a fresh
    /// heap block for every `ROW` it finds along the way instead of
    /// sharing the source's, recursively, so nested rows don't end up
    /// aliased either.
    pub(super) fn deep_copy(&mut self, value: &StackValue) -> Eval {
        match value {
            StackValue::Struct(fields) => {
                let mut copied = Vec::with_capacity(fields.len());
                for f in fields {
                    copied.push(if f.is_stowed() { self.deep_copy(f)? } else { f.clone() });
                }
                Ok(StackValue::Struct(copied))
            }
            StackValue::Union(mode, inner) => {
                let copied = if inner.is_stowed() { self.deep_copy(inner)? } else { (**inner).clone() };
                Ok(StackValue::Union(*mode, Box::new(copied)))
            }
            StackValue::Row(desc) => {
                let Some(handle) = desc.elements else {
                    return Ok(StackValue::Row(desc.clone()));
                };
                let elements = match &self.heap.get(handle).value {
                    StackValue::Struct(elems) => elems.clone(),
                    other => vec![other.clone()],
                };
                let mut copied = Vec::with_capacity(elements.len());
                for e in elements {
                    copied.push(if e.is_stowed() { self.deep_copy(&e)? } else { e });
                }
                let size = std::mem::size_of::<StackValue>() * copied.len().max(1);
                let new_handle = self
                    .heap
                    .try_allocate(desc.elem_mode, StackValue::Struct(copied), size)
                    .map_err(|_| Unwind::Error(RuntimeError::HeapExhaustion))?;
                Ok(StackValue::Row(crate::value::ArrayDescriptor {
                    elements: Some(new_handle),
                    ..desc.clone()
                }))
            }
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::moid::{ModeTable, StandardKind};
    use crate::options::Options;
    use crate::symtab::SymbolTables;

    #[test]
    fn deep_copy_of_a_row_allocates_its_own_backing_block() {
        let arena = crate::node::NodeArena::new();
        let mut modes = ModeTable::new();
        let mut diags = Diagnostics::new();
        let symtab = SymbolTables::new();
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let opts = Options::default();
        let mut interp = Interpreter::new(&arena, &modes, &symtab, &opts);
        let desc = crate::gc::generator::generate_row(&mut interp.heap, &modes, int, &[(1, 2)]).unwrap();
        let original_handle = desc.elements.unwrap();
        let copy = interp.deep_copy(&StackValue::Row(desc)).unwrap();
        match copy {
            StackValue::Row(c) => assert_ne!(c.elements.unwrap(), original_handle),
            _ => panic!("expected a row"),
        }
    }
}
