//! `Slice` and `FieldSelection` evaluation: the former indexes a `ROW`'s
//! element block (always heap-allocated, regardless of where the
//! descriptor itself lives — frame slot or heap), the latter picks a named
//! field out of a `STRUCT` value by position in its mode's pack.
//!
//! `bottom_up.rs::parse_secondary` builds a `Slice` node with the sliced
//! operand as its first child and one index unit per dimension after it;
//! a `FieldSelection` node carries the field's name as its own `.symbol`
//! and has the selected-from operand as its single child. Neither node
//! ever gets a `Trimmer` child (this parser has no array-trimming syntax),
//! so every slice here is a single-element index, never a sub-array.

use crate::interpreter::jump::{Eval, RuntimeError, Unwind};
use crate::interpreter::Interpreter;
use crate::moid::MoidId;
use crate::node::NodeId;
use crate::runtime_api::subscript;
use crate::value::{A68Ref, Location, StackValue};

impl<'a> Interpreter<'a> {
    pub(super) fn eval_slice(&mut self, id: NodeId) -> Eval {
        let mut children = self.arena.children(id);
        let operand = children.next().ok_or(Unwind::Error(RuntimeError::EmptyValue))?;
        let index_nodes: Vec<NodeId> = children.collect();

        let mut indices = Vec::with_capacity(index_nodes.len());
        for n in &index_nodes {
            let v = self.eval(*n)?;
            let i = v.as_int().ok_or(Unwind::Error(RuntimeError::ValueError("subscript is not an INT".into())))?;
            indices.push(i);
        }

        let base = self.eval(operand)?;
        match base {
            StackValue::Ref(r) => {
                let desc = match self.deref(&StackValue::Ref(r))? {
                    StackValue::Row(desc) => desc,
                    other => return Err(Unwind::Error(RuntimeError::ValueError(format!("slice of a non-ROW value ({:?})", other)))),
                };
                let flat = subscript(&desc, &indices)?;
                let handle = desc.elements.ok_or(Unwind::Error(RuntimeError::IndexOutOfBounds))?;
                Ok(StackValue::Ref(A68Ref { location: Location::Heap(handle), offset: flat as usize, scope: r.scope }))
            }
            StackValue::Row(desc) => {
                let flat = subscript(&desc, &indices)?;
                let handle = desc.elements.ok_or(Unwind::Error(RuntimeError::IndexOutOfBounds))?;
                self.heap_local(handle, flat as usize)
            }
            other => Err(Unwind::Error(RuntimeError::ValueError(format!("value is not sliceable ({:?})", other)))),
        }
    }

    pub(super) fn eval_field_selection(&mut self, id: NodeId) -> Eval {
        let node = self.arena.get(id);
        let field_name = node.symbol.clone().unwrap_or_default();
        let operand = self.only_child(id);
        let struct_mode = self.arena.get(operand).mode;
        let base = self.eval(operand)?;
        let resolved = self.deref(&base)?;
        match resolved {
            StackValue::Struct(fields) => {
                let index = struct_mode
                    .and_then(|m| self.field_index(m, &field_name))
                    .ok_or(Unwind::Error(RuntimeError::ValueError(format!("no field named {}", field_name))))?;
                fields
                    .get(index)
                    .cloned()
                    .ok_or(Unwind::Error(RuntimeError::IndexOutOfBounds))
            }
            other => Err(Unwind::Error(RuntimeError::ValueError(format!("{} of a non-STRUCT value ({:?})", field_name, other)))),
        }
    }

    /// Position of `name` in `mode`'s pack, in declaration order — the
    /// same order `StackValue::Struct`'s fields are built in
    /// (`gc::generator::default_value`'s `Struct` arm, `eval_collateral`).
    pub(super) fn field_index(&self, mode: MoidId, name: &str) -> Option<usize> {
        self.modes.get(mode).pack.as_ref()?.iter().position(|e| e.text.as_deref() == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::moid::ModeTable;
    use crate::options::Options;
    use crate::symtab::SymbolTables;

    #[test]
    fn slicing_a_row_reads_the_right_element() {
        let arena = crate::node::NodeArena::new();
        let mut modes = ModeTable::new();
        let mut diags = Diagnostics::new();
        let symtab = SymbolTables::new();
        let int = modes.standard_mode(crate::moid::StandardKind::Int, 0, &mut diags, None);
        let opts = Options::default();
        let mut interp = Interpreter::new(&arena, &modes, &symtab, &opts);
        let desc = crate::gc::generator::generate_row(&mut interp.heap, &modes, int, &[(1, 3)]).unwrap();
        let handle = desc.elements.unwrap();
        interp.heap.get_mut(handle).value = StackValue::Struct(vec![StackValue::Int(10), StackValue::Int(20), StackValue::Int(30)]);
        let flat = desc.flat_index(&[2]).unwrap();
        assert_eq!(interp.heap_local(handle, flat as usize), Ok(StackValue::Int(20)));
    }
}
