//! Runtime coercions: executes the synthetic `Voiding`/`Dereferencing`/
//! `Widening`/`Rowing`/`Uniting`/`Deproceduring`/`Proceduring` nodes
//! [`crate::parser::coerce`] wrapped around a unit, turning the inner
//! value into whatever the wrapper's own `.mode` promised.

use crate::interpreter::jump::{Eval, RuntimeError, Unwind};
use crate::interpreter::Interpreter;
use crate::value::{ArrayDescriptor, DimTuple, Location, StackValue};

impl<'a> Interpreter<'a> {
    /// `inner` is the already-evaluated value of the coercion node's single
    /// child; `node` is the coercion node itself, read for its target mode.
    pub(super) fn apply_coercion(&mut self, node: crate::node::NodeId, inner: StackValue) -> Eval {
        use crate::node::Attribute::*;
        match self.arena.get(node).attribute {
            Voiding => Ok(StackValue::Void),
            Dereferencing => self.deref(&inner),
            Widening => Ok(widen(inner)),
            Deproceduring => match inner {
                StackValue::Proc(p) if p.locale.is_none() => self.call_niladic(p),
                other => Ok(other),
            },
            Proceduring => Ok(StackValue::Proc(crate::value::ProcValue {
                mode: self.arena.get(node).mode.unwrap_or(self.modes.void()),
                body: None,
                environ: None,
                locale: None,
            })),
            Rowing => {
                let target = self.arena.get(node).mode.unwrap_or(self.modes.void());
                self.row_up(target, inner)
            }
            Uniting => {
                let mode = self.arena.get(node).mode.unwrap_or(self.modes.void());
                Ok(StackValue::Union(mode, Box::new(inner)))
            }
            _ => Ok(inner),
        }
    }

    /// Loads through a `REF`, checking non-NIL first.
    pub(super) fn deref(&mut self, value: &StackValue) -> Eval {
        let r = match value {
            StackValue::Ref(r) => r,
            other => return Ok(other.clone()),
        };
        if r.is_nil() {
            return Err(Unwind::Error(RuntimeError::NilDereference));
        }
        match r.location {
            Location::Heap(handle) => self.heap_local(handle, r.offset),
            Location::Frame(frame) => self.frame_local(frame, r.offset),
            Location::Nil => unreachable!("checked above"),
        }
    }

    /// Rowing: wraps a scalar in a one-element, `1:1`-bounded row. The
    /// element block is a genuine heap allocation so the result is
    /// indistinguishable from one built by
    /// [`crate::gc::generator::generate_row`].
    fn row_up(&mut self, target: crate::moid::MoidId, value: StackValue) -> Eval {
        if matches!(value, StackValue::Row(_)) {
            return Ok(value);
        }
        let elem_mode = self.modes.get(target).sub.unwrap_or(target);
        let size = std::mem::size_of::<StackValue>();
        let handle = self
            .heap
            .try_allocate(elem_mode, StackValue::Struct(vec![value]), size)
            .map_err(|_| Unwind::Error(RuntimeError::HeapExhaustion))?;
        Ok(StackValue::Row(ArrayDescriptor {
            elem_mode,
            slice_offset: 0,
            field_offset: 0,
            elements: Some(handle),
            tuples: vec![DimTuple {
                lower: 1,
                upper: 1,
                shift: 1,
                span: 1,
            }],
        }))
    }
}

fn widen(value: StackValue) -> StackValue {
    match value {
        StackValue::Int(i) => StackValue::Real(i as f64),
        StackValue::Bits(b) => StackValue::Int(b as i64),
        other => other,
    }
}
