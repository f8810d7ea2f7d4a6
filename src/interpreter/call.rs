//! `CALL` evaluation: user-defined `PROC` invocation (opening a frame whose
//! static link is the closure's own `environ`, not the caller's frame — the
//! usual Algol 68/ALGOL-style lexical-scope closure) and dispatch of the
//! handful of standard-environment primitives that have no `ROUTINE TEXT`
//! body (`Tag::stand_env_proc`), named in `parser::standenv::build`.

use std::io::Write as _;

use crate::interpreter::jump::{Eval, RuntimeError, Unwind};
use crate::interpreter::Interpreter;
use crate::node::{Attribute, NodeId};
use crate::runtime_api::dns;
use crate::value::{ProcValue, StackValue};

impl<'a> Interpreter<'a> {
    pub(super) fn eval_call(&mut self, id: NodeId) -> Eval {
        let mut children = self.arena.children(id);
        let callee = children.next().ok_or(Unwind::Error(RuntimeError::EmptyValue))?;
        let arg_nodes: Vec<NodeId> = children.collect();

        if let Some(name) = self.builtin_name(callee) {
            let mut args = Vec::with_capacity(arg_nodes.len());
            for a in &arg_nodes {
                args.push(self.eval(*a)?);
            }
            return self.call_builtin(&name, args);
        }

        let proc_value = self.eval(callee)?;
        let mut args = Vec::with_capacity(arg_nodes.len());
        for a in &arg_nodes {
            args.push(self.eval(*a)?);
        }
        match proc_value {
            StackValue::Proc(p) => invoke(self, p, args),
            other => Err(Unwind::Error(RuntimeError::ValueError(format!("called value is not a PROC ({:?})", other)))),
        }
    }

    /// `callee` names a standard-environment primitive directly (an
    /// `Identifier` node whose tag is `stand_env_proc`) rather than a
    /// user-defined `PROC` value — avoids evaluating it as a unit first
    /// since it has no frame binding to look up.
    fn builtin_name(&self, callee: NodeId) -> Option<String> {
        let node = self.arena.get(callee);
        if node.attribute != Attribute::Identifier {
            return None;
        }
        let tag = node.tag?;
        if self.symtab.tag(tag).stand_env_proc {
            self.symtab.tag(tag).name.clone()
        } else {
            None
        }
    }

    fn call_builtin(&mut self, name: &str, args: Vec<StackValue>) -> Eval {
        match name {
            "print" | "write" => {
                self.print_value(args.first().unwrap_or(&StackValue::Void));
                Ok(StackValue::Void)
            }
            "new line" => {
                println!();
                Ok(StackValue::Void)
            }
            "upb" => self.bound_of(args, true),
            "lwb" => self.bound_of(args, false),
            "rnd" => Ok(StackValue::Real(self.next_pseudo_random())),
            "read" => Err(Unwind::Error(RuntimeError::TransputError("read is not supported outside an interactive run".into()))),
            other => Err(Unwind::Error(RuntimeError::ValueError(format!("unknown standard-environment primitive {}", other)))),
        }
    }

    fn print_value(&self, value: &StackValue) {
        let mut out = std::io::stdout();
        let _ = write!(out, "{}", display(value));
        let _ = out.flush();
    }

    fn bound_of(&mut self, args: Vec<StackValue>, upper: bool) -> Eval {
        let value = args.into_iter().next().ok_or(Unwind::Error(RuntimeError::EmptyValue))?;
        let resolved = self.deref(&value)?;
        match resolved {
            StackValue::Row(desc) => {
                let tuple = desc.tuples.first().ok_or(Unwind::Error(RuntimeError::IndexOutOfBounds))?;
                Ok(StackValue::Int(if upper { tuple.upper } else { tuple.lower }))
            }
            _ => Err(Unwind::Error(RuntimeError::ValueError("upb/lwb applied to a non-row value".into()))),
        }
    }

    /// A simple linear-congruential sequence seeded from the heap's
    /// collection counter, not a cryptographic RNG — standard `rnd` in
    /// Algol 68 only promises a repeatable pseudo-random REAL in [0, 1).
    fn next_pseudo_random(&mut self) -> f64 {
        self.heap.collections = self.heap.collections.wrapping_mul(1103515245).wrapping_add(12345);
        ((self.heap.collections % 1_000_000) as f64) / 1_000_000.0
    }
}

fn display(value: &StackValue) -> String {
    match value {
        StackValue::Void => String::new(),
        StackValue::Int(i) => i.to_string(),
        StackValue::Real(r) => r.to_string(),
        StackValue::Bool(b) => if *b { "T".into() } else { "F".into() },
        StackValue::Char(c) => c.to_string(),
        StackValue::Bits(b) => format!("{:b}", b),
        StackValue::Ref(_) => "REF".into(),
        StackValue::Struct(fields) => fields.iter().map(display).collect::<Vec<_>>().join(", "),
        StackValue::Union(_, inner) => display(inner),
        StackValue::Row(_) => "ROW".into(),
        StackValue::Proc(_) => "PROC".into(),
    }
}

/// Invokes a `PROC` value (possibly already partially parametrised via a
/// `Locale`) with `args` supplying whichever formal slots are still empty,
/// left to right.
pub(super) fn invoke(interp: &mut Interpreter, proc: ProcValue, args: Vec<StackValue>) -> Eval {
    let Some(routine_text) = proc.body else {
        return Err(Unwind::Error(RuntimeError::ValueError("PROC value has no body to call".into())));
    };
    let mut filled: Vec<StackValue> = match &proc.locale {
        Some(locale) => locale.slots.iter().filter_map(|s| s.clone()).collect(),
        None => Vec::new(),
    };
    filled.extend(args);

    // The caller's own scope is the upper bound any REF
    // this call returns must respect (DNS(result-mode, current-fp)).
    let caller_scope = interp.current_scope();

    interp.push_frame(routine_text, proc.environ)?;
    let params = formal_tags(interp, proc.mode, routine_text);
    for (tag, value) in params.into_iter().zip(filled.into_iter()) {
        interp.declare(tag, value);
    }
    let body = interp.arena.get(routine_text).sub.unwrap_or(routine_text);
    let result = interp.eval(body);
    interp.pop_frame();
    match result {
        Ok(value) => {
            dns(&value, caller_scope)?;
            Ok(value)
        }
        Err(e) => Err(e),
    }
}

/// A `ROUTINE TEXT`'s formal parameters are never allocated as arena nodes
/// (`bottom_up.rs::parse_formal_parameter_pack` only builds the `PROC`
/// mode's `Pack` and declares each name's tag straight into the body's own
/// symbol table); this re-resolves each parameter's tag by name, in
/// declared order, against that table (recorded on the `RoutineText` node
/// itself — see the comment at its construction site).
fn formal_tags(interp: &Interpreter, proc_mode: crate::moid::MoidId, routine_text: NodeId) -> Vec<crate::symtab::TagId> {
    let Some(table) = interp.arena.get(routine_text).symbol_table else { return Vec::new() };
    let Some(pack) = interp.modes.get(proc_mode).pack.as_ref() else { return Vec::new() };
    pack.iter()
        .filter_map(|entry| entry.text.as_deref())
        .filter_map(|name| interp.symtab.lookup_identifier(table, name))
        .collect()
}
