//! `ConditionalClause`/`CaseClause`/`LoopClause` evaluation.
//!
//! `bottom_up.rs::parse_conditional`/`parse_case`/`parse_loop` build these
//! with a fixed, predictable child shape (see each function's own comment
//! below for the exact layout), so no separate "unpack this clause" pass is
//! needed before evaluating it.
//!
//! `CaseClause` and `UnitedCaseClause` share one evaluator: the selector is
//! read as a plain `INT` index into the `IN` branches. A true conformity
//! relation (picking the branch whose declared mode matches a `UNION`
//! selector's active member) isn't modelled — the same kind of simplification
//! as `formula.rs` not carrying a user-operator overload table.

use crate::interpreter::jump::{Eval, RuntimeError, Unwind};
use crate::interpreter::Interpreter;
use crate::node::{Attribute, NodeId};
use crate::value::{Location, StackValue};

impl<'a> Interpreter<'a> {
    /// Children: `[condition, then-branch, tail?]`, where `tail` is either a
    /// nested `ConditionalClause` (an `ELIF`, recursed into directly) or a
    /// plain `ELSE` branch.
    pub(super) fn eval_conditional(&mut self, id: NodeId) -> Eval {
        let children: Vec<NodeId> = self.arena.children(id).collect();
        let cond = *children.first().ok_or(Unwind::Error(RuntimeError::EmptyValue))?;
        let then_branch = *children.get(1).ok_or(Unwind::Error(RuntimeError::EmptyValue))?;

        let test = self.eval(cond)?;
        let taken = match test {
            StackValue::Bool(b) => b,
            other => return Err(Unwind::Error(RuntimeError::ValueError(format!("IF condition is not a BOOL ({:?})", other)))),
        };
        if taken {
            return self.eval(then_branch);
        }
        match children.get(2) {
            Some(&tail) if self.arena.get(tail).attribute == Attribute::ConditionalClause => self.eval_conditional(tail),
            Some(&tail) => self.eval(tail),
            None => Ok(StackValue::Void),
        }
    }

    /// Children: `[selector, InCasePart, InCasePart, ..., OutCasePart?]`.
    pub(super) fn eval_case(&mut self, id: NodeId) -> Eval {
        let children: Vec<NodeId> = self.arena.children(id).collect();
        let selector = *children.first().ok_or(Unwind::Error(RuntimeError::EmptyValue))?;
        let raw = self.eval(selector)?;
        let resolved = self.deref(&raw)?;
        let index = match resolved {
            StackValue::Int(i) => i,
            other => return Err(Unwind::Error(RuntimeError::ValueError(format!("CASE selector is not an INT ({:?})", other)))),
        };

        let mut branch_num = 0i64;
        let mut out_branch = None;
        for child in &children[1..] {
            let node = self.arena.get(*child);
            match node.attribute {
                Attribute::InCasePart => {
                    branch_num += 1;
                    if branch_num == index {
                        return self.eval(node.sub.unwrap_or(*child));
                    }
                }
                Attribute::OutCasePart => out_branch = Some(node.sub.unwrap_or(*child)),
                _ => {}
            }
        }
        match out_branch {
            Some(b) => self.eval(b),
            None => Ok(StackValue::Void),
        }
    }

    /// Children, each optional except `DoPart`: `ForPart`, `FromPart`,
    /// `ByPart`, `ToPart`, `WhilePart`, `DoPart`, `UntilPart` — present in
    /// that order whenever the loop text used the corresponding keyword
    /// (`parse_loop`). There is no per-iteration frame: the `FOR` tag, if
    /// any, is declared once before the loop starts and its slot is
    /// overwritten directly each iteration, consistent with every other
    /// declaration in this interpreter living in the enclosing call's one
    /// frame rather than a fresh block-scoped activation record.
    pub(super) fn eval_loop(&mut self, id: NodeId) -> Eval {
        let mut for_tag = None;
        let mut from_node = None;
        let mut by_node = None;
        let mut to_node = None;
        let mut while_node = None;
        let mut do_node = None;
        let mut until_node = None;
        for child in self.arena.children(id) {
            let node = self.arena.get(child);
            match node.attribute {
                Attribute::ForPart => for_tag = node.tag,
                Attribute::FromPart => from_node = node.sub,
                Attribute::ByPart => by_node = node.sub,
                Attribute::ToPart => to_node = node.sub,
                Attribute::WhilePart => while_node = node.sub,
                Attribute::DoPart => do_node = node.sub,
                Attribute::UntilPart => until_node = node.sub,
                _ => {}
            }
        }

        let from = match from_node {
            Some(n) => self.int_of(n)?,
            None => 1,
        };
        let by = match by_node {
            Some(n) => self.int_of(n)?,
            None => 1,
        };
        let to = match to_node {
            Some(n) => Some(self.int_of(n)?),
            None => None,
        };

        let bounded = for_tag.is_some() || to.is_some() || while_node.is_some() || until_node.is_some();
        let mut counter = from;
        let binding = for_tag.map(|tag| self.declare(tag, StackValue::Int(counter)));

        let mut result = StackValue::Void;
        loop {
            if let Some(limit) = to {
                let finished = if by >= 0 { counter > limit } else { counter < limit };
                if finished {
                    break;
                }
            }
            if let Some(r) = binding {
                if let Location::Frame(frame) = r.location {
                    self.set_frame_local(frame, r.offset, StackValue::Int(counter));
                }
            }
            if let Some(wn) = while_node {
                if self.eval(wn)? != StackValue::Bool(true) {
                    break;
                }
            }
            if let Some(body) = do_node {
                result = self.eval(body)?;
            }
            if let Some(un) = until_node {
                if self.eval(un)? == StackValue::Bool(true) {
                    break;
                }
            }
            if !bounded {
                break;
            }
            counter += by;
        }
        Ok(result)
    }

    fn int_of(&mut self, id: NodeId) -> Result<i64, Unwind> {
        let v = self.eval(id)?;
        v.as_int().ok_or(Unwind::Error(RuntimeError::ValueError("loop bound is not an INT".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::SourceSpan;
    use crate::moid::ModeTable;
    use crate::node::{Node, NodeArena};
    use crate::options::Options;
    use crate::symtab::SymbolTables;

    fn fresh<'a>(arena: &'a NodeArena, modes: &'a ModeTable, symtab: &'a SymbolTables, opts: &'a Options) -> Interpreter<'a> {
        Interpreter::new(arena, modes, symtab, opts)
    }

    #[test]
    fn conditional_takes_the_then_branch_when_true() {
        let mut arena = NodeArena::new();
        let modes = ModeTable::new();
        let symtab = SymbolTables::new();
        let opts = Options::default();
        let span = SourceSpan::default();
        let cond = arena.alloc(Node::new(Attribute::BoolDenotation, span.clone()).with_symbol("true"));
        let then_branch = arena.alloc(Node::new(Attribute::IntDenotation, span.clone()).with_symbol("1"));
        let else_branch = arena.alloc(Node::new(Attribute::IntDenotation, span.clone()).with_symbol("2"));
        let id = arena.alloc(Node::new(Attribute::ConditionalClause, span));
        arena.append_child(id, cond);
        arena.append_child(id, then_branch);
        arena.append_child(id, else_branch);
        let mut interp = fresh(&arena, &modes, &symtab, &opts);
        interp.push_frame(id, None).unwrap();
        assert_eq!(interp.eval(id), Ok(StackValue::Int(1)));
    }

    #[test]
    fn bare_do_od_runs_exactly_once() {
        let mut arena = NodeArena::new();
        let modes = ModeTable::new();
        let symtab = SymbolTables::new();
        let opts = Options::default();
        let span = SourceSpan::default();
        let body = arena.alloc(Node::new(Attribute::IntDenotation, span.clone()).with_symbol("9"));
        let do_part = arena.alloc(Node::new(Attribute::DoPart, span.clone()));
        arena.append_child(do_part, body);
        let id = arena.alloc(Node::new(Attribute::LoopClause, span));
        arena.append_child(id, do_part);
        let mut interp = fresh(&arena, &modes, &symtab, &opts);
        interp.push_frame(id, None).unwrap();
        assert_eq!(interp.eval(id), Ok(StackValue::Int(9)));
    }
}
