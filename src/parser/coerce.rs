//! Coercion inserter: wraps a unit's node in a synthetic
//! `Dereferencing`/`Widening`/`Rowing`/`Uniting`/`Deproceduring`/
//! `Voiding` node wherever the mode the context requires differs from the
//! mode the mode checker already assigned, reconciling the two without
//! re-running mode checking.
//!
//! Runs after [`super::mode_check`], which must have already set `.mode` on
//! every node this pass touches.

use crate::diag::{Diagnostics, Severity};
use crate::moid::{ModeTable, MoidAttribute, MoidId, StandardKind};
use crate::node::{Attribute, Node, NodeArena, NodeId};

/// The one automatic, context-independent coercion rule that applies
/// everywhere without knowing the enclosing expression's required mode:
/// every statement in a serial clause except the last is evaluated only for
/// effect and must be voided. Runs as its own driver phase, ahead of any
/// context-specific coercion a later caller (the interpreter's call/assign
/// machinery) inserts on demand via [`coerce_to`].
pub fn run(arena: &mut NodeArena, modes: &ModeTable, diags: &mut Diagnostics, root: NodeId) {
    void_non_final_statements(arena, modes, diags, root);
}

fn void_non_final_statements(arena: &mut NodeArena, modes: &ModeTable, diags: &mut Diagnostics, id: NodeId) {
    let attribute = arena.get(id).attribute;
    let children: Vec<NodeId> = arena.children(id).collect();

    if attribute == Attribute::Series && children.len() > 1 {
        let void = modes.void();
        for &child in &children[..children.len() - 1] {
            coerce_to(arena, modes, diags, child, void);
        }
    }

    for child in children {
        void_non_final_statements(arena, modes, diags, child);
    }
}

/// Wraps `unit` in a coercion node so that its mode becomes `target`,
/// inserting the node as `unit`'s replacement in its parent's child chain.
/// Returns the coercion node (or `unit` unchanged if no coercion is
/// needed).
pub fn coerce_to(arena: &mut NodeArena, modes: &ModeTable, diags: &mut Diagnostics, unit: NodeId, target: MoidId) -> NodeId {
    let Some(from) = arena.get(unit).mode else {
        return unit;
    };
    if from == target {
        return unit;
    }

    if target == modes.void() {
        return wrap(arena, Attribute::Voiding, unit, target);
    }

    let from_moid = modes.get(from);
    if from_moid.attribute == MoidAttribute::Ref && from_moid.sub == Some(target) {
        return wrap(arena, Attribute::Dereferencing, unit, target);
    }

    if from_moid.attribute == MoidAttribute::Proc
        && from_moid.pack.as_ref().map_or(true, |p| p.is_empty())
        && from_moid.sub == Some(target)
    {
        return wrap(arena, Attribute::Deproceduring, unit, target);
    }

    if is_widening(modes, from, target) {
        return wrap(arena, Attribute::Widening, unit, target);
    }

    let target_moid = modes.get(target);
    if target_moid.attribute == MoidAttribute::Union {
        if let Some(pack) = &target_moid.pack {
            if pack.iter().any(|entry| entry.moid == from) {
                return wrap(arena, Attribute::Uniting, unit, target);
            }
        }
    }

    if target_moid.attribute == MoidAttribute::Row && target_moid.sub == Some(from) {
        return wrap(arena, Attribute::Rowing, unit, target);
    }

    diags.error(
        Severity::Mode,
        Some(arena.get(unit).span.clone()),
        "cannot coerce to the mode required here",
    );
    unit
}

fn wrap(arena: &mut NodeArena, attribute: Attribute, unit: NodeId, mode: MoidId) -> NodeId {
    let span = arena.get(unit).span.clone();
    let parent = arena.get(unit).parent;
    let next = arena.get(unit).next;
    let mut node = Node::new(attribute, span);
    node.mode = Some(mode);
    node.parent = parent;
    node.next = next;
    node.sub = Some(unit);
    let wrapped = arena.alloc(node);
    arena.get_mut(unit).parent = Some(wrapped);
    arena.get_mut(unit).next = None;
    if let Some(p) = parent {
        if arena.get(p).sub == Some(unit) {
            arena.get_mut(p).sub = Some(wrapped);
        } else {
            let mut cur = arena.get(p).sub;
            while let Some(c) = cur {
                if arena.get(c).next == Some(unit) {
                    arena.get_mut(c).next = Some(wrapped);
                    break;
                }
                cur = arena.get(c).next;
            }
        }
    }
    wrapped
}

/// INT→REAL and similar standard-mode widenings. Sizety (LONG/SHORT count)
/// is carried in `Moid::dim` for `Standard` modes.
fn is_widening(modes: &ModeTable, from: MoidId, to: MoidId) -> bool {
    let (MoidAttribute::Standard(a), MoidAttribute::Standard(b)) = (modes.get(from).attribute, modes.get(to).attribute) else {
        return false;
    };
    let sizety_ok = modes.get(from).dim <= modes.get(to).dim;
    match (a, b) {
        (StandardKind::Int, StandardKind::Real) => true,
        (StandardKind::Int, StandardKind::Complex) => true,
        (StandardKind::Real, StandardKind::Complex) => true,
        (StandardKind::Bits, StandardKind::Int) => true,
        (StandardKind::Int, StandardKind::Int) | (StandardKind::Real, StandardKind::Real) => sizety_ok && modes.get(from).dim != modes.get(to).dim,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::SourceSpan;

    #[test]
    fn unchanged_mode_needs_no_wrapper() {
        let mut arena = NodeArena::new();
        let mut modes = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let mut node = Node::new(Attribute::IntDenotation, SourceSpan::default());
        node.mode = Some(int);
        let id = arena.alloc(node);
        let out = coerce_to(&mut arena, &modes, &mut diags, id, int);
        assert_eq!(out, id);
    }

    #[test]
    fn voiding_wraps_the_unit() {
        let mut arena = NodeArena::new();
        let mut modes = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let void = modes.void();
        let mut node = Node::new(Attribute::IntDenotation, SourceSpan::default());
        node.mode = Some(int);
        let id = arena.alloc(node);
        let out = coerce_to(&mut arena, &modes, &mut diags, id, void);
        assert_ne!(out, id);
        assert_eq!(arena.get(out).attribute, Attribute::Voiding);
        assert_eq!(arena.get(id).parent, Some(out));
    }

    #[test]
    fn int_widens_to_real() {
        let mut modes = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let real = modes.standard_mode(StandardKind::Real, 0, &mut diags, None);
        assert!(is_widening(&modes, int, real));
    }
}
