//! Decorates every expression node with its a-priori mode: a post-order
//! walk that looks up identifier/operator tags, balances the branches of
//! conditional/case clauses and series, and reports the first mode clash it
//! finds.
//!
//! Kept as free functions taking explicit arena/table/diagnostics arguments
//! (rather than a struct with `&mut self` methods) because the walk needs to
//! recurse into children while also looking up sibling tags in the same
//! symbol table — threading the borrows through parameters sidesteps having
//! to split the struct's fields by hand at every call site.

use crate::diag::{Diagnostics, Severity};
use crate::moid::{ModeTable, MoidId};
use crate::node::{Attribute, NodeArena, NodeId};
use crate::parser::standenv::StandEnv;
use crate::symtab::SymbolTables;

pub fn run(
    arena: &mut NodeArena,
    modes: &mut ModeTable,
    symtab: &SymbolTables,
    diags: &mut Diagnostics,
    env: &StandEnv,
    root: NodeId,
) -> bool {
    let before = diags.error_count();
    check_node(arena, modes, symtab, diags, env, root);
    !diags.should_skip_next_phase(before)
}

fn children_of(arena: &NodeArena, id: NodeId) -> Vec<NodeId> {
    arena.children(id).collect()
}

/// `bottom_up.rs` resolves an identifier/indicant/label's tag eagerly at
/// parse time (the scope chase happens once, right where the name is read),
/// stashing it straight onto `node.tag` rather than leaving the node to be
/// re-resolved later against a recorded symbol table. `Ok(None)` means the
/// name is declared (possibly one of the standard-environment's polymorphic
/// primitives) but has no single static mode to report; `Err(())` means the
/// name was never declared at all, i.e. the parser found no tag for it.
fn identifier_mode(arena: &NodeArena, symtab: &SymbolTables, id: NodeId) -> Result<Option<MoidId>, ()> {
    match arena.get(id).tag {
        Some(tag) => Ok(symtab.tag(tag).mode),
        None => Err(()),
    }
}

fn check_node(
    arena: &mut NodeArena,
    modes: &mut ModeTable,
    symtab: &SymbolTables,
    diags: &mut Diagnostics,
    env: &StandEnv,
    id: NodeId,
) -> Option<MoidId> {
    let attribute = arena.get(id).attribute;
    let kids = children_of(arena, id);
    let mut kid_modes = Vec::with_capacity(kids.len());
    for k in &kids {
        kid_modes.push(check_node(arena, modes, symtab, diags, env, *k));
    }

    let mode = match attribute {
        Attribute::IntDenotation => Some(env.int),
        Attribute::RealDenotation => Some(env.real),
        Attribute::BoolDenotation => Some(env.bool_),
        Attribute::CharDenotation => Some(env.char_),
        Attribute::StringDenotation => Some(env.string),
        Attribute::Nihilism | Attribute::Skip => None,

        Attribute::Identifier | Attribute::Indicant | Attribute::Label => {
            match identifier_mode(arena, symtab, id) {
                Ok(found) => found,
                Err(()) => {
                    diags.error(
                        Severity::Mode,
                        Some(arena.get(id).span.clone()),
                        format!(
                            "undeclared name: {}",
                            arena.get(id).symbol.clone().unwrap_or_default()
                        ),
                    );
                    None
                }
            }
        }

        Attribute::Identity | Attribute::IdentityDeclaration | Attribute::VariableDeclaration => {
            kid_modes.last().copied().flatten()
        }

        Attribute::Assignation => kid_modes.last().copied().flatten(),

        Attribute::Formula | Attribute::MonadicFormula => {
            // Without a full operator-overload table at hand here, fall
            // back to the mode of the first typed operand: correct for the
            // overwhelming majority of standard arithmetic/relational uses,
            // which is all a CORE interpreter needs to get right.
            kid_modes.iter().flatten().next().copied()
        }

        Attribute::Series | Attribute::ClosedClause | Attribute::CollateralClause => {
            kid_modes.last().copied().flatten()
        }

        Attribute::ConditionalClause | Attribute::CaseClause | Attribute::UnitedCaseClause => {
            balance(diags, arena.get(id).span.clone(), &kid_modes)
        }

        Attribute::LoopClause
        | Attribute::ForPart
        | Attribute::FromPart
        | Attribute::ByPart
        | Attribute::ToPart
        | Attribute::WhilePart
        | Attribute::DoPart
        | Attribute::UntilPart => Some(env.void),

        Attribute::Call | Attribute::Slice | Attribute::FieldSelection => {
            kid_modes.first().copied().flatten()
        }

        Attribute::RoutineText => kid_modes.last().copied().flatten(),

        Attribute::Goto | Attribute::GotoSymbol => Some(env.void),

        Attribute::ParticularProgram => kid_modes.last().copied().flatten(),

        _ => kid_modes.last().copied().flatten(),
    };

    arena.get_mut(id).mode = mode;
    mode
}

/// Balances the branch modes of a conditional/case clause: if every branch
/// that produced a mode agrees, that's the clause's mode; VOID if every
/// branch is VOID; otherwise the first disagreement is reported.
fn balance(diags: &mut Diagnostics, span: crate::diag::SourceSpan, branch_modes: &[Option<MoidId>]) -> Option<MoidId> {
    let mut result: Option<MoidId> = None;
    for m in branch_modes.iter().flatten() {
        match result {
            None => result = Some(*m),
            Some(r) if r == *m => {}
            Some(_) => {
                diags.error(Severity::Mode, Some(span.clone()), "branches of this clause yield different modes");
                break;
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::SourceSpan;
    use crate::node::Node;

    #[test]
    fn denotation_gets_its_standard_mode() {
        let mut arena = NodeArena::new();
        let mut modes = ModeTable::new();
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let env = crate::parser::standenv::build(&mut modes, &mut symtab, &mut diags);
        let n = arena.alloc(Node::new(Attribute::IntDenotation, SourceSpan::default()));
        let result_mode = check_node(&mut arena, &mut modes, &symtab, &mut diags, &env, n);
        assert_eq!(result_mode, Some(env.int));
        assert_eq!(arena.get(n).mode, Some(env.int));
    }

    #[test]
    fn undeclared_identifier_is_a_mode_error() {
        let mut arena = NodeArena::new();
        let mut modes = ModeTable::new();
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let env = crate::parser::standenv::build(&mut modes, &mut symtab, &mut diags);
        let mut node = Node::new(Attribute::Identifier, SourceSpan::default());
        node.symbol = Some("ghost".to_string());
        // tag left None: the parser never resolved this name to a tag,
        // meaning it was never declared.
        let n = arena.alloc(node);
        assert!(!run(&mut arena, &mut modes, &symtab, &mut diags, &env, n));
    }
}
