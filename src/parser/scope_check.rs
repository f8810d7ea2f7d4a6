//! Scope checker: a name must not outlive the frame it was declared in.
//! Walks the tree computing, for every node that yields a `REF`-moded
//! value, the lexical level of the innermost scope that value's identifier
//! chain actually reaches; a yield whose scope is deeper than the context
//! it escapes into is flagged so the interpreter knows to install a
//! dynamic check at that point (`dns(result, current-fp)`; the static
//! half of that contract lives here).

use crate::diag::{Diagnostics, Severity};
use crate::moid::{ModeTable, MoidAttribute};
use crate::node::{Attribute, NodeArena, NodeId};
use crate::symtab::SymbolTables;

pub fn run(arena: &mut NodeArena, modes: &ModeTable, symtab: &SymbolTables, diags: &mut Diagnostics, root: NodeId) -> bool {
    let before = diags.error_count();
    check(arena, modes, symtab, diags, root, 0);
    !diags.should_skip_next_phase(before)
}

/// Returns the scope level this node's value is valid at: the level of the
/// identifier it names, for a REF-moded name; the block's own level for
/// anything generated fresh inside it; `u32::MAX` ("global"/no constraint)
/// when the mode isn't a reference at all.
fn check(arena: &mut NodeArena, modes: &ModeTable, symtab: &SymbolTables, diags: &mut Diagnostics, id: NodeId, enclosing_level: u32) -> u32 {
    let node = arena.get(id);
    let own_level = node.symbol_table.map(|t| symtab.table(t).level).unwrap_or(enclosing_level);
    let attribute = node.attribute;
    let mode = node.mode;

    let mut worst = u32::MAX;
    for child in arena.children(id).collect::<Vec<_>>() {
        let child_scope = check(arena, modes, symtab, diags, child, own_level);
        worst = worst.min(child_scope);
    }

    let scope = match attribute {
        Attribute::Identifier => {
            let node = arena.get(id);
            node.tag
                .map(|t| symtab.tag(t).level)
                .unwrap_or(own_level)
        }
        Attribute::LocGenerator => own_level,
        Attribute::HeapGenerator => 0,
        Attribute::Assignation | Attribute::Identity | Attribute::RoutineText => own_level,
        _ => worst,
    };

    if let Some(m) = mode {
        if modes.get(m).attribute == MoidAttribute::Ref && scope != u32::MAX && scope > enclosing_level {
            diags.error(
                Severity::Scope,
                Some(arena.get(id).span.clone()),
                "a name escapes the scope of the frame it was created in",
            );
        }
    }

    scope.min(worst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::SourceSpan;
    use crate::moid::{ModeTable, StandardKind};
    use crate::node::Node;

    #[test]
    fn identifier_at_its_own_level_is_fine() {
        let mut arena = NodeArena::new();
        let mut modes = ModeTable::new();
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let table = symtab.new_table(0, None);
        let tag = symtab.declare_identifier(table, "x").unwrap();
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let reference = modes.new_ref(int, None);
        symtab.tag_mut(tag).level = 0;
        symtab.tag_mut(tag).mode = Some(reference);
        let mut node = Node::new(Attribute::Identifier, SourceSpan::default());
        node.tag = Some(tag);
        node.mode = Some(reference);
        node.symbol_table = Some(table);
        let id = arena.alloc(node);
        assert!(run(&mut arena, &modes, &symtab, &mut diags, id));
    }
}
