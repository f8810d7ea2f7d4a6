//! Parser phase 4: rearranges label/goto jumps for simpler evaluation.
//!
//! Walks the tree once, recording every `Label` tag's enclosing symbol
//! table as it's declared and, for every `Goto`/`GotoSymbol` node, resolving
//! which table its target label lives in and registering the label on that
//! table's `jump_to` list so the interpreter knows to reserve a jump-buffer
//! slot for it when it opens that frame.

use crate::diag::{Diagnostics, Severity};
use crate::node::{Attribute, NodeArena, NodeId};
use crate::symtab::SymbolTables;

pub fn run(arena: &NodeArena, symtab: &mut SymbolTables, diags: &mut Diagnostics, root: NodeId) -> bool {
    let before = diags.error_count();
    walk(arena, symtab, diags, root);
    !diags.should_skip_next_phase(before)
}

fn walk(arena: &NodeArena, symtab: &mut SymbolTables, diags: &mut Diagnostics, id: NodeId) {
    let node = arena.get(id);
    if matches!(node.attribute, Attribute::Goto | Attribute::GotoSymbol) {
        let label_name = node.symbol.clone();
        let table = node.symbol_table;
        if let (Some(name), Some(table)) = (label_name, table) {
            match symtab.lookup_label(table, &name) {
                Some(tag) => {
                    let declaring_level = symtab.tag(tag).level;
                    register_jump_target(symtab, table, declaring_level, tag);
                }
                None => {
                    diags.error(
                        Severity::Syntax,
                        Some(node.span.clone()),
                        format!("label {} is never declared", name),
                    );
                }
            }
        }
    }
    for child in arena.children(id) {
        walk(arena, symtab, diags, child);
    }
}

/// Walks outward from `from` until it reaches the table at `declaring_level`
/// (the label's own table) and records `tag` there, so every frame between
/// the goto and the label knows it must leave an escape point open.
fn register_jump_target(symtab: &mut SymbolTables, from: crate::symtab::SymbolTableId, declaring_level: u32, tag: crate::symtab::TagId) {
    let mut cur = Some(from);
    while let Some(table_id) = cur {
        let table = symtab.table_mut(table_id);
        if !table.jump_to.contains(&tag) {
            table.jump_to.push(tag);
        }
        if symtab.table(table_id).level <= declaring_level {
            break;
        }
        cur = symtab.table(table_id).previous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::SourceSpan;
    use crate::node::Node;

    #[test]
    fn goto_to_known_label_registers_jump_to() {
        let mut arena = NodeArena::new();
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let table = symtab.new_table(0, None);
        let label = symtab.declare_label(table, "done").unwrap();
        let mut node = Node::new(Attribute::Goto, SourceSpan::default());
        node.symbol = Some("done".to_string());
        node.symbol_table = Some(table);
        let id = arena.alloc(node);
        assert!(run(&arena, &mut symtab, &mut diags, id));
        assert!(symtab.table(table).jump_to.contains(&label));
    }

    #[test]
    fn goto_to_unknown_label_is_a_syntax_error() {
        let mut arena = NodeArena::new();
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let table = symtab.new_table(0, None);
        let mut node = Node::new(Attribute::Goto, SourceSpan::default());
        node.symbol = Some("ghost".to_string());
        node.symbol_table = Some(table);
        let id = arena.alloc(node);
        assert!(!run(&arena, &mut symtab, &mut diags, id));
    }
}
