//! Post-parse mode-table finishing: resolves every INDICANT left as a bare
//! placeholder during parsing against its declared body, runs the
//! fixed-point derivation pass, and rejects cyclic or ill-formed mode
//! declarations before the checker phases trust the mode graph.

use crate::diag::{Diagnostics, Severity};
use crate::moid::derive::{check_cyclic_declaration, run_fixed_point, well_formed_of};
use crate::moid::ModeTable;
use crate::symtab::{SymbolTables, TagKind};

/// Walks every INDICANT tag declared anywhere and checks that its mode
/// resolved to something other than itself (an undeclared `MODE` name), then
/// runs the derivation fixed point over the whole table.
pub fn run(modes: &mut ModeTable, symtab: &SymbolTables, diags: &mut Diagnostics) -> bool {
    let before = diags.error_count();
    for id in symtab.tag_ids() {
        let tag = symtab.tag(id);
        if tag.kind != TagKind::Indicant {
            continue;
        }
        let Some(mode) = tag.mode else { continue };
        if modes.get(mode).equivalent.is_none() && modes.get(mode).name_for.is_some() {
            diags.error(
                Severity::Mode,
                None,
                format!("mode {} is never declared", tag.name.clone().unwrap_or_default()),
            );
            continue;
        }
        check_cyclic_declaration(modes, diags, mode);
    }

    run_fixed_point(modes);

    for id in modes.ids() {
        if !well_formed_of(modes, id) {
            diags.error(Severity::Mode, None, "mode is not well-formed (missing REF/PROC or STRUCT/UNION breaker in a cycle)");
        }
    }

    !diags.should_skip_next_phase(before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moid::StandardKind;

    #[test]
    fn undeclared_indicant_is_an_error() {
        let mut modes = ModeTable::new();
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let table = symtab.new_table(0, None);
        let placeholder = modes.new_indicant("GHOST", None);
        let tag = symtab.declare_indicant(table, "GHOST").unwrap();
        symtab.tag_mut(tag).mode = Some(placeholder);
        assert!(!run(&mut modes, &symtab, &mut diags));
        assert!(diags.error_count() >= 1);
    }

    #[test]
    fn declared_indicant_passes() {
        let mut modes = ModeTable::new();
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let table = symtab.new_table(0, None);
        let int = modes.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let placeholder = modes.new_indicant("MYINT", None);
        modes.get_mut(placeholder).equivalent = Some(int);
        let tag = symtab.declare_indicant(table, "MYINT").unwrap();
        symtab.tag_mut(tag).mode = Some(placeholder);
        assert!(run(&mut modes, &symtab, &mut diags));
    }
}
