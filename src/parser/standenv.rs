//! Standard-environment builder: installs the predefined modes and tags
//! that every program sees at level 0 without declaring them — `INT`,
//! `REAL`, the arithmetic/relational/boolean operators, and the small set
//! of transput primitives (`print`, `read`, `upb`, `lwb`, `new line`).

use crate::diag::Diagnostics;
use crate::moid::{ModeTable, MoidId, StandardKind};
use crate::symtab::{SymbolTableId, SymbolTables};

/// Handles into the standard environment that later phases need by name
/// rather than by re-deriving them: the built-in modes, and the tags of
/// the primitives the interpreter dispatches directly by `Tag::stand_env_proc`.
pub struct StandEnv {
    pub table: SymbolTableId,
    pub int: MoidId,
    pub real: MoidId,
    pub bool_: MoidId,
    pub char_: MoidId,
    pub bits: MoidId,
    pub bytes: MoidId,
    pub string: MoidId,
    pub void: MoidId,
}

/// Dyadic operator priorities, loosest (1) to tightest (9). Matches the
/// customary Algol 68 table closely enough for programs that don't declare
/// their own `PRIO`.
const DYADIC_OPERATORS: &[(&str, u8)] = &[
    ("OR", 1),
    ("AND", 2),
    ("=", 3),
    ("/=", 3),
    ("<", 3),
    ("<=", 3),
    (">", 3),
    (">=", 3),
    ("+", 6),
    ("-", 6),
    ("*", 7),
    ("/", 7),
    ("MOD", 7),
    ("OVER", 7),
    ("**", 8),
];

const MONADIC_OPERATORS: &[&str] = &["-", "+", "NOT", "ABS", "SIGN", "ODD"];

pub fn build(modes: &mut ModeTable, symtab: &mut SymbolTables, _diags: &mut Diagnostics) -> StandEnv {
    let table = symtab.new_table(0, None);
    let mut d = Diagnostics::new();
    let int = modes.standard_mode(StandardKind::Int, 0, &mut d, None);
    let real = modes.standard_mode(StandardKind::Real, 0, &mut d, None);
    let bool_ = modes.standard_mode(StandardKind::Bool, 0, &mut d, None);
    let char_ = modes.standard_mode(StandardKind::Char, 0, &mut d, None);
    let bits = modes.standard_mode(StandardKind::Bits, 0, &mut d, None);
    let bytes = modes.standard_mode(StandardKind::Bytes, 0, &mut d, None);
    let string = modes.standard_mode(StandardKind::String, 0, &mut d, None);
    let void = modes.void();

    for &(name, prio) in DYADIC_OPERATORS {
        let tag = symtab.declare_operator(table, name);
        symtab.tag_mut(tag).priority = Some(prio);
        symtab.tag_mut(tag).stand_env_proc = true;
    }
    for &name in MONADIC_OPERATORS {
        let tag = symtab.declare_operator(table, name);
        symtab.tag_mut(tag).stand_env_proc = true;
    }

    for name in ["print", "write", "read", "new line", "upb", "lwb", "rnd"] {
        let tag = symtab
            .declare_identifier(table, name)
            .unwrap_or_else(|existing| existing);
        symtab.tag_mut(tag).stand_env_proc = true;
    }

    StandEnv {
        table,
        int,
        real,
        bool_,
        char_,
        bits,
        bytes,
        string,
        void,
    }
}

/// Looks up the declared priority of a standard-environment operator by
/// name, used by the parser before any user `PRIO` declaration has been
/// seen.
pub fn default_priority(symtab: &SymbolTables, table: SymbolTableId, name: &str) -> Option<u8> {
    symtab
        .lookup_operators(table, name)
        .into_iter()
        .filter_map(|t| symtab.tag(t).priority)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_modes_are_distinct() {
        let mut modes = ModeTable::new();
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let env = build(&mut modes, &mut symtab, &mut diags);
        assert_ne!(env.int, env.real);
        assert_ne!(env.bool_, env.char_);
    }

    #[test]
    fn plus_and_times_have_distinct_priorities() {
        let mut modes = ModeTable::new();
        let mut symtab = SymbolTables::new();
        let mut diags = Diagnostics::new();
        let env = build(&mut modes, &mut symtab, &mut diags);
        let plus = default_priority(&symtab, env.table, "+").unwrap();
        let times = default_priority(&symtab, env.table, "*").unwrap();
        assert!(times > plus);
    }
}
