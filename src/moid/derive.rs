//! Derived modes and attribute caches: `name`/`multiple`/`deflexed`/`trim`
//! and the `has_rows`/`has_ref`/`has_flex`/`well_formed` boolean caches.
//!
//! Each `*_of` function here memoizes into the corresponding [`Moid`] slot
//! and is safe to call repeatedly; [`run_fixed_point`] is what the parser
//! driver actually calls.

use std::collections::HashSet;

use crate::diag::Diagnostics;
use crate::moid::pack::{Pack, PackEntry};
use crate::moid::{ModeTable, MoidAttribute, MoidId};

/// "Name of" a REF'd STRUCT/ROW: given `REF STRUCT(...)`, build the
/// companion `STRUCT` of `REF`-to-field modes that field selection through
/// a name resolves against.
pub fn name_of(mt: &mut ModeTable, ref_struct: MoidId) -> MoidId {
    if let Some(cached) = mt.get(ref_struct).name {
        return cached;
    }
    let m = mt.get(ref_struct).clone();
    assert_eq!(m.attribute, MoidAttribute::Ref, "name_of expects a REF mode");
    let sub = mt.representative(m.sub.expect("REF always has a sub"));
    let sub_pack = mt
        .get(sub)
        .pack
        .clone()
        .expect("name_of expects REF <struct>");

    let mut new_pack = Pack::new();
    for entry in sub_pack.iter() {
        let refm = mt.new_ref(entry.moid, entry.node);
        new_pack.push(PackEntry::new(refm, entry.text.clone(), entry.node));
    }
    let result = mt.new_struct(new_pack, m.node);
    mt.get_mut(ref_struct).name = Some(result);
    result
}

/// "Multiple" of a ROW STRUCT: selecting a field from an array of structs
/// yields an array of that field; this builds the `STRUCT`-of-`ROW`-of-field
/// mode that selection checks against. FLEX variants are wrapped the same
/// way their source row was.
pub fn multiple_of(mt: &mut ModeTable, row_of_struct: MoidId) -> MoidId {
    if let Some(cached) = mt.get(row_of_struct).multiple {
        return cached;
    }
    let m = mt.get(row_of_struct).clone();
    assert!(
        matches!(m.attribute, MoidAttribute::Row | MoidAttribute::Flex),
        "multiple_of expects a ROW or FLEX mode"
    );
    let elem = mt.representative(m.sub.expect("ROW/FLEX always has a sub"));
    let elem_pack = mt
        .get(elem)
        .pack
        .clone()
        .expect("multiple_of expects an element mode that is a STRUCT");
    let dim = m.dim.max(1) as usize;

    let mut new_pack = Pack::new();
    for entry in elem_pack.iter() {
        let rowed = mt.new_row_chain(dim, entry.moid, entry.node);
        let wrapped = if m.attribute == MoidAttribute::Flex {
            mt.new_flex(rowed, entry.node)
        } else {
            rowed
        };
        new_pack.push(PackEntry::new(wrapped, entry.text.clone(), entry.node));
    }
    let result = mt.new_struct(new_pack, m.node);
    mt.get_mut(row_of_struct).multiple = Some(result);
    result
}

/// "Deflexed" of a mode: strips one FLEX layer. The guard write-before-
/// recurse (here, writing the cache before the recursive call could ever
/// revisit `id`) guards against cycles by pre-installing the target before
/// recursion.
pub fn deflexed_of(mt: &mut ModeTable, id: MoidId) -> MoidId {
    if let Some(cached) = mt.get(id).deflexed {
        return cached;
    }
    mt.get_mut(id).deflexed = Some(id); // guard against re-entrant cycles
    let target = match mt.get(id).attribute {
        MoidAttribute::Flex => mt.get(id).sub.expect("FLEX always has a sub"),
        _ => id,
    };
    mt.get_mut(id).deflexed = Some(target);
    target
}

/// "Trim" of a mode: lightweight deflexing at the top REF/FLEX layer only,
/// for trimmers (`a[1:3]`) which yield a slice without fully deflexing
/// nested modes.
pub fn trim_of(mt: &mut ModeTable, id: MoidId) -> MoidId {
    if let Some(cached) = mt.get(id).trim {
        return cached;
    }
    let result = match mt.get(id).attribute {
        MoidAttribute::Flex => mt.get(id).sub.expect("FLEX always has a sub"),
        MoidAttribute::Ref => {
            let sub = mt.get(id).sub.expect("REF always has a sub");
            if mt.get(sub).attribute == MoidAttribute::Flex {
                let inner = mt.get(sub).sub.expect("FLEX always has a sub");
                mt.new_ref(inner, mt.get(id).node)
            } else {
                id
            }
        }
        _ => id,
    };
    mt.get_mut(id).trim = Some(result);
    result
}

/// "Rowed" is the inverse of slice: a row of mode `m` has `slice.rowed =
/// m`. Scans every ROW mode and back-fills its slice's `rowed` pointer;
/// returns whether anything changed, so the fixed-point loop can tell when
/// to stop.
pub fn propagate_rowed(mt: &mut ModeTable) -> bool {
    let mut changed = false;
    for id in mt.ids().collect::<Vec<_>>() {
        if mt.get(id).attribute != MoidAttribute::Row {
            continue;
        }
        if let Some(slice) = mt.get(id).slice {
            if mt.get(slice).rowed.is_none() {
                mt.get_mut(slice).rowed = Some(id);
                changed = true;
            }
        }
    }
    changed
}

/// `has_rows`: does assigning a value of this mode require the structured
/// (deep) copy path on assignment? True for ROW/FLEX themselves, and for
/// STRUCT/UNION that contain one — but a REF or PROC is a value in its own
/// right (copying the pointer, not the referent) so recursion stops there.
pub fn has_rows_of(mt: &mut ModeTable, id: MoidId) -> bool {
    if let Some(cached) = mt.get(id).has_rows {
        return cached;
    }
    let rep = mt.representative(id);
    let result = match mt.get(rep).attribute {
        MoidAttribute::Row | MoidAttribute::Flex => true,
        MoidAttribute::Struct | MoidAttribute::Union => {
            let pack = mt.get(rep).pack.clone().unwrap_or_default();
            pack.iter().any(|e| has_rows_of(mt, e.moid))
        }
        _ => false,
    };
    mt.get_mut(id).has_rows = Some(result);
    if id != rep {
        mt.get_mut(rep).has_rows = Some(result);
    }
    result
}

/// `has_ref`: does this mode contain a REF anywhere in its immediate
/// (non-dereferenced) structure?
pub fn has_ref_of(mt: &mut ModeTable, id: MoidId) -> bool {
    if let Some(cached) = mt.get(id).has_ref {
        return cached;
    }
    let rep = mt.representative(id);
    let result = match mt.get(rep).attribute {
        MoidAttribute::Ref => true,
        MoidAttribute::Row | MoidAttribute::Flex => {
            has_ref_of(mt, mt.get(rep).sub.expect("ROW/FLEX always has a sub"))
        }
        MoidAttribute::Struct | MoidAttribute::Union => {
            let pack = mt.get(rep).pack.clone().unwrap_or_default();
            pack.iter().any(|e| has_ref_of(mt, e.moid))
        }
        _ => false,
    };
    mt.get_mut(id).has_ref = Some(result);
    if id != rep {
        mt.get_mut(rep).has_ref = Some(result);
    }
    result
}

/// `has_flex`: does this mode contain a FLEX anywhere in its immediate
/// structure?
pub fn has_flex_of(mt: &mut ModeTable, id: MoidId) -> bool {
    if let Some(cached) = mt.get(id).has_flex {
        return cached;
    }
    let rep = mt.representative(id);
    let result = match mt.get(rep).attribute {
        MoidAttribute::Flex => true,
        MoidAttribute::Ref => has_flex_of(mt, mt.get(rep).sub.expect("REF always has a sub")),
        MoidAttribute::Struct | MoidAttribute::Union => {
            let pack = mt.get(rep).pack.clone().unwrap_or_default();
            pack.iter().any(|e| has_flex_of(mt, e.moid))
        }
        _ => false,
    };
    mt.get_mut(id).has_flex = Some(result);
    if id != rep {
        mt.get_mut(rep).has_flex = Some(result);
    }
    result
}

/// "Yin-yang" well-formedness: every cycle in a mode's expansion must
/// contain both a REF/PROC ("yin") breaker and a STRUCT/UNION ("yang")
/// breaker.
pub fn well_formed_of(mt: &mut ModeTable, id: MoidId) -> bool {
    if let Some(cached) = mt.get(id).well_formed {
        return cached;
    }
    let mut visiting = HashSet::new();
    let result = wf_walk(mt, id, false, false, &mut visiting);
    mt.get_mut(id).well_formed = Some(result);
    result
}

fn wf_walk(mt: &ModeTable, id: MoidId, yin: bool, yang: bool, visiting: &mut HashSet<MoidId>) -> bool {
    let rep = mt.representative(id);
    if visiting.contains(&rep) {
        // Back to a mode already on this path: this is a cycle. It is
        // well-formed only if both breakers were crossed to get here.
        return yin && yang;
    }
    visiting.insert(rep);
    let m = mt.get(rep);
    let result = match m.attribute {
        MoidAttribute::Ref => wf_walk(mt, m.sub.expect("REF always has a sub"), true, yang, visiting),
        MoidAttribute::Proc => {
            let params_ok = m
                .pack
                .clone()
                .map(|p| p.iter().all(|e| wf_walk(mt, e.moid, yin, yang, visiting)))
                .unwrap_or(true);
            params_ok && wf_walk(mt, m.sub.expect("PROC always has a result"), true, yang, visiting)
        }
        MoidAttribute::Struct | MoidAttribute::Union => m
            .pack
            .clone()
            .map(|p| p.iter().all(|e| wf_walk(mt, e.moid, yin, true, visiting)))
            .unwrap_or(true),
        MoidAttribute::Flex | MoidAttribute::Row => {
            wf_walk(mt, m.sub.expect("FLEX/ROW always has a sub"), yin, yang, visiting)
        }
        _ => true,
    };
    visiting.remove(&rep);
    result
}

/// Cyclic declaration check: starting at an INDICANT, follow its
/// definition chain; a cycle that never crosses a REF/PROC/STRUCT/UNION
/// (and in particular one that reaches VOID) is rejected.
pub fn check_cyclic_declaration(mt: &ModeTable, diags: &mut Diagnostics, start: MoidId) -> bool {
    let mut seen = HashSet::new();
    let mut cur = start;
    loop {
        if !seen.insert(cur) {
            diags.error(
                crate::diag::Severity::Syntax,
                None,
                "mode is cyclically defined without crossing a REF, PROC, STRUCT or UNION",
            );
            return false;
        }
        match mt.get(cur).attribute {
            MoidAttribute::Indicant => match mt.get(cur).equivalent {
                Some(next) => cur = next,
                None => return true, // undefined indicant is reported elsewhere
            },
            MoidAttribute::Void => {
                diags.error(
                    crate::diag::Severity::Syntax,
                    None,
                    "mode reduces to VOID through a chain of INDICANTs with no breaker",
                );
                return false;
            }
            _ => return true,
        }
    }
}

/// Runs until a pass produces zero modifications, but at least twice;
/// bounded by a hard cap so a mistake in the propagation rules can't spin
/// forever.
pub const MIN_PASSES: u32 = 2;
pub const MAX_PASSES: u32 = 32;

pub fn run_fixed_point(mt: &mut ModeTable) {
    let mut pass = 0;
    loop {
        let mut changed = propagate_rowed(mt);
        for id in mt.ids().collect::<Vec<_>>() {
            let before = (
                mt.get(id).has_rows,
                mt.get(id).has_ref,
                mt.get(id).has_flex,
                mt.get(id).well_formed,
            );
            let _ = has_rows_of(mt, id);
            let _ = has_ref_of(mt, id);
            let _ = has_flex_of(mt, id);
            let _ = well_formed_of(mt, id);
            let after = (
                mt.get(id).has_rows,
                mt.get(id).has_ref,
                mt.get(id).has_flex,
                mt.get(id).well_formed,
            );
            changed |= before != after;
        }
        pass += 1;
        if pass >= MIN_PASSES && (!changed || pass >= MAX_PASSES) {
            break;
        }
    }
}

/// The union-pack "absorb" step (`MOID(t) = MOID(t)`) looks like a no-op
/// that likely meant to strip a redundant wrapping layer in whatever
/// reference implementation first defined it. Kept as a literal no-op here
/// rather than guessed at.
pub fn absorb_union_pack(pack: Pack) -> Pack {
    pack
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::moid::pack::PackEntry;
    use crate::moid::StandardKind;

    #[test]
    fn name_of_wraps_each_field_in_ref() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let mut pack = Pack::new();
        pack.push(PackEntry::new(int, Some("x".into()), None));
        let s = mt.new_struct(pack, None);
        let refs = mt.new_ref(s, None);

        let named = name_of(&mut mt, refs);
        let named_pack = mt.get(named).pack.clone().unwrap();
        assert_eq!(named_pack.len(), 1);
        let field = &named_pack.0[0];
        assert_eq!(field.text.as_deref(), Some("x"));
        assert_eq!(mt.get(field.moid).attribute, MoidAttribute::Ref);
        assert_eq!(mt.get(field.moid).sub, Some(int));
    }

    #[test]
    fn deflexed_strips_exactly_one_flex_layer() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let ch = mt.standard_mode(StandardKind::Char, 0, &mut diags, None);
        let row = mt.new_row_chain(1, ch, None);
        let flex = mt.new_flex(row, None);
        assert_eq!(deflexed_of(&mut mt, flex), row);
        assert_eq!(deflexed_of(&mut mt, row), row);
    }

    #[test]
    fn self_recursive_struct_via_ref_is_well_formed() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let indicant = mt.new_indicant("NODE", None);
        let refnode = mt.new_ref(indicant, None);
        let mut pack = Pack::new();
        pack.push(PackEntry::new(int, Some("v".into()), None));
        pack.push(PackEntry::new(refnode, Some("next".into()), None));
        let s = mt.new_struct(pack, None);
        mt.get_mut(indicant).equivalent = Some(s);

        assert!(well_formed_of(&mut mt, s));
    }

    #[test]
    fn direct_self_reference_without_breaker_is_not_well_formed() {
        // MODE A = STRUCT(A x) with no REF in between never actually
        // type-checks as a declarer (STRUCT fields are plain declarers,
        // so this can't arise from `STRUCT (A x)` directly — but a
        // pathological indicant chain that aliases straight back to
        // itself is exactly the VOID-reaching cycle the cyclic-declaration
        // check (not well-formedness) is meant to catch.
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let a = mt.new_indicant("A", None);
        mt.get_mut(a).equivalent = Some(a);
        assert!(!check_cyclic_declaration(&mt, &mut diags, a));
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn has_rows_stops_at_ref_boundary() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let row = mt.new_row_chain(1, int, None);
        let refrow = mt.new_ref(row, None);
        assert!(has_rows_of(&mut mt, row));
        assert!(!has_rows_of(&mut mt, refrow), "a REF does not itself have_rows");
    }
}
