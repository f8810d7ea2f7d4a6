//! Coinductive mode equivalence over possibly-cyclic mode graphs, e.g.
//! mutually-recursive STRUCT definitions.

use crate::moid::pack::Pack;
use crate::moid::postulate::Postulates;
use crate::moid::{ModeTable, MoidAttribute, MoidId};

/// Is `a` equivalent to `b`? Assumes `a ≡ b` while checking their
/// components, so that two mutually-recursive mode declarations (e.g.
/// `MODE A = STRUCT(REF B b); MODE B = STRUCT(REF A a)`, shown equal to a
/// differently-named but structurally identical pair) don't recurse
/// forever — the assumption is what lets the coinduction terminate.
pub fn equivalent(mt: &ModeTable, postulates: &mut Postulates, a: MoidId, b: MoidId) -> bool {
    let a = mt.representative(a);
    let b = mt.representative(b);
    if a == b {
        return true;
    }
    if postulates.contains(a, b) {
        return true;
    }
    let ma = mt.get(a);
    let mb = mt.get(b);
    if std::mem::discriminant(&ma.attribute) != std::mem::discriminant(&mb.attribute) {
        return false;
    }
    let _assumption = postulates.assume(a, b);
    match (ma.attribute, mb.attribute) {
        (MoidAttribute::Void, MoidAttribute::Void) => true,
        (MoidAttribute::Format, MoidAttribute::Format) => true,
        (MoidAttribute::Standard(ka), MoidAttribute::Standard(kb)) => ka == kb && ma.dim == mb.dim,
        (MoidAttribute::Ref, MoidAttribute::Ref) | (MoidAttribute::Flex, MoidAttribute::Flex) => {
            equivalent(mt, postulates, ma.sub.unwrap(), mb.sub.unwrap())
        }
        (MoidAttribute::Row, MoidAttribute::Row) => {
            ma.dim == mb.dim && equivalent(mt, postulates, ma.sub.unwrap(), mb.sub.unwrap())
        }
        (MoidAttribute::Struct, MoidAttribute::Struct) => {
            struct_packs_equivalent(mt, postulates, ma.pack.as_ref(), mb.pack.as_ref())
        }
        (MoidAttribute::Union, MoidAttribute::Union) => {
            union_packs_equivalent(mt, postulates, ma.pack.as_ref(), mb.pack.as_ref())
        }
        (MoidAttribute::Proc, MoidAttribute::Proc) => {
            proc_equivalent(mt, postulates, ma, mb)
        }
        // Two distinct, still-unresolved INDICANTs (or two SERIES) are not
        // equivalent: indicants must already have been folded onto their
        // defining mode by `bind_indicants_to_modes_tree` before this is
        // reachable with useful results.
        _ => false,
    }
}

fn struct_packs_equivalent(
    mt: &ModeTable,
    postulates: &mut Postulates,
    a: Option<&Pack>,
    b: Option<&Pack>,
) -> bool {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        (None, None) => return true,
        _ => return false,
    };
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(ea, eb)| {
        ea.text == eb.text && equivalent(mt, postulates, ea.moid, eb.moid)
    })
}

/// UNION member order is insignificant: `UNION(INT, REAL)` and
/// `UNION(REAL, INT)` are the same mode.
fn union_packs_equivalent(
    mt: &ModeTable,
    postulates: &mut Postulates,
    a: Option<&Pack>,
    b: Option<&Pack>,
) -> bool {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        (None, None) => return true,
        _ => return false,
    };
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    for ea in a.iter() {
        let found = b.iter().enumerate().position(|(i, eb)| {
            !used[i] && equivalent(mt, postulates, ea.moid, eb.moid)
        });
        match found {
            Some(i) => used[i] = true,
            None => return false,
        }
    }
    true
}

fn proc_equivalent(mt: &ModeTable, postulates: &mut Postulates, ma: &crate::moid::Moid, mb: &crate::moid::Moid) -> bool {
    if !equivalent(mt, postulates, ma.sub.unwrap(), mb.sub.unwrap()) {
        return false;
    }
    match (&ma.pack, &mb.pack) {
        (Some(pa), Some(pb)) => {
            pa.len() == pb.len()
                && pa.iter().zip(pb.iter()).all(|(a, b)| equivalent(mt, postulates, a.moid, b.moid))
        }
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::moid::pack::PackEntry;
    use crate::moid::StandardKind;

    #[test]
    fn equivalence_is_reflexive_and_transitive_on_standard_modes() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let mut postulates = Postulates::new();
        let a = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);
        assert!(equivalent(&mt, &mut postulates, a, a));
    }

    #[test]
    fn mutually_recursive_structs_are_equivalent() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);

        // MODE A = STRUCT(INT v, REF A next); built twice under different
        // "names" (here, just two separate Moid allocations) — a stand-in
        // for two source-level indicants whose bodies are structurally
        // identical.
        let a_id = {
            let placeholder = mt.new_indicant("A1", None);
            let refa = mt.new_ref(placeholder, None);
            let mut pack = Pack::new();
            pack.push(PackEntry::new(int, Some("v".into()), None));
            pack.push(PackEntry::new(refa, Some("next".into()), None));
            let s = mt.new_struct(pack, None);
            mt.get_mut(placeholder).equivalent = Some(s);
            s
        };
        let b_id = {
            let placeholder = mt.new_indicant("A2", None);
            let refb = mt.new_ref(placeholder, None);
            let mut pack = Pack::new();
            pack.push(PackEntry::new(int, Some("v".into()), None));
            pack.push(PackEntry::new(refb, Some("next".into()), None));
            let s = mt.new_struct(pack, None);
            mt.get_mut(placeholder).equivalent = Some(s);
            s
        };

        let mut postulates = Postulates::new();
        assert!(equivalent(&mt, &mut postulates, a_id, b_id));
        assert_eq!(postulates.depth(), 0, "postulates must unwind after proof");
    }

    #[test]
    fn union_member_order_does_not_matter() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let real = mt.standard_mode(StandardKind::Real, 0, &mut diags, None);

        let mut p1 = Pack::new();
        p1.push(PackEntry::new(int, None, None));
        p1.push(PackEntry::new(real, None, None));
        let u1 = mt.new_union(p1, None);

        let mut p2 = Pack::new();
        p2.push(PackEntry::new(real, None, None));
        p2.push(PackEntry::new(int, None, None));
        let u2 = mt.new_union(p2, None);

        let mut postulates = Postulates::new();
        assert!(equivalent(&mt, &mut postulates, u1, u2));
    }

    #[test]
    fn structs_with_different_field_names_are_not_equivalent() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let mut p1 = Pack::new();
        p1.push(PackEntry::new(int, Some("x".into()), None));
        let s1 = mt.new_struct(p1, None);
        let mut p2 = Pack::new();
        p2.push(PackEntry::new(int, Some("y".into()), None));
        let s2 = mt.new_struct(p2, None);
        let mut postulates = Postulates::new();
        assert!(!equivalent(&mt, &mut postulates, s1, s2));
    }
}
