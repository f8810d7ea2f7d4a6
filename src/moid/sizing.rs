//! Mode sizing: how many bytes a value of a given mode would occupy.

use crate::moid::{ModeTable, MoidAttribute, MoidId, StandardKind};

/// Size of a REF, PROC, or FORMAT value — always a single handle/pointer
/// regardless of what it points at.
pub const POINTER_SIZE: usize = 8;

/// Per-dimension bookkeeping cost of an inline (non-REF) ROW/FLEX value's
/// descriptor: one `DimTuple` plus its share of the fixed descriptor header.
const DESCRIPTOR_BASE_SIZE: usize = 16;
const TUPLE_SIZE: usize = 32;

fn standard_size(kind: StandardKind, sizety: i64) -> usize {
    let scale = |base: usize| -> usize {
        match sizety {
            i if i <= 0 => base,
            1 => base * 2,
            _ => base * 4,
        }
    };
    match kind {
        StandardKind::Int => scale(4),
        StandardKind::Real => scale(8),
        StandardKind::Bool => 1,
        StandardKind::Char => 1,
        StandardKind::Bits => scale(4),
        StandardKind::Bytes => scale(32),
        StandardKind::Complex => scale(8) * 2,
        // STRING is a name (FLEX ROW CHAR) in all contexts that matter for
        // sizing: it is always accessed through a REF.
        StandardKind::String => POINTER_SIZE,
    }
}

/// `size(mode)`: chases `equivalent` first, then sizes by attribute.
/// Memoized into `Moid::size`.
pub fn size_of(mt: &mut ModeTable, id: MoidId) -> usize {
    let rep = mt.representative(id);
    if let Some(cached) = mt.get(rep).size {
        mt.get_mut(id).size = Some(cached);
        return cached;
    }
    let m = mt.get(rep).clone();
    let size = match m.attribute {
        MoidAttribute::Void => 0,
        MoidAttribute::Standard(kind) => standard_size(kind, m.dim),
        MoidAttribute::Format | MoidAttribute::Ref | MoidAttribute::Proc => POINTER_SIZE,
        MoidAttribute::Row | MoidAttribute::Flex => {
            let dim = m.dim.max(1) as usize;
            DESCRIPTOR_BASE_SIZE + dim * TUPLE_SIZE + POINTER_SIZE
        }
        MoidAttribute::Struct => m
            .pack
            .as_ref()
            .map(|p| p.iter().map(|e| size_of(mt, e.moid)).sum())
            .unwrap_or(0),
        MoidAttribute::Union => {
            // discriminator (a mode id, pointer-sized) + the widest member.
            let max_member = m
                .pack
                .as_ref()
                .and_then(|p| p.iter().map(|e| size_of(mt, e.moid)).max())
                .unwrap_or(0);
            POINTER_SIZE + max_member
        }
        MoidAttribute::Indicant | MoidAttribute::Series => {
            // Should have been resolved via `equivalent` before sizing is
            // requested; size as a pointer rather than ABEND; the mode
            // checker is responsible for rejecting genuinely unresolved
            // indicants before this is reached.
            POINTER_SIZE
        }
    };
    mt.get_mut(rep).size = Some(size);
    mt.get_mut(id).size = Some(size);
    size
}

/// SIMPLOUT reserves `sizeof discriminator + max uniting payload`. `modes`
/// is the set of modes found united into a SIMPLOUT-shaped argument list —
/// in this crate, the standard-environment `print`/`read` argument modes
/// collected while building the standard environment.
pub fn max_simplout_size(mt: &mut ModeTable, modes: &[MoidId]) -> usize {
    let max_member = modes.iter().map(|&m| size_of(mt, m)).max().unwrap_or(0);
    POINTER_SIZE + max_member
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::moid::pack::{Pack, PackEntry};

    #[test]
    fn struct_size_sums_fields() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let bool_ = mt.standard_mode(StandardKind::Bool, 0, &mut diags, None);
        let mut pack = Pack::new();
        pack.push(PackEntry::new(int, Some("a".into()), None));
        pack.push(PackEntry::new(bool_, Some("b".into()), None));
        let s = mt.new_struct(pack, None);
        assert_eq!(size_of(&mut mt, s), standard_size(StandardKind::Int, 0) + 1);
    }

    #[test]
    fn union_size_is_discriminator_plus_widest_member() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let long_real = mt.standard_mode(StandardKind::Real, 1, &mut diags, None);
        let mut pack = Pack::new();
        pack.push(PackEntry::new(int, None, None));
        pack.push(PackEntry::new(long_real, None, None));
        let u = mt.new_union(pack, None);
        let expected = POINTER_SIZE + standard_size(StandardKind::Real, 1);
        assert_eq!(size_of(&mut mt, u), expected);
    }

    #[test]
    fn ref_is_always_pointer_sized_regardless_of_target() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let int = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let row = mt.new_row_chain(5, int, None);
        let refrow = mt.new_ref(row, None);
        assert_eq!(size_of(&mut mt, refrow), POINTER_SIZE);
    }

    #[test]
    fn void_has_zero_size() {
        let mut mt = ModeTable::new();
        let v = mt.void();
        assert_eq!(size_of(&mut mt, v), 0);
    }
}
