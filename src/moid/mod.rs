//! The mode table and equivalencer.
//!
//! A [`Moid`] is one node of the mode DAG, addressed by [`MoidId`]. Modes are
//! built once per declarer occurrence by [`ModeTable::mode_from_declarer`]
//! and then folded together by [`equivalence`]; after folding, every client
//! slot should be read through [`ModeTable::representative`] rather than the
//! raw id a tree node happened to record.

pub mod derive;
pub mod equivalence;
pub mod pack;
pub mod postulate;
pub mod sizing;

use fnv::FnvHashMap;

use crate::diag::{Diagnostics, SourceSpan};
use crate::node::NodeId;
use pack::Pack;
use postulate::Postulates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoidId(pub u32);

/// Sizety: a signed count of LONG (+1 each) / SHORT (−1 each) tokens
/// preceding a standard indicant.
pub type Sizety = i8;

/// The minimum and maximum sizety this implementation supports. Outside this
/// range, [`ModeTable::standard_mode`] clamps to the nearest supported
/// precision and schedules a warning rather than silently clamping.
pub const MIN_SIZETY: Sizety = -1;
pub const MAX_SIZETY: Sizety = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardKind {
    Int,
    Real,
    Bool,
    Char,
    Bits,
    Bytes,
    Complex,
    /// `STRING` is standard-environment shorthand for `FLEX [1:0] CHAR`,
    /// but is also independently nameable as a standard mode — treated as
    /// a primitive indicant for lookup purposes rather than purely derived.
    String,
}

/// The shape a [`Moid`] takes: what kind of mode it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoidAttribute {
    Void,
    Standard(StandardKind),
    Format,
    Ref,
    Flex,
    Row,
    Proc,
    Struct,
    Union,
    Indicant,
    /// A balance-context series of alternative modes not yet unified to a
    /// single mode (used transiently by the mode checker).
    Series,
}

/// One node of the mode DAG.
#[derive(Debug, Clone)]
pub struct Moid {
    pub attribute: MoidAttribute,
    /// Row dimension for ROW/FLEX-of-ROW; sizety for STANDARD.
    pub dim: i64,
    pub sub: Option<MoidId>,
    pub pack: Option<Pack>,
    pub node: Option<NodeId>,
    pub name_for: Option<String>,

    // Derived-mode caches, all populated lazily by `derive`.
    pub equivalent: Option<MoidId>,
    pub slice: Option<MoidId>,
    pub deflexed: Option<MoidId>,
    pub name: Option<MoidId>,
    pub multiple: Option<MoidId>,
    pub trim: Option<MoidId>,
    pub rowed: Option<MoidId>,

    // Attribute caches.
    pub has_rows: Option<bool>,
    pub has_ref: Option<bool>,
    pub has_flex: Option<bool>,
    pub well_formed: Option<bool>,
    pub size: Option<usize>,
}

impl Moid {
    fn new(attribute: MoidAttribute) -> Self {
        Moid {
            attribute,
            dim: 0,
            sub: None,
            pack: None,
            node: None,
            name_for: None,
            equivalent: None,
            slice: None,
            deflexed: None,
            name: None,
            multiple: None,
            trim: None,
            rowed: None,
            has_rows: None,
            has_ref: None,
            has_flex: None,
            well_formed: None,
            size: None,
        }
    }
}

/// Owns every [`Moid`] for one run: a plain `Vec`-indexed arena addressed
/// by [`MoidId`], rather than an arena of borrowed references, so later
/// phases can mutate one mode's derived-cache slots while other modes are
/// still being read.
#[derive(Debug, Default)]
pub struct ModeTable {
    moids: Vec<Moid>,
    standard_cache: FnvHashMap<(StandardKind, Sizety), MoidId>,
    void_id: Option<MoidId>,
    format_id: Option<MoidId>,
    indicant_names: FnvHashMap<String, MoidId>,
}

impl ModeTable {
    pub fn new() -> Self {
        let mut mt = ModeTable::default();
        mt.void_id = Some(mt.alloc(Moid::new(MoidAttribute::Void)));
        mt
    }

    fn alloc(&mut self, moid: Moid) -> MoidId {
        let id = MoidId(self.moids.len() as u32);
        self.moids.push(moid);
        id
    }

    pub fn get(&self, id: MoidId) -> &Moid {
        &self.moids[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: MoidId) -> &mut Moid {
        &mut self.moids[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.moids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moids.is_empty()
    }

    pub fn void(&self) -> MoidId {
        self.void_id.expect("ModeTable::new always installs VOID")
    }

    /// Chase `equivalent` links to find the canonical representative for
    /// `id`. A no-op once the mode graph has reached its fixed point.
    pub fn representative(&self, mut id: MoidId) -> MoidId {
        let mut guard = 0;
        while let Some(next) = self.get(id).equivalent {
            id = next;
            guard += 1;
            if guard > self.moids.len() + 1 {
                // A cycle in `equivalent` itself would be an equivalencer
                // bug, not a user error: ABEND rather than loop forever.
                crate::diag::abend("cycle detected while chasing mode equivalence");
            }
        }
        id
    }

    /// Intern (or fetch) the standard mode at the given sizety, clamping and
    /// warning if out of range.
    pub fn standard_mode(&mut self, kind: StandardKind, sizety: Sizety, diags: &mut Diagnostics, span: Option<SourceSpan>) -> MoidId {
        let clamped = sizety.clamp(MIN_SIZETY, MAX_SIZETY);
        if clamped != sizety {
            diags.warn(
                span,
                format!(
                    "precision {} unavailable for this mode, using {} instead",
                    sizety, clamped
                ),
            );
        }
        if let Some(id) = self.standard_cache.get(&(kind, clamped)) {
            return *id;
        }
        let mut m = Moid::new(MoidAttribute::Standard(kind));
        m.dim = clamped as i64;
        let id = self.alloc(m);
        self.standard_cache.insert((kind, clamped), id);
        id
    }

    pub fn format_mode(&mut self) -> MoidId {
        if let Some(id) = self.format_id {
            return id;
        }
        let id = self.alloc(Moid::new(MoidAttribute::Format));
        self.format_id = Some(id);
        id
    }

    pub fn new_ref(&mut self, sub: MoidId, node: Option<NodeId>) -> MoidId {
        let mut m = Moid::new(MoidAttribute::Ref);
        m.sub = Some(sub);
        m.node = node;
        self.alloc(m)
    }

    pub fn new_flex(&mut self, sub: MoidId, node: Option<NodeId>) -> MoidId {
        let mut m = Moid::new(MoidAttribute::Flex);
        m.sub = Some(sub);
        m.node = node;
        let id = self.alloc(m);
        // A FLEX's own slice is its sub's slice-of.
        let sub_slice = self.get(sub).slice;
        self.get_mut(id).slice = sub_slice.or(Some(sub));
        id
    }

    /// Build a row-of chain `dim` deep with leaf element `elem` — one ROW
    /// per bound in a `[...]` declarer, depth equal to 1 plus the count of
    /// commas. Returns the outermost ROW mode; each level's `slice` points
    /// one level in.
    pub fn new_row_chain(&mut self, dim: usize, elem: MoidId, node: Option<NodeId>) -> MoidId {
        assert!(dim >= 1, "a row chain always has at least one dimension");
        let mut cur = elem;
        for _ in 0..dim {
            let mut m = Moid::new(MoidAttribute::Row);
            m.sub = Some(elem);
            m.node = node;
            m.dim = 0; // filled below once we know final depth
            let id = self.alloc(m);
            self.get_mut(id).slice = Some(cur);
            cur = id;
        }
        // Walk back down assigning each level its true dim (outermost =
        // `dim`, decreasing by one per `slice` hop) — cheap since chains
        // are always shallow in practice.
        let mut d = dim as i64;
        let mut node_id = cur;
        loop {
            self.get_mut(node_id).dim = d;
            match self.get(node_id).slice {
                Some(s) if self.get(s).attribute == MoidAttribute::Row => {
                    d -= 1;
                    node_id = s;
                }
                _ => break,
            }
        }
        cur
    }

    pub fn new_struct(&mut self, pack: Pack, node: Option<NodeId>) -> MoidId {
        let mut m = Moid::new(MoidAttribute::Struct);
        m.pack = Some(pack);
        m.node = node;
        self.alloc(m)
    }

    pub fn new_union(&mut self, pack: Pack, node: Option<NodeId>) -> MoidId {
        let mut m = Moid::new(MoidAttribute::Union);
        m.pack = Some(pack);
        m.node = node;
        self.alloc(m)
    }

    pub fn new_proc(&mut self, params: Pack, result: MoidId, node: Option<NodeId>) -> MoidId {
        let mut m = Moid::new(MoidAttribute::Proc);
        m.pack = Some(params);
        m.sub = Some(result);
        m.node = node;
        self.alloc(m)
    }

    /// Create a fresh, as-yet-undefined INDICANT mode, as a `MODE X = ...`
    /// declaration installs into the current symbol table. The indicant's
    /// name is recorded so `bind_indicants_to_modes_tree` can later
    /// resolve it.
    pub fn new_indicant(&mut self, name: &str, node: Option<NodeId>) -> MoidId {
        if let Some(id) = self.indicant_names.get(name) {
            return *id;
        }
        let mut m = Moid::new(MoidAttribute::Indicant);
        m.name_for = Some(name.to_string());
        m.node = node;
        let id = self.alloc(m);
        self.indicant_names.insert(name.to_string(), id);
        id
    }

    pub fn lookup_indicant(&self, name: &str) -> Option<MoidId> {
        self.indicant_names.get(name).copied()
    }

    /// Iterate every allocated mode id, in construction order. Used by the
    /// fixed-point loop and by tests checking global invariants.
    pub fn ids(&self) -> impl Iterator<Item = MoidId> {
        (0..self.moids.len() as u32).map(MoidId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_chain_depths_decrease_by_one_through_slice() {
        let mut mt = ModeTable::new();
        let int = mt.standard_mode(StandardKind::Int, 0, &mut Diagnostics::new(), None);
        let row3 = mt.new_row_chain(3, int, None);
        assert_eq!(mt.get(row3).dim, 3);
        let row2 = mt.get(row3).slice.unwrap();
        assert_eq!(mt.get(row2).dim, 2);
        let row1 = mt.get(row2).slice.unwrap();
        assert_eq!(mt.get(row1).dim, 1);
        assert_eq!(mt.get(row1).slice, Some(int));
    }

    #[test]
    fn standard_mode_below_minimum_precision_clamps_and_warns() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let id = mt.standard_mode(StandardKind::Int, -5, &mut diags, None);
        assert_eq!(mt.get(id).dim, MIN_SIZETY as i64);
        assert_eq!(diags.warning_count(), 1);
    }

    #[test]
    fn standard_mode_is_interned() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let a = mt.standard_mode(StandardKind::Real, 1, &mut diags, None);
        let b = mt.standard_mode(StandardKind::Real, 1, &mut diags, None);
        assert_eq!(a, b);
        assert_eq!(diags.warning_count(), 0);
    }

    #[test]
    fn representative_chases_equivalent_chain() {
        let mut mt = ModeTable::new();
        let mut diags = Diagnostics::new();
        let a = mt.standard_mode(StandardKind::Int, 0, &mut diags, None);
        let b = mt.new_indicant("MYINT", None);
        mt.get_mut(b).equivalent = Some(a);
        assert_eq!(mt.representative(b), a);
    }
}
