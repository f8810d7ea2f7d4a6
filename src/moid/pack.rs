//! [`Pack`]: the ordered field/parameter/member list shared by STRUCT,
//! UNION, and PROC modes.

use crate::moid::MoidId;
use crate::node::NodeId;

/// One `(mode, text, node)` triple. `text` is the field name for STRUCT,
/// `None` for UNION members, and the formal parameter's identifier (if any)
/// for PROC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    pub moid: MoidId,
    pub text: Option<String>,
    pub node: Option<NodeId>,
}

impl PackEntry {
    pub fn new(moid: MoidId, text: Option<String>, node: Option<NodeId>) -> Self {
        PackEntry { moid, text, node }
    }
}

/// A `Pack` is logically a linked list in the original; a `Vec` gives the
/// same ordered-traversal semantics with none of the pointer bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pack(pub Vec<PackEntry>);

impl Pack {
    pub fn new() -> Self {
        Pack(Vec::new())
    }

    pub fn push(&mut self, entry: PackEntry) {
        self.0.push(entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackEntry> {
        self.0.iter()
    }

    /// Look up a STRUCT field by name, for field selection.
    pub fn field(&self, name: &str) -> Option<(usize, &PackEntry)> {
        self.0.iter().enumerate().find(|(_, e)| e.text.as_deref() == Some(name))
    }
}

impl<'a> IntoIterator for &'a Pack {
    type Item = &'a PackEntry;
    type IntoIter = std::slice::Iter<'a, PackEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
