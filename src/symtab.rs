//! Symbol tables and tags.
//!
//! A table is created at each new lexical level (program, closed clause,
//! routine text body). Tables are linked to their `previous` (lexically
//! enclosing) table; identifiers, operators, indicants, and labels are kept
//! in separate partitions because Algol 68 allows the same source symbol to
//! denote a mode name and a variable name simultaneously.

use fnv::FnvHashMap;

use crate::moid::MoidId;
use crate::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolTableId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Identifier,
    Indicant,
    Operator,
    Label,
    /// Compiler-generated tag with no source symbol: loop counters,
    /// generator targets, anonymous formal-parameter slots.
    Anonymous,
}

/// A declaration entry: an identifier, operator, indicant, or label bound
/// in some symbol table.
#[derive(Debug, Clone)]
pub struct Tag {
    pub kind: TagKind,
    pub name: Option<String>,
    pub mode: Option<MoidId>,
    /// Source node defining this tag (identity declaration, formal
    /// parameter, label unit, ...).
    pub defining_node: Option<NodeId>,
    /// Operator declarations only: dyadic operators have a priority 1–9.
    pub priority: Option<u8>,
    /// Lexical nest level this tag was declared at.
    pub level: u32,
    /// Byte offset of this tag's storage within its frame (identifiers and
    /// anonymous generator targets only); assigned by the symbol-table
    /// builder.
    pub offset: Option<usize>,
    /// True for the primitives injected by the standard-environment
    /// builder: `+`, `print`, `upb`, etc. These are invoked directly by the
    /// interpreter rather than by opening a frame.
    pub stand_env_proc: bool,
    /// Highest lexical level of any non-local name this tag's body
    /// captures, used by the scope checker to bound closures.
    pub youngest_environ: Option<u32>,
    /// Set by the application checker the first time a node actually
    /// applies this tag, so an unused identity/mode declaration can be
    /// flagged.
    pub used: bool,
}

impl Tag {
    fn new(kind: TagKind, name: Option<String>, level: u32) -> Self {
        Tag {
            kind,
            name,
            mode: None,
            defining_node: None,
            priority: None,
            level,
            offset: None,
            stand_env_proc: false,
            youngest_environ: None,
            used: false,
        }
    }
}

/// One lexical-scope table.
#[derive(Debug)]
pub struct SymbolTable {
    pub id: SymbolTableId,
    pub level: u32,
    pub previous: Option<SymbolTableId>,

    identifiers: FnvHashMap<String, TagId>,
    operators: FnvHashMap<String, Vec<TagId>>,
    indicants: FnvHashMap<String, TagId>,
    labels: FnvHashMap<String, TagId>,
    anonymous: Vec<TagId>,

    /// Total byte size of this table's frame locals; accumulated by the
    /// symbol-table builder as it assigns offsets.
    pub ap_increment: usize,
    /// Labels declared in this table that are the target of a goto and thus
    /// need a jump buffer slot reserved in the frame; populated by the
    /// parser's jump-resolution phase.
    pub jump_to: Vec<TagId>,
}

impl SymbolTable {
    pub fn new(id: SymbolTableId, level: u32, previous: Option<SymbolTableId>) -> Self {
        SymbolTable {
            id,
            level,
            previous,
            identifiers: FnvHashMap::default(),
            operators: FnvHashMap::default(),
            indicants: FnvHashMap::default(),
            labels: FnvHashMap::default(),
            anonymous: Vec::new(),
            ap_increment: 0,
            jump_to: Vec::new(),
        }
    }

    pub fn identifier(&self, name: &str) -> Option<TagId> {
        self.identifiers.get(name).copied()
    }

    pub fn indicant(&self, name: &str) -> Option<TagId> {
        self.indicants.get(name).copied()
    }

    pub fn label(&self, name: &str) -> Option<TagId> {
        self.labels.get(name).copied()
    }

    pub fn operators(&self, name: &str) -> &[TagId] {
        self.operators.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn anonymous_tags(&self) -> &[TagId] {
        &self.anonymous
    }
}

/// Owns every [`SymbolTable`] and [`Tag`] for one run, and performs the
/// lexical-scope lookup chase (current table → `previous` → ... → level 0).
#[derive(Debug, Default)]
pub struct SymbolTables {
    tables: Vec<SymbolTable>,
    tags: Vec<Tag>,
}

impl SymbolTables {
    pub fn new() -> Self {
        SymbolTables::default()
    }

    pub fn new_table(&mut self, level: u32, previous: Option<SymbolTableId>) -> SymbolTableId {
        let id = SymbolTableId(self.tables.len() as u32);
        self.tables.push(SymbolTable::new(id, level, previous));
        id
    }

    pub fn table(&self, id: SymbolTableId) -> &SymbolTable {
        &self.tables[id.0 as usize]
    }

    pub fn table_mut(&mut self, id: SymbolTableId) -> &mut SymbolTable {
        &mut self.tables[id.0 as usize]
    }

    pub fn tag(&self, id: TagId) -> &Tag {
        &self.tags[id.0 as usize]
    }

    pub fn tag_mut(&mut self, id: TagId) -> &mut Tag {
        &mut self.tags[id.0 as usize]
    }

    /// Every tag ever allocated, across all tables, in allocation order.
    pub fn tag_ids(&self) -> impl Iterator<Item = TagId> {
        (0..self.tags.len() as u32).map(TagId)
    }

    fn new_tag(&mut self, kind: TagKind, name: Option<String>, level: u32) -> TagId {
        let id = TagId(self.tags.len() as u32);
        self.tags.push(Tag::new(kind, name, level));
        id
    }

    /// Declare an identifier in `table`. Returns `Err` with the existing tag
    /// if already declared at this level (duplicate declaration).
    pub fn declare_identifier(&mut self, table: SymbolTableId, name: &str) -> Result<TagId, TagId> {
        if let Some(existing) = self.table(table).identifier(name) {
            return Err(existing);
        }
        let level = self.table(table).level;
        let id = self.new_tag(TagKind::Identifier, Some(name.to_string()), level);
        self.table_mut(table).identifiers.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn declare_indicant(&mut self, table: SymbolTableId, name: &str) -> Result<TagId, TagId> {
        if let Some(existing) = self.table(table).indicant(name) {
            return Err(existing);
        }
        let level = self.table(table).level;
        let id = self.new_tag(TagKind::Indicant, Some(name.to_string()), level);
        self.table_mut(table).indicants.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn declare_label(&mut self, table: SymbolTableId, name: &str) -> Result<TagId, TagId> {
        if let Some(existing) = self.table(table).label(name) {
            return Err(existing);
        }
        let level = self.table(table).level;
        let id = self.new_tag(TagKind::Label, Some(name.to_string()), level);
        self.table_mut(table).labels.insert(name.to_string(), id);
        Ok(id)
    }

    /// Operators are overloaded by mode, so multiple tags may share a name;
    /// always succeeds.
    pub fn declare_operator(&mut self, table: SymbolTableId, name: &str) -> TagId {
        let level = self.table(table).level;
        let id = self.new_tag(TagKind::Operator, Some(name.to_string()), level);
        self.table_mut(table).operators.entry(name.to_string()).or_default().push(id);
        id
    }

    pub fn declare_anonymous(&mut self, table: SymbolTableId) -> TagId {
        let level = self.table(table).level;
        let id = self.new_tag(TagKind::Anonymous, None, level);
        self.table_mut(table).anonymous.push(id);
        id
    }

    /// Chase `previous` links starting at `table` to find `name` as an
    /// identifier, per the ordinary lexical-scope rule.
    pub fn lookup_identifier(&self, table: SymbolTableId, name: &str) -> Option<TagId> {
        let mut cur = Some(table);
        while let Some(t) = cur {
            if let Some(tag) = self.table(t).identifier(name) {
                return Some(tag);
            }
            cur = self.table(t).previous;
        }
        None
    }

    pub fn lookup_indicant(&self, table: SymbolTableId, name: &str) -> Option<TagId> {
        let mut cur = Some(table);
        while let Some(t) = cur {
            if let Some(tag) = self.table(t).indicant(name) {
                return Some(tag);
            }
            cur = self.table(t).previous;
        }
        None
    }

    pub fn lookup_label(&self, table: SymbolTableId, name: &str) -> Option<TagId> {
        let mut cur = Some(table);
        while let Some(t) = cur {
            if let Some(tag) = self.table(t).label(name) {
                return Some(tag);
            }
            cur = self.table(t).previous;
        }
        None
    }

    /// All operator tags visible for `name`, nearest scope first, used by
    /// the mode checker to resolve an overloaded operator application.
    pub fn lookup_operators(&self, table: SymbolTableId, name: &str) -> Vec<TagId> {
        let mut result = Vec::new();
        let mut cur = Some(table);
        while let Some(t) = cur {
            result.extend_from_slice(self.table(t).operators(name));
            cur = self.table(t).previous;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_identifier_declaration_is_rejected() {
        let mut st = SymbolTables::new();
        let t = st.new_table(0, None);
        let a = st.declare_identifier(t, "i").unwrap();
        let b = st.declare_identifier(t, "i");
        assert_eq!(b, Err(a));
    }

    #[test]
    fn lookup_chases_previous_chain() {
        let mut st = SymbolTables::new();
        let outer = st.new_table(0, None);
        let inner = st.new_table(1, Some(outer));
        let tag = st.declare_identifier(outer, "x").unwrap();
        assert_eq!(st.lookup_identifier(inner, "x"), Some(tag));
        assert_eq!(st.lookup_identifier(inner, "y"), None);
    }

    #[test]
    fn operators_are_overloadable() {
        let mut st = SymbolTables::new();
        let t = st.new_table(0, None);
        let a = st.declare_operator(t, "+");
        let b = st.declare_operator(t, "+");
        assert_ne!(a, b);
        assert_eq!(st.lookup_operators(t, "+"), vec![a, b]);
    }
}
