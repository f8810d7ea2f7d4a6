//! The phase driver: wires the tokeniser, bracket-balance pass, standard
//! environment, recursive-descent parser and mode-finishing pass together,
//! stopping after whichever phase first raises an error (each later phase
//! assumes the tree/mode-table it receives is structurally sound).

pub mod applic;
pub mod bottom_up;
pub mod coerce;
pub mod jumps;
pub mod mode_check;
pub mod portcheck;
pub mod scope_check;
pub mod standenv;
pub mod top_down;
pub mod victal;

use crate::diag::Diagnostics;
use crate::lexer::Lexer;
use crate::moid::ModeTable;
use crate::node::{NodeArena, NodeId};
use crate::options::Options;
use crate::symtab::SymbolTables;

/// Everything a finished parse produced, regardless of how far the pipeline
/// got before an error stopped it.
pub struct ParseResult {
    pub arena: NodeArena,
    pub modes: ModeTable,
    pub symtab: SymbolTables,
    pub root: Option<NodeId>,
    pub diags: Diagnostics,
}

/// Runs the full front-end pipeline over one source file's text.
///
/// Phases after the tokeniser run only if the previous phase didn't just add
/// an error, mirroring how a cascade of confusing downstream errors from one
/// real syntax mistake is worse than stopping early.
pub fn parse_source(file: &str, src: &str, opts: &Options) -> ParseResult {
    let mut diags = Diagnostics::new();
    let mut arena = NodeArena::new();
    let mut modes = ModeTable::new();
    let mut symtab = SymbolTables::new();

    let mut tokens = Lexer::new(file, src).tokenize(&mut diags);

    let mut root = None;
    if top_down::run(&mut tokens, opts, &mut diags) {
        let env = standenv::build(&mut modes, &mut symtab, &mut diags);
        let before = diags.error_count();
        let parser = bottom_up::Parser::new(&tokens, &mut arena, &mut modes, &mut symtab, &mut diags, &env);
        let program = parser.parse_program();
        root = Some(program);

        if !diags.should_skip_next_phase(before) && victal::run(&mut modes, &symtab, &mut diags) {
            let before = diags.error_count();
            mode_check::run(&mut arena, &mut modes, &symtab, &mut diags, &env, program);
            if !diags.should_skip_next_phase(before) {
                coerce::run(&mut arena, &modes, &mut diags, program);
                jumps::run(&arena, &mut symtab, &mut diags, program);
                applic::run(&arena, &mut symtab, &mut diags, program);
                scope_check::run(&mut arena, &modes, &symtab, &mut diags, program);
                portcheck::run(&arena, opts, &mut diags, program);
            }
        }
    }

    ParseResult {
        arena,
        modes,
        symtab,
        root,
        diags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_program_parses_with_no_errors() {
        let opts = Options::default();
        let result = parse_source("t.a68", "BEGIN print((\"hi\", new line)) END", &opts);
        assert!(result.root.is_some());
        assert_eq!(result.diags.error_count(), 0);
    }

    #[test]
    fn unclosed_bracket_stops_the_pipeline_before_parsing() {
        let opts = Options::default();
        let result = parse_source("t.a68", "BEGIN print((1)", &opts);
        assert!(result.root.is_none());
        assert!(result.diags.error_count() >= 1);
    }

    #[test]
    fn mode_declaration_is_resolved_end_to_end() {
        let opts = Options::default();
        let result = parse_source("t.a68", "MODE POINT = STRUCT(INT x, INT y); SKIP", &opts);
        assert!(result.root.is_some());
        assert_eq!(result.diags.error_count(), 0);
    }
}
