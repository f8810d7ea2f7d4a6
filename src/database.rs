//! Top-level orchestrator: merges options, runs the front-end pipeline,
//! and (unless `CHECK`/`NORUN` is set) hands the finished tree to the
//! interpreter — a single program submitted once, compiled and run, then
//! the process exits.
//!
//! A struct wrapping the options plus a small set of lazily-built analysis
//! results, each stage timed the same way (`time()`). There is no
//! parallel pass scheduling across segments and no incremental
//! recomputation: scheduling here is single-threaded and cooperative, and
//! there is exactly one source file per run, not a mutable multi-segment
//! database kept alive across edits.

use std::time::Instant;

use crate::diag::{Diagnostics, TerminalFilter};
use crate::interpreter::jump::RuntimeError;
use crate::interpreter::Interpreter;
use crate::options::Options;
use crate::parser::{self, ParseResult};

fn time<R, F: FnOnce() -> R>(opts: &Options, name: &str, f: F) -> R {
    let now = Instant::now();
    let ret = f();
    if opts.verbose {
        log::info!("{} {}ms", name, now.elapsed().as_millis());
    }
    ret
}

/// What a full run produced: the parse's diagnostics (and, if it ran, the
/// interpreter's own runtime error if the program aborted).
pub struct RunOutcome {
    pub diags: Diagnostics,
    pub ran: bool,
    pub runtime_error: Option<RuntimeError>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.diags.error_count() == 0 && self.runtime_error.is_none()
    }

    pub fn to_terminal(&self, sources: &dyn Fn(&str) -> Option<String>) -> String {
        self.diags.to_terminal(TerminalFilter::All, sources)
    }
}

/// One compile-and-run of a single source file — not a persistent,
/// editable multi-file database, just the one file named by `opts.file`
/// (or passed directly to [`Program::compile`]).
pub struct Program {
    opts: Options,
}

impl Program {
    pub fn new(opts: Options) -> Program {
        Program { opts }
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Runs the front-end pipeline over `src` (lex through portcheck,
    /// `parser::parse_source`'s own early-stop-on-error cascade).
    pub fn compile(&self, file: &str, src: &str) -> ParseResult {
        time(&self.opts, "parse", || parser::parse_source(file, src, &self.opts))
    }

    /// Compiles `src`, then — unless `CHECK`/`NORUN` was requested, or the
    /// front end produced an error — interprets the finished tree.
    /// `CHECK`/`NORUN` means parse and check only, never execute.
    pub fn run(&self, file: &str, src: &str) -> RunOutcome {
        let result = self.compile(file, src);
        let mut runtime_error = None;
        let mut ran = false;

        if self.opts.run && result.diags.error_count() == 0 {
            if let Some(root) = result.root {
                ran = true;
                time(&self.opts, "interpret", || {
                    let mut interp = Interpreter::new(&result.arena, &result.modes, &result.symtab, &self.opts);
                    if let Err(unwind) = interp.run(root) {
                        runtime_error = Some(match unwind {
                            crate::interpreter::jump::Unwind::Error(e) => e,
                            crate::interpreter::jump::Unwind::Jump(_) => {
                                RuntimeError::ValueError("a GOTO targeted a label no enclosing frame owns".into())
                            }
                        });
                    }
                });
            }
        }

        RunOutcome { diags: result.diags, ran, runtime_error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_trivial_program_runs_with_no_diagnostics_and_no_runtime_error() {
        let prog = Program::new(Options::default());
        let outcome = prog.run("t.a68", "BEGIN SKIP END");
        assert!(outcome.succeeded());
        assert!(outcome.ran);
    }

    #[test]
    fn check_only_compiles_but_does_not_run() {
        let mut opts = Options::default();
        opts.run = false;
        let prog = Program::new(opts);
        let outcome = prog.run("t.a68", "BEGIN SKIP END");
        assert!(!outcome.ran);
    }

    #[test]
    fn a_syntax_error_is_reported_and_nothing_runs() {
        let prog = Program::new(Options::default());
        let outcome = prog.run("t.a68", "BEGIN print((1)");
        assert!(!outcome.ran);
        assert!(outcome.diags.error_count() >= 1);
    }
}
