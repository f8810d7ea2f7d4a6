//! Source-to-result tests driving the public `Program` API end to end:
//! lex, parse, mode-check and run a whole source file the way `a68r`
//! would, rather than exercising one interpreter module in isolation.

use algol68_core::database::Program;
use algol68_core::options::Options;

fn run(src: &str) -> algol68_core::database::RunOutcome {
    Program::new(Options::default()).run("t.a68", src)
}

#[test]
fn an_assignment_and_conditional_runs_clean() {
    let outcome = run("BEGIN INT i := 1; IF i = 1 THEN i := 2 ELSE i := 3 FI END");
    assert!(outcome.succeeded(), "diagnostics: {:?}", outcome.diags.iter().collect::<Vec<_>>());
}

#[test]
fn a_for_loop_runs_without_error() {
    let outcome = run("BEGIN INT sum := 0; FOR i TO 5 DO sum := sum + i OD END");
    assert!(outcome.succeeded(), "diagnostics: {:?}", outcome.diags.iter().collect::<Vec<_>>());
}

#[test]
fn a_while_loop_terminates_on_its_condition() {
    let outcome = run("BEGIN INT n := 0; WHILE n < 3 DO n := n + 1 OD END");
    assert!(outcome.succeeded(), "diagnostics: {:?}", outcome.diags.iter().collect::<Vec<_>>());
}

#[test]
fn check_only_never_interprets() {
    let mut opts = Options::default();
    opts.run = false;
    let outcome = Program::new(opts).run("t.a68", "BEGIN INT i := 1 END");
    assert!(!outcome.ran);
    assert!(outcome.diags.error_count() == 0);
}

#[test]
fn an_unclosed_bracket_is_a_diagnostic_not_a_panic() {
    let outcome = run("BEGIN print((1)");
    assert!(!outcome.succeeded());
    assert!(!outcome.ran);
}

#[test]
fn a_struct_mode_declaration_and_field_assignment_runs() {
    let outcome = run("BEGIN MODE POINT = STRUCT(INT x, INT y); POINT p; x OF p := 4; y OF p := 2 END");
    assert!(outcome.succeeded(), "diagnostics: {:?}", outcome.diags.iter().collect::<Vec<_>>());
}
