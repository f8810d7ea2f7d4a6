//! `a68r`: compiles and runs a single Algol 68 source file from the
//! command line. Argument tokens are collected by `clap` (teacher dependency,
//! carried for exactly this) and handed to [`algol68_core::options::Options`]
//! verbatim, since the option grammar itself — bare `NAME`/`NAME=value`
//! tokens, a lone bare filename, `.progrc`/`PROG_OPTIONS` precedence — is
//! the language's own `PRAGMAT` syntax, not something clap's flag model
//! can express directly; clap's job here is only to print `--help`/
//! `--version` and gather the raw tokens.

use std::fs;
use std::process::ExitCode;

use clap::{App, Arg};

use algol68_core::database::Program;
use algol68_core::diag::abend;
use algol68_core::options::Options;

fn main() -> ExitCode {
    let matches = App::new("a68r")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Algol 68 compiler and interpreter")
        .arg(
            Arg::with_name("tokens")
                .help("option tokens (NAME, NAME=value) and the source filename")
                .multiple(true),
        )
        .get_matches();

    let tokens: Vec<String> = matches
        .values_of("tokens")
        .map(|vs| vs.map(str::to_string).collect())
        .unwrap_or_default();

    let opts = match Options::from_environment(&tokens) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("a68r: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if opts.verbose || opts.trace {
        simple_logger::init().ok();
    }

    let Some(file) = opts.file.clone() else {
        eprintln!("a68r: no source file given");
        return ExitCode::FAILURE;
    };

    let src = match fs::read_to_string(&file) {
        Ok(s) => s,
        Err(e) => abend(format!("cannot read {}: {}", file, e)),
    };

    let program = Program::new(opts);
    let outcome = program.run(&file, &src);

    let text = outcome.to_terminal(&|name| if name == file { Some(src.clone()) } else { None });
    if !text.is_empty() {
        eprint!("{}", text);
    }
    if let Some(err) = &outcome.runtime_error {
        eprintln!("runtime error: {}", err);
    }

    if outcome.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
