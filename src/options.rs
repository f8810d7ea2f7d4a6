//! CLI/environment/in-program option merging.
//!
//! One flat struct of knobs that stays constant for the run, built by
//! merging option-token streams in precedence order (`.progrc` <
//! `PROG_OPTIONS` env < command line < in-program `PRAGMAT`).

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;

/// Run-wide options, merged from every source that can set one.
#[derive(Debug, Clone)]
pub struct Options {
    pub brackets: bool,
    pub check_only: bool,
    pub run: bool,
    pub monitor: bool,
    pub verbose: bool,
    pub echo: Option<String>,
    pub execute: Option<String>,
    pub print: Option<String>,
    pub heap_size: usize,
    pub handle_count: usize,
    pub stack_size: usize,
    pub frame_size: usize,
    pub overhead: usize,
    pub precision: i64,
    pub quote_stropping: bool,
    pub trace: bool,
    pub breakpoint: bool,
    pub assertions: bool,
    pub pragmats: bool,
    pub reductions: bool,
    pub portcheck: bool,
    pub pedantic: bool,
    pub xref: bool,
    pub tree: bool,
    pub source: bool,
    pub moids: bool,
    pub unused: bool,
    pub statistics: bool,
    pub extensive: bool,
    pub listing: bool,
    pub time_limit: u64,
    pub file: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            brackets: false,
            check_only: false,
            run: true,
            monitor: false,
            verbose: false,
            echo: None,
            execute: None,
            print: None,
            heap_size: 32 * 1024 * 1024,
            handle_count: 64 * 1024,
            stack_size: 4 * 1024 * 1024,
            frame_size: 4 * 1024 * 1024,
            overhead: 64 * 1024,
            precision: 0,
            quote_stropping: false,
            trace: false,
            breakpoint: false,
            assertions: true,
            pragmats: true,
            reductions: false,
            portcheck: false,
            pedantic: false,
            xref: false,
            tree: false,
            source: false,
            moids: false,
            unused: false,
            statistics: false,
            extensive: false,
            listing: false,
            time_limit: 0,
            file: None,
        }
    }
}

impl Options {
    /// Build options from the full precedence chain: `.progrc` in `cwd`,
    /// then `PROG_OPTIONS`, then command-line tokens, applied in that
    /// order so later sources win.
    pub fn from_environment(cli_tokens: &[String]) -> Result<Self, OptionError> {
        let mut opts = Options::default();
        if let Ok(text) = fs::read_to_string(".progrc") {
            opts.apply_tokens(&tokenize_option_string(&text))?;
        }
        if let Ok(text) = env::var("PROG_OPTIONS") {
            opts.apply_tokens(&tokenize_option_string(&text))?;
        }
        opts.apply_tokens(cli_tokens)?;
        Ok(opts)
    }

    /// Apply one later-wins batch of option tokens, e.g. an in-program
    /// `PRAGMAT` that re-invokes the tokeniser: after restarting, modes
    /// and tables are cleared and rebuilt — the merge itself is this
    /// function; the restart is the driver's job.
    pub fn apply_tokens(&mut self, tokens: &[String]) -> Result<(), OptionError> {
        for tok in tokens {
            self.apply_one(tok)?;
        }
        Ok(())
    }

    fn apply_one(&mut self, raw: &str) -> Result<(), OptionError> {
        let tok = raw.trim_start_matches('-');
        if tok.is_empty() {
            return Ok(());
        }
        let (flag, value) = match tok.split_once('=') {
            Some((f, v)) => (f, Some(v)),
            None => (tok, None),
        };
        let flag = flag.to_ascii_uppercase();
        macro_rules! size_flag {
            ($field:ident) => {{
                self.$field = parse_size(value.ok_or(OptionError::MissingValue(flag.clone()))?)?;
            }};
        }
        match flag.as_str() {
            "BRACKETS" => self.brackets = true,
            "CHECK" | "NORUN" => {
                self.check_only = true;
                self.run = false;
            }
            "RUN" => self.run = true,
            "MONITOR" | "DEBUG" => self.monitor = true,
            "VERBOSE" => self.verbose = true,
            "VERSION" | "HELP" => {} // handled by main before options are built
            "ECHO" => self.echo = Some(value.unwrap_or_default().to_string()),
            "EXECUTE" => self.execute = Some(value.unwrap_or_default().to_string()),
            "PRINT" => self.print = Some(value.unwrap_or_default().to_string()),
            "HEAP" => size_flag!(heap_size),
            "HANDLES" => size_flag!(handle_count),
            "STACK" => size_flag!(stack_size),
            "FRAME" => size_flag!(frame_size),
            "OVERHEAD" => size_flag!(overhead),
            "PRECISION" => {
                self.precision = value
                    .ok_or(OptionError::MissingValue(flag.clone()))?
                    .parse()
                    .map_err(|_| OptionError::BadValue(flag.clone()))?
            }
            "QUOTESTROPPING" => self.quote_stropping = true,
            "UPPERSTROPPING" => self.quote_stropping = false,
            "TRACE" => self.trace = true,
            "NOTRACE" => self.trace = false,
            "BREAKPOINT" => self.breakpoint = true,
            "NOBREAKPOINT" => self.breakpoint = false,
            "ASSERTIONS" => self.assertions = true,
            "NOASSERTIONS" => self.assertions = false,
            "PRAGMATS" => self.pragmats = true,
            "NOPRAGMATS" => self.pragmats = false,
            "REDUCTIONS" => self.reductions = true,
            "PORTCHECK" => self.portcheck = true,
            "NOPORTCHECK" => self.portcheck = false,
            "PEDANTIC" => {
                self.pedantic = true;
                self.portcheck = true;
            }
            "XREF" => self.xref = true,
            "NOXREF" => self.xref = false,
            "TREE" => self.tree = true,
            "NOTREE" => self.tree = false,
            "SOURCE" => self.source = true,
            "NOSOURCE" => self.source = false,
            "MOIDS" => self.moids = true,
            "UNUSED" => self.unused = true,
            "STATISTICS" => self.statistics = true,
            "EXTENSIVE" => self.extensive = true,
            "LISTING" => self.listing = true,
            "TIMELIMIT" => {
                self.time_limit = value
                    .ok_or(OptionError::MissingValue(flag.clone()))?
                    .parse()
                    .map_err(|_| OptionError::BadValue(flag.clone()))?
            }
            "FILE" => self.file = Some(value.ok_or(OptionError::MissingValue(flag.clone()))?.to_string()),
            "EXIT" => return Ok(()),
            _ => {
                // Bare filename argument rather than a recognised flag.
                if value.is_none() && self.file.is_none() {
                    self.file = Some(raw.to_string());
                } else {
                    return Err(OptionError::Unknown(raw.to_string()));
                }
            }
        }
        Ok(())
    }

    /// True when any listing-producing option is active.
    pub fn wants_listing(&self) -> bool {
        self.listing || self.xref || self.tree || self.source || self.moids || self.statistics
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    MissingValue(String),
    BadValue(String),
    Unknown(String),
}

impl fmt::Display for OptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionError::MissingValue(flag) => write!(f, "option {} requires a value", flag),
            OptionError::BadValue(flag) => write!(f, "option {} has an invalid value", flag),
            OptionError::Unknown(tok) => write!(f, "unrecognised option: {}", tok),
        }
    }
}

impl std::error::Error for OptionError {}

/// Splits a `.progrc`/`PROG_OPTIONS` style string on whitespace and commas,
/// the same token grammar as command-line arguments.
fn tokenize_option_string(s: &str) -> Vec<String> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a `n[kMG]` byte-size value, e.g. `HEAP=4M`.
fn parse_size(s: &str) -> Result<usize, OptionError> {
    let s = s.trim();
    let (digits, mult) = match s.chars().last() {
        Some('k') | Some('K') => (&s[..s.len() - 1], 1024),
        Some('m') | Some('M') => (&s[..s.len() - 1], 1024 * 1024),
        Some('g') | Some('G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    digits
        .parse::<usize>()
        .map(|n| n * mult)
        .map_err(|_| OptionError::BadValue("size".to_string()))
}

/// Accumulates in-program `PRAGMAT` option strings seen while tokenising, so
/// the driver can decide whether a restart with larger stacks is needed.
#[derive(Debug, Default)]
pub struct PragmatOptions {
    pub seen: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_lets_command_line_win_over_rc_style_tokens() {
        let mut opts = Options::default();
        opts.apply_tokens(&["NOTRACE".to_string()]).unwrap();
        opts.apply_tokens(&["TRACE".to_string()]).unwrap();
        assert!(opts.trace);
    }

    #[test]
    fn heap_size_accepts_suffix() {
        let mut opts = Options::default();
        opts.apply_tokens(&["HEAP=16M".to_string()]).unwrap();
        assert_eq!(opts.heap_size, 16 * 1024 * 1024);
    }

    #[test]
    fn bare_filename_is_accepted_once() {
        let mut opts = Options::default();
        opts.apply_tokens(&["prog.a68".to_string()]).unwrap();
        assert_eq!(opts.file.as_deref(), Some("prog.a68"));
    }

    #[test]
    fn check_implies_no_run() {
        let mut opts = Options::default();
        opts.apply_tokens(&["CHECK".to_string()]).unwrap();
        assert!(opts.check_only);
        assert!(!opts.run);
    }
}
