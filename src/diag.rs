//! Diagnostics: severities, source spans, and the buffered diagnostic bag.
//!
//! Parser and checker phases never print directly; they push into a
//! [`Diagnostics`] bag which the driver flushes at phase boundaries (see
//! `parser::Driver::run_phase`), keeping a pass's in-memory result separate
//! from the caller deciding when and how to report it.

use std::fmt;

use annotate_snippets::display_list::{DisplayList, FormatOptions};
use annotate_snippets::snippet::{Annotation, AnnotationType, Slice, Snippet, SourceAnnotation};

/// One (1-based line, 0-based column) source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SourcePos {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A half-open range of source text, with the original file name kept
/// alongside it so a diagnostic can be rendered even after `PRAGMAT`-driven
/// restarts re-tokenise the program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub file: String,
    pub start: SourcePos,
    pub end: SourcePos,
}

/// Diagnostic severities, declared least to most severe so the derived
/// `Ord` sorts a warning below any kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Scan,
    Syntax,
    Mode,
    Scope,
    Runtime,
    Fatal,
}

impl Severity {
    /// Whether this severity should make the driver skip the next phase,
    /// i.e. everything except plain warnings.
    pub fn is_error(self) -> bool {
        !matches!(self, Severity::Warning)
    }

    fn annotation_type(self) -> AnnotationType {
        match self {
            Severity::Warning => AnnotationType::Warning,
            Severity::Fatal => AnnotationType::Error,
            _ => AnnotationType::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "warning",
            Severity::Scan => "scan error",
            Severity::Syntax => "syntax error",
            Severity::Mode => "mode error",
            Severity::Scope => "scope error",
            Severity::Runtime => "runtime error",
            Severity::Fatal => "fatal error",
        };
        write!(f, "{}", s)
    }
}

/// A single diagnostic: severity, location, and a message chosen from a
/// fixed catalogue (call sites interpolate the offending construct but
/// never synthesize free-form text).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Option<SourceSpan>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, span: Option<SourceSpan>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            span,
            message: message.into(),
        }
    }

    /// Render using `annotate-snippets`, given the full source text of the
    /// file the span refers to (or `None` for spanless diagnostics, e.g. a
    /// missing source file).
    pub fn render(&self, source: Option<&str>) -> String {
        let Some(span) = &self.span else {
            return format!("{}: {}", self.severity, self.message);
        };
        let Some(source) = source else {
            return format!("{} at {}: {}", self.severity, span.start, self.message);
        };
        let label = self.message.clone();
        let snippet = Snippet {
            title: Some(Annotation {
                label: Some(&label),
                id: None,
                annotation_type: self.severity.annotation_type(),
            }),
            footer: vec![],
            slices: vec![Slice {
                source,
                line_start: span.start.line.max(1) as usize,
                origin: Some(span.file.as_str()),
                fold: true,
                annotations: vec![SourceAnnotation {
                    label: "",
                    annotation_type: self.severity.annotation_type(),
                    range: (span.start.col as usize, span.end.col.max(span.start.col + 1) as usize),
                }],
            }],
            opt: FormatOptions {
                color: cfg!(feature = "color"),
                ..Default::default()
            },
        };
        DisplayList::from(snippet).to_string()
    }
}

/// Severity filter for [`Diagnostics::to_terminal`]: print everything, or
/// only the runtime errors raised while interpreting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalFilter {
    All,
    RuntimeOnly,
}

/// Buffered diagnostics for one run of the driver. Phases push into this;
/// nothing is printed until a phase boundary flush.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        if diag.severity.is_error() {
            self.error_count += 1;
        } else {
            self.warning_count += 1;
        }
        self.items.push(diag);
    }

    pub fn error(&mut self, severity: Severity, span: Option<SourceSpan>, message: impl Into<String>) {
        debug_assert!(severity.is_error());
        self.push(Diagnostic::new(severity, span, message));
    }

    pub fn warn(&mut self, span: Option<SourceSpan>, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Warning, span, message));
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Whether a subsequent phase should be skipped because the prior
    /// phase raised at least one new error.
    pub fn should_skip_next_phase(&self, error_count_before_phase: usize) -> bool {
        self.error_count > error_count_before_phase
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Flush buffered diagnostics filtered by severity.
    pub fn to_terminal(&self, filter: TerminalFilter, sources: &dyn Fn(&str) -> Option<String>) -> String {
        let mut out = String::new();
        for d in &self.items {
            if filter == TerminalFilter::RuntimeOnly && d.severity != Severity::Runtime {
                continue;
            }
            let src = d.span.as_ref().and_then(|s| sources(&s.file));
            out.push_str(&d.render(src.as_deref()));
            out.push('\n');
        }
        out
    }
}

/// Fatal, unwind-free termination for an internal invariant violation:
/// prints a fatal message and exits without unwinding. Reserved for broken
/// invariants, never for user-triggered conditions (those are
/// `RuntimeError`, see `interpreter::RuntimeError`).
pub fn abend(message: impl fmt::Display) -> ! {
    log::error!("ABEND: {}", message);
    eprintln!("internal error (ABEND): {}", message);
    std::process::exit(2);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_does_not_count_as_error() {
        let mut d = Diagnostics::new();
        d.warn(None, "precision downgraded");
        assert_eq!(d.error_count(), 0);
        assert_eq!(d.warning_count(), 1);
        assert!(!d.should_skip_next_phase(0));
    }

    #[test]
    fn error_increments_and_triggers_skip() {
        let mut d = Diagnostics::new();
        let before = d.error_count();
        d.error(Severity::Mode, None, "mode mismatch");
        assert!(d.should_skip_next_phase(before));
    }

    #[test]
    fn severity_ordering_matches_escalation() {
        assert!(Severity::Warning < Severity::Scan);
        assert!(Severity::Scope < Severity::Runtime);
        assert!(Severity::Runtime < Severity::Fatal);
    }
}
