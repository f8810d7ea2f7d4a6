//! Non-local transfer and the runtime error type every evaluator threads
//! through its `Result`.
//!
//! Non-local jumps are implemented as a `ControlFlow`-shaped
//! `Result<StackValue, Unwind>` rather than a longjmp emulation —
//! `Unwind::Jump` carries the target label's `TagId` and unwinds frame by
//! frame until [`super::control`]'s call/block boundary recognises it
//! belongs to one of its own labels.

use crate::symtab::TagId;

/// Runtime error classes a unit's evaluation can raise.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    IndexOutOfBounds,
    EmptyValue,
    NilDereference,
    ArithmeticOverflow,
    StackOverflow,
    HeapExhaustion,
    TimeLimitExceeded,
    AssertionFailure,
    ScopeError,
    ValueError(String),
    OpenError(String),
    TransputError(String),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::IndexOutOfBounds => write!(f, "index out of bounds"),
            RuntimeError::EmptyValue => write!(f, "value is empty"),
            RuntimeError::NilDereference => write!(f, "attempt to dereference NIL"),
            RuntimeError::ArithmeticOverflow => write!(f, "arithmetic overflow"),
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
            RuntimeError::HeapExhaustion => write!(f, "heap exhausted"),
            RuntimeError::TimeLimitExceeded => write!(f, "time limit exceeded"),
            RuntimeError::AssertionFailure => write!(f, "assertion failure"),
            RuntimeError::ScopeError => write!(f, "a REF outlived the frame it names"),
            RuntimeError::ValueError(m) => write!(f, "value error: {}", m),
            RuntimeError::OpenError(m) => write!(f, "open error: {}", m),
            RuntimeError::TransputError(m) => write!(f, "transput error: {}", m),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// What interrupted normal evaluation: either a genuine error, or a
/// non-local jump in flight to the label named by `TagId`.
#[derive(Debug, Clone, PartialEq)]
pub enum Unwind {
    Error(RuntimeError),
    Jump(TagId),
}

impl From<RuntimeError> for Unwind {
    fn from(e: RuntimeError) -> Self {
        Unwind::Error(e)
    }
}

pub type Eval = Result<crate::value::StackValue, Unwind>;
