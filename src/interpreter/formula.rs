//! Evaluates `Formula`/`MonadicFormula` nodes: the parser leaves the
//! operator's name directly on the node's own `symbol` (see
//! `parser::bottom_up::parse_formula`/`parse_operand`), so dispatch is a
//! straight match on that name and the already-evaluated operand(s)' shape.
//!
//! Only the standard-environment operators (`standenv.rs`'s
//! `DYADIC_OPERATORS`/`MONADIC_OPERATORS`) are handled here; a user-declared
//! `OP` on a STRUCT/UNION mode has no interpreter case because this crate
//! has no user operator dispatch table yet.

use crate::interpreter::jump::{Eval, RuntimeError, Unwind};
use crate::interpreter::Interpreter;
use crate::value::StackValue;

impl<'a> Interpreter<'a> {
    pub(super) fn eval_formula(&mut self, id: crate::node::NodeId) -> Eval {
        let name = self.symbol(id).to_string();
        let children: Vec<_> = self.arena.children(id).collect();
        match children.as_slice() {
            [operand] => {
                let v = self.eval(*operand)?;
                monadic(&name, v)
            }
            [lhs, rhs] => {
                let l = self.eval(*lhs)?;
                let r = self.eval(*rhs)?;
                dyadic(&name, l, r)
            }
            _ => Err(Unwind::Error(RuntimeError::ValueError(format!("operator {} applied to the wrong number of operands", name)))),
        }
    }
}

fn monadic(name: &str, v: StackValue) -> Eval {
    match (name, v) {
        ("-", StackValue::Int(i)) => Ok(StackValue::Int(-i)),
        ("-", StackValue::Real(r)) => Ok(StackValue::Real(-r)),
        ("+", v) => Ok(v),
        ("NOT", StackValue::Bool(b)) => Ok(StackValue::Bool(!b)),
        ("ABS", StackValue::Int(i)) => Ok(StackValue::Int(i.abs())),
        ("ABS", StackValue::Real(r)) => Ok(StackValue::Real(r.abs())),
        ("ABS", StackValue::Char(c)) => Ok(StackValue::Int(c as i64)),
        ("SIGN", StackValue::Int(i)) => Ok(StackValue::Int(i.signum())),
        ("SIGN", StackValue::Real(r)) => Ok(StackValue::Int(if r > 0.0 { 1 } else if r < 0.0 { -1 } else { 0 })),
        ("ODD", StackValue::Int(i)) => Ok(StackValue::Bool(i % 2 != 0)),
        (op, v) => Err(Unwind::Error(RuntimeError::ValueError(format!("no standard monadic {} for this operand ({:?})", op, v)))),
    }
}

fn dyadic(name: &str, l: StackValue, r: StackValue) -> Eval {
    use StackValue::*;
    match (name, l, r) {
        ("+", Int(a), Int(b)) => a.checked_add(b).map(Int).ok_or(Unwind::Error(RuntimeError::ArithmeticOverflow)),
        ("+", Real(a), Real(b)) => Ok(Real(a + b)),
        ("-", Int(a), Int(b)) => a.checked_sub(b).map(Int).ok_or(Unwind::Error(RuntimeError::ArithmeticOverflow)),
        ("-", Real(a), Real(b)) => Ok(Real(a - b)),
        ("*", Int(a), Int(b)) => a.checked_mul(b).map(Int).ok_or(Unwind::Error(RuntimeError::ArithmeticOverflow)),
        ("*", Real(a), Real(b)) => Ok(Real(a * b)),
        ("/", Int(a), Int(b)) => {
            if b == 0 {
                Err(Unwind::Error(RuntimeError::ArithmeticOverflow))
            } else {
                Ok(Real(a as f64 / b as f64))
            }
        }
        ("/", Real(a), Real(b)) => Ok(Real(a / b)),
        ("OVER", Int(a), Int(b)) => {
            if b == 0 {
                Err(Unwind::Error(RuntimeError::ArithmeticOverflow))
            } else {
                Ok(Int(a / b))
            }
        }
        ("MOD", Int(a), Int(b)) => {
            if b == 0 {
                Err(Unwind::Error(RuntimeError::ArithmeticOverflow))
            } else {
                Ok(Int(a.rem_euclid(b)))
            }
        }
        ("**", Int(a), Int(b)) => {
            if b < 0 {
                Err(Unwind::Error(RuntimeError::ValueError("negative INT exponent".into())))
            } else {
                Ok(Int(a.pow(b as u32)))
            }
        }
        ("**", Real(a), Int(b)) => Ok(Real(a.powi(b as i32))),
        ("=", a, b) => Ok(Bool(a == b)),
        ("/=", a, b) => Ok(Bool(a != b)),
        ("<", Int(a), Int(b)) => Ok(Bool(a < b)),
        ("<", Real(a), Real(b)) => Ok(Bool(a < b)),
        ("<=", Int(a), Int(b)) => Ok(Bool(a <= b)),
        ("<=", Real(a), Real(b)) => Ok(Bool(a <= b)),
        (">", Int(a), Int(b)) => Ok(Bool(a > b)),
        (">", Real(a), Real(b)) => Ok(Bool(a > b)),
        (">=", Int(a), Int(b)) => Ok(Bool(a >= b)),
        (">=", Real(a), Real(b)) => Ok(Bool(a >= b)),
        ("AND", Bool(a), Bool(b)) => Ok(Bool(a && b)),
        ("OR", Bool(a), Bool(b)) => Ok(Bool(a || b)),
        (op, a, b) => Err(Unwind::Error(RuntimeError::ValueError(format!("no standard operator {} for these operands ({:?}, {:?})", op, a, b)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_addition() {
        assert_eq!(dyadic("+", StackValue::Int(2), StackValue::Int(3)), Ok(StackValue::Int(5)));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        assert_eq!(dyadic("/", StackValue::Int(1), StackValue::Int(0)), Err(Unwind::Error(RuntimeError::ArithmeticOverflow)));
    }

    #[test]
    fn monadic_abs_on_a_negative_int() {
        assert_eq!(monadic("ABS", StackValue::Int(-5)), Ok(StackValue::Int(5)));
    }
}
