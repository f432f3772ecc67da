//! The Boolean evaluator: `eval(op, inputs)` over the closed gate vocabulary
//! from the bench file format.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// One of the gate operations the bench format can express.
///
/// `Input` is a structural marker only: an `Input` gate's value comes from
/// the primary-input (or key) assignment during `Circuit::simulate`, never
/// from `eval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateOp {
    Input,
    Buf,
    Not,
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Xnor,
    Mux,
}

impl GateOp {
    /// Fixed input arity, or `None` for the associative ops (`and`/`nand`/
    /// `or`/`nor`/`xor`/`xnor`) which accept any arity `>= 1`.
    pub fn fixed_arity(self) -> Option<usize> {
        match self {
            GateOp::Input => Some(0),
            GateOp::Buf | GateOp::Not => Some(1),
            GateOp::Mux => Some(3),
            GateOp::And | GateOp::Nand | GateOp::Or | GateOp::Nor | GateOp::Xor | GateOp::Xnor => {
                None
            }
        }
    }
}

impl fmt::Display for GateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateOp::Input => "input",
            GateOp::Buf => "buf",
            GateOp::Not => "not",
            GateOp::And => "and",
            GateOp::Nand => "nand",
            GateOp::Or => "or",
            GateOp::Nor => "nor",
            GateOp::Xor => "xor",
            GateOp::Xnor => "xnor",
            GateOp::Mux => "mux",
        };
        f.write_str(s)
    }
}

impl FromStr for GateOp {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "input" => Ok(GateOp::Input),
            "buf" => Ok(GateOp::Buf),
            "not" => Ok(GateOp::Not),
            "and" => Ok(GateOp::And),
            "nand" => Ok(GateOp::Nand),
            "or" => Ok(GateOp::Or),
            "nor" => Ok(GateOp::Nor),
            "xor" => Ok(GateOp::Xor),
            "xnor" => Ok(GateOp::Xnor),
            "mux" => Ok(GateOp::Mux),
            other => UnknownOpStrSnafu {
                op: other.to_string(),
            }
            .fail(),
        }
    }
}

/// Errors raised by the Boolean evaluator.
#[derive(Debug, Snafu)]
pub enum EvalError {
    /// Reached `eval` with an op outside the closed set (`Input`, or a
    /// textual op that never resolved to a `GateOp`).
    #[snafu(display("gate op {op} has no evaluation semantics"))]
    UnknownOp { op: GateOp },
    #[snafu(display("unrecognized gate operation {op:?}"))]
    UnknownOpStr { op: String },
    #[snafu(display("{op} expects {expected} input(s), got {got}"))]
    WrongArity {
        op: GateOp,
        expected: usize,
        got: usize,
    },
}

/// Evaluate a single gate given its operation and the (already evaluated)
/// Boolean values of its inputs.
///
/// `and`/`or`/`xor` and their negations reduce associatively, left to right,
/// across the full input slice. `xnor` across more than two inputs is the
/// parity convention `NOT (x1 XOR x2 XOR ... XOR xn)`, not a chain of
/// pairwise `xnor`s (those are not the same function once arity exceeds 2).
pub fn eval(op: GateOp, inputs: &[bool]) -> Result<bool, EvalError> {
    if let Some(expected) = op.fixed_arity() {
        ensure!(
            inputs.len() == expected,
            WrongAritySnafu {
                op,
                expected,
                got: inputs.len()
            }
        );
    } else {
        ensure!(
            !inputs.is_empty(),
            WrongAritySnafu {
                op,
                expected: 1usize,
                got: 0usize
            }
        );
    }

    match op {
        GateOp::Input => UnknownOpSnafu { op }.fail(),
        GateOp::Buf => Ok(inputs[0]),
        GateOp::Not => Ok(!inputs[0]),
        GateOp::And => Ok(inputs.iter().skip(1).fold(inputs[0], |acc, &b| acc && b)),
        GateOp::Nand => Ok(!inputs.iter().skip(1).fold(inputs[0], |acc, &b| acc && b)),
        GateOp::Or => Ok(inputs.iter().skip(1).fold(inputs[0], |acc, &b| acc || b)),
        GateOp::Nor => Ok(!inputs.iter().skip(1).fold(inputs[0], |acc, &b| acc || b)),
        GateOp::Xor => Ok(inputs.iter().skip(1).fold(inputs[0], |acc, &b| acc ^ b)),
        GateOp::Xnor => Ok(!inputs.iter().skip(1).fold(inputs[0], |acc, &b| acc ^ b)),
        GateOp::Mux => Ok(if inputs[2] { inputs[1] } else { inputs[0] }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buf_and_not() {
        assert_eq!(eval(GateOp::Buf, &[true]).unwrap(), true);
        assert_eq!(eval(GateOp::Not, &[true]).unwrap(), false);
    }

    #[test]
    fn mux_selects_b_when_selector_true() {
        assert_eq!(eval(GateOp::Mux, &[false, true, true]).unwrap(), true);
        assert_eq!(eval(GateOp::Mux, &[false, true, false]).unwrap(), false);
    }

    #[test]
    fn associative_ops_reduce_across_full_input_list() {
        assert_eq!(eval(GateOp::And, &[true, true, true]).unwrap(), true);
        assert_eq!(eval(GateOp::And, &[true, false, true]).unwrap(), false);
        assert_eq!(eval(GateOp::Or, &[false, false, true]).unwrap(), true);
        assert_eq!(eval(GateOp::Xor, &[true, true, true]).unwrap(), true);
    }

    #[test]
    fn xnor_is_parity_not_a_chain() {
        // NOT(x1 ^ x2 ^ x3); a chain of pairwise xnor would give a different
        // answer for odd arities.
        assert_eq!(eval(GateOp::Xnor, &[true, true, true]).unwrap(), false);
        assert_eq!(eval(GateOp::Xnor, &[true, true, false]).unwrap(), true);
    }

    #[test]
    fn input_has_no_eval_semantics() {
        assert!(matches!(
            eval(GateOp::Input, &[]),
            Err(EvalError::UnknownOp { .. })
        ));
    }

    #[test]
    fn wrong_arity_is_an_error_not_a_panic() {
        assert!(matches!(
            eval(GateOp::Not, &[true, false]),
            Err(EvalError::WrongArity { .. })
        ));
        assert!(matches!(
            eval(GateOp::And, &[]),
            Err(EvalError::WrongArity { .. })
        ));
    }

    #[test]
    fn display_and_from_str_round_trip() {
        for op in [
            GateOp::Input,
            GateOp::Buf,
            GateOp::Not,
            GateOp::And,
            GateOp::Nand,
            GateOp::Or,
            GateOp::Nor,
            GateOp::Xor,
            GateOp::Xnor,
            GateOp::Mux,
        ] {
            let s = op.to_string();
            assert_eq!(GateOp::from_str(&s).unwrap(), op);
        }
    }
}
