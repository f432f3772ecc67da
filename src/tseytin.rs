//! Tseytin CNF encoder: one clause set per gate, equisatisfiable with the
//! gate's truth table.

use snafu::prelude::*;

use crate::gate::GateOp;

/// A signed, nonzero DIMACS-style literal. Positive means the referenced
/// gate is `true`, negative means `false`. Literal `0` is never constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal(pub i64);

impl Literal {
    pub fn new(lit: i64) -> Self {
        debug_assert_ne!(lit, 0, "literal 0 is forbidden");
        Literal(lit)
    }

    /// `-lit`.
    pub fn negate(self) -> Self {
        Literal(-self.0)
    }

    pub fn var(self) -> i64 {
        self.0.abs()
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::new(v)
    }
}

pub type Clause = Vec<Literal>;
pub type Cnf = Vec<Clause>;

/// Errors raised by the Tseytin encoder.
#[derive(Debug, Snafu)]
pub enum EncodeError {
    /// `Input` gates carry no logic to encode; `Mux` is always lowered away
    /// by `Circuit::simplify_gates` before `to_cnf` runs, so reaching the
    /// encoder with either is a logic-layer bug in the caller, not a data
    /// problem, and must still fail closed rather than emit empty clauses.
    #[snafu(display("gate op {op} has no CNF encoding"))]
    UnencodableOp { op: GateOp },
}

fn clause(lits: impl IntoIterator<Item = Literal>) -> Clause {
    lits.into_iter().collect()
}

/// Emit the canonical Tseytin clauses relating output literal `y` to input
/// literal(s) `a` (and `b` for binary ops) such that the CNF is satisfiable
/// iff the assignment to `y`, `a`, `b` satisfies the gate's truth table.
pub fn encode(op: GateOp, y: Literal, a: Literal, b: Option<Literal>) -> Result<Cnf, EncodeError> {
    match op {
        GateOp::Buf => Ok(vec![
            clause([a.negate(), y]),
            clause([a, y.negate()]),
        ]),
        GateOp::Not => Ok(vec![
            clause([a.negate(), y.negate()]),
            clause([a, y]),
        ]),
        GateOp::And => {
            let b = b.expect("and requires two inputs");
            Ok(vec![
                clause([a.negate(), b.negate(), y]),
                clause([a, y.negate()]),
                clause([b, y.negate()]),
            ])
        }
        GateOp::Nand => {
            let b = b.expect("nand requires two inputs");
            Ok(vec![
                clause([a.negate(), b.negate(), y.negate()]),
                clause([a, y]),
                clause([b, y]),
            ])
        }
        GateOp::Or => {
            let b = b.expect("or requires two inputs");
            Ok(vec![
                clause([a, b, y.negate()]),
                clause([a.negate(), y]),
                clause([b.negate(), y]),
            ])
        }
        GateOp::Nor => {
            let b = b.expect("nor requires two inputs");
            Ok(vec![
                clause([a, b, y]),
                clause([a.negate(), y.negate()]),
                clause([b.negate(), y.negate()]),
            ])
        }
        GateOp::Xor => {
            let b = b.expect("xor requires two inputs");
            Ok(vec![
                clause([a.negate(), b.negate(), y.negate()]),
                clause([a, b, y.negate()]),
                clause([a, b.negate(), y]),
                clause([a.negate(), b, y]),
            ])
        }
        GateOp::Xnor => {
            let b = b.expect("xnor requires two inputs");
            Ok(vec![
                clause([a.negate(), b.negate(), y]),
                clause([a, b, y]),
                clause([a, b.negate(), y.negate()]),
                clause([a.negate(), b, y.negate()]),
            ])
        }
        GateOp::Input | GateOp::Mux => UnencodableOpSnafu { op }.fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::DpllSolver;
    use crate::sat::SatSolver;

    /// Brute-force Tseytin soundness (spec testable property 1): for every
    /// op and every assignment to inputs/output, the emitted CNF is
    /// satisfiable iff the assignment satisfies the gate's truth table.
    fn brute_force_check(op: GateOp, arity: usize) {
        let y = Literal::new(100);
        let a = Literal::new(1);
        let b = if arity == 2 { Some(Literal::new(2)) } else { None };
        let cnf = encode(op, y, a, b).unwrap();

        for av in [false, true] {
            let bvs: Vec<Option<bool>> = if arity == 2 {
                vec![Some(false), Some(true)]
            } else {
                vec![None]
            };
            for bv in bvs {
                for yv in [false, true] {
                    let mut unit_clauses: Cnf = cnf.clone();
                    unit_clauses.push(vec![if av { a } else { a.negate() }]);
                    if let Some(bv) = bv {
                        unit_clauses.push(vec![if bv { b.unwrap() } else { b.unwrap().negate() }]);
                    }
                    unit_clauses.push(vec![if yv { y } else { y.negate() }]);

                    let inputs: Vec<bool> = match bv {
                        Some(bv) => vec![av, bv],
                        None => vec![av],
                    };
                    let expected = crate::gate::eval(op, &inputs).unwrap();

                    let mut solver = DpllSolver::new();
                    let result = solver.solve(&unit_clauses);
                    assert_eq!(
                        result.sat,
                        yv == expected,
                        "op={op:?} inputs={inputs:?} y={yv} expected={expected}"
                    );
                }
            }
        }
    }

    #[test]
    fn tseytin_soundness_binary_ops() {
        for op in [
            GateOp::And,
            GateOp::Nand,
            GateOp::Or,
            GateOp::Nor,
            GateOp::Xor,
            GateOp::Xnor,
        ] {
            brute_force_check(op, 2);
        }
    }

    #[test]
    fn tseytin_soundness_unary_ops() {
        for op in [GateOp::Buf, GateOp::Not] {
            brute_force_check(op, 1);
        }
    }

    #[test]
    fn mux_and_input_are_unencodable() {
        let y = Literal::new(3);
        let a = Literal::new(1);
        assert!(matches!(
            encode(GateOp::Mux, y, a, Some(Literal::new(2))),
            Err(EncodeError::UnencodableOp { .. })
        ));
        assert!(matches!(
            encode(GateOp::Input, y, a, None),
            Err(EncodeError::UnencodableOp { .. })
        ));
    }
}
