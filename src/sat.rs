//! SAT adapter: a thin contract over a CDCL/DPLL-style solver
//! (`bootstrap(cnf) -> solve() -> model()`, collapsed here into one
//! `solve` call whose solver instance is scoped to that single call and
//! dropped on return, per the resource discipline the attack loop depends
//! on).
//!
//! The choice of backend solver is, per spec, an external collaborator.
//! [`DpllSolver`] is the always-available default so the crate builds and
//! tests without a native toolchain; the `kissat` feature additionally
//! routes `solve_cnf(cnf, "kissat")` through the `rustsat`/`rustsat-kissat`
//! crates (the same pairing `Coloquinte-quaigh` depends on for CNF solving
//! over gate networks).

use hashbrown::HashMap;
use snafu::prelude::*;

use crate::tseytin::{Clause, Cnf, Literal};

#[derive(Debug, Snafu)]
pub enum SatError {
    #[snafu(display("unknown SAT solver backend {name:?}"))]
    UnknownSolver { name: String },
    #[cfg(feature = "kissat")]
    #[snafu(display("kissat backend error: {source}"))]
    Kissat { source: rustsat::solvers::SolverError },
}

/// Result of a `solve` call: whether the clause database is satisfiable,
/// and if so, a total assignment (signed integers, positive == true) over
/// every variable appearing in the clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SatResult {
    pub sat: bool,
    pub model: Vec<Literal>,
}

/// Contract every SAT backend implements: bootstrap with a clause database,
/// solve it, return the model. One instance is used for exactly one `solve`
/// call; implementations must release any native resources on return.
pub trait SatSolver {
    fn solve(&mut self, cnf: &Cnf) -> SatResult;
}

/// Resolve a solver backend by name and solve `cnf` with it, matching the
/// `solve_cnf(clauses, name)` contract from the external interface.
/// `"m22"` (the original tool's default, a MiniSat-family backend) and
/// `"dpll"` both route to [`DpllSolver`]; no other name is recognized.
pub fn solve_cnf(cnf: &Cnf, name: &str) -> Result<SatResult, SatError> {
    match name {
        "m22" | "dpll" => {
            let mut solver = DpllSolver::new();
            Ok(solver.solve(cnf))
        }
        #[cfg(feature = "kissat")]
        "kissat" => solve_with_kissat(cnf),
        other => UnknownSolverSnafu {
            name: other.to_string(),
        }
        .fail(),
    }
}

/// Solve `cnf` with `kissat` via the `rustsat`/`rustsat-kissat` bindings. A
/// fresh solver instance is created and dropped within this call, matching
/// the same one-instance-per-`solve` resource discipline as [`DpllSolver`].
#[cfg(feature = "kissat")]
fn solve_with_kissat(cnf: &Cnf) -> Result<SatResult, SatError> {
    use rustsat::solvers::{Solve, SolverResult};
    use rustsat::types::{TernaryVal, Var};

    let mut vars: Vec<i64> = cnf.iter().flat_map(|c| c.iter().map(|lit| lit.var())).collect();
    vars.sort_unstable();
    vars.dedup();

    let mut solver = rustsat_kissat::Kissat::default();
    for clause in cnf {
        let rs_clause: rustsat::types::Clause = clause
            .iter()
            .map(|lit| {
                let var = Var::new((lit.var() - 1) as u32);
                if lit.is_positive() {
                    var.pos_lit()
                } else {
                    var.neg_lit()
                }
            })
            .collect();
        solver.add_clause(rs_clause).context(KissatSnafu)?;
    }

    match solver.solve().context(KissatSnafu)? {
        SolverResult::Sat => {
            let model = vars
                .iter()
                .map(|&v| {
                    let var = Var::new((v - 1) as u32);
                    let value = !matches!(solver.var_val(var), Ok(TernaryVal::False));
                    Literal::new(if value { v } else { -v })
                })
                .collect();
            Ok(SatResult { sat: true, model })
        }
        SolverResult::Unsat => Ok(SatResult {
            sat: false,
            model: Vec::new(),
        }),
        SolverResult::Interrupted => Ok(SatResult {
            sat: false,
            model: Vec::new(),
        }),
    }
}

/// A complete DPLL solver: unit propagation, pure-literal elimination,
/// chronological backtracking over a fixed variable order. Not a
/// clause-learning CDCL engine — the miters this crate builds stay well
/// within DPLL's reach at the benchmark sizes `sat_attack` targets.
#[derive(Debug, Default)]
pub struct DpllSolver;

impl DpllSolver {
    pub fn new() -> Self {
        DpllSolver
    }
}

impl SatSolver for DpllSolver {
    fn solve(&mut self, cnf: &Cnf) -> SatResult {
        let mut vars: Vec<i64> = cnf
            .iter()
            .flat_map(|c| c.iter().map(|lit| lit.var()))
            .collect();
        vars.sort_unstable();
        vars.dedup();

        let mut assignment = HashMap::new();
        match dpll(cnf, &vars, &mut assignment) {
            true => {
                let model = vars
                    .iter()
                    .map(|&v| {
                        let value = *assignment.get(&v).unwrap_or(&true);
                        Literal::new(if value { v } else { -v })
                    })
                    .collect();
                SatResult { sat: true, model }
            }
            false => SatResult {
                sat: false,
                model: Vec::new(),
            },
        }
    }
}

/// Simplify `clauses` under `assignment`: drop satisfied clauses, drop
/// falsified literals from the rest. Returns `None` on conflict (an empty
/// clause was produced).
fn simplify(clauses: &[Clause], assignment: &HashMap<i64, bool>) -> Option<Vec<Clause>> {
    let mut result = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let mut satisfied = false;
        let mut remaining = Clause::new();
        for &lit in clause {
            match assignment.get(&lit.var()) {
                Some(&value) => {
                    if value == lit.is_positive() {
                        satisfied = true;
                        break;
                    }
                    // falsified literal: drop it from the clause
                }
                None => remaining.push(lit),
            }
        }
        if satisfied {
            continue;
        }
        if remaining.is_empty() {
            return None;
        }
        result.push(remaining);
    }
    Some(result)
}

/// Unit-propagate and pure-literal-eliminate `clauses` under `assignment`,
/// mutating `assignment` in place. Returns `false` on conflict.
fn propagate(clauses: &mut Vec<Clause>, assignment: &mut HashMap<i64, bool>) -> bool {
    loop {
        // unit propagation
        let unit = clauses.iter().find(|c| c.len() == 1).map(|c| c[0]);
        if let Some(lit) = unit {
            assignment.insert(lit.var(), lit.is_positive());
            match simplify(clauses, assignment) {
                Some(simplified) => {
                    *clauses = simplified;
                    continue;
                }
                None => return false,
            }
        }

        // pure literal elimination
        let mut polarity: HashMap<i64, Option<bool>> = HashMap::new();
        for clause in clauses.iter() {
            for &lit in clause {
                let entry = polarity.entry(lit.var()).or_insert(Some(lit.is_positive()));
                if *entry != Some(lit.is_positive()) {
                    *entry = None;
                }
            }
        }
        let pure = polarity.iter().find_map(|(&v, &p)| p.map(|p| (v, p)));
        if let Some((var, value)) = pure {
            assignment.insert(var, value);
            match simplify(clauses, assignment) {
                Some(simplified) => {
                    *clauses = simplified;
                    continue;
                }
                None => return false,
            }
        }

        return true;
    }
}

fn dpll(clauses: &Cnf, vars: &[i64], assignment: &mut HashMap<i64, bool>) -> bool {
    let mut working: Vec<Clause> = clauses.clone();
    if !propagate(&mut working, assignment) {
        return false;
    }
    if working.is_empty() {
        return true;
    }

    let branch_var = vars
        .iter()
        .find(|v| !assignment.contains_key(*v))
        .copied()
        .expect("remaining clauses but no unassigned variable");

    for &value in &[true, false] {
        let mut branch_assignment = assignment.clone();
        branch_assignment.insert(branch_var, value);
        match simplify(&working, &branch_assignment) {
            Some(simplified_branch) => {
                if dpll(&simplified_branch, vars, &mut branch_assignment) {
                    *assignment = branch_assignment;
                    return true;
                }
            }
            None => continue,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(v: i64) -> Literal {
        Literal::new(v)
    }

    #[test]
    fn empty_cnf_is_sat() {
        let result = DpllSolver::new().solve(&Vec::new());
        assert!(result.sat);
    }

    #[test]
    fn unsatisfiable_unit_clauses() {
        let cnf = vec![vec![lit(1)], vec![lit(-1)]];
        let result = DpllSolver::new().solve(&cnf);
        assert!(!result.sat);
    }

    #[test]
    fn simple_satisfiable_instance() {
        // (x1 or x2) and (not x1 or x2) and (x1 or not x2)
        // satisfied by x1=true, x2=true
        let cnf = vec![
            vec![lit(1), lit(2)],
            vec![lit(-1), lit(2)],
            vec![lit(1), lit(-2)],
        ];
        let result = DpllSolver::new().solve(&cnf);
        assert!(result.sat);
        assert!(result.model.contains(&lit(1)));
        assert!(result.model.contains(&lit(2)));
    }

    #[test]
    fn model_assigns_every_variable() {
        let cnf = vec![vec![lit(1)], vec![lit(2), lit(3)]];
        let result = DpllSolver::new().solve(&cnf);
        assert!(result.sat);
        let vars: Vec<i64> = result.model.iter().map(|l| l.var()).collect();
        assert!(vars.contains(&1));
        assert!(vars.contains(&2));
        assert!(vars.contains(&3));
    }

    #[test]
    fn unknown_backend_name_is_an_error() {
        assert!(matches!(
            solve_cnf(&Vec::new(), "glucose"),
            Err(SatError::UnknownSolver { .. })
        ));
    }

    #[cfg(feature = "kissat")]
    #[test]
    fn kissat_backend_agrees_with_dpll_on_satisfiability() {
        let cnf = vec![
            vec![lit(1), lit(2)],
            vec![lit(-1), lit(2)],
            vec![lit(1), lit(-2)],
        ];
        let result = solve_cnf(&cnf, "kissat").unwrap();
        assert!(result.sat);

        let unsat_cnf = vec![vec![lit(1)], vec![lit(-1)]];
        let result = solve_cnf(&unsat_cnf, "kissat").unwrap();
        assert!(!result.sat);
    }
}
