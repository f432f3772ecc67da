//! SAT attack engine: the classic DIP-extraction loop, reaching a key
//! equivalent to the correct one by repeatedly querying a black-box oracle
//! and strengthening a miter over two copies of the locked circuit.

use hashbrown::HashMap;
use snafu::prelude::*;

use crate::circuit::{Circuit, CircuitError};
use crate::helpers::success_rate;
use crate::sat::{solve_cnf, SatError};
use crate::tseytin::{Cnf, Literal};

#[derive(Debug, Snafu)]
pub enum AttackError {
    #[snafu(display("{source}"))]
    Circuit { source: CircuitError },
    #[snafu(display("{source}"))]
    Sat { source: SatError },
    #[snafu(display("oracle returned {got} output(s), circuit declares {expected}"))]
    OracleLengthMismatch { expected: usize, got: usize },
}

impl From<CircuitError> for AttackError {
    fn from(source: CircuitError) -> Self {
        AttackError::Circuit { source }
    }
}

impl From<SatError> for AttackError {
    fn from(source: SatError) -> Self {
        AttackError::Sat { source }
    }
}

/// Knobs for [`sat_attack_detailed`]: which SAT backend to invoke, how many
/// DIP iterations to allow before giving up, and whether to emit `log::info!`
/// progress at each iteration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    pub solver: String,
    pub limit: usize,
    pub verbose: bool,
}

impl Default for AttackConfig {
    fn default() -> Self {
        AttackConfig {
            solver: "m22".to_string(),
            limit: 100,
            verbose: true,
        }
    }
}

/// The full outcome of a SAT attack: the richer sibling of the
/// `(iterations, estimated_key)` tuple [`sat_attack`] returns.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackReport {
    pub iterations: usize,
    pub estimated_key: Vec<bool>,
    pub converged: bool,
    pub success_rate: Option<f64>,
}

/// A black-box query interface: given a primary-input assignment, return the
/// circuit's output under its (unknown to the attacker) correct key.
pub trait Oracle {
    fn query(&self, inputs: &[bool]) -> Vec<bool>;
}

impl<F> Oracle for F
where
    F: Fn(&[bool]) -> Vec<bool>,
{
    fn query(&self, inputs: &[bool]) -> Vec<bool> {
        self(inputs)
    }
}

/// Wraps an unlocked circuit (or a locked one with its correct key already
/// known) as an [`Oracle`]: every query clones the circuit, pins its key
/// gates, and simulates.
pub struct CircuitOracle {
    circuit: Circuit,
}

impl CircuitOracle {
    pub fn new(circuit: Circuit) -> Self {
        CircuitOracle { circuit }
    }
}

impl Oracle for CircuitOracle {
    fn query(&self, inputs: &[bool]) -> Vec<bool> {
        let mut c = self.circuit.clone();
        c.unlock();
        c.simulate(inputs).expect("oracle circuit must be fully specified")
    }
}

/// Public entry point matching the external interface: `(iterations,
/// estimated_key_bits)`.
pub fn sat_attack(
    locked: &Circuit,
    oracle: &dyn Oracle,
) -> Result<(usize, Vec<bool>), AttackError> {
    let report = sat_attack_detailed(locked, oracle, &AttackConfig::default())?;
    Ok((report.iterations, report.estimated_key))
}

/// Run the SAT attack to completion (convergence or `config.limit`
/// iterations), returning the full [`AttackReport`].
pub fn sat_attack_detailed(
    locked: &Circuit,
    oracle: &dyn Oracle,
    config: &AttackConfig,
) -> Result<AttackReport, AttackError> {
    let mut c1 = locked.clone();
    c1.simplify_gates()?;

    let c2 = copy_circuit_for_init(&c1);
    let mut counter = c2.max_literal();

    // `cnf_i` accumulates the permanent clause database (the two circuit
    // copies plus every DIP constraint learned so far); the `[Y1 != Y2]`
    // miter is never folded into it — it is recomputed fresh each iteration
    // and combined with `cnf_i` only for that iteration's transient solve
    // call, exactly as `attack_module.py::sat_attack` combines `cnf_i +
    // diff_out` without ever reassigning `cnf_i` itself.
    let mut cnf_i = c1.to_cnf()?;
    cnf_i.extend(c2.to_cnf()?);

    let diff_out = diff_out_cnf(&c1.output_literals(), &c2.output_literals(), counter);
    let mut miter_cnf = cnf_i.clone();
    miter_cnf.extend(diff_out);
    let mut result = solve_cnf(&miter_cnf, &config.solver)?;
    let mut iterations = 1usize;

    while result.sat && iterations < config.limit {
        let assign1 = model_to_assignment(&c1, &result.model);
        let dip_x: Vec<bool> = c1
            .input_gates
            .iter()
            .map(|name| assign1[name])
            .collect();
        let dip_y = oracle.query(&dip_x);
        ensure!(
            dip_y.len() == c1.output_gates.len(),
            OracleLengthMismatchSnafu {
                expected: c1.output_gates.len(),
                got: dip_y.len(),
            }
        );

        let c1_copy = copy_circuit_for_dip(&c1, counter);
        counter = c1_copy.max_literal();
        let c2_copy = copy_circuit_for_dip(&c2, counter);
        counter = c2_copy.max_literal();

        cnf_i.extend(c1_copy.to_cnf()?);
        cnf_i.extend(c2_copy.to_cnf()?);
        cnf_i.extend(dip_cnf(&c1_copy, &dip_x, &dip_y));
        cnf_i.extend(dip_cnf(&c2_copy, &dip_x, &dip_y));

        let diff_out = diff_out_cnf(&c1.output_literals(), &c2.output_literals(), counter);
        miter_cnf = cnf_i.clone();
        miter_cnf.extend(diff_out);
        result = solve_cnf(&miter_cnf, &config.solver)?;
        iterations += 1;

        if config.verbose {
            log::info!(
                "sat_attack: iteration {iterations}, dip popcount {}",
                dip_x.iter().filter(|b| **b).count()
            );
        }
    }
    let converged = !result.sat;

    // The final key-extraction solve reads off `cnf_i` alone, with no miter:
    // convergence means the accumulated DIP constraints already pin every key
    // bit, so `Y1 != Y2` no longer needs asserting (and would make the
    // once-converged `cnf_i` needlessly unsatisfiable if it were).
    let final_result = solve_cnf(&cnf_i, &config.solver)?;
    let final_assign = model_to_assignment(&c1, &final_result.model);
    let estimated_key: Vec<bool> = c1
        .key_gates
        .iter()
        .map(|name| final_assign.get(name).copied().unwrap_or(false))
        .collect();

    let success_rate = if c1.correct_key.is_empty() {
        None
    } else {
        Some(success_rate(&c1.correct_key, &estimated_key))
    };

    if config.verbose {
        log::info!(
            "sat_attack: converged={converged} iterations={iterations} success_rate={success_rate:?}"
        );
    }

    Ok(AttackReport {
        iterations,
        estimated_key,
        converged,
        success_rate,
    })
}

/// Re-literal every non-input gate of `c`, continuing the literal numbering
/// past `c`'s own (`copy_circuit_for_init` in `attack_module.py`).
fn copy_circuit_for_init(c: &Circuit) -> Circuit {
    let mut copy = c.clone();
    let mut new_lit = c.literal_map().len() as i64 + 1;
    for gate in c.gates() {
        if !c.input_gates.contains(&gate.name) {
            copy.set_literal(&gate.name, new_lit);
            new_lit += 1;
        }
    }
    copy
}

/// Re-literal every non-key gate of `c`, continuing past `counter`
/// (`copy_circuit_for_dip` in `attack_module.py`).
fn copy_circuit_for_dip(c: &Circuit, counter: i64) -> Circuit {
    let mut copy = c.clone();
    let mut new_lit = counter + 1;
    for gate in c.gates() {
        if !c.key_gates.contains(&gate.name) {
            copy.set_literal(&gate.name, new_lit);
            new_lit += 1;
        }
    }
    copy
}

/// CNF for `[Y1 != Y2]`: a fresh pair of literals per output name, OR'd
/// together in a final clause (`diff_out_cnf` in `attack_module.py`).
fn diff_out_cnf(lits1: &HashMap<String, i64>, lits2: &HashMap<String, i64>, counter: i64) -> Cnf {
    let mut cnf = Cnf::new();
    let mut new_lit = counter;
    let mut last_clause = Vec::new();
    for name in lits1.keys() {
        let y1 = Literal::new(lits1[name]);
        let y2 = Literal::new(lits2[name]);

        new_lit += 1;
        let d1 = Literal::new(new_lit);
        last_clause.push(d1);
        cnf.push(vec![d1.negate(), y1]);
        cnf.push(vec![d1.negate(), y2.negate()]);

        new_lit += 1;
        let d2 = Literal::new(new_lit);
        last_clause.push(d2);
        cnf.push(vec![d2.negate(), y1.negate()]);
        cnf.push(vec![d2.negate(), y2]);
    }
    cnf.push(last_clause);
    cnf
}

/// Unit clauses pinning `c`'s input and output literals to the DIP's values
/// (`dip_cnf` in `attack_module.py`).
fn dip_cnf(c: &Circuit, dip_x: &[bool], dip_y: &[bool]) -> Cnf {
    let mut cnf = Cnf::new();
    for (i, name) in c.input_gates.iter().enumerate() {
        let lit = c.literal_map()[name];
        cnf.push(vec![if dip_x[i] {
            Literal::new(lit)
        } else {
            Literal::new(lit).negate()
        }]);
    }
    for (i, name) in c.output_gates.iter().enumerate() {
        let lit = c.literal_map()[name];
        cnf.push(vec![if dip_y[i] {
            Literal::new(lit)
        } else {
            Literal::new(lit).negate()
        }]);
    }
    cnf
}

/// Projects a solver model back onto gate names via `c`'s literal table
/// (`model_to_result` in `attack_module.py`).
fn model_to_assignment(c: &Circuit, model: &[Literal]) -> HashMap<String, bool> {
    let by_literal: HashMap<i64, &String> = c
        .literal_map()
        .iter()
        .map(|(name, &lit)| (lit, name))
        .collect();
    let mut out = HashMap::new();
    for lit in model {
        if let Some(&name) = by_literal.get(&lit.var()) {
            out.insert(name.clone(), lit.is_positive());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor_lock_circuit() -> Circuit {
        let text = "#1\nINPUT(a)\nINPUT(k0)\nOUTPUT(y)\ny = xor(a, k0)\n";
        Circuit::parse(text).unwrap()
    }

    #[test]
    fn converges_on_single_key_bit_xor_lock() {
        let locked = xor_lock_circuit();
        let oracle_circuit = locked.clone();
        let oracle = CircuitOracle::new(oracle_circuit);

        let (iterations, key) = sat_attack(&locked, &oracle).unwrap();
        assert!(iterations >= 1);
        assert_eq!(key, vec![true]);
    }

    #[test]
    fn detailed_report_has_full_success_rate_when_key_is_known() {
        let locked = xor_lock_circuit();
        let oracle = CircuitOracle::new(locked.clone());
        let report = sat_attack_detailed(&locked, &oracle, &AttackConfig::default()).unwrap();
        assert_eq!(report.success_rate, Some(100.0));
        assert!(report.converged);
    }

    #[test]
    fn closure_oracle_matches_identity_function() {
        let locked = xor_lock_circuit();
        let oracle = |inputs: &[bool]| vec![inputs[0] ^ true];
        let (_, key) = sat_attack(&locked, &oracle).unwrap();
        assert_eq!(key, vec![true]);
    }

    #[test]
    fn oracle_length_mismatch_is_an_error() {
        let locked = xor_lock_circuit();
        let bad_oracle = |_: &[bool]| vec![true, false];
        let result = sat_attack(&locked, &bad_oracle);
        assert!(matches!(
            result,
            Err(AttackError::OracleLengthMismatch { .. })
        ));
    }
}
