//! The circuit data model: parsing, simplification to a 2-input normal
//! form, literal assignment, CNF emission, graph view, simulation, and
//! bench-file round-tripping.

use hashbrown::HashMap;
use snafu::prelude::*;

use crate::gate::{self, EvalError, GateOp};
use crate::tseytin::{self, Cnf, EncodeError, Literal};

/// A single gate: its operation, the (ordered) names of its inputs, and its
/// current simulated value, if any.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Gate {
    pub name: String,
    pub op: GateOp,
    pub inputs: Vec<String>,
    pub value: Option<bool>,
}

impl Gate {
    pub fn new(op: GateOp, name: impl Into<String>, inputs: Vec<String>) -> Self {
        Gate {
            name: name.into(),
            op,
            inputs,
            value: None,
        }
    }

    /// A primary-input gate with no inputs of its own.
    pub fn input(name: impl Into<String>) -> Self {
        Gate::new(GateOp::Input, name, Vec::new())
    }
}

#[derive(Debug, Snafu)]
pub enum ParseError {
    #[snafu(display("line {line_no}: malformed bench directive: {line:?}"))]
    MalformedLine { line_no: usize, line: String },
    #[snafu(display("duplicate gate name {name:?}"))]
    DuplicateGateName { name: String },
    #[snafu(display("{referenced_by:?} references unknown gate {name:?}"))]
    UnknownGateReference { name: String, referenced_by: String },
}

/// Composed error type for every fallible `Circuit` operation.
#[derive(Debug, Snafu)]
pub enum CircuitError {
    #[snafu(display("{source}"))]
    Parse { source: ParseError },
    #[snafu(display("{source}"))]
    Eval { source: EvalError },
    #[snafu(display("{source}"))]
    Encode { source: EncodeError },
    #[snafu(display("literal counter overflowed while assigning {name:?}"))]
    LiteralOverflow { name: String },
    #[snafu(display(
        "oracle returned {got} outputs, circuit declares {expected} output gate(s)"
    ))]
    OracleLengthMismatch { expected: usize, got: usize },
    #[snafu(display("gate {name:?} has no assigned value; simulate its inputs (or unlock its key gates) first"))]
    UnassignedGate { name: String },
    #[snafu(display("gate {name:?} has no literal assigned; call simplify_gates() first"))]
    MissingLiteral { name: String },
}

impl From<ParseError> for CircuitError {
    fn from(source: ParseError) -> Self {
        CircuitError::Parse { source }
    }
}

impl From<EvalError> for CircuitError {
    fn from(source: EvalError) -> Self {
        CircuitError::Eval { source }
    }
}

impl From<EncodeError> for CircuitError {
    fn from(source: EncodeError) -> Self {
        CircuitError::Encode { source }
    }
}

/// A combinational Boolean network: gates plus the bookkeeping that drives
/// literal numbering and bench-file round-tripping.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Circuit {
    gates: Vec<Gate>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    pub input_gates: Vec<String>,
    pub output_gates: Vec<String>,
    pub key_gates: Vec<String>,
    literals: HashMap<String, i64>,
    pub correct_key: Vec<bool>,
}

impl Circuit {
    pub fn new() -> Self {
        Circuit::default()
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .gates
            .iter()
            .enumerate()
            .map(|(i, g)| (g.name.clone(), i))
            .collect();
    }

    fn gate(&self, name: &str) -> Option<&Gate> {
        self.index.get(name).map(|&i| &self.gates[i])
    }

    fn gate_mut(&mut self, name: &str) -> Option<&mut Gate> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.gates[i]),
            None => None,
        }
    }

    /// All gates, in insertion order.
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    fn push_gate(&mut self, gate: Gate) -> Result<(), ParseError> {
        ensure!(
            !self.index.contains_key(&gate.name),
            DuplicateGateNameSnafu { name: gate.name }
        );
        self.index.insert(gate.name.clone(), self.gates.len());
        self.gates.push(gate);
        Ok(())
    }

    /// Insert `gate` at position `pos` in the gate ordering (used by the
    /// locking engine to splice in key/mux/decoy gates), shifting later
    /// gates' arena indices and rebuilding the name index.
    pub(crate) fn insert_gate_at(&mut self, pos: usize, gate: Gate) {
        self.gates.insert(pos, gate);
        self.rebuild_index();
    }

    pub(crate) fn position_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.gates.len()
    }

    /// The input names of gate `name` (used by the locking engine to find a
    /// route node's current predecessor before splicing in a MUX).
    pub(crate) fn gate_inputs(&self, name: &str) -> &[String] {
        &self.gate(name).expect("gate must exist").inputs
    }

    /// Replace the first occurrence of `old` in the inputs of the gate at
    /// arena position `pos` with `new` (`next_g.inputs[i] = mux_name` in the
    /// original locking engine).
    pub(crate) fn rewrite_input(&mut self, pos: usize, old: &str, new: &str) {
        let gate = &mut self.gates[pos];
        if let Some(slot) = gate.inputs.iter_mut().find(|i| i.as_str() == old) {
            *slot = new.to_string();
        }
    }

    /// Parse a bench-file body (not a path — callers reading from disk open
    /// the file themselves and pass its contents here).
    pub fn parse(text: &str) -> Result<Circuit, CircuitError> {
        let mut circuit = Circuit::new();
        let mut pending_outputs: Vec<(usize, String)> = Vec::new();

        for (line_no, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim().to_lowercase();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('#') {
                if !rest.is_empty() && rest.chars().all(|c| c == '0' || c == '1') {
                    circuit.correct_key = rest.chars().map(|c| c == '1').collect();
                }
                continue;
            }

            if let Some(inner) = strip_directive(&line, "input(") {
                let name = inner.trim().to_string();
                circuit.push_gate(Gate::new(GateOp::Input, name.clone(), Vec::new()))?;
                if name.contains('k') {
                    circuit.key_gates.push(name);
                } else {
                    circuit.input_gates.push(name);
                }
            } else if let Some(inner) = strip_directive(&line, "output(") {
                pending_outputs.push((line_no, inner.trim().to_string()));
            } else {
                let (name, rest) = line
                    .split_once('=')
                    .with_context(|| MalformedLineSnafu {
                        line_no,
                        line: raw_line.to_string(),
                    })?;
                let name = name.trim().to_string();
                let rest = rest.trim();
                let open = rest.find('(').with_context(|| MalformedLineSnafu {
                    line_no,
                    line: raw_line.to_string(),
                })?;
                let close = rest.rfind(')').with_context(|| MalformedLineSnafu {
                    line_no,
                    line: raw_line.to_string(),
                })?;
                ensure!(
                    close > open,
                    MalformedLineSnafu {
                        line_no,
                        line: raw_line.to_string()
                    }
                );
                let op_str = rest[..open].trim();
                let op = op_str
                    .parse::<GateOp>()
                    .ok()
                    .with_context(|| MalformedLineSnafu {
                        line_no,
                        line: raw_line.to_string(),
                    })?;
                let inputs: Vec<String> = rest[open + 1..close]
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                circuit.push_gate(Gate::new(op, name, inputs))?;
            }
        }

        for (line_no, name) in pending_outputs {
            ensure!(
                circuit.index.contains_key(&name),
                UnknownGateReferenceSnafu {
                    name: name.clone(),
                    referenced_by: format!("OUTPUT at line {line_no}"),
                }
            );
            circuit.output_gates.push(name);
        }

        for gate in &circuit.gates {
            for input in &gate.inputs {
                ensure!(
                    circuit.index.contains_key(input),
                    UnknownGateReferenceSnafu {
                        name: input.clone(),
                        referenced_by: gate.name.clone(),
                    }
                );
            }
        }

        log::debug!(
            "parsed circuit: {} gates, {} inputs, {} key bits, {} outputs",
            circuit.gates.len(),
            circuit.input_gates.len(),
            circuit.key_gates.len(),
            circuit.output_gates.len()
        );

        Ok(circuit)
    }

    /// Transform every gate with arity > 2 into a chain of 2-input gates,
    /// preserving semantics, then (re)assign literals in the resulting
    /// insertion order: the k-th gate gets literal `k + 1`.
    pub fn simplify_gates(&mut self) -> Result<(), CircuitError> {
        let mut new_gates: Vec<Gate> = Vec::with_capacity(self.gates.len());
        let mut cnt: usize = 0;
        let mut fresh = || {
            let name = format!("g_{cnt}");
            cnt += 1;
            name
        };

        for gate in self.gates.clone() {
            if gate.inputs.len() <= 2 {
                new_gates.push(gate);
                continue;
            }

            if gate.op == GateOp::Mux {
                let a = gate.inputs[0].clone();
                let b = gate.inputs[1].clone();
                let s = gate.inputs[2].clone();
                let not_s = fresh();
                new_gates.push(Gate::new(GateOp::Not, not_s.clone(), vec![s.clone()]));
                let and_a = fresh();
                new_gates.push(Gate::new(GateOp::And, and_a.clone(), vec![a, not_s]));
                let and_b = fresh();
                new_gates.push(Gate::new(GateOp::And, and_b.clone(), vec![b, s]));
                new_gates.push(Gate::new(GateOp::Or, gate.name.clone(), vec![and_a, and_b]));
                continue;
            }

            let chain_op = if gate.op == GateOp::Nand {
                GateOp::And
            } else {
                gate.op
            };
            let mut prev = fresh();
            new_gates.push(Gate::new(
                chain_op,
                prev.clone(),
                vec![gate.inputs[0].clone(), gate.inputs[1].clone()],
            ));
            for i in 2..gate.inputs.len() {
                if i == gate.inputs.len() - 1 {
                    let final_op = if gate.op == GateOp::Nand {
                        GateOp::Nand
                    } else {
                        chain_op
                    };
                    new_gates.push(Gate::new(
                        final_op,
                        gate.name.clone(),
                        vec![gate.inputs[i].clone(), prev.clone()],
                    ));
                } else {
                    let next = fresh();
                    new_gates.push(Gate::new(
                        chain_op,
                        next.clone(),
                        vec![gate.inputs[i].clone(), prev.clone()],
                    ));
                    prev = next;
                }
            }
        }

        self.gates = new_gates;
        self.rebuild_index();

        self.literals.clear();
        for (i, gate) in self.gates.iter().enumerate() {
            self.literals.insert(gate.name.clone(), (i + 1) as i64);
        }

        log::trace!("simplify_gates: {} gates after lowering", self.gates.len());
        Ok(())
    }

    /// Forward adjacency: `u -> v` whenever `u` appears in `v.inputs`.
    pub fn to_graph(&self) -> HashMap<String, Vec<String>> {
        let mut graph: HashMap<String, Vec<String>> = HashMap::new();
        for gate in &self.gates {
            if gate.op == GateOp::Input {
                continue;
            }
            for input in &gate.inputs {
                graph.entry(input.clone()).or_default().push(gate.name.clone());
            }
        }
        graph
    }

    /// Emit CNF for every non-input gate via the Tseytin encoder, using the
    /// first one or two input literals (requires `simplify_gates` to have
    /// run — `Mux` gates are lowered away by it and never reach here).
    pub fn to_cnf(&self) -> Result<Cnf, CircuitError> {
        let mut cnf = Cnf::new();
        for gate in &self.gates {
            if gate.op == GateOp::Input {
                continue;
            }
            let y = self.literal_of(&gate.name)?;
            let a = self.literal_of(&gate.inputs[0])?;
            let b = match gate.inputs.get(1) {
                Some(name) => Some(self.literal_of(name)?),
                None => None,
            };
            cnf.extend(tseytin::encode(gate.op, y, a, b)?);
        }
        Ok(cnf)
    }

    fn literal_of(&self, name: &str) -> Result<Literal, CircuitError> {
        self.literals
            .get(name)
            .map(|&l| Literal::new(l))
            .with_context(|| MissingLiteralSnafu {
                name: name.to_string(),
            })
    }

    /// Assign primary-input values in order, then walk gates in insertion
    /// order, evaluating each. Gate insertion order is assumed topological
    /// (the parser and the locking engine are both required to preserve
    /// this). Key gates must already carry a value (see
    /// [`Circuit::unlock_with`]) or simulation fails with
    /// `UnassignedGate`.
    pub fn simulate(&mut self, inputs: &[bool]) -> Result<Vec<bool>, CircuitError> {
        for (i, name) in self.input_gates.clone().iter().enumerate() {
            if let Some(gate) = self.gate_mut(name) {
                gate.value = Some(inputs[i]);
            }
        }

        for i in 0..self.gates.len() {
            let gate = &self.gates[i];
            if gate.op == GateOp::Input {
                continue;
            }
            let mut values = Vec::with_capacity(gate.inputs.len());
            for input_name in &gate.inputs {
                let idx = *self
                    .index
                    .get(input_name)
                    .expect("parse()/simplify_gates() guarantee every input name exists");
                let value = self.gates[idx]
                    .value
                    .with_context(|| UnassignedGateSnafu {
                        name: input_name.clone(),
                    })?;
                values.push(value);
            }
            let op = gate.op;
            let result = gate::eval(op, &values)?;
            self.gates[i].value = Some(result);
        }

        self.output_gates
            .clone()
            .iter()
            .map(|name| {
                self.gate(name)
                    .and_then(|g| g.value)
                    .with_context(|| UnassignedGateSnafu { name: name.clone() })
            })
            .collect()
    }

    /// Pre-assign every key gate's value from `key`, in `key_gates` order,
    /// so a subsequent `simulate` behaves like the unlocked twin.
    pub fn unlock_with(&mut self, key: &[bool]) {
        for (i, name) in self.key_gates.clone().iter().enumerate() {
            if let Some(gate) = self.gate_mut(name) {
                gate.value = Some(key[i]);
            }
        }
    }

    /// Unlock using this circuit's own `correct_key`.
    pub fn unlock(&mut self) {
        let key = self.correct_key.clone();
        self.unlock_with(&key);
    }

    pub fn key_literals(&self) -> HashMap<String, i64> {
        self.key_gates
            .iter()
            .filter_map(|n| self.literals.get(n).map(|&l| (n.clone(), l)))
            .collect()
    }

    pub fn input_literals(&self) -> HashMap<String, i64> {
        self.input_gates
            .iter()
            .filter_map(|n| self.literals.get(n).map(|&l| (n.clone(), l)))
            .collect()
    }

    pub fn output_literals(&self) -> HashMap<String, i64> {
        self.output_gates
            .iter()
            .filter_map(|n| self.literals.get(n).map(|&l| (n.clone(), l)))
            .collect()
    }

    pub fn literal_map(&self) -> &HashMap<String, i64> {
        &self.literals
    }

    pub(crate) fn set_literal(&mut self, name: &str, lit: i64) {
        self.literals.insert(name.to_string(), lit);
    }

    pub(crate) fn max_literal(&self) -> i64 {
        self.literals.values().copied().max().unwrap_or(0)
    }

    /// Write this circuit back out in bench format: the correct-key
    /// comment, primary inputs, key inputs, outputs, then every non-input
    /// gate definition — the inverse of [`Circuit::parse`].
    pub fn emit(&self) -> String {
        let mut out = String::new();
        out.push('#');
        for bit in &self.correct_key {
            out.push(if *bit { '1' } else { '0' });
        }
        out.push('\n');
        for name in &self.input_gates {
            out.push_str(&format!("INPUT({name})\n"));
        }
        for name in &self.key_gates {
            out.push_str(&format!("INPUT({name})\n"));
        }
        for name in &self.output_gates {
            out.push_str(&format!("OUTPUT({name})\n"));
        }
        out.push('\n');
        for gate in &self.gates {
            if gate.op == GateOp::Input {
                continue;
            }
            out.push_str(&format!(
                "{} = {}({})\n",
                gate.name,
                gate.op,
                gate.inputs.join(", ")
            ));
        }
        out
    }
}

fn strip_directive<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    if !line.starts_with(prefix) {
        return None;
    }
    line.strip_prefix(prefix)?.strip_suffix(')')
}

#[cfg(test)]
mod tests {
    use super::*;

    const C17_LIKE: &str = "\
#0
INPUT(g0)
INPUT(g1)
INPUT(g2)
INPUT(g3)
INPUT(g4)
OUTPUT(g15)
OUTPUT(g16)
g10 = nand(g1, g3)
g11 = nand(g3, g4)
g15 = nand(g10, g16)
g16 = nand(g2, g11)
";

    #[test]
    fn parse_reads_inputs_outputs_and_gates() {
        let c = Circuit::parse(C17_LIKE).unwrap();
        assert_eq!(c.input_gates.len(), 5);
        assert_eq!(c.output_gates, vec!["g15", "g16"]);
        assert_eq!(c.gates().len(), 9);
    }

    #[test]
    fn key_inputs_identified_by_letter_k() {
        let text = "INPUT(a)\nINPUT(k0)\nOUTPUT(y)\ny = xor(a, k0)\n";
        let c = Circuit::parse(text).unwrap();
        assert_eq!(c.input_gates, vec!["a"]);
        assert_eq!(c.key_gates, vec!["k0"]);
    }

    #[test]
    fn correct_key_comment_is_parsed() {
        let text = "#10\nINPUT(a)\nINPUT(k0)\nINPUT(k1)\nOUTPUT(a)\n";
        let c = Circuit::parse(text).unwrap();
        assert_eq!(c.correct_key, vec![true, false]);
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let text = "INPUT(a)\nOUTPUT(a)\ny = not(b)\n";
        assert!(matches!(
            Circuit::parse(text),
            Err(CircuitError::Parse {
                source: ParseError::UnknownGateReference { .. }
            })
        ));
    }

    #[test]
    fn duplicate_gate_name_is_an_error() {
        let text = "INPUT(a)\nINPUT(a)\nOUTPUT(a)\n";
        assert!(matches!(
            Circuit::parse(text),
            Err(CircuitError::Parse {
                source: ParseError::DuplicateGateName { .. }
            })
        ));
    }

    #[test]
    fn simplify_4_input_and_matches_truth_table() {
        let text = "INPUT(a)\nINPUT(b)\nINPUT(c)\nINPUT(d)\nOUTPUT(y)\ny = and(a, b, c, d)\n";
        let mut c = Circuit::parse(text).unwrap();
        c.simplify_gates().unwrap();
        // literals assigned 1..N in insertion order
        let lits = c.literal_map();
        assert_eq!(lits.len(), c.gates().len());
        for (i, gate) in c.gates().iter().enumerate() {
            assert_eq!(lits[&gate.name], (i + 1) as i64);
        }

        for bits in crate::helpers::generate_binlist(4) {
            let mut c2 = c.clone();
            let out = c2.simulate(&bits).unwrap();
            let expected = bits.iter().all(|&b| b);
            assert_eq!(out, vec![expected]);
        }
    }

    #[test]
    fn mux_lowering_matches_truth_table() {
        let text = "INPUT(a)\nINPUT(b)\nINPUT(s)\nOUTPUT(y)\ny = mux(a, b, s)\n";
        let mut c = Circuit::parse(text).unwrap();
        c.simplify_gates().unwrap();
        assert_eq!(c.gates().len(), 7); // a,b,s + not + 2*and + or

        for a in [false, true] {
            for b in [false, true] {
                for s in [false, true] {
                    let mut c2 = c.clone();
                    let out = c2.simulate(&[a, b, s]).unwrap();
                    let expected = if s { b } else { a };
                    assert_eq!(out, vec![expected]);
                }
            }
        }
    }

    #[test]
    fn simplify_nand_chain_uses_and_then_final_nand() {
        let text = "INPUT(a)\nINPUT(b)\nINPUT(c)\nOUTPUT(y)\ny = nand(a, b, c)\n";
        let mut c = Circuit::parse(text).unwrap();
        c.simplify_gates().unwrap();
        for bits in crate::helpers::generate_binlist(3) {
            let mut c2 = c.clone();
            let out = c2.simulate(&bits).unwrap();
            let expected = !(bits[0] && bits[1] && bits[2]);
            assert_eq!(out, vec![expected]);
        }
    }

    #[test]
    fn emit_round_trips_through_parse() {
        let text = "INPUT(a)\nINPUT(b)\nOUTPUT(y)\ny = xor(a, b)\n";
        let c = Circuit::parse(text).unwrap();
        let emitted = c.emit();
        let c2 = Circuit::parse(&emitted).unwrap();
        assert_eq!(c.input_gates, c2.input_gates);
        assert_eq!(c.output_gates, c2.output_gates);
        assert_eq!(c.gates().len(), c2.gates().len());
    }

    #[test]
    fn unlock_then_simulate_uses_correct_key() {
        let text = "#1\nINPUT(a)\nINPUT(k0)\nOUTPUT(y)\ny = xor(a, k0)\n";
        let mut c = Circuit::parse(text).unwrap();
        c.unlock();
        let out = c.simulate(&[false]).unwrap();
        assert_eq!(out, vec![true]);
    }
}
