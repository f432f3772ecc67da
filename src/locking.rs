//! Cycle-insertion logic locking: find disjoint routes through the circuit
//! graph, splice a key-selected MUX into each node of a route so the last
//! node feeds back into the first, and pad each hop with decoy logic.

use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use snafu::prelude::*;

use crate::circuit::{Circuit, CircuitError, Gate};
use crate::gate::GateOp;

#[derive(Debug, Snafu)]
pub enum LockError {
    #[snafu(display("{source}"))]
    Circuit { source: CircuitError },
    #[snafu(display(
        "found only {found} disjoint route(s), requested {requested}"
    ))]
    NoRoutesFound { found: usize, requested: usize },
}

impl From<CircuitError> for LockError {
    fn from(source: CircuitError) -> Self {
        LockError::Circuit { source }
    }
}

/// A single cycle-locking route: an ordered list of gate names that will be
/// wired last-feeds-first via inserted MUX gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route(pub Vec<String>);

/// Which decoy construction [`lock_circuit`] inserts at each non-first hop
/// of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoyStrategy {
    /// A two-gate `or`/`nand` dummy pair wired to random primary inputs
    /// (`add_dummy_logic` in the original locking engine — the variant
    /// actually wired into the main locking pipeline).
    DummyPair,
    /// A single gate, chosen at random from the gates outside every route,
    /// reused as-is rather than synthesizing new dummy logic.
    RandomExisting,
}

/// Knobs for [`lock_circuit`].
#[derive(Debug, Clone)]
pub struct LockConfig {
    pub max_len: usize,
    pub max_routes: usize,
    pub key: Vec<bool>,
    pub dummy_logic: DecoyStrategy,
    pub seed: u64,
}

/// Recursive DFS collecting every simple path of exactly `max_len` nodes
/// starting at `u` (`find_routes_util` in the original locking engine).
fn find_routes_util(
    graph: &hashbrown::HashMap<String, Vec<String>>,
    u: &str,
    visited: &mut Vec<String>,
    curr_route: &mut Vec<String>,
    routes: &mut Vec<Vec<String>>,
    max_len: usize,
) {
    visited.push(u.to_string());
    curr_route.push(u.to_string());
    if curr_route.len() == max_len {
        routes.push(curr_route.clone());
    } else if let Some(neighbors) = graph.get(u) {
        for v in neighbors {
            if !visited.contains(v) {
                find_routes_util(graph, v, visited, curr_route, routes, max_len);
            }
        }
    }
    curr_route.pop();
    visited.pop();
}

/// Find up to `max_routes` node-disjoint simple paths of length `max_len` in
/// `graph`, each avoiding primary inputs (`find_routes` in the original
/// locking engine).
pub fn find_routes(
    c: &Circuit,
    graph: &hashbrown::HashMap<String, Vec<String>>,
    max_len: usize,
    max_routes: usize,
    rng: &mut ChaChaRng,
) -> Vec<Route> {
    let mut routes: Vec<Vec<String>> = Vec::new();
    let mut used: Vec<String> = Vec::new();
    let mut keys: Vec<String> = graph
        .keys()
        .filter(|k| !c.input_gates.contains(k))
        .cloned()
        .collect();
    keys.sort();

    while !keys.is_empty() {
        let idx = rng.gen_range(0..keys.len());
        let u = keys.remove(idx);

        let mut visited = Vec::new();
        let mut paths = Vec::new();
        let mut curr_path = Vec::new();
        find_routes_util(graph, &u, &mut visited, &mut curr_path, &mut paths, max_len);

        for p in paths {
            if !p.iter().any(|n| used.contains(n)) {
                used.extend(p.iter().cloned());
                routes.push(p);
                if routes.len() == max_routes {
                    return routes.into_iter().map(Route).collect();
                }
            }
        }
    }
    routes.into_iter().map(Route).collect()
}

/// Append `key.len()` fresh key-input gates right after the existing primary
/// inputs (`add_key` in the original locking engine).
fn add_key(c: &mut Circuit, key: &[bool]) {
    c.correct_key = key.to_vec();
    let pos = c.input_gates.len();
    for i in 0..key.len() {
        let name = format!("k{i}");
        c.insert_gate_at(pos + i, Gate::input(name.clone()));
        c.key_gates.push(name);
    }
}

/// Insert a two-gate `or`/`nand` decoy pair wired to random primary inputs,
/// at position `pos` (`add_dummy_logic` in the original locking engine).
fn add_dummy_logic(c: &mut Circuit, name1: &str, name2: &str, pos: usize, rng: &mut ChaChaRng) {
    let inputs = &c.input_gates;
    let a1 = inputs.choose(rng).expect("circuit has at least one primary input").clone();
    let a2 = inputs.choose(rng).expect("circuit has at least one primary input").clone();
    let a3 = inputs.choose(rng).expect("circuit has at least one primary input").clone();

    c.insert_gate_at(pos, Gate::new(GateOp::Or, name1, vec![a1, a2]));
    c.insert_gate_at(pos + 1, Gate::new(GateOp::Nand, name2, vec![name1.to_string(), a3]));
}

/// Splice a key-selected MUX between `prev_g1`/`prev_g2` and `next_g`,
/// rewiring `next_g`'s reference to `prev_g1` to point at the new MUX
/// instead (`add_mux_gate` in the original locking engine). The MUX's input
/// order is reversed when `key_val` is true, so the correct key always picks
/// `prev_g1` (the route's true predecessor).
fn add_mux_gate(
    c: &mut Circuit,
    mux_name: &str,
    next_g: &str,
    prev_g1: &str,
    prev_g2: &str,
    key_g: &str,
    key_val: bool,
    pos: usize,
) {
    let mut mux_inputs = vec![prev_g1.to_string(), prev_g2.to_string()];
    if key_val {
        mux_inputs.reverse();
    }
    mux_inputs.push(key_g.to_string());

    let next_pos = c.position_of(next_g).expect("next_g must already be in the circuit");
    c.rewrite_input(next_pos, prev_g1, mux_name);
    c.insert_gate_at(pos, Gate::new(GateOp::Mux, mux_name, mux_inputs));
}

/// Wire a single route into a feedback cycle: at the route's head, splice a
/// MUX selecting between the gate's real predecessor and the route's tail;
/// at every later hop, pad with decoy logic before splicing the MUX between
/// consecutive route nodes (`lock_route` in the original locking engine).
fn lock_route(
    c: &mut Circuit,
    graph: &hashbrown::HashMap<String, Vec<String>>,
    route: &Route,
    key: &[bool],
    r_counter: usize,
    strategy: DecoyStrategy,
    rng: &mut ChaChaRng,
) {
    let route = &route.0;
    for (i, next_g) in route.iter().enumerate() {
        let mux_name = format!("m{}", r_counter + i);
        let key_g = format!("k{}", r_counter + i);
        let pos = c.position_of(next_g).expect("route node must exist");

        if i == 0 {
            let prev_g1 = c.gate_inputs(next_g)[0].clone();
            let prev_g2 = route.last().expect("route is non-empty").clone();
            add_mux_gate(
                c,
                &mux_name,
                next_g,
                &prev_g1,
                &prev_g2,
                &key_g,
                key[r_counter + i],
                pos,
            );
        } else {
            let prev_g1 = route[i - 1].clone();

            match strategy {
                DecoyStrategy::DummyPair => {
                    let d1 = format!("d{}_a", r_counter + i);
                    let d2 = format!("d{}_b", r_counter + i);
                    add_dummy_logic(c, &d1, &d2, pos, rng);
                    let pos = c.position_of(next_g).expect("route node must exist");
                    add_mux_gate(
                        c,
                        &mux_name,
                        next_g,
                        &prev_g1,
                        &d1,
                        &key_g,
                        key[r_counter + i],
                        pos,
                    );

                    if graph.get(&route[i - 1]).map(|v| v.len()).unwrap_or(0) == 1 {
                        let md_name = format!("md{}", r_counter + i);
                        let dd1 = format!("dd{}_a", r_counter + i);
                        let dd2 = format!("dd{}_b", r_counter + i);
                        let pos = c.position_of(next_g).expect("route node must exist");
                        add_dummy_logic(c, &dd1, &dd2, pos, rng);
                        let pos = c.position_of(&dd2).expect("just inserted");
                        add_mux_gate(
                            c,
                            &md_name,
                            &dd2,
                            &d1,
                            &prev_g1,
                            &key_g,
                            key[r_counter + i],
                            pos,
                        );
                    }
                }
                DecoyStrategy::RandomExisting => {
                    let candidates: Vec<String> = c
                        .gates()
                        .iter()
                        .map(|g| g.name.clone())
                        .filter(|n| !route.contains(n) && n != next_g)
                        .collect();
                    let decoy = candidates
                        .choose(rng)
                        .cloned()
                        .unwrap_or_else(|| prev_g1.clone());
                    add_mux_gate(
                        c,
                        &mux_name,
                        next_g,
                        &prev_g1,
                        &decoy,
                        &key_g,
                        key[r_counter + i],
                        pos,
                    );
                }
            }
        }
    }
}

/// Lock `c` in place: append key inputs, find up to `config.max_routes`
/// disjoint routes of length `config.max_len`, and wire each into a
/// feedback cycle keyed by `config.key` (`lock_circuit2` in the original
/// locking engine).
///
/// Exhausting the route search before finding any routes is not fatal: a
/// warning is logged and locking proceeds with zero routes (no key bits get
/// wired in for this call).
pub fn lock_circuit(c: &mut Circuit, config: &LockConfig) -> Result<Vec<Route>, LockError> {
    let graph = c.to_graph();
    add_key(c, &config.key);

    let mut rng = ChaChaRng::seed_from_u64(config.seed);
    let routes = find_routes(c, &graph, config.max_len, config.max_routes, &mut rng);

    if routes.len() < config.max_routes {
        log::warn!(
            "lock_circuit: found only {} of {} requested routes",
            routes.len(),
            config.max_routes
        );
    }

    let mut r_counter = 0usize;
    for route in &routes {
        lock_route(c, &graph, route, &config.key, r_counter, config.dummy_logic, &mut rng);
        r_counter += route.0.len();
    }

    log::info!(
        "lock_circuit: {} route(s), {} key bit(s) inserted",
        routes.len(),
        r_counter
    );

    Ok(routes)
}

/// Upper bound on how many times [`find_routes_retrying`] reseeds the RNG and
/// retries the route search before giving up (spec's "bounded retry budget").
const MAX_ROUTE_SEARCH_ATTEMPTS: u64 = 100;

/// Retry [`find_routes`] with a freshly reseeded RNG each time, up to
/// [`MAX_ROUTE_SEARCH_ATTEMPTS`] attempts, keeping the best (most-routes)
/// result seen. Fails with [`LockError::NoRoutesFound`] if no attempt ever
/// reaches `max_routes`.
fn find_routes_retrying(
    c: &Circuit,
    graph: &hashbrown::HashMap<String, Vec<String>>,
    max_len: usize,
    max_routes: usize,
    seed: u64,
) -> Result<Vec<Route>, LockError> {
    let mut best: Vec<Route> = Vec::new();
    for attempt in 0..MAX_ROUTE_SEARCH_ATTEMPTS {
        let mut rng = ChaChaRng::seed_from_u64(seed.wrapping_add(attempt));
        let routes = find_routes(c, graph, max_len, max_routes, &mut rng);
        if routes.len() > best.len() {
            best = routes;
        }
        if best.len() == max_routes {
            return Ok(best);
        }
    }
    ensure!(
        best.len() == max_routes,
        NoRoutesFoundSnafu {
            found: best.len(),
            requested: max_routes,
        }
    );
    Ok(best)
}

/// Lock `c` in place like [`lock_circuit`], but fail fast with
/// [`LockError::NoRoutesFound`] instead of warning and proceeding when the
/// route search can't find `config.max_routes` disjoint routes within
/// [`MAX_ROUTE_SEARCH_ATTEMPTS`] retries.
pub fn lock_circuit_strict(c: &mut Circuit, config: &LockConfig) -> Result<Vec<Route>, LockError> {
    let graph = c.to_graph();
    add_key(c, &config.key);

    let routes = find_routes_retrying(c, &graph, config.max_len, config.max_routes, config.seed)?;

    let mut rng = ChaChaRng::seed_from_u64(config.seed);
    let mut r_counter = 0usize;
    for route in &routes {
        lock_route(c, &graph, route, &config.key, r_counter, config.dummy_logic, &mut rng);
        r_counter += route.0.len();
    }

    log::info!(
        "lock_circuit_strict: {} route(s), {} key bit(s) inserted",
        routes.len(),
        r_counter
    );

    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_circuit() -> Circuit {
        let text = "\
INPUT(a)
INPUT(b)
OUTPUT(y)
g0 = and(a, b)
g1 = not(g0)
g2 = buf(g1)
y = not(g2)
";
        Circuit::parse(text).unwrap()
    }

    #[test]
    fn locking_inserts_requested_number_of_key_bits() {
        let mut c = chain_circuit();
        let config = LockConfig {
            max_len: 2,
            max_routes: 1,
            key: vec![true, false],
            dummy_logic: DecoyStrategy::DummyPair,
            seed: 42,
        };
        let routes = lock_circuit(&mut c, &config).unwrap();
        assert_eq!(c.key_gates.len(), 2);
        assert!(routes.len() <= 1);
    }

    #[test]
    fn routes_found_are_node_disjoint() {
        let c = chain_circuit();
        let graph = c.to_graph();
        let mut rng = ChaChaRng::seed_from_u64(7);
        let routes = find_routes(&c, &graph, 2, 2, &mut rng);

        let mut seen = std::collections::HashSet::new();
        for route in &routes {
            for node in &route.0 {
                assert!(seen.insert(node.clone()), "node {node} reused across routes");
            }
        }
    }

    #[test]
    fn strict_locking_fails_when_routes_are_exhausted() {
        let mut c = chain_circuit();
        // Only 4 non-input nodes (g0, g1, g2, y), so at most 2 disjoint
        // routes of length 2 exist regardless of seed or retry count.
        let config = LockConfig {
            max_len: 2,
            max_routes: 3,
            key: vec![true, false, true],
            dummy_logic: DecoyStrategy::DummyPair,
            seed: 1,
        };
        let result = lock_circuit_strict(&mut c, &config);
        assert!(matches!(result, Err(LockError::NoRoutesFound { .. })));
    }

    #[test]
    fn same_seed_produces_same_routes() {
        let c = chain_circuit();
        let graph = c.to_graph();
        let mut rng1 = ChaChaRng::seed_from_u64(99);
        let mut rng2 = ChaChaRng::seed_from_u64(99);
        let routes1 = find_routes(&c, &graph, 2, 1, &mut rng1);
        let routes2 = find_routes(&c, &graph, 2, 1, &mut rng2);
        assert_eq!(routes1, routes2);
    }
}
