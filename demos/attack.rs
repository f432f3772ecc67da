//! Run with eg:
//! - `cargo run --example=attack -- --locked-path=c17_locked.bench --oracle-path=c17.bench`

use clap::Parser;
use std::fs;

use sat_attack_rs::{sat_attack_detailed, AttackConfig, Circuit, CircuitOracle};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the locked bench file under attack
    #[clap(long)]
    locked_path: String,

    /// Path to an unlocked bench file acting as the oracle
    #[clap(long)]
    oracle_path: String,

    /// Name of the SAT backend ("m22" or "dpll" route to the same in-crate
    /// DPLL solver; "kissat" is available when built with `--features
    /// kissat`)
    #[clap(long, default_value = "m22")]
    solver: String,

    /// Maximum number of DIP iterations before giving up
    #[clap(long, default_value_t = 100)]
    limit: usize,

    /// Emit per-iteration progress via the `log` facade
    #[clap(long, default_value_t = true)]
    verbose: bool,
}

fn main() -> Result<(), sat_attack_rs::Error> {
    env_logger::init();
    let args = Args::parse();

    let locked_text = fs::read_to_string(&args.locked_path).expect("failed to read locked bench file");
    let oracle_text = fs::read_to_string(&args.oracle_path).expect("failed to read oracle bench file");

    let locked = Circuit::parse(&locked_text)?;
    let oracle_circuit = Circuit::parse(&oracle_text)?;
    let oracle = CircuitOracle::new(oracle_circuit);

    let config = AttackConfig {
        solver: args.solver,
        limit: args.limit,
        verbose: args.verbose,
    };
    let report = sat_attack_detailed(&locked, &oracle, &config)?;

    let key_str: String = report
        .estimated_key
        .iter()
        .map(|b| if *b { '1' } else { '0' })
        .collect();
    println!("iterations: {}", report.iterations);
    println!("estimated key: {key_str}");
    println!("converged: {}", report.converged);
    if let Some(rate) = report.success_rate {
        println!("success rate: {rate}%");
    }
    Ok(())
}
