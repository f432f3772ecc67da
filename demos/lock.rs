//! Run with eg:
//! - `cargo run --example=lock -- --in-path=c17.bench --out-path=c17_locked.bench --max-len=2 --max-routes=1 --key=10`

use clap::Parser;
use std::fs;

use sat_attack_rs::{lock_circuit, lock_circuit_strict, Circuit, DecoyStrategy, LockConfig};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the INPUT bench file
    #[clap(long)]
    in_path: String,

    /// Path to the OUTPUT (locked) bench file
    #[clap(long, default_value = "locked.bench")]
    out_path: String,

    /// Length of each inserted feedback route
    #[clap(long, default_value_t = 2)]
    max_len: usize,

    /// Number of disjoint routes to insert
    #[clap(long, default_value_t = 1)]
    max_routes: usize,

    /// The locking key, as a string of '0'/'1' characters
    #[clap(long)]
    key: String,

    /// Use the plain "pick a random existing gate" decoy variant instead of
    /// the synthesized or/nand dummy pair
    #[clap(long, default_value_t = false)]
    random_decoys: bool,

    /// The seed passed to ChaChaRng.
    /// Useful to have repeatable outputs; eg golden tests.
    /// NOTE: passed via `seed_from_u64` for simplicity so NOT secure!
    #[clap(long, default_value_t = 0)]
    seed: u64,

    /// Fail instead of warning and proceeding when the route search can't
    /// find `max_routes` disjoint routes after its retry budget
    #[clap(long, default_value_t = false)]
    strict: bool,
}

fn main() -> Result<(), sat_attack_rs::Error> {
    env_logger::init();
    let args = Args::parse();

    let text = fs::read_to_string(&args.in_path).expect("failed to read input bench file");
    let mut circuit = Circuit::parse(&text)?;

    let key: Vec<bool> = args.key.chars().map(|c| c == '1').collect();
    let config = LockConfig {
        max_len: args.max_len,
        max_routes: args.max_routes,
        key,
        dummy_logic: if args.random_decoys {
            DecoyStrategy::RandomExisting
        } else {
            DecoyStrategy::DummyPair
        },
        seed: args.seed,
    };

    let routes = if args.strict {
        lock_circuit_strict(&mut circuit, &config)?
    } else {
        lock_circuit(&mut circuit, &config)?
    };
    log::info!("inserted {} route(s)", routes.len());

    fs::write(&args.out_path, circuit.emit()).expect("failed to write output bench file");
    Ok(())
}
