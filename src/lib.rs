#![deny(elided_lifetimes_in_paths)]

mod attack;
mod circuit;
mod gate;
mod helpers;
mod locking;
mod sat;
mod tseytin;

// re-export
pub use attack::{
    sat_attack, sat_attack_detailed, AttackConfig, AttackError, AttackReport, CircuitOracle,
    Oracle,
};
pub use circuit::{Circuit, CircuitError, Gate, ParseError};
pub use gate::{eval, EvalError, GateOp};
pub use helpers::{binlist, generate_binlist, success_rate};
pub use locking::{
    find_routes, lock_circuit, lock_circuit_strict, DecoyStrategy, LockConfig, LockError, Route,
};
pub use sat::{solve_cnf, DpllSolver, SatError, SatResult, SatSolver};
pub use tseytin::{encode, Clause, Cnf, EncodeError, Literal};

/// Union of every error this crate can return.
///
/// Individual modules keep their own narrow `snafu` error enums (mirroring
/// how the rest of this crate is structured, one concern per module); this
/// is only a thin composing layer for callers (the demo CLIs, mostly) that
/// want a single `Result<_, Error>` instead of matching on each one.
#[derive(Debug, snafu::Snafu)]
pub enum Error {
    #[snafu(display("{source}"))]
    Circuit { source: CircuitError },
    #[snafu(display("{source}"))]
    Attack { source: AttackError },
    #[snafu(display("{source}"))]
    Lock { source: LockError },
    #[snafu(display("{source}"))]
    Sat { source: SatError },
}

impl From<CircuitError> for Error {
    fn from(source: CircuitError) -> Self {
        Error::Circuit { source }
    }
}

impl From<AttackError> for Error {
    fn from(source: AttackError) -> Self {
        Error::Attack { source }
    }
}

impl From<LockError> for Error {
    fn from(source: LockError) -> Self {
        Error::Lock { source }
    }
}

impl From<SatError> for Error {
    fn from(source: SatError) -> Self {
        Error::Sat { source }
    }
}
