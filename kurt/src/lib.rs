//! Kurt: an embeddable runtime for a small dynamically typed expression
//! language
//!
//! Scripts and data share one representation, [`Value`]. Dictionaries act as
//! records, prototype objects and lexical scopes at once. Value graphs,
//! closures included, can be frozen to a flat token stream and thawed later.

pub mod actions;
pub mod config;
pub mod error;
pub mod freeze;
pub mod interp;
pub mod util;

pub use config::Config;
pub use error::{KurtError, Result};
pub use interp::{Dict, ErrorKind, EvalResult, Interpreter, RuntimeError, Value};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install the global `tracing` subscriber, filtered by `RUST_LOG`
/// (default `warn`). Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        // Another subscriber may already be installed by the host.
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
    });
}
