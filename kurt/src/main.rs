//! Kurt CLI
//!
//! Scripts are read in frozen form: the JSON token stream produced by
//! `freeze`.

use clap::{Parser, Subcommand};
use kurt::{Config, Interpreter, KurtError, Value, freeze};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(name = "kurt", version, about = "Kurt - embedded scripting runtime")]
struct Cli {
    /// Runtime limits file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum nested application depth (overrides the config file)
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Thaw a frozen expression, evaluate it and print the result
    Eval {
        /// Frozen expression (JSON token stream)
        file: PathBuf,
    },
    /// Thaw a frozen value and print it without evaluating
    Show {
        /// Frozen value (JSON token stream)
        file: PathBuf,
    },
    /// Thaw and evaluate an expression, then print the frozen result
    Freeze {
        /// Frozen expression (JSON token stream)
        file: PathBuf,
    },
}

fn main() {
    kurt::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> kurt::Result<()> {
    let config = load_config(cli)?;
    let mut interp = Interpreter::with_config(config);

    match &cli.command {
        Command::Eval { file } => {
            let result = eval_file(&mut interp, file)?;
            println!("{result}");
        }
        Command::Show { file } => {
            let value = thaw_file(&interp, file)?;
            println!("{value}");
        }
        Command::Freeze { file } => {
            let result = eval_file(&mut interp, file)?;
            println!("{}", serde_json::to_string_pretty(&freeze::freeze(&result)?)?);
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> kurt::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };
    if let Some(max_depth) = cli.max_depth {
        config = config.with_max_depth(max_depth);
    }
    debug!(?config, "loaded config");
    Ok(config)
}

fn thaw_file(interp: &Interpreter, path: &Path) -> Result<Value, KurtError> {
    let source = std::fs::read_to_string(path)?;
    let frozen: serde_json::Value = serde_json::from_str(&source)?;
    Ok(freeze::thaw(&frozen, Some(interp.root()))?)
}

fn eval_file(interp: &mut Interpreter, path: &Path) -> Result<Value, KurtError> {
    let expr = thaw_file(interp, path)?;
    Ok(interp.evaluate(&expr)?)
}
