use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;

use cli::{cmd_defs, cmd_index, cmd_inspect, cmd_lookup};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "dumpidx")]
#[command(version = VERSION)]
#[command(about = concat!("dumpidx v", env!("CARGO_PKG_VERSION"), " - RVA and type indexes over dump listings"))]
#[command(long_about = concat!(
    "dumpidx v", env!("CARGO_PKG_VERSION"), " - RVA and type indexes over dump listings\n\n",
    "Builds companion index files next to an analyzer dump so that RVAs\n",
    "learned at runtime (e.g. from stack frames) resolve to the matching\n",
    "dump line in O(log n), without loading the dump itself."
))]
#[command(author)]
#[command(propagate_version = true)]
struct Cli {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Index(cmd_index::IndexCommand),
    Defs(cmd_defs::DefsCommand),
    Lookup(cmd_lookup::LookupCommand),
    Inspect(cmd_inspect::InspectCommand),
}

/// Library logging goes to stderr without timestamps or targets; the
/// `[RVA Index]`/`[Defs]` component prefixes on the messages themselves
/// already say where a line came from. `RUST_LOG` overrides everything.
fn init_logger(verbose: bool, quiet: bool) {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::init();
        return;
    }

    let level = match (quiet, verbose) {
        (true, _) => log::LevelFilter::Error,
        (false, true) => log::LevelFilter::Debug,
        (false, false) => log::LevelFilter::Warn,
    };

    env_logger::Builder::new()
        .filter_module("dumpidx", level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Index(cmd) => cmd_index::run(cmd, cli.quiet)?,
        Commands::Defs(cmd) => cmd_defs::run(cmd, cli.quiet)?,
        Commands::Lookup(cmd) => cmd_lookup::run(cmd)?,
        Commands::Inspect(cmd) => cmd_inspect::run(cmd)?,
    }

    Ok(())
}
