//! cellbench - run several implementations side by side and compare them
//!
//! Thin command-line driver over the cellbench library: edits the saved
//! session, submits it to the execution service and prints the results.

use clap::Parser;
use cellbench::common::{config::Config, logging};
use cellbench::{cli, commands::Commands};

#[derive(Parser)]
#[command(name = "cellbench", about = "Differential testing across code cells")]
#[command(version, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _guard = logging::init_cli(cli.verbose);

    let result = match Config::load() {
        Ok(config) => cli::dispatch(cli.command, &config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
