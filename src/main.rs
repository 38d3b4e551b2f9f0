//! snackstack CLI. Synthesizes the StartupSnack stacks to CloudFormation.

use clap::Parser;
use snackstack::cli::Cli;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = snackstack::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
