use anyhow::Result;
use clap::Parser;

use parloop::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
