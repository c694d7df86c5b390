use anyhow::Result;
use butterfly_ebg::cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    Cli::parse().run()
}
