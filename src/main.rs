//! `bbank`: command-line front end for a blood bank directory.
//!
//! Run `bbank --help` for the list of commands.

use clap::Parser;

mod cli;
use cli::Cli;

fn main() -> anyhow::Result<()> {
    Cli::parse().run()
}
