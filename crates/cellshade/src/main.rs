mod cli;
mod run;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    run::run(args)
}
