use clap::Parser;
use dailytrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
