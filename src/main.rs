use clap::Parser;
use emapyramid::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
