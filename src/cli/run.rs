//! Function for running the command line program.

use super::{build, simulate::run_simulate_subcommand};
use clap::ArgMatches;
use std::time::Instant;

/// Runs the `sextant` command line program.
pub fn run() {
    run_with_args(build::build().get_matches());
}

/// Runs the `sextant` command line program with the given parsed arguments.
pub fn run_with_args(arguments: ArgMatches) {
    let start_instant = Instant::now();

    if let Some(simulate_arguments) = arguments.subcommand_matches("simulate") {
        run_simulate_subcommand(simulate_arguments);
    }

    if arguments.get_flag("timing") {
        println!("Elapsed time: {} s", start_instant.elapsed().as_secs_f64());
    }
}
