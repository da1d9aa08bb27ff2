mod auth;
mod cli;
mod config;
mod logging;
mod maildir;
mod remote;
mod sync;

use std::process::ExitCode;

use clap::Parser as _;
use cli::Args;
use log::error;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            // usage errors exit with 1, not clap's default of 2
            let _ = e.print();
            return ExitCode::from(1);
        }
        Err(e) => e.exit(),
    };
    logging::init(args.verbose);

    match cli::run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
