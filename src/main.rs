//! Entry point for the linkdedup CLI.

use clap::Parser;
use linkdedup::{cli::Cli, duplicates::ResolveError, error::ExitCode};

fn main() {
    let cli = Cli::parse();

    match linkdedup::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = match err.downcast_ref::<ResolveError>() {
                Some(ResolveError::RollbackFailed { .. }) => ExitCode::RollbackFailed,
                Some(ResolveError::Interrupted) => ExitCode::Interrupted,
                None => ExitCode::GeneralError,
            };

            eprintln!("Error: {:#}", err);
            std::process::exit(exit_code.as_i32());
        }
    }
}
