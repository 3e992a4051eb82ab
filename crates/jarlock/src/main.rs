//! `jarlock`: resolve Maven artifacts into a reproducible lockfile.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;
mod errors;
mod tracing;

use crate::cli::{Cli, Commands};
use crate::errors::{CliError, EXIT_FAILURE, EXIT_OK};
use crate::tracing::TracingConfig;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    if let Err(error) = crate::tracing::init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
    }) {
        eprintln!("{error:?}");
        std::process::exit(EXIT_FAILURE);
    }

    let code = match run(cli).await {
        Ok(()) => EXIT_OK,
        Err(error) => {
            let code = error.exit_code();
            eprintln!("{:?}", miette::Report::new(error));
            code
        }
    };
    std::process::exit(code);
}

#[::tracing::instrument(name = "jarlock_run", skip_all)]
async fn run(cli: Cli) -> Result<(), CliError> {
    match &cli.command {
        Commands::Resolve { args, repin } => {
            commands::resolve(&cli.config, &cli.lockfile, args, *repin).await
        }
        Commands::Verify { args } => commands::verify(&cli.config, &cli.lockfile, args).await,
        Commands::PrintPath { key } => commands::print_path(&cli.config, &cli.lockfile, key),
    }
}
