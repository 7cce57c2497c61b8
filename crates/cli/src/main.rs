use clap::Parser;
use shadowcast_cli::{Cli, Commands, default_log_level, run_generate, run_watch};
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = shadowcast_core::logging::init_logging("shadowcast", default_log_level(cli.verbose));

    let result = match &cli.command {
        Commands::Generate { config } => run_generate(config),
        Commands::Watch {
            config,
            debounce_ms,
        } => run_watch(config, Duration::from_millis(*debounce_ms)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(cause) => {
            error!("{cause:#}");
            ExitCode::FAILURE
        }
    }
}
