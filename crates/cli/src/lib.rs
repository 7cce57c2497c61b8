mod generate;
mod watch;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "shadowcast",
    version,
    about = "Generates a type-only shadow of a decorator-annotated RPC surface",
    long_about = "Shadowcast statically analyzes a TypeScript project containing \
                  decorator-annotated router classes and generates a self-contained \
                  router-shape module for type-only clients, without importing or \
                  executing any server code."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one generation pass
    Generate {
        /// Path to the shadowcast.json configuration file
        #[arg(short, long, default_value = "shadowcast.json", value_name = "FILE")]
        config: PathBuf,
    },
    /// Watch the source root and regenerate on change
    Watch {
        /// Path to the shadowcast.json configuration file
        #[arg(short, long, default_value = "shadowcast.json", value_name = "FILE")]
        config: PathBuf,

        /// Quiet window after a change before regenerating, in milliseconds
        #[arg(long, default_value_t = 250)]
        debounce_ms: u64,
    },
}

pub fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

pub use generate::run as run_generate;
pub use watch::run as run_watch;
