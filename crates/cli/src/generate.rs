use anyhow::{Context as _, Result};
use shadowcast_core::{Config, run_generation};
use std::path::Path;
use tracing::{info, warn};

pub fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let report = run_generation(config)?;

    for skipped in &report.skipped {
        warn!(
            router = %skipped.router,
            reason = %skipped.reason,
            "Router was skipped"
        );
    }
    info!(
        routers = report.router_count,
        procedures = report.procedure_count,
        duration_ms = report.duration_milliseconds,
        output = %report.router_module.display(),
        "Generation complete"
    );
    Ok(())
}

pub(crate) fn load_config(path: &Path) -> Result<Config> {
    if !path.is_file() {
        anyhow::bail!(
            "config file '{}' not found; create one or pass --config",
            path.display()
        );
    }
    Config::from_file(path).with_context(|| format!("failed to load '{}'", path.display()))
}
