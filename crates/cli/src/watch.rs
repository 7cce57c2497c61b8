use anyhow::Result;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use shadowcast_core::{Config, run_generation};
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{error, info};

pub fn run(config_path: &Path, debounce: Duration) -> Result<()> {
    let config = crate::generate::load_config(config_path)?;

    run_once(&config);

    let (sender, receiver) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(sender)?;
    watcher.watch(&config.source_root, RecursiveMode::Recursive)?;
    info!(root = %config.source_root.display(), "Watching for changes");

    while let Ok(event) = receiver.recv() {
        if !is_relevant(&event, &config) {
            continue;
        }
        // Absorb the burst of events an editor save produces.
        let deadline = Instant::now() + debounce;
        while receiver
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .is_ok()
        {}
        run_once(&config);
    }
    Ok(())
}

fn run_once(config: &Config) {
    match run_generation(config.clone()) {
        Ok(report) => info!(
            routers = report.router_count,
            procedures = report.procedure_count,
            duration_ms = report.duration_milliseconds,
            "Regenerated"
        ),
        // A failing run leaves the previous output alone; the next change
        // triggers another attempt.
        Err(cause) => error!(%cause, "Generation failed"),
    }
}

fn is_relevant(event: &notify::Result<Event>, config: &Config) -> bool {
    let Ok(event) = event else {
        return false;
    };
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }
    event.paths.iter().any(|path| is_source_file(path, config))
}

fn is_source_file(path: &Path, config: &Config) -> bool {
    let is_typescript = path
        .extension()
        .is_some_and(|ext| ext == "ts" || ext == "tsx");
    if !is_typescript {
        return false;
    }
    // Never retrigger on our own outputs.
    let router_module = config.router_module_path();
    if path == router_module {
        return false;
    }
    config.helper_module_path().is_none_or(|helper| path != helper)
}
