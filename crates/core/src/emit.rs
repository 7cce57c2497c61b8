//! Persistence of generated modules.
//!
//! Writes go to a sibling temp file first and land via rename, so a failed
//! run never leaves a half-written module and reruns with unchanged inputs
//! produce byte-identical files.

use crate::error::Result;
use crate::model::GeneratedModule;
use std::fs;
use tracing::info;

pub fn write(module: &GeneratedModule) -> Result<()> {
    if let Some(parent) = module.path.parent() {
        fs::create_dir_all(parent)?;
    }

    let staging = module.path.with_extension("ts.tmp");
    fs::write(&staging, module.body.as_bytes())?;
    fs::rename(&staging, &module.path)?;

    info!(
        output = %module.path.display(),
        bytes = module.body.len(),
        "Wrote generated module"
    );
    Ok(())
}
