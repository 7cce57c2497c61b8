//! Generation configuration, loaded from a `shadowcast.json` file or built
//! programmatically by embedders.

use crate::error::{Result, ShadowcastError};
use crate::model::RouterRegistration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A (file, class) pair designating a context provider or middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolLocation {
    pub file: PathBuf,
    pub class: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Project root the analysis runs under; path aliases resolve here.
    pub source_root: PathBuf,
    /// Router-shape module destination: a `.ts` file, or a directory that
    /// receives `server.ts`.
    pub output: PathBuf,
    /// Helper-types module destination; defaults to `types.ts` next to the
    /// router module.
    pub types_output: Option<PathBuf>,
    /// tsconfig-style specifier substitutions, e.g. `"@app/*": "src/*"`.
    pub path_aliases: BTreeMap<String, String>,
    /// File-name suffix used by router discovery.
    pub router_suffix: String,
    /// The context provider whose `create` return shapes the base context.
    pub context: Option<SymbolLocation>,
    /// Middleware classes contributing `<Name>Context` interfaces.
    pub middlewares: Vec<SymbolLocation>,
    /// Explicit router registry; when empty, routers are discovered by
    /// scanning `source_root` for files matching `router_suffix`.
    pub registry: Vec<RouterRegistration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("."),
            output: PathBuf::from("generated"),
            types_output: None,
            path_aliases: BTreeMap::new(),
            router_suffix: ".router.ts".to_string(),
            context: None,
            middlewares: Vec::new(),
            registry: Vec::new(),
        }
    }
}

impl Config {
    /// Reads a JSON config file. Relative paths inside the file are
    /// interpreted relative to the file's own directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.resolved_against(base))
    }

    /// Re-roots every relative path in the config onto `base`.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        self.source_root = join_if_relative(base, &self.source_root);
        self.output = join_if_relative(base, &self.output);
        self.types_output = self
            .types_output
            .map(|path| join_if_relative(base, &path));
        if let Some(context) = &mut self.context {
            context.file = join_if_relative(base, &context.file);
        }
        for middleware in &mut self.middlewares {
            middleware.file = join_if_relative(base, &middleware.file);
        }
        for registration in &mut self.registry {
            registration.source_file = join_if_relative(base, &registration.source_file);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.source_root.is_dir() {
            return Err(ShadowcastError::Config(format!(
                "source root '{}' is not a directory",
                self.source_root.display()
            )));
        }
        if self.router_suffix.is_empty() {
            return Err(ShadowcastError::Config(
                "router suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// True when the helper-types module has anything to say.
    pub fn wants_helper_types(&self) -> bool {
        self.context.is_some() || !self.middlewares.is_empty()
    }

    /// Concrete path of the router-shape module.
    pub fn router_module_path(&self) -> PathBuf {
        crate::assemble::server_file_path(&self.output)
    }

    /// Concrete path of the helper-types module, when one will be written.
    pub fn helper_module_path(&self) -> Option<PathBuf> {
        if !self.wants_helper_types() {
            return None;
        }
        Some(self.types_output.clone().unwrap_or_else(|| {
            self.router_module_path()
                .parent()
                .map_or_else(|| PathBuf::from("types.ts"), |dir| dir.join("types.ts"))
        }))
    }
}

fn join_if_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
