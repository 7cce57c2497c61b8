//! One generation run: registry, extraction, assembly, write.

use crate::assemble::assemble;
use crate::config::Config;
use crate::context::derive_helper_types;
use crate::discovery::discover_routers;
use crate::emit;
use crate::error::{Result, ShadowcastError};
use crate::extract::DescriptorExtractor;
use crate::model::{RequiredImport, RouterDescriptor};
use crate::project::ProjectCache;
use crate::resolver::{ImportsResolver, PathAliases};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Outcome of one generation run.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub router_count: usize,
    pub procedure_count: usize,
    pub skipped: Vec<SkippedRouter>,
    pub duration_milliseconds: u64,
    pub router_module: PathBuf,
    pub helper_module: Option<PathBuf>,
}

/// A router whose extraction failed; the rest of the run continued.
#[derive(Debug, Clone)]
pub struct SkippedRouter {
    pub router: String,
    pub reason: String,
}

/// Caches and configuration for a single generation run.
///
/// Constructed fresh per run and dropped at the end, so nothing parsed or
/// resolved leaks into the next run.
pub struct GeneratorSession {
    config: Config,
    cache: ProjectCache,
    resolver: ImportsResolver,
}

impl GeneratorSession {
    pub fn new(config: Config) -> Self {
        let aliases = PathAliases::new(&config.source_root, &config.path_aliases);
        Self {
            config,
            cache: ProjectCache::new(),
            resolver: ImportsResolver::new(aliases),
        }
    }

    pub fn cache(&self) -> &ProjectCache {
        &self.cache
    }

    pub fn run(&self) -> Result<GenerationReport> {
        let started = Instant::now();
        self.config.validate()?;

        let registry = if self.config.registry.is_empty() {
            discover_routers(&self.cache, &self.config)?
        } else {
            self.config.registry.clone()
        };
        if registry.is_empty() {
            return Err(ShadowcastError::Config(format!(
                "no routers registered or discovered under '{}'",
                self.config.source_root.display()
            )));
        }

        // Routers are independent: extraction fans out while the project and
        // import caches are shared. Collect preserves registry order.
        let extractor = DescriptorExtractor::new(&self.cache, &self.resolver);
        let outcomes: Vec<_> = registry
            .par_iter()
            .map(|registration| {
                (
                    registration.class_name.clone(),
                    extractor.extract(registration),
                )
            })
            .collect();

        let mut routers: Vec<RouterDescriptor> = Vec::new();
        let mut required: Vec<RequiredImport> = Vec::new();
        let mut skipped: Vec<SkippedRouter> = Vec::new();
        for (router_name, outcome) in outcomes {
            match outcome {
                Ok((descriptor, imports)) => {
                    routers.push(descriptor);
                    required.extend(imports);
                }
                Err(cause @ ShadowcastError::UnresolvedRouterDeclaration { .. }) => {
                    error!(router = %router_name, %cause, "Skipping router");
                    skipped.push(SkippedRouter {
                        router: router_name,
                        reason: cause.to_string(),
                    });
                }
                Err(fatal) => return Err(fatal),
            }
        }

        if routers.is_empty() {
            return Err(ShadowcastError::Config(
                "every registered router failed extraction".to_string(),
            ));
        }

        let router_module_path = self.config.router_module_path();
        let router_module = assemble(&routers, &required, &router_module_path)?;
        emit::write(&router_module)?;

        let helper_module = match self.config.helper_module_path() {
            Some(path) => {
                let module = derive_helper_types(
                    &self.cache,
                    self.config.context.as_ref(),
                    &self.config.middlewares,
                    &path,
                );
                emit::write(&module)?;
                Some(path)
            }
            None => None,
        };

        let report = GenerationReport {
            router_count: routers.len(),
            procedure_count: routers.iter().map(|r| r.procedures.len()).sum(),
            skipped,
            duration_milliseconds: started.elapsed().as_millis() as u64,
            router_module: router_module_path,
            helper_module,
        };

        info!(
            routers = report.router_count,
            procedures = report.procedure_count,
            skipped = report.skipped.len(),
            duration_ms = report.duration_milliseconds,
            "Generation run finished"
        );
        Ok(report)
    }
}

/// Convenience wrapper: one fresh session, one run.
pub fn run_generation(config: Config) -> Result<GenerationReport> {
    GeneratorSession::new(config).run()
}
