//! Whole-project import resolution.
//!
//! For a given module this builds a map from locally-imported name to the
//! file that really declares it, unwinding barrel re-export chains and
//! configured path aliases. Resolution carries a (file, name) visited set so
//! circular re-export chains terminate as unresolved instead of recursing.

use crate::error::{Result, ShadowcastError};
use crate::project::ast;
use crate::project::{DeclarationKind, ProjectCache, SourceModule, normalize_path};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// A locally-imported name bound to the module that declares it.
/// `declared` is the name of the terminal declaration, which differs from
/// `local` under import aliases and renamed re-exports.
#[derive(Clone)]
pub struct ImportBinding {
    pub local: String,
    pub declared: String,
    pub module: Arc<SourceModule>,
    pub kind: DeclarationKind,
}

/// Import map for one module: project-local bindings plus the local names
/// that come from external packages (name -> package specifier).
#[derive(Default)]
pub struct ModuleImports {
    pub bindings: HashMap<String, ImportBinding>,
    pub external: HashMap<String, String>,
}

/// Substitution table for configured path aliases (`@app/*` -> `src/*`),
/// applied relative to the project source root.
#[derive(Debug, Clone, Default)]
pub struct PathAliases {
    root: PathBuf,
    patterns: Vec<(String, String)>,
}

impl PathAliases {
    pub fn new(root: &Path, aliases: &BTreeMap<String, String>) -> Self {
        let mut patterns: Vec<(String, String)> = aliases
            .iter()
            .map(|(pattern, target)| (pattern.clone(), target.clone()))
            .collect();
        // Longest pattern wins when several prefixes match.
        patterns.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self {
            root: root.to_path_buf(),
            patterns,
        }
    }

    /// Maps an aliased specifier to a path under the source root.
    pub fn substitute(&self, specifier: &str) -> Option<PathBuf> {
        for (pattern, target) in &self.patterns {
            if let Some(prefix) = pattern.strip_suffix('*') {
                if let Some(rest) = specifier.strip_prefix(prefix) {
                    let base = target.strip_suffix('*').unwrap_or(target);
                    return Some(self.root.join(format!("{base}{rest}")));
                }
            } else if specifier == pattern {
                return Some(self.root.join(target));
            }
        }
        None
    }
}

enum ReExport {
    Named {
        exported: String,
        original: String,
        source: String,
    },
    Wildcard {
        source: String,
    },
}

struct ResolvedDeclaration {
    module: Arc<SourceModule>,
    kind: DeclarationKind,
    name: String,
}

/// Builds and caches per-module import maps.
pub struct ImportsResolver {
    aliases: PathAliases,
    by_module: DashMap<PathBuf, Arc<ModuleImports>>,
}

impl ImportsResolver {
    pub fn new(aliases: PathAliases) -> Self {
        Self {
            aliases,
            by_module: DashMap::new(),
        }
    }

    /// Import map for `module`, built on first use and cached per path.
    pub fn imports_of(
        &self,
        cache: &ProjectCache,
        module: &SourceModule,
    ) -> Result<Arc<ModuleImports>> {
        if let Some(cached) = self.by_module.get(&module.path) {
            return Ok(cached.clone());
        }

        let imports = Arc::new(self.build_imports(cache, module)?);
        self.by_module
            .insert(module.path.clone(), imports.clone());
        Ok(imports)
    }

    fn build_imports(&self, cache: &ProjectCache, module: &SourceModule) -> Result<ModuleImports> {
        let mut imports = ModuleImports::default();
        let importer_dir = module.path.parent().unwrap_or_else(|| Path::new("."));

        let root = module.root();
        let mut cursor = root.walk();
        for item in root.named_children(&mut cursor) {
            if item.kind() != "import_statement" {
                continue;
            }
            let Some(source_node) = item.child_by_field_name("source") else {
                continue;
            };
            let specifier = ast::string_value(source_node, &module.source);
            let target = self.locate(importer_dir, &specifier);

            let mut clause_cursor = item.walk();
            for clause in item.named_children(&mut clause_cursor) {
                if clause.kind() != "import_clause" {
                    continue;
                }
                self.collect_clause(
                    cache,
                    module,
                    clause,
                    &specifier,
                    target.as_deref(),
                    &mut imports,
                )?;
            }
        }

        debug!(
            path = %module.path.display(),
            bindings = imports.bindings.len(),
            external = imports.external.len(),
            "Built imports map"
        );
        Ok(imports)
    }

    fn collect_clause(
        &self,
        cache: &ProjectCache,
        module: &SourceModule,
        clause: tree_sitter::Node<'_>,
        specifier: &str,
        target: Option<&Path>,
        imports: &mut ModuleImports,
    ) -> Result<()> {
        let mut cursor = clause.walk();
        for part in clause.named_children(&mut cursor) {
            match part.kind() {
                // Default and namespace imports can only come from packages
                // or be kept as imports; they never inline.
                "identifier" => {
                    if target.is_none() {
                        imports
                            .external
                            .insert(module.text(part).to_string(), specifier.to_string());
                    }
                }
                "namespace_import" => {
                    let Some(name) = part
                        .named_children(&mut part.walk())
                        .find(|n| n.kind() == "identifier")
                    else {
                        continue;
                    };
                    if target.is_none() {
                        imports
                            .external
                            .insert(module.text(name).to_string(), specifier.to_string());
                    }
                }
                "named_imports" => {
                    let mut spec_cursor = part.walk();
                    for import_specifier in part.named_children(&mut spec_cursor) {
                        if import_specifier.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name_node) = import_specifier.child_by_field_name("name") else {
                            continue;
                        };
                        let imported = module.text(name_node).to_string();
                        let local = import_specifier
                            .child_by_field_name("alias")
                            .map_or_else(|| imported.clone(), |n| module.text(n).to_string());

                        match target {
                            Some(file) => {
                                let mut visited = HashSet::new();
                                match self.resolve_named(cache, file, &imported, &mut visited)? {
                                    Some(resolved) => {
                                        trace!(
                                            name = %imported,
                                            local = %local,
                                            file = %resolved.module.path.display(),
                                            "Resolved named import"
                                        );
                                        imports.bindings.insert(
                                            local.clone(),
                                            ImportBinding {
                                                local,
                                                declared: resolved.name,
                                                module: resolved.module,
                                                kind: resolved.kind,
                                            },
                                        );
                                    }
                                    // Missing export: dropped from the map,
                                    // downstream flattening leaves the name.
                                    None => {
                                        debug!(name = %imported, from = %specifier, "Import did not resolve");
                                    }
                                }
                            }
                            None => {
                                imports.external.insert(local, specifier.to_string());
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Resolves `name` starting at `file`, following barrel re-exports.
    /// Returns the declaring module, or `None` when the chain dead-ends or
    /// revisits a (file, name) pair.
    fn resolve_named(
        &self,
        cache: &ProjectCache,
        file: &Path,
        name: &str,
        visited: &mut HashSet<(PathBuf, String)>,
    ) -> Result<Option<ResolvedDeclaration>> {
        let key = (normalize_path(file), name.to_string());
        if !visited.insert(key) {
            debug!(
                file = %file.display(),
                name = %name,
                "Circular re-export chain; treating as unresolved"
            );
            return Ok(None);
        }

        let module = match cache.load(file) {
            Ok(module) => module,
            // Missing target file: dropped silently.
            Err(ShadowcastError::Io(_)) => return Ok(None),
            Err(error) => return Err(error),
        };

        if let Some(declaration) = module.find_declaration(name) {
            return Ok(Some(ResolvedDeclaration {
                kind: declaration.kind,
                module: module.clone(),
                name: name.to_string(),
            }));
        }

        let barrel_dir = module.path.parent().unwrap_or_else(|| Path::new("."));
        for re_export in re_exports_of(&module) {
            match re_export {
                ReExport::Named {
                    exported,
                    original,
                    source,
                } if exported == name => {
                    let Some(target) = self.locate(barrel_dir, &source) else {
                        continue;
                    };
                    if let Some(found) = self.resolve_named(cache, &target, &original, visited)? {
                        return Ok(Some(found));
                    }
                }
                ReExport::Wildcard { source } => {
                    let Some(target) = self.locate(barrel_dir, &source) else {
                        continue;
                    };
                    if let Some(found) = self.resolve_named(cache, &target, name, visited)? {
                        return Ok(Some(found));
                    }
                }
                ReExport::Named { .. } => {}
            }
        }

        Ok(None)
    }

    /// Resolves an import specifier to a concrete file. External package
    /// specifiers yield `None`.
    fn locate(&self, importer_dir: &Path, specifier: &str) -> Option<PathBuf> {
        let base = if specifier.starts_with('.') {
            importer_dir.join(specifier)
        } else if specifier.starts_with('/') {
            PathBuf::from(specifier)
        } else {
            self.aliases.substitute(specifier)?
        };
        resolve_module_file(&base)
    }
}

fn re_exports_of(module: &SourceModule) -> Vec<ReExport> {
    let mut out = Vec::new();
    let root = module.root();
    let mut cursor = root.walk();
    for item in root.named_children(&mut cursor) {
        if item.kind() != "export_statement" {
            continue;
        }
        let Some(source_node) = item.child_by_field_name("source") else {
            continue;
        };
        let source = ast::string_value(source_node, &module.source);

        let mut wildcard = false;
        let mut saw_clause = false;
        let mut child_cursor = item.walk();
        for child in item.children(&mut child_cursor) {
            match child.kind() {
                "*" => wildcard = true,
                "export_clause" => {
                    saw_clause = true;
                    let mut spec_cursor = child.walk();
                    for export_specifier in child.named_children(&mut spec_cursor) {
                        if export_specifier.kind() != "export_specifier" {
                            continue;
                        }
                        let Some(name_node) = export_specifier.child_by_field_name("name") else {
                            continue;
                        };
                        let original = module.text(name_node).to_string();
                        let exported = export_specifier
                            .child_by_field_name("alias")
                            .map_or_else(|| original.clone(), |n| module.text(n).to_string());
                        out.push(ReExport::Named {
                            exported,
                            original,
                            source: source.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        if wildcard && !saw_clause {
            out.push(ReExport::Wildcard { source });
        }
    }
    out
}

fn resolve_module_file(base: &Path) -> Option<PathBuf> {
    let is_source_file = base
        .extension()
        .is_some_and(|ext| ext == "ts" || ext == "tsx");
    if is_source_file && base.is_file() {
        return Some(normalize_path(base));
    }
    let candidates = [
        with_appended(base, ".ts"),
        with_appended(base, ".tsx"),
        base.join("index.ts"),
        base.join("index.tsx"),
    ];
    candidates
        .into_iter()
        .find(|candidate| candidate.is_file())
        .map(|candidate| normalize_path(&candidate))
}

fn with_appended(base: &Path, suffix: &str) -> PathBuf {
    let mut spelled = base.as_os_str().to_os_string();
    spelled.push(suffix);
    PathBuf::from(spelled)
}
