//! Grouping of router descriptors and serialization of the router-shape
//! module.
//!
//! Routers sharing an alias merge into one sub-object, keeping first-seen
//! order and appending later procedures. The rendered constant is only ever
//! consumed by a type checker, so every procedure body is an inert
//! placeholder.

use crate::error::{Result, ShadowcastError};
use crate::model::{
    GeneratedModule, ImportSource, ProcedureDescriptor, RequiredImport, RouterDescriptor,
};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt::Write;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const PLACEHOLDER_BODY: &str = "async () => \"PLACEHOLDER_DO_NOT_REMOVE\" as any";

/// Builds the router-shape module from extracted descriptors.
pub fn assemble(
    routers: &[RouterDescriptor],
    required_imports: &[RequiredImport],
    output_path: &Path,
) -> Result<GeneratedModule> {
    let mut groups: IndexMap<String, Vec<&ProcedureDescriptor>> = IndexMap::new();
    for router in routers {
        groups
            .entry(router.effective_alias())
            .or_default()
            .extend(router.procedures.iter());
    }

    for (alias, procedures) in &groups {
        let mut seen = HashSet::new();
        for procedure in procedures {
            if !seen.insert(procedure.name.as_str()) {
                return Err(ShadowcastError::DuplicateProcedure {
                    alias: alias.clone(),
                    procedure: procedure.name.clone(),
                });
            }
        }
    }

    let imports = dedup_imports(required_imports);
    let body = render(&groups, &imports, output_path);

    debug!(
        aliases = groups.len(),
        imports = imports.len(),
        output = %output_path.display(),
        "Assembled router module"
    );

    Ok(GeneratedModule {
        path: output_path.to_path_buf(),
        imports,
        body,
    })
}

/// Builder-chain expression for one procedure.
pub fn procedure_expression(procedure: &ProcedureDescriptor) -> String {
    let mut chain = String::from("publicProcedure");
    if let Some(input) = &procedure.input {
        let _ = write!(chain, ".input({input})");
    }
    if let Some(output) = &procedure.output {
        let _ = write!(chain, ".output({output})");
    }
    if let Some(meta) = &procedure.meta {
        let _ = write!(chain, ".meta({meta})");
    }
    let _ = write!(
        chain,
        ".{}({PLACEHOLDER_BODY})",
        procedure.kind.builder_method()
    );
    chain
}

fn dedup_imports(required: &[RequiredImport]) -> Vec<RequiredImport> {
    let mut seen = HashSet::new();
    required
        .iter()
        .filter(|import| seen.insert(import.name.clone()))
        .cloned()
        .collect()
}

fn render(
    groups: &IndexMap<String, Vec<&ProcedureDescriptor>>,
    imports: &[RequiredImport],
    output_path: &Path,
) -> String {
    let mut out = String::new();
    out.push_str("import { initTRPC } from \"@trpc/server\";\n");
    out.push_str("import { z } from \"zod\";\n");

    let output_dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    let mut by_specifier: IndexMap<String, Vec<&str>> = IndexMap::new();
    for import in imports {
        let specifier = match &import.source {
            ImportSource::Package(package) => package.clone(),
            ImportSource::File(path) => relative_import_path(output_dir, path),
        };
        by_specifier
            .entry(specifier)
            .or_default()
            .push(import.name.as_str());
    }
    for (specifier, names) in &by_specifier {
        let _ = writeln!(
            out,
            "import {{ {} }} from \"{specifier}\";",
            names.join(", ")
        );
    }

    out.push('\n');
    out.push_str("const t = initTRPC.create();\n");
    out.push_str("const publicProcedure = t.procedure;\n");
    out.push('\n');

    out.push_str("export const appRouter = t.router({\n");
    let alias_count = groups.len();
    for (alias_index, (alias, procedures)) in groups.iter().enumerate() {
        let _ = writeln!(out, "  {alias}: {{");
        for (index, procedure) in procedures.iter().enumerate() {
            let separator = if index + 1 < procedures.len() { "," } else { "" };
            let _ = writeln!(
                out,
                "    {}: {}{separator}",
                procedure.name,
                procedure_expression(procedure)
            );
        }
        let separator = if alias_index + 1 < alias_count { "," } else { "" };
        let _ = writeln!(out, "  }}{separator}");
    }
    out.push_str("});\n");
    out.push_str("export type AppRouter = typeof appRouter;\n");
    out
}

/// Import specifier for `to_file` relative to the generated module's own
/// directory, without the source extension.
pub fn relative_import_path(from_dir: &Path, to_file: &Path) -> String {
    let target = to_file.with_extension("");
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = target.components().collect();

    let mut common = 0;
    while common < from.len() && common < to.len() && from[common] == to[common] {
        common += 1;
    }

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}

/// Resolves the configured output location to the server module file path.
pub fn server_file_path(output: &Path) -> PathBuf {
    let is_module_file = output
        .extension()
        .is_some_and(|ext| ext == "ts" || ext == "tsx");
    if is_module_file {
        output.to_path_buf()
    } else {
        output.join("server.ts")
    }
}
