//! Router discovery by source scanning.
//!
//! When no explicit registry is supplied, the source root is walked for
//! files matching the router suffix and every `@Router`-decorated class in
//! them is turned into a registration. Discovery order is the sorted file
//! order, so repeated runs see the same sequence.

use crate::config::Config;
use crate::error::Result;
use crate::model::{ProcedureKind, ProcedureRegistration, RouterRegistration};
use crate::project::{ProjectCache, SourceModule, ast};
use ignore::WalkBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tree_sitter::Node;

const ROUTER_DECORATOR: &str = "Router";

pub fn discover_routers(cache: &ProjectCache, config: &Config) -> Result<Vec<RouterRegistration>> {
    let mut files: Vec<PathBuf> = WalkBuilder::new(&config.source_root)
        .build()
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            let is_router_file = path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(&config.router_suffix));
            is_router_file.then(|| path.to_path_buf())
        })
        .collect();
    files.sort();

    let mut registrations = Vec::new();
    for file in &files {
        let module = cache.load(file)?;
        collect_routers(&module, &mut registrations);
    }

    info!(
        files = files.len(),
        routers = registrations.len(),
        "Discovered router declarations"
    );
    Ok(registrations)
}

fn collect_routers(module: &Arc<SourceModule>, registrations: &mut Vec<RouterRegistration>) {
    let root = module.root();
    let mut cursor = root.walk();
    for item in root.named_children(&mut cursor) {
        let class_node = if item.kind() == "export_statement" {
            match item.child_by_field_name("declaration") {
                Some(declaration) => declaration,
                None => continue,
            }
        } else {
            item
        };
        if class_node.kind() != "class_declaration" {
            continue;
        }

        let Some(router) = registration_for_class(module, class_node) else {
            continue;
        };
        debug!(
            router = %router.class_name,
            alias = ?router.alias,
            procedures = router.procedures.len(),
            file = %module.path.display(),
            "Discovered router"
        );
        registrations.push(router);
    }
}

fn registration_for_class(
    module: &Arc<SourceModule>,
    class_node: Node<'_>,
) -> Option<RouterRegistration> {
    let router_decorator = ast::decorators_of(class_node).into_iter().find(|decorator| {
        ast::decorator_name(*decorator, &module.source) == Some(ROUTER_DECORATOR)
    })?;
    let class_name = module
        .text(class_node.child_by_field_name("name")?)
        .to_string();

    let alias = ast::decorator_argument(router_decorator)
        .and_then(|argument| ast::object_property(argument, &module.source, "alias"))
        .filter(|value| value.kind() == "string")
        .map(|value| ast::string_value(value, &module.source));

    let mut procedures = Vec::new();
    if let Some(body) = class_node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if member.kind() != "method_definition" {
                continue;
            }
            let Some(kind) = procedure_kind_of(module, member) else {
                continue;
            };
            let Some(name_node) = member.child_by_field_name("name") else {
                continue;
            };
            procedures.push(ProcedureRegistration {
                name: ast::property_key_name(name_node, &module.source),
                kind,
            });
        }
    }

    Some(RouterRegistration {
        class_name,
        alias,
        source_file: module.path.clone(),
        procedures,
    })
}

fn procedure_kind_of(module: &Arc<SourceModule>, method: Node<'_>) -> Option<ProcedureKind> {
    ast::decorators_of(method)
        .into_iter()
        .filter_map(|decorator| ast::decorator_name(decorator, &module.source))
        .find_map(ProcedureKind::from_decorator)
}
