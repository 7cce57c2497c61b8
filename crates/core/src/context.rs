//! Derivation of the helper-types module: the base `Context` type from the
//! context provider, plus one `<Name>Context` interface per middleware.
//!
//! Everything here is best-effort: a provider without a discoverable return
//! statement degrades to the empty context, a middleware without a
//! continuation call contributes nothing, and the run never aborts.

use crate::config::SymbolLocation;
use crate::model::GeneratedModule;
use crate::project::{ProjectCache, SourceModule, ast};
use std::fmt::Write;
use std::path::Path;
use tracing::debug;
use tree_sitter::Node;

const CONTEXT_FACTORY_METHOD: &str = "create";
const MIDDLEWARE_METHOD: &str = "use";
const CONTINUATION_METHOD: &str = "next";

/// Builds the helper-types module.
pub fn derive_helper_types(
    cache: &ProjectCache,
    context: Option<&SymbolLocation>,
    middlewares: &[SymbolLocation],
    output_path: &Path,
) -> GeneratedModule {
    let base = context
        .and_then(|location| derive_context_type(cache, location))
        .unwrap_or_else(|| "{}".to_string());

    let mut body = String::new();
    let _ = writeln!(body, "export type Context = {base};");

    for middleware in middlewares {
        let Some(properties) = middleware_extension(cache, middleware) else {
            debug!(
                class = %middleware.class,
                "No context extension found for middleware"
            );
            continue;
        };
        body.push('\n');
        let _ = writeln!(
            body,
            "export interface {}Context extends Context {{",
            middleware.class
        );
        for (name, type_text) in properties {
            let _ = writeln!(body, "  {name}: {type_text};");
        }
        body.push_str("}\n");
    }

    GeneratedModule {
        path: output_path.to_path_buf(),
        imports: Vec::new(),
        body,
    }
}

/// Structural type of the context factory's return value.
fn derive_context_type(cache: &ProjectCache, location: &SymbolLocation) -> Option<String> {
    let module = cache.load(&location.file).ok()?;
    let class_node = module.find_class(&location.class)?;
    let method = ast::class_method(class_node, &module.source, CONTEXT_FACTORY_METHOD)?;
    let body = method.child_by_field_name("body")?;

    let return_statement = ast::find_descendant(body, &|node| {
        node.kind() == "return_statement" && node.named_child_count() > 0
    })?;
    let mut expression = return_statement.named_child(0)?;

    // One level of async-result unwrapping.
    if expression.kind() == "await_expression" {
        expression = expression.named_child(0)?;
    }

    Some(type_of_expression(&module, expression))
}

/// Properties added to the context by a middleware's continuation call
/// (`opts.next({ ctx: { ... } })`).
fn middleware_extension(
    cache: &ProjectCache,
    location: &SymbolLocation,
) -> Option<Vec<(String, String)>> {
    let module = cache.load(&location.file).ok()?;
    let class_node = module.find_class(&location.class)?;
    let method = ast::class_method(class_node, &module.source, MIDDLEWARE_METHOD)?;
    let body = method.child_by_field_name("body")?;

    let continuation = ast::find_descendant(body, &|node| {
        node.kind() == "call_expression"
            && node
                .child_by_field_name("function")
                .is_some_and(|callee| is_continuation_callee(callee, &module))
    })?;

    let argument = continuation
        .child_by_field_name("arguments")?
        .named_child(0)?;
    let ctx_value = ast::object_property(argument, &module.source, "ctx")?;
    if ctx_value.kind() != "object" {
        return None;
    }

    Some(object_type_properties(&module, ctx_value))
}

fn is_continuation_callee(callee: Node<'_>, module: &SourceModule) -> bool {
    callee.kind() == "member_expression"
        && callee
            .child_by_field_name("property")
            .is_some_and(|property| module.text(property) == CONTINUATION_METHOD)
}

fn type_of_expression(module: &SourceModule, node: Node<'_>) -> String {
    match node.kind() {
        "object" => {
            let properties = object_type_properties(module, node);
            if properties.is_empty() {
                "{}".to_string()
            } else {
                let joined: Vec<String> = properties
                    .into_iter()
                    .map(|(name, type_text)| format!("{name}: {type_text}"))
                    .collect();
                format!("{{ {} }}", joined.join("; "))
            }
        }
        "string" | "template_string" => "string".to_string(),
        "number" => "number".to_string(),
        "true" | "false" => "boolean".to_string(),
        "null" => "null".to_string(),
        "array" => "unknown[]".to_string(),
        "parenthesized_expression" => node
            .named_child(0)
            .map_or_else(|| "unknown".to_string(), |inner| type_of_expression(module, inner)),
        _ => "unknown".to_string(),
    }
}

fn object_type_properties(module: &SourceModule, object: Node<'_>) -> Vec<(String, String)> {
    let mut properties = Vec::new();
    let mut cursor = object.walk();
    for entry in object.named_children(&mut cursor) {
        match entry.kind() {
            "pair" => {
                let (Some(key), Some(value)) = (
                    entry.child_by_field_name("key"),
                    entry.child_by_field_name("value"),
                ) else {
                    continue;
                };
                properties.push((
                    ast::property_key_name(key, &module.source),
                    type_of_expression(module, value),
                ));
            }
            "shorthand_property_identifier" => {
                properties.push((module.text(entry).to_string(), "unknown".to_string()));
            }
            _ => {}
        }
    }
    properties
}
