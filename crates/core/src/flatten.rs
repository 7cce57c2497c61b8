//! Recursive schema-expression flattening.
//!
//! Given the text of a schema expression and the module it appears in, the
//! flattener inlines every resolvable identifier until the text stands on
//! its own. References it cannot (or must not) inline are either left
//! verbatim or recorded as imports the generated module has to carry.

use crate::error::Result;
use crate::model::{ImportSource, RequiredImport};
use crate::project::ast;
use crate::project::{DeclarationKind, ProjectCache, SourceModule};
use crate::resolver::ImportsResolver;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{trace, warn};
use tree_sitter::Node;

const MAX_FLATTEN_DEPTH: usize = 24;

/// The ambient schema-builder namespace. Expressions rooted here are already
/// self-contained because the generated module imports it unconditionally.
const SCHEMA_NAMESPACE: &str = "z";

pub struct Flattener<'s> {
    cache: &'s ProjectCache,
    resolver: &'s ImportsResolver,
    /// (file, symbol) pairs currently being inlined; a revisit stops the
    /// recursion and leaves the reference verbatim.
    resolving: Vec<(PathBuf, String)>,
    required: IndexMap<String, ImportSource>,
}

impl<'s> Flattener<'s> {
    pub fn new(cache: &'s ProjectCache, resolver: &'s ImportsResolver) -> Self {
        Self {
            cache,
            resolver,
            resolving: Vec::new(),
            required: IndexMap::new(),
        }
    }

    /// Imports the generated module has to carry for everything that was
    /// referenced but intentionally not inlined, in first-use order.
    pub fn take_required_imports(&mut self) -> Vec<RequiredImport> {
        std::mem::take(&mut self.required)
            .into_iter()
            .map(|(name, source)| RequiredImport { name, source })
            .collect()
    }

    /// Flattens `schema_text` as it appears inside `scope`.
    pub fn flatten_text(&mut self, schema_text: &str, scope: &Arc<SourceModule>) -> Result<String> {
        let wrapper = format!("const __schema = {schema_text};\n");
        let snippet = match self.cache.parse_snippet(&wrapper) {
            Ok(snippet) => snippet,
            Err(error) => {
                warn!(schema = %schema_text, %error, "Schema text did not reparse; leaving verbatim");
                return Ok(schema_text.to_string());
            }
        };

        let Some(expression) = snippet_expression(&snippet) else {
            warn!(schema = %schema_text, "No expression found in schema text; leaving verbatim");
            return Ok(schema_text.to_string());
        };

        self.resolving.clear();
        let flattened = self.flatten_node(
            expression,
            &snippet.source,
            scope,
            schema_text.to_string(),
            0,
        )?;
        trace!(original = %schema_text, flattened = %flattened, "Flattened schema expression");
        Ok(flattened)
    }

    /// Dispatches on the node shape, rewriting `text` in place.
    fn flatten_node(
        &mut self,
        node: Node<'_>,
        src: &str,
        scope: &Arc<SourceModule>,
        text: String,
        depth: usize,
    ) -> Result<String> {
        if depth >= MAX_FLATTEN_DEPTH {
            warn!(depth, "Maximum flattening depth reached");
            return Ok(text);
        }

        match node.kind() {
            "identifier" => self.flatten_identifier(node, src, scope, text, depth),
            "object" => self.flatten_object(node, src, scope, text, depth),
            "array" => self.flatten_array(node, src, scope, text, depth),
            "call_expression" => self.flatten_call(node, src, scope, text, depth),
            "member_expression" => self.flatten_member(node, src, scope, text, depth),
            "parenthesized_expression" => match node.named_child(0) {
                Some(inner) => self.flatten_node(inner, src, scope, text, depth + 1),
                None => Ok(text),
            },
            _ => Ok(text),
        }
    }

    fn flatten_identifier(
        &mut self,
        node: Node<'_>,
        src: &str,
        scope: &Arc<SourceModule>,
        text: String,
        depth: usize,
    ) -> Result<String> {
        let name = ast::text(node, src);
        if name == SCHEMA_NAMESPACE {
            return Ok(text);
        }

        // Same-file declaration wins over imports.
        if let Some(declaration) = scope.find_declaration(name) {
            if declaration.kind == DeclarationKind::Variable {
                let Some(initializer) = declaration.initializer else {
                    return Ok(text);
                };
                if !self.enter(&scope.path, name) {
                    return Ok(text);
                }
                let initializer_text = scope.text(initializer).to_string();
                let result = self.flatten_node(
                    initializer,
                    &scope.source,
                    scope,
                    initializer_text,
                    depth + 1,
                );
                self.leave();
                return Ok(text.replace(name, &result?));
            }
            // Classes, enums and friends have no initializer to inline; the
            // generated module imports them by name instead.
            self.record_required(name, ImportSource::File(scope.path.clone()));
            return Ok(text);
        }

        let imports = self.resolver.imports_of(self.cache, scope)?;
        if let Some(binding) = imports.bindings.get(name).cloned() {
            if binding.kind == DeclarationKind::Variable {
                let declaring = binding.module.clone();
                let Some(initializer) = declaring.variable_initializer(&binding.declared) else {
                    return Ok(text);
                };
                if !self.enter(&declaring.path, &binding.declared) {
                    return Ok(text);
                }
                let initializer_text = declaring.text(initializer).to_string();
                let result = self.flatten_node(
                    initializer,
                    &declaring.source,
                    &declaring,
                    initializer_text,
                    depth + 1,
                );
                self.leave();
                return Ok(text.replace(name, &result?));
            }
            self.record_required(name, ImportSource::File(binding.module.path.clone()));
            return Ok(text);
        }

        if let Some(package) = imports.external.get(name) {
            self.record_required(name, ImportSource::Package(package.clone()));
            return Ok(text);
        }

        trace!(identifier = %name, "Identifier not resolvable; leaving verbatim");
        Ok(text)
    }

    fn flatten_object(
        &mut self,
        node: Node<'_>,
        src: &str,
        scope: &Arc<SourceModule>,
        mut text: String,
        depth: usize,
    ) -> Result<String> {
        let mut cursor = node.walk();
        for entry in node.named_children(&mut cursor) {
            if entry.kind() != "pair" {
                continue;
            }
            let (Some(key), Some(value)) = (
                entry.child_by_field_name("key"),
                entry.child_by_field_name("value"),
            ) else {
                continue;
            };
            let entry_text = ast::text(entry, src).to_string();
            let value_text = text_for_replacement(value, src);
            let flattened = self.flatten_node(value, src, scope, value_text.clone(), depth + 1)?;
            if flattened != value_text {
                let replacement = format!("{}: {}", ast::text(key, src), flattened);
                text = text.replace(&entry_text, &replacement);
            }
        }
        Ok(text)
    }

    fn flatten_array(
        &mut self,
        node: Node<'_>,
        src: &str,
        scope: &Arc<SourceModule>,
        mut text: String,
        depth: usize,
    ) -> Result<String> {
        let mut cursor = node.walk();
        for element in node.named_children(&mut cursor) {
            let element_text = text_for_replacement(element, src);
            let flattened =
                self.flatten_node(element, src, scope, element_text.clone(), depth + 1)?;
            if flattened != element_text {
                text = text.replace(&element_text, &flattened);
            }
        }
        Ok(text)
    }

    fn flatten_call(
        &mut self,
        node: Node<'_>,
        src: &str,
        scope: &Arc<SourceModule>,
        mut text: String,
        depth: usize,
    ) -> Result<String> {
        let Some(callee) = node.child_by_field_name("function") else {
            return Ok(text);
        };

        let root_name = ast::chain_root(callee).map(|root| ast::text(root, src));
        if root_name != Some(SCHEMA_NAMESPACE) {
            // A helper call: the generated module imports the helper and
            // keeps the call, rather than duplicating its body.
            if let Some(root) = root_name {
                self.record_required_for(root, scope)?;
            }
            return Ok(text);
        }

        if callee.kind() == "member_expression" {
            if let Some(base) = callee.child_by_field_name("object") {
                let base_text = text_for_replacement(base, src);
                let flattened =
                    self.flatten_node(base, src, scope, base_text.clone(), depth + 1)?;
                if flattened != base_text {
                    text = text.replace(&base_text, &flattened);
                }
            }
        }

        if let Some(arguments) = node.child_by_field_name("arguments") {
            let mut cursor = arguments.walk();
            for argument in arguments.named_children(&mut cursor) {
                let argument_text = text_for_replacement(argument, src);
                let flattened =
                    self.flatten_node(argument, src, scope, argument_text.clone(), depth + 1)?;
                if flattened != argument_text {
                    text = text.replace(&argument_text, &flattened);
                }
            }
        }

        Ok(text)
    }

    fn flatten_member(
        &mut self,
        node: Node<'_>,
        src: &str,
        scope: &Arc<SourceModule>,
        mut text: String,
        depth: usize,
    ) -> Result<String> {
        let Some(base) = node.child_by_field_name("object") else {
            return Ok(text);
        };
        let base_text = text_for_replacement(base, src);
        let flattened = self.flatten_node(base, src, scope, base_text.clone(), depth + 1)?;
        if flattened != base_text {
            text = text.replace(&base_text, &flattened);
        }
        Ok(text)
    }

    /// Records a required import for `name`, resolving where it would be
    /// imported from in `scope`.
    fn record_required_for(&mut self, name: &str, scope: &Arc<SourceModule>) -> Result<()> {
        if scope.find_declaration(name).is_some() {
            self.record_required(name, ImportSource::File(scope.path.clone()));
            return Ok(());
        }
        let imports = self.resolver.imports_of(self.cache, scope)?;
        if let Some(binding) = imports.bindings.get(name) {
            let source = ImportSource::File(binding.module.path.clone());
            self.record_required(name, source);
        } else if let Some(package) = imports.external.get(name) {
            let source = ImportSource::Package(package.clone());
            self.record_required(name, source);
        } else {
            warn!(identifier = %name, "Helper reference has no importable source");
        }
        Ok(())
    }

    fn record_required(&mut self, name: &str, source: ImportSource) {
        self.required.entry(name.to_string()).or_insert(source);
    }

    fn enter(&mut self, file: &Path, symbol: &str) -> bool {
        let key = (file.to_path_buf(), symbol.to_string());
        if self.resolving.contains(&key) {
            warn!(
                file = %file.display(),
                symbol = %symbol,
                "Circular schema reference; leaving identifier verbatim"
            );
            return false;
        }
        self.resolving.push(key);
        true
    }

    fn leave(&mut self) {
        self.resolving.pop();
    }
}

/// The declarator value inside the `const __schema = ...;` wrapper.
fn snippet_expression(snippet: &SourceModule) -> Option<Node<'_>> {
    let root = snippet.root();
    let mut cursor = root.walk();
    for item in root.named_children(&mut cursor) {
        if item.kind() != "lexical_declaration" {
            continue;
        }
        let mut declarator_cursor = item.walk();
        for declarator in item.named_children(&mut declarator_cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            if let Some(value) = declarator.child_by_field_name("value") {
                return Some(value);
            }
        }
    }
    None
}

/// Identifiers substitute by name; everything else by its source span.
fn text_for_replacement(node: Node<'_>, src: &str) -> String {
    ast::text(node, src).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PathAliases;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        cache: ProjectCache,
        resolver: ImportsResolver,
        main: Arc<SourceModule>,
    }

    fn fixture(files: &[(&str, &str)], main: &str) -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent dir");
            }
            fs::write(&path, content).expect("write fixture");
        }
        let cache = ProjectCache::new();
        let main = cache.load(&dir.path().join(main)).expect("parse main");
        let resolver = ImportsResolver::new(PathAliases::new(dir.path(), &BTreeMap::new()));
        Fixture {
            _dir: dir,
            cache,
            resolver,
            main,
        }
    }

    fn flatten(fixture: &Fixture, schema: &str) -> (String, Vec<RequiredImport>) {
        let mut flattener = Flattener::new(&fixture.cache, &fixture.resolver);
        let text = flattener
            .flatten_text(schema, &fixture.main)
            .expect("flatten");
        (text, flattener.take_required_imports())
    }

    #[test]
    fn inline_literal_schema_is_identity() {
        let fx = fixture(
            &[("main.ts", "import { z } from 'zod';\n")],
            "main.ts",
        );
        let schema = "z.object({ id: z.string(), count: z.number().min(1) })";
        let (text, imports) = flatten(&fx, schema);
        assert_eq!(text, schema);
        assert!(imports.is_empty());
    }

    #[test]
    fn same_file_variable_is_substituted_and_stable() {
        let fx = fixture(
            &[(
                "main.ts",
                "import { z } from 'zod';\nconst nameSchema = z.string().min(1);\n",
            )],
            "main.ts",
        );
        let (text, _) = flatten(&fx, "nameSchema");
        assert_eq!(text, "z.string().min(1)");

        // Re-flattening the output is a fixed point.
        let (again, _) = flatten(&fx, &text);
        assert_eq!(again, text);
    }

    #[test]
    fn nested_same_file_references_flatten_fully() {
        let fx = fixture(
            &[(
                "main.ts",
                "import { z } from 'zod';\n\
                 const nameSchema = z.string();\n\
                 const userSchema = z.object({ name: nameSchema });\n",
            )],
            "main.ts",
        );
        let (text, _) = flatten(&fx, "userSchema");
        assert_eq!(text, "z.object({ name: z.string() })");
    }

    #[test]
    fn imported_schema_is_inlined() {
        let fx = fixture(
            &[
                (
                    "schemas.ts",
                    "import { z } from 'zod';\nexport const emailSchema = z.string().email();\n",
                ),
                (
                    "main.ts",
                    "import { z } from 'zod';\nimport { emailSchema } from './schemas';\n",
                ),
            ],
            "main.ts",
        );
        let (text, _) = flatten(&fx, "z.object({ email: emailSchema })");
        assert_eq!(text, "z.object({ email: z.string().email() })");
    }

    #[test]
    fn barrel_imported_schema_reaches_terminal_declaration() {
        let fx = fixture(
            &[
                (
                    "schemas/user.ts",
                    "import { z } from 'zod';\nexport const userSchema = z.object({ id: z.string() });\n",
                ),
                ("schemas/index.ts", "export * from './user';\n"),
                (
                    "main.ts",
                    "import { z } from 'zod';\nimport { userSchema } from './schemas';\n",
                ),
            ],
            "main.ts",
        );
        let (text, _) = flatten(&fx, "userSchema");
        assert_eq!(text, "z.object({ id: z.string() })");
    }

    #[test]
    fn output_reference_expands_to_full_definition() {
        // The schema used by spec'd clients: output must expand to the full
        // object text, not the bare identifier.
        let fx = fixture(
            &[(
                "main.ts",
                "import { z } from 'zod';\n\
                 const userSchema = z.object({ id: z.string(), name: z.string() });\n",
            )],
            "main.ts",
        );
        let (text, _) = flatten(&fx, "userSchema");
        assert_eq!(text, "z.object({ id: z.string(), name: z.string() })");
    }

    #[test]
    fn array_elements_flatten_in_place() {
        let fx = fixture(
            &[(
                "main.ts",
                "import { z } from 'zod';\n\
                 const strSchema = z.string();\n\
                 const numSchema = z.number();\n",
            )],
            "main.ts",
        );
        let (text, _) = flatten(&fx, "z.union([strSchema, numSchema])");
        assert_eq!(text, "z.union([z.string(), z.number()])");
    }

    #[test]
    fn unknown_identifier_is_left_verbatim() {
        let fx = fixture(
            &[("main.ts", "import { z } from 'zod';\n")],
            "main.ts",
        );
        let (text, imports) = flatten(&fx, "mysterySchema");
        assert_eq!(text, "mysterySchema");
        assert!(imports.is_empty());
    }

    #[test]
    fn helper_call_is_imported_not_inlined() {
        let fx = fixture(
            &[
                (
                    "helpers.ts",
                    "import { z } from 'zod';\n\
                     export const withPagination = (schema) => z.object({ items: schema });\n",
                ),
                (
                    "main.ts",
                    "import { z } from 'zod';\nimport { withPagination } from './helpers';\n",
                ),
            ],
            "main.ts",
        );
        let (text, imports) = flatten(&fx, "withPagination(z.string())");
        assert_eq!(text, "withPagination(z.string())");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].name, "withPagination");
        assert!(matches!(
            &imports[0].source,
            ImportSource::File(path) if path.ends_with("helpers.ts")
        ));
    }

    #[test]
    fn enum_reference_becomes_required_import() {
        let fx = fixture(
            &[
                (
                    "types.ts",
                    "export enum Status { Active = 'ACTIVE', Inactive = 'INACTIVE' }\n",
                ),
                (
                    "main.ts",
                    "import { z } from 'zod';\nimport { Status } from './types';\n",
                ),
            ],
            "main.ts",
        );
        let (text, imports) = flatten(&fx, "z.nativeEnum(Status)");
        assert_eq!(text, "z.nativeEnum(Status)");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].name, "Status");
        assert!(matches!(
            &imports[0].source,
            ImportSource::File(path) if path.ends_with("types.ts")
        ));
    }

    #[test]
    fn circular_same_file_references_terminate() {
        let fx = fixture(
            &[(
                "main.ts",
                "import { z } from 'zod';\n\
                 const aSchema = z.object({ b: bSchema });\n\
                 const bSchema = z.object({ a: aSchema });\n",
            )],
            "main.ts",
        );
        let (text, _) = flatten(&fx, "aSchema");
        // The inner cycle edge stays as an identifier instead of recursing.
        assert!(text.starts_with("z.object"));
        assert!(text.contains("aSchema"));
    }

    #[test]
    fn circular_cross_file_references_terminate() {
        let fx = fixture(
            &[
                (
                    "a.ts",
                    "import { z } from 'zod';\nimport { bSchema } from './b';\n\
                     export const aSchema = z.object({ b: bSchema });\n",
                ),
                (
                    "b.ts",
                    "import { z } from 'zod';\nimport { aSchema } from './a';\n\
                     export const bSchema = z.object({ a: aSchema });\n",
                ),
                (
                    "main.ts",
                    "import { z } from 'zod';\nimport { aSchema } from './a';\n",
                ),
            ],
            "main.ts",
        );
        let (text, _) = flatten(&fx, "aSchema");
        assert!(text.starts_with("z.object"));
        assert!(text.contains("aSchema"));
    }

    #[test]
    fn external_package_identifier_becomes_package_import() {
        let fx = fixture(
            &[(
                "main.ts",
                "import { z } from 'zod';\nimport { customScalar } from 'my-scalars';\n",
            )],
            "main.ts",
        );
        let (text, imports) = flatten(&fx, "customScalar(z.string())");
        assert_eq!(text, "customScalar(z.string())");
        assert_eq!(imports.len(), 1);
        assert_eq!(
            imports[0].source,
            ImportSource::Package("my-scalars".to_string())
        );
    }

    #[test]
    fn member_access_flattens_base_and_keeps_member() {
        let fx = fixture(
            &[(
                "main.ts",
                "import { z } from 'zod';\n\
                 const shapes = z.object({ user: z.object({ id: z.string() }) });\n",
            )],
            "main.ts",
        );
        let (text, _) = flatten(&fx, "shapes.shape");
        assert_eq!(
            text,
            "z.object({ user: z.object({ id: z.string() }) }).shape"
        );
    }
}
