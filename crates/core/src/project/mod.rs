//! Lazy, memoized loading of parsed source files.
//!
//! A [`ProjectCache`] is owned by one generation session: every file is read
//! and parsed at most once per run, and a file that fails to parse is never
//! cached, so a later session can pick up an external fix.

pub mod ast;

use crate::error::{Result, ShadowcastError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};
use tree_sitter::{Language, Node, Parser, Point, Tree};

/// A parsed source file. Immutable after parse.
#[derive(Debug)]
pub struct SourceModule {
    pub path: PathBuf,
    pub source: String,
    tree: Tree,
}

/// Kinds of named top-level definitions we can bind an import to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Variable,
    Class,
    Interface,
    Enum,
    Function,
    TypeAlias,
}

/// A named top-level definition; variables carry their initializer.
#[derive(Debug, Clone, Copy)]
pub struct Declaration<'t> {
    pub kind: DeclarationKind,
    pub node: Node<'t>,
    pub initializer: Option<Node<'t>>,
}

impl SourceModule {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        &self.source[node.byte_range()]
    }

    /// Finds a top-level declaration by name, looking through `export`
    /// wrappers.
    pub fn find_declaration(&self, name: &str) -> Option<Declaration<'_>> {
        let root = self.root();
        let mut cursor = root.walk();
        for item in root.named_children(&mut cursor) {
            let declaration = if item.kind() == "export_statement" {
                match item.child_by_field_name("declaration") {
                    Some(inner) => inner,
                    None => continue,
                }
            } else {
                item
            };
            if let Some(found) = self.match_declaration(declaration, name) {
                return Some(found);
            }
        }
        None
    }

    /// Initializer expression of a top-level variable, if `name` is one.
    pub fn variable_initializer(&self, name: &str) -> Option<Node<'_>> {
        match self.find_declaration(name) {
            Some(Declaration {
                kind: DeclarationKind::Variable,
                initializer,
                ..
            }) => initializer,
            _ => None,
        }
    }

    /// Finds a top-level class declaration by name.
    pub fn find_class(&self, name: &str) -> Option<Node<'_>> {
        match self.find_declaration(name) {
            Some(Declaration {
                kind: DeclarationKind::Class,
                node,
                ..
            }) => Some(node),
            _ => None,
        }
    }

    fn match_declaration<'t>(&'t self, node: Node<'t>, name: &str) -> Option<Declaration<'t>> {
        let kind = match node.kind() {
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                for declarator in node.named_children(&mut cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let matches = declarator
                        .child_by_field_name("name")
                        .is_some_and(|n| n.kind() == "identifier" && self.text(n) == name);
                    if matches {
                        return Some(Declaration {
                            kind: DeclarationKind::Variable,
                            node: declarator,
                            initializer: declarator.child_by_field_name("value"),
                        });
                    }
                }
                return None;
            }
            "class_declaration" | "abstract_class_declaration" => DeclarationKind::Class,
            "interface_declaration" => DeclarationKind::Interface,
            "enum_declaration" => DeclarationKind::Enum,
            "function_declaration" | "generator_function_declaration" => DeclarationKind::Function,
            "type_alias_declaration" => DeclarationKind::TypeAlias,
            _ => return None,
        };

        let name_node = node.child_by_field_name("name")?;
        (self.text(name_node) == name).then_some(Declaration {
            kind,
            node,
            initializer: None,
        })
    }
}

/// Memoizing loader for the project's source files.
pub struct ProjectCache {
    language: Language,
    modules: DashMap<PathBuf, Arc<SourceModule>>,
}

impl Default for ProjectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectCache {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            modules: DashMap::new(),
        }
    }

    /// Loads and parses `path`. Repeated calls return the identical cached
    /// module; the entry lock also serializes concurrent first loads of the
    /// same path so a file is parsed exactly once.
    pub fn load(&self, path: &Path) -> Result<Arc<SourceModule>> {
        let path = normalize_path(path);
        match self.modules.entry(path.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(slot) => {
                trace!(path = %path.display(), "Parsing source file");
                let source = std::fs::read_to_string(&path)?;
                let module = Arc::new(self.parse_module(path, source)?);
                slot.insert(module.clone());
                Ok(module)
            }
        }
    }

    /// True if `path` has been loaded by this session.
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.modules.contains_key(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Parses detached snippet text. Never cached.
    pub fn parse_snippet(&self, source: &str) -> Result<SourceModule> {
        self.parse_module(PathBuf::from("<snippet>"), source.to_string())
    }

    fn parse_module(&self, path: PathBuf, source: String) -> Result<SourceModule> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).map_err(|error| {
            ShadowcastError::Internal(format!("failed to load TypeScript grammar: {error}"))
        })?;

        let Some(tree) = parser.parse(&source, None) else {
            return Err(ShadowcastError::MalformedSource {
                path,
                line: 1,
                column: 1,
            });
        };

        if tree.root_node().has_error() {
            let point = first_error_point(&tree);
            debug!(path = %path.display(), line = point.row + 1, "Source file has syntax errors");
            return Err(ShadowcastError::MalformedSource {
                path,
                line: point.row + 1,
                column: point.column + 1,
            });
        }

        Ok(SourceModule { path, source, tree })
    }
}

fn first_error_point(tree: &Tree) -> Point {
    fn visit(node: Node<'_>) -> Option<Point> {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position());
        }
        if !node.has_error() {
            return None;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if let Some(point) = visit(child) {
                return Some(point);
            }
        }
        Some(node.start_position())
    }
    visit(tree.root_node()).unwrap_or(Point { row: 0, column: 0 })
}

/// Lexically normalizes `.` and `..` components so that equivalent spellings
/// of a path share one cache entry.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, content).expect("write fixture");
        path
    }

    #[test]
    fn load_returns_identical_module_on_repeat() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_file(dir.path(), "a.ts", "export const x = 1;\n");

        let cache = ProjectCache::new();
        let first = cache.load(&path).expect("first load");
        let second = cache.load(&path).expect("second load");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn equivalent_path_spellings_share_one_entry() {
        let dir = TempDir::new().expect("temp dir");
        write_file(dir.path(), "sub/a.ts", "export const x = 1;\n");

        let cache = ProjectCache::new();
        cache.load(&dir.path().join("sub/a.ts")).expect("load");
        cache
            .load(&dir.path().join("sub/./other/../a.ts"))
            .expect("load normalized");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn malformed_source_reports_position_and_is_not_cached() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_file(dir.path(), "bad.ts", "const broken = z.object({;\n");

        let cache = ProjectCache::new();
        let error = cache.load(&path).expect_err("parse must fail");
        assert!(matches!(error, ShadowcastError::MalformedSource { .. }));
        assert!(!cache.is_loaded(&path));

        // A later load after an external fix succeeds.
        fs::write(&path, "const fixed = z.object({});\n").expect("rewrite");
        cache.load(&path).expect("load after fix");
    }

    #[test]
    fn finds_declarations_of_each_kind() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_file(
            dir.path(),
            "decls.ts",
            r#"
            export const userSchema = z.object({ id: z.string() });
            export class UserService {}
            export interface User { id: string }
            export enum Status { Active, Inactive }
            export function format(value: string): string { return value; }
            export type UserId = string;
            const internal = 42;
            "#,
        );

        let cache = ProjectCache::new();
        let module = cache.load(&path).expect("load");

        let variable = module.find_declaration("userSchema").expect("variable");
        assert_eq!(variable.kind, DeclarationKind::Variable);
        let initializer = variable.initializer.expect("initializer");
        assert_eq!(module.text(initializer), "z.object({ id: z.string() })");

        assert_eq!(
            module.find_declaration("UserService").map(|d| d.kind),
            Some(DeclarationKind::Class)
        );
        assert_eq!(
            module.find_declaration("User").map(|d| d.kind),
            Some(DeclarationKind::Interface)
        );
        assert_eq!(
            module.find_declaration("Status").map(|d| d.kind),
            Some(DeclarationKind::Enum)
        );
        assert_eq!(
            module.find_declaration("format").map(|d| d.kind),
            Some(DeclarationKind::Function)
        );
        assert_eq!(
            module.find_declaration("UserId").map(|d| d.kind),
            Some(DeclarationKind::TypeAlias)
        );
        assert_eq!(
            module.find_declaration("internal").map(|d| d.kind),
            Some(DeclarationKind::Variable)
        );
        assert!(module.find_declaration("missing").is_none());
    }

    #[test]
    fn finds_decorated_exported_class_and_method() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_file(
            dir.path(),
            "user.router.ts",
            r#"
            @Router({ alias: 'users' })
            export class UserRouter {
                @Query({ output: z.string() })
                getUser() {
                    return 'u';
                }
            }
            "#,
        );

        let cache = ProjectCache::new();
        let module = cache.load(&path).expect("load");
        let class_node = module.find_class("UserRouter").expect("class");

        let class_decorators = ast::decorators_of(class_node);
        assert_eq!(class_decorators.len(), 1);
        assert_eq!(
            ast::decorator_name(class_decorators[0], &module.source),
            Some("Router")
        );

        let method = ast::class_method(class_node, &module.source, "getUser").expect("method");
        let method_decorators = ast::decorators_of(method);
        assert_eq!(method_decorators.len(), 1);
        assert_eq!(
            ast::decorator_name(method_decorators[0], &module.source),
            Some("Query")
        );
    }
}
