//! Shared data model for the generation pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The three callable operation shapes a router method can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureKind {
    Query,
    Mutation,
    Subscription,
}

impl ProcedureKind {
    pub fn from_decorator(name: &str) -> Option<Self> {
        match name {
            "Query" => Some(Self::Query),
            "Mutation" => Some(Self::Mutation),
            "Subscription" => Some(Self::Subscription),
            _ => None,
        }
    }

    /// Method name used on the procedure builder chain in generated output.
    pub fn builder_method(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.builder_method())
    }
}

/// One extracted procedure: schema texts are already flattened, `meta` is
/// copied verbatim from the decorator argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureDescriptor {
    pub name: String,
    pub kind: ProcedureKind,
    pub input: Option<String>,
    pub output: Option<String>,
    pub meta: Option<String>,
}

/// One extracted router class with its procedures in declaration order.
#[derive(Debug, Clone)]
pub struct RouterDescriptor {
    pub class_name: String,
    pub alias: Option<String>,
    pub source_file: PathBuf,
    pub procedures: Vec<ProcedureDescriptor>,
}

impl RouterDescriptor {
    /// Alias used for grouping: the declared one, or the lower-camel-cased
    /// class name when none was given.
    pub fn effective_alias(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| lower_camel_case(&self.class_name))
    }
}

/// Where a symbol kept as an import (rather than inlined) comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportSource {
    /// A project file; rendered as a path relative to the generated module.
    File(PathBuf),
    /// An external package specifier, rendered verbatim.
    Package(String),
}

/// A symbol the generated module must import instead of inlining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredImport {
    pub name: String,
    pub source: ImportSource,
}

/// A fully rendered output module. Written in one shot, never patched.
#[derive(Debug, Clone)]
pub struct GeneratedModule {
    pub path: PathBuf,
    pub imports: Vec<RequiredImport>,
    pub body: String,
}

/// Registry entry for one router, as supplied by the metadata layer or by
/// source discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterRegistration {
    pub class_name: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub source_file: PathBuf,
    pub procedures: Vec<ProcedureRegistration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureRegistration {
    pub name: String,
    pub kind: ProcedureKind,
}

/// Lower-camel-cases a class name the way the output aliases are spelled:
/// `UserRouter` becomes `userRouter`, `user-queries` becomes `userQueries`.
pub fn lower_camel_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (index, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        let previous = index.checked_sub(1).and_then(|i| chars.get(i)).copied();
        let next = chars.get(index + 1).copied();
        // A word starts at lower-to-upper transitions and at the last capital
        // of an acronym run ("APIRouter" splits before the "R").
        let boundary = ch.is_uppercase()
            && (previous.is_some_and(|p| p.is_lowercase() || p.is_numeric())
                || (previous.is_some_and(char::is_uppercase)
                    && next.is_some_and(char::is_lowercase)));
        if boundary && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }

    let mut out = String::with_capacity(name.len());
    for (index, word) in words.iter().enumerate() {
        if index == 0 {
            out.push_str(&word.to_lowercase());
        } else {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(&chars.as_str().to_lowercase());
            }
        }
    }
    out
}
