//! Extraction of router descriptors from decorated classes.
//!
//! Each registry entry names a file, a class and its procedure methods; the
//! extractor locates them, reads the procedure decorators and flattens the
//! schema arguments. A router whose class or method cannot be found aborts
//! only that router.

use crate::error::{Result, ShadowcastError};
use crate::flatten::Flattener;
use crate::model::{
    ProcedureDescriptor, ProcedureKind, ProcedureRegistration, RequiredImport, RouterDescriptor,
    RouterRegistration,
};
use crate::project::{ProjectCache, SourceModule, ast};
use crate::resolver::ImportsResolver;
use std::sync::Arc;
use tracing::{debug, warn};
use tree_sitter::Node;

/// Decorators that shape runtime behavior but not the RPC surface; they are
/// skipped without a warning.
const PASSTHROUGH_DECORATORS: &[&str] = &["Middlewares", "UseMiddlewares", "Ctx", "Input", "Options"];

pub struct DescriptorExtractor<'s> {
    cache: &'s ProjectCache,
    resolver: &'s ImportsResolver,
}

impl<'s> DescriptorExtractor<'s> {
    pub fn new(cache: &'s ProjectCache, resolver: &'s ImportsResolver) -> Self {
        Self { cache, resolver }
    }

    pub fn extract(
        &self,
        registration: &RouterRegistration,
    ) -> Result<(RouterDescriptor, Vec<RequiredImport>)> {
        let module = self.cache.load(&registration.source_file)?;
        let class_node = module.find_class(&registration.class_name).ok_or_else(|| {
            ShadowcastError::UnresolvedRouterDeclaration {
                router: registration.class_name.clone(),
                symbol: registration.class_name.clone(),
                path: module.path.clone(),
            }
        })?;

        let mut flattener = Flattener::new(self.cache, self.resolver);
        let mut procedures = Vec::new();

        for procedure in &registration.procedures {
            let method = ast::class_method(class_node, &module.source, &procedure.name)
                .ok_or_else(|| ShadowcastError::UnresolvedRouterDeclaration {
                    router: registration.class_name.clone(),
                    symbol: procedure.name.clone(),
                    path: module.path.clone(),
                })?;

            match self.extract_procedure(&module, method, procedure, &mut flattener)? {
                Some(descriptor) => procedures.push(descriptor),
                None => warn!(
                    router = %registration.class_name,
                    method = %procedure.name,
                    "Method carries no procedure decorator; skipping"
                ),
            }
        }

        debug!(
            router = %registration.class_name,
            procedures = procedures.len(),
            "Extracted router descriptor"
        );

        let descriptor = RouterDescriptor {
            class_name: registration.class_name.clone(),
            alias: registration.alias.clone(),
            source_file: module.path.clone(),
            procedures,
        };
        Ok((descriptor, flattener.take_required_imports()))
    }

    fn extract_procedure(
        &self,
        module: &Arc<SourceModule>,
        method: Node<'_>,
        registration: &ProcedureRegistration,
        flattener: &mut Flattener<'_>,
    ) -> Result<Option<ProcedureDescriptor>> {
        for decorator in ast::decorators_of(method) {
            let Some(name) = ast::decorator_name(decorator, &module.source) else {
                continue;
            };

            if let Some(kind) = ProcedureKind::from_decorator(name) {
                return Ok(Some(self.extract_decorated(
                    module,
                    decorator,
                    registration,
                    kind,
                    flattener,
                )?));
            }

            if PASSTHROUGH_DECORATORS.contains(&name) {
                continue;
            }
            warn!(
                decorator = %name,
                method = %registration.name,
                "Decorator not supported; ignoring"
            );
        }
        Ok(None)
    }

    fn extract_decorated(
        &self,
        module: &Arc<SourceModule>,
        decorator: Node<'_>,
        registration: &ProcedureRegistration,
        kind: ProcedureKind,
        flattener: &mut Flattener<'_>,
    ) -> Result<ProcedureDescriptor> {
        let mut input = None;
        let mut output = None;
        let mut meta = None;

        if let Some(argument) = ast::decorator_argument(decorator) {
            if argument.kind() == "object" {
                if let Some(value) = ast::object_property(argument, &module.source, "input") {
                    input = Some(flattener.flatten_text(module.text(value), module)?);
                }
                if let Some(value) = ast::object_property(argument, &module.source, "output") {
                    output = Some(flattener.flatten_text(module.text(value), module)?);
                }
                // The meta map is carried over exactly as written.
                if let Some(value) = ast::object_property(argument, &module.source, "meta") {
                    meta = Some(module.text(value).to_string());
                }
            } else {
                warn!(
                    method = %registration.name,
                    "Procedure decorator argument is not an object literal"
                );
            }
        }

        Ok(ProcedureDescriptor {
            name: registration.name.clone(),
            kind,
            input,
            output,
            meta,
        })
    }
}
