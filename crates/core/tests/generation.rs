//! End-to-end generation runs against on-disk fixture projects.

use shadowcast_core::{
    Config, ProcedureKind, ProcedureRegistration, RouterRegistration, ShadowcastError,
    SymbolLocation, run_generation,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_file(root: &Path, name: &str, content: &str) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(&path, content).expect("write fixture");
    path
}

fn base_config(root: &Path) -> Config {
    Config {
        source_root: root.join("src"),
        output: root.join("generated/server.ts"),
        ..Config::default()
    }
}

fn write_user_project(root: &Path) {
    write_file(
        root,
        "src/schemas/user.ts",
        "import { z } from 'zod';\n\
         export const userSchema = z.object({ id: z.string(), name: z.string() });\n",
    );
    write_file(root, "src/schemas/index.ts", "export * from './user';\n");
    write_file(
        root,
        "src/routers/user-queries.router.ts",
        r#"
        import { z } from 'zod';
        import { Router, Query } from 'shadowcast';
        import { userSchema } from '../schemas';

        @Router({ alias: 'users' })
        export class UserQueriesRouter {
            @Query({ input: z.object({ userId: z.string() }), output: userSchema })
            getUser() {
                return { id: '1', name: 'Test' };
            }

            @Query({ output: z.array(userSchema) })
            listUsers() {
                return [];
            }
        }
        "#,
    );
    write_file(
        root,
        "src/routers/user-mutations.router.ts",
        r#"
        import { z } from 'zod';
        import { Router, Mutation } from 'shadowcast';
        import { userSchema } from '../schemas';

        @Router({ alias: 'users' })
        export class UserMutationsRouter {
            @Mutation({ input: z.object({ name: z.string() }), output: userSchema })
            createUser() {
                return { id: '2', name: 'New' };
            }
        }
        "#,
    );
}

#[test]
fn generates_merged_router_with_expanded_schemas() {
    let dir = TempDir::new().expect("temp dir");
    write_user_project(dir.path());

    let report = run_generation(base_config(dir.path())).expect("generation");
    assert_eq!(report.router_count, 2);
    assert_eq!(report.procedure_count, 3);
    assert!(report.skipped.is_empty());

    let server = fs::read_to_string(report.router_module).expect("read server module");

    // Both classes share the alias, so there is exactly one merged group
    // with the union of procedures in discovery order (files are scanned
    // sorted, so the mutations router comes first).
    assert_eq!(server.matches("users: {").count(), 1);
    let create_at = server.find("createUser:").expect("createUser entry");
    let get_at = server.find("getUser:").expect("getUser entry");
    let list_at = server.find("listUsers:").expect("listUsers entry");
    assert!(create_at < get_at && get_at < list_at);

    // The barrel-imported identifier expands to the full object text.
    assert!(server.contains(
        ".output(z.object({ id: z.string(), name: z.string() })).query"
    ));
    assert!(!server.contains(".output(userSchema)"));

    assert!(server.contains("export type AppRouter = typeof appRouter;"));
}

#[test]
fn rerun_on_unchanged_sources_is_byte_identical() {
    let dir = TempDir::new().expect("temp dir");
    write_user_project(dir.path());

    let first = run_generation(base_config(dir.path())).expect("first run");
    let first_bytes = fs::read(&first.router_module).expect("read first");

    let second = run_generation(base_config(dir.path())).expect("second run");
    let second_bytes = fs::read(&second.router_module).expect("read second");

    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn malformed_router_file_aborts_and_preserves_previous_output() {
    let dir = TempDir::new().expect("temp dir");
    write_file(
        dir.path(),
        "src/broken.router.ts",
        r#"
        import { z } from 'zod';
        import { Router, Query } from 'shadowcast';

        @Router()
        export class BrokenRouter {
            @Query({ input: z.object({ id: z.string() })
            getThing() {}
        }
        "#,
    );
    let previous = write_file(
        dir.path(),
        "generated/server.ts",
        "// output of an earlier, healthy run\n",
    );

    let error = run_generation(base_config(dir.path())).expect_err("run must fail");
    assert!(matches!(error, ShadowcastError::MalformedSource { .. }));
    assert_eq!(
        fs::read_to_string(&previous).expect("read preserved file"),
        "// output of an earlier, healthy run\n"
    );
}

#[test]
fn circular_cross_file_schemas_terminate_with_unresolved_reference() {
    let dir = TempDir::new().expect("temp dir");
    write_file(
        dir.path(),
        "src/a.schema.ts",
        "import { z } from 'zod';\nimport { bSchema } from './b.schema';\n\
         export const aSchema = z.object({ b: bSchema });\n",
    );
    write_file(
        dir.path(),
        "src/b.schema.ts",
        "import { z } from 'zod';\nimport { aSchema } from './a.schema';\n\
         export const bSchema = z.object({ a: aSchema });\n",
    );
    write_file(
        dir.path(),
        "src/cyclic.router.ts",
        r#"
        import { z } from 'zod';
        import { Router, Query } from 'shadowcast';
        import { aSchema } from './a.schema';

        @Router({ alias: 'cyclic' })
        export class CyclicRouter {
            @Query({ output: aSchema })
            read() {}
        }
        "#,
    );

    let report = run_generation(base_config(dir.path())).expect("run must terminate");
    let server = fs::read_to_string(report.router_module).expect("read server module");

    // The cycle edge survives as an identifier placeholder instead of
    // hanging or overflowing.
    assert!(server.contains("aSchema"));
    assert!(server.contains(".output(z.object("));
}

#[test]
fn failing_router_is_skipped_and_reported() {
    let dir = TempDir::new().expect("temp dir");
    write_user_project(dir.path());

    let mut config = base_config(dir.path());
    config.registry = vec![
        RouterRegistration {
            class_name: "UserQueriesRouter".to_string(),
            alias: Some("users".to_string()),
            source_file: dir.path().join("src/routers/user-queries.router.ts"),
            procedures: vec![ProcedureRegistration {
                name: "getUser".to_string(),
                kind: ProcedureKind::Query,
            }],
        },
        RouterRegistration {
            class_name: "GhostRouter".to_string(),
            alias: None,
            source_file: dir.path().join("src/routers/user-queries.router.ts"),
            procedures: Vec::new(),
        },
    ];

    let report = run_generation(config).expect("run continues past the bad router");
    assert_eq!(report.router_count, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].router, "GhostRouter");

    let server = fs::read_to_string(report.router_module).expect("read server module");
    assert!(server.contains("getUser:"));
}

#[test]
fn helper_types_module_covers_context_and_middleware() {
    let dir = TempDir::new().expect("temp dir");
    write_user_project(dir.path());
    write_file(
        dir.path(),
        "src/app.context.ts",
        r#"
        export class AppContext {
            async create(opts) {
                return { userId: 'anonymous', roles: [] };
            }
        }
        "#,
    );
    write_file(
        dir.path(),
        "src/logger.middleware.ts",
        r#"
        export class LoggerMiddleware {
            use(opts) {
                return opts.next({ ctx: { requestId: 'r-0' } });
            }
        }
        "#,
    );

    let mut config = base_config(dir.path());
    config.context = Some(SymbolLocation {
        file: dir.path().join("src/app.context.ts"),
        class: "AppContext".to_string(),
    });
    config.middlewares = vec![SymbolLocation {
        file: dir.path().join("src/logger.middleware.ts"),
        class: "LoggerMiddleware".to_string(),
    }];

    let report = run_generation(config).expect("generation");
    let helper_path = report.helper_module.expect("helper module path");
    let helper = fs::read_to_string(helper_path).expect("read helper module");

    assert!(helper.contains(
        "export type Context = { userId: string; roles: unknown[] };"
    ));
    assert!(helper.contains("export interface LoggerMiddlewareContext extends Context {"));
    assert!(helper.contains("  requestId: string;"));
}

#[test]
fn helper_import_is_emitted_with_relative_path() {
    let dir = TempDir::new().expect("temp dir");
    write_file(
        dir.path(),
        "src/shared/helpers.ts",
        "import { z } from 'zod';\n\
         export const paginated = (schema) => z.object({ items: schema, total: z.number() });\n",
    );
    write_file(
        dir.path(),
        "src/lists.router.ts",
        r#"
        import { z } from 'zod';
        import { Router, Query } from 'shadowcast';
        import { paginated } from './shared/helpers';

        @Router({ alias: 'lists' })
        export class ListsRouter {
            @Query({ output: paginated(z.string()) })
            list() {}
        }
        "#,
    );

    let report = run_generation(base_config(dir.path())).expect("generation");
    let server = fs::read_to_string(report.router_module).expect("read server module");

    assert!(server.contains("import { paginated } from \"../src/shared/helpers\";"));
    assert!(server.contains(".output(paginated(z.string()))"));
}

#[test]
fn empty_project_is_a_configuration_error() {
    let dir = TempDir::new().expect("temp dir");
    fs::create_dir_all(dir.path().join("src")).expect("mkdir");

    let error = run_generation(base_config(dir.path())).expect_err("must fail");
    assert!(matches!(error, ShadowcastError::Config(_)));
}
