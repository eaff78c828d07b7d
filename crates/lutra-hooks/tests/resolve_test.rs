//! Resolution engine behavior against real fixture trees.

use std::path::Path;
use std::sync::Arc;

use lutra_hooks::{
    HookContext, HooksConfig, InitializeData, ModuleFormat, NextResolve, NodeResolver,
    Resolution, ResolveContext, ResolveError, ResolveErrorKind, ResolveStage, ResolverChain,
    TsResolveHook, TsconfigSource,
};
use tempfile::{TempDir, tempdir};
use url::Url;

fn write(root: &Path, file: &str, content: &str) {
    let path = root.join(file);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn fixture() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "package.json", r#"{ "type": "module" }"#);
    write(root, "main.ts", "");
    write(root, "main.js", "");
    write(root, "util.ts", "");
    write(root, "util.js", "");
    write(root, "helper.ts", "");
    write(root, "view.jsx", "");
    write(root, "esm.mjs", "");
    write(root, "esm.mts", "");
    write(root, "common.cjs", "");
    write(root, "common.cts", "");
    write(root, "dir/index.ts", "");
    write(root, "dir/index.tsx", "");
    write(root, "cjs/index.cjs", "");
    write(root, "mapped/file.ts", "");
    write(root, "node_modules/dep/index.js", "");
    write(
        root,
        "tsconfig.json",
        r#"{ "compilerOptions": { "paths": { "prefix/*": ["mapped/*"] } } }"#,
    );
    dir
}

fn chain(root: &Path) -> ResolverChain {
    let config = HooksConfig::new(root).tsconfig(TsconfigSource::Path("tsconfig.json".into()));
    let context = HookContext::initialize(Some(InitializeData::new(config))).unwrap();
    lutra_hooks::chains(context).0
}

fn from(root: &Path, parent: &str) -> ResolveContext {
    ResolveContext::new(Some(Url::from_file_path(root.join(parent)).unwrap()))
}

fn url_of(root: &Path, file: &str) -> Url {
    Url::from_file_path(root.join(file)).unwrap()
}

#[test]
fn test_directory_resolves_first_index_by_extension() {
    let dir = fixture();
    let chain = chain(dir.path());

    let res = chain.resolve("./dir", &from(dir.path(), "main.ts")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "dir/index.ts"));
    assert_eq!(res.format, Some(ModuleFormat::Module));

    let res = chain.resolve("./dir/", &from(dir.path(), "main.js")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "dir/index.ts"));
}

#[test]
fn test_typed_sibling_preferred_from_typescript() {
    let dir = fixture();
    let chain = chain(dir.path());

    let res = chain.resolve("./util.js", &from(dir.path(), "main.ts")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "util.ts"));

    let res = chain.resolve("./util.js", &from(dir.path(), "main.js")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "util.js"));

    // Only the .ts exists
    let res = chain.resolve("./helper.js", &from(dir.path(), "main.ts")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "helper.ts"));
}

#[test]
fn test_module_extensions_map_to_typed_siblings() {
    let dir = fixture();
    let chain = chain(dir.path());

    let res = chain.resolve("./esm.mjs", &from(dir.path(), "main.ts")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "esm.mts"));
    assert_eq!(res.format, Some(ModuleFormat::Module));

    let res = chain.resolve("./common.cjs", &from(dir.path(), "main.ts")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "common.cts"));
    assert_eq!(res.format, Some(ModuleFormat::CommonJs));

    let res = chain.resolve("./esm.mjs", &from(dir.path(), "main.js")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "esm.mjs"));
}

#[test]
fn test_typed_sibling_preferred_from_jsx() {
    let dir = fixture();
    let chain = chain(dir.path());

    let res = chain.resolve("./util.js", &from(dir.path(), "view.jsx")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "util.ts"));
}

#[test]
fn test_extensionless_lookup() {
    let dir = fixture();
    let chain = chain(dir.path());

    let res = chain.resolve("./helper", &from(dir.path(), "main.js")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "helper.ts"));
}

#[test]
fn test_failed_lookup_hides_tried_extensions() {
    let dir = fixture();
    let chain = chain(dir.path());

    let err = chain
        .resolve("./cjs/index", &from(dir.path(), "main.ts"))
        .unwrap_err();
    assert_eq!(err.kind, ResolveErrorKind::ModuleNotFound);
    assert!(!err.message.contains(".cjs"), "{}", err.message);
    assert!(!err.message.contains("index.js"), "{}", err.message);
    assert!(err.message.contains("cjs/index'"), "{}", err.message);
    assert!(!err.stack.unwrap().contains("index.js'"));
}

#[test]
fn test_missing_directory_index_hides_index_suffix() {
    let dir = fixture();
    write(dir.path(), "empty/.keep", "");
    let chain = chain(dir.path());

    let err = chain
        .resolve("./empty/", &from(dir.path(), "main.ts"))
        .unwrap_err();
    assert_eq!(err.kind, ResolveErrorKind::ModuleNotFound);
    assert!(!err.message.contains("index"), "{}", err.message);
}

#[test]
fn test_path_mapping() {
    let dir = fixture();
    let chain = chain(dir.path());

    let res = chain
        .resolve("prefix/file", &from(dir.path(), "main.ts"))
        .unwrap();
    assert_eq!(res.url, url_of(dir.path(), "mapped/file.ts"));

    let err = chain
        .resolve("prefix/file", &from(dir.path(), "node_modules/dep/index.js"))
        .unwrap_err();
    assert_eq!(err.kind, ResolveErrorKind::ModuleNotFound);
}

#[test]
fn test_query_is_preserved() {
    let dir = fixture();
    let chain = chain(dir.path());

    let res = chain
        .resolve("./helper?v=1", &from(dir.path(), "main.js"))
        .unwrap();
    assert!(res.url.path().ends_with("/helper.ts"));
    assert_eq!(res.url.query(), Some("v=1"));

    let res = chain
        .resolve("./util.js?raw", &from(dir.path(), "main.ts"))
        .unwrap();
    assert!(res.url.path().ends_with("/util.ts"));
    assert_eq!(res.url.query(), Some("raw"));
}

#[test]
fn test_builtins_pass_through() {
    let dir = fixture();
    let chain = chain(dir.path());

    let res = chain.resolve("node:fs", &from(dir.path(), "main.ts")).unwrap();
    assert_eq!(res.url.as_str(), "node:fs");
    assert_eq!(res.format, Some(ModuleFormat::Builtin));
}

/// Fails every `.ts` candidate with a non-recoverable error.
struct RejectTypeScript;

impl ResolveStage for RejectTypeScript {
    fn resolve(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: NextResolve<'_>,
    ) -> Result<Resolution, ResolveError> {
        if specifier.ends_with(".ts") {
            return Err(ResolveError::other(format!("rejected {}", specifier)));
        }
        next.call(specifier, context)
    }
}

#[test]
fn test_unrecoverable_errors_propagate() {
    let dir = fixture();
    let context = Arc::new(HookContext::new(HooksConfig::new(dir.path())));
    let chain = ResolverChain::new(vec![
        Arc::new(TsResolveHook::new(context)),
        Arc::new(RejectTypeScript),
        Arc::new(NodeResolver::new(dir.path())),
    ]);

    let err = chain
        .resolve("./util.js", &from(dir.path(), "main.ts"))
        .unwrap_err();
    assert_eq!(err.kind, ResolveErrorKind::Other);
    assert!(err.message.contains("util.ts"));

    // Extension lookup stops at the first fatal candidate
    let err = chain
        .resolve("./helper", &from(dir.path(), "main.js"))
        .unwrap_err();
    assert_eq!(err.kind, ResolveErrorKind::Other);
}

/// Refuses typed candidates as if a package `exports` map hid them.
struct HideTypeScript;

impl ResolveStage for HideTypeScript {
    fn resolve(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: NextResolve<'_>,
    ) -> Result<Resolution, ResolveError> {
        if specifier.ends_with(".ts") || specifier.ends_with(".tsx") {
            return Err(ResolveError::package_path_not_exported(format!(
                "Package subpath '{}' is not defined by \"exports\"",
                specifier
            )));
        }
        next.call(specifier, context)
    }
}

#[test]
fn test_unexported_typed_sibling_falls_through() {
    let dir = fixture();
    let context = Arc::new(HookContext::new(HooksConfig::new(dir.path())));
    let chain = ResolverChain::new(vec![
        Arc::new(TsResolveHook::new(context)),
        Arc::new(HideTypeScript),
        Arc::new(NodeResolver::new(dir.path())),
    ]);

    let res = chain.resolve("./util.js", &from(dir.path(), "main.ts")).unwrap();
    assert_eq!(res.url, url_of(dir.path(), "util.js"));
}

/// Refuses everything below `./dir` except the directory itself.
struct UndefinedDirImports;

impl ResolveStage for UndefinedDirImports {
    fn resolve(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: NextResolve<'_>,
    ) -> Result<Resolution, ResolveError> {
        if specifier.starts_with("./dir") && specifier != "./dir" {
            return Err(ResolveError::package_import_not_defined(format!(
                "Package import specifier '{}' is not defined",
                specifier
            )));
        }
        next.call(specifier, context)
    }
}

#[test]
fn test_directory_fallback_reports_original_error() {
    let dir = fixture();
    let context = Arc::new(HookContext::new(HooksConfig::new(dir.path())));
    let chain = ResolverChain::new(vec![
        Arc::new(TsResolveHook::new(context)),
        Arc::new(UndefinedDirImports),
        Arc::new(NodeResolver::new(dir.path())),
    ]);

    let err = chain
        .resolve("./dir", &from(dir.path(), "main.js"))
        .unwrap_err();
    assert_eq!(err.kind, ResolveErrorKind::UnsupportedDirectoryImport);
    assert!(!err.message.contains("index"), "{}", err.message);
}
