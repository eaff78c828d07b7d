//! The host's default resolver and loader.
//!
//! These are the last stages of each chain and stand in for the runtime's
//! own algorithms: strict ESM resolution (no extension search, no directory
//! indexes for relative paths) and plain file reads.

use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use oxc_resolver::{ResolveOptions, Resolver};
use url::Url;

use crate::chain::{
    ImportKind, LoadContext, LoadResult, LoadStage, ModuleSource, NextLoad, NextResolve,
    Resolution, ResolveContext, ResolveStage,
};
use crate::error::{HookError, HookResult, ResolveError};
use crate::format::{ModuleFormat, package_format, url_extension};

/// Built-in module names that resolve without the `node:` prefix.
const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "assert/strict",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "dns/promises",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "path/posix",
    "path/win32",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "readline/promises",
    "repl",
    "stream",
    "stream/promises",
    "stream/web",
    "string_decoder",
    "timers",
    "timers/promises",
    "tls",
    "tty",
    "url",
    "util",
    "util/types",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

pub fn is_builtin(specifier: &str) -> bool {
    let name = specifier.strip_prefix("node:").unwrap_or(specifier);
    BUILTIN_MODULES.contains(&name)
}

/// Relative (`./`, `../`, `.`, `..`), absolute or `file:` specifiers.
pub(crate) fn is_path_like(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || specifier.starts_with("file:")
}

/// Format declared for a resolved file.
fn file_format(path: &Path) -> Option<ModuleFormat> {
    match path.extension().and_then(|ext| ext.to_str())? {
        "mjs" => Some(ModuleFormat::Module),
        "cjs" => Some(ModuleFormat::CommonJs),
        "json" => Some(ModuleFormat::Json),
        "js" => Some(package_format(path)),
        _ => None,
    }
}

fn display_parent(parent: Option<&Url>, cwd: &Path) -> String {
    parent
        .and_then(|url| url.to_file_path().ok())
        .unwrap_or_else(|| cwd.to_path_buf())
        .display()
        .to_string()
}

pub struct NodeResolver {
    cwd: PathBuf,
    esm_options: ResolveOptions,
    cjs_options: ResolveOptions,
    /// Resolver for `import` (uses esm conditions)
    esm_resolver: Resolver,
    /// Resolver for `require()` (uses cjs conditions)
    cjs_resolver: Resolver,
}

impl NodeResolver {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        // ESM: no extension search, packages fall back to index files
        let esm_options = ResolveOptions {
            extensions: vec![],
            condition_names: vec!["import".into(), "node".into(), "default".into()],
            main_files: vec!["index.js".into(), "index.json".into(), "index.node".into()],
            ..ResolveOptions::default()
        };

        // CJS: classic require() extension search
        let cjs_options = ResolveOptions {
            extensions: vec![".js".into(), ".json".into(), ".node".into()],
            condition_names: vec!["require".into(), "node".into(), "default".into()],
            ..ResolveOptions::default()
        };

        Self {
            cwd: cwd.into(),
            esm_resolver: Resolver::new(esm_options.clone()),
            cjs_resolver: Resolver::new(cjs_options.clone()),
            esm_options,
            cjs_options,
        }
    }

    fn resolve_path(
        &self,
        specifier: &str,
        context: &ResolveContext,
    ) -> Result<Resolution, ResolveError> {
        let base = match &context.parent_url {
            Some(parent) => parent.clone(),
            None => Url::from_directory_path(&self.cwd).map_err(|_| {
                ResolveError::other(format!("Invalid working directory: {}", self.cwd.display()))
            })?,
        };
        let url = base
            .join(specifier)
            .map_err(|e| ResolveError::other(format!("Invalid specifier '{}': {}", specifier, e)))?;
        let path = url
            .to_file_path()
            .map_err(|_| ResolveError::other(format!("Not a file URL: {}", url)))?;
        let parent = display_parent(context.parent_url.as_ref(), &self.cwd);

        if path.is_dir() {
            return Err(ResolveError::unsupported_directory_import(format!(
                "Directory import '{}' is not supported resolving ES modules imported from {}",
                path.display(),
                parent
            )));
        }
        if !path.is_file() {
            return Err(ResolveError::module_not_found(format!(
                "Cannot find module '{}' imported from {}",
                path.display(),
                parent
            )));
        }

        let format = file_format(&path);
        Ok(Resolution::new(url, format))
    }

    fn resolve_package(
        &self,
        specifier: &str,
        context: &ResolveContext,
    ) -> Result<Resolution, ResolveError> {
        let base_dir = context
            .parent_url
            .as_ref()
            .and_then(|url| url.to_file_path().ok())
            .and_then(|path| path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| self.cwd.clone());

        let (resolver, options) = match context.kind {
            ImportKind::Import => (&self.esm_resolver, &self.esm_options),
            ImportKind::Require => (&self.cjs_resolver, &self.cjs_options),
        };
        let custom;
        let resolver = if context.conditions.is_empty() {
            resolver
        } else {
            custom = resolver.clone_with_options(ResolveOptions {
                condition_names: context.conditions.clone(),
                ..options.clone()
            });
            &custom
        };

        match resolver.resolve(&base_dir, specifier) {
            Ok(resolution) => {
                let path = resolution.path().to_path_buf();
                let url = Url::from_file_path(&path).map_err(|_| {
                    ResolveError::other(format!("Not an absolute path: {}", path.display()))
                })?;
                let format = file_format(&path);
                Ok(Resolution::new(url, format))
            }
            Err(e @ oxc_resolver::ResolveError::PackagePathNotExported { .. }) => {
                Err(ResolveError::package_path_not_exported(e.to_string()))
            }
            Err(e @ oxc_resolver::ResolveError::PackageImportNotDefined { .. }) => {
                Err(ResolveError::package_import_not_defined(e.to_string()))
            }
            Err(oxc_resolver::ResolveError::NotFound { .. }) => {
                Err(ResolveError::module_not_found(format!(
                    "Cannot find package '{}' imported from {}",
                    specifier,
                    display_parent(context.parent_url.as_ref(), &self.cwd)
                )))
            }
            Err(e) => Err(ResolveError::other(format!(
                "Cannot resolve '{}' from '{}': {}",
                specifier,
                base_dir.display(),
                e
            ))),
        }
    }
}

impl ResolveStage for NodeResolver {
    fn resolve(
        &self,
        specifier: &str,
        context: &ResolveContext,
        _next: NextResolve<'_>,
    ) -> Result<Resolution, ResolveError> {
        if is_builtin(specifier) {
            let name = specifier.strip_prefix("node:").unwrap_or(specifier);
            let url = Url::parse(&format!("node:{}", name))
                .map_err(|e| ResolveError::other(e.to_string()))?;
            return Ok(Resolution::new(url, Some(ModuleFormat::Builtin)));
        }
        if specifier.starts_with("node:") {
            return Err(ResolveError::other(format!(
                "No such built-in module: {}",
                specifier
            )));
        }

        if is_path_like(specifier) {
            return self.resolve_path(specifier, context);
        }
        self.resolve_package(specifier, context)
    }
}

/// Reads module source from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeLoader;

impl LoadStage for NodeLoader {
    fn load<'a>(
        &'a self,
        url: &'a Url,
        context: LoadContext,
        _next: NextLoad<'a>,
    ) -> BoxFuture<'a, HookResult<LoadResult>> {
        Box::pin(async move {
            if url.scheme() == "node" {
                return Ok(LoadResult::new(ModuleFormat::Builtin, None));
            }
            if url.scheme() != "file" {
                return Err(HookError::InvalidUrl(format!(
                    "Only file: and node: URLs are supported, got {}",
                    url
                )));
            }

            let Some(format) = context.format else {
                return Err(ResolveError::unknown_file_extension(format!(
                    "Unknown file extension \".{}\" for {}",
                    url_extension(url).unwrap_or_default(),
                    url.path()
                ))
                .into());
            };

            match format {
                ModuleFormat::Builtin | ModuleFormat::CommonJs => {
                    return Ok(LoadResult::new(format, None));
                }
                ModuleFormat::Json
                    if context.kind == ImportKind::Import
                        && context.import_attributes.get("type").map(String::as_str)
                            != Some("json") =>
                {
                    return Err(ResolveError::other(format!(
                        "Module \"{}\" needs an import attribute of \"type: json\"",
                        url
                    ))
                    .into());
                }
                _ => {}
            }

            let path = url
                .to_file_path()
                .map_err(|_| HookError::InvalidUrl(url.to_string()))?;
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| HookError::Read { path, source })?;
            Ok(LoadResult::new(format, Some(ModuleSource::Binary(bytes))))
        })
    }
}
