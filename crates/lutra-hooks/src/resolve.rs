//! The resolution engine.
//!
//! Sits in front of the host resolver and widens what resolves:
//!
//! 1. Directory specifiers (`./dir/`, `./dir/?q`) go straight to index lookup.
//! 2. Bare specifiers are rewritten through tsconfig `paths`.
//! 3. From a TypeScript or JSX parent, `./util.js` prefers `./util.ts`.
//! 4. The host resolver runs. Directory imports fall back to index lookup and
//!    missing files fall back to extension lookup.
//!
//! Failures from extension and index lookup never leak the tried suffix: a failed
//! `./foo` reports `'./foo'`, not `'./foo.js'` or `'./foo/index'`.

use std::sync::Arc;

use lutra_transform::{MediaType, is_dependency_path};
use url::Url;

use crate::candidates::ts_candidates;
use crate::chain::{NextResolve, Resolution, ResolveContext, ResolveStage};
use crate::context::HookContext;
use crate::error::{ResolveError, ResolveErrorKind};
use crate::format::infer_format;
use crate::host::is_path_like;

/// Extensions tried for an extensionless specifier, in order.
pub const TRIAL_EXTENSIONS: [&str; 5] = [".js", ".json", ".ts", ".tsx", ".jsx"];

/// Split `specifier` into path and `?query` (query keeps its `?`).
fn split_query(specifier: &str) -> (&str, &str) {
    match specifier.find('?') {
        Some(index) => specifier.split_at(index),
        None => (specifier, ""),
    }
}

/// A path ending in `/`, optionally followed by a query.
pub fn is_directory_specifier(specifier: &str) -> bool {
    split_query(specifier).0.ends_with('/')
}

/// Neither relative, absolute nor a URL.
pub fn is_bare_specifier(specifier: &str) -> bool {
    if is_path_like(specifier) {
        return false;
    }
    // `node:fs`, `data:...`, `https://...`
    Url::parse(specifier).is_err()
}

pub struct TsResolveHook {
    context: Arc<HookContext>,
}

impl TsResolveHook {
    pub fn new(context: Arc<HookContext>) -> Self {
        Self { context }
    }

    fn resolve_inner(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: NextResolve<'_>,
        recursive: bool,
    ) -> Result<Resolution, ResolveError> {
        if is_directory_specifier(specifier) {
            return self.try_directory(specifier, context, next);
        }

        if !recursive
            && let Some(resolution) = self.try_paths(specifier, context, next)
        {
            return Ok(resolution);
        }

        let from_typed_source = context.parent_url.as_ref().is_some_and(|parent| {
            let media = MediaType::from_specifier(parent.as_str());
            media.is_typescript() || media.is_jsx()
        });
        if from_typed_source {
            for candidate in ts_candidates(specifier) {
                match resolve_explicit(&candidate, context, next) {
                    Ok(resolution) => return Ok(resolution),
                    Err(e)
                        if e.is(ResolveErrorKind::ModuleNotFound)
                            || e.is(ResolveErrorKind::PackagePathNotExported) =>
                    {
                        tracing::trace!(candidate, "typed sibling not found");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let error = match resolve_explicit(specifier, context, next) {
            Ok(resolution) => return Ok(resolution),
            Err(error) => error,
        };

        match error.kind {
            ResolveErrorKind::UnsupportedDirectoryImport if !recursive => {
                match self.try_directory(specifier, context, next) {
                    Ok(resolution) => Ok(resolution),
                    Err(e) if e.is(ResolveErrorKind::PackageImportNotDefined) => Err(error),
                    Err(e) => Err(e),
                }
            }
            ResolveErrorKind::ModuleNotFound => self.try_extensions(specifier, context, next),
            _ => Err(error),
        }
    }

    /// tsconfig `paths` rewriting. Only for bare specifiers imported from
    /// outside dependency directories.
    fn try_paths(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: NextResolve<'_>,
    ) -> Option<Resolution> {
        let matcher = self.context.path_matcher()?;
        if !is_bare_specifier(specifier) {
            return None;
        }
        if context
            .parent_url
            .as_ref()
            .is_some_and(|parent| is_dependency_path(parent.path()))
        {
            return None;
        }

        for candidate in matcher.candidates(specifier) {
            let Ok(url) = Url::from_file_path(&candidate) else {
                continue;
            };
            match self.resolve_inner(url.as_str(), context, next, true) {
                Ok(resolution) => {
                    tracing::debug!(specifier, url = %resolution.url, "resolved through tsconfig paths");
                    return Some(resolution);
                }
                Err(e) => tracing::trace!(specifier, candidate = %url, error = %e, "path mapping candidate failed"),
            }
        }
        None
    }

    /// Try each of [`TRIAL_EXTENSIONS`] on `specifier`, keeping its query. On
    /// failure the first error is returned without the tried extension.
    fn try_extensions(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: NextResolve<'_>,
    ) -> Result<Resolution, ResolveError> {
        let (path, query) = split_query(specifier);
        let mut first_error: Option<ResolveError> = None;

        for extension in TRIAL_EXTENSIONS {
            let candidate = format!("{}{}{}", path, extension, query);
            match resolve_explicit(&candidate, context, next) {
                Ok(resolution) => return Ok(resolution),
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(mut e) => {
                    if first_error.is_none() {
                        e.strip_message_suffix(extension);
                        first_error = Some(e);
                    }
                }
            }
        }

        Err(first_error.unwrap_or_else(|| {
            ResolveError::module_not_found(format!("Cannot find module '{}'", specifier))
        }))
    }

    /// Look for `<specifier>/index` with extension lookup. Non-directory
    /// specifiers get one more extension lookup on the literal path.
    fn try_directory(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: NextResolve<'_>,
    ) -> Result<Resolution, ResolveError> {
        let (path, query) = split_query(specifier);
        let index = if path.ends_with('/') { "index" } else { "/index" };

        match self.try_extensions(&format!("{}{}{}", path, index, query), context, next) {
            Ok(resolution) => Ok(resolution),
            Err(e) if !e.is_recoverable() => Err(e),
            Err(_) if !is_directory_specifier(specifier) => {
                self.try_extensions(specifier, context, next)
            }
            Err(mut e) => {
                e.strip_message_suffix(index);
                Err(e)
            }
        }
    }
}

/// Delegate to the rest of the chain, filling in a missing format for
/// `file:` URLs.
fn resolve_explicit(
    specifier: &str,
    context: &ResolveContext,
    next: NextResolve<'_>,
) -> Result<Resolution, ResolveError> {
    let mut resolution = next.call(specifier, context)?;
    if resolution.format.is_none() {
        resolution.format = infer_format(&resolution.url);
    }
    Ok(resolution)
}

impl ResolveStage for TsResolveHook {
    fn resolve(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: NextResolve<'_>,
    ) -> Result<Resolution, ResolveError> {
        self.resolve_inner(specifier, context, next, false)
    }
}
