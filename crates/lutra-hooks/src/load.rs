//! The load dispatcher.
//!
//! Decides per module whether its source is transformed, how, and which
//! source map is installed for it:
//!
//! | Format     | Source                        | Action                          |
//! |------------|-------------------------------|---------------------------------|
//! | commonjs   | `.cjs`, plain `.js`           | interop rewrite                 |
//! | commonjs   | TS/JSX, or ESM syntax         | transform to CommonJS + interop |
//! | module     | TS/JSX                        | transform (off-thread) + interop|
//! | json       | any                           | JSON module + interop           |
//! | module     | plain JS                      | interop rewrite                 |
//! | builtin    | -                             | pass through                    |

use std::path::Path;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use lutra_transform::{
    MediaType, ModuleKind, TransformOptions, TransformOutput, has_module_syntax,
    inline_source_map_comment, is_dependency_path, rewrite_dynamic_imports,
};
use url::Url;

use crate::chain::{LoadContext, LoadResult, LoadStage, ModuleSource, NextLoad};
use crate::context::HookContext;
use crate::error::{HookError, HookResult};
use crate::format::ModuleFormat;

/// Transformed code and the map from it back to the original source.
type Transformed = (String, Option<String>);

pub struct TsLoadHook {
    context: Arc<HookContext>,
}

impl TsLoadHook {
    pub fn new(context: Arc<HookContext>) -> Self {
        Self { context }
    }

    fn transform_options(&self, path: &Path, media_type: MediaType, module: ModuleKind) -> TransformOptions {
        TransformOptions::new(media_type, module)
            .config(self.context.compiler_options_for(path))
            .source_map(!is_dependency_path(&path.to_string_lossy()))
    }

    /// CommonJS modules load synchronously, so everything here blocks.
    fn load_commonjs(
        &self,
        url: &Url,
        path: &Path,
        media_type: MediaType,
        mut loaded: LoadResult,
    ) -> HookResult<LoadResult> {
        let code = match loaded.source.take() {
            Some(source) => source.into_text(url)?,
            None => std::fs::read_to_string(path).map_err(|source| HookError::Read {
                path: path.to_path_buf(),
                source,
            })?,
        };

        let transform = media_type != MediaType::Cjs
            && (media_type.needs_transform() || has_module_syntax(&code));

        let transformed = if transform {
            let options = self.transform_options(path, media_type, ModuleKind::CommonJs);
            let output = self
                .context
                .transformer()
                .transform_sync(&code, path, &options)?;
            Some(with_interop(path, output)?)
        } else {
            interop_only(path, &code)?
        };

        match transformed {
            Some(transformed) => self.finish(url, path, loaded, transformed),
            None => {
                loaded.source = Some(ModuleSource::Text(code));
                Ok(loaded)
            }
        }
    }

    async fn load_transformed(
        &self,
        url: &Url,
        path: &Path,
        media_type: MediaType,
        mut loaded: LoadResult,
    ) -> HookResult<LoadResult> {
        let Some(source) = loaded.source.take() else {
            return Ok(loaded);
        };
        let code = source.into_text(url)?;

        let transformer = Arc::clone(self.context.transformer());
        let options = self.transform_options(path, media_type, ModuleKind::Esm);
        let task_path = path.to_path_buf();
        let output = tokio::task::spawn_blocking(move || {
            transformer.transform_sync(&code, &task_path, &options)
        })
        .await
        .map_err(|e| HookError::Task(e.to_string()))??;

        loaded.format = ModuleFormat::Module;
        let transformed = with_interop(path, output)?;
        self.finish(url, path, loaded, transformed)
    }

    fn load_plain(&self, url: &Url, path: &Path, mut loaded: LoadResult) -> HookResult<LoadResult> {
        let Some(code) = loaded.source_text().map(|text| text.into_owned()) else {
            return Ok(loaded);
        };
        match interop_only(path, &code)? {
            Some(transformed) => self.finish(url, path, loaded, transformed),
            None => {
                loaded.source = Some(ModuleSource::Text(code));
                Ok(loaded)
            }
        }
    }

    async fn dispatch<'a>(
        &'a self,
        url: &'a Url,
        mut context: LoadContext,
        next: NextLoad<'a>,
    ) -> HookResult<LoadResult> {
        self.context.reporter().report(url);

        let media_type = MediaType::from_specifier(url.path());
        if media_type == MediaType::Json {
            context
                .import_attributes
                .insert("type".to_string(), "json".to_string());
        }

        let loaded = next.call(url, context).await?;

        if url.scheme() != "file" {
            return Ok(loaded);
        }
        let path = url
            .to_file_path()
            .map_err(|_| HookError::InvalidUrl(url.to_string()))?;

        match loaded.format {
            ModuleFormat::CommonJs => self.load_commonjs(url, &path, media_type, loaded),
            ModuleFormat::Json => {
                self.load_transformed(url, &path, MediaType::Json, loaded)
                    .await
            }
            ModuleFormat::Module if media_type.needs_transform() => {
                self.load_transformed(url, &path, media_type, loaded).await
            }
            ModuleFormat::Module => self.load_plain(url, &path, loaded),
            ModuleFormat::Builtin => Ok(loaded),
        }
    }

    /// Install the map, optionally inline it, and hand the code back.
    fn finish(
        &self,
        url: &Url,
        path: &Path,
        mut loaded: LoadResult,
        (mut code, map): Transformed,
    ) -> HookResult<LoadResult> {
        let map = map.filter(|_| !is_dependency_path(&path.to_string_lossy()));
        if let Some(map) = &map {
            self.context.source_maps().install(url.as_str(), map)?;
            if self.context.config().inline_source_maps {
                if !code.ends_with('\n') {
                    code.push('\n');
                }
                code.push_str(&inline_source_map_comment(map)?);
                code.push('\n');
            }
        }

        loaded.source = Some(ModuleSource::Text(code));
        loaded.source_map = map;
        Ok(loaded)
    }
}

/// Interop rewrite on transformed output, with the maps stitched together.
fn with_interop(path: &Path, output: TransformOutput) -> HookResult<Transformed> {
    match rewrite_dynamic_imports(path, &output.code)? {
        Some(rewrite) => {
            let map = output
                .map
                .as_deref()
                .map(|map| rewrite.stitch(map))
                .transpose()?;
            Ok((rewrite.code, map))
        }
        None => Ok((output.code, output.map)),
    }
}

/// Interop rewrite on untransformed source. `None` when nothing changed.
/// Dependencies get no map.
fn interop_only(path: &Path, code: &str) -> HookResult<Option<Transformed>> {
    let Some(rewrite) = rewrite_dynamic_imports(path, code)? else {
        return Ok(None);
    };
    let source = path.to_string_lossy();
    let map = (!is_dependency_path(&source)).then(|| rewrite.identity_map(&source, code));
    Ok(Some((rewrite.code, map)))
}

impl LoadStage for TsLoadHook {
    fn load<'a>(
        &'a self,
        url: &'a Url,
        context: LoadContext,
        next: NextLoad<'a>,
    ) -> BoxFuture<'a, HookResult<LoadResult>> {
        Box::pin(self.dispatch(url, context, next))
    }
}
