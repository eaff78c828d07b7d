//! The process-scoped hook context.
//!
//! Created once when the hooks are activated and shared by every resolve and
//! load call. Nothing in it is mutated after construction except the source
//! map registry, which is concurrent.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use lutra_transform::{
    CompilerOptionsLookup, PathMatcher, SourceMapRegistry, SwcTransformer, Transform,
    TsConfigJson, TsconfigFileMatcher, TypeScriptConfig, find_tsconfig,
};

use crate::config::{HooksConfig, TsconfigSource};
use crate::error::{HookError, HookResult};
use crate::reporter::{DependencyReporter, NoopReporter};

/// What the host hands over when activating the hooks.
#[derive(Clone)]
pub struct InitializeData {
    pub config: HooksConfig,
    /// Watch-mode dependency channel. `None` when not watching.
    pub reporter: Option<Arc<dyn DependencyReporter>>,
}

impl InitializeData {
    pub fn new(config: HooksConfig) -> Self {
        Self {
            config,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn DependencyReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }
}

pub struct HookContext {
    config: HooksConfig,
    path_matcher: Option<Arc<dyn PathMatcher>>,
    compiler_options: Option<Arc<dyn CompilerOptionsLookup>>,
    reporter: Arc<dyn DependencyReporter>,
    transformer: Arc<dyn Transform>,
    source_maps: Arc<SourceMapRegistry>,
}

impl fmt::Debug for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("config", &self.config)
            .field("path_matcher", &self.path_matcher.is_some())
            .field("compiler_options", &self.compiler_options.is_some())
            .field("source_maps", &self.source_maps)
            .finish()
    }
}

impl HookContext {
    /// A context with no tsconfig, no watcher and the SWC transformer.
    pub fn new(config: HooksConfig) -> Self {
        Self {
            config,
            path_matcher: None,
            compiler_options: None,
            reporter: Arc::new(NoopReporter),
            transformer: Arc::new(SwcTransformer::new()),
            source_maps: Arc::new(SourceMapRegistry::new()),
        }
    }

    /// Activate the hooks. Loads tsconfig.json as configured.
    ///
    /// Fails with [`HookError::MissingInitializeData`] when the host activated
    /// the hooks without passing initialization data.
    pub fn initialize(data: Option<InitializeData>) -> HookResult<Arc<Self>> {
        let data = data.ok_or(HookError::MissingInitializeData)?;
        let mut context = Self::new(data.config);
        if let Some(reporter) = data.reporter {
            context.reporter = reporter;
        }

        let tsconfig_path = match &context.config.tsconfig {
            TsconfigSource::Disabled => None,
            TsconfigSource::Discover => find_tsconfig(&context.config.cwd),
            TsconfigSource::Path(path) => {
                let path = context.config.cwd.join(path);
                if !path.is_file() {
                    return Err(HookError::config(format!(
                        "tsconfig not found: {}",
                        path.display()
                    )));
                }
                Some(path)
            }
        };

        if let Some(path) = tsconfig_path {
            context = context.with_tsconfig(&path)?;
        }

        tracing::debug!(
            cwd = %context.config.cwd.display(),
            paths = context.path_matcher.is_some(),
            compiler_options = context.compiler_options.is_some(),
            "lutra hooks initialized"
        );
        Ok(Arc::new(context))
    }

    /// Use the path mapping and compiler options of the tsconfig at `path`.
    pub fn with_tsconfig(self, path: &Path) -> HookResult<Self> {
        let tsconfig = TsConfigJson::load_with_extends(path)?;
        let root = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let matcher = TsconfigFileMatcher::new(root, &tsconfig)?;
        tracing::debug!(tsconfig = %path.display(), "loaded tsconfig");

        let mut context = self.with_compiler_options(Arc::new(matcher));
        if let Some(paths) = tsconfig.paths_matcher() {
            context = context.with_path_matcher(Arc::new(paths));
        }
        Ok(context)
    }

    pub fn with_path_matcher(mut self, matcher: Arc<dyn PathMatcher>) -> Self {
        self.path_matcher = Some(matcher);
        self
    }

    pub fn with_compiler_options(mut self, lookup: Arc<dyn CompilerOptionsLookup>) -> Self {
        self.compiler_options = Some(lookup);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn DependencyReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn Transform>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn config(&self) -> &HooksConfig {
        &self.config
    }

    pub fn path_matcher(&self) -> Option<&dyn PathMatcher> {
        self.path_matcher.as_deref()
    }

    /// Compiler options for `path`: the tsconfig override if one covers it,
    /// otherwise the defaults.
    pub fn compiler_options_for(&self, path: &Path) -> TypeScriptConfig {
        self.compiler_options
            .as_ref()
            .and_then(|lookup| lookup.options_for(path))
            .unwrap_or_default()
    }

    pub fn reporter(&self) -> &dyn DependencyReporter {
        self.reporter.as_ref()
    }

    pub fn transformer(&self) -> &Arc<dyn Transform> {
        &self.transformer
    }

    pub fn source_maps(&self) -> &Arc<SourceMapRegistry> {
        &self.source_maps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_initialize_requires_data() {
        let err = HookContext::initialize(None).unwrap_err();
        assert!(matches!(err, HookError::MissingInitializeData));
    }

    #[test]
    fn test_initialize_discovers_tsconfig() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("tsconfig.json"),
            r#"{
                // comments are fine
                "compilerOptions": {
                    "baseUrl": ".",
                    "paths": { "@lib/*": ["src/lib/*"] },
                    "jsxFactory": "h",
                },
            }"#,
        )
        .unwrap();

        let context =
            HookContext::initialize(Some(InitializeData::new(HooksConfig::new(dir.path())))).unwrap();

        let candidates = context.path_matcher().unwrap().candidates("@lib/util");
        assert_eq!(candidates, vec![dir.path().join("src/lib/util")]);
        assert_eq!(
            context
                .compiler_options_for(&dir.path().join("src/a.tsx"))
                .jsx_factory,
            "h"
        );
        assert_eq!(
            context
                .compiler_options_for(&dir.path().join("node_modules/x/a.ts"))
                .jsx_factory,
            "React.createElement"
        );
    }

    #[test]
    fn test_initialize_disabled_tsconfig() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("tsconfig.json"),
            r#"{ "compilerOptions": { "paths": { "a": ["b"] } } }"#,
        )
        .unwrap();

        let config = HooksConfig::new(dir.path()).tsconfig(TsconfigSource::Disabled);
        let context = HookContext::initialize(Some(InitializeData::new(config))).unwrap();
        assert!(context.path_matcher().is_none());
    }

    #[test]
    fn test_initialize_missing_explicit_tsconfig() {
        let dir = tempdir().unwrap();
        let config = HooksConfig::new(dir.path())
            .tsconfig(TsconfigSource::Path(PathBuf::from("tsconfig.build.json")));
        let err = HookContext::initialize(Some(InitializeData::new(config))).unwrap_err();
        assert!(matches!(err, HookError::Config(_)));
    }
}
