//! Transform configuration.
//!
//! `TypeScriptConfig` carries the compiler options that influence code
//! generation. A process-wide default is combined with per-file overrides
//! coming from the nearest matching tsconfig.json.

use std::path::{Path, PathBuf};
use swc_ecma_ast::EsVersion;

use crate::error::TransformResult;
use crate::tsconfig::TsConfigJson;

/// TypeScript/JSX transform configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeScriptConfig {
    /// tsconfig.json these options were read from, if any.
    pub tsconfig: Option<PathBuf>,

    /// Target ECMAScript version for output.
    /// Default: ES2022
    pub target: EsVersion,

    /// Accept decorator syntax when parsing.
    /// Default: true
    pub decorators: bool,

    /// Generate source maps.
    /// Default: true
    pub source_maps: bool,

    /// Function called for JSX elements.
    /// Default: `React.createElement`
    pub jsx_factory: String,

    /// Expression used as the tag of JSX fragments.
    /// Default: `React.Fragment`
    pub jsx_fragment_factory: String,
}

impl Default for TypeScriptConfig {
    fn default() -> Self {
        Self {
            tsconfig: None,
            target: EsVersion::Es2022,
            decorators: true,
            source_maps: true,
            jsx_factory: "React.createElement".to_string(),
            jsx_fragment_factory: "React.Fragment".to_string(),
        }
    }
}

impl TypeScriptConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target ECMAScript version.
    pub fn target(mut self, target: EsVersion) -> Self {
        self.target = target;
        self
    }

    /// Enable or disable decorator parsing.
    pub fn decorators(mut self, enabled: bool) -> Self {
        self.decorators = enabled;
        self
    }

    /// Enable or disable source map generation.
    pub fn source_maps(mut self, enabled: bool) -> Self {
        self.source_maps = enabled;
        self
    }

    /// Set the JSX element and fragment factories.
    pub fn jsx_factories(mut self, factory: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.jsx_factory = factory.into();
        self.jsx_fragment_factory = fragment.into();
        self
    }

    /// Load configuration from a tsconfig.json file, following `extends`.
    ///
    /// ```no_run
    /// use lutra_transform::TypeScriptConfig;
    ///
    /// let config = TypeScriptConfig::from_tsconfig("./tsconfig.json").unwrap();
    /// ```
    pub fn from_tsconfig(path: impl AsRef<Path>) -> TransformResult<Self> {
        let tsconfig = TsConfigJson::load_with_extends(path.as_ref())?;
        let mut config = tsconfig.to_typescript_config();
        config.tsconfig = Some(path.as_ref().to_path_buf());
        Ok(config)
    }
}
