//! Process-scoped hook configuration.

use std::path::PathBuf;

/// Environment variable naming the tsconfig.json to use.
pub const ENV_TSCONFIG_PATH: &str = "LUTRA_TSCONFIG_PATH";
/// Environment variable that disables tsconfig.json handling.
pub const ENV_DISABLE_TSCONFIG: &str = "LUTRA_DISABLE_TSCONFIG";
/// Environment variable that appends inline source maps to transformed code.
pub const ENV_INLINE_SOURCE_MAPS: &str = "LUTRA_INLINE_SOURCE_MAPS";

/// Where tsconfig.json comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TsconfigSource {
    /// Search upward from `cwd`.
    #[default]
    Discover,
    /// Use this file (relative paths are relative to `cwd`).
    Path(PathBuf),
    /// No path mapping, no per-file compiler options.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HooksConfig {
    /// Working directory. Base for tsconfig discovery and for resolving
    /// specifiers that have no parent.
    pub cwd: PathBuf,
    pub tsconfig: TsconfigSource,
    /// Append `//# sourceMappingURL=data:...` to transformed sources.
    /// Default: false
    pub inline_source_maps: bool,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_default(),
            tsconfig: TsconfigSource::Discover,
            inline_source_maps: false,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl HooksConfig {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by the `LUTRA_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an environment lookup.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(ENV_TSCONFIG_PATH).filter(|p| !p.is_empty()) {
            self.tsconfig = TsconfigSource::Path(PathBuf::from(path));
        }
        if lookup(ENV_DISABLE_TSCONFIG).is_some_and(|v| is_truthy(&v)) {
            self.tsconfig = TsconfigSource::Disabled;
        }
        if let Some(value) = lookup(ENV_INLINE_SOURCE_MAPS) {
            self.inline_source_maps = is_truthy(&value);
        }
        self
    }

    pub fn tsconfig(mut self, source: TsconfigSource) -> Self {
        self.tsconfig = source;
        self
    }

    pub fn inline_source_maps(mut self, enabled: bool) -> Self {
        self.inline_source_maps = enabled;
        self
    }
}
