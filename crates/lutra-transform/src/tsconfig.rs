//! tsconfig.json parsing, path mapping and per-file compiler options.
//!
//! The hooks never read tsconfig.json themselves. They consume two prebuilt
//! collaborators created here once at startup:
//!
//! - [`PathMatcher`]: maps a bare specifier to candidate absolute paths
//!   (`compilerOptions.baseUrl` + `compilerOptions.paths`).
//! - [`CompilerOptionsLookup`]: returns the transform options that apply to a
//!   given source file, or `None` when the file is not covered.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use swc_ecma_ast::EsVersion;

use crate::config::TypeScriptConfig;
use crate::error::{TransformError, TransformResult};
use crate::media::is_dependency_path;

/// Parsed tsconfig.json file structure (the subset lutra reads).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsConfigJson {
    #[serde(default)]
    pub compiler_options: CompilerOptions,

    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Path to base tsconfig to extend from
    #[serde(default)]
    pub extends: Option<String>,

    /// Directory `paths` substitutions are relative to. Computed while loading.
    #[serde(skip)]
    pub paths_base: Option<PathBuf>,
}

/// TypeScript compiler options from tsconfig.json.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    /// ECMAScript target version (e.g., "ES2020", "ES2022", "ESNext")
    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub module: Option<String>,

    /// JSX emit mode (e.g., "react", "react-jsx", "preserve")
    #[serde(default)]
    pub jsx: Option<String>,

    #[serde(default)]
    pub jsx_factory: Option<String>,

    #[serde(default)]
    pub jsx_fragment_factory: Option<String>,

    #[serde(default)]
    pub experimental_decorators: Option<bool>,

    #[serde(default)]
    pub source_map: Option<bool>,

    #[serde(default)]
    pub inline_source_map: Option<bool>,

    #[serde(default)]
    pub out_dir: Option<String>,

    /// Base URL for module resolution
    #[serde(default)]
    pub base_url: Option<String>,

    /// Path mapping for module resolution
    #[serde(default)]
    pub paths: Option<HashMap<String, Vec<String>>>,

    #[serde(default)]
    pub allow_js: Option<bool>,
}

impl TsConfigJson {
    /// Load tsconfig.json from a file path.
    pub fn load(path: impl AsRef<Path>) -> TransformResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TransformError::tsconfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::parse(&content)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        config.paths_base = match &config.compiler_options.base_url {
            Some(base_url) => Some(normalize_path(&dir.join(base_url))),
            None if config.compiler_options.paths.is_some() => Some(dir.to_path_buf()),
            None => None,
        };
        Ok(config)
    }

    /// Parse tsconfig.json from a string.
    ///
    /// Comments and trailing commas are accepted.
    pub fn parse(content: &str) -> TransformResult<Self> {
        let cleaned = strip_json_comments(content);

        serde_json::from_str(&cleaned)
            .map_err(|e| TransformError::tsconfig(format!("Failed to parse tsconfig.json: {}", e)))
    }

    /// Load tsconfig.json with extends resolution.
    pub fn load_with_extends(path: impl AsRef<Path>) -> TransformResult<Self> {
        let path = path.as_ref();
        let mut config = Self::load(path)?;

        if let Some(extends) = config.extends.take() {
            let base_dir = path.parent().unwrap_or(Path::new("."));
            let extends_path = resolve_extends_path(base_dir, &extends)?;
            let base_config = Self::load_with_extends(&extends_path)?;
            config = merge_configs(base_config, config);
        }

        Ok(config)
    }

    /// Convert to the transform configuration.
    pub fn to_typescript_config(&self) -> TypeScriptConfig {
        let options = &self.compiler_options;
        let mut config = TypeScriptConfig::default();

        if let Some(target) = &options.target {
            config.target = parse_es_target(target);
        }
        if let Some(decorators) = options.experimental_decorators {
            config.decorators = decorators;
        }
        if options.source_map == Some(false) && options.inline_source_map != Some(true) {
            config.source_maps = false;
        }
        if let Some(factory) = &options.jsx_factory {
            config.jsx_factory = factory.clone();
        }
        if let Some(fragment) = &options.jsx_fragment_factory {
            config.jsx_fragment_factory = fragment.clone();
        }

        config
    }

    /// Build the path-mapping matcher, if this config maps anything.
    pub fn paths_matcher(&self) -> Option<TsconfigPaths> {
        let base = self.paths_base.clone()?;
        let paths = self.compiler_options.paths.clone().unwrap_or_default();
        Some(TsconfigPaths::new(
            base,
            paths,
            self.compiler_options.base_url.is_some(),
        ))
    }
}

/// Maps a bare specifier to an ordered list of candidate absolute paths.
pub trait PathMatcher: Send + Sync {
    fn candidates(&self, specifier: &str) -> Vec<PathBuf>;
}

impl<F> PathMatcher for F
where
    F: Fn(&str) -> Vec<PathBuf> + Send + Sync,
{
    fn candidates(&self, specifier: &str) -> Vec<PathBuf> {
        self(specifier)
    }
}

/// One `paths` entry: a pattern with at most one `*`, and its substitutions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMappingRule {
    pub pattern: String,
    pub substitutions: Vec<String>,
}

impl PathMappingRule {
    /// Returns the text captured by `*`, or "" for an exact match.
    fn capture<'s>(&self, specifier: &'s str) -> Option<&'s str> {
        match self.pattern.split_once('*') {
            None => (self.pattern == specifier).then_some(""),
            Some((prefix, suffix)) => {
                if specifier.len() >= prefix.len() + suffix.len()
                    && specifier.starts_with(prefix)
                    && specifier.ends_with(suffix)
                {
                    Some(&specifier[prefix.len()..specifier.len() - suffix.len()])
                } else {
                    None
                }
            }
        }
    }

    fn prefix_len(&self) -> usize {
        self.pattern.find('*').unwrap_or(self.pattern.len())
    }
}

/// `compilerOptions.paths` matcher.
#[derive(Debug, Clone)]
pub struct TsconfigPaths {
    base: PathBuf,
    rules: Vec<PathMappingRule>,
    has_base_url: bool,
}

impl TsconfigPaths {
    pub fn new(base: PathBuf, paths: HashMap<String, Vec<String>>, has_base_url: bool) -> Self {
        let mut rules: Vec<PathMappingRule> = paths
            .into_iter()
            .map(|(pattern, substitutions)| PathMappingRule {
                pattern,
                substitutions,
            })
            .collect();
        // Exact patterns first, then wildcards by longest prefix. Ties keep a
        // stable order so lookups are deterministic.
        rules.sort_by(|a, b| {
            let a_wild = a.pattern.contains('*');
            let b_wild = b.pattern.contains('*');
            a_wild
                .cmp(&b_wild)
                .then(b.prefix_len().cmp(&a.prefix_len()))
                .then(a.pattern.cmp(&b.pattern))
        });
        Self {
            base,
            rules,
            has_base_url,
        }
    }

    pub fn rules(&self) -> &[PathMappingRule] {
        &self.rules
    }
}

impl PathMatcher for TsconfigPaths {
    fn candidates(&self, specifier: &str) -> Vec<PathBuf> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            return Vec::new();
        }

        for rule in &self.rules {
            if let Some(captured) = rule.capture(specifier) {
                return rule
                    .substitutions
                    .iter()
                    .map(|sub| normalize_path(&self.base.join(sub.replacen('*', captured, 1))))
                    .collect();
            }
        }

        if self.has_base_url {
            vec![normalize_path(&self.base.join(specifier))]
        } else {
            Vec::new()
        }
    }
}

/// Per-file compiler options lookup.
pub trait CompilerOptionsLookup: Send + Sync {
    fn options_for(&self, path: &Path) -> Option<TypeScriptConfig>;
}

/// Applies one tsconfig's options to the files it covers (`files`, `include`, `exclude`).
#[derive(Debug, Clone)]
pub struct TsconfigFileMatcher {
    root: PathBuf,
    files: Vec<PathBuf>,
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
    config: TypeScriptConfig,
}

impl TsconfigFileMatcher {
    pub fn new(root: impl Into<PathBuf>, tsconfig: &TsConfigJson) -> TransformResult<Self> {
        let root = root.into();
        let include = if tsconfig.include.is_empty() && tsconfig.files.is_empty() {
            vec!["**/*".to_string()]
        } else {
            tsconfig.include.clone()
        };
        let mut exclude = if tsconfig.exclude.is_empty() {
            vec!["node_modules".to_string()]
        } else {
            tsconfig.exclude.clone()
        };
        if let Some(out_dir) = &tsconfig.compiler_options.out_dir {
            exclude.push(out_dir.trim_start_matches("./").to_string());
        }

        Ok(Self {
            files: tsconfig
                .files
                .iter()
                .map(|f| normalize_path(&root.join(f)))
                .collect(),
            include: compile_patterns(&include)?,
            exclude: compile_patterns(&exclude)?,
            config: tsconfig.to_typescript_config(),
            root,
        })
    }
}

impl CompilerOptionsLookup for TsconfigFileMatcher {
    fn options_for(&self, path: &Path) -> Option<TypeScriptConfig> {
        if is_dependency_path(&path.to_string_lossy()) {
            return None;
        }
        if self.files.iter().any(|f| f == path) {
            return Some(self.config.clone());
        }

        let relative = path.strip_prefix(&self.root).ok()?;
        let options = glob::MatchOptions {
            require_literal_separator: true,
            ..Default::default()
        };
        let included = self
            .include
            .iter()
            .any(|p| p.matches_path_with(relative, options));
        let excluded = self
            .exclude
            .iter()
            .any(|p| p.matches_path_with(relative, options));

        (included && !excluded).then(|| self.config.clone())
    }
}

/// Compile tsconfig include/exclude entries. A plain directory name covers
/// everything below it.
fn compile_patterns(entries: &[String]) -> TransformResult<Vec<glob::Pattern>> {
    entries
        .iter()
        .map(|entry| {
            let entry = entry.trim_start_matches("./").trim_end_matches('/');
            let last = entry.rsplit('/').next().unwrap_or(entry);
            let pattern = if entry.contains('*') || last.contains('.') {
                entry.to_string()
            } else {
                format!("{}/**/*", entry)
            };
            glob::Pattern::new(&pattern).map_err(|e| {
                TransformError::tsconfig(format!("Invalid pattern '{}': {}", entry, e))
            })
        })
        .collect()
}

/// Find tsconfig.json by walking up from a starting directory.
pub fn find_tsconfig(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        let tsconfig_path = current.join("tsconfig.json");
        if tsconfig_path.exists() {
            return Some(tsconfig_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Parse an ECMAScript target string to EsVersion.
fn parse_es_target(target: &str) -> EsVersion {
    match target.to_uppercase().as_str() {
        "ES3" => EsVersion::Es3,
        "ES5" => EsVersion::Es5,
        "ES2015" | "ES6" => EsVersion::Es2015,
        "ES2016" => EsVersion::Es2016,
        "ES2017" => EsVersion::Es2017,
        "ES2018" => EsVersion::Es2018,
        "ES2019" => EsVersion::Es2019,
        "ES2020" => EsVersion::Es2020,
        "ES2021" => EsVersion::Es2021,
        "ES2022" => EsVersion::Es2022,
        "ESNEXT" | "ES2023" | "ES2024" => EsVersion::EsNext,
        _ => EsVersion::Es2022,
    }
}

/// Resolve the path from an "extends" field.
fn resolve_extends_path(base_dir: &Path, extends: &str) -> TransformResult<PathBuf> {
    if extends.starts_with('.') || Path::new(extends).is_absolute() {
        let mut path = base_dir.join(extends);
        if !path.exists() && !extends.ends_with(".json") {
            path = base_dir.join(format!("{}.json", extends));
        }
        return Ok(path);
    }

    // Package reference, e.g. "@tsconfig/node20/tsconfig.json"
    let mut dir = Some(base_dir);
    while let Some(current) = dir {
        let candidate = current.join("node_modules").join(extends);
        if candidate.is_file() {
            return Ok(candidate);
        }
        let with_tsconfig = candidate.join("tsconfig.json");
        if with_tsconfig.is_file() {
            return Ok(with_tsconfig);
        }
        dir = current.parent();
    }

    Err(TransformError::tsconfig(format!(
        "Could not resolve extends: {}",
        extends
    )))
}

/// Merge two configs (base is overridden by overlay).
fn merge_configs(base: TsConfigJson, overlay: TsConfigJson) -> TsConfigJson {
    let paths_base = if overlay.compiler_options.base_url.is_some()
        || overlay.compiler_options.paths.is_some()
    {
        overlay.paths_base
    } else {
        base.paths_base
    };

    TsConfigJson {
        compiler_options: merge_compiler_options(base.compiler_options, overlay.compiler_options),
        files: if overlay.files.is_empty() {
            base.files
        } else {
            overlay.files
        },
        include: if overlay.include.is_empty() {
            base.include
        } else {
            overlay.include
        },
        exclude: if overlay.exclude.is_empty() {
            base.exclude
        } else {
            overlay.exclude
        },
        extends: None,
        paths_base,
    }
}

fn merge_compiler_options(base: CompilerOptions, overlay: CompilerOptions) -> CompilerOptions {
    CompilerOptions {
        target: overlay.target.or(base.target),
        module: overlay.module.or(base.module),
        jsx: overlay.jsx.or(base.jsx),
        jsx_factory: overlay.jsx_factory.or(base.jsx_factory),
        jsx_fragment_factory: overlay.jsx_fragment_factory.or(base.jsx_fragment_factory),
        experimental_decorators: overlay
            .experimental_decorators
            .or(base.experimental_decorators),
        source_map: overlay.source_map.or(base.source_map),
        inline_source_map: overlay.inline_source_map.or(base.inline_source_map),
        out_dir: overlay.out_dir.or(base.out_dir),
        base_url: overlay.base_url.or(base.base_url),
        paths: overlay.paths.or(base.paths),
        allow_js: overlay.allow_js.or(base.allow_js),
    }
}

/// Lexically normalize `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Strip single-line and multi-line comments, then trailing commas.
fn strip_json_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            result.push(c);
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                result.push(c);
            }
            ('/', Some('/')) => {
                for nc in chars.by_ref() {
                    if nc == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                while let Some(nc) = chars.next() {
                    if nc == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => result.push(c),
        }
    }

    strip_trailing_commas(&result)
}

fn strip_trailing_commas(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            result.push(c);
            continue;
        }
        if c == '"' {
            in_string = true;
            result.push(c);
            continue;
        }

        if c == ',' {
            let next = chars.clone().find(|nc| !nc.is_whitespace());
            if !matches!(next, Some(']') | Some('}')) {
                result.push(c);
            }
        } else {
            result.push(c);
        }
    }

    result
}
