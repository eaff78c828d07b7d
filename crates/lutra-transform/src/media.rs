//! Media type detection from file extensions.

use std::path::Path;

/// Directory segment that marks third-party dependency code.
pub const DEPENDENCY_DIR: &str = "node_modules";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    JavaScript,
    Mjs,
    Cjs,
    Jsx,
    TypeScript,
    Mts,
    Cts,
    Tsx,
    Json,
    Unknown,
}

impl MediaType {
    pub fn from_path(path: &Path) -> Self {
        Self::from_extension(path.extension().and_then(|e| e.to_str()))
    }

    /// Detect from a specifier or URL string, ignoring any `?query` or `#hash`.
    pub fn from_specifier(specifier: &str) -> Self {
        let end = specifier.find(['?', '#']).unwrap_or(specifier.len());
        let path = &specifier[..end];
        let file = path.rsplit('/').next().unwrap_or(path);
        Self::from_extension(file.rsplit_once('.').map(|(_, ext)| ext))
    }

    pub fn from_extension(ext: Option<&str>) -> Self {
        match ext {
            Some("js") => MediaType::JavaScript,
            Some("mjs") => MediaType::Mjs,
            Some("cjs") => MediaType::Cjs,
            Some("jsx") => MediaType::Jsx,
            Some("ts") => MediaType::TypeScript,
            Some("mts") => MediaType::Mts,
            Some("cts") => MediaType::Cts,
            Some("tsx") => MediaType::Tsx,
            Some("json") => MediaType::Json,
            _ => MediaType::Unknown,
        }
    }

    /// `.ts`, `.tsx`, `.mts`, `.cts`
    pub fn is_typescript(self) -> bool {
        matches!(
            self,
            MediaType::TypeScript | MediaType::Mts | MediaType::Cts | MediaType::Tsx
        )
    }

    /// Whether the file can contain JSX syntax.
    pub fn is_jsx(self) -> bool {
        matches!(self, MediaType::Jsx | MediaType::Tsx)
    }

    /// Whether the file always needs the full syntax transform before the host can run it.
    pub fn needs_transform(self) -> bool {
        self.is_typescript() || self == MediaType::Jsx
    }
}

/// Check whether a path or URL points inside a dependency directory.
pub fn is_dependency_path(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == DEPENDENCY_DIR)
}
