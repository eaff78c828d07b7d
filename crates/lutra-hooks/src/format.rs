//! Module formats and format inference.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

/// Module format as declared to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// Synchronous `require()` modules.
    CommonJs,
    /// ECMAScript modules.
    Module,
    Json,
    /// Host built-ins (`node:fs`). Never file-backed.
    Builtin,
}

impl ModuleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommonJs => "commonjs",
            Self::Module => "module",
            Self::Json => "json",
            Self::Builtin => "builtin",
        }
    }
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension of a URL's path, without the dot.
pub(crate) fn url_extension(url: &Url) -> Option<&str> {
    let file = url.path().rsplit('/').next()?;
    file.rsplit_once('.').map(|(_, ext)| ext)
}

/// Infer the format of a file URL from its extension and the nearest
/// `package.json`. Non-`file:` URLs are never inferred.
pub fn infer_format(url: &Url) -> Option<ModuleFormat> {
    if url.scheme() != "file" {
        return None;
    }

    match url_extension(url)? {
        "mjs" | "mts" => Some(ModuleFormat::Module),
        "cjs" | "cts" => Some(ModuleFormat::CommonJs),
        "json" => Some(ModuleFormat::Json),
        "js" | "ts" | "tsx" | "jsx" => {
            let path = url.to_file_path().ok()?;
            Some(package_format(&path))
        }
        _ => None,
    }
}

/// Format implied by the nearest package.json `type` field. No manifest or
/// no `type` means CommonJS.
pub(crate) fn package_format(path: &Path) -> ModuleFormat {
    match find_package_type(path).as_deref() {
        Some("module") => ModuleFormat::Module,
        _ => ModuleFormat::CommonJs,
    }
}

/// Find the nearest package.json and return its "type" field value.
/// Returns "commonjs" if package.json exists but has no "type" field.
pub fn find_package_type(path: &Path) -> Option<String> {
    let mut current = path.parent()?;

    loop {
        let pkg_path = current.join("package.json");
        if pkg_path.is_file() {
            if let Ok(content) = std::fs::read_to_string(&pkg_path)
                && let Ok(json) = serde_json::from_str::<serde_json::Value>(&content)
                && let Some(type_field) = json.get("type").and_then(|v| v.as_str())
            {
                return Some(type_field.to_string());
            }
            return Some("commonjs".to_string());
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => break,
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file_url(path: &Path) -> Url {
        Url::from_file_path(path).unwrap()
    }

    #[test]
    fn test_infer_by_extension() {
        let dir = tempdir().unwrap();
        assert_eq!(
            infer_format(&file_url(&dir.path().join("a.mts"))),
            Some(ModuleFormat::Module)
        );
        assert_eq!(
            infer_format(&file_url(&dir.path().join("a.cts"))),
            Some(ModuleFormat::CommonJs)
        );
        assert_eq!(
            infer_format(&file_url(&dir.path().join("a.json"))),
            Some(ModuleFormat::Json)
        );
        assert_eq!(infer_format(&file_url(&dir.path().join("a.wasm"))), None);
    }

    #[test]
    fn test_infer_by_package_type() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("esm/src")).unwrap();
        std::fs::write(dir.path().join("esm/package.json"), r#"{"type":"module"}"#).unwrap();
        std::fs::create_dir_all(dir.path().join("cjs")).unwrap();
        std::fs::write(dir.path().join("cjs/package.json"), r#"{"name":"x"}"#).unwrap();

        assert_eq!(
            infer_format(&file_url(&dir.path().join("esm/src/a.ts"))),
            Some(ModuleFormat::Module)
        );
        assert_eq!(
            infer_format(&file_url(&dir.path().join("cjs/a.tsx"))),
            Some(ModuleFormat::CommonJs)
        );
    }

    #[test]
    fn test_non_file_urls_not_inferred() {
        let url = Url::parse("node:fs").unwrap();
        assert_eq!(infer_format(&url), None);
        let url = Url::parse("https://example.com/a.mjs").unwrap();
        assert_eq!(infer_format(&url), None);
    }

    #[test]
    fn test_format_serde() {
        assert_eq!(
            serde_json::to_string(&ModuleFormat::CommonJs).unwrap(),
            "\"commonjs\""
        );
        assert_eq!(ModuleFormat::Module.to_string(), "module");
    }
}
