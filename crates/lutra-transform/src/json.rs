//! JSON modules.

use std::path::Path;

use crate::ast::is_binding_name;
use crate::error::{TransformError, TransformResult};
use crate::transpiler::ModuleKind;

const JSON_BINDING: &str = "__lutra_json";

/// Wrap a JSON document as a module.
///
/// As an ES module the parsed value is the `default` export, and every
/// top-level key that is a usable binding name is also a named export. As
/// CommonJS the value is assigned to `module.exports`.
///
/// The document text is embedded as written, so key order is kept.
pub fn json_to_module(path: &Path, code: &str, module: ModuleKind) -> TransformResult<String> {
    let text = code.strip_prefix('\u{feff}').unwrap_or(code).trim();
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|source| TransformError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    if module == ModuleKind::CommonJs {
        return Ok(format!("module.exports = {};\n", text));
    }

    let mut out = format!("const {} = {};\nexport default {};\n", JSON_BINDING, text, JSON_BINDING);
    if let serde_json::Value::Object(map) = &value {
        for key in map.keys().filter(|key| is_binding_name(key)) {
            out.push_str(&format!(
                "export const {key} = {binding}.{key};\n",
                binding = JSON_BINDING
            ));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_esm_exports() {
        let out = json_to_module(
            Path::new("data.json"),
            r#"{ "name": "lutra", "version": 1, "not-valid": true, "default": 2 }"#,
            ModuleKind::Esm,
        )
        .unwrap();

        assert!(out.contains("export default __lutra_json;"));
        assert!(out.contains("export const name = __lutra_json.name;"));
        assert!(out.contains("export const version = __lutra_json.version;"));
        assert!(!out.contains("export const not-valid"));
        assert!(!out.contains("export const default"));
    }

    #[test]
    fn test_json_array_has_only_default() {
        let out = json_to_module(Path::new("list.json"), "[1, 2]", ModuleKind::Esm).unwrap();
        assert!(out.contains("export default"));
        assert!(!out.contains("export const"));
    }

    #[test]
    fn test_json_commonjs() {
        let out = json_to_module(Path::new("a.json"), "\u{feff}{\"a\": 1}", ModuleKind::CommonJs).unwrap();
        assert_eq!(out, "module.exports = {\"a\": 1};\n");
    }

    #[test]
    fn test_json_invalid() {
        let err = json_to_module(Path::new("bad.json"), "{ a: 1 }", ModuleKind::Esm).unwrap_err();
        assert!(matches!(err, TransformError::Json { .. }));
        assert!(err.to_string().contains("bad.json"));
    }
}
