//! Typed-source sibling candidates.
//!
//! TypeScript sources import siblings by their compiled name
//! (`import "./util.js"` while `util.ts` is on disk). These candidates are
//! tried before the literal specifier.

/// Candidate extensions for a classic extension, in priority order.
fn sibling_extensions(extension: &str) -> Option<&'static [&'static str]> {
    match extension {
        ".js" => Some(&[".ts", ".tsx", ".js", ".jsx"]),
        ".jsx" => Some(&[".tsx", ".ts", ".jsx", ".js"]),
        ".cjs" => Some(&[".cts"]),
        ".mjs" => Some(&[".mts"]),
        _ => None,
    }
}

/// Ranked typed-source candidates for `specifier`, or an empty list when it
/// does not end in `.js`, `.jsx`, `.mjs` or `.cjs`. A `?query` is kept on
/// every candidate.
pub fn ts_candidates(specifier: &str) -> Vec<String> {
    let (path, query) = match specifier.find('?') {
        Some(index) => specifier.split_at(index),
        None => (specifier, ""),
    };

    let file = path.rsplit('/').next().unwrap_or(path);
    let Some(dot) = file.rfind('.') else {
        return Vec::new();
    };
    let extension = &file[dot..];
    let Some(extensions) = sibling_extensions(extension) else {
        return Vec::new();
    };

    let stem = &path[..path.len() - extension.len()];
    extensions
        .iter()
        .map(|ext| format!("{}{}{}", stem, ext, query))
        .collect()
}
