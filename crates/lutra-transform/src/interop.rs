//! Dynamic-import interop rewriting.
//!
//! When the host loads an ES module through its CommonJS bridge, a dynamic
//! `import()` of that module resolves to `{ default: <exports> }` even though
//! the exports object already carries the `__esModule` marker. Every
//! `import(...)` call is rewritten to `import(...).then(__lutra_import_interop)`,
//! and the handler unwraps that extra layer at runtime.
//!
//! The rewrite only inserts text, so positions are moved rather than
//! reordered. [`InteropRewrite`] keeps the insertions so a source map can be
//! built for the rewritten file, or an upstream map can be shifted to match.

use std::path::Path;

use oxc_sourcemap::{SourceMap as OxcSourceMap, SourceMapBuilder};
use swc_common::{FileName, SourceMap, sync::Lrc};
use swc_ecma_ast::{CallExpr, Callee, EsVersion, Program};
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, lexer::Lexer};
use swc_ecma_visit::{Visit, VisitWith};

use crate::error::{TransformError, TransformResult};

/// Name of the runtime handler appended to rewritten files.
pub const INTEROP_HANDLER: &str = "__lutra_import_interop";

const INTEROP_CALL: &str = ".then(__lutra_import_interop)";

const HANDLER_SOURCE: &str = "function __lutra_import_interop(mod) { var keys = Object.keys(mod); if (keys.length === 1 && keys[0] === \"default\" && mod.default !== null && typeof mod.default === \"object\" && mod.default.__esModule) return mod.default; return mod; }";

/// Text inserted into the original at a (line, UTF-16 column) position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Insertion {
    line: u32,
    column: u32,
    len: u32,
}

#[derive(Debug, Clone)]
pub struct InteropRewrite {
    /// Rewritten code, handler included.
    pub code: String,
    insertions: Vec<Insertion>,
    original_lines: u32,
}

#[derive(Default)]
struct DynamicImportSites {
    ends: Vec<u32>,
}

impl Visit for DynamicImportSites {
    fn visit_call_expr(&mut self, call: &CallExpr) {
        if matches!(call.callee, Callee::Import(_)) {
            self.ends.push(call.span.hi.0);
        }
        call.visit_children_with(self);
    }
}

/// Rewrite every dynamic `import()` in `code`.
///
/// Returns `None` when there is nothing to rewrite, including when the code
/// cannot be parsed; the host will report the syntax error itself.
pub fn rewrite_dynamic_imports(path: &Path, code: &str) -> TransformResult<Option<InteropRewrite>> {
    if !code.contains("import") {
        return Ok(None);
    }

    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(Lrc::new(FileName::Real(path.to_path_buf())), code.to_string());
    let parse = |module: bool| {
        let lexer = Lexer::new(
            Syntax::Es(EsSyntax::default()),
            EsVersion::EsNext,
            StringInput::from(&*fm),
            None,
        );
        let mut parser = Parser::new_from(lexer);
        if module {
            parser.parse_module().map(Program::Module)
        } else {
            parser.parse_script().map(Program::Script)
        }
    };
    // Module goal first (top-level await), then sloppy script for CommonJS.
    let program = match parse(true).or_else(|_| parse(false)) {
        Ok(program) => program,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e.kind().msg(), "skipping interop rewrite");
            return Ok(None);
        }
    };

    let mut sites = DynamicImportSites::default();
    program.visit_with(&mut sites);
    if sites.ends.is_empty() {
        return Ok(None);
    }

    let mut offsets: Vec<usize> = sites
        .ends
        .iter()
        .map(|hi| hi.saturating_sub(fm.start_pos.0) as usize)
        .filter(|offset| *offset <= code.len())
        .collect();
    offsets.sort_unstable();
    offsets.dedup();

    let mut rewritten = String::with_capacity(code.len() + offsets.len() * INTEROP_CALL.len() + HANDLER_SOURCE.len() + 2);
    let mut last = 0;
    for offset in &offsets {
        rewritten.push_str(&code[last..*offset]);
        rewritten.push_str(INTEROP_CALL);
        last = *offset;
    }
    rewritten.push_str(&code[last..]);
    if !rewritten.ends_with('\n') {
        rewritten.push('\n');
    }
    rewritten.push_str(HANDLER_SOURCE);
    rewritten.push('\n');

    let insertions = line_columns(code, &offsets)
        .into_iter()
        .map(|(line, column)| Insertion {
            line,
            column,
            len: INTEROP_CALL.len() as u32,
        })
        .collect::<Vec<_>>();

    tracing::trace!(path = %path.display(), sites = insertions.len(), "rewrote dynamic imports");

    Ok(Some(InteropRewrite {
        code: rewritten,
        insertions,
        original_lines: code.lines().count().max(1) as u32,
    }))
}

impl InteropRewrite {
    /// Number of rewritten `import()` calls.
    pub fn sites(&self) -> usize {
        self.insertions.len()
    }

    /// Column in the rewritten code of `column` on `line` of the input.
    fn shift(&self, line: u32, column: u32) -> u32 {
        column
            + self
                .insertions
                .iter()
                .filter(|ins| ins.line == line && ins.column <= column)
                .map(|ins| ins.len)
                .sum::<u32>()
    }

    /// Map from the rewritten code back to the input, which was itself the
    /// original source. Every token start in `original` gets a segment, so
    /// positions anywhere on a line resolve to their own column.
    pub fn identity_map(&self, source: &str, original: &str) -> String {
        let mut builder = SourceMapBuilder::default();
        let source_id = builder.set_source_and_content(source, original);

        for (line, text) in original.split('\n').enumerate() {
            let line = line as u32;
            let mut columns = token_starts(text);
            columns.extend(
                self.insertions
                    .iter()
                    .filter(|ins| ins.line == line)
                    .map(|ins| ins.column),
            );
            columns.sort_unstable();
            columns.dedup();

            for column in columns {
                builder.add_token(
                    line,
                    self.shift(line, column),
                    line,
                    column,
                    Some(source_id),
                    None,
                );
            }
        }

        builder.into_sourcemap().to_json_string()
    }

    /// Shift `upstream` (a map from the input to its original source) so it
    /// describes the rewritten code instead.
    pub fn stitch(&self, upstream: &str) -> TransformResult<String> {
        let map = OxcSourceMap::from_json_string(upstream)
            .map_err(|e| TransformError::SourceMap(format!("{:?}", e)))?;

        let mut builder = SourceMapBuilder::default();
        let source_ids: Vec<u32> = map
            .get_sources()
            .enumerate()
            .map(|(id, source)| {
                let content = map.get_source_content(id as u32).map_or("", |c| &**c);
                builder.set_source_and_content(source.as_ref(), content)
            })
            .collect();
        let name_ids: Vec<u32> = map
            .get_names()
            .map(|name| builder.add_name(name.as_ref()))
            .collect();

        for token in map.get_tokens() {
            let line = token.get_dst_line();
            builder.add_token(
                line,
                self.shift(line, token.get_dst_col()),
                token.get_src_line(),
                token.get_src_col(),
                token
                    .get_source_id()
                    .and_then(|id| source_ids.get(id as usize).copied()),
                token
                    .get_name_id()
                    .and_then(|id| name_ids.get(id as usize).copied()),
            );
        }

        Ok(builder.into_sourcemap().to_json_string())
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum CharClass {
    Space,
    Word,
    Punct,
}

/// UTF-16 columns where a token starts on `line`, column 0 included.
fn token_starts(line: &str) -> Vec<u32> {
    let mut starts = vec![0];
    let mut prev = CharClass::Space;
    let mut column = 0u32;

    for ch in line.chars() {
        let class = if ch.is_whitespace() {
            CharClass::Space
        } else if ch.is_alphanumeric() || ch == '_' || ch == '$' {
            CharClass::Word
        } else {
            CharClass::Punct
        };
        // each punctuator starts its own segment
        if class == CharClass::Punct || (class == CharClass::Word && prev != CharClass::Word) {
            starts.push(column);
        }
        prev = class;
        column += ch.len_utf16() as u32;
    }
    starts
}

/// (line, UTF-16 column) of each byte offset; `offsets` must be sorted.
fn line_columns(code: &str, offsets: &[usize]) -> Vec<(u32, u32)> {
    let mut out = Vec::with_capacity(offsets.len());
    let mut targets = offsets.iter().peekable();
    let (mut line, mut column) = (0u32, 0u32);

    for (index, ch) in code.char_indices() {
        while let Some(&&target) = targets.peek() {
            if target > index {
                break;
            }
            out.push((line, column));
            targets.next();
        }
        if ch == '\n' {
            line += 1;
            column = 0;
        } else {
            column += ch.len_utf16() as u32;
        }
    }
    out.extend(targets.map(|_| (line, column)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(code: &str) -> Option<InteropRewrite> {
        rewrite_dynamic_imports(Path::new("/app/main.js"), code).unwrap()
    }

    #[test]
    fn test_no_import_token() {
        assert!(rewrite("const a = require('./a');").is_none());
    }

    #[test]
    fn test_static_imports_untouched() {
        assert!(rewrite("import a from './a.js';\nexport { a };").is_none());
    }

    #[test]
    fn test_unparsable_is_skipped() {
        assert!(rewrite("import(").is_none());
    }

    #[test]
    fn test_rewrites_each_site() {
        let out = rewrite("const a = await import('./a.js');\nconst b = import(`./${name}.js`);\n").unwrap();

        assert_eq!(out.sites(), 2);
        assert!(out.code.contains("import('./a.js').then(__lutra_import_interop)"));
        assert!(out.code.contains("import(`./${name}.js`).then(__lutra_import_interop)"));
        assert_eq!(out.code.matches("function __lutra_import_interop").count(), 1);
    }

    #[test]
    fn test_nested_import() {
        let out = rewrite("import(await import('./name.js'));").unwrap();
        assert_eq!(
            out.code.lines().next().unwrap(),
            "import(await import('./name.js').then(__lutra_import_interop)).then(__lutra_import_interop);"
        );
    }

    /// Evaluates `HANDLER_SOURCE` and then `expr` in a fresh context.
    fn run_handler(expr: &str) -> bool {
        let runtime = rquickjs::Runtime::new().unwrap();
        let context = rquickjs::Context::full(&runtime).unwrap();
        context.with(|ctx| {
            ctx.eval::<bool, _>(format!("{}\n{}", HANDLER_SOURCE, expr))
                .unwrap()
        })
    }

    #[test]
    fn test_handler_unwraps_marked_default() {
        assert!(HANDLER_SOURCE.starts_with(&format!("function {}(", INTEROP_HANDLER)));

        assert!(run_handler(
            "var inner = { __esModule: true, x: 1 }; __lutra_import_interop({ default: inner }) === inner"
        ));
        // a module namespace object also qualifies
        assert!(run_handler(
            "var ns = Object.create(null); ns.default = { __esModule: true }; __lutra_import_interop(ns) === ns.default"
        ));
    }

    #[test]
    fn test_handler_leaves_other_shapes() {
        for shape in [
            "{ default: { __esModule: true }, other: 1 }",
            "{ default: { x: 1 } }",
            "{ default: 1 }",
            "{ default: null }",
            "{ named: { __esModule: true } }",
            "{}",
        ] {
            assert!(
                run_handler(&format!(
                    "var mod = {}; __lutra_import_interop(mod) === mod",
                    shape
                )),
                "{}",
                shape
            );
        }
    }

    #[test]
    fn test_line_columns_utf16() {
        let code = "a\n\u{1F600}b";
        assert_eq!(line_columns(code, &[0, 2, 6, 7]), vec![(0, 0), (1, 0), (1, 2), (1, 3)]);
    }

    #[test]
    fn test_shift() {
        let out = rewrite("x; import('a'); import('b');").unwrap();
        let len = INTEROP_CALL.len() as u32;
        assert_eq!(out.shift(0, 0), 0);
        // right after the first call's closing paren
        assert_eq!(out.shift(0, 14), 14 + len);
        assert_eq!(out.shift(0, 27), 27 + 2 * len);
        assert_eq!(out.shift(1, 5), 5);
    }

    #[test]
    fn test_identity_map() {
        let code = "x; import('a'); y;\nz;";
        let out = rewrite(code).unwrap();
        let map = OxcSourceMap::from_json_string(&out.identity_map("/app/main.js", code)).unwrap();
        let table = map.generate_lookup_table();

        let after = map
            .lookup_token(&table, 0, 14 + INTEROP_CALL.len() as u32)
            .unwrap();
        assert_eq!((after.get_src_line(), after.get_src_col()), (0, 14));
        let next_line = map.lookup_token(&table, 1, 1).unwrap();
        assert_eq!((next_line.get_src_line(), next_line.get_src_col()), (1, 0));
    }

    #[test]
    fn test_token_starts() {
        assert_eq!(token_starts(""), vec![0]);
        assert_eq!(token_starts("  a.b = 1;"), vec![0, 2, 3, 4, 6, 8, 9]);
        assert_eq!(token_starts("\u{1F600}x"), vec![0, 0, 2]);
    }

    #[test]
    fn test_identity_map_resolves_mid_line_columns() {
        let code = "const b = import('./b.mjs');\nconst x = 1; throw new Error('M');\n";
        let out = rewrite(code).unwrap();
        let json = out.identity_map("/app/main.mjs", code);

        let registry = crate::SourceMapRegistry::new();
        registry.install("file:///app/main.mjs", &json).unwrap();

        // `throw` on the second line: 1-based line 2, column 14
        assert_eq!(
            registry.remap_position("file:///app/main.mjs", 2, 14),
            Some(crate::OriginalPosition {
                source: Some("/app/main.mjs".to_string()),
                line: 2,
                column: 14,
            })
        );

        // `;` after the rewritten call maps back before the insertion
        let map = OxcSourceMap::from_json_string(&json).unwrap();
        let table = map.generate_lookup_table();
        let semi = map
            .lookup_token(&table, 0, 27 + INTEROP_CALL.len() as u32)
            .unwrap();
        assert_eq!((semi.get_src_line(), semi.get_src_col()), (0, 27));
    }

    #[test]
    fn test_stitch_shifts_columns() {
        let code = "x; import('a'); y;";
        let out = rewrite(code).unwrap();

        let mut builder = SourceMapBuilder::default();
        let id = builder.set_source_and_content("/app/main.ts", code);
        builder.add_token(0, 16, 3, 4, Some(id), None);
        let upstream = builder.into_sourcemap().to_json_string();

        let stitched = OxcSourceMap::from_json_string(&out.stitch(&upstream).unwrap()).unwrap();
        let token = stitched.get_tokens().next().unwrap();
        assert_eq!(token.get_dst_line(), 0);
        assert_eq!(token.get_dst_col(), 16 + INTEROP_CALL.len() as u32);
        assert_eq!(token.get_src_line(), 3);
        assert_eq!(token.get_src_col(), 4);
    }
}
