//! TypeScript/JSX to JavaScript transform.
//!
//! This module provides the syntax transform using SWC (Speedy Web Compiler).
//! It strips type annotations, lowers JSX to factory calls and, for modules
//! that must run in the host's synchronous `require()` path, lowers ES module
//! syntax to CommonJS. Type checking is never performed.

use std::path::Path;

use swc_common::{FileName, GLOBALS, Globals, Mark, SourceMap, Spanned, sync::Lrc};
use swc_ecma_ast::Program;
use swc_ecma_codegen::{Config as CodegenConfig, Emitter, text_writer::JsWriter};
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, TsSyntax, lexer::Lexer};
use swc_ecma_transforms_base::{fixer::fixer, resolver};
use swc_ecma_transforms_typescript::strip;
use swc_ecma_visit::VisitMutWith;

use crate::commonjs::CommonJsLowering;
use crate::config::TypeScriptConfig;
use crate::error::{TransformError, TransformResult};
use crate::json::json_to_module;
use crate::jsx::JsxLowering;
use crate::media::MediaType;

/// Module system the transformed code has to run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleKind {
    /// Keep `import`/`export` as written.
    #[default]
    Esm,
    /// Lower `import`/`export` to `require`/`exports`.
    CommonJs,
}

#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Syntax of the input. Default: taken from the file extension.
    pub media_type: MediaType,
    pub module: ModuleKind,
    /// Compiler options, usually from the file's tsconfig.json.
    pub config: TypeScriptConfig,
    /// Generate a source map. Both this and `config.source_maps` must be set.
    pub source_map: bool,
}

impl TransformOptions {
    pub fn new(media_type: MediaType, module: ModuleKind) -> Self {
        Self {
            media_type,
            module,
            config: TypeScriptConfig::default(),
            source_map: true,
        }
    }

    /// Options for a file, with the media type taken from its extension.
    pub fn for_path(path: &Path, module: ModuleKind) -> Self {
        Self::new(MediaType::from_path(path), module)
    }

    pub fn config(mut self, config: TypeScriptConfig) -> Self {
        self.config = config;
        self
    }

    pub fn source_map(mut self, enabled: bool) -> Self {
        self.source_map = enabled;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// The transformed JavaScript code.
    pub code: String,
    /// Source map JSON (if generated).
    pub map: Option<String>,
}

/// The syntax-lowering engine used by the load hooks.
///
/// Implementations must be synchronous: the CommonJS load path calls this
/// from inside the host's synchronous `require()`.
pub trait Transform: Send + Sync {
    fn transform_sync(
        &self,
        code: &str,
        path: &Path,
        options: &TransformOptions,
    ) -> TransformResult<TransformOutput>;
}

/// SWC-backed [`Transform`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SwcTransformer;

impl SwcTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl Transform for SwcTransformer {
    fn transform_sync(
        &self,
        code: &str,
        path: &Path,
        options: &TransformOptions,
    ) -> TransformResult<TransformOutput> {
        if options.media_type == MediaType::Json {
            return Ok(TransformOutput {
                code: json_to_module(path, code, options.module)?,
                map: None,
            });
        }
        transform_swc(code, path, options)
    }
}

fn syntax_for(media_type: MediaType, config: &TypeScriptConfig) -> Syntax {
    if media_type.is_typescript() {
        Syntax::Typescript(TsSyntax {
            tsx: media_type == MediaType::Tsx,
            decorators: config.decorators,
            dts: false,
            no_early_errors: false,
            disallow_ambiguous_jsx_like: matches!(media_type, MediaType::Mts | MediaType::Cts),
        })
    } else {
        Syntax::Es(EsSyntax {
            jsx: media_type != MediaType::Mjs && media_type != MediaType::Cjs,
            decorators: config.decorators,
            ..Default::default()
        })
    }
}

fn transform_swc(
    code: &str,
    path: &Path,
    options: &TransformOptions,
) -> TransformResult<TransformOutput> {
    let config = &options.config;
    let source_map = options.source_map && config.source_maps;
    let cm: Lrc<SourceMap> = Default::default();

    let fm = cm.new_source_file(Lrc::new(FileName::Real(path.to_path_buf())), code.to_string());

    let lexer = Lexer::new(
        syntax_for(options.media_type, config),
        config.target,
        StringInput::from(&*fm),
        None,
    );

    let mut parser = Parser::new_from(lexer);

    let module = parser.parse_module().map_err(|e| {
        let loc = cm.lookup_char_pos(e.span().lo);
        TransformError::parse(
            path,
            format!("{} ({}:{})", e.kind().msg(), loc.line, loc.col_display + 1),
        )
    })?;

    for e in parser.take_errors() {
        tracing::trace!(path = %path.display(), error = %e.kind().msg(), "recoverable parse error");
    }

    let mut program = Program::Module(module);

    GLOBALS.set(&Globals::default(), || {
        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();

        // JSX first, so the strip pass sees imports used only as factories.
        program.visit_mut_with(&mut JsxLowering::new(cm.clone(), config));

        program.visit_mut_with(&mut resolver(
            unresolved_mark,
            top_level_mark,
            options.media_type.is_typescript(),
        ));
        if options.media_type.is_typescript() {
            program.mutate(&mut strip(unresolved_mark, top_level_mark));
        }
        if options.module == ModuleKind::CommonJs {
            program.visit_mut_with(&mut CommonJsLowering::default());
        }
        program.visit_mut_with(&mut fixer(None));
    });

    let module = match program {
        Program::Module(m) => m,
        Program::Script(_) => {
            return Err(TransformError::Transform {
                path: path.to_path_buf(),
                message: "Expected module, got script".to_string(),
            });
        }
    };

    let mut buf = vec![];
    let mut src_map_buf = vec![];

    {
        let writer = JsWriter::new(
            cm.clone(),
            "\n",
            &mut buf,
            if source_map {
                Some(&mut src_map_buf)
            } else {
                None
            },
        );

        let codegen_config = CodegenConfig::default()
            .with_target(config.target)
            .with_ascii_only(false)
            .with_minify(false)
            .with_omit_last_semi(false);

        let mut emitter = Emitter {
            cfg: codegen_config,
            cm: cm.clone(),
            comments: None,
            wr: writer,
        };

        emitter
            .emit_module(&module)
            .map_err(|e| TransformError::Codegen(format!("Failed to emit code: {}", e)))?;
    }

    let code = String::from_utf8(buf)
        .map_err(|e| TransformError::Codegen(format!("Invalid UTF-8 output: {}", e)))?;

    let map = if source_map && !src_map_buf.is_empty() {
        let mut map_buf = vec![];
        cm.build_source_map(
            &src_map_buf,
            None,
            swc_common::source_map::DefaultSourceMapGenConfig,
        )
        .to_writer(&mut map_buf)
        .map_err(|e| TransformError::SourceMap(e.to_string()))?;
        Some(
            String::from_utf8(map_buf).map_err(|e| TransformError::SourceMap(e.to_string()))?,
        )
    } else {
        None
    };

    tracing::debug!(
        path = %path.display(),
        module = ?options.module,
        media_type = ?options.media_type,
        "transformed"
    );

    Ok(TransformOutput { code, map })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(code: &str, file: &str, module: ModuleKind) -> TransformOutput {
        let path = Path::new(file);
        SwcTransformer
            .transform_sync(code, path, &TransformOptions::for_path(path, module))
            .expect("transform failed")
    }

    #[test]
    fn test_strips_types() {
        let out = transform(
            r#"
            interface Patient { id: string }
            type Status = "active" | "inactive";
            const patient: Patient = { id: "123" };
            function identity<T>(value: T): T { return value; }
            "#,
            "a.ts",
            ModuleKind::Esm,
        );

        assert!(!out.code.contains("interface Patient"));
        assert!(!out.code.contains("type Status"));
        assert!(!out.code.contains("<T>"));
        assert!(out.code.contains("const patient"));
        assert!(out.code.contains("function identity"));
        assert!(out.map.is_some());
    }

    #[test]
    fn test_type_only_imports_are_elided() {
        let out = transform(
            "import { Foo } from './foo';\nimport { bar } from './bar';\nconst x: Foo = bar();",
            "a.ts",
            ModuleKind::Esm,
        );

        assert!(!out.code.contains("./foo"));
        assert!(out.code.contains("./bar"));
    }

    #[test]
    fn test_tsx_keeps_factory_import() {
        let out = transform(
            "import React from 'react';\nexport const App = () => <div className=\"x\">Hi</div>;",
            "app.tsx",
            ModuleKind::Esm,
        );

        assert!(out.code.contains("import React from"));
        assert!(out.code.contains("React.createElement(\"div\""));
        assert!(out.code.contains("className: \"x\""));
        assert!(out.code.contains("\"Hi\""));
    }

    #[test]
    fn test_jsx_components_and_fragments() {
        let out = transform(
            "const el = <><Button data-id=\"1\" disabled {...rest}>{label}</Button></>;",
            "view.jsx",
            ModuleKind::Esm,
        );

        assert!(out.code.contains("React.createElement(React.Fragment, null"));
        assert!(out.code.contains("React.createElement(Button"));
        assert!(out.code.contains("[\"data-id\"]: \"1\""));
        assert!(out.code.contains("disabled: true"));
        assert!(out.code.contains("...rest"));
        assert!(out.code.contains("label"));
    }

    #[test]
    fn test_custom_jsx_factory() {
        let path = Path::new("view.tsx");
        let options = TransformOptions::for_path(path, ModuleKind::Esm)
            .config(TypeScriptConfig::default().jsx_factories("h", "Fragment"));
        let out = SwcTransformer
            .transform_sync("export default <p />;", path, &options)
            .unwrap();

        assert!(out.code.contains("h(\"p\", null)"));
    }

    #[test]
    fn test_commonjs_lowering() {
        let out = transform(
            r#"
            import fs, { readFileSync as read } from "fs";
            import * as path from "path";
            export const answer: number = 42;
            export function hello() { return read; }
            export default class Widget {}
            export { join } from "path";
            export * from "./other";
            console.log(fs, path);
            "#,
            "mod.cts",
            ModuleKind::CommonJs,
        );
        let code = &out.code;

        assert!(code.contains("Object.defineProperty(exports, \"__esModule\""));
        assert!(code.contains("require(\"fs\")"));
        assert!(code.contains(".__esModule ? __lutra_import_0.default : __lutra_import_0"));
        assert!(code.contains("const read = __lutra_import_0.readFileSync"));
        assert!(code.contains("const path = __lutra_import_1"));
        assert!(code.contains("Object.defineProperty(exports, \"answer\""));
        assert!(code.contains("return answer;"));
        assert!(code.contains("exports.hello = hello"));
        assert!(code.contains("Object.defineProperty(exports, \"default\""));
        assert!(code.contains("return Widget;"));
        assert!(code.contains("exports.join = __lutra_import_2.join"));
        assert!(code.contains("require(\"./other\")"));
        assert!(!code.contains("import "));
        assert!(!code.contains("export "));

        // hoisted function exports come before the body
        let marker = code.find("exports.hello").unwrap();
        let decl = code.find("function hello").unwrap();
        assert!(marker < decl);
        let getter = code.find("Object.defineProperty(exports, \"answer\"").unwrap();
        let init = code.find("const answer").unwrap();
        assert!(getter < init);
    }

    #[test]
    fn test_commonjs_exports_are_live() {
        let out = transform(
            "export let count: number = 0;\nexport function inc() { count++; }\n",
            "counter.cts",
            ModuleKind::CommonJs,
        );
        let code = &out.code;

        assert!(!code.contains("exports.count ="), "{}", code);
        assert!(code.contains("return count;"), "{}", code);
        assert!(code.contains("enumerable: true"), "{}", code);
    }

    #[test]
    fn test_commonjs_without_module_syntax_has_no_marker() {
        let out = transform(
            "const x: number = require('./x');\nmodule.exports = x;",
            "plain.cts",
            ModuleKind::CommonJs,
        );

        assert!(!out.code.contains("__esModule"));
        assert!(out.code.contains("module.exports = x"));
    }

    #[test]
    fn test_json_module() {
        let out = transform("{\"a\": 1}", "data.json", ModuleKind::Esm);
        assert!(out.code.contains("export default"));
        assert!(out.code.contains("export const a"));
        assert!(out.map.is_none());
    }

    #[test]
    fn test_source_map_disabled() {
        let path = Path::new("a.ts");
        let options = TransformOptions::for_path(path, ModuleKind::Esm).source_map(false);
        let out = SwcTransformer
            .transform_sync("const a: number = 1;", path, &options)
            .unwrap();
        assert!(out.map.is_none());
    }

    #[test]
    fn test_parse_error() {
        let result = SwcTransformer.transform_sync(
            "const x: = \"invalid syntax\";",
            Path::new("broken.ts"),
            &TransformOptions::new(MediaType::TypeScript, ModuleKind::Esm),
        );

        let err = result.unwrap_err();
        assert!(matches!(err, TransformError::Parse { .. }));
        assert!(err.to_string().contains("broken.ts"));
    }
}
