//! ESM to CommonJS lowering.
//!
//! Used when a module containing `import`/`export` declarations has to run
//! inside the host's synchronous `require()` path. Static imports become
//! `require` bindings and exports become properties of `exports`, with the
//! `__esModule` marker set so default imports and dynamic imports of the
//! result can be unwrapped.
//!
//! Exported bindings other than function declarations are defined as getters
//! in the prologue, so they stay live and are visible to cyclic `require`s
//! made while the body runs.

use swc_common::{DUMMY_SP, FileName, SourceMap, sync::Lrc};
use swc_ecma_ast::*;
use swc_ecma_parser::{Parser, StringInput, Syntax, TsSyntax, lexer::Lexer};
use swc_ecma_visit::VisitMut;

use crate::ast::{member_access, parse_stmts};

/// Prefix of the bindings that hold `require()` results.
const IMPORT_BINDING: &str = "__lutra_import_";
/// Local name for anonymous default function/class exports.
const DEFAULT_BINDING: &str = "__lutra_default";

fn str_value(value: &Str) -> String {
    value.value.as_str().unwrap_or_default().to_string()
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(id) => id.sym.as_str().to_string(),
        ModuleExportName::Str(s) => str_value(s),
    }
}

/// Whether `code` contains static `import`/`export` declarations.
///
/// Dynamic `import()` alone does not count; it is valid in CommonJS.
pub fn has_module_syntax(code: &str) -> bool {
    if !code.contains("import") && !code.contains("export") {
        return false;
    }

    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(Lrc::new(FileName::Anon), code.to_string());
    let lexer = Lexer::new(
        Syntax::Typescript(TsSyntax {
            decorators: true,
            ..Default::default()
        }),
        EsVersion::Es2022,
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    match parser.parse_module() {
        Ok(module) => module.body.iter().any(|item| {
            matches!(
                item,
                ModuleItem::ModuleDecl(
                    ModuleDecl::Import(_)
                        | ModuleDecl::ExportDecl(_)
                        | ModuleDecl::ExportNamed(_)
                        | ModuleDecl::ExportDefaultDecl(_)
                        | ModuleDecl::ExportDefaultExpr(_)
                        | ModuleDecl::ExportAll(_)
                )
            )
        }),
        Err(_) => false,
    }
}

/// Rewrites module declarations into CommonJS statements.
#[derive(Default)]
pub(crate) struct CommonJsLowering {
    next_import: usize,
    saw_module_decl: bool,
    /// Exports assigned before the body (hoisted function declarations).
    hoisted: Vec<(String, String)>,
    /// Exports read through a getter: (exported name, local name).
    live: Vec<(String, String)>,
}

impl CommonJsLowering {
    fn require(&mut self, src: &Str, out: &mut Vec<ModuleItem>) -> String {
        let binding = format!("{}{}", IMPORT_BINDING, self.next_import);
        self.next_import += 1;
        let specifier = serde_json::to_string(&str_value(src)).unwrap_or_default();
        push_code(out, &format!("const {} = require({});", binding, specifier));
        binding
    }

    fn lower_import(&mut self, import: ImportDecl, out: &mut Vec<ModuleItem>) {
        if import.type_only {
            return;
        }
        if import.specifiers.is_empty() {
            let specifier = serde_json::to_string(&str_value(&import.src)).unwrap_or_default();
            push_code(out, &format!("require({});", specifier));
            return;
        }

        let module = self.require(&import.src, out);
        for specifier in &import.specifiers {
            let code = match specifier {
                ImportSpecifier::Default(default) => format!(
                    "const {} = {m} && {m}.__esModule ? {m}.default : {m};",
                    default.local.sym,
                    m = module
                ),
                ImportSpecifier::Named(named) => {
                    if named.is_type_only {
                        continue;
                    }
                    let imported = named
                        .imported
                        .as_ref()
                        .map(export_name)
                        .unwrap_or_else(|| named.local.sym.as_str().to_string());
                    format!(
                        "const {} = {};",
                        named.local.sym,
                        member_access(&module, &imported)
                    )
                }
                ImportSpecifier::Namespace(ns) => format!("const {} = {};", ns.local.sym, module),
            };
            push_code(out, &code);
        }
    }

    fn lower_export_decl(&mut self, export: ExportDecl, out: &mut Vec<ModuleItem>) {
        match &export.decl {
            Decl::Var(var) => {
                for decl in &var.decls {
                    collect_pattern_names(&decl.name, &mut self.live);
                }
            }
            Decl::Fn(f) => {
                let name = f.ident.sym.as_str().to_string();
                self.hoisted.push((name.clone(), name));
            }
            Decl::Class(c) => {
                let name = c.ident.sym.as_str().to_string();
                self.live.push((name.clone(), name));
            }
            _ => {}
        }
        out.push(ModuleItem::Stmt(Stmt::Decl(export.decl)));
    }

    fn lower_default_decl(&mut self, export: ExportDefaultDecl, out: &mut Vec<ModuleItem>) {
        match export.decl {
            DefaultDecl::Fn(f) => {
                let ident = f
                    .ident
                    .unwrap_or_else(|| Ident::new(DEFAULT_BINDING.into(), DUMMY_SP, Default::default()));
                self.hoisted
                    .push(("default".to_string(), ident.sym.as_str().to_string()));
                out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Fn(FnDecl {
                    ident,
                    declare: false,
                    function: f.function,
                }))));
            }
            DefaultDecl::Class(c) => {
                let ident = c
                    .ident
                    .unwrap_or_else(|| Ident::new(DEFAULT_BINDING.into(), DUMMY_SP, Default::default()));
                self.live
                    .push(("default".to_string(), ident.sym.as_str().to_string()));
                out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Class(ClassDecl {
                    ident,
                    declare: false,
                    class: c.class,
                }))));
            }
            DefaultDecl::TsInterfaceDecl(_) => {}
        }
    }

    fn lower_named_export(&mut self, export: NamedExport, out: &mut Vec<ModuleItem>) {
        if export.type_only {
            return;
        }

        let Some(src) = &export.src else {
            for specifier in &export.specifiers {
                if let ExportSpecifier::Named(named) = specifier {
                    if named.is_type_only {
                        continue;
                    }
                    let orig = export_name(&named.orig);
                    let exported = named.exported.as_ref().map(export_name).unwrap_or_else(|| orig.clone());
                    self.live.push((exported, orig));
                }
            }
            return;
        };

        let module = self.require(src, out);
        for specifier in &export.specifiers {
            let code = match specifier {
                ExportSpecifier::Named(named) => {
                    let orig = export_name(&named.orig);
                    let exported = named.exported.as_ref().map(export_name).unwrap_or_else(|| orig.clone());
                    format!(
                        "{} = {};",
                        member_access("exports", &exported),
                        member_access(&module, &orig)
                    )
                }
                ExportSpecifier::Namespace(ns) => format!(
                    "{} = {};",
                    member_access("exports", &export_name(&ns.name)),
                    module
                ),
                ExportSpecifier::Default(default) => format!(
                    "{} = {}.default;",
                    member_access("exports", default.exported.sym.as_str()),
                    module
                ),
            };
            push_code(out, &code);
        }
    }

    fn lower_export_all(&mut self, export: ExportAll, out: &mut Vec<ModuleItem>) {
        if export.type_only {
            return;
        }
        let module = self.require(&export.src, out);
        push_code(
            out,
            &format!(
                "for (const __key in {m}) {{ if (__key !== \"default\" && !Object.prototype.hasOwnProperty.call(exports, __key)) exports[__key] = {m}[__key]; }}",
                m = module
            ),
        );
    }
}

impl VisitMut for CommonJsLowering {
    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        let mut body = Vec::with_capacity(items.len());

        for item in items.drain(..) {
            if matches!(item, ModuleItem::ModuleDecl(_)) {
                self.saw_module_decl = true;
            }
            match item {
                ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => self.lower_import(import, &mut body),
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                    self.lower_export_decl(export, &mut body)
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => {
                    self.lower_default_decl(export, &mut body)
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(export)) => {
                    body.push(assign_stmt("exports.default", export.expr));
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(export)) => {
                    self.lower_named_export(export, &mut body)
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportAll(export)) => {
                    self.lower_export_all(export, &mut body)
                }
                ModuleItem::ModuleDecl(ModuleDecl::TsExportAssignment(export)) => {
                    body.push(assign_stmt("module.exports", export.expr));
                }
                other => body.push(other),
            }
        }

        if !self.saw_module_decl {
            *items = body;
            return;
        }

        let mut prologue = Vec::new();
        push_code(
            &mut prologue,
            "Object.defineProperty(exports, \"__esModule\", { value: true });",
        );
        for (exported, local) in self.hoisted.drain(..) {
            push_code(
                &mut prologue,
                &format!("{} = {};", member_access("exports", &exported), local),
            );
        }
        for (exported, local) in self.live.drain(..) {
            push_code(&mut prologue, &live_export(&exported, &local));
        }

        prologue.append(&mut body);
        *items = prologue;
    }
}

/// `exports[exported]` as an enumerable getter reading `local`.
fn live_export(exported: &str, local: &str) -> String {
    format!(
        "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {}; }} }});",
        serde_json::to_string(exported).unwrap_or_default(),
        local
    )
}

fn push_code(out: &mut Vec<ModuleItem>, code: &str) {
    out.extend(parse_stmts(code).into_iter().map(ModuleItem::Stmt));
}

/// `target = value;` keeping the spans of `value`.
fn assign_stmt(target: &str, value: Box<Expr>) -> ModuleItem {
    let mut stmts = parse_stmts(&format!("{} = 0;", target));
    if let Some(Stmt::Expr(mut stmt)) = stmts.pop()
        && let Expr::Assign(assign) = &mut *stmt.expr
    {
        assign.right = value;
        return ModuleItem::Stmt(Stmt::Expr(stmt));
    }
    ModuleItem::Stmt(Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr: value,
    }))
}

/// Every name bound by a declaration pattern, including destructuring.
fn collect_pattern_names(pat: &Pat, exports: &mut Vec<(String, String)>) {
    match pat {
        Pat::Ident(ident) => {
            let name = ident.sym.as_str().to_string();
            exports.push((name.clone(), name));
        }
        Pat::Object(obj) => {
            for prop in &obj.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => collect_pattern_names(&kv.value, exports),
                    ObjectPatProp::Assign(assign) => {
                        let name = assign.key.sym.as_str().to_string();
                        exports.push((name.clone(), name));
                    }
                    ObjectPatProp::Rest(rest) => collect_pattern_names(&rest.arg, exports),
                }
            }
        }
        Pat::Array(arr) => {
            for elem in arr.elems.iter().flatten() {
                collect_pattern_names(elem, exports);
            }
        }
        Pat::Rest(rest) => collect_pattern_names(&rest.arg, exports),
        Pat::Assign(assign) => collect_pattern_names(&assign.left, exports),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_module_syntax() {
        assert!(has_module_syntax("import fs from 'fs';"));
        assert!(has_module_syntax("const a = 1;\nexport { a };"));
        assert!(has_module_syntax("export default 1;"));
        assert!(!has_module_syntax("module.exports = 1;"));
        assert!(!has_module_syntax("const m = import('./m.js');"));
        assert!(!has_module_syntax("const important = 'export';"));
    }

    #[test]
    fn test_has_module_syntax_parse_failure() {
        assert!(!has_module_syntax("import {"));
    }

    #[test]
    fn test_live_export_shape() {
        let stmts = parse_stmts(&live_export("count", "count"));
        assert_eq!(stmts.len(), 1);
        assert_eq!(
            live_export("not-ident", "local"),
            "Object.defineProperty(exports, \"not-ident\", { enumerable: true, get: function () { return local; } });"
        );
    }

    #[test]
    fn test_collect_pattern_names() {
        let stmts = parse_stmts("const { a, b: [c, ...d], ...e } = x;");
        let Some(Stmt::Decl(Decl::Var(var))) = stmts.first() else {
            panic!("expected var decl");
        };
        let mut names = Vec::new();
        collect_pattern_names(&var.decls[0].name, &mut names);
        let locals: Vec<_> = names.into_iter().map(|(_, local)| local).collect();
        assert_eq!(locals, ["a", "c", "d", "e"]);
    }
}
