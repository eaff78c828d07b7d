//! Small helpers for building swc AST fragments from source text.

use swc_common::{DUMMY_SP, FileName, SourceMap, Span, sync::Lrc};
use swc_ecma_ast::*;
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, lexer::Lexer};
use swc_ecma_visit::{VisitMut, VisitMutWith};

/// Spans of parsed helper snippets point into a throwaway SourceMap, so they
/// must never reach codegen of the real file.
struct DropSpans;

impl VisitMut for DropSpans {
    fn visit_mut_span(&mut self, span: &mut Span) {
        *span = DUMMY_SP;
    }
}

fn parser_for(code: &str) -> (Lrc<SourceMap>, Lrc<swc_common::SourceFile>) {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(Lrc::new(FileName::Anon), code.to_string());
    (cm, fm)
}

/// Parse a single expression.
pub(crate) fn parse_expr(code: &str) -> Option<Box<Expr>> {
    let (_cm, fm) = parser_for(code);
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::Es2022,
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let mut expr = parser.parse_expr().ok()?;
    expr.visit_mut_with(&mut DropSpans);
    Some(expr)
}

/// Parse a sequence of statements.
pub(crate) fn parse_stmts(code: &str) -> Vec<Stmt> {
    let (_cm, fm) = parser_for(code);
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::Es2022,
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    match parser.parse_script() {
        Ok(mut script) => {
            script.visit_mut_with(&mut DropSpans);
            script.body
        }
        Err(_) => Vec::new(),
    }
}

/// A string literal expression for arbitrary text.
pub(crate) fn string_expr(value: &str) -> Box<Expr> {
    let quoted = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string());
    parse_expr(&quoted).unwrap_or_else(|| Box::new(Expr::Invalid(Invalid { span: DUMMY_SP })))
}

/// Whether `name` can be written as a plain identifier.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '$' || c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '$' || c == '_' || c.is_alphanumeric())
}

/// Whether `name` is usable as a binding name (identifier and not reserved).
pub(crate) fn is_binding_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "arguments", "await", "break", "case", "catch", "class", "const", "continue",
        "debugger", "default", "delete", "do", "else", "enum", "eval", "export", "extends",
        "false", "finally", "for", "function", "if", "implements", "import", "in",
        "instanceof", "interface", "let", "new", "null", "package", "private", "protected",
        "public", "return", "static", "super", "switch", "this", "throw", "true", "try",
        "typeof", "var", "void", "while", "with", "yield",
    ];
    is_identifier(name) && !RESERVED.contains(&name)
}

/// `obj[key]` written as a JS property access expression string.
pub(crate) fn member_access(object: &str, key: &str) -> String {
    if is_identifier(key) {
        format!("{}.{}", object, key)
    } else {
        format!(
            "{}[{}]",
            object,
            serde_json::to_string(key).unwrap_or_else(|_| "\"\"".to_string())
        )
    }
}
