//! JSX lowering.
//!
//! Rewrites JSX elements and fragments into calls of the configured factory:
//!
//! ```text
//! <Button kind="primary" {...rest}>Hi {name}</Button>
//! // becomes
//! React.createElement(Button, { kind: "primary", ...rest }, "Hi ", name)
//! ```
//!
//! Runs before the TypeScript strip pass so that imports referenced only
//! from JSX (`import React from "react"`) are seen as used.

use swc_common::{
    DUMMY_SP, SourceMap, SourceMapper, Span, Spanned, SyntaxContext, sync::Lrc, util::take::Take,
};
use swc_ecma_ast::*;
use swc_ecma_visit::{VisitMut, VisitMutWith};

use crate::ast::{is_identifier, parse_expr, string_expr};
use crate::config::TypeScriptConfig;

pub(crate) struct JsxLowering {
    cm: Lrc<SourceMap>,
    factory: Box<Expr>,
    fragment: Box<Expr>,
}

impl JsxLowering {
    pub(crate) fn new(cm: Lrc<SourceMap>, config: &TypeScriptConfig) -> Self {
        let fallback = |name: &str| {
            Box::new(Expr::Ident(Ident::new(
                name.into(),
                DUMMY_SP,
                SyntaxContext::empty(),
            )))
        };
        Self {
            factory: parse_expr(&config.jsx_factory).unwrap_or_else(|| fallback("h")),
            fragment: parse_expr(&config.jsx_fragment_factory)
                .unwrap_or_else(|| fallback("Fragment")),
            cm,
        }
    }

    fn call(&self, span: Span, tag: Box<Expr>, props: Box<Expr>, children: Vec<ExprOrSpread>) -> Expr {
        let mut args = vec![
            ExprOrSpread {
                spread: None,
                expr: tag,
            },
            ExprOrSpread {
                spread: None,
                expr: props,
            },
        ];
        args.extend(children);

        Expr::Call(CallExpr {
            span,
            ctxt: SyntaxContext::empty(),
            callee: Callee::Expr(self.factory.clone()),
            args,
            type_args: None,
        })
    }

    fn lower_element(&self, element: JSXElement) -> Expr {
        let tag = self.tag(&element.opening.name);
        let props = self.props(element.opening.attrs);
        let children = self.children(element.children);
        self.call(element.span, tag, props, children)
    }

    fn lower_fragment(&self, fragment: JSXFragment) -> Expr {
        let children = self.children(fragment.children);
        self.call(fragment.span, self.fragment.clone(), null(), children)
    }

    fn tag(&self, name: &JSXElementName) -> Box<Expr> {
        match name {
            JSXElementName::Ident(ident) => {
                let sym = ident.sym.to_string();
                let intrinsic = sym
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_lowercase())
                    || sym.contains('-');
                if intrinsic {
                    string_expr(&sym)
                } else {
                    Box::new(Expr::Ident(ident.clone()))
                }
            }
            JSXElementName::JSXMemberExpr(member) => {
                let path = member_path(member);
                parse_expr(&path).unwrap_or_else(|| string_expr(&path))
            }
            JSXElementName::JSXNamespacedName(ns) => {
                string_expr(&format!("{}:{}", ns.ns.sym, ns.name.sym))
            }
        }
    }

    fn props(&self, attrs: Vec<JSXAttrOrSpread>) -> Box<Expr> {
        if attrs.is_empty() {
            return null();
        }

        let props = attrs
            .into_iter()
            .map(|attr| match attr {
                JSXAttrOrSpread::SpreadElement(spread) => PropOrSpread::Spread(spread),
                JSXAttrOrSpread::JSXAttr(attr) => {
                    let name = match &attr.name {
                        JSXAttrName::Ident(ident) => ident.sym.to_string(),
                        JSXAttrName::JSXNamespacedName(ns) => {
                            format!("{}:{}", ns.ns.sym, ns.name.sym)
                        }
                    };
                    let value = match attr.value {
                        Some(value) => self.attr_value(value),
                        None => Box::new(Expr::Lit(Lit::Bool(Bool {
                            span: attr.span,
                            value: true,
                        }))),
                    };
                    PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
                        key: prop_name(&name),
                        value,
                    })))
                }
            })
            .collect();

        Box::new(Expr::Object(ObjectLit {
            span: DUMMY_SP,
            props,
        }))
    }

    fn attr_value(&self, value: JSXAttrValue) -> Box<Expr> {
        match value {
            JSXAttrValue::JSXExprContainer(container) => match container.expr {
                JSXExpr::Expr(expr) => expr,
                JSXExpr::JSXEmptyExpr(_) => Box::new(Expr::Ident(Ident::new(
                    "undefined".into(),
                    DUMMY_SP,
                    SyntaxContext::empty(),
                ))),
            },
            JSXAttrValue::JSXElement(element) => Box::new(self.lower_element(*element)),
            JSXAttrValue::JSXFragment(fragment) => Box::new(self.lower_fragment(fragment)),
            // Quoted attribute text. JSX strings are not escape-processed, so
            // the raw text between the quotes is the value.
            other => {
                let snippet = self.cm.span_to_snippet(other.span()).unwrap_or_default();
                let inner = snippet
                    .get(1..snippet.len().saturating_sub(1))
                    .unwrap_or_default();
                string_expr(inner)
            }
        }
    }

    fn children(&self, children: Vec<JSXElementChild>) -> Vec<ExprOrSpread> {
        let plain = |expr: Box<Expr>| ExprOrSpread { spread: None, expr };

        children
            .into_iter()
            .filter_map(|child| match child {
                JSXElementChild::JSXText(text) => {
                    let cleaned = clean_jsx_text(&text.value);
                    (!cleaned.is_empty()).then(|| plain(string_expr(&cleaned)))
                }
                JSXElementChild::JSXExprContainer(container) => match container.expr {
                    JSXExpr::Expr(expr) => Some(plain(expr)),
                    JSXExpr::JSXEmptyExpr(_) => None,
                },
                JSXElementChild::JSXSpreadChild(spread) => Some(ExprOrSpread {
                    spread: Some(spread.span),
                    expr: spread.expr,
                }),
                JSXElementChild::JSXElement(element) => {
                    Some(plain(Box::new(self.lower_element(*element))))
                }
                JSXElementChild::JSXFragment(fragment) => {
                    Some(plain(Box::new(self.lower_fragment(fragment))))
                }
            })
            .collect()
    }
}

impl VisitMut for JsxLowering {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);

        if matches!(expr, Expr::JSXElement(_) | Expr::JSXFragment(_)) {
            *expr = match expr.take() {
                Expr::JSXElement(element) => self.lower_element(*element),
                Expr::JSXFragment(fragment) => self.lower_fragment(fragment),
                other => other,
            };
        }
    }
}

fn null() -> Box<Expr> {
    Box::new(Expr::Lit(Lit::Null(Null { span: DUMMY_SP })))
}

fn prop_name(name: &str) -> PropName {
    if is_identifier(name) {
        PropName::Ident(IdentName::new(name.into(), DUMMY_SP))
    } else {
        PropName::Computed(ComputedPropName {
            span: DUMMY_SP,
            expr: string_expr(name),
        })
    }
}

fn member_path(member: &JSXMemberExpr) -> String {
    let object = match &member.obj {
        JSXObject::Ident(ident) => ident.sym.to_string(),
        JSXObject::JSXMemberExpr(inner) => member_path(inner),
    };
    format!("{}.{}", object, member.prop.sym)
}

/// Whitespace rules for JSX text: lines are trimmed, blank lines dropped,
/// and the remaining lines joined with a single space.
pub(crate) fn clean_jsx_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.split(['\n', '\r']).collect();
    if lines.len() == 1 {
        return raw.to_string();
    }

    let last = lines.len() - 1;
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let line = if i == 0 { line.trim_end() } else { line.trim_start() };
            if i == last { line } else { line.trim_end() }
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_jsx_text_single_line_kept() {
        assert_eq!(clean_jsx_text("Hi "), "Hi ");
    }

    #[test]
    fn test_clean_jsx_text_multiline() {
        assert_eq!(clean_jsx_text("\n    Hello\n    world\n  "), "Hello world");
        assert_eq!(clean_jsx_text("\n   \n  "), "");
    }

    #[test]
    fn test_prop_names() {
        assert_eq!(prop_name_kind("data-id"), "computed");
        assert_eq!(prop_name_kind("className"), "ident");
    }

    fn prop_name_kind(name: &str) -> &'static str {
        match prop_name(name) {
            PropName::Ident(_) => "ident",
            PropName::Computed(_) => "computed",
            _ => "other",
        }
    }
}
