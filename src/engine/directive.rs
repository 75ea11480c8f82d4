//! Instruction dispatcher: turns scanned tokens into a content tree.
//!
//! Scoped directives (`if`, `for`, `component`, `slot`) collect the nodes up
//! to their matching `end`. Anything malformed is reproduced as literal text
//! with a warning; scanning of the file always continues.

use super::{
    content::{Content, Origin, Target},
    expr::{Expr, parse},
    iter::{Iterable, is_identifier, parse_for, strip_keyword},
    scanner::{RawDirective, Token},
};
use crate::log;
use compact_str::CompactString;
use std::sync::Arc;

enum Head {
    If(Expr),
    For(CompactString, Iterable),
    Component { target: Target, html: bool },
    Slot(CompactString),
    /// Rejected scoped directive: reproduced literally, body included.
    Passthrough,
}

struct OpenScope {
    head: Head,
    body: Vec<Content>,
    origin: Origin,
}

#[derive(Default)]
struct Builder {
    root: Vec<Content>,
    open: Vec<OpenScope>,
}

/// Build the node sequence of one file from its tokens.
pub fn assemble(tokens: Vec<Token>) -> Vec<Content> {
    let mut builder = Builder::default();
    for token in tokens {
        match token {
            Token::Text(text) => builder.push_text(&text),
            Token::Directive(raw) => builder.dispatch(&raw),
        }
    }
    builder.finish()
}

impl Builder {
    fn current(&mut self) -> &mut Vec<Content> {
        match self.open.last_mut() {
            Some(scope) => &mut scope.body,
            None => &mut self.root,
        }
    }

    fn push(&mut self, node: Content) {
        match node {
            Content::Text(text) => self.push_text(&text),
            node => self.current().push(node),
        }
    }

    /// Append literal text, merging with a preceding text node.
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let nodes = self.current();
        if let Some(Content::Text(last)) = nodes.last_mut() {
            last.push_str(text);
        } else {
            nodes.push(Content::Text(text.to_owned()));
        }
    }

    /// Reproduce a directive as text and warn.
    fn reject(&mut self, origin: &Origin, reason: &str) {
        log!("warn"; "{}: {reason}, kept as text", origin.location);
        self.push_text(&origin.text);
    }

    fn open(&mut self, head: Head, origin: Origin) {
        self.open.push(OpenScope {
            head,
            body: Vec::new(),
            origin,
        });
    }

    fn dispatch(&mut self, raw: &RawDirective) {
        let origin = Origin {
            text: raw.source.clone(),
            location: raw.location.clone(),
        };
        let (name, arg) = raw.split();

        match name {
            "doc" => {}
            "end" => self.close(&origin),
            "define" => match parse_define(arg) {
                Ok((name, expr)) => self.push(Content::Define { name, expr, origin }),
                Err(reason) => self.reject(&origin, &reason),
            },
            "eval" => match parse_expr(arg) {
                Ok(expr) => self.push(Content::Eval { expr, origin }),
                Err(reason) => self.reject(&origin, &reason),
            },
            "include" => match parse_target(arg, &["html"]) {
                Ok((options, target)) => self.push(Content::Include {
                    target,
                    html: options.contains(&"html"),
                    origin,
                }),
                Err(reason) => self.reject(&origin, &reason),
            },
            "includeRaw" => match parse_target(arg, &[]) {
                Ok((_, target)) => self.push(Content::IncludeRaw { target, origin }),
                Err(reason) => self.reject(&origin, &reason),
            },
            "includeB64" => match parse_target(arg, &["plain"]) {
                Ok((options, target)) => self.push(Content::IncludeB64 {
                    target,
                    plain: options.contains(&"plain"),
                    origin,
                }),
                Err(reason) => self.reject(&origin, &reason),
            },
            "if" => {
                let head = parse_expr(arg).map(Head::If);
                self.open_checked(head, origin);
            }
            "for" => {
                let head = parse_for(arg).map(|(var, iterable)| Head::For(var, iterable));
                self.open_checked(head, origin);
            }
            "component" => {
                let head = parse_target(arg, &["html"]).map(|(options, target)| Head::Component {
                    target,
                    html: options.contains(&"html"),
                });
                self.open_checked(head, origin);
            }
            "slot" => {
                let head = if is_identifier(arg) {
                    Ok(Head::Slot(arg.into()))
                } else {
                    Err(format!("`slot` expects a name, got `{arg}`"))
                };
                self.open_checked(head, origin);
            }
            other => self.reject(&origin, &format!("unknown directive `{other}`")),
        }
    }

    /// Open a scope, or a passthrough scope when the head is malformed.
    fn open_checked(&mut self, head: Result<Head, String>, origin: Origin) {
        match head {
            Ok(head) => self.open(head, origin),
            Err(reason) => {
                log!("warn"; "{}: {reason}, kept as text", origin.location);
                self.open(Head::Passthrough, origin);
            }
        }
    }

    fn close(&mut self, end: &Origin) {
        match self.open.pop() {
            Some(scope) => self.finish_scope(scope, &end.text),
            None => self.reject(end, "`end` without an open scope"),
        }
    }

    fn finish_scope(&mut self, scope: OpenScope, end_text: &str) {
        let OpenScope { head, body, origin } = scope;
        let node = match head {
            Head::If(cond) => Content::If {
                cond,
                body: Arc::from(body),
                origin,
            },
            Head::For(var, iterable) => Content::For {
                var,
                iterable,
                body: Arc::from(body),
                origin,
            },
            Head::Component { target, html } => Content::Component {
                target,
                html,
                body: Arc::from(body),
                origin,
            },
            Head::Slot(name) => Content::Slot {
                name,
                body: Arc::from(body),
                origin,
            },
            Head::Passthrough => {
                self.push_text(&origin.text);
                for node in body {
                    self.push(node);
                }
                self.push_text(end_text);
                return;
            }
        };
        self.push(node);
    }

    fn finish(mut self) -> Vec<Content> {
        while let Some(scope) = self.open.pop() {
            log!("warn"; "{}: scope never closed, closed at end of file", scope.origin.location);
            self.finish_scope(scope, "");
        }
        self.root
    }
}

fn parse_expr(arg: &str) -> Result<Expr, String> {
    parse(arg).map_err(|e| e.to_string())
}

fn parse_define(arg: &str) -> Result<(CompactString, Expr), String> {
    let (name, expr) = arg
        .split_once(char::is_whitespace)
        .ok_or_else(|| "expected `define <name> <expression>`".to_owned())?;
    if !is_identifier(name) {
        return Err(format!("`{name}` is not a valid name"));
    }
    Ok((name.into(), parse_expr(expr)?))
}

/// Leading `(opt ...)` group followed by a path or `eval <expr>`.
fn parse_target<'a>(arg: &'a str, allowed: &[&str]) -> Result<(Vec<&'a str>, Target), String> {
    let mut options = Vec::new();
    let mut rest = arg.trim();
    if let Some(group) = rest.strip_prefix('(') {
        let close = group
            .find(')')
            .ok_or_else(|| "unclosed `(` in options".to_owned())?;
        for option in group[..close].split_whitespace() {
            if !allowed.contains(&option) {
                return Err(format!("unknown option `{option}`"));
            }
            options.push(option);
        }
        rest = group[close + 1..].trim();
    }

    let target = if rest.is_empty() {
        return Err("missing path".to_owned());
    } else if let Some(expr) = strip_keyword(rest, "eval") {
        Target::Eval(parse_expr(expr)?)
    } else {
        Target::Literal(rest.to_owned())
    };
    Ok((options, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scanner::scan;
    use std::path::Path;

    fn build(src: &str) -> Vec<Content> {
        assemble(scan(src, Path::new("/site/t.html")).unwrap())
    }

    fn text(node: &Content) -> &str {
        match node {
            Content::Text(t) => t,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_doc_is_dropped() {
        let nodes = build("a{{ doc anything at all }}b");
        assert_eq!(nodes.len(), 1);
        assert_eq!(text(&nodes[0]), "ab");
    }

    #[test]
    fn test_unknown_directive_is_kept() {
        let nodes = build("x {{ frobnicate 1 }} y");
        assert_eq!(nodes.len(), 1);
        assert_eq!(text(&nodes[0]), "x {{ frobnicate 1 }} y");
    }

    #[test]
    fn test_stray_end_is_kept() {
        let nodes = build("a{{end}}b");
        assert_eq!(text(&nodes[0]), "a{{end}}b");
    }

    #[test]
    fn test_define_and_eval() {
        let nodes = build("{{ define a 2 }}{{ eval a }}");
        assert!(matches!(&nodes[0], Content::Define { name, .. } if name.as_str() == "a"));
        assert!(matches!(&nodes[1], Content::Eval { expr: Expr::Ident(_), .. }));
    }

    #[test]
    fn test_malformed_define_and_eval() {
        let nodes = build("{{ define }}{{ define 1x 2 }}{{ eval 1 + }}");
        assert_eq!(text(&nodes[0]), "{{ define }}{{ define 1x 2 }}{{ eval 1 + }}");
    }

    #[test]
    fn test_nested_scopes() {
        let nodes = build("{{ if true }}a{{ for x [1] }}b{{ end }}c{{ end }}d");
        assert_eq!(nodes.len(), 2);
        let Content::If { body, .. } = &nodes[0] else {
            panic!("expected if");
        };
        assert_eq!(body.len(), 3);
        assert!(matches!(&body[1], Content::For { var, body, .. } if var.as_str() == "x" && body.len() == 1));
        assert_eq!(text(&nodes[1]), "d");
    }

    #[test]
    fn test_malformed_scope_is_passthrough() {
        let nodes = build("{{ if 1 + }}body{{ eval 1 }}{{ end }}!");
        assert_eq!(nodes.len(), 3);
        assert_eq!(text(&nodes[0]), "{{ if 1 + }}body");
        assert!(matches!(&nodes[1], Content::Eval { .. }));
        assert_eq!(text(&nodes[2]), "{{ end }}!");
    }

    #[test]
    fn test_unclosed_scope_is_closed_at_eof() {
        let nodes = build("{{ slot title }}Hi");
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], Content::Slot { name, body, .. } if name.as_str() == "title" && body.len() == 1));
    }

    #[test]
    fn test_include_options() {
        let nodes = build("{{ include (html) a.html }}{{ includeB64 (plain) img.png }}");
        assert!(matches!(
            &nodes[0],
            Content::Include { html: true, target: Target::Literal(p), .. } if p == "a.html"
        ));
        assert!(matches!(&nodes[1], Content::IncludeB64 { plain: true, .. }));
    }

    #[test]
    fn test_include_eval_target() {
        let nodes = build(r#"{{ include eval "/p/" + name }}"#);
        assert!(matches!(
            &nodes[0],
            Content::Include { target: Target::Eval(Expr::Binary(..)), .. }
        ));
    }

    #[test]
    fn test_bad_include_options() {
        let nodes = build("{{ includeRaw (html) a.txt }}{{ include }}");
        assert_eq!(text(&nodes[0]), "{{ includeRaw (html) a.txt }}{{ include }}");
    }

    #[test]
    fn test_component_collects_body() {
        let nodes = build("{{ component card.html }}{{ slot title }}T{{ end }}body{{ end }}");
        let Content::Component { body, html, .. } = &nodes[0] else {
            panic!("expected component");
        };
        assert!(!html);
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[0], Content::Slot { .. }));
    }

    #[test]
    fn test_origin_text_is_exact() {
        let nodes = build("\n  {{eval   x}}");
        let Content::Eval { origin, .. } = &nodes[1] else {
            panic!("expected eval");
        };
        assert_eq!(origin.text, "{{eval   x}}");
        assert_eq!((origin.location.row, origin.location.col), (2, 3));
    }
}
