//! Directive attribute names and their classification.

use quill_markup::{Attribute, Element};

/// Wrapper tag: compiled, never materialized.
pub const WRAPPER: &str = "t";

pub const FOREACH: &str = "t-foreach";
pub const AS: &str = "t-as";
pub const IF: &str = "t-if";
pub const ELIF: &str = "t-elif";
pub const ELSE: &str = "t-else";
pub const CALL: &str = "t-call";
pub const SET: &str = "t-set";
pub const VALUE: &str = "t-value";
pub const ESC: &str = "t-esc";
pub const RAW: &str = "t-raw";
pub const SPREAD: &str = "t-att";

const DIRECTIVE_PREFIX: &str = "t-";
const DYNAMIC_PREFIX: &str = "t-att-";
const TEMPLATE_PREFIX: &str = "t-attf-";
const EVENT_PREFIX: &str = "t-on-";

pub const BRANCHES: [&str; 3] = [IF, ELIF, ELSE];

// ── Branch ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch<'a> {
    If(&'a str),
    Elif(&'a str),
    Else,
}

impl<'a> Branch<'a> {
    /// The branch directive carried by `el`, `t-if` first.
    pub fn of(el: &'a Element) -> Option<Self> {
        if let Some(cond) = el.attr(IF) {
            Some(Branch::If(cond))
        } else if let Some(cond) = el.attr(ELIF) {
            Some(Branch::Elif(cond))
        } else if el.has_attr(ELSE) {
            Some(Branch::Else)
        } else {
            None
        }
    }
}

// ── Attribute directives ──────────────────────────────────────────────────

/// How the element compiler treats one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind<'a> {
    /// Copied verbatim.
    Static { name: &'a str, value: &'a str },
    /// `t-att-<name>="expr"`
    Dynamic { name: &'a str, expr: &'a str },
    /// `t-attf-<name>="text {{ expr }}"`
    Template { name: &'a str, template: &'a str },
    /// `t-att="expr"`
    Spread { expr: &'a str },
    /// `t-on-<event>="handler"`
    Event { event: &'a str, handler: &'a str },
    /// Any other `t-*` attribute; handled elsewhere or ignored.
    Directive,
}

impl<'a> AttributeKind<'a> {
    pub fn of(attr: &'a Attribute) -> Self {
        let (name, value) = (attr.name.as_str(), attr.value.as_str());
        if name == SPREAD {
            AttributeKind::Spread { expr: value }
        } else if let Some(name) = name.strip_prefix(TEMPLATE_PREFIX) {
            AttributeKind::Template {
                name,
                template: value,
            }
        } else if let Some(name) = name.strip_prefix(DYNAMIC_PREFIX) {
            AttributeKind::Dynamic { name, expr: value }
        } else if let Some(event) = name.strip_prefix(EVENT_PREFIX) {
            AttributeKind::Event {
                event,
                handler: value,
            }
        } else if name.starts_with(DIRECTIVE_PREFIX) {
            AttributeKind::Directive
        } else {
            AttributeKind::Static { name, value }
        }
    }
}

// ── Interpolation ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a> {
    Literal(&'a str),
    Expr(&'a str),
}

/// Split a `t-attf-*` value on `{{ expr }}` placeholders. An unterminated
/// `{{` stays literal.
pub fn interpolation(template: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else { break };
        if open > 0 {
            pieces.push(Piece::Literal(&rest[..open]));
        }
        pieces.push(Piece::Expr(&rest[open + 2..open + 2 + close]));
        rest = &rest[open + 2 + close + 2..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(name: &str, value: &str) -> AttributeKind<'static> {
        let attr = Box::leak(Box::new(Attribute { name: name.into(), value: value.into() }));
        AttributeKind::of(attr)
    }

    #[test]
    fn attribute_classification() {
        assert_eq!(kind("class", "a"), AttributeKind::Static { name: "class", value: "a" });
        assert_eq!(kind("t-att", "x"), AttributeKind::Spread { expr: "x" });
        assert_eq!(kind("t-att-href", "u"), AttributeKind::Dynamic { name: "href", expr: "u" });
        assert_eq!(
            kind("t-attf-class", "a {{b}}"),
            AttributeKind::Template { name: "class", template: "a {{b}}" }
        );
        assert_eq!(
            kind("t-on-click", "go"),
            AttributeKind::Event {
                event: "click",
                handler: "go"
            }
        );
        assert_eq!(kind("t-if", "x"), AttributeKind::Directive);
        assert_eq!(kind("t-unknown", ""), AttributeKind::Directive);
    }

    #[test]
    fn branch_of_prefers_if() {
        let el = Element::new("p").with_attr("t-if", "a");
        assert_eq!(Branch::of(&el), Some(Branch::If("a")));
        let el = Element::new("p").with_attr("t-else", "");
        assert_eq!(Branch::of(&el), Some(Branch::Else));
        assert_eq!(Branch::of(&Element::new("p")), None);
    }

    #[test]
    fn interpolation_splits_placeholders() {
        assert_eq!(
            interpolation("item {{ id }}-{{kind}}"),
            vec![
                Piece::Literal("item "),
                Piece::Expr(" id "),
                Piece::Literal("-"),
                Piece::Expr("kind"),
            ]
        );
        assert_eq!(interpolation("plain"), vec![Piece::Literal("plain")]);
        assert_eq!(interpolation("open {{ x"), vec![Piece::Literal("open {{ x")]);
        assert!(interpolation("").is_empty());
    }
}
