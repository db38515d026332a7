use std::str;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::ast::{Attribute, Document, Element, Node};
use crate::error::ParseError;

// ── Tree builder ──────────────────────────────────────────────────────────

/// Assembles reader events into a [`Document`].
///
/// `open` holds the elements whose end tag has not been read yet; an
/// element is attached to its parent (or becomes the root) when it closes.
#[derive(Debug, Default)]
struct TreeBuilder {
    open: Vec<Element>,
    root: Option<Element>,
}

impl TreeBuilder {
    fn place(&self) -> &'static str {
        if self.root.is_some() {
            "after the root element"
        } else {
            "before the root element"
        }
    }

    /// Guard against a second root before anything is pushed.
    fn check_new_root(&self, name: &str) -> Result<(), String> {
        if self.open.is_empty() && self.root.is_some() {
            return Err(format!(
                "document has more than one root element (found <{name}>)"
            ));
        }
        Ok(())
    }

    fn attach(&mut self, el: Element) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(Node::Element(el)),
            None => self.root = Some(el),
        }
    }

    /// Append character data to the open element, merging with a preceding
    /// text node. Outside the root only whitespace is accepted.
    fn text(&mut self, text: &str) -> Result<(), String> {
        let Some(parent) = self.open.last_mut() else {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(format!("text is not allowed {}", self.place()));
        };
        match parent.children.last_mut() {
            Some(Node::Text(prev)) => prev.push_str(text),
            _ => parent.children.push(Node::Text(text.to_string())),
        }
        Ok(())
    }

    /// Add a comment, CDATA section or PI inside the root; outside it,
    /// comments and PIs are dropped.
    fn misc(&mut self, node: Node) -> Result<(), String> {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None if matches!(node, Node::CData(_)) => {
                return Err(format!("text is not allowed {}", self.place()));
            }
            None => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), String> {
        let Some(el) = self.open.pop() else {
            return Err(format!("unexpected closing tag </{name}>"));
        };
        if el.name != name {
            return Err(format!(
                "mismatched closing tag: expected </{}>, got </{name}>",
                el.name
            ));
        }
        self.attach(el);
        Ok(())
    }

    fn finish(mut self) -> Result<Document, String> {
        if let Some(el) = self.open.pop() {
            return Err(format!("unclosed <{}> element", el.name));
        }
        self.root
            .map(|root| Document { root })
            .ok_or_else(|| "document has no root element".to_string())
    }
}

// ── Event conversion ──────────────────────────────────────────────────────

fn utf8(bytes: &[u8]) -> Result<&str, String> {
    str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {e}"))
}

/// Build an element from a start tag. Attribute values are entity-decoded.
fn element(start: &BytesStart<'_>) -> Result<Element, String> {
    let mut el = Element::new(utf8(start.name().as_ref())?);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("malformed attribute on <{}>: {e}", el.name))?;
        let name = utf8(attr.key.as_ref())?.to_string();
        if attr.value.contains(&b'<') {
            return Err(format!(
                "'<' is not allowed in attribute values (attribute {name:?}); write &lt;"
            ));
        }
        let value = attr
            .unescape_value()
            .map_err(|e| format!("attribute {name:?} on <{}>: {e}", el.name))?;
        el.attributes.push(Attribute {
            name,
            value: value.into_owned(),
        });
    }
    Ok(el)
}

/// Split `<?target data?>` content into its target and trimmed data.
fn instruction(content: &str) -> Node {
    let (target, data) = content
        .split_once(char::is_whitespace)
        .unwrap_or((content, ""));
    Node::ProcessingInstruction {
        target: target.to_string(),
        data: data.trim().to_string(),
    }
}

/// 1-based line and column of byte `offset` in `src`.
fn line_col(src: &str, offset: usize) -> (usize, usize) {
    let mut end = offset.min(src.len());
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    let before = &src[..end];
    let line = before.matches('\n').count() + 1;
    let col = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, col)
}

// ── Public parse entry point ──────────────────────────────────────────────

/// Parse template markup into a [`Document`].
///
/// Character data is kept verbatim, entity references included, so text
/// that is already markup-ready stays that way.
pub fn parse_str(src: &str) -> Result<Document, ParseError> {
    let mut reader = Reader::from_str(src);
    // End tags are matched here so the error names both tags.
    reader.config_mut().check_end_names = false;

    let mut tree = TreeBuilder::default();
    loop {
        let start = reader.buffer_position() as usize;
        let fail = |message: String| {
            let (line, col) = line_col(src, start);
            ParseError::new(message, line, col)
        };

        let event = reader.read_event().map_err(|e| {
            let (line, col) = line_col(src, reader.error_position() as usize);
            ParseError::new(e.to_string(), line, col)
        })?;

        match event {
            Event::Start(e) => {
                let el = element(&e).map_err(&fail)?;
                tree.check_new_root(&el.name).map_err(&fail)?;
                tree.open.push(el);
            }
            Event::Empty(e) => {
                let el = element(&e).map_err(&fail)?;
                tree.check_new_root(&el.name).map_err(&fail)?;
                tree.attach(el);
            }
            Event::End(e) => {
                let qname = e.name();
                let name = utf8(qname.as_ref()).map_err(&fail)?;
                tree.close(name).map_err(&fail)?;
            }
            Event::Text(e) => {
                let text = e.decode().map_err(|e| fail(e.to_string()))?;
                tree.text(&text).map_err(&fail)?;
            }
            Event::GeneralRef(e) => {
                let name = e.decode().map_err(|e| fail(e.to_string()))?;
                tree.text(&format!("&{name};")).map_err(&fail)?;
            }
            Event::CData(e) => {
                let body = utf8(e.as_ref()).map_err(&fail)?;
                tree.misc(Node::CData(body.to_string())).map_err(&fail)?;
            }
            Event::Comment(e) => {
                let body = utf8(e.as_ref()).map_err(&fail)?;
                tree.misc(Node::Comment(body.to_string())).map_err(&fail)?;
            }
            Event::PI(e) => {
                let content = utf8(e.as_ref()).map_err(&fail)?;
                tree.misc(instruction(content)).map_err(&fail)?;
            }
            Event::Decl(_) if tree.open.is_empty() && tree.root.is_none() => {}
            Event::Decl(_) => {
                return Err(fail("XML declaration must precede the root element".into()));
            }
            Event::DocType(_) => {
                return Err(fail(
                    "markup declarations (<!DOCTYPE ...>) are not supported".into(),
                ));
            }
            Event::Eof => return tree.finish().map_err(&fail),
        }
    }
}
