// ── Attribute ─────────────────────────────────────────────────────────────

/// A single `name="value"` pair on an element.
///
/// `value` is entity-decoded: `a="x &lt; 3"` is stored as `x < 3`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

// ── Element ───────────────────────────────────────────────────────────────

/// A tag with its attributes (in source order) and child nodes.
///
/// ```xml
/// <li t-foreach="items" t-as="item" class="row">
///     <t t-esc="item"/>
/// </li>
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Tag name: `"div"`, `"t"`, `"svg:rect"`.
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Look up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|a| a.name == name).map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Remove an attribute, returning its value if it was present.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(idx).value)
    }

    /// Builder-style attribute setter, mostly useful in tests.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }
}

// ── Node ──────────────────────────────────────────────────────────────────

/// One node of the parsed tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Character data, kept verbatim (entity references are not decoded).
    Text(String),
    /// `<!-- ... -->`
    Comment(String),
    /// `<![CDATA[ ... ]]>`
    CData(String),
    /// `<?target data?>` appearing inside the root element.
    ProcessingInstruction { target: String, data: String },
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// `true` for text nodes made only of whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }

    /// Human-readable kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Element(_) => "element",
            Node::Text(_) => "text",
            Node::Comment(_) => "comment",
            Node::CData(_) => "cdata section",
            Node::ProcessingInstruction { .. } => "processing instruction",
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

// ── Document ──────────────────────────────────────────────────────────────

/// The top-level parse result: exactly one root element.
///
/// Prolog and epilog material (XML declaration, comments, whitespace) is
/// validated and dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}
