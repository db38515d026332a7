use std::collections::HashMap;
use std::rc::Rc;

use quill_engine::{Document, MemoryDocument};
use quill_markup::{Node, parse_str};

use crate::compile::Compiler;
use crate::compile::validate::validate;
use crate::data::DataContext;
use crate::error::{CompileError, Error};
use crate::expr::ExpressionFormatter;
use crate::vm::Routine;

// ── Template ──────────────────────────────────────────────────────────────

/// A registered template: its raw markup and validated parse tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub(crate) source: String,
    pub(crate) root: Node,
}

impl Template {
    /// Parse and validate `markup`. Branch chains are checked here.
    pub fn parse(name: &str, markup: &str) -> Result<Self, CompileError> {
        let malformed = |reason: String| CompileError::MalformedMarkup {
            template: name.to_string(),
            reason,
        };
        if markup.trim().is_empty() {
            return Err(malformed("template should not be empty".into()));
        }
        let mut root = parse_str(markup).map_err(|e| malformed(e.to_string()))?.root;
        validate(&mut root)?;
        Ok(Self {
            source: markup.to_string(),
            root: Node::Element(root),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }
}

// ── RegistryOptions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Log every compiled program listing at `trace` level.
    pub log_listings: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self { log_listings: true }
    }
}

// ── TemplateRegistry ──────────────────────────────────────────────────────

/// Named templates, compiled lazily and cached.
///
/// `add` parses and validates eagerly; the routine for a name is compiled
/// on its first render and reused until the template is replaced.
///
/// ```
/// use quill_template::{DataContext, TemplateRegistry};
///
/// let mut registry = TemplateRegistry::new();
/// registry.add("hello", r#"<p>Hello <t t-esc="name"/></p>"#).unwrap();
///
/// let data = DataContext::new().with("name", "<world>");
/// let html = registry.render_to_string("hello", &data).unwrap();
/// assert_eq!(html, "<p>Hello &lt;world&gt;</p>");
/// ```
#[derive(Debug)]
pub struct TemplateRegistry<D: Document = MemoryDocument> {
    templates: HashMap<String, Template>,
    routines: HashMap<String, Rc<Routine>>,
    formatter: ExpressionFormatter,
    document: D,
    options: RegistryOptions,
}

impl TemplateRegistry<MemoryDocument> {
    pub fn new() -> Self {
        Self::with_document(MemoryDocument::new())
    }
}

impl Default for TemplateRegistry<MemoryDocument> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> TemplateRegistry<D> {
    /// A registry that renders into `document`.
    pub fn with_document(document: D) -> Self {
        Self {
            templates: HashMap::new(),
            routines: HashMap::new(),
            formatter: ExpressionFormatter::new(),
            document,
            options: RegistryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    /// Register `markup` under `name`, replacing any previous template and
    /// dropping its compiled routine. On error nothing changes.
    pub fn add(&mut self, name: impl Into<String>, markup: &str) -> Result<(), CompileError> {
        let name = name.into();
        let template = Template::parse(&name, markup)?;
        log::debug!("registered template `{name}` ({} bytes)", markup.len());
        self.routines.clear();
        self.templates.insert(name, template);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Registered template names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// `true` if `name` has a cached routine.
    pub fn is_compiled(&self, name: &str) -> bool {
        self.routines.contains_key(name)
    }

    /// The cached routine for `name`, compiling it first if needed.
    /// Failures are not cached.
    pub fn routine(&mut self, name: &str) -> Result<Rc<Routine>, CompileError> {
        if let Some(routine) = self.routines.get(name) {
            return Ok(Rc::clone(routine));
        }
        let program = Compiler::new(&self.templates, &mut self.formatter).compile(name)?;
        log::debug!("compiled template `{name}`: {} instruction(s)", program.len());
        if self.options.log_listings {
            log::trace!("listing for `{name}`:\n{}", program.listing());
        }
        let routine = Rc::new(Routine::new(program));
        self.routines.insert(name.to_string(), Rc::clone(&routine));
        Ok(routine)
    }

    /// Human-readable instruction listing of the compiled template.
    pub fn listing(&mut self, name: &str) -> Result<String, CompileError> {
        Ok(self.routine(name)?.program().listing())
    }

    /// Render `name` against `data` and return the root fragment.
    pub fn render(&mut self, name: &str, data: &DataContext) -> Result<D::Node, Error> {
        let routine = self.routine(name)?;
        Ok(routine.run(&mut self.document, data)?)
    }

    /// Render and serialize. A fragment serializes as the concatenation
    /// of its children.
    ///
    /// The tree is built in a scratch document that is dropped afterwards,
    /// so the registry's own document does not grow.
    pub fn render_to_string(&mut self, name: &str, data: &DataContext) -> Result<String, Error>
    where
        D: Default,
    {
        let routine = self.routine(name)?;
        let mut scratch = D::default();
        let node = routine.run(&mut scratch, data)?;
        Ok(scratch.serialize(&node))
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── add ───────────────────────────────────────────────────────────────

    #[test]
    fn empty_markup_is_malformed() {
        let mut r = TemplateRegistry::new();
        assert!(matches!(r.add("x", "  "), Err(CompileError::MalformedMarkup { .. })));
    }

    #[test]
    fn unparsable_markup_is_malformed() {
        let mut r = TemplateRegistry::new();
        let err = r.add("x", "<div>").unwrap_err();
        let CompileError::MalformedMarkup { template, .. } = err else { panic!("wrong error") };
        assert_eq!(template, "x");
        assert!(!r.contains("x"));
    }

    #[test]
    fn branch_errors_surface_at_add_time() {
        let mut r = TemplateRegistry::new();
        let err = r.add("x", "<div><p t-else=''/></div>").unwrap_err();
        assert!(matches!(err, CompileError::InvalidDirectiveStructure(_)));
    }

    #[test]
    fn failed_add_keeps_previous_template() {
        let mut r = TemplateRegistry::new();
        r.add("x", "<b/>").unwrap();
        assert!(r.add("x", "<b>").is_err());
        assert_eq!(r.template("x").map(Template::source), Some("<b/>"));
    }

    // ── cache ─────────────────────────────────────────────────────────────

    #[test]
    fn routines_are_compiled_lazily_and_cached() {
        let mut r = TemplateRegistry::new();
        r.add("x", "<b/>").unwrap();
        assert!(!r.is_compiled("x"));
        let first = r.routine("x").unwrap();
        let second = r.routine("x").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn replacing_a_template_invalidates_its_routine() {
        let mut r = TemplateRegistry::new();
        r.add("x", "<b/>").unwrap();
        r.routine("x").unwrap();
        r.add("x", "<i/>").unwrap();
        assert!(!r.is_compiled("x"));
        assert_eq!(r.render_to_string("x", &DataContext::new()).unwrap(), "<i></i>");
    }

    #[test]
    fn replacing_a_callee_invalidates_its_callers() {
        let mut r = TemplateRegistry::new();
        r.add("inner", "<b/>").unwrap();
        r.add("outer", "<div><t t-call='inner'/></div>").unwrap();
        assert_eq!(r.render_to_string("outer", &DataContext::new()).unwrap(), "<div><b></b></div>");
        r.add("inner", "<i/>").unwrap();
        assert_eq!(r.render_to_string("outer", &DataContext::new()).unwrap(), "<div><i></i></div>");
    }

    #[test]
    fn compile_failures_are_not_cached() {
        let mut r = TemplateRegistry::new();
        r.add("x", "<div><t t-call='later'/></div>").unwrap();
        assert!(matches!(
            r.render("x", &DataContext::new()),
            Err(Error::Compile(CompileError::UnresolvedInclusion(_)))
        ));
        r.add("later", "<span/>").unwrap();
        assert_eq!(
            r.render_to_string("x", &DataContext::new()).unwrap(),
            "<div><span></span></div>"
        );
    }

    #[test]
    fn unknown_template_render() {
        let mut r = TemplateRegistry::new();
        assert_eq!(
            r.render("nope", &DataContext::new()).unwrap_err(),
            Error::Compile(CompileError::TemplateNotFound("nope".into()))
        );
    }

    // ── document ──────────────────────────────────────────────────────────

    #[test]
    fn string_renders_leave_the_document_alone() {
        let mut r = TemplateRegistry::new();
        r.add("x", "<div><b>x</b></div>").unwrap();
        let data = DataContext::new();
        for _ in 0..1000 {
            assert_eq!(r.render_to_string("x", &data).unwrap(), "<div><b>x</b></div>");
        }
        assert!(r.document().is_empty());
    }

    #[test]
    fn node_renders_build_into_the_document() {
        let mut r = TemplateRegistry::new();
        r.add("x", "<div><b>x</b></div>").unwrap();
        let root = r.render("x", &DataContext::new()).unwrap();
        assert_eq!(r.document().serialize(&root), "<div><b>x</b></div>");
        assert!(!r.document().is_empty());
        r.document_mut().clear();
        assert!(r.document().is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let mut r = TemplateRegistry::new();
        r.add("b", "<b/>").unwrap();
        r.add("a", "<a/>").unwrap();
        assert_eq!(r.names(), ["a", "b"]);
    }
}
