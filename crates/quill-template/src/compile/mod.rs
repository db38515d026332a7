//! Template compiler: walks a parsed template and emits a [`Program`].
//!
//! Directive resolution order per element:
//!
//! 1. `t-foreach` (loop over the children, nothing else applies)
//! 2. `t-if` / `t-elif` / `t-else` (opens a branch around the rest)
//! 3. `t-call` (include a sub-template, the call site's content becomes
//!    its `0` placeholder)
//! 4. `t-set` (bind a name to `t-value` or to the node's children)
//! 5. materialization of non-`t` elements and their attribute directives
//! 6. `t-esc` / `t-raw` value emission, with the children as fallback
//! 7. a bare `<t>` compiles its children in place

pub mod context;
pub mod directive;
pub mod validate;

use std::collections::{HashMap, HashSet};
use std::slice;

use quill_markup::{Element, Node};

use crate::error::CompileError;
use crate::expr::{Expression, ExpressionFormatter};
use crate::program::{Instr, Program, Slot, TemplatePart, UNPATCHED};
use crate::registry::Template;

use self::context::{Binding, CompileContext};
use self::directive::{AttributeKind, Branch, Piece};

/// Expression placeholder that expands to the caller's content.
const CALLER_CONTENT: &str = "0";

/// Exit jumps of an open `t-if` chain, patched when the chain closes.
#[derive(Debug, Default)]
struct BranchChain {
    exits: Vec<usize>,
}

/// A branch opened on the current node.
#[derive(Debug, Clone, Copy)]
enum OpenBranch {
    /// `t-if` / `t-elif`, with the address of its conditional jump.
    Conditional(usize),
    Else,
}

// ── Compiler ──────────────────────────────────────────────────────────────

pub struct Compiler<'a> {
    templates: &'a HashMap<String, Template>,
    formatter: &'a mut ExpressionFormatter,
}

impl<'a> Compiler<'a> {
    pub fn new(
        templates: &'a HashMap<String, Template>,
        formatter: &'a mut ExpressionFormatter,
    ) -> Self {
        Self {
            templates,
            formatter,
        }
    }

    /// Compile the template registered as `name` into a fresh program.
    pub fn compile(&mut self, name: &str) -> Result<Program, CompileError> {
        let templates = self.templates;
        let template = templates
            .get(name)
            .ok_or_else(|| CompileError::TemplateNotFound(name.to_string()))?;

        let ctx = CompileContext::new().enter_template(name)?;
        ctx.add_line(Instr::CreateFragment {
            dst: ctx.fragment(),
        });
        self.compile_nodes(slice::from_ref(&template.root), &ctx)?;
        ctx.add_line(Instr::Return {
            root: ctx.fragment(),
        });
        Ok(ctx.finish())
    }

    // ── node walk ─────────────────────────────────────────────────────────

    /// Compile a sibling list. Branch chains never cross the list boundary.
    fn compile_nodes(&mut self, nodes: &[Node], ctx: &CompileContext) -> Result<(), CompileError> {
        let mut chain = None;
        for node in nodes {
            self.compile_node(node, ctx, &mut chain)?;
        }
        close_chain(&mut chain, ctx);
        Ok(())
    }

    fn compile_node(
        &mut self,
        node: &Node,
        ctx: &CompileContext,
        chain: &mut Option<BranchChain>,
    ) -> Result<(), CompileError> {
        let Node::Element(el) = node else {
            close_chain(chain, ctx);
            return self.materialize(node, ctx).map(drop);
        };

        if let Some(source) = el.attr(directive::FOREACH) {
            close_chain(chain, ctx);
            return self.compile_foreach(el, source, ctx);
        }

        let branch = self.open_branch(el, ctx, chain)?;

        if let Some(target) = el.attr(directive::CALL) {
            self.compile_call(el, target, ctx)?;
            close_branch(branch, ctx, chain);
            return Ok(());
        }

        if let Some(name) = el.attr(directive::SET) {
            let binding = match el.attr(directive::VALUE) {
                Some(value) if !value.is_empty() => Binding::Expr(value.to_string()),
                _ => Binding::Content(el.children.clone().into()),
            };
            ctx.bind(name, binding);
        }

        let mut ctx = ctx.clone();
        if el.name != directive::WRAPPER {
            if let Some(id) = self.materialize(node, &ctx)? {
                ctx = ctx.with_parent(id);
            }
        }

        if let Some(expr) = el.attr(directive::ESC) {
            let value = resolve(expr, &ctx);
            self.compile_value(value, el, &ctx.with_escaping())?;
        }
        if let Some(expr) = el.attr(directive::RAW) {
            let value = resolve(expr, &ctx);
            self.compile_value(value, el, &ctx.without_escaping())?;
        }

        if el.name == directive::WRAPPER
            && !has_value_directive(el)
            && !el.has_attr(directive::SET)
        {
            self.compile_nodes(&el.children, &ctx)?;
        }

        close_branch(branch, &ctx, chain);
        Ok(())
    }

    // ── t-foreach ─────────────────────────────────────────────────────────

    fn compile_foreach(
        &mut self,
        el: &Element,
        source: &str,
        ctx: &CompileContext,
    ) -> Result<(), CompileError> {
        let name = el.attr(directive::AS).ok_or_else(|| {
            CompileError::InvalidDirectiveStructure("t-foreach requires a t-as name".into())
        })?;
        let iter = ctx.generate_id();
        let source = self.expression(source)?;
        ctx.add_line(Instr::IterStart {
            iter,
            source,
            name: name.to_string(),
        });
        let head = ctx.add_line(Instr::IterNext {
            iter,
            exit: UNPATCHED,
        });
        ctx.indent();
        self.compile_nodes(&el.children, ctx)?;
        ctx.add_line(Instr::Jump { target: head });
        ctx.dedent();
        let end = ctx.add_line(Instr::IterEnd { iter });
        ctx.patch(head, end);
        Ok(())
    }

    // ── branches ──────────────────────────────────────────────────────────

    fn open_branch(
        &mut self,
        el: &Element,
        ctx: &CompileContext,
        chain: &mut Option<BranchChain>,
    ) -> Result<Option<OpenBranch>, CompileError> {
        let Some(branch) = Branch::of(el) else {
            close_chain(chain, ctx);
            return Ok(None);
        };
        let cond = match branch {
            Branch::If(cond) => {
                close_chain(chain, ctx);
                *chain = Some(BranchChain::default());
                cond
            }
            Branch::Elif(cond) => {
                require_chain(chain)?;
                cond
            }
            Branch::Else => {
                require_chain(chain)?;
                ctx.indent();
                return Ok(Some(OpenBranch::Else));
            }
        };
        let cond = match resolve(cond, ctx) {
            Binding::Expr(expr) => expr,
            Binding::Content(_) => cond.to_string(),
        };
        let cond = self.expression(&cond)?;
        let jump = ctx.add_line(Instr::JumpIfFalsy {
            cond,
            target: UNPATCHED,
        });
        ctx.indent();
        Ok(Some(OpenBranch::Conditional(jump)))
    }

    // ── t-call ────────────────────────────────────────────────────────────

    fn compile_call(
        &mut self,
        el: &Element,
        target: &str,
        ctx: &CompileContext,
    ) -> Result<(), CompileError> {
        let templates = self.templates;
        let template = templates
            .get(target)
            .ok_or_else(|| CompileError::UnresolvedInclusion(target.to_string()))?;
        let entered = ctx.enter_template(target)?;

        let mut call_site = el.clone();
        call_site.remove_attr(directive::CALL);
        for name in directive::BRANCHES {
            call_site.remove_attr(name);
        }
        let call_site = Node::Element(call_site);

        let site_scope = ctx.isolated();
        self.compile_nodes(slice::from_ref(&call_site), &site_scope)?;
        let bindings = site_scope.local_bindings();

        log::trace!("t-call `{target}` with {} binding(s)", bindings.len());
        let sub = entered.with_caller(call_site).with_variables(bindings);
        self.compile_nodes(slice::from_ref(&template.root), &sub)
    }

    // ── materialization ───────────────────────────────────────────────────

    /// Emit construction of `node` and attach it. Returns the new element's
    /// slot, or `None` for text.
    fn materialize(
        &mut self,
        node: &Node,
        ctx: &CompileContext,
    ) -> Result<Option<Slot>, CompileError> {
        let el = match node {
            Node::Element(el) => el,
            Node::Text(text) => {
                let id = ctx.generate_id();
                ctx.add_line(Instr::CreateText {
                    dst: id,
                    text: text.clone(),
                });
                ctx.add_node(id);
                return Ok(None);
            }
            other => return Err(CompileError::UnknownNodeKind(other.kind())),
        };

        let id = ctx.generate_id();
        ctx.add_line(Instr::CreateElement {
            dst: id,
            tag: el.name.clone(),
        });
        for attr in &el.attributes {
            match AttributeKind::of(attr) {
                AttributeKind::Static { name, value } => {
                    ctx.add_line(Instr::SetAttribute {
                        node: id,
                        name: name.into(),
                        value: value.into(),
                    });
                }
                AttributeKind::Dynamic { name, expr } => {
                    let value = ctx.generate_id();
                    let expr = self.expression(expr)?;
                    ctx.add_line(Instr::Eval { dst: value, expr });
                    ctx.add_line(Instr::SetAttributeIfTruthy {
                        node: id,
                        name: name.into(),
                        value,
                    });
                }
                AttributeKind::Template { name, template } => {
                    let parts = directive::interpolation(template)
                        .into_iter()
                        .map(|piece| match piece {
                            Piece::Literal(s) => Ok(TemplatePart::Literal(s.to_string())),
                            Piece::Expr(e) => self.expression(e).map(TemplatePart::Expr),
                        })
                        .collect::<Result<_, _>>()?;
                    ctx.add_line(Instr::SetAttributeTemplate {
                        node: id,
                        name: name.into(),
                        parts,
                    });
                }
                AttributeKind::Spread { expr } => {
                    let value = ctx.generate_id();
                    let expr = self.expression(expr)?;
                    ctx.add_line(Instr::Eval { dst: value, expr });
                    ctx.add_line(Instr::SpreadAttributes { node: id, value });
                }
                AttributeKind::Event { event, handler } => {
                    ctx.add_line(Instr::AddListener {
                        node: id,
                        event: event.into(),
                        handler: handler.into(),
                    });
                }
                AttributeKind::Directive => {}
            }
        }
        ctx.add_node(id);

        if !el.children.is_empty() && !has_value_directive(el) {
            self.compile_nodes(&el.children, &ctx.with_parent(id))?;
        }
        Ok(Some(id))
    }

    // ── t-esc / t-raw ─────────────────────────────────────────────────────

    fn compile_value(
        &mut self,
        value: Binding,
        el: &Element,
        ctx: &CompileContext,
    ) -> Result<(), CompileError> {
        let expr = match value {
            Binding::Content(nodes) => return self.compile_nodes(&nodes, ctx),
            Binding::Expr(expr) => expr,
        };

        if expr.trim() == CALLER_CONTENT {
            if let Some(caller) = ctx.caller().cloned() {
                let outer = ctx.with_caller_frame(caller.outer.clone());
                return self.compile_nodes(slice::from_ref(&caller.node), &outer);
            }
        }

        let value = ctx.generate_id();
        let expr = self.expression(&expr)?;
        ctx.add_line(Instr::Eval { dst: value, expr });
        let skip = ctx.add_line(Instr::JumpIfAbsent {
            value,
            target: UNPATCHED,
        });
        ctx.indent();
        let text = ctx.generate_id();
        ctx.add_line(Instr::TextFromValue {
            dst: text,
            value,
            escape: ctx.escaping(),
        });
        ctx.add_node(text);

        if el.children.is_empty() {
            ctx.dedent();
            ctx.patch(skip, ctx.pc());
            return Ok(());
        }
        let done = ctx.add_line(Instr::Jump { target: UNPATCHED });
        ctx.patch(skip, ctx.pc());
        self.compile_nodes(&el.children, ctx)?;
        ctx.dedent();
        ctx.patch(done, ctx.pc());
        Ok(())
    }

    // ── expressions ───────────────────────────────────────────────────────

    fn expression(&mut self, raw: &str) -> Result<Expression, CompileError> {
        let formatted = self.formatter.format(raw);
        Expression::parse(&formatted).map_err(|e| CompileError::InvalidExpression {
            expr: raw.to_string(),
            reason: e.to_string(),
        })
    }
}

// ── helpers ───────────────────────────────────────────────────────────────

fn has_value_directive(el: &Element) -> bool {
    el.has_attr(directive::ESC) || el.has_attr(directive::RAW)
}

/// Follow `t-set` bindings from `value` until an unbound expression or
/// captured content. A cycle resolves to the expression that closes it.
fn resolve(value: &str, ctx: &CompileContext) -> Binding {
    let mut current = value.to_string();
    let mut seen = HashSet::new();
    loop {
        match ctx.lookup(&current) {
            Some(Binding::Expr(next)) if seen.insert(current.clone()) => current = next,
            Some(Binding::Content(nodes)) => return Binding::Content(nodes),
            _ => return Binding::Expr(current),
        }
    }
}

fn require_chain(chain: &Option<BranchChain>) -> Result<(), CompileError> {
    match chain {
        Some(_) => Ok(()),
        None => Err(CompileError::InvalidDirectiveStructure(
            "t-elif and t-else directives must be preceded by a t-if or t-elif directive".into(),
        )),
    }
}

fn close_branch(branch: Option<OpenBranch>, ctx: &CompileContext, chain: &mut Option<BranchChain>) {
    match branch {
        None => {}
        Some(OpenBranch::Conditional(jump)) => {
            let exit = ctx.add_line(Instr::Jump { target: UNPATCHED });
            ctx.dedent();
            ctx.patch(jump, ctx.pc());
            if let Some(chain) = chain {
                chain.exits.push(exit);
            }
        }
        Some(OpenBranch::Else) => {
            ctx.dedent();
            close_chain(chain, ctx);
        }
    }
}

fn close_chain(chain: &mut Option<BranchChain>, ctx: &CompileContext) {
    if let Some(chain) = chain.take() {
        let end = ctx.pc();
        for exit in chain.exits {
            ctx.patch(exit, end);
        }
    }
}
