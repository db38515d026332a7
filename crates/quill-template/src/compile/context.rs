use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use quill_markup::Node;

use crate::error::CompileError;
use crate::program::{Instr, Program, Slot};

// ── Binding ───────────────────────────────────────────────────────────────

/// What a `t-set` name stands for during compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// An expression string from `t-value`.
    Expr(String),
    /// The binding node's own children, re-emitted where the name is used.
    Content(Rc<[Node]>),
}

#[derive(Debug, Default)]
struct Scope {
    bindings: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(b) = self.bindings.borrow().get(name) {
            return Some(b.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }
}

/// The call site a sub-template was included from.
#[derive(Debug)]
pub struct Caller {
    /// Clone of the `t-call` node, directive stripped.
    pub node: Node,
    /// The caller in scope at that call site.
    pub outer: Option<Rc<Caller>>,
}

#[derive(Debug)]
struct CallFrame {
    template: String,
    parent: Option<Rc<CallFrame>>,
}

/// State shared by every context derived from one root.
#[derive(Debug, Default)]
struct Shared {
    next_id: Cell<usize>,
    depth: Cell<usize>,
    program: RefCell<Program>,
}

// ── CompileContext ────────────────────────────────────────────────────────

/// Compilation environment for one compile pass.
///
/// Derivations (`with_*`) return a new context and never mutate the
/// source. All contexts derived from one root share its identifier counter
/// and its output program, so sub-template inclusion splices into the
/// caller's instruction stream.
#[derive(Debug, Clone)]
pub struct CompileContext {
    shared: Rc<Shared>,
    fragment: Slot,
    parent: Option<Slot>,
    escaping: bool,
    caller: Option<Rc<Caller>>,
    scope: Rc<Scope>,
    calls: Option<Rc<CallFrame>>,
}

impl CompileContext {
    /// A root context. Its first identifier (`_1`) names the root fragment.
    pub fn new() -> Self {
        let shared = Rc::new(Shared {
            next_id: Cell::new(1),
            ..Shared::default()
        });
        let fragment = Slot(shared.next_id.get());
        shared.next_id.set(fragment.0 + 1);
        Self {
            shared,
            fragment,
            parent: None,
            escaping: false,
            caller: None,
            scope: Rc::new(Scope::default()),
            calls: None,
        }
    }

    /// A fresh root that only inherits the inclusion stack, used to
    /// discover the bindings a call site introduces.
    pub fn isolated(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            ..Self::new()
        }
    }

    // ── derivations ───────────────────────────────────────────────────────

    pub fn with_parent(&self, node: Slot) -> Self {
        Self {
            parent: Some(node),
            ..self.clone()
        }
    }

    /// Layer `bindings` over the current scope. Later `t-set`s land in the
    /// new layer and are invisible to this context.
    pub fn with_variables(&self, bindings: HashMap<String, Binding>) -> Self {
        let scope = Scope {
            bindings: RefCell::new(bindings),
            parent: Some(Rc::clone(&self.scope)),
        };
        Self {
            scope: Rc::new(scope),
            ..self.clone()
        }
    }

    pub fn with_caller(&self, node: Node) -> Self {
        let caller = Caller {
            node,
            outer: self.caller.clone(),
        };
        Self {
            caller: Some(Rc::new(caller)),
            ..self.clone()
        }
    }

    /// Replace the caller outright, e.g. to restore an outer call site.
    pub fn with_caller_frame(&self, caller: Option<Rc<Caller>>) -> Self {
        Self { caller, ..self.clone() }
    }

    pub fn with_escaping(&self) -> Self {
        Self {
            escaping: true,
            ..self.clone()
        }
    }

    pub fn without_escaping(&self) -> Self {
        Self {
            escaping: false,
            ..self.clone()
        }
    }

    /// Enter `template` for inclusion. Fails if it is already being
    /// compiled further up the inclusion stack.
    pub fn enter_template(&self, template: &str) -> Result<Self, CompileError> {
        let mut frame = self.calls.as_deref();
        while let Some(f) = frame {
            if f.template == template {
                return Err(CompileError::InvalidDirectiveStructure(format!(
                    "template `{template}` includes itself"
                )));
            }
            frame = f.parent.as_deref();
        }
        let frame = CallFrame {
            template: template.to_string(),
            parent: self.calls.clone(),
        };
        Ok(Self {
            calls: Some(Rc::new(frame)),
            ..self.clone()
        })
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn fragment(&self) -> Slot {
        self.fragment
    }

    pub fn parent(&self) -> Option<Slot> {
        self.parent
    }

    pub fn escaping(&self) -> bool {
        self.escaping
    }

    pub fn caller(&self) -> Option<&Rc<Caller>> {
        self.caller.as_ref()
    }

    // ── bindings ──────────────────────────────────────────────────────────

    /// Bind `name` in the innermost scope layer.
    pub fn bind(&self, name: impl Into<String>, binding: Binding) {
        self.scope.bindings.borrow_mut().insert(name.into(), binding);
    }

    /// Look `name` up, innermost layer first.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        self.scope.lookup(name)
    }

    /// The bindings of the innermost layer only.
    pub fn local_bindings(&self) -> HashMap<String, Binding> {
        self.scope.bindings.borrow().clone()
    }

    // ── output ────────────────────────────────────────────────────────────

    /// A fresh identifier, unique across every context of this pass.
    pub fn generate_id(&self) -> Slot {
        let id = self.shared.next_id.get();
        self.shared.next_id.set(id + 1);
        Slot(id)
    }

    /// Append an instruction at the current depth; returns its address.
    pub fn add_line(&self, instr: Instr) -> usize {
        self.shared.program.borrow_mut().push(self.shared.depth.get(), instr)
    }

    /// Attach `node` to the current parent, or to the root fragment.
    pub fn add_node(&self, node: Slot) {
        let parent = self.parent.unwrap_or(self.fragment);
        self.add_line(Instr::Append {
            parent,
            child: node,
        });
    }

    pub fn indent(&self) {
        self.shared.depth.set(self.shared.depth.get() + 1);
    }

    pub fn dedent(&self) {
        self.shared.depth.set(self.shared.depth.get().saturating_sub(1));
    }

    /// Address of the next instruction.
    pub fn pc(&self) -> usize {
        self.shared.program.borrow().len()
    }

    pub fn patch(&self, pc: usize, target: usize) {
        self.shared.program.borrow_mut().patch(pc, target);
    }

    /// Take the accumulated program out of the shared buffer.
    pub fn finish(&self) -> Program {
        let mut program = self.shared.program.take();
        program.set_slots(self.shared.next_id.get());
        program
    }
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new()
    }
}
