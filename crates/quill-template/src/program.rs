//! Instruction program produced by the compiler.
//!
//! A compiled template is a flat list of [`Instr`]s over numbered registers
//! ([`Slot`]s). Registers hold document nodes, evaluated values and loop
//! cursors; [`Routine`](crate::Routine) interprets the list against a
//! [`Document`](quill_engine::Document).

use std::fmt;

use crate::expr::Expression;

/// Jump target used until [`Program::patch`] fills in the real one.
pub(crate) const UNPATCHED: usize = usize::MAX;

// ── Slot ──────────────────────────────────────────────────────────────────

/// A synthetic register identifier, printed as `_N`.
///
/// Slots are unique within one compile pass; `_1` is always the root
/// fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub(crate) usize);

impl Slot {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

// ── Instr ─────────────────────────────────────────────────────────────────

/// One piece of a `t-attf-*` attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Expr(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    CreateFragment { dst: Slot },
    CreateElement { dst: Slot, tag: String },
    CreateText { dst: Slot, text: String },
    /// Static attribute copied from the markup.
    SetAttribute {
        node: Slot,
        name: String,
        value: String,
    },
    Eval { dst: Slot, expr: Expression },
    /// `t-att-<name>`: set only when the value is truthy.
    SetAttributeIfTruthy {
        node: Slot,
        name: String,
        value: Slot,
    },
    /// `t-attf-<name>`: interpolated attribute value.
    SetAttributeTemplate {
        node: Slot,
        name: String,
        parts: Vec<TemplatePart>,
    },
    /// `t-att`: a `[name, value]` pair or a name → value mapping.
    SpreadAttributes { node: Slot, value: Slot },
    /// `t-on-<event>`: bind the named data-context handler.
    AddListener {
        node: Slot,
        event: String,
        handler: String,
    },
    /// Text node holding a computed value, escaped or raw.
    TextFromValue {
        dst: Slot,
        value: Slot,
        escape: bool,
    },
    Append { parent: Slot, child: Slot },
    JumpIfFalsy { cond: Expression, target: usize },
    /// Skip unless the value is truthy or the number zero.
    JumpIfAbsent { value: Slot, target: usize },
    Jump { target: usize },
    /// Evaluate the loop source and snapshot the loop metadata fields.
    IterStart {
        iter: Slot,
        source: Expression,
        name: String,
    },
    /// Bind the next item, or jump to `exit` when exhausted.
    IterNext { iter: Slot, exit: usize },
    /// Restore the loop metadata fields snapshotted by `IterStart`.
    IterEnd { iter: Slot },
    Return { root: Slot },
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::CreateFragment { dst } => write!(f, "{dst} = fragment()"),
            Instr::CreateElement { dst, tag } => write!(f, "{dst} = element({tag:?})"),
            Instr::CreateText { dst, text } => write!(f, "{dst} = text({text:?})"),
            Instr::SetAttribute { node, name, value } => {
                write!(f, "{node}.set({name:?}, {value:?})")
            }
            Instr::Eval { dst, expr } => write!(f, "{dst} = {expr}"),
            Instr::SetAttributeIfTruthy { node, name, value } => {
                write!(f, "if {value}: {node}.set({name:?}, {value})")
            }
            Instr::SetAttributeTemplate { node, name, parts } => {
                write!(f, "{node}.set({name:?}, `")?;
                for part in parts {
                    match part {
                        TemplatePart::Literal(s) => f.write_str(s)?,
                        TemplatePart::Expr(e) => write!(f, "${{{e}}}")?,
                    }
                }
                f.write_str("`)")
            }
            Instr::SpreadAttributes { node, value } => write!(f, "{node}.spread({value})"),
            Instr::AddListener { node, event, handler } => {
                write!(f, "{node}.on({event:?}, context[{handler:?}])")
            }
            Instr::TextFromValue {
                dst,
                value,
                escape: true,
            } => write!(f, "{dst} = text(escape({value}))"),
            Instr::TextFromValue {
                dst,
                value,
                escape: false,
            } => write!(f, "{dst} = text({value})"),
            Instr::Append { parent, child } => write!(f, "{parent}.append({child})"),
            Instr::JumpIfFalsy { cond, target } => write!(f, "unless {cond} goto {target}"),
            Instr::JumpIfAbsent { value, target } => {
                write!(f, "unless present {value} goto {target}")
            }
            Instr::Jump { target } => write!(f, "goto {target}"),
            Instr::IterStart { iter, source, name } => {
                write!(f, "{iter} = iter {source} as {name}")
            }
            Instr::IterNext { iter, exit } => write!(f, "next {iter} else goto {exit}"),
            Instr::IterEnd { iter } => write!(f, "end {iter}"),
            Instr::Return { root } => write!(f, "return {root}"),
        }
    }
}

// ── Program ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Line {
    depth: usize,
    instr: Instr,
}

/// An ordered instruction list plus the number of registers it uses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    lines: Vec<Line>,
    slots: usize,
}

impl Program {
    /// Append an instruction at `depth` and return its address.
    pub(crate) fn push(&mut self, depth: usize, instr: Instr) -> usize {
        self.lines.push(Line { depth, instr });
        self.lines.len() - 1
    }

    /// Point the jump at `pc` to `target`.
    pub(crate) fn patch(&mut self, pc: usize, target: usize) {
        let Some(line) = self.lines.get_mut(pc) else { return };
        match &mut line.instr {
            Instr::Jump { target: t }
            | Instr::JumpIfFalsy { target: t, .. }
            | Instr::JumpIfAbsent { target: t, .. }
            | Instr::IterNext { exit: t, .. } => *t = target,
            _ => {}
        }
    }

    pub(crate) fn set_slots(&mut self, slots: usize) {
        self.slots = slots;
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of registers, i.e. the highest slot index plus one.
    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn get(&self, pc: usize) -> Option<&Instr> {
        self.lines.get(pc).map(|l| &l.instr)
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instr> {
        self.lines.iter().map(|l| &l.instr)
    }

    /// Human-readable listing: one numbered, indented line per instruction.
    pub fn listing(&self) -> String {
        let width = self.lines.len().saturating_sub(1).to_string().len();
        let mut out = String::new();
        for (pc, line) in self.lines.iter().enumerate() {
            out.push_str(&format!("{pc:>width$}  {}{}\n", "  ".repeat(line.depth), line.instr));
        }
        out
    }
}
