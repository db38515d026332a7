use quill_engine::{Document, Listener, escape};

use crate::data::DataContext;
use crate::error::RenderError;
use crate::program::{Instr, Program, Slot, TemplatePart};
use crate::value::Value;

/// Suffixes of the metadata fields a `t-foreach` loop named `x` exposes;
/// the bare name (`x`) carries the current key.
const LOOP_FIELDS: [&str; 6] = ["_first", "_last", "_parity", "_index", "", "_value"];

// ── Registers ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct LoopState {
    name: String,
    keys: Vec<Value>,
    values: Vec<Value>,
    cursor: usize,
    saved: Vec<(String, Option<Value>)>,
}

impl LoopState {
    /// Put back the context fields the loop shadowed.
    fn restore(self, data: &DataContext) {
        for (field, previous) in self.saved {
            match previous {
                Some(value) => data.set(field, value),
                None => data.remove(&field),
            };
        }
    }
}

#[derive(Debug)]
enum Register<N> {
    Empty,
    Node(N),
    Value(Value),
    Loop(LoopState),
}

struct Registers<N>(Vec<Register<N>>);

impl<N: Clone> Registers<N> {
    fn new(len: usize) -> Self {
        Self((0..len).map(|_| Register::Empty).collect())
    }

    fn set(&mut self, slot: Slot, reg: Register<N>) -> Result<(), RenderError> {
        let cell = self
            .0
            .get_mut(slot.index())
            .ok_or(RenderError::Register {
                slot,
                expected: "a register",
            })?;
        *cell = reg;
        Ok(())
    }

    fn node(&self, slot: Slot) -> Result<&N, RenderError> {
        match self.0.get(slot.index()) {
            Some(Register::Node(n)) => Ok(n),
            _ => Err(RenderError::Register {
                slot,
                expected: "a node",
            }),
        }
    }

    fn value(&self, slot: Slot) -> Result<&Value, RenderError> {
        match self.0.get(slot.index()) {
            Some(Register::Value(v)) => Ok(v),
            _ => Err(RenderError::Register {
                slot,
                expected: "a value",
            }),
        }
    }

    fn take_loop(&mut self, slot: Slot) -> Result<LoopState, RenderError> {
        match self.0.get_mut(slot.index()).map(|r| std::mem::replace(r, Register::Empty)) {
            Some(Register::Loop(state)) => Ok(state),
            _ => Err(RenderError::Register {
                slot,
                expected: "a loop",
            }),
        }
    }

    fn loop_mut(&mut self, slot: Slot) -> Result<&mut LoopState, RenderError> {
        match self.0.get_mut(slot.index()) {
            Some(Register::Loop(state)) => Ok(state),
            _ => Err(RenderError::Register {
                slot,
                expected: "a loop",
            }),
        }
    }

    /// Restore every loop still open after a failed run. Nested loops sit in
    /// higher slots than their enclosing loop, so the sweep goes backwards
    /// and the outermost snapshot is applied last.
    fn unwind(self, data: &DataContext) {
        for reg in self.0.into_iter().rev() {
            if let Register::Loop(state) = reg {
                log::trace!("unwinding loop `{}`", state.name);
                state.restore(data);
            }
        }
    }
}

// ── Routine ───────────────────────────────────────────────────────────────

/// A compiled template: compile once, run many times.
///
/// Running interprets the program against a document and a data context
/// and returns the root fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    program: Program,
}

impl Routine {
    pub fn new(program: Program) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Render into `doc`. On failure, context fields shadowed by open loops
    /// are restored before the error is returned.
    pub fn run<D: Document>(
        &self,
        doc: &mut D,
        data: &DataContext,
    ) -> Result<D::Node, RenderError> {
        let mut regs = Registers::new(self.program.slots());
        self.execute(doc, data, &mut regs).inspect_err(|_| regs.unwind(data))
    }

    fn execute<D: Document>(
        &self,
        doc: &mut D,
        data: &DataContext,
        regs: &mut Registers<D::Node>,
    ) -> Result<D::Node, RenderError> {
        let mut pc = 0;

        while let Some(instr) = self.program.get(pc) {
            pc += 1;
            match instr {
                Instr::CreateFragment { dst } => {
                    let node = doc.create_fragment();
                    regs.set(*dst, Register::Node(node))?;
                }
                Instr::CreateElement { dst, tag } => {
                    let node = doc.create_element(tag);
                    regs.set(*dst, Register::Node(node))?;
                }
                Instr::CreateText { dst, text } => {
                    let node = doc.create_text(text);
                    regs.set(*dst, Register::Node(node))?;
                }
                Instr::SetAttribute { node, name, value } => {
                    doc.set_attribute(regs.node(*node)?, name, value);
                }
                Instr::Eval { dst, expr } => {
                    let value = expr.eval(data)?;
                    regs.set(*dst, Register::Value(value))?;
                }
                Instr::SetAttributeIfTruthy { node, name, value } => {
                    let value = regs.value(*value)?;
                    if value.is_truthy() {
                        doc.set_attribute(regs.node(*node)?, name, &value.to_string());
                    }
                }
                Instr::SetAttributeTemplate { node, name, parts } => {
                    let mut text = String::new();
                    for part in parts {
                        match part {
                            TemplatePart::Literal(s) => text.push_str(s),
                            TemplatePart::Expr(e) => text.push_str(&e.eval(data)?.to_string()),
                        }
                    }
                    doc.set_attribute(regs.node(*node)?, name, &text);
                }
                Instr::SpreadAttributes { node, value } => {
                    let target = regs.node(*node)?;
                    match regs.value(*value)? {
                        Value::Array(pair) => {
                            let name = pair.first().cloned().unwrap_or_default();
                            let value = pair.get(1).cloned().unwrap_or_default();
                            doc.set_attribute(target, &name.to_string(), &value.to_string());
                        }
                        Value::Object(map) => {
                            for (name, value) in map {
                                doc.set_attribute(target, name, &value.to_string());
                            }
                        }
                        _ => {}
                    }
                }
                Instr::AddListener { node, event, handler } => {
                    let Value::Function(callback) = data.get(handler) else {
                        return Err(RenderError::NotAFunction {
                            handler: handler.clone(),
                            found: data.get(handler).type_of(),
                        });
                    };
                    let receiver = data.clone();
                    let listener = Listener::new(move |ev| callback.call(&receiver, ev));
                    log::trace!("binding `{handler}` to {event} on {node}");
                    doc.add_listener(regs.node(*node)?, event, listener);
                }
                Instr::TextFromValue {
                    dst,
                    value,
                    escape: escaped,
                } => {
                    let raw = regs.value(*value)?.to_string();
                    let text = if *escaped { escape(&raw) } else { raw.as_str().into() };
                    let node = doc.create_text(&text);
                    regs.set(*dst, Register::Node(node))?;
                }
                Instr::Append { parent, child } => {
                    doc.append_child(regs.node(*parent)?, regs.node(*child)?);
                }
                Instr::JumpIfFalsy { cond, target } => {
                    if !cond.eval(data)?.is_truthy() {
                        pc = *target;
                    }
                }
                Instr::JumpIfAbsent { value, target } => {
                    if !regs.value(*value)?.is_present() {
                        pc = *target;
                    }
                }
                Instr::Jump { target } => pc = *target,
                Instr::IterStart { iter, source, name } => {
                    let (keys, values) = loop_items(source.eval(data)?)?;
                    let saved = LOOP_FIELDS
                        .iter()
                        .map(|suffix| {
                            let field = format!("{name}{suffix}");
                            let previous = data.fields().get(&field).cloned();
                            (field, previous)
                        })
                        .collect();
                    let state = LoopState {
                        name: name.clone(),
                        keys,
                        values,
                        cursor: 0,
                        saved,
                    };
                    regs.set(*iter, Register::Loop(state))?;
                }
                Instr::IterNext { iter, exit } => {
                    let state = regs.loop_mut(*iter)?;
                    let i = state.cursor;
                    if i >= state.keys.len() {
                        pc = *exit;
                        continue;
                    }
                    let name = &state.name;
                    data.set(format!("{name}_first"), i == 0);
                    data.set(format!("{name}_last"), i + 1 == state.keys.len());
                    data.set(format!("{name}_parity"), if i % 2 == 0 { "even" } else { "odd" });
                    data.set(format!("{name}_index"), i);
                    data.set(name.clone(), state.keys[i].clone());
                    data.set(format!("{name}_value"), state.values[i].clone());
                    state.cursor += 1;
                }
                Instr::IterEnd { iter } => {
                    regs.take_loop(*iter)?.restore(data);
                }
                Instr::Return { root } => return Ok(regs.node(*root)?.clone()),
            }
        }
        Err(RenderError::Register {
            slot: Slot(1),
            expected: "a returned root",
        })
    }
}

/// Parallel key and value lists for a `t-foreach` source.
fn loop_items(source: Value) -> Result<(Vec<Value>, Vec<Value>), RenderError> {
    Ok(match source {
        Value::Number(n) => {
            if n < 0.0 || n.fract() != 0.0 || n > f64::from(u32::MAX) {
                return Err(RenderError::InvalidCount(n));
            }
            let range: Vec<Value> = (0..n as usize).map(Value::from).collect();
            (range.clone(), range)
        }
        Value::Array(items) => (items.clone(), items),
        Value::Object(map) => {
            let keys = map.keys().map(|k| Value::from(k.as_str())).collect();
            (keys, map.into_values().collect())
        }
        Value::String(s) => {
            let chars: Vec<Value> = s.chars().map(|c| Value::String(c.to_string())).collect();
            ((0..chars.len()).map(|i| Value::String(i.to_string())).collect(), chars)
        }
        Value::Bool(_) | Value::Function(_) => (Vec::new(), Vec::new()),
        Value::Undefined => return Err(RenderError::NotIterable { found: "undefined" }),
        Value::Null => return Err(RenderError::NotIterable { found: "null" }),
    })
}
