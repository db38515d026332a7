use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::value::{Map, Value};

// ── DataContext ───────────────────────────────────────────────────────────

/// The runtime data context a compiled template reads from.
///
/// A cheap, cloneable handle: clones share the same fields. Rendering
/// mutates the context in place (loop metadata), and listeners registered
/// by `t-on-*` keep a handle so handlers can update state later.
///
/// ```
/// use quill_template::DataContext;
///
/// let ctx = DataContext::new().with("title", "Hello").with("count", 3);
/// assert_eq!(ctx.get("title").to_string(), "Hello");
/// assert!(ctx.get("missing").is_undefined());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataContext(Rc<RefCell<Map>>);

impl DataContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object. Returns `None` for any other
    /// JSON value.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match Value::from_json(json) {
            Value::Object(map) => Some(Self::from_map(map)),
            _ => None,
        }
    }

    pub fn from_map(map: Map) -> Self {
        Self(Rc::new(RefCell::new(map)))
    }

    /// Builder-style field setter.
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Read a field; absent fields read as [`Value::Undefined`].
    pub fn get(&self, name: &str) -> Value {
        self.0.borrow().get(name).cloned().unwrap_or_default()
    }

    /// Write a field, returning the previous value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().insert(name.into(), value.into())
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    /// Mutate the fields in place, e.g. from an event handler.
    pub fn update<R>(&self, f: impl FnOnce(&mut Map) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// Borrow the fields for reading.
    pub fn fields(&self) -> Ref<'_, Map> {
        self.0.borrow()
    }

    /// `true` when both handles point at the same fields.
    pub fn same(&self, other: &DataContext) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
