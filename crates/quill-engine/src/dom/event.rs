use std::fmt;
use std::rc::Rc;

/// An event delivered to listeners registered with `t-on-<name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name without the `on` prefix: `"click"`, `"input"`.
    pub name: String,
    /// Optional payload (e.g. the new value of an input).
    pub detail: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A shared event callback.
///
/// Cloning is cheap; clones invoke the same closure.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[inline]
    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Listener(..)")
    }
}
