//! Document model capability targeted by compiled templates.
//!
//! Templates never touch a concrete rendering surface. They build through
//! the [`Document`] trait, so a browser bridge, a native widget toolkit or
//! the in-memory [`MemoryDocument`] can all host the same compiled routine.

mod event;
mod memory;

pub use event::{Event, Listener};
pub use memory::{MemoryDocument, NodeId, NodeKind};

// ── Document trait ────────────────────────────────────────────────────────

/// Node construction and serialization primitives.
///
/// # Implementing a custom document
///
/// ```rust,ignore
/// impl Document for MySurface {
///     type Node = MyHandle;
///     fn create_fragment(&mut self) -> MyHandle { ... }
///     fn create_element(&mut self, tag: &str) -> MyHandle { ... }
///     // ...
/// }
/// ```
pub trait Document {
    /// Handle to a node owned by the document.
    type Node: Clone + std::fmt::Debug;

    /// Create a detached fragment. Appending a fragment moves its children.
    fn create_fragment(&mut self) -> Self::Node;

    fn create_element(&mut self, tag: &str) -> Self::Node;

    /// Create a text node. `text` is markup-ready and is serialized as-is;
    /// callers escape untrusted content before it gets here.
    fn create_text(&mut self, text: &str) -> Self::Node;

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    /// Register `listener` for events named `event` on `node`.
    fn add_listener(&mut self, node: &Self::Node, event: &str, listener: Listener);

    /// Serialize a node: text as-is, fragments as the concatenation of their
    /// children, elements as tag markup with attributes and children.
    fn serialize(&self, node: &Self::Node) -> String;
}
