//! Quill engine crate.
//!
//! This crate owns the host-side runtime pieces used by the template layer:
//! the document model that compiled templates build into, DOM-style events,
//! the HTML-escape utility, and logger initialization.

pub mod dom;
pub mod escape;
pub mod logging;

pub use dom::{Document, Event, Listener, MemoryDocument, NodeId};
pub use escape::escape;
