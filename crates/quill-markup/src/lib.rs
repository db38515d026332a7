//! Parser and AST for **quill** template markup.
//!
//! Templates are a well-formed XML subset: one root element, attributes,
//! text, comments, CDATA sections and processing instructions. Directive
//! attributes (`t-if`, `t-foreach`, ...) are ordinary attributes at this
//! level; the template compiler gives them meaning.
//!
//! Tokenizing is done by [`quick_xml`]; this crate turns its event stream
//! into an owned tree and reports failures with line and column.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ast`] | `Document`, `Element`, `Node`, `Attribute` |
//! | [`error`] | `ParseError` |
//! | [`parser`] | `parse_str` entry point |
//!
//! # Quick start
//!
//! ```rust
//! use quill_markup::parse_str;
//!
//! let src = r#"
//!     <ul class="list">
//!         <li t-foreach="items" t-as="item"><t t-esc="item"/></li>
//!     </ul>
//! "#;
//!
//! let doc = parse_str(src).unwrap();
//! assert_eq!(doc.root.name, "ul");
//! assert_eq!(doc.root.attr("class"), Some("list"));
//! ```

pub mod ast;
pub mod error;
pub mod parser;

pub use ast::{Attribute, Document, Element, Node};
pub use error::ParseError;
pub use parser::parse_str;
