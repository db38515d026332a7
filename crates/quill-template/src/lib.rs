//! Quill template compiler.
//!
//! Templates are XML markup with `t-*` directive attributes. The registry
//! parses and validates each template when it is added, compiles it on
//! first render into a flat instruction [`Program`], and runs that program
//! against any [`Document`](quill_engine::Document) with a [`DataContext`].
//!
//! # Quick start
//!
//! ```rust
//! use quill_template::prelude::*;
//!
//! let mut registry = TemplateRegistry::new();
//! registry.add("list", r#"
//!     <ul>
//!         <t t-foreach="items" t-as="item">
//!             <li t-att-class="item_first &amp;&amp; 'first'"><t t-esc="item"/></li>
//!         </t>
//!     </ul>"#).unwrap();
//!
//! let data = DataContext::from_json(&serde_json::json!({ "items": ["a", "b"] })).unwrap();
//! let html = registry.render_to_string("list", &data).unwrap();
//! assert!(html.contains(r#"<li class="first">"#));
//! ```
//!
//! # Directives
//!
//! | Directive | Effect |
//! |-----------|--------|
//! | `t-foreach="expr" t-as="x"` | repeat the children; exposes `x` and `x_*` metadata |
//! | `t-if` / `t-elif` / `t-else` | conditional chain over consecutive siblings |
//! | `t-call="name"` | include another template; its `t-esc="0"` shows the call site's content |
//! | `t-set="x" t-value="expr"` | bind a name to an expression, or to the node's children |
//! | `t-esc="expr"` / `t-raw="expr"` | emit a value escaped / verbatim, children as fallback |
//! | `t-att-a="expr"` | attribute set when the value is truthy |
//! | `t-attf-a="x {{expr}}"` | interpolated attribute |
//! | `t-att="expr"` | `[name, value]` pair or mapping of attributes |
//! | `t-on-click="handler"` | bind a data-context function as listener |

pub mod compile;
mod data;
mod error;
pub mod expr;
mod program;
mod registry;
mod value;
mod vm;

pub use data::DataContext;
pub use error::{CompileError, Error, EvalError, RenderError};
pub use program::{Instr, Program, Slot, TemplatePart};
pub use registry::{RegistryOptions, Template, TemplateRegistry};
pub use value::{Handler, Map, Value};
pub use vm::Routine;

pub mod prelude {
    pub use crate::{
        CompileError, DataContext, Error, Handler, RegistryOptions, RenderError, TemplateRegistry,
        Value,
    };
    pub use quill_engine::{Document, Event, MemoryDocument};
}
