//! Evaluation and optimization core of an XQuery processor.
//!
//! The crate is organised leaf-first:
//! - [`types`]: the static type lattice and sequence types
//! - [`xdm`] and [`model`]: items, sequences and the node abstraction
//! - [`tree`]: the persistent finger tree backing large sequences
//! - [`expr`]: the evaluation protocol and the expression nodes
//! - [`compiler`]: the compile context and its rewriting primitives
//! - [`engine`]: runtime context, errors, numerics and built-in functions

pub mod compiler;
pub mod consts;
pub mod engine;
pub mod expr;
pub mod model;
pub mod tree;
pub mod types;
pub mod xdm;

pub use compiler::{CompileContext, compile};
pub use engine::evaluator::{CompiledQuery, evaluate, evaluate_ebv, evaluate_first};
pub use engine::runtime::{
    Error, ErrorCode, ErrorKind, InputInfo, QueryContext, QueryContextBuilder, QueryOptions,
    QueryOptionsBuilder,
};
pub use expr::Expr;
pub use model::{Node, NodeKind, XdmNode};
pub use model::simple::{SimpleNode, attr, doc as simple_doc, elem, text};
pub use types::{AtomType, ExprType, FuncType, NodeType, Occurrence, SeqType, Type};
pub use xdm::{AtomicValue, Item, Value};
