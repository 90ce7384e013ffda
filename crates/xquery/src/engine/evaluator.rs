use crate::engine::runtime::{Error, QueryContext};
use crate::expr::Expr;
use crate::xdm::{Item, Value};
use core::fmt;
use std::sync::Arc;

/// An optimized expression tree. Immutable and shareable across threads;
/// each execution brings its own [`QueryContext`].
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    root: Arc<dyn Expr>,
}

impl CompiledQuery {
    pub(crate) fn new(root: Box<dyn Expr>) -> Self {
        Self { root: Arc::from(root) }
    }

    pub fn root(&self) -> &dyn Expr {
        &*self.root
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.root, f)
    }
}

/// Evaluates the query to a materialised value.
pub fn evaluate(query: &CompiledQuery, qc: &mut QueryContext) -> Result<Value, Error> {
    qc.start_timer();
    query.root.value(qc)
}

/// Evaluates the query lazily up to its first item.
pub fn evaluate_first(query: &CompiledQuery, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
    qc.start_timer();
    let mut iter = query.root.iter(qc)?;
    iter.next(qc)
}

/// Effective boolean value of the query result.
pub fn evaluate_ebv(query: &CompiledQuery, qc: &mut QueryContext) -> Result<bool, Error> {
    qc.start_timer();
    query.root.boolean(qc)
}
