//! Compile context: rewriting with type refinement, pre-evaluation and the
//! scope and focus stacks consulted while optimizing an expression tree.

mod placeholder;
mod scope;

pub use placeholder::placeholder;
pub use scope::{Var, VarId, VarMap, VarScope};

use crate::engine::evaluator::CompiledQuery;
use crate::engine::functions::StandardFunc;
use crate::engine::runtime::{Error, QueryContext, QueryFocus, QueryOptions};
use crate::expr::Expr;
use crate::types::SeqType;
use crate::xdm::{Item, Value};
use core::fmt;
use smallvec::{SmallVec, smallvec};

/// Printed form and static type of an expression, captured before the
/// expression is taken apart by a rewrite.
#[derive(Debug, Clone)]
pub struct Origin {
    text: String,
    description: String,
    seq_type: SeqType,
}

impl Origin {
    pub fn of(expr: &dyn Expr) -> Self {
        Self {
            text: expr.to_string(),
            description: expr.description(),
            seq_type: expr.seq_type(),
        }
    }

    pub fn seq_type(&self) -> SeqType {
        self.seq_type
    }
}

pub struct CompileContext<'a> {
    qc: &'a mut QueryContext,
    scopes: SmallVec<[VarScope; 4]>,
    focuses: SmallVec<[QueryFocus; 4]>,
}

impl<'a> CompileContext<'a> {
    pub fn new(qc: &'a mut QueryContext) -> Self {
        Self {
            qc,
            scopes: smallvec![VarScope::new()],
            focuses: SmallVec::new(),
        }
    }

    pub fn qc(&mut self) -> &mut QueryContext {
        &mut *self.qc
    }

    pub fn options(&self) -> &QueryOptions {
        self.qc.options()
    }

    /// Records a trace line. Each `%` in `msg` is replaced by the next
    /// extension argument, chopped to the configured length.
    pub fn info(&mut self, msg: &str, ext: &[&dyn fmt::Display]) {
        let max = self.qc.options().info_chop;
        let mut line = String::with_capacity(msg.len());
        let mut args = ext.iter();
        for c in msg.chars() {
            if c == '%'
                && let Some(arg) = args.next()
            {
                line.push_str(&chop(arg.to_string(), max));
            } else {
                line.push(c);
            }
        }
        tracing::debug!(target: "xquery::compile", "{line}");
        self.qc.log_info(line);
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(VarScope::new());
    }

    /// Pops the innermost scope.
    ///
    /// # Panics
    /// If no scope was pushed.
    pub fn remove_scope(&mut self) -> VarScope {
        if self.scopes.len() <= 1 {
            panic!("scope stack underflow");
        }
        self.scopes.pop().unwrap_or_default()
    }

    /// The innermost scope.
    pub fn vs(&mut self) -> &mut VarScope {
        match self.scopes.last_mut() {
            Some(vs) => vs,
            None => panic!("no variable scope"),
        }
    }

    /// Static type inferred for the binding of `id`, innermost scope first.
    pub fn var_type(&self, id: VarId) -> Option<SeqType> {
        self.scopes.iter().rev().find_map(|vs| vs.get(id)).and_then(|(_, st)| st)
    }

    /// Compile-time value of the binding of `id`, innermost scope first.
    pub fn var_value(&self, id: VarId) -> Option<Value> {
        self.scopes.iter().rev().find_map(|vs| vs.value(id)).cloned()
    }

    /// Installs `value` as the focus while a nested construct is compiled.
    pub fn push_focus(&mut self, value: Option<Value>) {
        let prev = self.qc.set_focus(QueryFocus::new(value));
        self.focuses.push(prev);
    }

    /// Restores the focus saved by the matching [`push_focus`](Self::push_focus).
    ///
    /// # Panics
    /// If no focus was pushed.
    pub fn pop_focus(&mut self) {
        let Some(prev) = self.focuses.pop() else {
            panic!("focus stack underflow");
        };
        self.qc.set_focus(prev);
    }

    pub fn with_focus<T>(&mut self, value: Option<Value>, f: impl FnOnce(&mut Self) -> T) -> T {
        self.push_focus(value);
        let out = f(self);
        self.pop_focus();
        out
    }

    /// Focus installed by the innermost [`push_focus`](Self::push_focus).
    pub fn top_focus(&self) -> Option<&QueryFocus> {
        (!self.focuses.is_empty()).then(|| self.qc.focus())
    }

    pub fn in_focus(&self) -> bool {
        !self.focuses.is_empty()
    }

    /// Fresh copy of `var`, declared in the current scope and recorded in `vm`.
    pub fn copy_var(&mut self, var: &Var, vm: &mut VarMap) -> Var {
        let copy = self.qc.new_var(&var.name, var.declared);
        self.vs().add(copy.clone());
        vm.insert(var.id, copy.clone());
        copy
    }

    /// Replaces `expr` by its computed value. An evaluation error is kept
    /// for runtime in a deferred error node.
    pub fn pre_eval(&mut self, expr: Box<dyn Expr>) -> Box<dyn Expr> {
        let origin = Origin::of(&*expr);
        match expr.value(self.qc) {
            Ok(value) => self.rewrite(origin, "pre-evaluate", Some(Box::new(value)), true),
            Err(err) => self.error(err, &*expr),
        }
    }

    /// Deferred error node standing in for `expr`.
    pub fn error(&mut self, err: Error, expr: &dyn Expr) -> Box<dyn Expr> {
        let err = err.at(expr.info());
        let node = StandardFunc::deferred(err, expr.seq_type(), expr.info().cloned());
        self.rewrite(Origin::of(expr), "pre-evaluate", Some(Box::new(node)), false)
    }

    pub fn empty_seq(&mut self, expr: &dyn Expr) -> Box<dyn Expr> {
        self.rewrite(Origin::of(expr), "simplify", None, false)
    }

    /// Replacement driven by a boolean context; the type is not refined.
    pub fn replace_ebv(&mut self, expr: &dyn Expr, result: Box<dyn Expr>) -> Box<dyn Expr> {
        self.rewrite(Origin::of(expr), "simplify", Some(result), false)
    }

    /// Replaces `expr` by `result`, or by the empty sequence, narrowing the
    /// type of the replacement to what was known about the original.
    pub fn replace_with(&mut self, expr: &dyn Expr, result: Option<Box<dyn Expr>>) -> Box<dyn Expr> {
        self.rewrite(Origin::of(expr), "simplify", result, true)
    }

    /// As [`replace_with`](Self::replace_with) for an expression that was
    /// already taken apart.
    pub fn replace(&mut self, origin: Origin, result: Option<Box<dyn Expr>>) -> Box<dyn Expr> {
        self.rewrite(origin, "simplify", result, true)
    }

    fn rewrite(
        &mut self,
        origin: Origin,
        verb: &str,
        result: Option<Box<dyn Expr>>,
        refine: bool,
    ) -> Box<dyn Expr> {
        let mut result = result.unwrap_or_else(|| Box::new(Value::Empty));
        let max = self.qc.options().info_chop;
        let to = result.to_string();
        if chop(origin.text.clone(), max) != chop(to.clone(), max) {
            tracing::debug!(target: "xquery::compile", from = %origin.text, to = %to, "{verb}");
            let msg = format!("{verb} %: % -> %");
            self.info(&msg, &[&origin.description, &origin.text, &to]);
        }
        if refine {
            refine_type(origin.seq_type, &mut *result);
        }
        result
    }

    /// Value the context would statically hold for `root`.
    pub fn context_value(&self, root: Option<&dyn Expr>) -> Option<Value> {
        let focus = self.qc.focus().value.clone();
        let Some(root) = root else { return focus };
        if root.is_context_value() {
            return focus;
        }
        if root.is_root() {
            return focus.map(|v| roots(&v).unwrap_or(v));
        }
        if let Some(v) = root.as_value() {
            return Some(v.clone());
        }
        placeholder(root.seq_type().ty, None, root.data()).map(Value::Item)
    }

    /// Single representative item of [`context_value`](Self::context_value).
    pub fn context_item(&self, root: Option<&dyn Expr>) -> Option<Item> {
        let value = self.context_value(root)?;
        match value {
            Value::Empty => None,
            Value::Item(item) => Some(item),
            v => {
                let data = root.and_then(|r| r.data());
                placeholder(v.ty(), Some(&v), data)
            }
        }
    }
}

/// Narrows the type of `result` to the intersection with `st` when `st` is
/// strictly more specific.
fn refine_type(st: SeqType, result: &mut dyn Expr) {
    if let Some(value) = result.as_value_mut() {
        let vt = value.seq_type();
        match value {
            Value::Item(item) if item.is_function() => {
                if let Some(is) = narrowed(st, vt) {
                    item.refine_type(is.ty);
                }
            }
            // sequences compare item types only; their occurrence is exact
            Value::Items(_) | Value::Tree(_) => {
                if st.ty != vt.ty
                    && st.ty.instance_of(vt.ty)
                    && let Some(ty) = st.ty.intersect(vt.ty)
                {
                    value.refine_type(ty);
                }
            }
            _ => {}
        }
        return;
    }
    let rt = result.seq_type();
    if let Some(is) = narrowed(st, rt)
        && let Some(et) = result.expr_type_mut()
    {
        et.assign(is);
    }
}

fn narrowed(st: SeqType, rt: SeqType) -> Option<SeqType> {
    if st == rt || !st.instance_of(&rt) {
        return None;
    }
    st.intersect(&rt).filter(|is| *is != rt)
}

fn roots(value: &Value) -> Option<Value> {
    let mut out: Vec<Item> = Vec::new();
    for item in value.iter() {
        let root = Item::Node(item.as_node()?.root());
        if !out.contains(&root) {
            out.push(root);
        }
    }
    Some(Value::from_items(out))
}

fn chop(s: String, max: usize) -> String {
    if s.chars().count() <= max {
        return s;
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Optimizes `root` and freezes it for evaluation.
pub fn compile(root: Box<dyn Expr>, qc: &mut QueryContext) -> Result<CompiledQuery, Error> {
    let mut cc = CompileContext::new(qc);
    let root = root.optimize(&mut cc)?;
    tracing::debug!(target: "xquery::compile", query = %root, "compiled");
    Ok(CompiledQuery::new(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_substitutes_and_chops() {
        let mut qc = crate::QueryContextBuilder::new()
            .with_options(crate::QueryOptionsBuilder::new().with_info_chop(8).build())
            .build();
        let mut cc = CompileContext::new(&mut qc);
        cc.info("rewrite %: %", &[&"list", &"abcdefghijkl"]);
        assert_eq!(qc.compile_info(), ["rewrite list: abcde..."]);
    }

    #[test]
    fn nested_focus_restores_outer() {
        let mut qc = crate::QueryContextBuilder::new().with_context_item(Item::integer(1)).build();
        let mut cc = CompileContext::new(&mut qc);
        assert!(!cc.in_focus());
        cc.push_focus(Some(Value::integer(2)));
        cc.push_focus(None);
        assert!(cc.top_focus().is_some_and(|f| f.value.is_none()));
        cc.pop_focus();
        assert_eq!(cc.context_item(None), Some(Item::integer(2)));
        cc.pop_focus();
        assert_eq!(cc.context_item(None), Some(Item::integer(1)));
    }

    #[test]
    fn narrowing_requires_strict_instance() {
        let int = SeqType::one(crate::Type::INTEGER);
        let any = SeqType::ITEM_ZM;
        assert_eq!(narrowed(int, any), Some(int));
        assert_eq!(narrowed(any, int), None);
        assert_eq!(narrowed(int, int), None);
    }
}
