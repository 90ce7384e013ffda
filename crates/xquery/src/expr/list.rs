use super::{Expr, Iter, ItemIter, concat_type, update, write_joined};
use crate::compiler::{CompileContext, Origin, VarMap};
use crate::engine::runtime::{Error, InputInfo, QueryContext};
use crate::tree::TreeSeqBuilder;
use crate::types::ExprType;
use crate::xdm::{Item, Value};
use core::fmt;

/// Sequence constructor `(a, b, ...)`.
#[derive(Debug)]
pub struct List {
    ops: Vec<Box<dyn Expr>>,
    ty: ExprType,
    info: Option<InputInfo>,
}

impl List {
    pub fn new(ops: Vec<Box<dyn Expr>>) -> Self {
        let ty = concat_type(&ops);
        Self { ops, ty, info: None }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }

    pub fn ops(&self) -> &[Box<dyn Expr>] {
        &self.ops
    }
}

struct ListIter<'a> {
    ops: &'a [Box<dyn Expr>],
    next: usize,
    current: Option<Iter<'a>>,
}

impl ItemIter for ListIter<'_> {
    fn next(&mut self, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        loop {
            if let Some(iter) = &mut self.current
                && let Some(item) = iter.next(qc)?
            {
                return Ok(Some(item));
            }
            let Some(op) = self.ops.get(self.next) else {
                return Ok(None);
            };
            self.next += 1;
            self.current = Some(op.iter(qc)?);
        }
    }
}

impl Expr for List {
    fn iter<'a>(&'a self, _qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(Box::new(ListIter {
            ops: &self.ops,
            next: 0,
            current: None,
        }))
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        let mut b = TreeSeqBuilder::new();
        for op in &self.ops {
            qc.check_stop()?;
            b.add_value(&op.value(qc)?);
        }
        Ok(b.freeze())
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        Some(&mut self.ty)
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        let origin = Origin::of(&*self);
        let mut ops = Vec::with_capacity(self.ops.len());
        for op in std::mem::take(&mut self.ops) {
            let op = op.optimize(cc)?;
            if !op.as_value().is_some_and(Value::is_empty) {
                ops.push(op);
            }
        }
        update::check_all_updates(&ops, &self.description())?;
        self.ops = ops;
        self.ty = concat_type(&self.ops);

        match self.ops.len() {
            0 => return Ok(cc.replace(origin, None)),
            1 => return Ok(cc.replace(origin, self.ops.pop())),
            _ => {}
        }
        let max = cc.options().max_preeval;
        if self.ops.iter().all(|op| op.as_value().is_some()) && self.size().is_some_and(|n| n <= max) {
            return Ok(cc.pre_eval(self));
        }
        Ok(self)
    }

    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(List {
            ops: self.ops.iter().map(|op| op.copy(cc, vm)).collect(),
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn has_updates(&self) -> bool {
        self.ops.iter().any(|op| op.has_updates())
    }

    fn description(&self) -> String {
        "list".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }

    fn as_list(&self) -> Option<&[Box<dyn Expr>]> {
        Some(&self.ops)
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        write_joined(f, &self.ops, ", ")?;
        f.write_str(")")
    }
}
