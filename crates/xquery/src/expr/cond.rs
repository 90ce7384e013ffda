use super::{Expr, Iter, update};
use crate::compiler::{CompileContext, Origin, VarMap};
use crate::engine::runtime::{Error, InputInfo, QueryContext};
use crate::types::ExprType;
use crate::xdm::{Item, Value};
use core::fmt;

/// Conditional `if (cond) then a else b`.
#[derive(Debug)]
pub struct If {
    cond: Box<dyn Expr>,
    then: Box<dyn Expr>,
    els: Box<dyn Expr>,
    ty: ExprType,
    info: Option<InputInfo>,
}

impl If {
    pub fn new(cond: Box<dyn Expr>, then: Box<dyn Expr>, els: Box<dyn Expr>) -> Self {
        let ty = branch_type(&*then, &*els);
        Self {
            cond,
            then,
            els,
            ty,
            info: None,
        }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }

    fn branch(&self, qc: &mut QueryContext) -> Result<&dyn Expr, Error> {
        Ok(if self.cond.boolean(qc)? { &*self.then } else { &*self.els })
    }
}

fn branch_type(then: &dyn Expr, els: &dyn Expr) -> ExprType {
    let st = then.seq_type().union(&els.seq_type());
    match (then.size(), els.size()) {
        (Some(a), Some(b)) if a == b => ExprType::sized(st.ty, a),
        _ => ExprType::new(st),
    }
}

impl Expr for If {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        self.branch(qc)?.iter(qc)
    }

    fn item(&self, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        self.branch(qc)?.item(qc)
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        self.branch(qc)?.value(qc)
    }

    fn ebv(&self, qc: &mut QueryContext) -> Result<Item, Error> {
        self.branch(qc)?.ebv(qc)
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        Some(&mut self.ty)
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        self.cond = self.cond.optimize(cc)?;
        update::check_no_updates(&*self.cond, &self.description())?;
        self.then = self.then.optimize(cc)?;
        self.els = self.els.optimize(cc)?;
        update::check_all_updates([&self.then, &self.els], &self.description())?;
        self.ty = branch_type(&*self.then, &*self.els);

        if self.cond.as_value().is_some() {
            let origin = Origin::of(&*self);
            // an invalid condition is reported when the branch is chosen at runtime
            if let Ok(b) = self.cond.boolean(cc.qc()) {
                let If { then, els, .. } = *self;
                return Ok(cc.replace(origin, Some(if b { then } else { els })));
            }
        }
        Ok(self)
    }

    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(If {
            cond: self.cond.copy(cc, vm),
            then: self.then.copy(cc, vm),
            els: self.els.copy(cc, vm),
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn has_updates(&self) -> bool {
        self.then.has_updates() || self.els.has_updates()
    }

    fn description(&self) -> String {
        "conditional".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for If {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if ({}) then {} else {}", self.cond, self.then, self.els)
    }
}
