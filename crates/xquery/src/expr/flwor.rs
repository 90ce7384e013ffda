//! Variable bindings: `let`, `for` and variable references.

use super::{Expr, Iter, ItemIter, List, ValueItems, update};
use crate::compiler::{CompileContext, Origin, Var, VarMap};
use crate::engine::runtime::{Error, ErrorCode, ErrorKind, InputInfo, QueryContext};
use crate::types::{ExprType, Occurrence, SeqType};
use crate::xdm::{Item, Value};
use core::fmt;

/// Checks a bound value against the declared type of its variable.
fn check_declared(var: &Var, value: &Value) -> Result<(), Error> {
    let Some(st) = var.declared else {
        return Ok(());
    };
    if !st.occ.check(value.size()) {
        return Err(Error::new(
            ErrorCode::XPTY0004,
            ErrorKind::Cardinality,
            format!("${}: {st} expected, {} found.", var.name, value.seq_type()),
        ));
    }
    match value.iter().find(|item| !item.ty().instance_of(st.ty)) {
        Some(item) => Err(Error::type_error(&item, st.ty)),
        None => Ok(()),
    }
}

/// Reference `$name` to a bound variable.
#[derive(Debug)]
pub struct VarRef {
    var: Var,
    ty: ExprType,
    info: Option<InputInfo>,
}

impl VarRef {
    pub fn new(var: Var) -> Self {
        let ty = var.declared.unwrap_or(SeqType::ITEM_ZM).into();
        Self { var, ty, info: None }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }

    pub fn var(&self) -> &Var {
        &self.var
    }
}

impl Expr for VarRef {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(ValueItems::boxed(&self.value(qc)?))
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        qc.var(&self.var).map_err(|e| e.at(self.info()))
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        Some(&mut self.ty)
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        if let Some(value) = cc.var_value(self.var.id) {
            return Ok(cc.replace_with(&*self, Some(Box::new(value))));
        }
        if let Some(st) = cc.var_type(self.var.id) {
            self.ty = st.into();
        }
        Ok(self)
    }

    fn copy(&self, _cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(VarRef {
            var: vm.get(&self.var.id).cloned().unwrap_or_else(|| self.var.clone()),
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn description(&self) -> String {
        "variable".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.var.name)
    }
}

/// `let $var := bind return ret`.
#[derive(Debug)]
pub struct Let {
    var: Var,
    bind: Box<dyn Expr>,
    ret: Box<dyn Expr>,
    info: Option<InputInfo>,
}

impl Let {
    pub fn new(var: Var, bind: Box<dyn Expr>, ret: Box<dyn Expr>) -> Self {
        Self {
            var,
            bind,
            ret,
            info: None,
        }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }

    fn bind(&self, qc: &mut QueryContext) -> Result<(), Error> {
        let value = self.bind.value(qc)?;
        check_declared(&self.var, &value).map_err(|e| e.at(self.info()))?;
        qc.set_var(&self.var, value);
        Ok(())
    }
}

impl Expr for Let {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        self.bind(qc)?;
        self.ret.iter(qc)
    }

    fn item(&self, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        self.bind(qc)?;
        self.ret.item(qc)
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        self.bind(qc)?;
        self.ret.value(qc)
    }

    fn expr_type(&self) -> ExprType {
        self.ret.expr_type()
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        let origin = Origin::of(&*self);
        self.bind = self.bind.optimize(cc)?;
        update::check_no_updates(&*self.bind, &self.description())?;

        cc.push_scope();
        cc.vs().add(self.var.clone());
        let known = self
            .bind
            .as_value()
            .filter(|v| check_declared(&self.var, v).is_ok())
            .cloned();
        match known {
            Some(value) => cc.vs().set_value(&self.var, value),
            None => {
                let st = self.bind.seq_type();
                let st = self.var.declared.and_then(|d| d.intersect(&st)).unwrap_or(st);
                cc.vs().set_type(&self.var, st);
            }
        }
        let ret = std::mem::replace(&mut self.ret, Box::new(Value::Empty)).optimize(cc);
        cc.remove_scope();
        self.ret = ret?;

        // the binding is a value and the body no longer depends on it
        if self.bind.as_value().is_some() && self.ret.as_value().is_some() {
            let Let { ret, .. } = *self;
            return Ok(cc.replace(origin, Some(ret)));
        }
        Ok(self)
    }

    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        let bind = self.bind.copy(cc, vm);
        let var = cc.copy_var(&self.var, vm);
        Box::new(Let {
            var,
            bind,
            ret: self.ret.copy(cc, vm),
            info: self.info.clone(),
        })
    }

    fn has_updates(&self) -> bool {
        self.bind.has_updates() || self.ret.has_updates()
    }

    fn description(&self) -> String {
        "let clause".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for Let {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "let ${} := {} return {}", self.var.name, self.bind, self.ret)
    }
}

/// `for $var in seq return ret`.
#[derive(Debug)]
pub struct For {
    var: Var,
    seq: Box<dyn Expr>,
    ret: Box<dyn Expr>,
    ty: ExprType,
    info: Option<InputInfo>,
}

impl For {
    pub fn new(var: Var, seq: Box<dyn Expr>, ret: Box<dyn Expr>) -> Self {
        let ty = for_type(&*seq, &*ret);
        Self {
            var,
            seq,
            ret,
            ty,
            info: None,
        }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Replaces the loop over a short literal sequence by one `let` per item.
    fn unroll(&self, value: &Value, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        let mut lets: Vec<Box<dyn Expr>> = Vec::with_capacity(value.size() as usize);
        for item in value.iter() {
            let mut vm = VarMap::new();
            let var = cc.copy_var(&self.var, &mut vm);
            let ret = self.ret.copy(cc, &mut vm);
            lets.push(Box::new(Let {
                var,
                bind: Box::new(Value::Item(item)),
                ret,
                info: self.info.clone(),
            }));
        }
        Box::new(List::new(lets)).optimize(cc)
    }
}

fn for_type(seq: &dyn Expr, ret: &dyn Expr) -> ExprType {
    let (ss, rs) = (seq.seq_type(), ret.seq_type());
    let occ = ss.occ.mul(rs.occ);
    if occ == Occurrence::Zero {
        return SeqType::EMPTY.into();
    }
    match seq.size().zip(ret.size()).and_then(|(a, b)| a.checked_mul(b)) {
        Some(n) => ExprType::sized(rs.ty, n),
        None => SeqType::new(rs.ty, occ).into(),
    }
}

struct ForIter<'a> {
    node: &'a For,
    seq: Iter<'a>,
    current: Option<Iter<'a>>,
}

impl ItemIter for ForIter<'_> {
    fn next(&mut self, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        loop {
            if let Some(iter) = &mut self.current
                && let Some(item) = iter.next(qc)?
            {
                return Ok(Some(item));
            }
            let Some(item) = self.seq.next(qc)? else {
                return Ok(None);
            };
            qc.check_stop()?;
            let value = Value::Item(item);
            check_declared(&self.node.var, &value).map_err(|e| e.at(self.node.info()))?;
            qc.set_var(&self.node.var, value);
            self.current = Some(self.node.ret.iter(qc)?);
        }
    }
}

impl Expr for For {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(Box::new(ForIter {
            node: self,
            seq: self.seq.iter(qc)?,
            current: None,
        }))
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        Some(&mut self.ty)
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        let origin = Origin::of(&*self);
        self.seq = self.seq.optimize(cc)?;
        update::check_no_updates(&*self.seq, &self.description())?;
        if self.seq.as_value().is_some_and(Value::is_empty) {
            return Ok(cc.replace(origin, None));
        }

        cc.push_scope();
        cc.vs().add(self.var.clone());
        let st = SeqType::one(self.seq.seq_type().ty);
        let st = self.var.declared.and_then(|d| d.intersect(&st)).unwrap_or(st);
        cc.vs().set_type(&self.var, st);
        let ret = std::mem::replace(&mut self.ret, Box::new(Value::Empty)).optimize(cc);
        cc.remove_scope();
        self.ret = ret?;
        self.ty = for_type(&*self.seq, &*self.ret);

        let limit = cc.options().unroll_limit;
        if let Some(value) = self.seq.as_value()
            && value.size() <= limit
        {
            let value = value.clone();
            let unrolled = self.unroll(&value, cc)?;
            return Ok(cc.replace(origin, Some(unrolled)));
        }
        Ok(self)
    }

    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        let seq = self.seq.copy(cc, vm);
        let var = cc.copy_var(&self.var, vm);
        Box::new(For {
            var,
            seq,
            ret: self.ret.copy(cc, vm),
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn has_updates(&self) -> bool {
        self.seq.has_updates() || self.ret.has_updates()
    }

    fn description(&self) -> String {
        "for clause".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for For {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "for ${} in {} return {}", self.var.name, self.seq, self.ret)
    }
}
