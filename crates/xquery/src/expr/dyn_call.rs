use super::{Expr, Iter, ValueItems, coerce, update};
use crate::compiler::{CompileContext, VarMap};
use crate::engine::runtime::{Error, InputInfo, QueryContext};
use crate::types::{ExprType, SeqType};
use crate::xdm::{Item, Value};
use core::fmt;

/// Dynamic function call `f(args...)` on a function, map or array item.
#[derive(Debug)]
pub struct DynFuncCall {
    func: Box<dyn Expr>,
    args: Vec<Box<dyn Expr>>,
    ty: ExprType,
    info: Option<InputInfo>,
}

impl DynFuncCall {
    pub fn new(func: Box<dyn Expr>, args: Vec<Box<dyn Expr>>) -> Self {
        Self {
            func,
            args,
            ty: SeqType::ITEM_ZM.into(),
            info: None,
        }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }
}

impl Expr for DynFuncCall {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(ValueItems::boxed(&self.value(qc)?))
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        let func = coerce::to_func(&*self.func, qc)?;
        let args = self
            .args
            .iter()
            .map(|a| a.value(qc))
            .collect::<Result<Vec<_>, _>>()?;
        func.invoke(&args, qc).map_err(|e| e.at(self.info()))
    }

    fn item(&self, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        let value = self.value(qc)?;
        match value.size() {
            0 => Ok(None),
            1 => Ok(value.first()),
            n => Err(Error::seq_found(&value.item_at(0), &value.item_at(1), n > 2).at(self.info())),
        }
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        Some(&mut self.ty)
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        self.func = self.func.optimize(cc)?;
        self.args = std::mem::take(&mut self.args)
            .into_iter()
            .map(|a| a.optimize(cc))
            .collect::<Result<_, _>>()?;
        let desc = self.description();
        update::check_no_updates(&*self.func, &desc)?;
        update::check_none_updates(&self.args, &desc)?;
        Ok(self)
    }

    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(DynFuncCall {
            func: self.func.copy(cc, vm),
            args: self.args.iter().map(|a| a.copy(cc, vm)).collect(),
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn description(&self) -> String {
        "dynamic function call".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for DynFuncCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.func)?;
        super::write_joined(f, &self.args, ", ")?;
        f.write_str(")")
    }
}
