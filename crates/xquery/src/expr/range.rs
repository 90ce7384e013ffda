use super::{Expr, Iter, ValueItems, coerce, update};
use crate::compiler::{CompileContext, VarMap};
use crate::engine::runtime::{Error, InputInfo, QueryContext};
use crate::types::{ExprType, SeqType, Type};
use crate::xdm::Value;
use core::fmt;

/// Integer range `min to max`.
#[derive(Debug)]
pub struct Range {
    min: Box<dyn Expr>,
    max: Box<dyn Expr>,
    ty: ExprType,
    info: Option<InputInfo>,
}

impl Range {
    pub fn new(min: Box<dyn Expr>, max: Box<dyn Expr>) -> Self {
        Self {
            min,
            max,
            ty: SeqType::zero_or_more(Type::INTEGER).into(),
            info: None,
        }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }
}

impl Expr for Range {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(ValueItems::boxed(&self.value(qc)?))
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        let Some(min) = coerce::to_long_opt(&*self.min, qc)? else {
            return Ok(Value::Empty);
        };
        let Some(max) = coerce::to_long_opt(&*self.max, qc)? else {
            return Ok(Value::Empty);
        };
        Value::try_range(min, max).map_err(|err| err.at(self.info.as_ref()))
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        Some(&mut self.ty)
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        self.min = self.min.optimize(cc)?;
        self.max = self.max.optimize(cc)?;
        update::check_no_updates(&*self.min, "range")?;
        update::check_no_updates(&*self.max, "range")?;
        if self.min.as_value().is_some() && self.max.as_value().is_some() {
            // ranges are materialised lazily, so their size is irrelevant
            return Ok(cc.pre_eval(self));
        }
        Ok(self)
    }

    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(Range {
            min: self.min.copy(cc, vm),
            max: self.max.copy(cc, vm),
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn description(&self) -> String {
        "range".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} to {})", self.min, self.max)
    }
}
