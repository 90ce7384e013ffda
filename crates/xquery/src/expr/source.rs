use super::{Expr, Iter, ValueItems};
use crate::compiler::{CompileContext, VarMap};
use crate::engine::runtime::{Error, InputInfo, QueryContext};
use crate::model::DataRef;
use crate::types::{ExprType, SeqType, Type};
use crate::xdm::{Item, Value};
use core::fmt;

/// Documents of a data source.
#[derive(Debug)]
pub struct DocSource {
    data: DataRef,
    info: Option<InputInfo>,
}

impl DocSource {
    pub fn new(data: DataRef) -> Self {
        Self { data, info: None }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }
}

impl Expr for DocSource {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(ValueItems::boxed(&self.value(qc)?))
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        qc.check_stop()?;
        Ok(self.data.documents().into_iter().map(Item::Node).collect())
    }

    fn expr_type(&self) -> ExprType {
        SeqType::zero_or_more(Type::DOCUMENT).into()
    }

    fn optimize(self: Box<Self>, _cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        Ok(self)
    }

    fn copy(&self, _cc: &mut CompileContext<'_>, _vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(DocSource {
            data: self.data.clone(),
            info: self.info.clone(),
        })
    }

    fn data(&self) -> Option<DataRef> {
        Some(self.data.clone())
    }

    fn description(&self) -> String {
        "data source".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for DocSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "db:get(\"{}\")", self.data.name())
    }
}
