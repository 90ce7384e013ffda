use super::{Expr, Iter, ValueItems, update};
use crate::compiler::{CompileContext, VarMap};
use crate::engine::runtime::{Error, InputInfo, PendingUpdate, QueryContext};
use crate::types::{ExprType, SeqType, Type};
use crate::xdm::{Item, Value};
use core::fmt;

/// Updating expression `delete nodes target`. Each target node is recorded
/// as a pending update; the result is empty.
#[derive(Debug)]
pub struct DeleteNodes {
    target: Box<dyn Expr>,
    info: Option<InputInfo>,
}

impl DeleteNodes {
    pub fn new(target: Box<dyn Expr>) -> Self {
        Self { target, info: None }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }
}

impl Expr for DeleteNodes {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(ValueItems::boxed(&self.value(qc)?))
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        let mut iter = self.target.iter(qc)?;
        while let Some(item) = iter.next(qc)? {
            qc.check_stop()?;
            match item {
                Item::Node(node) => qc.add_update(PendingUpdate::Delete(node)),
                other => return Err(Error::type_error(&other, Type::NODE).at(self.info())),
            }
        }
        Ok(Value::Empty)
    }

    fn expr_type(&self) -> ExprType {
        SeqType::EMPTY.into()
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        self.target = self.target.optimize(cc)?;
        update::check_no_updates(&*self.target, &self.description())?;
        Ok(self)
    }

    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(DeleteNodes {
            target: self.target.copy(cc, vm),
            info: self.info.clone(),
        })
    }

    fn has_updates(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        "delete".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for DeleteNodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delete nodes {}", self.target)
    }
}
