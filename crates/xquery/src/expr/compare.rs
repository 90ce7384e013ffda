use super::{Expr, Iter, ValueItems, update};
use crate::compiler::{CompileContext, Origin, VarMap};
use crate::engine::runtime::{Error, InputInfo, QueryContext};
use crate::types::{ExprType, SeqType, Type};
use crate::xdm::{Item, Value};
use core::cmp::Ordering;
use core::fmt;

/// Value comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Whether the ordering of two operands satisfies this operator.
    /// Unordered operands only satisfy `ne`.
    pub fn matches(self, ord: Option<Ordering>) -> bool {
        match ord {
            None => self == CmpOp::Ne,
            Some(o) => match self {
                CmpOp::Eq => o.is_eq(),
                CmpOp::Ne => o.is_ne(),
                CmpOp::Lt => o.is_lt(),
                CmpOp::Le => o.is_le(),
                CmpOp::Gt => o.is_gt(),
                CmpOp::Ge => o.is_ge(),
            },
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
        })
    }
}

/// Value comparison `a eq b`.
#[derive(Debug)]
pub struct Compare {
    op: CmpOp,
    a: Box<dyn Expr>,
    b: Box<dyn Expr>,
    ty: ExprType,
    info: Option<InputInfo>,
}

impl Compare {
    pub fn new(op: CmpOp, a: Box<dyn Expr>, b: Box<dyn Expr>) -> Self {
        let ty = compare_type(&*a, &*b);
        Self {
            op,
            a,
            b,
            ty,
            info: None,
        }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }
}

fn compare_type(a: &dyn Expr, b: &dyn Expr) -> ExprType {
    if a.seq_type().is_one() && b.seq_type().is_one() {
        SeqType::BOOLEAN_O.into()
    } else {
        SeqType::zero_or_one(Type::BOOLEAN).into()
    }
}

impl Expr for Compare {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        let item = self.item(qc)?;
        Ok(ValueItems::boxed(&item.map_or(Value::Empty, Value::Item)))
    }

    fn item(&self, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        let Some(x) = self.a.atom_item(qc)? else {
            return Ok(None);
        };
        let Some(y) = self.b.atom_item(qc)? else {
            return Ok(None);
        };
        let ord = x.compare(&y).map_err(|e| e.at(self.info()))?;
        Ok(Some(Item::from_bool(self.op.matches(ord))))
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        Some(&mut self.ty)
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        self.a = self.a.optimize(cc)?;
        self.b = self.b.optimize(cc)?;
        let desc = self.description();
        update::check_no_updates(&*self.a, &desc)?;
        update::check_no_updates(&*self.b, &desc)?;
        self.ty = compare_type(&*self.a, &*self.b);

        let empty = |e: &dyn Expr| e.as_value().is_some_and(Value::is_empty);
        if empty(&*self.a) || empty(&*self.b) {
            return Ok(cc.replace(Origin::of(&*self), None));
        }
        if self.a.as_value().is_some() && self.b.as_value().is_some() {
            return Ok(cc.pre_eval(self));
        }
        Ok(self)
    }

    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(Compare {
            op: self.op,
            a: self.a.copy(cc, vm),
            b: self.b.copy(cc, vm),
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn description(&self) -> String {
        format!("'{}' comparison", self.op)
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for Compare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.a, self.op, self.b)
    }
}
