use super::{Expr, Iter, ValueItems, update};
use crate::compiler::{CompileContext, Origin, VarMap};
use crate::engine::numeric::Calc;
use crate::engine::runtime::{Error, InputInfo, QueryContext};
use crate::types::{ExprType, SeqType, Type};
use crate::xdm::{Item, Value};
use core::fmt;

/// Arithmetic expression `a op b`.
#[derive(Debug)]
pub struct Arith {
    calc: Calc,
    a: Box<dyn Expr>,
    b: Box<dyn Expr>,
    ty: ExprType,
    info: Option<InputInfo>,
}

impl Arith {
    pub fn new(calc: Calc, a: Box<dyn Expr>, b: Box<dyn Expr>) -> Self {
        let ty = arith_type(calc, &*a, &*b);
        Self {
            calc,
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

fn arith_type(calc: Calc, a: &dyn Expr, b: &dyn Expr) -> ExprType {
    let (sa, sb) = (a.seq_type(), b.seq_type());
    let atomic = |st: SeqType| if st.ty.is_atomic() { st.ty } else { Type::ANY_ATOMIC };
    let ty = calc.result_type(atomic(sa), atomic(sb));
    // untyped operands and nodes are cast to double
    let ty = if sa.ty.is_untyped() || sb.ty.is_untyped() { Type::ANY_ATOMIC } else { ty };
    if sa.is_one() && sb.is_one() {
        SeqType::one(ty).into()
    } else {
        SeqType::zero_or_one(ty).into()
    }
}

impl Expr for Arith {
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
        let res = self.calc.eval(&x, &y).map_err(|e| e.at(self.info()))?;
        Ok(Some(Item::Atomic(res)))
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
        self.ty = arith_type(self.calc, &*self.a, &*self.b);

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
        Box::new(Arith {
            calc: self.calc,
            a: self.a.copy(cc, vm),
            b: self.b.copy(cc, vm),
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn description(&self) -> String {
        format!("'{}' operator", self.calc)
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for Arith {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.a, self.calc, self.b)
    }
}
