//! Built-in functions with compile-time rewrites.
//!
//! Each call is a [`StandardFunc`] node. Calls whose arguments are all
//! literal values are pre-evaluated, except `fn:error`.

mod aggregates;
mod diagnostics;
mod hof;
mod sequences;

use crate::compiler::{CompileContext, VarMap};
use crate::consts::{FNS, HOF_NS};
use crate::engine::runtime::{Error, ErrorCode, InputInfo, QueryContext};
use crate::expr::{Expr, Iter, ValueItems, update};
use crate::types::{ExprType, Occurrence, SeqType, Type};
use crate::xdm::{ExpandedName, Item, Value};
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Head,
    Count,
    Sum,
    Avg,
    Reverse,
    Error,
    FoldLeft1,
    SortWith,
}

const ALL: [Function; 8] = [
    Function::Head,
    Function::Count,
    Function::Sum,
    Function::Avg,
    Function::Reverse,
    Function::Error,
    Function::FoldLeft1,
    Function::SortWith,
];

impl Function {
    pub fn local(self) -> &'static str {
        match self {
            Function::Head => "head",
            Function::Count => "count",
            Function::Sum => "sum",
            Function::Avg => "avg",
            Function::Reverse => "reverse",
            Function::Error => "error",
            Function::FoldLeft1 => "fold-left1",
            Function::SortWith => "sort-with",
        }
    }

    fn namespace(self) -> &'static str {
        match self {
            Function::FoldLeft1 | Function::SortWith => HOF_NS,
            _ => FNS,
        }
    }

    pub fn name(self) -> ExpandedName {
        ExpandedName::new(Some(self.namespace().to_string()), self.local())
    }

    /// Minimum and maximum number of arguments.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Function::Head | Function::Count | Function::Avg | Function::Reverse => (1, 1),
            Function::Sum => (1, 2),
            Function::Error => (0, 3),
            Function::FoldLeft1 | Function::SortWith => (2, 2),
        }
    }

    pub fn lookup(name: &ExpandedName, arity: usize) -> Option<Function> {
        ALL.into_iter().find(|f| {
            let (min, max) = f.arity();
            f.local() == name.local
                && name.ns_uri.as_deref() == Some(f.namespace())
                && (min..=max).contains(&arity)
        })
    }

    fn result_type(self, args: &[Box<dyn Expr>]) -> ExprType {
        let arg = |i: usize| args.get(i).map_or(SeqType::ITEM_ZM, |a| a.seq_type());
        match self {
            Function::Head => {
                let st = arg(0);
                match st.occ {
                    Occurrence::Zero => SeqType::EMPTY,
                    o if o.min() > 0 => SeqType::one(st.ty),
                    _ => SeqType::zero_or_one(st.ty),
                }
                .into()
            }
            Function::Count => SeqType::INTEGER_O.into(),
            Function::Sum | Function::Avg => {
                let ty = match arg(0).ty {
                    t if t.is_untyped() => Type::DOUBLE,
                    t if t.is_number() && self == Function::Avg && t.instance_of(Type::INTEGER) => {
                        Type::DECIMAL
                    }
                    t if t.is_atomic() => t,
                    _ => Type::ANY_ATOMIC,
                };
                if self == Function::Sum && args.len() == 1 {
                    SeqType::one(ty).into()
                } else {
                    SeqType::zero_or_one(ty).into()
                }
            }
            Function::Reverse | Function::SortWith => args
                .first()
                .map_or(SeqType::ITEM_ZM.into(), |a| a.expr_type()),
            Function::Error | Function::FoldLeft1 => SeqType::ITEM_ZM.into(),
        }
    }
}

/// Call of a built-in function.
#[derive(Debug)]
pub struct StandardFunc {
    func: Function,
    args: Vec<Box<dyn Expr>>,
    ty: ExprType,
    info: Option<InputInfo>,
    /// Error raised while pre-evaluating the expression this call replaced.
    deferred: Option<Error>,
}

impl StandardFunc {
    pub fn new(func: Function, args: Vec<Box<dyn Expr>>) -> Result<Self, Error> {
        let (min, max) = func.arity();
        if !(min..=max).contains(&args.len()) {
            return Err(Error::from_code(
                ErrorCode::XPST0017,
                format!("{}() expects {min} to {max} arguments, {} supplied.", func.local(), args.len()),
            ));
        }
        Ok(Self {
            ty: func.result_type(&args),
            func,
            args,
            info: None,
            deferred: None,
        })
    }

    /// `fn:error` node raising `err` with the static type of the
    /// expression it stands for.
    pub(crate) fn deferred(err: Error, st: SeqType, info: Option<InputInfo>) -> Self {
        Self {
            func: Function::Error,
            args: Vec::new(),
            ty: st.into(),
            info,
            deferred: Some(err),
        }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }

    pub fn func(&self) -> Function {
        self.func
    }

    pub(crate) fn arg(&self, i: usize) -> &dyn Expr {
        &*self.args[i]
    }

    fn single(&self, value: Value) -> Result<Option<Item>, Error> {
        match value.size() {
            0 => Ok(None),
            1 => Ok(value.first()),
            n => Err(Error::seq_found(&value.item_at(0), &value.item_at(1), n > 2).at(self.info())),
        }
    }
}

impl Expr for StandardFunc {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(ValueItems::boxed(&self.value(qc)?))
    }

    fn item(&self, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        match self.func {
            Function::Head => sequences::head_fn(self, qc),
            Function::Count => sequences::count_fn(self, qc).map(Some),
            Function::Sum => aggregates::sum_fn(self, qc),
            Function::Avg => aggregates::avg_fn(self, qc),
            Function::Error => Err(diagnostics::error_fn(self, qc)?),
            _ => {
                let value = self.value(qc)?;
                self.single(value)
            }
        }
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        match self.func {
            Function::Reverse => sequences::reverse_fn(self, qc),
            Function::FoldLeft1 => hof::fold_left1_fn(self, qc),
            Function::SortWith => hof::sort_with_fn(self, qc),
            _ => Ok(self.item(qc)?.map_or(Value::Empty, Value::Item)),
        }
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        Some(&mut self.ty)
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        if self.deferred.is_some() {
            return Ok(self);
        }
        self.args = std::mem::take(&mut self.args)
            .into_iter()
            .map(|a| a.optimize(cc))
            .collect::<Result<_, _>>()?;
        update::check_none_updates(&self.args, &self.description())?;
        self.ty = self.func.result_type(&self.args);

        let max = cc.options().max_preeval;
        let values = self.args.iter().map(|a| a.as_value()).collect::<Option<Vec<_>>>();
        if self.func != Function::Error
            && values.is_some_and(|vs| vs.iter().map(|v| v.size()).sum::<u64>() <= max)
        {
            return Ok(cc.pre_eval(self));
        }
        match self.func {
            Function::Head => sequences::optimize_head(self, cc),
            Function::Count => sequences::optimize_count(self, cc),
            Function::FoldLeft1 => hof::optimize_fold_left1(self, cc),
            _ => Ok(self),
        }
    }

    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(StandardFunc {
            func: self.func,
            args: self.args.iter().map(|a| a.copy(cc, vm)).collect(),
            ty: self.ty,
            info: self.info.clone(),
            deferred: self.deferred.clone(),
        })
    }

    fn is_vacuous(&self) -> bool {
        self.func == Function::Error
    }

    fn description(&self) -> String {
        format!("{}()", self.func.local())
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }
}

impl fmt::Display for StandardFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.deferred {
            return write!(f, "error({}, \"{}\")", err.format_code(), err.message);
        }
        if self.func.namespace() == HOF_NS {
            f.write_str("hof:")?;
        }
        write!(f, "{}(", self.func.local())?;
        crate::expr::write_joined(f, &self.args, ", ")?;
        f.write_str(")")
    }
}
