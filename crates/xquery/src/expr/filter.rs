use super::{Expr, Iter, ValueItems, update};
use crate::compiler::{CompileContext, Origin, VarMap};
use crate::engine::runtime::{Error, InputInfo, QueryContext, QueryFocus};
use crate::model::DataRef;
use crate::tree::TreeSeqBuilder;
use crate::types::{ExprType, Occurrence};
use crate::xdm::{Item, Value};
use core::fmt;

/// Filter expression `root[pred]...`.
#[derive(Debug)]
pub struct Filter {
    root: Box<dyn Expr>,
    preds: Vec<Box<dyn Expr>>,
    ty: ExprType,
    info: Option<InputInfo>,
}

enum Literal {
    Pass,
    Fail,
    Keep,
}

fn literal(pred: &dyn Expr) -> Literal {
    match pred.as_value() {
        Some(Value::Empty) => Literal::Fail,
        Some(Value::Item(Item::Atomic(a))) if !a.is_numeric() => match a.ebv() {
            Ok(true) => Literal::Pass,
            Ok(false) => Literal::Fail,
            Err(_) => Literal::Keep,
        },
        Some(Value::Item(Item::Node(_))) => Literal::Pass,
        _ => Literal::Keep,
    }
}

/// Position selected by a numeric literal predicate.
fn position(pred: &dyn Expr) -> Option<f64> {
    match pred.as_value() {
        Some(Value::Item(Item::Atomic(a))) if a.is_numeric() => a.as_f64(),
        _ => None,
    }
}

impl Filter {
    pub fn new(root: Box<dyn Expr>, preds: Vec<Box<dyn Expr>>) -> Self {
        let ty = filter_type(&*root, &preds);
        Self {
            root,
            preds,
            ty,
            info: None,
        }
    }

    pub fn with_info(mut self, info: InputInfo) -> Self {
        self.info = Some(info);
        self
    }

    fn apply(&self, mut value: Value, qc: &mut QueryContext) -> Result<Value, Error> {
        for pred in &self.preds {
            if let Some(pos) = position(&**pred) {
                value = match pos {
                    p if p.fract() == 0.0 && p >= 1.0 && p <= value.size() as f64 => {
                        Value::Item(value.item_at(p as u64 - 1))
                    }
                    _ => Value::Empty,
                };
                continue;
            }
            let size = value.size();
            let mut b = TreeSeqBuilder::new();
            for (i, item) in value.iter().enumerate() {
                qc.check_stop()?;
                qc.set_focus(QueryFocus {
                    value: Some(Value::Item(item.clone())),
                    pos: i as u64 + 1,
                    size,
                });
                if pred.test(qc)?.is_some() {
                    b.add(item);
                }
            }
            value = b.freeze();
        }
        Ok(value)
    }
}

fn filter_type(root: &dyn Expr, preds: &[Box<dyn Expr>]) -> ExprType {
    let st = root.seq_type();
    let occ = if st.is_zero() {
        Occurrence::Zero
    } else if st.is_zero_or_one() || preds.iter().any(|p| position(&**p).is_some()) {
        Occurrence::ZeroOrOne
    } else {
        Occurrence::ZeroOrMore
    };
    st.with_occ(occ).into()
}

impl Expr for Filter {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(ValueItems::boxed(&self.value(qc)?))
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        let value = self.root.value(qc)?;
        let saved = qc.focus().clone();
        let res = self.apply(value, qc);
        qc.set_focus(saved);
        res
    }

    fn expr_type(&self) -> ExprType {
        self.ty
    }

    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        Some(&mut self.ty)
    }

    fn optimize(mut self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        let origin = Origin::of(&*self);
        let desc = self.description();
        self.root = self.root.optimize(cc)?;
        update::check_no_updates(&*self.root, &desc)?;

        let focus = cc.context_item(Some(&*self.root)).map(Value::Item);
        let preds = std::mem::take(&mut self.preds);
        let preds = cc.with_focus(focus, |cc| {
            preds.into_iter().map(|p| p.optimize(cc)).collect::<Result<Vec<_>, _>>()
        })?;
        update::check_none_updates(&preds, &desc)?;

        let mut kept = Vec::with_capacity(preds.len());
        for pred in preds {
            match literal(&*pred) {
                Literal::Pass => {}
                Literal::Fail => return Ok(cc.replace(origin, None)),
                Literal::Keep => kept.push(pred),
            }
        }
        if self.root.as_value().is_some_and(Value::is_empty) {
            return Ok(cc.replace(origin, None));
        }
        if kept.is_empty() {
            let Filter { root, .. } = *self;
            return Ok(cc.replace(origin, Some(root)));
        }
        self.preds = kept;
        self.ty = filter_type(&*self.root, &self.preds);

        let max = cc.options().max_preeval;
        if self.root.as_value().is_some_and(|v| v.size() <= max)
            && self.preds.iter().all(|p| p.as_value().is_some())
        {
            return Ok(cc.pre_eval(self));
        }
        Ok(self)
    }

    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(Filter {
            root: self.root.copy(cc, vm),
            preds: self.preds.iter().map(|p| p.copy(cc, vm)).collect(),
            ty: self.ty,
            info: self.info.clone(),
        })
    }

    fn description(&self) -> String {
        "filter".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        self.info.as_ref()
    }

    fn data(&self) -> Option<DataRef> {
        self.root.data()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for pred in &self.preds {
            write!(f, "[{pred}]")?;
        }
        Ok(())
    }
}
