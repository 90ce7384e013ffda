//! The evaluation protocol and the expression nodes implementing it.
//!
//! Every node supports four access modes with consistent results:
//! lazy iteration ([`Expr::iter`]), single-item access ([`Expr::item`]),
//! materialisation ([`Expr::value`]) and the effective boolean value
//! ([`Expr::ebv`]). Default implementations derive the latter three from
//! iteration; nodes override them where a cheaper path exists.

pub mod arith;
pub mod coerce;
pub mod compare;
pub mod cond;
pub mod context;
pub mod delete;
pub mod dyn_call;
pub mod filter;
pub mod flwor;
pub mod list;
pub mod range;
pub mod source;
pub mod update;

pub use arith::Arith;
pub use compare::{CmpOp, Compare};
pub use cond::If;
pub use context::{ContextValue, Root};
pub use delete::DeleteNodes;
pub use dyn_call::DynFuncCall;
pub use filter::Filter;
pub use flwor::{For, Let, VarRef};
pub use list::List;
pub use range::Range;
pub use source::DocSource;

use crate::compiler::{CompileContext, VarMap};
use crate::engine::runtime::{Error, InputInfo, QueryContext};
use crate::model::DataRef;
use crate::tree::TreeSeqBuilder;
use crate::types::{ExprType, SeqType};
use crate::xdm::{AtomicValue, Item, Value, ValueIter};
use core::fmt;

/// Lazy, forward-only item stream.
pub trait ItemIter {
    fn next(&mut self, qc: &mut QueryContext) -> Result<Option<Item>, Error>;

    /// Number of remaining items, if cheaply known.
    fn size(&self) -> Option<u64> {
        None
    }
}

pub type Iter<'a> = Box<dyn ItemIter + 'a>;

/// Item stream over a materialised value.
pub struct ValueItems(ValueIter);

impl ValueItems {
    pub fn boxed(value: &Value) -> Iter<'static> {
        Box::new(ValueItems(value.iter()))
    }
}

impl ItemIter for ValueItems {
    fn next(&mut self, _qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        Ok(self.0.next())
    }

    fn size(&self) -> Option<u64> {
        Some(self.0.remaining())
    }
}

pub trait Expr: fmt::Display + fmt::Debug + Send + Sync {
    fn iter<'a>(&'a self, qc: &mut QueryContext) -> Result<Iter<'a>, Error>;

    /// Static type and, when known, exact result size.
    fn expr_type(&self) -> ExprType;

    fn optimize(self: Box<Self>, cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error>;

    /// Deep copy; variables declared inside are given fresh identities
    /// recorded in `vm`.
    fn copy(&self, cc: &mut CompileContext<'_>, vm: &mut VarMap) -> Box<dyn Expr>;

    /// Zero or one item; a second item raises a cardinality error.
    fn item(&self, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        let mut iter = self.iter(qc)?;
        let Some(first) = iter.next(qc)? else {
            return Ok(None);
        };
        match iter.next(qc)? {
            None => Ok(Some(first)),
            Some(second) => {
                let more = iter.next(qc)?.is_some();
                Err(Error::seq_found(&first, &second, more).at(self.info()))
            }
        }
    }

    fn value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        if self.seq_type().is_zero_or_one() {
            return Ok(self.item(qc)?.map_or(Value::Empty, Value::Item));
        }
        let mut iter = self.iter(qc)?;
        let mut b = TreeSeqBuilder::new();
        while let Some(item) = iter.next(qc)? {
            qc.check_stop()?;
            b.add(item);
        }
        Ok(b.freeze())
    }

    /// Item whose boolean value is the effective boolean value of this expression.
    fn ebv(&self, qc: &mut QueryContext) -> Result<Item, Error> {
        let item = if self.seq_type().is_zero_or_one() {
            self.item(qc)?
        } else {
            let mut iter = self.iter(qc)?;
            match iter.next(qc)? {
                Some(first) if first.is_node() => return Ok(first),
                Some(first) => {
                    if let Some(second) = iter.next(qc)? {
                        let more = iter.next(qc)?.is_some();
                        return Err(Error::ebv(&first, &second, more).at(self.info()));
                    }
                    Some(first)
                }
                None => None,
            }
        };
        Ok(item.unwrap_or(Item::from_bool(false)))
    }

    /// Effective boolean value.
    fn boolean(&self, qc: &mut QueryContext) -> Result<bool, Error> {
        self.ebv(qc)?.boolean().map_err(|e| e.at(self.info()))
    }

    /// Positional test: a number matches the focus position, anything else
    /// is converted to a boolean.
    fn test(&self, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        let item = self.ebv(qc)?;
        let pass = match &item {
            Item::Atomic(a) if a.is_numeric() => a.as_f64() == Some(qc.focus().pos as f64),
            _ => item.boolean().map_err(|e| e.at(self.info()))?,
        };
        Ok(pass.then_some(item))
    }

    fn atom_item(&self, qc: &mut QueryContext) -> Result<Option<AtomicValue>, Error> {
        let Some(item) = self.item(qc)? else {
            return Ok(None);
        };
        let mut atoms = Vec::with_capacity(1);
        item.atomize(&mut atoms).map_err(|e| e.at(self.info()))?;
        match atoms.len() {
            0 | 1 => Ok(atoms.pop()),
            n => Err(Error::seq_found(
                &Item::Atomic(atoms[0].clone()),
                &Item::Atomic(atoms[1].clone()),
                n > 2,
            )
            .at(self.info())),
        }
    }

    fn atom_value(&self, qc: &mut QueryContext) -> Result<Value, Error> {
        self.value(qc)?.atom_value().map_err(|e| e.at(self.info()))
    }

    fn seq_type(&self) -> SeqType {
        self.expr_type().seq_type()
    }

    fn size(&self) -> Option<u64> {
        self.expr_type().size()
    }

    /// Mutable access to the static type, for refinement by the compiler.
    fn expr_type_mut(&mut self) -> Option<&mut ExprType> {
        None
    }

    fn has_updates(&self) -> bool {
        false
    }

    /// Whether the expression yields nothing and has no side effects.
    fn is_vacuous(&self) -> bool {
        self.size() == Some(0) && !self.has_updates()
    }

    /// Data source the result statically stems from.
    fn data(&self) -> Option<DataRef> {
        None
    }

    fn description(&self) -> String {
        "expression".into()
    }

    fn info(&self) -> Option<&InputInfo> {
        None
    }

    fn as_value(&self) -> Option<&Value> {
        None
    }

    fn as_value_mut(&mut self) -> Option<&mut Value> {
        None
    }

    /// Operands of a sequence constructor.
    fn as_list(&self) -> Option<&[Box<dyn Expr>]> {
        None
    }

    fn is_context_value(&self) -> bool {
        false
    }

    fn is_root(&self) -> bool {
        false
    }
}

impl Expr for Value {
    fn iter<'a>(&'a self, _qc: &mut QueryContext) -> Result<Iter<'a>, Error> {
        Ok(ValueItems::boxed(self))
    }

    fn expr_type(&self) -> ExprType {
        ExprType::sized(self.ty(), self.size())
    }

    fn optimize(self: Box<Self>, _cc: &mut CompileContext<'_>) -> Result<Box<dyn Expr>, Error> {
        Ok(self)
    }

    fn copy(&self, _cc: &mut CompileContext<'_>, _vm: &mut VarMap) -> Box<dyn Expr> {
        Box::new(self.clone())
    }

    fn item(&self, _qc: &mut QueryContext) -> Result<Option<Item>, Error> {
        match self {
            Value::Empty => Ok(None),
            Value::Item(i) => Ok(Some(i.clone())),
            v => Err(Error::seq_found(&v.item_at(0), &v.item_at(1), v.size() > 2)),
        }
    }

    fn value(&self, _qc: &mut QueryContext) -> Result<Value, Error> {
        Ok(self.clone())
    }

    fn ebv(&self, _qc: &mut QueryContext) -> Result<Item, Error> {
        match self {
            Value::Empty => Ok(Item::from_bool(false)),
            Value::Item(i) => Ok(i.clone()),
            v => {
                let first = v.item_at(0);
                if first.is_node() {
                    return Ok(first);
                }
                Err(Error::ebv(&first, &v.item_at(1), v.size() > 2))
            }
        }
    }

    fn atom_value(&self, _qc: &mut QueryContext) -> Result<Value, Error> {
        Value::atom_value(self)
    }

    fn data(&self) -> Option<DataRef> {
        match self {
            Value::Item(Item::Node(n)) => n.data(),
            _ => None,
        }
    }

    fn description(&self) -> String {
        match self {
            Value::Empty => "empty sequence".into(),
            Value::Item(i) => format!("{} item", i.ty()),
            v => format!("{} sequence", v.seq_type()),
        }
    }

    fn as_value(&self) -> Option<&Value> {
        Some(self)
    }

    fn as_value_mut(&mut self) -> Option<&mut Value> {
        Some(self)
    }
}

/// Static type of the given operands evaluated one after another.
pub(crate) fn concat_type(ops: &[Box<dyn Expr>]) -> ExprType {
    let mut st = SeqType::EMPTY;
    let mut size = Some(0u64);
    for op in ops {
        let ot = op.seq_type();
        st = st.union(&ot).with_occ(st.occ.add(ot.occ));
        size = size.zip(op.size()).and_then(|(a, b)| a.checked_add(b));
    }
    match size {
        Some(n) => ExprType::sized(st.ty, n),
        None => ExprType::new(st),
    }
}

/// Writes `ops` separated by `sep`.
pub(crate) fn write_joined(f: &mut fmt::Formatter<'_>, ops: &[Box<dyn Expr>], sep: &str) -> fmt::Result {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{op}")?;
    }
    Ok(())
}
