use super::StandardFunc;
use crate::compiler::{CompileContext, Origin, VarMap};
use crate::engine::runtime::{Error, ErrorCode, QueryContext};
use crate::expr::Expr;
use crate::xdm::{Item, Value};

pub(super) fn head_fn(sf: &StandardFunc, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
    let mut iter = sf.arg(0).iter(qc)?;
    iter.next(qc)
}

fn count_item(n: u64) -> Result<Item, Error> {
    i64::try_from(n)
        .map(Item::integer)
        .map_err(|_| Error::from_code(ErrorCode::FOAR0002, format!("Sequence of {n} items is too long to be counted.")))
}

pub(super) fn count_fn(sf: &StandardFunc, qc: &mut QueryContext) -> Result<Item, Error> {
    let arg = sf.arg(0);
    if let Some(n) = arg.size() {
        return count_item(n);
    }
    let mut iter = arg.iter(qc)?;
    if let Some(n) = iter.size() {
        return count_item(n);
    }
    let mut n = 0i64;
    while iter.next(qc)?.is_some() {
        qc.check_stop()?;
        n += 1;
    }
    Ok(Item::integer(n))
}

pub(super) fn reverse_fn(sf: &StandardFunc, qc: &mut QueryContext) -> Result<Value, Error> {
    Ok(sf.arg(0).value(qc)?.reverse())
}

/// `head(x)` is `x` for at most one item; `head((a, ...))` is `a` if `a`
/// yields exactly one item.
pub(super) fn optimize_head(
    mut sf: Box<StandardFunc>,
    cc: &mut CompileContext<'_>,
) -> Result<Box<dyn Expr>, Error> {
    if sf.arg(0).seq_type().is_zero_or_one() {
        let origin = Origin::of(&*sf);
        return Ok(cc.replace(origin, sf.args.pop()));
    }
    if let Some(ops) = sf.arg(0).as_list()
        && let Some(first) = ops.first()
        && first.seq_type().is_one()
    {
        let first = first.copy(cc, &mut VarMap::new());
        return Ok(cc.replace_with(&*sf, Some(first)));
    }
    Ok(sf)
}

/// `count(x)` is a constant when the size of `x` is known and no part of
/// `x` is an error.
pub(super) fn optimize_count(
    sf: Box<StandardFunc>,
    cc: &mut CompileContext<'_>,
) -> Result<Box<dyn Expr>, Error> {
    let arg = sf.arg(0);
    let safe = match arg.as_list() {
        Some(ops) => ops.iter().all(|op| !op.is_vacuous()),
        None => !arg.is_vacuous(),
    };
    if let Some(n) = arg.size()
        && safe
        && let Ok(count) = count_item(n)
    {
        return Ok(cc.replace_with(&*sf, Some(Box::new(Value::Item(count)))));
    }
    Ok(sf)
}
