use super::StandardFunc;
use crate::compiler::{CompileContext, Origin, VarMap};
use crate::engine::runtime::{Error, QueryContext};
use crate::expr::{DynFuncCall, Expr, coerce};
use crate::xdm::{Item, Value};
use std::collections::VecDeque;

pub(super) fn fold_left1_fn(sf: &StandardFunc, qc: &mut QueryContext) -> Result<Value, Error> {
    let value = sf.arg(0).value(qc)?;
    let func = coerce::to_func(sf.arg(1), qc)?;
    let mut iter = value.iter();
    let Some(first) = iter.next() else {
        return Err(Error::empty_found(None).at(sf.info()));
    };
    let mut acc = Value::Item(first);
    for item in iter {
        qc.check_stop()?;
        acc = func.invoke(&[acc, Value::Item(item)], qc).map_err(|e| e.at(sf.info()))?;
    }
    Ok(acc)
}

/// Folds over a short literal sequence are unrolled into nested calls.
pub(super) fn optimize_fold_left1(
    sf: Box<StandardFunc>,
    cc: &mut CompileContext<'_>,
) -> Result<Box<dyn Expr>, Error> {
    let limit = cc.options().unroll_limit;
    let Some(value) = sf.arg(0).as_value().filter(|v| !v.is_empty() && v.size() <= limit) else {
        return Ok(sf);
    };
    let mut items = value.iter();
    let mut acc: Box<dyn Expr> = match items.next() {
        Some(first) => Box::new(Value::Item(first)),
        None => return Ok(sf),
    };
    for item in items {
        let func = sf.arg(1).copy(cc, &mut VarMap::new());
        acc = Box::new(DynFuncCall::new(func, vec![acc, Box::new(Value::Item(item))]));
    }
    let origin = Origin::of(&*sf);
    let acc = acc.optimize(cc)?;
    Ok(cc.replace(origin, Some(acc)))
}

fn less(func: &Item, a: &Item, b: &Item, qc: &mut QueryContext) -> Result<bool, Error> {
    qc.check_stop()?;
    let res = func.invoke(&[Value::Item(a.clone()), Value::Item(b.clone())], qc)?;
    res.boolean(qc)
}

/// Stable merge sort with a fallible comparison.
fn merge_sort<F>(mut items: Vec<Item>, lt: &mut F) -> Result<Vec<Item>, Error>
where
    F: FnMut(&Item, &Item) -> Result<bool, Error>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let mut l = VecDeque::from(merge_sort(items, lt)?);
    let mut r = VecDeque::from(merge_sort(right, lt)?);
    let mut out = Vec::with_capacity(l.len() + r.len());
    while let (Some(a), Some(b)) = (l.front(), r.front()) {
        let src = if lt(b, a)? { &mut r } else { &mut l };
        out.extend(src.pop_front());
    }
    out.extend(l);
    out.extend(r);
    Ok(out)
}

pub(super) fn sort_with_fn(sf: &StandardFunc, qc: &mut QueryContext) -> Result<Value, Error> {
    let value = sf.arg(0).value(qc)?;
    let func = coerce::to_func(sf.arg(1), qc)?;
    let sorted = merge_sort(value.to_vec(), &mut |a, b| less(&func, a, b, qc))
        .map_err(|e| e.at(sf.info()))?;
    Ok(Value::from_items(sorted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sort_is_stable() {
        let items: Vec<Item> = [3, 1, 2, 1].into_iter().map(Item::integer).collect();
        let mut calls = 0;
        let sorted = merge_sort(items, &mut |a, b| {
            calls += 1;
            Ok(a.as_atomic().and_then(|x| x.as_f64()) < b.as_atomic().and_then(|x| x.as_f64()))
        })
        .unwrap();
        let expected: Vec<Item> = [1, 1, 2, 3].into_iter().map(Item::integer).collect();
        assert_eq!(sorted, expected);
        assert!(calls > 0);
    }

    #[test]
    fn merge_sort_stops_at_first_error() {
        let items: Vec<Item> = (0..8).map(Item::integer).collect();
        let res = merge_sort(items, &mut |_, _| Err(Error::cancelled("stop")));
        assert!(res.is_err());
    }
}
