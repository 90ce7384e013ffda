use super::StandardFunc;
use crate::engine::numeric::{Calc, untyped_to_double};
use crate::engine::runtime::{Error, ErrorCode, ErrorKind, QueryContext};
use crate::expr::Expr;
use crate::types::{AtomType, Type};
use crate::xdm::{AtomicValue, Item, RangeSeq, Value};
use rust_decimal::Decimal;

/// Values that can be added up together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SumClass {
    Number,
    YearMonth,
    DayTime,
}

impl SumClass {
    fn of(a: &AtomicValue) -> Option<SumClass> {
        match a {
            a if a.is_numeric() => Some(SumClass::Number),
            AtomicValue::YearMonthDuration(_) => Some(SumClass::YearMonth),
            AtomicValue::DayTimeDuration(_) => Some(SumClass::DayTime),
            _ => None,
        }
    }

    fn ty(self) -> Type {
        match self {
            SumClass::Number => Type::NUMERIC,
            SumClass::YearMonth => Type::Atomic(AtomType::YearMonthDuration),
            SumClass::DayTime => Type::Atomic(AtomType::DayTimeDuration),
        }
    }
}

/// Sum and number of the atoms of `value`, or `None` if there are none.
/// Untyped atoms count as doubles; all atoms must share one class.
fn total(value: &Value, qc: &mut QueryContext) -> Result<Option<(AtomicValue, u64)>, Error> {
    let mut acc: Option<(AtomicValue, SumClass)> = None;
    let mut count = 0u64;
    let mut atoms = Vec::new();
    for item in value.iter() {
        qc.check_stop()?;
        item.atomize(&mut atoms)?;
        for atom in atoms.drain(..) {
            let atom = untyped_to_double(atom)?;
            count += 1;
            acc = Some(match acc {
                None => match SumClass::of(&atom) {
                    Some(class) => (atom, class),
                    None => return Err(Error::sum(&Item::Atomic(atom))),
                },
                Some((sum, class)) => {
                    if SumClass::of(&atom) != Some(class) {
                        return Err(Error::comparison(class.ty(), &Item::Atomic(atom)));
                    }
                    (Calc::Plus.eval(&sum, &atom)?, class)
                }
            });
        }
    }
    Ok(acc.map(|(sum, _)| (sum, count)))
}

/// Closed form of the sum of an integer range.
fn range_total(r: &RangeSeq) -> Result<AtomicValue, Error> {
    let (n, s) = (i128::from(r.len()), i128::from(r.start()));
    let sum = n * (2 * s + n - 1) / 2;
    if let Ok(i) = i64::try_from(sum) {
        return Ok(AtomicValue::Integer(i));
    }
    Decimal::try_from_i128_with_scale(sum, 0)
        .map(AtomicValue::Decimal)
        .map_err(|_| Error::new(ErrorCode::FOAR0002, ErrorKind::Arithmetic, "Numeric overflow."))
}

pub(super) fn sum_fn(sf: &StandardFunc, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
    let value = sf.arg(0).value(qc)?;
    let sum = match &value {
        Value::Range(r) => Some(range_total(r)?),
        v => total(v, qc).map_err(|e| e.at(sf.info()))?.map(|(sum, _)| sum),
    };
    match sum {
        Some(sum) => Ok(Some(Item::Atomic(sum))),
        None if sf.args.len() > 1 => sf.arg(1).item(qc),
        None => Ok(Some(Item::integer(0))),
    }
}

pub(super) fn avg_fn(sf: &StandardFunc, qc: &mut QueryContext) -> Result<Option<Item>, Error> {
    let value = sf.arg(0).value(qc)?;
    let total = match &value {
        Value::Range(r) => Some((range_total(r)?, r.len())),
        v => total(v, qc).map_err(|e| e.at(sf.info()))?,
    };
    let Some((sum, count)) = total else {
        return Ok(None);
    };
    let count = i64::try_from(count)
        .map_err(|_| Error::new(ErrorCode::FOAR0002, ErrorKind::Arithmetic, "Numeric overflow."))?;
    let avg = Calc::Div.eval(&sum, &AtomicValue::Integer(count)).map_err(|e| e.at(sf.info()))?;
    Ok(Some(Item::Atomic(avg)))
}
