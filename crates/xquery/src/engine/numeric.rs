//! Numeric classification, promotion and the arithmetic operators.

use crate::engine::runtime::{Error, ErrorCode, ErrorKind};
use crate::types::{AtomType, Type};
use crate::xdm::{AtomicValue, Item, parse_double};
use core::fmt;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

/// Numeric value tagged with its primitive numeric type.
#[derive(Debug, Clone, Copy)]
pub(crate) enum NumKind {
    Int(i64),
    Dec(Decimal),
    Float(f32),
    Double(f64),
}

impl NumKind {
    pub(crate) fn to_f64(self) -> f64 {
        match self {
            NumKind::Int(i) => i as f64,
            NumKind::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
            NumKind::Float(f) => f64::from(f),
            NumKind::Double(d) => d,
        }
    }

    pub(crate) fn into_atomic(self) -> AtomicValue {
        match self {
            NumKind::Int(i) => AtomicValue::Integer(i),
            NumKind::Dec(d) => AtomicValue::Decimal(d),
            NumKind::Float(f) => AtomicValue::Float(f),
            NumKind::Double(d) => AtomicValue::Double(d),
        }
    }
}

pub(crate) fn classify(v: &AtomicValue) -> Option<NumKind> {
    match v {
        AtomicValue::Integer(i) => Some(NumKind::Int(*i)),
        AtomicValue::Decimal(d) => Some(NumKind::Dec(*d)),
        AtomicValue::Float(f) => Some(NumKind::Float(*f)),
        AtomicValue::Double(d) => Some(NumKind::Double(*d)),
        _ => None,
    }
}

/// Promotes both operands to their common numeric type.
pub(crate) fn unify_numeric(a: NumKind, b: NumKind) -> (NumKind, NumKind) {
    use NumKind::*;
    match (a, b) {
        (Double(x), y) => (Double(x), Double(y.to_f64())),
        (y, Double(x)) => (Double(y.to_f64()), Double(x)),
        (Float(x), Float(y)) => (Float(x), Float(y)),
        (Float(x), Int(y)) => (Float(x), Float(y as f32)),
        (Int(x), Float(y)) => (Float(x as f32), Float(y)),
        (Float(x), Dec(y)) => (Float(x), Float(y.to_f32().unwrap_or(f32::NAN))),
        (Dec(x), Float(y)) => (Float(x.to_f32().unwrap_or(f32::NAN)), Float(y)),
        (Dec(x), Dec(y)) => (Dec(x), Dec(y)),
        (Dec(x), Int(y)) => (Dec(x), Dec(Decimal::from(y))),
        (Int(x), Dec(y)) => (Dec(Decimal::from(x)), Dec(y)),
        (Int(x), Int(y)) => (Int(x), Int(y)),
    }
}

/// Type tag of a numeric result, without the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumericKind {
    Integer,
    Decimal,
    Float,
    Double,
}

impl NumericKind {
    pub(crate) fn of(ty: Type) -> Option<NumericKind> {
        match ty.atomic()? {
            a if a.instance_of(AtomType::Integer) => Some(NumericKind::Integer),
            AtomType::Decimal => Some(NumericKind::Decimal),
            AtomType::Float => Some(NumericKind::Float),
            AtomType::Double | AtomType::UntypedAtomic => Some(NumericKind::Double),
            _ => None,
        }
    }

    pub(crate) fn promote(self, other: NumericKind) -> NumericKind {
        use NumericKind::*;
        match (self, other) {
            (Double, _) | (_, Double) => Double,
            (Float, _) | (_, Float) => Float,
            (Decimal, _) | (_, Decimal) => Decimal,
            (Integer, Integer) => Integer,
        }
    }

    pub(crate) fn ty(self) -> Type {
        match self {
            NumericKind::Integer => Type::INTEGER,
            NumericKind::Decimal => Type::DECIMAL,
            NumericKind::Float => Type::FLOAT,
            NumericKind::Double => Type::DOUBLE,
        }
    }
}

/// Untyped operands are cast to `xs:double` before arithmetic.
pub(crate) fn untyped_to_double(a: AtomicValue) -> Result<AtomicValue, Error> {
    match a {
        AtomicValue::UntypedAtomic(s) => parse_double(&s)
            .map(AtomicValue::Double)
            .ok_or_else(|| Error::cast(&Item::untyped(&s), Type::DOUBLE)),
        other => Ok(other),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Calc {
    Plus,
    Minus,
    Mult,
    Div,
    IDiv,
    Mod,
}

impl fmt::Display for Calc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Calc::Plus => "+",
            Calc::Minus => "-",
            Calc::Mult => "*",
            Calc::Div => "div",
            Calc::IDiv => "idiv",
            Calc::Mod => "mod",
        })
    }
}

fn overflow() -> Error {
    Error::new(ErrorCode::FOAR0002, ErrorKind::Arithmetic, "Numeric overflow.")
}

fn div_zero() -> Error {
    Error::new(ErrorCode::FOAR0001, ErrorKind::Arithmetic, "Division by zero.")
}

impl Calc {
    /// Static result type for operands of the given types, if it can be told.
    pub fn result_type(self, a: Type, b: Type) -> Type {
        if let (Some(ka), Some(kb)) = (NumericKind::of(a), NumericKind::of(b)) {
            let k = ka.promote(kb);
            return match (self, k) {
                (Calc::IDiv, _) => Type::INTEGER,
                (Calc::Div, NumericKind::Integer) => Type::DECIMAL,
                _ => k.ty(),
            };
        }
        match (a, b) {
            (Type::Atomic(AtomType::YearMonthDuration), Type::Atomic(AtomType::YearMonthDuration))
            | (Type::Atomic(AtomType::DayTimeDuration), Type::Atomic(AtomType::DayTimeDuration))
                if matches!(self, Calc::Plus | Calc::Minus) =>
            {
                a
            }
            _ if self == Calc::IDiv => Type::INTEGER,
            _ => Type::ANY_ATOMIC,
        }
    }

    pub fn eval(self, a: &AtomicValue, b: &AtomicValue) -> Result<AtomicValue, Error> {
        let a = untyped_to_double(a.clone())?;
        let b = untyped_to_double(b.clone())?;
        if let (Some(x), Some(y)) = (classify(&a), classify(&b)) {
            return self.numeric(x, y);
        }
        self.duration(&a, &b)
    }

    fn numeric(self, x: NumKind, y: NumKind) -> Result<AtomicValue, Error> {
        use NumKind::*;
        let (x, y) = unify_numeric(x, y);
        let r = match (x, y) {
            (Int(a), Int(b)) => match self {
                Calc::Plus => Int(a.checked_add(b).ok_or_else(overflow)?),
                Calc::Minus => Int(a.checked_sub(b).ok_or_else(overflow)?),
                Calc::Mult => Int(a.checked_mul(b).ok_or_else(overflow)?),
                Calc::Div => {
                    if b == 0 {
                        return Err(div_zero());
                    }
                    Dec(Decimal::from(a).checked_div(Decimal::from(b)).ok_or_else(overflow)?)
                }
                Calc::IDiv => Int(a.checked_div(b).ok_or_else(|| if b == 0 { div_zero() } else { overflow() })?),
                Calc::Mod => Int(a.checked_rem(b).ok_or_else(|| if b == 0 { div_zero() } else { overflow() })?),
            },
            (Dec(a), Dec(b)) => {
                if b.is_zero() && matches!(self, Calc::Div | Calc::IDiv | Calc::Mod) {
                    return Err(div_zero());
                }
                let r = match self {
                    Calc::Plus => a.checked_add(b),
                    Calc::Minus => a.checked_sub(b),
                    Calc::Mult => a.checked_mul(b),
                    Calc::Div => a.checked_div(b),
                    Calc::IDiv => {
                        let q = a.checked_div(b).ok_or_else(overflow)?.trunc();
                        return q.to_i64().map(AtomicValue::Integer).ok_or_else(overflow);
                    }
                    Calc::Mod => a.checked_rem(b),
                };
                Dec(r.ok_or_else(overflow)?)
            }
            (Float(a), Float(b)) => match self {
                Calc::IDiv => return idiv_double(f64::from(a), f64::from(b)),
                _ => Float(float_op(self, f64::from(a), f64::from(b)) as f32),
            },
            (a, b) => match self {
                Calc::IDiv => return idiv_double(a.to_f64(), b.to_f64()),
                _ => Double(float_op(self, a.to_f64(), b.to_f64())),
            },
        };
        Ok(r.into_atomic())
    }

    fn duration(self, a: &AtomicValue, b: &AtomicValue) -> Result<AtomicValue, Error> {
        use AtomicValue::*;
        let r = match (self, a, b) {
            (Calc::Plus, YearMonthDuration(x), YearMonthDuration(y)) => {
                YearMonthDuration(x.checked_add(*y).ok_or_else(overflow)?)
            }
            (Calc::Minus, YearMonthDuration(x), YearMonthDuration(y)) => {
                YearMonthDuration(x.checked_sub(*y).ok_or_else(overflow)?)
            }
            (Calc::Plus, DayTimeDuration(x), DayTimeDuration(y)) => {
                DayTimeDuration(x.checked_add(*y).ok_or_else(overflow)?)
            }
            (Calc::Minus, DayTimeDuration(x), DayTimeDuration(y)) => {
                DayTimeDuration(x.checked_sub(*y).ok_or_else(overflow)?)
            }
            (Calc::Mult | Calc::Div, YearMonthDuration(x), n) if n.is_numeric() => {
                let f = scale(self, f64::from(*x), n)?;
                YearMonthDuration(i32::from_f64(f.round()).ok_or_else(overflow)?)
            }
            (Calc::Mult | Calc::Div, DayTimeDuration(x), n) if n.is_numeric() => {
                let f = scale(self, *x as f64, n)?;
                DayTimeDuration(i64::from_f64(f.round()).ok_or_else(overflow)?)
            }
            (Calc::Mult, n, YearMonthDuration(_) | DayTimeDuration(_)) if n.is_numeric() => {
                return self.duration(b, a);
            }
            _ => {
                return Err(Error::new(
                    ErrorCode::XPTY0004,
                    ErrorKind::Cast,
                    format!(
                        "Operator '{self}' not defined for xs:{} and xs:{}.",
                        a.ty().local_name(),
                        b.ty().local_name()
                    ),
                ));
            }
        };
        Ok(r)
    }
}

fn scale(calc: Calc, d: f64, n: &AtomicValue) -> Result<f64, Error> {
    let n = n.as_f64().unwrap_or(f64::NAN);
    if n.is_nan() {
        return Err(Error::new(ErrorCode::FOAR0002, ErrorKind::Arithmetic, "Invalid duration factor: NaN."));
    }
    match calc {
        Calc::Div if n == 0.0 => Err(div_zero()),
        Calc::Div => Ok(d / n),
        _ => Ok(d * n),
    }
}

fn float_op(calc: Calc, a: f64, b: f64) -> f64 {
    match calc {
        Calc::Plus => a + b,
        Calc::Minus => a - b,
        Calc::Mult => a * b,
        Calc::Div => a / b,
        Calc::Mod => a % b,
        Calc::IDiv => (a / b).trunc(),
    }
}

fn idiv_double(a: f64, b: f64) -> Result<AtomicValue, Error> {
    if b == 0.0 {
        return Err(div_zero());
    }
    let q = (a / b).trunc();
    i64::from_f64(q).map(AtomicValue::Integer).ok_or_else(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_yields_decimal() {
        let r = Calc::Div.eval(&AtomicValue::Integer(7), &AtomicValue::Integer(2)).unwrap();
        assert_eq!(r, AtomicValue::Decimal(Decimal::new(35, 1)));
    }

    #[test]
    fn idiv_and_mod_truncate() {
        let r = Calc::IDiv.eval(&AtomicValue::Integer(-7), &AtomicValue::Integer(2)).unwrap();
        assert_eq!(r, AtomicValue::Integer(-3));
        let r = Calc::Mod.eval(&AtomicValue::Integer(-7), &AtomicValue::Integer(2)).unwrap();
        assert_eq!(r, AtomicValue::Integer(-1));
    }

    #[test]
    fn division_by_zero() {
        let err = Calc::Div.eval(&AtomicValue::Integer(1), &AtomicValue::Integer(0)).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FOAR0001);
        let r = Calc::Div.eval(&AtomicValue::Double(1.0), &AtomicValue::Integer(0)).unwrap();
        assert_eq!(r, AtomicValue::Double(f64::INFINITY));
    }

    #[test]
    fn untyped_operands_become_doubles() {
        let r = Calc::Plus.eval(&AtomicValue::untyped("1.5"), &AtomicValue::Integer(1)).unwrap();
        assert_eq!(r, AtomicValue::Double(2.5));
        let err = Calc::Plus.eval(&AtomicValue::untyped("x"), &AtomicValue::Integer(1)).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FORG0001);
    }

    #[test]
    fn durations_add() {
        let r = Calc::Plus
            .eval(&AtomicValue::DayTimeDuration(60), &AtomicValue::DayTimeDuration(30))
            .unwrap();
        assert_eq!(r, AtomicValue::DayTimeDuration(90));
    }
}
