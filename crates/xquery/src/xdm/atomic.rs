use crate::engine::runtime::{Error, ErrorCode};
use crate::types::AtomType;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use compact_str::CompactString;
use core::cmp::Ordering;
use core::fmt;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use string_cache::DefaultAtom;

/// Value of an `xs:QName` item. Name parts are interned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QNameValue {
    pub ns_uri: Option<DefaultAtom>,
    pub prefix: Option<DefaultAtom>,
    pub local: DefaultAtom,
}

impl QNameValue {
    pub fn new(ns_uri: Option<&str>, prefix: Option<&str>, local: &str) -> Self {
        Self {
            ns_uri: ns_uri.map(DefaultAtom::from),
            prefix: prefix.map(DefaultAtom::from),
            local: DefaultAtom::from(local),
        }
    }
}

impl fmt::Display for QNameValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) if !p.is_empty() => write!(f, "{}:{}", p, self.local),
            _ => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    UntypedAtomic(CompactString),
    String(CompactString),
    AnyUri(CompactString),
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    Float(f32),
    QName(QNameValue),
    DateTime(DateTime<FixedOffset>),
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    Time {
        time: NaiveTime,
        tz: Option<FixedOffset>,
    },
    // Durations are kept canonical: months and seconds.
    Duration {
        months: i32,
        seconds: i64,
    },
    YearMonthDuration(i32),
    DayTimeDuration(i64),
    Base64Binary(Arc<[u8]>),
    HexBinary(Arc<[u8]>),
}

/// Comparison class of an atomic value; values of different classes are incomparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpClass {
    Numeric,
    Text,
    Boolean,
    YearMonth,
    DayTime,
    Duration,
    DateTime,
    Date,
    Time,
    Binary,
    QName,
}

impl AtomicValue {
    pub fn string(s: impl Into<CompactString>) -> Self {
        AtomicValue::String(s.into())
    }

    pub fn untyped(s: impl Into<CompactString>) -> Self {
        AtomicValue::UntypedAtomic(s.into())
    }

    pub fn ty(&self) -> AtomType {
        match self {
            AtomicValue::UntypedAtomic(_) => AtomType::UntypedAtomic,
            AtomicValue::String(_) => AtomType::String,
            AtomicValue::AnyUri(_) => AtomType::AnyUri,
            AtomicValue::Boolean(_) => AtomType::Boolean,
            AtomicValue::Integer(_) => AtomType::Integer,
            AtomicValue::Decimal(_) => AtomType::Decimal,
            AtomicValue::Double(_) => AtomType::Double,
            AtomicValue::Float(_) => AtomType::Float,
            AtomicValue::QName(_) => AtomType::QName,
            AtomicValue::DateTime(_) => AtomType::DateTime,
            AtomicValue::Date { .. } => AtomType::Date,
            AtomicValue::Time { .. } => AtomType::Time,
            AtomicValue::Duration { .. } => AtomType::Duration,
            AtomicValue::YearMonthDuration(_) => AtomType::YearMonthDuration,
            AtomicValue::DayTimeDuration(_) => AtomType::DayTimeDuration,
            AtomicValue::Base64Binary(_) => AtomType::Base64Binary,
            AtomicValue::HexBinary(_) => AtomType::HexBinary,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AtomicValue::Integer(_)
                | AtomicValue::Decimal(_)
                | AtomicValue::Double(_)
                | AtomicValue::Float(_)
        )
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AtomicValue::Integer(i) => Some(*i as f64),
            AtomicValue::Decimal(d) => d.to_f64(),
            AtomicValue::Double(d) => Some(*d),
            AtomicValue::Float(f) => Some(f64::from(*f)),
            _ => None,
        }
    }

    /// Canonical lexical representation.
    pub fn string_value(&self) -> String {
        match self {
            AtomicValue::UntypedAtomic(s) | AtomicValue::String(s) | AtomicValue::AnyUri(s) => {
                s.to_string()
            }
            AtomicValue::Boolean(b) => b.to_string(),
            AtomicValue::Integer(i) => i.to_string(),
            AtomicValue::Decimal(d) => format_decimal(*d),
            AtomicValue::Double(d) => format_double(*d),
            AtomicValue::Float(f) => format_double(f64::from(*f)),
            AtomicValue::QName(q) => q.to_string(),
            AtomicValue::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            AtomicValue::Date { date, tz } => {
                format!("{}{}", date.format("%Y-%m-%d"), format_tz(*tz))
            }
            AtomicValue::Time { time, tz } => {
                format!("{}{}", time.format("%H:%M:%S"), format_tz(*tz))
            }
            AtomicValue::Duration { months, seconds } => format_duration(*months, *seconds),
            AtomicValue::YearMonthDuration(m) => format_duration(*m, 0),
            AtomicValue::DayTimeDuration(s) => format_duration(0, *s),
            AtomicValue::Base64Binary(b) => base64::engine::general_purpose::STANDARD.encode(b),
            AtomicValue::HexBinary(b) => b.iter().map(|x| format!("{x:02X}")).collect(),
        }
    }

    /// Effective boolean value of a single atomic item.
    pub fn ebv(&self) -> Result<bool, Error> {
        Ok(match self {
            AtomicValue::Boolean(b) => *b,
            AtomicValue::UntypedAtomic(s) | AtomicValue::String(s) | AtomicValue::AnyUri(s) => {
                !s.is_empty()
            }
            AtomicValue::Integer(i) => *i != 0,
            AtomicValue::Decimal(d) => !d.is_zero(),
            AtomicValue::Double(d) => *d != 0.0 && !d.is_nan(),
            AtomicValue::Float(f) => *f != 0.0 && !f.is_nan(),
            other => {
                return Err(Error::from_code(
                    ErrorCode::FORG0006,
                    format!(
                        "effective boolean value not defined for xs:{}",
                        other.ty().local_name()
                    ),
                ));
            }
        })
    }

    fn class(&self) -> CmpClass {
        match self {
            AtomicValue::Integer(_)
            | AtomicValue::Decimal(_)
            | AtomicValue::Double(_)
            | AtomicValue::Float(_) => CmpClass::Numeric,
            AtomicValue::UntypedAtomic(_) | AtomicValue::String(_) | AtomicValue::AnyUri(_) => {
                CmpClass::Text
            }
            AtomicValue::Boolean(_) => CmpClass::Boolean,
            AtomicValue::YearMonthDuration(_) => CmpClass::YearMonth,
            AtomicValue::DayTimeDuration(_) => CmpClass::DayTime,
            AtomicValue::Duration { .. } => CmpClass::Duration,
            AtomicValue::DateTime(_) => CmpClass::DateTime,
            AtomicValue::Date { .. } => CmpClass::Date,
            AtomicValue::Time { .. } => CmpClass::Time,
            AtomicValue::Base64Binary(_) | AtomicValue::HexBinary(_) => CmpClass::Binary,
            AtomicValue::QName(_) => CmpClass::QName,
        }
    }

    /// Value comparison. `Ok(None)` for unordered operands (NaN, or ordering on
    /// equality-only types); an error for incompatible comparison classes.
    pub fn compare(&self, other: &AtomicValue) -> Result<Option<Ordering>, Error> {
        let (ca, cb) = (self.class(), other.class());
        if ca != cb {
            return Err(Error::incomparable(self, other));
        }
        Ok(match (self, other) {
            (a, b) if ca == CmpClass::Numeric => compare_numeric(a, b),
            (a, b) if ca == CmpClass::Text => Some(a.string_value().cmp(&b.string_value())),
            (AtomicValue::Boolean(a), AtomicValue::Boolean(b)) => Some(a.cmp(b)),
            (AtomicValue::YearMonthDuration(a), AtomicValue::YearMonthDuration(b)) => {
                Some(a.cmp(b))
            }
            (AtomicValue::DayTimeDuration(a), AtomicValue::DayTimeDuration(b)) => Some(a.cmp(b)),
            (
                AtomicValue::Duration { months: m1, seconds: s1 },
                AtomicValue::Duration { months: m2, seconds: s2 },
            ) => (m1 == m2 && s1 == s2).then_some(Ordering::Equal),
            (AtomicValue::DateTime(a), AtomicValue::DateTime(b)) => Some(a.cmp(b)),
            (AtomicValue::Date { date: a, .. }, AtomicValue::Date { date: b, .. }) => {
                Some(a.cmp(b))
            }
            (AtomicValue::Time { time: a, .. }, AtomicValue::Time { time: b, .. }) => {
                Some(a.cmp(b))
            }
            (
                AtomicValue::Base64Binary(a) | AtomicValue::HexBinary(a),
                AtomicValue::Base64Binary(b) | AtomicValue::HexBinary(b),
            ) => Some(a.cmp(b)),
            (AtomicValue::QName(a), AtomicValue::QName(b)) => {
                (a.ns_uri == b.ns_uri && a.local == b.local).then_some(Ordering::Equal)
            }
            _ => None,
        })
    }

    /// Key equality as used by maps: same class and equal value, NaN equal to itself.
    pub fn same_key(&self, other: &AtomicValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) if a.is_nan() && b.is_nan() => true,
            _ => matches!(self.compare(other), Ok(Some(Ordering::Equal))),
        }
    }
}

fn compare_numeric(a: &AtomicValue, b: &AtomicValue) -> Option<Ordering> {
    match (a, b) {
        (AtomicValue::Integer(x), AtomicValue::Integer(y)) => Some(x.cmp(y)),
        (AtomicValue::Integer(x), AtomicValue::Decimal(y)) => Some(Decimal::from(*x).cmp(y)),
        (AtomicValue::Decimal(x), AtomicValue::Integer(y)) => Some(x.cmp(&Decimal::from(*y))),
        (AtomicValue::Decimal(x), AtomicValue::Decimal(y)) => Some(x.cmp(y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

impl fmt::Display for AtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomicValue::String(s) | AtomicValue::UntypedAtomic(s) => {
                write!(f, "\"{}\"", s.replace('"', "\"\""))
            }
            AtomicValue::Integer(_) | AtomicValue::Decimal(_) => {
                f.write_str(&self.string_value())
            }
            AtomicValue::Double(d) if d.is_finite() && d.fract() != 0.0 => {
                f.write_str(&self.string_value())
            }
            AtomicValue::Boolean(b) => write!(f, "{b}()"),
            other => write!(
                f,
                "xs:{}(\"{}\")",
                other.ty().local_name(),
                other.string_value()
            ),
        }
    }
}

pub(crate) fn parse_boolean(s: &str) -> Option<bool> {
    match s.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_double(s: &str) -> Option<f64> {
    match s.trim() {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        t if t.is_empty() || t.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            None
        }
        t => t.parse::<f64>().ok(),
    }
}

pub(crate) fn parse_integer(s: &str) -> Option<i64> {
    let t = s.trim();
    let t = t.strip_prefix('+').unwrap_or(t);
    t.parse::<i64>().ok()
}

fn format_decimal(d: Decimal) -> String {
    let n = d.normalize();
    n.to_string()
}

/// XPath canonical form of a double.
pub(crate) fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".into();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF".into() } else { "-INF".into() };
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0".into() } else { "0".into() };
    }
    let abs = d.abs();
    if (1e-6..1e6).contains(&abs) {
        let s = format!("{d}");
        return s;
    }
    let s = format!("{d:E}");
    match s.split_once('E') {
        Some((mantissa, exp)) if !mantissa.contains('.') => format!("{mantissa}.0E{exp}"),
        _ => s,
    }
}

fn format_tz(tz: Option<FixedOffset>) -> String {
    match tz {
        None => String::new(),
        Some(o) if o.local_minus_utc() == 0 => "Z".into(),
        Some(o) => {
            let secs = o.local_minus_utc();
            let sign = if secs < 0 { '-' } else { '+' };
            let secs = secs.abs();
            format!("{sign}{:02}:{:02}", secs / 3600, (secs % 3600) / 60)
        }
    }
}

fn format_duration(months: i32, seconds: i64) -> String {
    let negative = months < 0 || seconds < 0;
    let months = months.unsigned_abs();
    let seconds = seconds.unsigned_abs();
    let mut out = String::from(if negative { "-P" } else { "P" });
    let (y, m) = (months / 12, months % 12);
    if y > 0 {
        out.push_str(&format!("{y}Y"));
    }
    if m > 0 {
        out.push_str(&format!("{m}M"));
    }
    let (d, rest) = (seconds / 86_400, seconds % 86_400);
    if d > 0 {
        out.push_str(&format!("{d}D"));
    }
    if rest > 0 {
        out.push('T');
        let (h, rest) = (rest / 3600, rest % 3600);
        let (mi, s) = (rest / 60, rest % 60);
        if h > 0 {
            out.push_str(&format!("{h}H"));
        }
        if mi > 0 {
            out.push_str(&format!("{mi}M"));
        }
        if s > 0 {
            out.push_str(&format!("{s}S"));
        }
    }
    if out.ends_with('P') {
        out.push_str("T0S");
    }
    out
}
