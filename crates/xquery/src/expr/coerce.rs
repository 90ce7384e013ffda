//! Conversion of single-item expression results to native values.
//!
//! Every helper evaluates its expression through single-item access and
//! rejects the empty sequence. Untyped atoms are parsed per the target
//! grammar; other mismatches raise a type error naming the item and both
//! types.

use super::Expr;
use crate::engine::runtime::{Error, QueryContext};
use crate::model::Node;
use crate::types::{AtomType, Type};
use crate::xdm::{
    ArrayItem, AtomicValue, FuncItem, Item, MapItem, QNameValue, Value, parse_boolean, parse_double,
    parse_integer,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

/// Fails with `EMPTYFOUND` unless `value` is present.
pub fn check_no_empty<T>(value: Option<T>, expected: Option<Type>) -> Result<T, Error> {
    value.ok_or_else(|| Error::empty_found(expected))
}

pub fn to_item(expr: &dyn Expr, qc: &mut QueryContext) -> Result<Item, Error> {
    check_no_empty(expr.item(qc)?, None).map_err(|e| e.at(expr.info()))
}

pub fn to_atom_item(expr: &dyn Expr, qc: &mut QueryContext) -> Result<AtomicValue, Error> {
    check_no_empty(expr.atom_item(qc)?, None).map_err(|e| e.at(expr.info()))
}

/// Item of type `ty`.
pub fn check_type(expr: &dyn Expr, qc: &mut QueryContext, ty: Type) -> Result<Item, Error> {
    let item = check_no_empty(expr.item(qc)?, Some(ty)).map_err(|e| e.at(expr.info()))?;
    if item.ty().instance_of(ty) {
        Ok(item)
    } else {
        Err(Error::type_error(&item, ty).at(expr.info()))
    }
}

fn atom(expr: &dyn Expr, qc: &mut QueryContext, expected: Type) -> Result<AtomicValue, Error> {
    check_no_empty(expr.atom_item(qc)?, Some(expected)).map_err(|e| e.at(expr.info()))
}

/// String value of a string or untyped atom.
pub fn to_token(expr: &dyn Expr, qc: &mut QueryContext) -> Result<String, Error> {
    match atom(expr, qc, Type::STRING)? {
        AtomicValue::String(s) | AtomicValue::UntypedAtomic(s) | AtomicValue::AnyUri(s) => {
            Ok(s.into())
        }
        a => Err(Error::type_error(&Item::Atomic(a), Type::STRING).at(expr.info())),
    }
}

pub fn to_boolean(expr: &dyn Expr, qc: &mut QueryContext) -> Result<bool, Error> {
    match atom(expr, qc, Type::BOOLEAN)? {
        AtomicValue::Boolean(b) => Ok(b),
        AtomicValue::UntypedAtomic(s) => parse_boolean(&s).ok_or_else(|| {
            Error::cast(&Item::untyped(&s), Type::BOOLEAN).at(expr.info())
        }),
        a => Err(Error::type_error(&Item::Atomic(a), Type::BOOLEAN).at(expr.info())),
    }
}

pub fn to_double(expr: &dyn Expr, qc: &mut QueryContext) -> Result<f64, Error> {
    let a = to_number(expr, qc)?;
    Ok(a.as_f64().unwrap_or(f64::NAN))
}

pub fn to_float(expr: &dyn Expr, qc: &mut QueryContext) -> Result<f32, Error> {
    Ok(to_double(expr, qc)? as f32)
}

/// Numeric atom; untyped input becomes an `xs:double`.
pub fn to_number(expr: &dyn Expr, qc: &mut QueryContext) -> Result<AtomicValue, Error> {
    match atom(expr, qc, Type::NUMERIC)? {
        a if a.is_numeric() => Ok(a),
        AtomicValue::UntypedAtomic(s) => parse_double(&s)
            .map(AtomicValue::Double)
            .ok_or_else(|| Error::cast(&Item::untyped(&s), Type::DOUBLE).at(expr.info())),
        a => Err(Error::type_error(&Item::Atomic(a), Type::NUMERIC).at(expr.info())),
    }
}

pub fn to_long(expr: &dyn Expr, qc: &mut QueryContext) -> Result<i64, Error> {
    long(atom(expr, qc, Type::INTEGER)?).map_err(|e| e.at(expr.info()))
}

/// Like [`to_long`], with the empty sequence mapped to `None`.
pub fn to_long_opt(expr: &dyn Expr, qc: &mut QueryContext) -> Result<Option<i64>, Error> {
    match expr.atom_item(qc)? {
        None => Ok(None),
        Some(a) => long(a).map(Some).map_err(|e| e.at(expr.info())),
    }
}

fn long(a: AtomicValue) -> Result<i64, Error> {
    match a {
        AtomicValue::Integer(i) => Ok(i),
        AtomicValue::UntypedAtomic(s) => {
            parse_integer(&s).ok_or_else(|| Error::cast(&Item::untyped(&s), Type::INTEGER))
        }
        a => Err(Error::type_error(&Item::Atomic(a), Type::INTEGER)),
    }
}

pub fn to_node(expr: &dyn Expr, qc: &mut QueryContext) -> Result<Node, Error> {
    match check_no_empty(expr.item(qc)?, Some(Type::NODE)).map_err(|e| e.at(expr.info()))? {
        Item::Node(n) => Ok(n),
        item => Err(Error::type_error(&item, Type::NODE).at(expr.info())),
    }
}

/// Bytes of a binary atom, or the UTF-8 encoding of a string.
pub fn to_bytes(expr: &dyn Expr, qc: &mut QueryContext) -> Result<Arc<[u8]>, Error> {
    match atom(expr, qc, Type::Atomic(AtomType::Base64Binary))? {
        AtomicValue::Base64Binary(b) | AtomicValue::HexBinary(b) => Ok(b),
        AtomicValue::String(s) | AtomicValue::UntypedAtomic(s) => Ok(Arc::from(s.as_bytes())),
        a => Err(Error::type_error(&Item::Atomic(a), Type::Atomic(AtomType::Base64Binary)).at(expr.info())),
    }
}

/// `xs:base64Binary` atom; string input is decoded.
pub fn to_b64(expr: &dyn Expr, qc: &mut QueryContext) -> Result<Arc<[u8]>, Error> {
    let b64 = Type::Atomic(AtomType::Base64Binary);
    match atom(expr, qc, b64)? {
        AtomicValue::Base64Binary(b) | AtomicValue::HexBinary(b) => Ok(b),
        AtomicValue::String(s) | AtomicValue::UntypedAtomic(s) => STANDARD
            .decode(s.trim().as_bytes())
            .map(Arc::from)
            .map_err(|e| {
                Error::cast(&Item::untyped(&s), b64)
                    .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
                    .at(expr.info())
            }),
        a => Err(Error::type_error(&Item::Atomic(a), b64).at(expr.info())),
    }
}

pub fn to_qname(expr: &dyn Expr, qc: &mut QueryContext) -> Result<QNameValue, Error> {
    match atom(expr, qc, Type::QNAME)? {
        AtomicValue::QName(q) => Ok(q),
        a @ AtomicValue::UntypedAtomic(_) => {
            Err(Error::ns_sensitive(&Item::Atomic(a), Type::QNAME).at(expr.info()))
        }
        a => Err(Error::type_error(&Item::Atomic(a), Type::QNAME).at(expr.info())),
    }
}

/// Function item; maps and arrays qualify.
pub fn to_func(expr: &dyn Expr, qc: &mut QueryContext) -> Result<Item, Error> {
    let item = check_no_empty(expr.item(qc)?, Some(Type::FUNCTION)).map_err(|e| e.at(expr.info()))?;
    if item.is_function() {
        Ok(item)
    } else {
        Err(Error::type_error(&item, Type::FUNCTION).at(expr.info()))
    }
}

/// Function item proper, excluding maps and arrays.
pub fn to_func_item(expr: &dyn Expr, qc: &mut QueryContext) -> Result<FuncItem, Error> {
    match to_func(expr, qc)? {
        Item::Function(f) => Ok(f),
        item => Err(Error::type_error(&item, Type::FUNCTION).at(expr.info())),
    }
}

pub fn to_map(expr: &dyn Expr, qc: &mut QueryContext) -> Result<MapItem, Error> {
    match check_no_empty(expr.item(qc)?, Some(Type::MAP)).map_err(|e| e.at(expr.info()))? {
        Item::Map(m) => Ok(m),
        item => Err(Error::type_error(&item, Type::MAP).at(expr.info())),
    }
}

pub fn to_array(expr: &dyn Expr, qc: &mut QueryContext) -> Result<ArrayItem, Error> {
    match check_no_empty(expr.item(qc)?, Some(Type::ARRAY)).map_err(|e| e.at(expr.info()))? {
        Item::Array(a) => Ok(a),
        item => Err(Error::type_error(&item, Type::ARRAY).at(expr.info())),
    }
}

/// Current context value.
pub fn ctx_value(qc: &QueryContext, description: &str) -> Result<Value, Error> {
    qc.focus().value.clone().ok_or_else(|| Error::no_ctx(description))
}
