mod atomic;
mod value;

pub use atomic::{AtomicValue, QNameValue};
pub(crate) use atomic::{format_double, parse_boolean, parse_double, parse_integer};
pub use value::{ItemSeq, RangeSeq, Value, ValueIter};

use crate::engine::runtime::{Error, ErrorCode, QueryContext};
use crate::model::Node;
use crate::types::Type;
use core::fmt;
use itertools::Itertools;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self {
            ns_uri,
            local: local.into(),
        }
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) => write!(f, "Q{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

pub type FuncBody =
    Arc<dyn Fn(&[Value], &mut QueryContext) -> Result<Value, Error> + Send + Sync>;

/// A function item backed by a native closure.
#[derive(Clone)]
pub struct FuncItem {
    name: Option<ExpandedName>,
    arity: usize,
    body: FuncBody,
    ty: Type,
}

impl FuncItem {
    pub fn new<F>(name: Option<ExpandedName>, arity: usize, body: F) -> Self
    where
        F: Fn(&[Value], &mut QueryContext) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self {
            name,
            arity,
            body: Arc::new(body),
            ty: Type::FUNCTION,
        }
    }

    pub fn name(&self) -> Option<&ExpandedName> {
        self.name.as_ref()
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn invoke(&self, args: &[Value], qc: &mut QueryContext) -> Result<Value, Error> {
        if args.len() != self.arity {
            return Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!(
                    "{} expects {} arguments, {} supplied",
                    self, self.arity, args.len()
                ),
            ));
        }
        (self.body)(args, qc)
    }
}

impl fmt::Debug for FuncItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncItem")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for FuncItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(n) => write!(f, "{}#{}", n.local, self.arity),
            None => write!(f, "function#{}", self.arity),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapItem {
    entries: Arc<[(AtomicValue, Value)]>,
    ty: Type,
}

impl MapItem {
    /// Builds a map; a later entry replaces an earlier one with the same key.
    pub fn new(entries: impl IntoIterator<Item = (AtomicValue, Value)>) -> Self {
        let mut out: Vec<(AtomicValue, Value)> = Vec::new();
        for (k, v) in entries {
            match out.iter_mut().find(|(e, _)| e.same_key(&k)) {
                Some(slot) => slot.1 = v,
                None => out.push((k, v)),
            }
        }
        Self {
            entries: out.into(),
            ty: Type::MAP,
        }
    }

    pub fn empty() -> Self {
        Self::new(core::iter::empty())
    }

    pub fn get(&self, key: &AtomicValue) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.same_key(key))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ty(&self) -> Type {
        self.ty
    }
}

#[derive(Debug, Clone)]
pub struct ArrayItem {
    members: Arc<[Value]>,
    ty: Type,
}

impl ArrayItem {
    pub fn new(members: impl IntoIterator<Item = Value>) -> Self {
        Self {
            members: members.into_iter().collect(),
            ty: Type::ARRAY,
        }
    }

    pub fn empty() -> Self {
        Self::new(core::iter::empty())
    }

    pub fn members(&self) -> &[Value] {
        &self.members
    }

    /// Member at a one-based position.
    pub fn get(&self, pos: i64) -> Result<&Value, Error> {
        usize::try_from(pos)
            .ok()
            .and_then(|p| p.checked_sub(1))
            .and_then(|p| self.members.get(p))
            .ok_or_else(|| {
                Error::from_code(
                    ErrorCode::FOAY0001,
                    format!("array index {pos} out of bounds (1..{})", self.members.len()),
                )
            })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ty(&self) -> Type {
        self.ty
    }
}

#[derive(Debug, Clone)]
pub enum Item {
    Atomic(AtomicValue),
    Node(Node),
    Function(FuncItem),
    Map(MapItem),
    Array(ArrayItem),
}

impl Item {
    pub fn integer(i: i64) -> Self {
        Item::Atomic(AtomicValue::Integer(i))
    }

    pub fn double(d: f64) -> Self {
        Item::Atomic(AtomicValue::Double(d))
    }

    pub fn string(s: &str) -> Self {
        Item::Atomic(AtomicValue::string(s))
    }

    pub fn untyped(s: &str) -> Self {
        Item::Atomic(AtomicValue::untyped(s))
    }

    pub fn from_bool(b: bool) -> Self {
        Item::Atomic(AtomicValue::Boolean(b))
    }

    pub fn ty(&self) -> Type {
        match self {
            Item::Atomic(a) => Type::Atomic(a.ty()),
            Item::Node(n) => Type::Node(n.node_type()),
            Item::Function(f) => f.ty,
            Item::Map(m) => m.ty,
            Item::Array(a) => a.ty,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Item::Function(_) | Item::Map(_) | Item::Array(_))
    }

    pub fn as_atomic(&self) -> Option<&AtomicValue> {
        match self {
            Item::Atomic(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Item::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Narrows the type tag of a function, map or array item.
    /// Returns `false` for items whose type is fixed by their value.
    pub fn refine_type(&mut self, ty: Type) -> bool {
        let slot = match self {
            Item::Function(f) => &mut f.ty,
            Item::Map(m) => &mut m.ty,
            Item::Array(a) => &mut a.ty,
            Item::Atomic(_) | Item::Node(_) => return false,
        };
        *slot = ty;
        true
    }

    /// Effective boolean value of this item on its own.
    pub fn boolean(&self) -> Result<bool, Error> {
        match self {
            Item::Node(_) => Ok(true),
            Item::Atomic(a) => a.ebv(),
            _ => Err(Error::from_code(
                ErrorCode::FORG0006,
                format!("effective boolean value not defined for {}", self.ty()),
            )),
        }
    }

    pub fn string_value(&self) -> Result<String, Error> {
        match self {
            Item::Atomic(a) => Ok(a.string_value()),
            Item::Node(n) => Ok(n.string_value()),
            _ => Err(Error::fi_atom(self)),
        }
    }

    /// Appends the atomized form of this item.
    pub fn atomize(&self, out: &mut Vec<AtomicValue>) -> Result<(), Error> {
        match self {
            Item::Atomic(a) => out.push(a.clone()),
            Item::Node(n) => out.push(AtomicValue::untyped(n.string_value())),
            Item::Array(a) => {
                for member in a.members() {
                    for item in member.iter() {
                        item.atomize(out)?;
                    }
                }
            }
            Item::Function(_) | Item::Map(_) => return Err(Error::fi_atom(self)),
        }
        Ok(())
    }

    pub fn atom_size(&self) -> u64 {
        match self {
            Item::Array(a) => a
                .members()
                .iter()
                .flat_map(Value::iter)
                .map(|i| i.atom_size())
                .sum(),
            _ => 1,
        }
    }

    /// Invokes a function, map or array item.
    pub fn invoke(&self, args: &[Value], qc: &mut QueryContext) -> Result<Value, Error> {
        match self {
            Item::Function(f) => f.invoke(args, qc),
            Item::Map(m) => {
                let key = single_key(self, args)?;
                Ok(m.get(&key).cloned().unwrap_or_default())
            }
            Item::Array(a) => match single_key(self, args)? {
                AtomicValue::Integer(pos) => a.get(pos).cloned(),
                other => Err(Error::type_error(
                    &Item::Atomic(other),
                    Type::INTEGER,
                )),
            },
            _ => Err(Error::type_error(self, Type::FUNCTION)),
        }
    }
}

fn single_key(func: &Item, args: &[Value]) -> Result<AtomicValue, Error> {
    let [arg] = args else {
        return Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("{} expects 1 argument, {} supplied", func, args.len()),
        ));
    };
    let mut atoms = Vec::with_capacity(1);
    for item in arg.iter() {
        item.atomize(&mut atoms)?;
    }
    match atoms.len() {
        1 => Ok(atoms.swap_remove(0)),
        0 => Err(Error::empty_found(None)),
        _ => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("{func}: single key expected"),
        )),
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Item::Atomic(a), Item::Atomic(b)) => a == b,
            (Item::Node(a), Item::Node(b)) => a == b,
            (Item::Function(a), Item::Function(b)) => Arc::ptr_eq(&a.body, &b.body),
            (Item::Map(a), Item::Map(b)) => Arc::ptr_eq(&a.entries, &b.entries),
            (Item::Array(a), Item::Array(b)) => Arc::ptr_eq(&a.members, &b.members),
            _ => false,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Atomic(a) => write!(f, "{a}"),
            Item::Node(n) => write!(f, "{n}"),
            Item::Function(func) => write!(f, "{func}"),
            Item::Map(m) => write!(
                f,
                "map {{ {} }}",
                m.entries.iter().map(|(k, v)| format!("{k}: {v}")).join(", ")
            ),
            Item::Array(a) => write!(f, "[ {} ]", a.members.iter().join(", ")),
        }
    }
}

impl From<AtomicValue> for Item {
    fn from(a: AtomicValue) -> Self {
        Item::Atomic(a)
    }
}

impl From<Node> for Item {
    fn from(n: Node) -> Self {
        Item::Node(n)
    }
}
