use super::{AtomicValue, Item};
use crate::engine::runtime::Error;
use crate::tree::{MAX_SMALL, TreeCursor, TreeSeq, TreeSeqBuilder};
use crate::types::{Occurrence, SeqType, Type};
use core::fmt;
use std::sync::Arc;

/// Flat sequence of two to seven items.
#[derive(Debug, Clone)]
pub struct ItemSeq {
    items: Arc<[Item]>,
    ty: Type,
    homogeneous: bool,
}

impl ItemSeq {
    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

/// Ascending integer range of `len` integers from `start`. The length never
/// exceeds [`RangeSeq::MAX_LEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSeq {
    start: i64,
    len: u64,
}

impl RangeSeq {
    /// Length of `0 to i64::MAX`.
    pub const MAX_LEN: u64 = 1 << 63;

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Last integer of the range.
    pub fn end(&self) -> i64 {
        self.start + (self.len - 1) as i64
    }

    fn at(&self, pos: u64) -> i64 {
        self.start + pos as i64
    }
}

/// A fully materialised sequence.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Empty,
    Item(Item),
    Items(ItemSeq),
    Range(RangeSeq),
    Tree(TreeSeq),
}

fn common_type(items: &[Item]) -> (Type, bool) {
    let mut iter = items.iter().map(Item::ty);
    let Some(first) = iter.next() else {
        return (Type::Item, true);
    };
    iter.fold((first, true), |(ty, homo), t| (ty.union(t), homo && t == ty))
}

impl Value {
    pub fn from_items(items: Vec<Item>) -> Value {
        let (ty, homogeneous) = common_type(&items);
        TreeSeq::from_flat(items, ty, homogeneous)
    }

    /// Flat value with a known type tag; `items` holds at most seven entries.
    pub(crate) fn small(mut items: Vec<Item>, ty: Type, homogeneous: bool) -> Value {
        debug_assert!(items.len() <= MAX_SMALL);
        match items.len() {
            0 => Value::Empty,
            1 => Value::Item(items.swap_remove(0)),
            _ => Value::Items(ItemSeq {
                items: items.into(),
                ty,
                homogeneous,
            }),
        }
    }

    pub fn integer(i: i64) -> Value {
        Value::Item(Item::integer(i))
    }

    pub fn boolean(b: bool) -> Value {
        Value::Item(Item::from_bool(b))
    }

    /// Inclusive integer range; empty when `end < start`.
    ///
    /// # Panics
    /// If the range holds more than [`RangeSeq::MAX_LEN`] integers.
    pub fn range(start: i64, end: i64) -> Value {
        match Value::try_range(start, end) {
            Ok(v) => v,
            Err(err) => panic!("{}", err.message),
        }
    }

    /// As [`Value::range`], failing with `err:XPDY0130` for oversized ranges.
    pub fn try_range(start: i64, end: i64) -> Result<Value, Error> {
        if end < start {
            return Ok(Value::Empty);
        }
        let span = end.abs_diff(start);
        if span >= RangeSeq::MAX_LEN {
            return Err(Error::range_size(start, end));
        }
        Ok(match span {
            0 => Value::integer(start),
            _ => Value::Range(RangeSeq { start, len: span + 1 }),
        })
    }

    pub fn size(&self) -> u64 {
        match self {
            Value::Empty => 0,
            Value::Item(_) => 1,
            Value::Items(s) => s.items.len() as u64,
            Value::Range(r) => r.len,
            Value::Tree(t) => t.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Item at `pos`.
    ///
    /// # Panics
    /// If `pos` is not below [`Value::size`].
    pub fn item_at(&self, pos: u64) -> Item {
        let size = self.size();
        assert!(pos < size, "position {pos} out of bounds (size {size})");
        match self {
            Value::Empty => unreachable!(),
            Value::Item(i) => i.clone(),
            Value::Items(s) => s.items[pos as usize].clone(),
            Value::Range(r) => Item::integer(r.at(pos)),
            Value::Tree(t) => t.item_at(pos).clone(),
        }
    }

    pub fn first(&self) -> Option<Item> {
        (!self.is_empty()).then(|| self.item_at(0))
    }

    pub fn iter(&self) -> ValueIter {
        self.iter_at(0)
    }

    /// Iterator starting at `pos`.
    pub fn iter_at(&self, pos: u64) -> ValueIter {
        let state = match self {
            Value::Empty => IterState::Done,
            Value::Item(i) => IterState::One(if pos == 0 { Some(i.clone()) } else { None }),
            Value::Items(s) => IterState::Items {
                items: s.items.clone(),
                pos: pos as usize,
            },
            Value::Range(r) if pos < r.len => IterState::Range {
                next: r.at(pos),
                left: r.len - pos,
            },
            Value::Range(_) => IterState::Done,
            Value::Tree(t) => IterState::Tree(t.cursor(pos.min(t.size()))),
        };
        ValueIter(state)
    }

    pub fn to_vec(&self) -> Vec<Item> {
        self.iter().collect()
    }

    /// Most specific item type known for all items.
    pub fn ty(&self) -> Type {
        match self {
            Value::Empty => Type::Item,
            Value::Item(i) => i.ty(),
            Value::Items(s) => s.ty,
            Value::Range(_) => Type::INTEGER,
            Value::Tree(t) => t.ty(),
        }
    }

    pub fn seq_type(&self) -> SeqType {
        match self {
            Value::Empty => SeqType::EMPTY,
            v => SeqType::new(v.ty(), Occurrence::of_size(v.size())),
        }
    }

    /// Whether all items have exactly the type reported by [`Value::ty`].
    pub fn homogeneous(&self) -> bool {
        match self {
            Value::Items(s) => s.homogeneous,
            Value::Tree(t) => t.homogeneous(),
            _ => true,
        }
    }

    /// Narrows the type tag of a multi-item sequence. The sequence stops
    /// counting as homogeneous, as its items may be of subtypes.
    pub fn refine_type(&mut self, ty: Type) {
        match self {
            Value::Items(s) if s.ty != ty => {
                s.ty = ty;
                s.homogeneous = false;
            }
            Value::Tree(t) => t.set_type(ty),
            _ => {}
        }
    }

    pub fn atom_value(&self) -> Result<Value, Error> {
        match self {
            Value::Empty | Value::Range(_) => Ok(self.clone()),
            Value::Item(Item::Atomic(_)) => Ok(self.clone()),
            Value::Items(s) if s.ty.is_atomic() => Ok(self.clone()),
            Value::Tree(t) => t.atom_value(),
            _ => {
                let mut atoms = Vec::new();
                for item in self.iter() {
                    item.atomize(&mut atoms)?;
                }
                Ok(atoms.into_iter().map(Item::Atomic).collect())
            }
        }
    }

    pub fn atom_size(&self) -> u64 {
        match self {
            Value::Tree(t) => t.atom_size(),
            Value::Range(r) => r.len,
            _ => self.iter().map(|i| i.atom_size()).sum(),
        }
    }

    /// `len` items starting at `from`.
    pub fn sub_seq(&self, from: u64, len: u64) -> Value {
        let size = self.size();
        assert!(
            from.checked_add(len).is_some_and(|end| end <= size),
            "range {from}+{len} out of bounds (size {size})"
        );
        if len == size {
            return self.clone();
        }
        if len == 0 {
            return Value::Empty;
        }
        match self {
            Value::Range(r) => Value::range(r.at(from), r.at(from + len - 1)),
            Value::Tree(t) => t.sub_seq(from, len),
            Value::Items(s) => Value::small(
                s.items[from as usize..(from + len) as usize].to_vec(),
                s.ty,
                s.homogeneous,
            ),
            _ => Value::Empty,
        }
    }

    /// Copy with `item` inserted at `pos`.
    pub fn insert(&self, pos: u64, item: Item) -> Value {
        let size = self.size();
        assert!(pos <= size, "position {pos} out of bounds (size {size})");
        if let Value::Tree(t) = self {
            return t.insert(pos, item);
        }
        let mut items = self.to_vec();
        items.insert(pos as usize, item);
        Value::from_items(items)
    }

    /// Copy with all items of `value` inserted before `pos`.
    pub fn insert_before(&self, pos: u64, value: &Value) -> Value {
        let size = self.size();
        assert!(pos <= size, "position {pos} out of bounds (size {size})");
        if let Value::Tree(t) = self {
            return t.insert_before(pos, value);
        }
        if value.is_empty() {
            return self.clone();
        }
        if pos == 0 {
            return value.concat(self);
        }
        if pos == size {
            return self.concat(value);
        }
        let mut b = TreeSeqBuilder::new();
        b.add_value(&self.sub_seq(0, pos));
        b.add_value(value);
        b.add_value(&self.sub_seq(pos, size - pos));
        b.freeze()
    }

    /// Copy without the item at `pos`.
    pub fn remove(&self, pos: u64) -> Value {
        let size = self.size();
        assert!(pos < size, "position {pos} out of bounds (size {size})");
        match self {
            Value::Tree(t) => t.remove(pos),
            Value::Range(r) if pos == 0 => Value::range(r.start + 1, r.end()),
            Value::Range(r) if pos == size - 1 => Value::range(r.start, r.end() - 1),
            Value::Items(s) => {
                let mut items = s.items.to_vec();
                items.remove(pos as usize);
                Value::small(items, s.ty, s.homogeneous)
            }
            _ => {
                let mut items = self.to_vec();
                items.remove(pos as usize);
                Value::from_items(items)
            }
        }
    }

    pub fn concat(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Empty, _) => other.clone(),
            (_, Value::Empty) => self.clone(),
            (Value::Range(a), Value::Range(b))
                if a.end().checked_add(1) == Some(b.start)
                    && a.len.checked_add(b.len).is_some_and(|n| n <= RangeSeq::MAX_LEN) =>
            {
                Value::Range(RangeSeq {
                    start: a.start,
                    len: a.len + b.len,
                })
            }
            (Value::Tree(a), Value::Tree(b)) => Value::Tree(a.concat(b)),
            (Value::Tree(a), b) if b.size() <= MAX_SMALL as u64 => {
                Value::Tree(b.iter().fold(a.clone(), |t, item| t.push_back(item)))
            }
            (a, Value::Tree(b)) if a.size() <= MAX_SMALL as u64 => {
                let items = a.to_vec();
                Value::Tree(items.into_iter().rev().fold(b.clone(), |t, item| t.push_front(item)))
            }
            _ => {
                let mut b = TreeSeqBuilder::new();
                b.add_value(self);
                b.add_value(other);
                b.freeze()
            }
        }
    }

    pub fn reverse(&self) -> Value {
        match self {
            Value::Tree(t) => t.reverse(),
            Value::Empty | Value::Item(_) => self.clone(),
            _ => {
                let mut items = self.to_vec();
                items.reverse();
                TreeSeq::from_flat(items, self.ty(), self.homogeneous())
            }
        }
    }
}

/// Item-wise equality, independent of the representation.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.size() == other.size() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl From<Item> for Value {
    fn from(item: Item) -> Self {
        Value::Item(item)
    }
}

impl From<AtomicValue> for Value {
    fn from(a: AtomicValue) -> Self {
        Value::Item(Item::Atomic(a))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SHOWN: usize = 16;
        match self {
            Value::Empty => f.write_str("()"),
            Value::Item(i) => write!(f, "{i}"),
            Value::Range(r) => write!(f, "({} to {})", r.start, r.end()),
            v => {
                f.write_str("(")?;
                for (n, item) in v.iter().take(SHOWN).enumerate() {
                    if n > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if v.size() > SHOWN as u64 {
                    f.write_str(", ...")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Clone)]
enum IterState {
    Done,
    One(Option<Item>),
    Items { items: Arc<[Item]>, pos: usize },
    Range { next: i64, left: u64 },
    Tree(TreeCursor),
}

/// Owning iterator over the items of a [`Value`].
#[derive(Clone)]
pub struct ValueIter(IterState);

impl ValueIter {
    /// Items not yet returned.
    pub fn remaining(&self) -> u64 {
        match &self.0 {
            IterState::Done => 0,
            IterState::One(i) => u64::from(i.is_some()),
            IterState::Items { items, pos } => items.len().saturating_sub(*pos) as u64,
            IterState::Range { left, .. } => *left,
            IterState::Tree(c) => c.len() as u64,
        }
    }
}

impl Iterator for ValueIter {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        match &mut self.0 {
            IterState::Done => None,
            IterState::One(i) => i.take(),
            IterState::Items { items, pos } => {
                let item = items.get(*pos).cloned();
                *pos += 1;
                item
            }
            IterState::Range { next, left } => {
                if *left == 0 {
                    return None;
                }
                let item = Item::integer(*next);
                *left -= 1;
                if *left > 0 {
                    *next += 1;
                }
                Some(item)
            }
            IterState::Tree(c) => c.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for ValueIter {}

impl<'a> IntoIterator for &'a Value {
    type Item = Item;
    type IntoIter = ValueIter;

    fn into_iter(self) -> ValueIter {
        self.iter()
    }
}
