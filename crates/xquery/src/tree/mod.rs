//! Persistent sequences backed by a finger tree of item leaves.
//!
//! A [`TreeSeq`] keeps two flat digits of loose items at its ends and a
//! [`finger::FingerTree`] of leaves in between. Every operation returns a new
//! sequence that shares all untouched leaves and nodes with its input.

mod builder;
mod cursor;
pub(crate) mod finger;

pub use builder::TreeSeqBuilder;
pub use cursor::TreeCursor;

use crate::engine::runtime::Error;
use crate::types::Type;
use crate::xdm::{Item, Value};
use core::fmt;
use finger::{FingerTree, TreeNode};
use std::sync::Arc;

/// Fewest items in a leaf of the middle tree.
pub const MIN_LEAF: usize = 8;
/// Most items in a leaf of the middle tree.
pub const MAX_LEAF: usize = 2 * MIN_LEAF - 1;
/// Fewest loose items in a digit.
pub const MIN_DIGIT: usize = MIN_LEAF / 2;
/// Most loose items in a digit.
pub const MAX_DIGIT: usize = MAX_LEAF + MIN_DIGIT;
/// Largest sequence kept as a flat item array.
pub const MAX_SMALL: usize = MIN_LEAF - 1;

pub(crate) type Leaf = Arc<[Item]>;

#[derive(Clone)]
pub struct TreeSeq {
    left: Leaf,
    middle: FingerTree,
    right: Leaf,
    size: u64,
    ty: Type,
    homogeneous: bool,
}

/// Items `from..to` of `items`; positions outside the slice are `None`.
pub(crate) fn slice(items: &[Item], from: isize, to: isize) -> Vec<Option<Item>> {
    (from..to)
        .map(|i| usize::try_from(i).ok().and_then(|i| items.get(i)).cloned())
        .collect()
}

/// Cuts 8 or more items into leaves of even size.
fn chunk(items: Vec<Item>) -> Vec<Leaf> {
    let m = items.len();
    debug_assert!(m >= MIN_LEAF, "{m} items cannot fill a leaf");
    let k = m.div_ceil(MAX_LEAF);
    let (base, extra) = (m / k, m % k);
    let mut rest = items.into_iter();
    (0..k)
        .map(|i| {
            let n = base + usize::from(i < extra);
            rest.by_ref().take(n).collect::<Leaf>()
        })
        .collect()
}

/// `items` with `item` placed at `pos`.
fn insert_into(items: &[Item], pos: usize, item: Item) -> Vec<Item> {
    let mut out = slice(items, 0, items.len() as isize + 1);
    out[pos..].rotate_right(1);
    out[pos] = Some(item);
    out.into_iter().flatten().collect()
}

/// `items` without the item at `pos`.
fn remove_from(items: &[Item], pos: usize) -> Vec<Item> {
    let mut out = slice(items, 0, items.len() as isize);
    out[pos] = None;
    out.into_iter().flatten().collect()
}

fn joined(a: &[Item], b: &[Item]) -> Vec<Item> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out
}

/// Pushes one or two leaves holding `items` (8..=30 items) onto `tree`.
fn push_leaves(tree: FingerTree, items: Vec<Item>) -> FingerTree {
    chunk(items)
        .into_iter()
        .fold(tree, |t, leaf| t.push_back(TreeNode::Leaf(leaf)))
}

impl TreeSeq {
    /// Sequence over `items`; short inputs become flat values.
    pub(crate) fn from_flat(mut items: Vec<Item>, ty: Type, homogeneous: bool) -> Value {
        let n = items.len();
        if n <= MAX_SMALL {
            return Value::small(items, ty, homogeneous);
        }
        let split = if n <= 2 * MAX_DIGIT { n / 2 } else { MIN_LEAF };
        let mut right = items.split_off(split);
        let mut middle = FingerTree::Empty;
        if n > 2 * MAX_DIGIT {
            let tail = right.split_off(right.len() - MIN_LEAF);
            middle = push_leaves(middle, right);
            right = tail;
        }
        Self::assemble(items, middle, right, ty, homogeneous)
    }

    /// Normalises arbitrary digit contents around `middle` into a valid value.
    pub(crate) fn from_parts(
        mut left: Vec<Item>,
        mut middle: FingerTree,
        mut right: Vec<Item>,
        ty: Type,
        homogeneous: bool,
    ) -> Value {
        if left.len() > MAX_DIGIT {
            let spill = MIN_LEAF.max(left.len() - MAX_DIGIT);
            let moved = left.split_off(left.len() - spill);
            for leaf in chunk(moved).into_iter().rev() {
                middle = middle.push_front(TreeNode::Leaf(leaf));
            }
        }
        if right.len() > MAX_DIGIT {
            let spill = MIN_LEAF.max(right.len() - MAX_DIGIT);
            let kept = right.split_off(spill);
            let moved = std::mem::replace(&mut right, kept);
            for leaf in chunk(moved) {
                middle = middle.push_back(TreeNode::Leaf(leaf));
            }
        }
        if left.len() < MIN_DIGIT
            && let Some((node, rest)) = middle.pop_front()
        {
            left.extend(node.into_leaf().iter().cloned());
            middle = rest;
        }
        if right.len() < MIN_DIGIT
            && let Some((node, rest)) = middle.pop_back()
        {
            let mut items = node.into_leaf().to_vec();
            items.append(&mut right);
            right = items;
            middle = rest;
        }
        if middle.is_empty() && (left.len() < MIN_DIGIT || right.len() < MIN_DIGIT) {
            left.append(&mut right);
            return Self::from_flat(left, ty, homogeneous);
        }
        Self::assemble(left, middle, right, ty, homogeneous)
    }

    fn assemble(left: Vec<Item>, middle: FingerTree, right: Vec<Item>, ty: Type, homogeneous: bool) -> Value {
        let size = (left.len() + right.len()) as u64 + middle.size();
        Value::Tree(TreeSeq {
            left: left.into(),
            middle,
            right: right.into(),
            size,
            ty,
            homogeneous,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn homogeneous(&self) -> bool {
        self.homogeneous
    }

    pub(crate) fn set_type(&mut self, ty: Type) {
        if self.ty != ty {
            self.ty = ty;
            self.homogeneous = false;
        }
    }

    fn merged_type(&self, ty: Type) -> (Type, bool) {
        (self.ty.union(ty), self.homogeneous && self.ty == ty)
    }

    /// Item at `pos`.
    ///
    /// # Panics
    /// If `pos` is not below [`TreeSeq::size`].
    pub fn item_at(&self, pos: u64) -> &Item {
        assert!(pos < self.size, "position {pos} out of bounds (size {})", self.size);
        let llen = self.left.len() as u64;
        if pos < llen {
            return &self.left[pos as usize];
        }
        let msize = self.middle.size();
        if pos - llen < msize {
            return self.middle.get(pos - llen);
        }
        &self.right[(pos - llen - msize) as usize]
    }

    /// Leaf or digit holding `pos`, with the position of its first item.
    pub(crate) fn chunk_at(&self, pos: u64) -> (Leaf, u64) {
        let llen = self.left.len() as u64;
        if pos < llen {
            return (self.left.clone(), 0);
        }
        let msize = self.middle.size();
        if pos - llen < msize {
            let (leaf, start) = self.middle.leaf_at(pos - llen);
            return (leaf.clone(), start + llen);
        }
        (self.right.clone(), llen + msize)
    }

    /// Cursor positioned before `pos`.
    pub fn cursor(&self, pos: u64) -> TreeCursor {
        TreeCursor::new(self.clone(), pos)
    }

    pub fn push_front(&self, item: Item) -> TreeSeq {
        let (ty, homogeneous) = self.merged_type(item.ty());
        let (left, middle) = if self.left.len() < MAX_DIGIT {
            let mut left = Vec::with_capacity(self.left.len() + 1);
            left.push(item);
            left.extend_from_slice(&self.left);
            (left, self.middle.clone())
        } else {
            let mut left = Vec::with_capacity(MIN_DIGIT + 1);
            left.push(item);
            left.extend_from_slice(&self.left[..MIN_DIGIT]);
            let leaf: Leaf = self.left[MIN_DIGIT..].into();
            (left, self.middle.push_front(TreeNode::Leaf(leaf)))
        };
        TreeSeq {
            left: left.into(),
            middle,
            right: self.right.clone(),
            size: self.size + 1,
            ty,
            homogeneous,
        }
    }

    pub fn push_back(&self, item: Item) -> TreeSeq {
        let (ty, homogeneous) = self.merged_type(item.ty());
        let (middle, right) = if self.right.len() < MAX_DIGIT {
            let mut right = self.right.to_vec();
            right.push(item);
            (self.middle.clone(), right)
        } else {
            let leaf: Leaf = self.right[..MAX_LEAF].into();
            let mut right = self.right[MAX_LEAF..].to_vec();
            right.push(item);
            (self.middle.push_back(TreeNode::Leaf(leaf)), right)
        };
        TreeSeq {
            left: self.left.clone(),
            middle,
            right: right.into(),
            size: self.size + 1,
            ty,
            homogeneous,
        }
    }

    /// Copy with `item` inserted at `pos`.
    pub fn insert(&self, pos: u64, item: Item) -> Value {
        assert!(pos <= self.size, "position {pos} out of bounds (size {})", self.size);
        if pos == 0 {
            return Value::Tree(self.push_front(item));
        }
        if pos == self.size {
            return Value::Tree(self.push_back(item));
        }
        let (ty, homogeneous) = self.merged_type(item.ty());
        let llen = self.left.len() as u64;
        let msize = self.middle.size();
        if pos < llen {
            let left = insert_into(&self.left, pos as usize, item);
            if left.len() <= MAX_DIGIT {
                return self.with_middle(left.into(), self.middle.clone(), self.right.clone(), ty, homogeneous);
            }
            return Self::from_parts(left, self.middle.clone(), self.right.to_vec(), ty, homogeneous);
        }
        if pos - llen < msize {
            let mpos = pos - llen;
            let (l, node, r) = self.middle.split_at(mpos);
            let leaf = node.into_leaf();
            let items = insert_into(&leaf, (mpos - l.size()) as usize, item);
            let middle = push_leaves(l, items).concat(&r);
            return self.with_middle(self.left.clone(), middle, self.right.clone(), ty, homogeneous);
        }
        let right = insert_into(&self.right, (pos - llen - msize) as usize, item);
        if right.len() <= MAX_DIGIT {
            return self.with_middle(self.left.clone(), self.middle.clone(), right.into(), ty, homogeneous);
        }
        Self::from_parts(self.left.to_vec(), self.middle.clone(), right, ty, homogeneous)
    }

    fn with_middle(&self, left: Leaf, middle: FingerTree, right: Leaf, ty: Type, homogeneous: bool) -> Value {
        let size = (left.len() + right.len()) as u64 + middle.size();
        Value::Tree(TreeSeq {
            left,
            middle,
            right,
            size,
            ty,
            homogeneous,
        })
    }

    /// Copy with all items of `value` inserted before `pos`.
    pub fn insert_before(&self, pos: u64, value: &Value) -> Value {
        assert!(pos <= self.size, "position {pos} out of bounds (size {})", self.size);
        let n = value.size();
        if n == 0 {
            return Value::Tree(self.clone());
        }
        if n == 1 {
            return self.insert(pos, value.item_at(0));
        }
        if let Value::Tree(other) = value {
            if pos == 0 {
                return Value::Tree(other.concat(self));
            }
            if pos == self.size {
                return Value::Tree(self.concat(other));
            }
        }
        let right = self.size - pos;
        let mut b = TreeSeqBuilder::new();
        if pos < MAX_SMALL as u64 {
            b.add_value(value);
            for i in (0..pos).rev() {
                b.add_front(self.item_at(i).clone());
            }
            b.add_value(&self.sub_seq(pos, right));
        } else if right < MAX_SMALL as u64 {
            b.add_value(&self.sub_seq(0, pos));
            b.add_value(value);
            for i in pos..self.size {
                b.add(self.item_at(i).clone());
            }
        } else {
            b.add_value(&self.sub_seq(0, pos));
            b.add_value(value);
            b.add_value(&self.sub_seq(pos, right));
        }
        b.freeze()
    }

    /// Copy without the item at `pos`.
    pub fn remove(&self, pos: u64) -> Value {
        assert!(pos < self.size, "position {pos} out of bounds (size {})", self.size);
        let (ty, homogeneous) = (self.ty, self.homogeneous);
        let llen = self.left.len() as u64;
        let msize = self.middle.size();
        if pos < llen {
            let left = remove_from(&self.left, pos as usize);
            if left.len() >= MIN_DIGIT {
                return self.with_middle(left.into(), self.middle.clone(), self.right.clone(), ty, homogeneous);
            }
            return Self::from_parts(left, self.middle.clone(), self.right.to_vec(), ty, homogeneous);
        }
        if pos - llen < msize {
            let mpos = pos - llen;
            let (l, node, r) = self.middle.split_at(mpos);
            let leaf = node.into_leaf();
            let items = remove_from(&leaf, (mpos - l.size()) as usize);
            if items.len() >= MIN_LEAF {
                let middle = l.push_back(TreeNode::Leaf(items.into())).concat(&r);
                return self.with_middle(self.left.clone(), middle, self.right.clone(), ty, homogeneous);
            }
            // an underfull leaf merges with a neighbour
            if let Some((next, rest)) = r.pop_front() {
                let middle = push_leaves(l, joined(&items, &next.into_leaf())).concat(&rest);
                return self.with_middle(self.left.clone(), middle, self.right.clone(), ty, homogeneous);
            }
            if let Some((prev, rest)) = l.pop_back() {
                let middle = push_leaves(rest, joined(&prev.into_leaf(), &items));
                return self.with_middle(self.left.clone(), middle, self.right.clone(), ty, homogeneous);
            }
            return Self::from_parts(self.left.to_vec(), FingerTree::Empty, joined(&items, &self.right), ty, homogeneous);
        }
        let right = remove_from(&self.right, (pos - llen - msize) as usize);
        if right.len() >= MIN_DIGIT {
            return self.with_middle(self.left.clone(), self.middle.clone(), right.into(), ty, homogeneous);
        }
        Self::from_parts(self.left.to_vec(), self.middle.clone(), right, ty, homogeneous)
    }

    pub fn concat(&self, other: &TreeSeq) -> TreeSeq {
        let (ty, homogeneous) = self.merged_type(other.ty);
        let leaves = chunk(joined(&self.right, &other.left))
            .into_iter()
            .map(TreeNode::Leaf)
            .collect();
        TreeSeq {
            left: self.left.clone(),
            middle: FingerTree::app3(&self.middle, leaves, &other.middle),
            right: other.right.clone(),
            size: self.size + other.size,
            ty,
            homogeneous: homogeneous && other.homogeneous,
        }
    }

    /// `len` items starting at `from`.
    pub fn sub_seq(&self, from: u64, len: u64) -> Value {
        assert!(
            from.checked_add(len).is_some_and(|end| end <= self.size),
            "range {from}+{len} out of bounds (size {})",
            self.size
        );
        if len == 0 {
            return Value::Empty;
        }
        if len == self.size {
            return Value::Tree(self.clone());
        }
        if len <= MAX_SMALL as u64 {
            let items = self.cursor(from).take(len as usize).collect();
            return Value::small(items, self.ty, self.homogeneous);
        }
        let (l, m, r) = drop_front(&self.left, &self.middle, &self.right, from);
        let (l, m, r) = take_front(&l, &m, &r, len);
        Self::from_parts(l, m, r, self.ty, self.homogeneous)
    }

    pub fn reverse(&self) -> Value {
        let mut items: Vec<Item> = self.cursor(0).collect();
        items.reverse();
        Self::from_flat(items, self.ty, self.homogeneous)
    }

    /// Atomized sequence; shares this tree when it is already atomic.
    pub fn atom_value(&self) -> Result<Value, Error> {
        if self.ty.is_atomic() {
            return Ok(Value::Tree(self.clone()));
        }
        let mut b = TreeSeqBuilder::new();
        let mut atoms = Vec::new();
        for item in self.cursor(0) {
            item.atomize(&mut atoms)?;
            atoms.drain(..).for_each(|a| b.add(Item::Atomic(a)));
        }
        Ok(b.freeze())
    }

    pub fn atom_size(&self) -> u64 {
        if self.ty.is_atomic() || self.ty.is_node() {
            return self.size;
        }
        self.cursor(0).map(|i| i.atom_size()).sum()
    }

    /// Checks digit and leaf bounds, cached sizes and the type tag.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (side, digit) in [("left", &self.left), ("right", &self.right)] {
            if !(MIN_DIGIT..=MAX_DIGIT).contains(&digit.len()) {
                return Err(format!("{side} digit holds {} items", digit.len()));
            }
        }
        let msize = self.middle.check(0)?;
        let total = (self.left.len() + self.right.len()) as u64 + msize;
        if total != self.size {
            return Err(format!("sequence caches size {}, holds {total}", self.size));
        }
        for item in self.cursor(0) {
            let ty = item.ty();
            if !ty.instance_of(self.ty) {
                return Err(format!("{ty} item in a {} sequence", self.ty));
            }
            if self.homogeneous && ty != self.ty {
                return Err(format!("{ty} item in a homogeneous {} sequence", self.ty));
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn leaves(&self) -> Vec<Leaf> {
        self.middle.leaves()
    }
}

/// Parts with the first `k` items removed.
fn drop_front(left: &[Item], middle: &FingerTree, right: &[Item], k: u64) -> (Vec<Item>, FingerTree, Vec<Item>) {
    let llen = left.len() as u64;
    if k < llen {
        return (left[k as usize..].to_vec(), middle.clone(), right.to_vec());
    }
    let k = k - llen;
    let msize = middle.size();
    if k < msize {
        let (l, node, r) = middle.split_at(k);
        let leaf = node.into_leaf();
        return (leaf[(k - l.size()) as usize..].to_vec(), r, right.to_vec());
    }
    (right[(k - msize) as usize..].to_vec(), FingerTree::Empty, Vec::new())
}

/// Parts restricted to the first `k` items.
fn take_front(left: &[Item], middle: &FingerTree, right: &[Item], k: u64) -> (Vec<Item>, FingerTree, Vec<Item>) {
    let llen = left.len() as u64;
    if k <= llen {
        return (left[..k as usize].to_vec(), FingerTree::Empty, Vec::new());
    }
    let k = k - llen;
    let msize = middle.size();
    if k == msize {
        return (left.to_vec(), middle.clone(), Vec::new());
    }
    if k < msize {
        let (l, node, _) = middle.split_at(k);
        let leaf = node.into_leaf();
        return (left.to_vec(), l.clone(), leaf[..(k - l.size()) as usize].to_vec());
    }
    (left.to_vec(), middle.clone(), right[..(k - msize) as usize].to_vec())
}

impl fmt::Debug for TreeSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeSeq")
            .field("size", &self.size)
            .field("ty", &self.ty)
            .field("homogeneous", &self.homogeneous)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(range: std::ops::Range<i64>) -> Vec<Item> {
        range.map(Item::integer).collect()
    }

    fn tree(n: i64) -> TreeSeq {
        match TreeSeq::from_flat(ints(0..n), Type::INTEGER, true) {
            Value::Tree(t) => t,
            other => panic!("expected a tree, got {other:?}"),
        }
    }

    fn values(v: &Value) -> Vec<i64> {
        v.iter()
            .map(|i| match i {
                Item::Atomic(crate::xdm::AtomicValue::Integer(n)) => n,
                other => panic!("expected integer, got {other}"),
            })
            .collect()
    }

    #[test]
    fn slice_pads_with_none() {
        let items = ints(0..3);
        let s = slice(&items, -1, 4);
        assert_eq!(s.len(), 5);
        assert!(s[0].is_none() && s[4].is_none());
        assert_eq!(s[1], Some(Item::integer(0)));
    }

    #[test]
    fn chunk_sizes_are_even() {
        let sizes: Vec<usize> = chunk(ints(0..31)).iter().map(|l| l.len()).collect();
        assert_eq!(sizes, vec![11, 10, 10]);
        let sizes: Vec<usize> = chunk(ints(0..8)).iter().map(|l| l.len()).collect();
        assert_eq!(sizes, vec![8]);
    }

    #[test]
    fn push_front_keeps_middle_shared() {
        let t = tree(200);
        let u = t.push_front(Item::integer(-1));
        u.check_invariants().unwrap();
        let before = t.leaves();
        let after = u.leaves();
        let shared = after
            .iter()
            .filter(|l| before.iter().any(|b| Arc::ptr_eq(b, l)))
            .count();
        assert!(shared >= before.len() - 1);
        assert_eq!(t.size(), 200);
        assert_eq!(u.item_at(0), &Item::integer(-1));
    }

    #[test]
    fn insert_in_middle_touches_one_leaf() {
        let t = tree(300);
        let v = t.insert(150, Item::integer(-1));
        let Value::Tree(u) = &v else { panic!("expected a tree") };
        u.check_invariants().unwrap();
        let before = t.leaves();
        let fresh = u
            .leaves()
            .iter()
            .filter(|l| !before.iter().any(|b| Arc::ptr_eq(b, l)))
            .count();
        assert!(fresh <= 2, "{fresh} leaves rebuilt");
        assert_eq!(u.item_at(150), &Item::integer(-1));
        assert_eq!(u.item_at(151), &Item::integer(150));
    }

    #[test]
    fn remove_merges_underfull_leaves() {
        let mut v = Value::Tree(tree(120));
        let mut model: Vec<i64> = (0..120).collect();
        for pos in [60u64, 60, 60, 60, 60, 60, 60, 60, 10, 100] {
            v = v.remove(pos);
            model.remove(pos as usize);
            if let Value::Tree(t) = &v {
                t.check_invariants().unwrap();
            }
        }
        assert_eq!(values(&v), model);
    }

    #[test]
    fn sub_seq_shrinks_to_small_values() {
        let t = tree(100);
        assert!(matches!(t.sub_seq(10, 7), Value::Items(_)));
        assert!(matches!(t.sub_seq(10, 1), Value::Item(_)));
        assert!(matches!(t.sub_seq(10, 0), Value::Empty));
        let v = t.sub_seq(3, 90);
        let Value::Tree(s) = &v else { panic!("expected a tree") };
        s.check_invariants().unwrap();
        assert_eq!(values(&v), (3..93).collect::<Vec<_>>());
    }

    #[test]
    fn concat_of_large_trees() {
        let a = tree(1000);
        let b = tree(777);
        let c = a.concat(&b);
        c.check_invariants().unwrap();
        assert_eq!(c.size(), 1777);
        assert_eq!(c.item_at(1000), &Item::integer(0));
        assert_eq!(c.item_at(999), &Item::integer(999));
    }

    #[test]
    fn concat_shares_both_middles() {
        let a = tree(1000);
        let b = tree(777);
        let (left, right) = (a.leaves(), b.leaves());
        let c = a.concat(&b);
        let joined = c.leaves();
        assert!(joined.len() >= left.len() + right.len());
        let fresh = joined.len() - left.len() - right.len();
        assert!(fresh <= 3, "{fresh} leaves rebuilt");
        assert!(left.iter().zip(&joined).all(|(x, y)| Arc::ptr_eq(x, y)));
        assert!(right.iter().rev().zip(joined.iter().rev()).all(|(x, y)| Arc::ptr_eq(x, y)));
    }

    #[test]
    fn mixed_types_widen_the_tag() {
        let t = tree(20).push_back(Item::string("x"));
        assert_eq!(t.ty(), Type::ANY_ATOMIC);
        assert!(!t.homogeneous());
        t.check_invariants().unwrap();
    }
}
