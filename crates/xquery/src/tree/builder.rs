use super::finger::{FingerTree, TreeNode};
use super::{Leaf, MAX_DIGIT, MAX_LEAF, TreeSeq};
use crate::types::Type;
use crate::xdm::{Item, Value};
use std::collections::VecDeque;

/// Incremental sequence builder. Items can be added at both ends; full leaves
/// are flushed into the middle tree as soon as a buffer holds more than a digit
/// and a leaf.
pub struct TreeSeqBuilder {
    front: VecDeque<Item>,
    middle: FingerTree,
    back: VecDeque<Item>,
    ty: Option<Type>,
    homogeneous: bool,
}

impl Default for TreeSeqBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeSeqBuilder {
    pub fn new() -> Self {
        Self {
            front: VecDeque::new(),
            middle: FingerTree::Empty,
            back: VecDeque::new(),
            ty: None,
            homogeneous: true,
        }
    }

    fn track(&mut self, ty: Type, homogeneous: bool) {
        match self.ty {
            None => {
                self.ty = Some(ty);
                self.homogeneous = homogeneous;
            }
            Some(cur) => {
                self.homogeneous &= homogeneous && cur == ty;
                self.ty = Some(cur.union(ty));
            }
        }
    }

    pub fn len(&self) -> u64 {
        (self.front.len() + self.back.len()) as u64 + self.middle.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&mut self, item: Item) {
        self.track(item.ty(), true);
        self.back.push_back(item);
        if self.back.len() >= MAX_DIGIT + MAX_LEAF {
            let leaf: Leaf = self.back.drain(..MAX_LEAF).collect();
            self.middle = self.middle.push_back(TreeNode::Leaf(leaf));
        }
    }

    pub fn add_front(&mut self, item: Item) {
        self.track(item.ty(), true);
        self.front.push_front(item);
        let n = self.front.len();
        if n >= MAX_DIGIT + MAX_LEAF {
            let leaf: Leaf = self.front.drain(n - MAX_LEAF..).collect();
            self.middle = self.middle.push_front(TreeNode::Leaf(leaf));
        }
    }

    /// Appends all items of `value`; trees are concatenated, not copied.
    pub fn add_value(&mut self, value: &Value) {
        match value {
            Value::Empty => {}
            Value::Tree(_) => {
                let current = std::mem::take(self).freeze();
                *self = Self::from_value(current.concat(value));
            }
            _ => value.iter().for_each(|item| self.add(item)),
        }
    }

    fn from_value(value: Value) -> Self {
        let mut b = Self::new();
        match value {
            Value::Tree(t) => {
                b.track(t.ty, t.homogeneous);
                b.front.extend(t.left.iter().cloned());
                b.middle = t.middle;
                b.back.extend(t.right.iter().cloned());
            }
            other => other.iter().for_each(|item| b.add(item)),
        }
        b
    }

    pub fn freeze(self) -> Value {
        let ty = self.ty.unwrap_or(Type::Item);
        let mut front: Vec<Item> = self.front.into();
        let back: Vec<Item> = self.back.into();
        if self.middle.is_empty() {
            front.extend(back);
            return TreeSeq::from_flat(front, ty, self.homogeneous);
        }
        TreeSeq::from_parts(front, self.middle, back, ty, self.homogeneous)
    }
}

impl FromIterator<Item> for Value {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        let mut b = TreeSeqBuilder::new();
        iter.into_iter().for_each(|item| b.add(item));
        b.freeze()
    }
}
