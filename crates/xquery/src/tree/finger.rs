//! 2-3 finger tree over item leaves, measured by item count.
//!
//! At depth 0 the elements are leaves of `MIN_LEAF..=MAX_LEAF` items; every
//! deeper level groups the elements of the level above into inner nodes of two
//! or three children. Digits hold one to four elements. All nodes are shared
//! through `Arc` and never modified after construction.

use super::{Leaf, MAX_LEAF, MIN_LEAF};
use crate::xdm::Item;
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

#[derive(Clone)]
pub(crate) enum TreeNode {
    Leaf(Leaf),
    Inner(Arc<InnerNode>),
}

pub(crate) struct InnerNode {
    children: SmallVec<[TreeNode; 3]>,
    size: u64,
}

type Digit = SmallVec<[TreeNode; 4]>;

impl TreeNode {
    pub(crate) fn size(&self) -> u64 {
        match self {
            TreeNode::Leaf(l) => l.len() as u64,
            TreeNode::Inner(n) => n.size,
        }
    }

    fn inner(children: &[TreeNode]) -> TreeNode {
        let size = children.iter().map(TreeNode::size).sum();
        TreeNode::Inner(Arc::new(InnerNode {
            children: children.iter().cloned().collect(),
            size,
        }))
    }

    fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Inner(n) => &n.children,
            TreeNode::Leaf(_) => &[],
        }
    }

    /// Leaf payload; only valid for elements of the top level.
    pub(crate) fn into_leaf(self) -> Leaf {
        match self {
            TreeNode::Leaf(l) => l,
            TreeNode::Inner(_) => unreachable!("inner node at leaf level"),
        }
    }

    fn leaf_at(&self, i: u64) -> (&Leaf, u64) {
        match self {
            TreeNode::Leaf(l) => (l, 0),
            TreeNode::Inner(n) => {
                let (k, offset) = locate(&n.children, i);
                let (leaf, start) = n.children[k].leaf_at(i - offset);
                (leaf, start + offset)
            }
        }
    }

    fn check(&self, depth: usize) -> Result<u64, String> {
        match (self, depth) {
            (TreeNode::Leaf(l), 0) => {
                if (MIN_LEAF..=MAX_LEAF).contains(&l.len()) {
                    Ok(l.len() as u64)
                } else {
                    Err(format!("leaf holds {} items", l.len()))
                }
            }
            (TreeNode::Inner(n), d) if d > 0 => {
                if !(2..=3).contains(&n.children.len()) {
                    return Err(format!("inner node has {} children", n.children.len()));
                }
                let mut total = 0;
                for c in &n.children {
                    total += c.check(d - 1)?;
                }
                if total == n.size {
                    Ok(total)
                } else {
                    Err(format!("inner node caches size {}, holds {total}", n.size))
                }
            }
            _ => Err(format!("node kind does not match depth {depth}")),
        }
    }

    #[cfg(test)]
    fn collect_leaves(&self, out: &mut Vec<Leaf>) {
        match self {
            TreeNode::Leaf(l) => out.push(l.clone()),
            TreeNode::Inner(n) => n.children.iter().for_each(|c| c.collect_leaves(out)),
        }
    }
}

/// Index of the element containing position `i` and the number of items before it.
fn locate(nodes: &[TreeNode], i: u64) -> (usize, u64) {
    let mut offset = 0;
    for (k, n) in nodes.iter().enumerate() {
        let s = n.size();
        if i < offset + s {
            return (k, offset);
        }
        offset += s;
    }
    panic!("position {i} beyond {offset} items");
}

fn digit_size(nodes: &[TreeNode]) -> u64 {
    nodes.iter().map(TreeNode::size).sum()
}

pub(crate) struct Deep {
    left: Digit,
    middle: FingerTree,
    right: Digit,
    size: u64,
}

#[derive(Clone, Default)]
pub(crate) enum FingerTree {
    #[default]
    Empty,
    Single(TreeNode),
    Deep(Arc<Deep>),
}

fn deep(left: Digit, middle: FingerTree, right: Digit) -> FingerTree {
    let size = digit_size(&left) + middle.size() + digit_size(&right);
    FingerTree::Deep(Arc::new(Deep {
        left,
        middle,
        right,
        size,
    }))
}

impl FingerTree {
    pub(crate) fn size(&self) -> u64 {
        match self {
            FingerTree::Empty => 0,
            FingerTree::Single(n) => n.size(),
            FingerTree::Deep(d) => d.size,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, FingerTree::Empty)
    }

    fn from_nodes(nodes: &[TreeNode]) -> FingerTree {
        nodes
            .iter()
            .fold(FingerTree::Empty, |t, n| t.push_back(n.clone()))
    }

    pub(crate) fn push_front(&self, node: TreeNode) -> FingerTree {
        match self {
            FingerTree::Empty => FingerTree::Single(node),
            FingerTree::Single(b) => deep(smallvec![node], FingerTree::Empty, smallvec![b.clone()]),
            FingerTree::Deep(d) if d.left.len() == 4 => {
                let l = &d.left;
                let spill = TreeNode::inner(&l[1..]);
                deep(
                    smallvec![node, l[0].clone()],
                    d.middle.push_front(spill),
                    d.right.clone(),
                )
            }
            FingerTree::Deep(d) => {
                let mut left = Digit::new();
                left.push(node);
                left.extend(d.left.iter().cloned());
                deep(left, d.middle.clone(), d.right.clone())
            }
        }
    }

    pub(crate) fn push_back(&self, node: TreeNode) -> FingerTree {
        match self {
            FingerTree::Empty => FingerTree::Single(node),
            FingerTree::Single(a) => deep(smallvec![a.clone()], FingerTree::Empty, smallvec![node]),
            FingerTree::Deep(d) if d.right.len() == 4 => {
                let r = &d.right;
                let spill = TreeNode::inner(&r[..3]);
                deep(
                    d.left.clone(),
                    d.middle.push_back(spill),
                    smallvec![r[3].clone(), node],
                )
            }
            FingerTree::Deep(d) => {
                let mut right = d.right.clone();
                right.push(node);
                deep(d.left.clone(), d.middle.clone(), right)
            }
        }
    }

    pub(crate) fn pop_front(&self) -> Option<(TreeNode, FingerTree)> {
        match self {
            FingerTree::Empty => None,
            FingerTree::Single(x) => Some((x.clone(), FingerTree::Empty)),
            FingerTree::Deep(d) => Some((
                d.left[0].clone(),
                Self::deep_left(&d.left[1..], &d.middle, &d.right),
            )),
        }
    }

    pub(crate) fn pop_back(&self) -> Option<(TreeNode, FingerTree)> {
        match self {
            FingerTree::Empty => None,
            FingerTree::Single(x) => Some((x.clone(), FingerTree::Empty)),
            FingerTree::Deep(d) => {
                let n = d.right.len();
                Some((
                    d.right[n - 1].clone(),
                    Self::deep_right(&d.left, &d.middle, &d.right[..n - 1]),
                ))
            }
        }
    }

    /// Deep tree whose left digit may be empty.
    fn deep_left(left: &[TreeNode], middle: &FingerTree, right: &[TreeNode]) -> FingerTree {
        if !left.is_empty() {
            return deep(left.iter().cloned().collect(), middle.clone(), right.iter().cloned().collect());
        }
        match middle.pop_front() {
            Some((node, rest)) => deep(
                node.children().iter().cloned().collect(),
                rest,
                right.iter().cloned().collect(),
            ),
            None => Self::from_nodes(right),
        }
    }

    /// Deep tree whose right digit may be empty.
    fn deep_right(left: &[TreeNode], middle: &FingerTree, right: &[TreeNode]) -> FingerTree {
        if !right.is_empty() {
            return deep(left.iter().cloned().collect(), middle.clone(), right.iter().cloned().collect());
        }
        match middle.pop_back() {
            Some((node, rest)) => deep(
                left.iter().cloned().collect(),
                rest,
                node.children().iter().cloned().collect(),
            ),
            None => Self::from_nodes(left),
        }
    }

    pub(crate) fn concat(&self, other: &FingerTree) -> FingerTree {
        Self::app3(self, Vec::new(), other)
    }

    /// Concatenates `xs`, the loose elements `ts`, and `ys`.
    pub(crate) fn app3(xs: &FingerTree, ts: Vec<TreeNode>, ys: &FingerTree) -> FingerTree {
        match (xs, ys) {
            (FingerTree::Empty, _) => ts.into_iter().rev().fold(ys.clone(), |t, n| t.push_front(n)),
            (_, FingerTree::Empty) => ts.into_iter().fold(xs.clone(), |t, n| t.push_back(n)),
            (FingerTree::Single(x), _) => Self::app3(&FingerTree::Empty, ts, ys).push_front(x.clone()),
            (_, FingerTree::Single(y)) => Self::app3(xs, ts, &FingerTree::Empty).push_back(y.clone()),
            (FingerTree::Deep(a), FingerTree::Deep(b)) => {
                let mut mid: Vec<TreeNode> = a.right.iter().cloned().collect();
                mid.extend(ts);
                mid.extend(b.left.iter().cloned());
                deep(
                    a.left.clone(),
                    Self::app3(&a.middle, group(&mid), &b.middle),
                    b.right.clone(),
                )
            }
        }
    }

    /// Splits around the element containing position `i`.
    pub(crate) fn split_at(&self, i: u64) -> (FingerTree, TreeNode, FingerTree) {
        match self {
            FingerTree::Empty => panic!("split of an empty finger tree"),
            FingerTree::Single(x) => (FingerTree::Empty, x.clone(), FingerTree::Empty),
            FingerTree::Deep(d) => {
                let lsize = digit_size(&d.left);
                if i < lsize {
                    let (k, _) = locate(&d.left, i);
                    return (
                        Self::from_nodes(&d.left[..k]),
                        d.left[k].clone(),
                        Self::deep_left(&d.left[k + 1..], &d.middle, &d.right),
                    );
                }
                let i = i - lsize;
                let msize = d.middle.size();
                if i < msize {
                    let (ml, node, mr) = d.middle.split_at(i);
                    let children = node.children();
                    let (k, _) = locate(children, i - ml.size());
                    return (
                        Self::deep_right(&d.left, &ml, &children[..k]),
                        children[k].clone(),
                        Self::deep_left(&children[k + 1..], &mr, &d.right),
                    );
                }
                let (k, _) = locate(&d.right, i - msize);
                (
                    Self::deep_right(&d.left, &d.middle, &d.right[..k]),
                    d.right[k].clone(),
                    Self::from_nodes(&d.right[k + 1..]),
                )
            }
        }
    }

    /// Leaf containing position `i`, with the position of its first item.
    pub(crate) fn leaf_at(&self, i: u64) -> (&Leaf, u64) {
        match self {
            FingerTree::Empty => panic!("position {i} in an empty finger tree"),
            FingerTree::Single(x) => x.leaf_at(i),
            FingerTree::Deep(d) => {
                let lsize = digit_size(&d.left);
                if i < lsize {
                    let (k, offset) = locate(&d.left, i);
                    let (leaf, start) = d.left[k].leaf_at(i - offset);
                    return (leaf, start + offset);
                }
                let msize = d.middle.size();
                if i - lsize < msize {
                    let (leaf, start) = d.middle.leaf_at(i - lsize);
                    return (leaf, start + lsize);
                }
                let j = i - lsize - msize;
                let (k, offset) = locate(&d.right, j);
                let (leaf, start) = d.right[k].leaf_at(j - offset);
                (leaf, start + offset + lsize + msize)
            }
        }
    }

    pub(crate) fn get(&self, i: u64) -> &Item {
        let (leaf, start) = self.leaf_at(i);
        &leaf[(i - start) as usize]
    }

    /// Verifies node bounds and cached sizes; returns the item count.
    pub(crate) fn check(&self, depth: usize) -> Result<u64, String> {
        match self {
            FingerTree::Empty => Ok(0),
            FingerTree::Single(x) => x.check(depth),
            FingerTree::Deep(d) => {
                for digit in [&d.left, &d.right] {
                    if !(1..=4).contains(&digit.len()) {
                        return Err(format!("finger digit holds {} elements", digit.len()));
                    }
                }
                let mut total = d.middle.check(depth + 1)?;
                for n in d.left.iter().chain(&d.right) {
                    total += n.check(depth)?;
                }
                if total == d.size {
                    Ok(total)
                } else {
                    Err(format!("deep node caches size {}, holds {total}", d.size))
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn leaves(&self) -> Vec<Leaf> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    #[cfg(test)]
    fn collect_into(&self, out: &mut Vec<Leaf>) {
        match self {
            FingerTree::Empty => {}
            FingerTree::Single(x) => x.collect_leaves(out),
            FingerTree::Deep(d) => {
                d.left.iter().for_each(|n| n.collect_leaves(out));
                d.middle.collect_into(out);
                d.right.iter().for_each(|n| n.collect_leaves(out));
            }
        }
    }
}

/// Groups 2 or more elements into inner nodes of two or three children.
fn group(nodes: &[TreeNode]) -> Vec<TreeNode> {
    let mut out = Vec::with_capacity(nodes.len() / 2);
    let mut rest = nodes;
    loop {
        match rest.len() {
            2 | 3 => {
                out.push(TreeNode::inner(rest));
                return out;
            }
            4 => {
                out.push(TreeNode::inner(&rest[..2]));
                out.push(TreeNode::inner(&rest[2..]));
                return out;
            }
            _ => {
                out.push(TreeNode::inner(&rest[..3]));
                rest = &rest[3..];
            }
        }
    }
}
