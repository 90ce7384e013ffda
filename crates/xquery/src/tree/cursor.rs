use super::{Leaf, TreeSeq};
use crate::xdm::Item;

/// Bidirectional cursor over a [`TreeSeq`]. It caches the current leaf, so
/// sequential access costs amortised constant time per item.
#[derive(Clone)]
pub struct TreeCursor {
    seq: TreeSeq,
    index: u64,
    chunk: Option<(Leaf, u64)>,
}

impl TreeCursor {
    pub(crate) fn new(seq: TreeSeq, index: u64) -> Self {
        assert!(index <= seq.size, "cursor position {index} beyond {} items", seq.size);
        Self {
            seq,
            index,
            chunk: None,
        }
    }

    /// Position of the item the next call to [`Iterator::next`] returns.
    pub fn next_index(&self) -> u64 {
        self.index
    }

    fn fetch(&mut self, pos: u64) -> Item {
        if let Some((leaf, start)) = &self.chunk
            && pos >= *start
            && pos - start < leaf.len() as u64
        {
            return leaf[(pos - start) as usize].clone();
        }
        let (leaf, start) = self.seq.chunk_at(pos);
        let item = leaf[(pos - start) as usize].clone();
        self.chunk = Some((leaf, start));
        item
    }

    /// Steps back and returns the item before the cursor.
    pub fn prev(&mut self) -> Option<Item> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.fetch(self.index))
    }
}

impl Iterator for TreeCursor {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        if self.index >= self.seq.size {
            return None;
        }
        let item = self.fetch(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.seq.size - self.index) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for TreeCursor {}

#[cfg(test)]
mod tests {
    use crate::types::Type;
    use crate::xdm::{Item, Value};

    #[test]
    fn walks_both_directions() {
        let v: Value = (0..200).map(Item::integer).collect();
        let Value::Tree(t) = &v else { panic!("expected a tree") };
        let mut c = t.cursor(100);
        assert_eq!(c.next(), Some(Item::integer(100)));
        assert_eq!(c.next_index(), 101);
        assert_eq!(c.prev(), Some(Item::integer(100)));
        assert_eq!(c.prev(), Some(Item::integer(99)));
        let mut back = t.cursor(t.size());
        let mut count = 0;
        while back.prev().is_some() {
            count += 1;
        }
        assert_eq!(count, 200);
        assert_eq!(t.ty(), Type::INTEGER);
    }
}
