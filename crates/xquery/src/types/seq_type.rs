use super::Type;
use core::fmt;

/// Occurrence indicator, ordered as a lattice of `(min, max)` intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    Zero,
    ZeroOrOne,
    ExactlyOne,
    ZeroOrMore,
    OneOrMore,
}

// upper bound 2 stands for "unbounded"
const MANY: u8 = 2;

impl Occurrence {
    fn bounds(self) -> (u8, u8) {
        match self {
            Occurrence::Zero => (0, 0),
            Occurrence::ZeroOrOne => (0, 1),
            Occurrence::ExactlyOne => (1, 1),
            Occurrence::ZeroOrMore => (0, MANY),
            Occurrence::OneOrMore => (1, MANY),
        }
    }

    fn from_bounds(min: u8, max: u8) -> Option<Occurrence> {
        Some(match (min, max) {
            (0, 0) => Occurrence::Zero,
            (0, 1) => Occurrence::ZeroOrOne,
            (1, 1) => Occurrence::ExactlyOne,
            (0, _) => Occurrence::ZeroOrMore,
            (1, m) if m >= MANY => Occurrence::OneOrMore,
            _ => return None,
        })
    }

    /// Occurrence describing a sequence of exactly `size` items.
    pub fn of_size(size: u64) -> Occurrence {
        match size {
            0 => Occurrence::Zero,
            1 => Occurrence::ExactlyOne,
            _ => Occurrence::OneOrMore,
        }
    }

    pub fn min(self) -> u64 {
        u64::from(self.bounds().0)
    }

    /// `None` when unbounded.
    pub fn max(self) -> Option<u64> {
        let (_, max) = self.bounds();
        (max < MANY).then_some(u64::from(max))
    }

    pub fn check(self, size: u64) -> bool {
        size >= self.min() && self.max().is_none_or(|m| size <= m)
    }

    pub fn instance_of(self, other: Occurrence) -> bool {
        let (a0, a1) = self.bounds();
        let (b0, b1) = other.bounds();
        a0 >= b0 && a1 <= b1
    }

    pub fn union(self, other: Occurrence) -> Occurrence {
        let (a0, a1) = self.bounds();
        let (b0, b1) = other.bounds();
        Self::from_bounds(a0.min(b0), a1.max(b1)).unwrap_or(Occurrence::ZeroOrMore)
    }

    pub fn intersect(self, other: Occurrence) -> Option<Occurrence> {
        let (a0, a1) = self.bounds();
        let (b0, b1) = other.bounds();
        Self::from_bounds(a0.max(b0), a1.min(b1))
    }

    /// Occurrence of the concatenation of two sequences.
    pub fn add(self, other: Occurrence) -> Occurrence {
        let (a0, a1) = self.bounds();
        let (b0, b1) = other.bounds();
        Self::from_bounds((a0 + b0).min(1), (a1 + b1).min(MANY)).unwrap_or(Occurrence::ZeroOrMore)
    }

    /// Occurrence of a sequence built by evaluating `other` once per item of `self`.
    pub fn mul(self, other: Occurrence) -> Occurrence {
        let (a0, a1) = self.bounds();
        let (b0, b1) = other.bounds();
        Self::from_bounds(a0 * b0, (a1 * b1).min(MANY)).unwrap_or(Occurrence::ZeroOrMore)
    }

    pub fn zero_or_one(self) -> bool {
        self.bounds().1 <= 1
    }

    fn suffix(self) -> &'static str {
        match self {
            Occurrence::Zero | Occurrence::ExactlyOne => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
        }
    }
}

/// Item type plus occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeqType {
    pub ty: Type,
    pub occ: Occurrence,
}

impl SeqType {
    pub const EMPTY: SeqType = SeqType::new(Type::Item, Occurrence::Zero);
    pub const ITEM_ZM: SeqType = SeqType::new(Type::Item, Occurrence::ZeroOrMore);
    pub const ITEM_O: SeqType = SeqType::new(Type::Item, Occurrence::ExactlyOne);
    pub const BOOLEAN_O: SeqType = SeqType::new(Type::BOOLEAN, Occurrence::ExactlyOne);
    pub const INTEGER_O: SeqType = SeqType::new(Type::INTEGER, Occurrence::ExactlyOne);

    pub const fn new(ty: Type, occ: Occurrence) -> Self {
        Self { ty, occ }
    }

    pub const fn one(ty: Type) -> Self {
        Self::new(ty, Occurrence::ExactlyOne)
    }

    pub const fn zero_or_one(ty: Type) -> Self {
        Self::new(ty, Occurrence::ZeroOrOne)
    }

    pub const fn zero_or_more(ty: Type) -> Self {
        Self::new(ty, Occurrence::ZeroOrMore)
    }

    pub const fn one_or_more(ty: Type) -> Self {
        Self::new(ty, Occurrence::OneOrMore)
    }

    pub fn is_zero(&self) -> bool {
        self.occ == Occurrence::Zero
    }

    pub fn is_one(&self) -> bool {
        self.occ == Occurrence::ExactlyOne
    }

    pub fn is_zero_or_one(&self) -> bool {
        self.occ.zero_or_one()
    }

    pub fn may_be_array(&self) -> bool {
        !self.is_zero() && Type::ARRAY.instance_of(self.ty)
    }

    pub fn with_occ(self, occ: Occurrence) -> SeqType {
        SeqType::new(self.ty, occ)
    }

    pub fn instance_of(&self, other: &SeqType) -> bool {
        if self.is_zero() {
            return other.occ.min() == 0;
        }
        self.occ.instance_of(other.occ) && self.ty.instance_of(other.ty)
    }

    pub fn union(&self, other: &SeqType) -> SeqType {
        let ty = match (self.is_zero(), other.is_zero()) {
            (true, _) => other.ty,
            (_, true) => self.ty,
            _ => self.ty.union(other.ty),
        };
        SeqType::new(ty, self.occ.union(other.occ))
    }

    pub fn intersect(&self, other: &SeqType) -> Option<SeqType> {
        let occ = self.occ.intersect(other.occ)?;
        if occ == Occurrence::Zero {
            return Some(SeqType::EMPTY);
        }
        match self.ty.intersect(other.ty) {
            Some(ty) => Some(SeqType::new(ty, occ)),
            // disjoint item types leave room for the empty sequence only
            None if occ.min() == 0 => Some(SeqType::EMPTY),
            None => None,
        }
    }
}

impl fmt::Display for SeqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("empty-sequence()");
        }
        write!(f, "{}{}", self.ty, self.occ.suffix())
    }
}

/// Static type of an expression together with its exact size, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprType {
    seq_type: SeqType,
    size: Option<u64>,
}

impl ExprType {
    pub fn new(seq_type: SeqType) -> Self {
        let size = match seq_type.occ {
            Occurrence::Zero => Some(0),
            Occurrence::ExactlyOne => Some(1),
            _ => None,
        };
        Self { seq_type, size }
    }

    pub fn sized(ty: Type, size: u64) -> Self {
        Self {
            seq_type: SeqType::new(ty, Occurrence::of_size(size)),
            size: Some(size),
        }
    }

    pub fn seq_type(&self) -> SeqType {
        self.seq_type
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Adopts a narrower sequence type. A known exact size is kept.
    pub fn assign(&mut self, st: SeqType) {
        match self.size {
            Some(size) if st.occ.check(size) => self.seq_type = st.with_occ(self.seq_type.occ),
            Some(_) => {}
            None => *self = ExprType::new(st),
        }
        if self.size == Some(0) {
            self.seq_type = SeqType::EMPTY;
        }
    }
}

impl From<SeqType> for ExprType {
    fn from(st: SeqType) -> Self {
        ExprType::new(st)
    }
}
