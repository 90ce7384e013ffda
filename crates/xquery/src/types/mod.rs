//! Static type lattice.
//!
//! Every descriptor sits in a single-rooted hierarchy below `item()`. Subtyping
//! is decided by walking the parent chain, so `union` is the least common
//! ancestor and `intersect` is the narrower of two comparable types. Nothing in
//! here inspects values.

mod seq_type;

pub use seq_type::{ExprType, Occurrence, SeqType};

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomType {
    AnyAtomic,
    UntypedAtomic,
    String,
    NormalizedString,
    Token,
    Language,
    NmToken,
    Name,
    NcName,
    Id,
    IdRef,
    Entity,
    Numeric,
    Float,
    Double,
    Decimal,
    Integer,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    PositiveInteger,
    Duration,
    YearMonthDuration,
    DayTimeDuration,
    DateTime,
    Date,
    Time,
    Boolean,
    Base64Binary,
    HexBinary,
    AnyUri,
    QName,
    Notation,
}

impl AtomType {
    pub fn parent(self) -> Option<AtomType> {
        use AtomType::*;
        Some(match self {
            AnyAtomic => return None,
            NormalizedString => String,
            Token => NormalizedString,
            Language | NmToken | Name => Token,
            NcName => Name,
            Id | IdRef | Entity => NcName,
            Float | Double | Decimal => Numeric,
            Integer => Decimal,
            NonPositiveInteger | Long | NonNegativeInteger => Integer,
            NegativeInteger => NonPositiveInteger,
            Int => Long,
            Short => Int,
            Byte => Short,
            UnsignedLong | PositiveInteger => NonNegativeInteger,
            UnsignedInt => UnsignedLong,
            UnsignedShort => UnsignedInt,
            UnsignedByte => UnsignedShort,
            YearMonthDuration | DayTimeDuration => Duration,
            UntypedAtomic | String | Numeric | Duration | DateTime | Date | Time | Boolean
            | Base64Binary | HexBinary | AnyUri | QName | Notation => AnyAtomic,
        })
    }

    pub fn instance_of(self, other: AtomType) -> bool {
        let mut cur = Some(self);
        while let Some(t) = cur {
            if t == other {
                return true;
            }
            cur = t.parent();
        }
        false
    }

    pub fn local_name(self) -> &'static str {
        use AtomType::*;
        match self {
            AnyAtomic => "anyAtomicType",
            UntypedAtomic => "untypedAtomic",
            String => "string",
            NormalizedString => "normalizedString",
            Token => "token",
            Language => "language",
            NmToken => "NMTOKEN",
            Name => "Name",
            NcName => "NCName",
            Id => "ID",
            IdRef => "IDREF",
            Entity => "ENTITY",
            Numeric => "numeric",
            Float => "float",
            Double => "double",
            Decimal => "decimal",
            Integer => "integer",
            NonPositiveInteger => "nonPositiveInteger",
            NegativeInteger => "negativeInteger",
            Long => "long",
            Int => "int",
            Short => "short",
            Byte => "byte",
            NonNegativeInteger => "nonNegativeInteger",
            UnsignedLong => "unsignedLong",
            UnsignedInt => "unsignedInt",
            UnsignedShort => "unsignedShort",
            UnsignedByte => "unsignedByte",
            PositiveInteger => "positiveInteger",
            Duration => "duration",
            YearMonthDuration => "yearMonthDuration",
            DayTimeDuration => "dayTimeDuration",
            DateTime => "dateTime",
            Date => "date",
            Time => "time",
            Boolean => "boolean",
            Base64Binary => "base64Binary",
            HexBinary => "hexBinary",
            AnyUri => "anyURI",
            QName => "QName",
            Notation => "NOTATION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Node,
    Text,
    ProcessingInstruction,
    Element,
    Document,
    DocumentElement,
    Attribute,
    Comment,
    Namespace,
}

impl NodeType {
    pub fn parent(self) -> Option<NodeType> {
        match self {
            NodeType::Node => None,
            NodeType::DocumentElement => Some(NodeType::Document),
            _ => Some(NodeType::Node),
        }
    }
}

/// Function item families. Maps and arrays are functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuncType {
    Function,
    Map,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Item,
    Atomic(AtomType),
    Node(NodeType),
    Function(FuncType),
}

impl Type {
    pub const ITEM: Type = Type::Item;
    pub const NODE: Type = Type::Node(NodeType::Node);
    pub const ELEMENT: Type = Type::Node(NodeType::Element);
    pub const DOCUMENT: Type = Type::Node(NodeType::Document);
    pub const ANY_ATOMIC: Type = Type::Atomic(AtomType::AnyAtomic);
    pub const UNTYPED: Type = Type::Atomic(AtomType::UntypedAtomic);
    pub const STRING: Type = Type::Atomic(AtomType::String);
    pub const NUMERIC: Type = Type::Atomic(AtomType::Numeric);
    pub const INTEGER: Type = Type::Atomic(AtomType::Integer);
    pub const DECIMAL: Type = Type::Atomic(AtomType::Decimal);
    pub const DOUBLE: Type = Type::Atomic(AtomType::Double);
    pub const FLOAT: Type = Type::Atomic(AtomType::Float);
    pub const BOOLEAN: Type = Type::Atomic(AtomType::Boolean);
    pub const QNAME: Type = Type::Atomic(AtomType::QName);
    pub const FUNCTION: Type = Type::Function(FuncType::Function);
    pub const MAP: Type = Type::Function(FuncType::Map);
    pub const ARRAY: Type = Type::Function(FuncType::Array);

    pub fn parent(self) -> Option<Type> {
        match self {
            Type::Item => None,
            Type::Atomic(a) => Some(a.parent().map_or(Type::Item, Type::Atomic)),
            Type::Node(n) => Some(n.parent().map_or(Type::Item, Type::Node)),
            Type::Function(FuncType::Function) => Some(Type::Item),
            Type::Function(_) => Some(Type::FUNCTION),
        }
    }

    /// Reflexive, transitive subtype test.
    pub fn instance_of(self, other: Type) -> bool {
        let mut cur = Some(self);
        while let Some(t) = cur {
            if t == other {
                return true;
            }
            cur = t.parent();
        }
        false
    }

    /// Least common supertype; `item()` in the worst case.
    pub fn union(self, other: Type) -> Type {
        let mut cur = Some(self);
        while let Some(t) = cur {
            if other.instance_of(t) {
                return t;
            }
            cur = t.parent();
        }
        Type::Item
    }

    /// Greatest common subtype, or `None` for disjoint types.
    pub fn intersect(self, other: Type) -> Option<Type> {
        if self.instance_of(other) {
            Some(self)
        } else if other.instance_of(self) {
            Some(other)
        } else {
            None
        }
    }

    pub fn is_atomic(self) -> bool {
        matches!(self, Type::Atomic(_))
    }

    pub fn is_node(self) -> bool {
        matches!(self, Type::Node(_))
    }

    pub fn is_function(self) -> bool {
        matches!(self, Type::Function(_))
    }

    pub fn is_number(self) -> bool {
        matches!(self, Type::Atomic(a) if a.instance_of(AtomType::Numeric))
    }

    /// Untyped atomics, and nodes, which atomize to untyped values.
    pub fn is_untyped(self) -> bool {
        matches!(self, Type::Atomic(AtomType::UntypedAtomic) | Type::Node(_))
    }

    pub fn is_string(self) -> bool {
        matches!(self, Type::Atomic(a) if a.instance_of(AtomType::String))
    }

    pub fn is_number_or_untyped(self) -> bool {
        self.is_number() || self.is_untyped()
    }

    pub fn is_string_or_untyped(self) -> bool {
        self.is_string() || self.is_untyped()
    }

    pub fn is_sortable(self) -> bool {
        use AtomType::*;
        self.is_number_or_untyped()
            || self.is_string()
            || matches!(
                self,
                Type::Atomic(
                    YearMonthDuration
                        | DayTimeDuration
                        | DateTime
                        | Date
                        | Time
                        | Boolean
                        | Base64Binary
                        | HexBinary
                        | AnyUri
                )
            )
    }

    pub fn ns_sensitive(self) -> bool {
        matches!(self, Type::Atomic(a) if a.instance_of(AtomType::QName) || a.instance_of(AtomType::Notation))
    }

    /// Atomic type produced by atomizing an item of this type, if statically known.
    pub fn atomic(self) -> Option<AtomType> {
        match self {
            Type::Atomic(a) => Some(a),
            Type::Node(_) => Some(AtomType::UntypedAtomic),
            Type::Item | Type::Function(_) => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Item => f.write_str("item()"),
            Type::Atomic(a) => write!(f, "xs:{}", a.local_name()),
            Type::Node(n) => f.write_str(match n {
                NodeType::Node => "node()",
                NodeType::Text => "text()",
                NodeType::ProcessingInstruction => "processing-instruction()",
                NodeType::Element => "element()",
                NodeType::Document => "document-node()",
                NodeType::DocumentElement => "document-node(element())",
                NodeType::Attribute => "attribute()",
                NodeType::Comment => "comment()",
                NodeType::Namespace => "namespace-node()",
            }),
            Type::Function(k) => f.write_str(match k {
                FuncType::Function => "function(*)",
                FuncType::Map => "map(*)",
                FuncType::Array => "array(*)",
            }),
        }
    }
}

impl From<AtomType> for Type {
    fn from(a: AtomType) -> Self {
        Type::Atomic(a)
    }
}

impl From<NodeType> for Type {
    fn from(n: NodeType) -> Self {
        Type::Node(n)
    }
}
