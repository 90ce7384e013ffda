use rstest::rstest;
use xquery_core::{AtomType, ExprType, NodeType, Occurrence, SeqType, Type};

const SAMPLE: [Type; 12] = [
    Type::ITEM,
    Type::ANY_ATOMIC,
    Type::NUMERIC,
    Type::INTEGER,
    Type::DOUBLE,
    Type::STRING,
    Type::Atomic(AtomType::Byte),
    Type::Atomic(AtomType::NcName),
    Type::NODE,
    Type::DOCUMENT,
    Type::Node(NodeType::DocumentElement),
    Type::MAP,
];

#[test]
fn union_is_a_common_supertype() {
    for a in SAMPLE {
        for b in SAMPLE {
            let u = a.union(b);
            assert_eq!(u, b.union(a), "{a} | {b}");
            assert!(a.instance_of(u) && b.instance_of(u), "{a} | {b} = {u}");
        }
    }
}

#[test]
fn intersection_is_a_common_subtype() {
    for a in SAMPLE {
        for b in SAMPLE {
            let Some(i) = a.intersect(b) else {
                assert!(!a.instance_of(b) && !b.instance_of(a), "{a} & {b}");
                continue;
            };
            assert_eq!(Some(i), b.intersect(a));
            assert!(i.instance_of(a) && i.instance_of(b), "{a} & {b} = {i}");
        }
    }
}

#[rstest]
#[case::numbers(Type::INTEGER, Type::DOUBLE, Type::NUMERIC)]
#[case::integer_subtypes(Type::Atomic(AtomType::Byte), Type::Atomic(AtomType::UnsignedByte), Type::INTEGER)]
#[case::atomics(Type::STRING, Type::BOOLEAN, Type::ANY_ATOMIC)]
#[case::nodes(Type::ELEMENT, Type::Node(NodeType::DocumentElement), Type::NODE)]
#[case::node_and_atomic(Type::ELEMENT, Type::STRING, Type::ITEM)]
#[case::functions(Type::MAP, Type::ARRAY, Type::FUNCTION)]
fn least_common_supertype(#[case] a: Type, #[case] b: Type, #[case] expected: Type) {
    assert_eq!(a.union(b), expected);
}

#[test]
fn subtype_chains() {
    assert!(Type::Atomic(AtomType::UnsignedByte).instance_of(Type::Atomic(AtomType::NonNegativeInteger)));
    assert!(Type::Atomic(AtomType::Id).instance_of(Type::STRING));
    assert!(Type::Node(NodeType::DocumentElement).instance_of(Type::DOCUMENT));
    assert!(Type::ARRAY.instance_of(Type::FUNCTION));
    assert!(!Type::UNTYPED.instance_of(Type::STRING));
    assert!(!Type::DOUBLE.instance_of(Type::DECIMAL));
}

#[rstest]
#[case::one_plus_optional(Occurrence::ExactlyOne, Occurrence::ZeroOrOne, Occurrence::OneOrMore)]
#[case::nothing(Occurrence::Zero, Occurrence::Zero, Occurrence::Zero)]
#[case::optionals(Occurrence::ZeroOrOne, Occurrence::ZeroOrOne, Occurrence::ZeroOrMore)]
#[case::zero_is_neutral(Occurrence::Zero, Occurrence::ExactlyOne, Occurrence::ExactlyOne)]
fn occurrence_add(#[case] a: Occurrence, #[case] b: Occurrence, #[case] expected: Occurrence) {
    assert_eq!(a.add(b), expected);
    assert_eq!(b.add(a), expected);
}

#[rstest]
#[case::one_times_optional(Occurrence::ExactlyOne, Occurrence::ZeroOrOne, Occurrence::ZeroOrOne)]
#[case::many_times_one(Occurrence::OneOrMore, Occurrence::ExactlyOne, Occurrence::OneOrMore)]
#[case::zero_absorbs(Occurrence::Zero, Occurrence::OneOrMore, Occurrence::Zero)]
#[case::any(Occurrence::ZeroOrMore, Occurrence::OneOrMore, Occurrence::ZeroOrMore)]
fn occurrence_mul(#[case] a: Occurrence, #[case] b: Occurrence, #[case] expected: Occurrence) {
    assert_eq!(a.mul(b), expected);
}

#[test]
fn occurrence_union_and_intersection() {
    assert_eq!(Occurrence::Zero.union(Occurrence::ExactlyOne), Occurrence::ZeroOrOne);
    assert_eq!(Occurrence::ZeroOrOne.union(Occurrence::OneOrMore), Occurrence::ZeroOrMore);
    assert_eq!(Occurrence::ZeroOrOne.intersect(Occurrence::OneOrMore), Some(Occurrence::ExactlyOne));
    assert_eq!(Occurrence::Zero.intersect(Occurrence::ExactlyOne), None);
    assert!(Occurrence::ExactlyOne.instance_of(Occurrence::ZeroOrMore));
    assert!(!Occurrence::ZeroOrOne.instance_of(Occurrence::OneOrMore));
}

#[rstest]
#[case(Occurrence::Zero, 0, true)]
#[case(Occurrence::Zero, 1, false)]
#[case(Occurrence::ZeroOrOne, 1, true)]
#[case(Occurrence::ExactlyOne, 2, false)]
#[case(Occurrence::OneOrMore, 0, false)]
#[case(Occurrence::OneOrMore, 1_000_000, true)]
fn occurrence_accepts_size(#[case] occ: Occurrence, #[case] size: u64, #[case] ok: bool) {
    assert_eq!(occ.check(size), ok);
}

#[test]
fn disjoint_sequence_types() {
    let strings = SeqType::zero_or_more(Type::STRING);
    let int = SeqType::zero_or_one(Type::INTEGER);
    assert_eq!(strings.intersect(&int), Some(SeqType::EMPTY));
    assert_eq!(SeqType::one(Type::STRING).intersect(&SeqType::INTEGER_O), None);
    assert_eq!(
        SeqType::INTEGER_O.intersect(&SeqType::zero_or_more(Type::NUMERIC)),
        Some(SeqType::INTEGER_O)
    );
}

#[test]
fn empty_sequence_type() {
    assert!(SeqType::EMPTY.instance_of(&SeqType::zero_or_more(Type::STRING)));
    assert!(!SeqType::EMPTY.instance_of(&SeqType::one(Type::STRING)));
    let u = SeqType::EMPTY.union(&SeqType::one(Type::STRING));
    assert_eq!(u, SeqType::zero_or_one(Type::STRING));
}

#[rstest]
#[case(SeqType::one_or_more(Type::INTEGER), "xs:integer+")]
#[case(SeqType::zero_or_one(Type::NODE), "node()?")]
#[case(SeqType::ITEM_ZM, "item()*")]
#[case(SeqType::EMPTY, "empty-sequence()")]
#[case(SeqType::zero_or_more(Type::MAP), "map(*)*")]
fn sequence_type_display(#[case] st: SeqType, #[case] expected: &str) {
    assert_eq!(st.to_string(), expected);
}

#[test]
fn known_size_survives_assignment() {
    let mut et = ExprType::sized(Type::ITEM, 3);
    et.assign(SeqType::zero_or_more(Type::INTEGER));
    assert_eq!(et.seq_type(), SeqType::one_or_more(Type::INTEGER));
    assert_eq!(et.size(), Some(3));
    et.assign(SeqType::INTEGER_O);
    assert_eq!(et.seq_type(), SeqType::one_or_more(Type::INTEGER));
}

#[test]
fn unknown_size_adopts_the_assigned_type() {
    let mut et = ExprType::new(SeqType::ITEM_ZM);
    assert_eq!(et.size(), None);
    et.assign(SeqType::one(Type::STRING));
    assert_eq!(et.size(), Some(1));
    assert_eq!(et.seq_type(), SeqType::one(Type::STRING));
}

#[test]
fn zero_size_stays_empty() {
    let mut et = ExprType::sized(Type::ITEM, 0);
    et.assign(SeqType::zero_or_more(Type::STRING));
    assert_eq!(et.seq_type(), SeqType::EMPTY);
    assert_eq!(et.size(), Some(0));
}
