use rstest::rstest;
use xquery_core::expr::coerce;
use xquery_core::{AtomicValue, ErrorCode, ErrorKind, Item, QueryContext, Value, elem};

fn item(i: Item) -> Value {
    Value::Item(i)
}

#[rstest]
#[case::integer(item(Item::integer(12)), 12)]
#[case::untyped(item(Item::untyped("12")), 12)]
fn to_long_accepts(#[case] input: Value, #[case] expected: i64) {
    let mut qc = QueryContext::new();
    assert_eq!(coerce::to_long(&input, &mut qc).unwrap(), expected);
}

#[rstest]
#[case::empty(Value::Empty, ErrorKind::EmptyInput)]
#[case::bad_lexical(item(Item::untyped("twelve")), ErrorKind::Cast)]
#[case::string(item(Item::string("12")), ErrorKind::Cast)]
#[case::sequence(Value::range(1, 2), ErrorKind::Cardinality)]
fn to_long_rejects(#[case] input: Value, #[case] kind: ErrorKind) {
    let mut qc = QueryContext::new();
    assert_eq!(coerce::to_long(&input, &mut qc).unwrap_err().kind, kind);
}

#[test]
fn untyped_bad_lexical_form_is_forg0001() {
    let mut qc = QueryContext::new();
    let err = coerce::to_long(&item(Item::untyped("twelve")), &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0001);
}

#[test]
fn to_long_opt_maps_empty_to_none() {
    let mut qc = QueryContext::new();
    assert_eq!(coerce::to_long_opt(&Value::Empty, &mut qc).unwrap(), None);
    assert_eq!(coerce::to_long_opt(&Value::integer(3), &mut qc).unwrap(), Some(3));
}

#[test]
fn untyped_number_becomes_double() {
    let mut qc = QueryContext::new();
    let n = coerce::to_number(&item(Item::untyped("2.5")), &mut qc).unwrap();
    assert_eq!(n, AtomicValue::Double(2.5));
    assert_eq!(coerce::to_double(&Value::integer(4), &mut qc).unwrap(), 4.0);
}

#[test]
fn node_atomizes_to_token() {
    let mut qc = QueryContext::new();
    let node = elem("a").child(xquery_core::text("hello")).build();
    assert_eq!(coerce::to_token(&item(node.into()), &mut qc).unwrap(), "hello");
}

#[test]
fn to_token_rejects_numbers() {
    let mut qc = QueryContext::new();
    let err = coerce::to_token(&Value::integer(1), &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[test]
fn untyped_qname_is_namespace_sensitive() {
    let mut qc = QueryContext::new();
    let err = coerce::to_qname(&item(Item::untyped("a:b")), &mut qc).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NamespaceSensitive);
    assert_eq!(err.code_enum(), ErrorCode::XPTY0117);
}

#[test]
fn base64_string_is_decoded() {
    let mut qc = QueryContext::new();
    let bytes = coerce::to_b64(&item(Item::string("aGVsbG8=")), &mut qc).unwrap();
    assert_eq!(&*bytes, b"hello");
}

#[test]
fn invalid_base64_keeps_decoder_error() {
    let mut qc = QueryContext::new();
    let err = coerce::to_b64(&item(Item::string("%%%")), &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0001);
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn string_bytes_are_utf8() {
    let mut qc = QueryContext::new();
    let bytes = coerce::to_bytes(&item(Item::string("ä")), &mut qc).unwrap();
    assert_eq!(&*bytes, "ä".as_bytes());
}

#[test]
fn non_function_is_rejected() {
    let mut qc = QueryContext::new();
    let err = coerce::to_func(&Value::integer(1), &mut qc).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[test]
fn atomic_is_not_a_node() {
    let mut qc = QueryContext::new();
    let err = coerce::to_node(&Value::integer(1), &mut qc).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cast);
}

#[test]
fn missing_context_value() {
    let qc = QueryContext::new();
    let err = coerce::ctx_value(&qc, "context value").unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPDY0002);
    assert_eq!(err.kind, ErrorKind::Context);
}
